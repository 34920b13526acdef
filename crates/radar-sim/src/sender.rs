//! ---
//! radar_section: "11-simulation"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Paced UDP sender for synthetic telemetry."
//! radar_version: "v0.1.0"
//! radar_owner: "tbd"
//! ---
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::generator::TelemetryGenerator;

/// Pacing and mix of the datagrams a [`UdpSimulator`] emits.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub target: SocketAddr,
    /// Tracks per second.
    pub rate_hz: f64,
    /// Send a health report after every N tracks; `0` disables health reports.
    pub health_every: u64,
    /// Send a truncated JSON datagram after every N tracks.
    pub malformed_every: Option<u64>,
    /// Stop after this many tracks; `None` runs until shutdown.
    pub count: Option<u64>,
    pub seed: Option<u64>,
}

impl SimulatorConfig {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            rate_hz: 10.0,
            health_every: 50,
            malformed_every: None,
            count: None,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            return Err(anyhow!("rate_hz must be a positive number, got {}", self.rate_hz));
        }
        if self.malformed_every == Some(0) {
            return Err(anyhow!("malformed_every must be at least 1"));
        }
        Ok(())
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }
}

/// Datagrams sent by one simulator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub tracks: u64,
    pub health: u64,
    pub malformed: u64,
}

impl SimulatorStats {
    pub fn total(&self) -> u64 {
        self.tracks + self.health + self.malformed
    }
}

/// Sends one random track per tick towards an ingest socket.
#[derive(Debug)]
pub struct UdpSimulator {
    config: SimulatorConfig,
    generator: TelemetryGenerator,
    socket: UdpSocket,
}

impl UdpSimulator {
    pub async fn bind(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        let local = match config.target.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local)
            .await
            .with_context(|| format!("failed to bind simulator socket {}", local))?;
        let generator = match config.seed {
            Some(seed) => TelemetryGenerator::new(seed),
            None => TelemetryGenerator::from_entropy(),
        };
        Ok(Self {
            config,
            generator,
            socket,
        })
    }

    /// Emit telemetry until `count` tracks were sent or `shutdown` resolves.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<SimulatorStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = interval(self.config.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = SimulatorStats::default();

        info!(
            destination = %self.config.target,
            rate_hz = self.config.rate_hz,
            health_every = self.config.health_every,
            "simulator started"
        );

        while self.config.count.map_or(true, |limit| stats.tracks < limit) {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("simulator received shutdown signal");
                    break;
                }
                _ = ticker.tick() => self.tick(&mut stats).await?,
            }
        }

        info!(
            tracks = stats.tracks,
            health = stats.health,
            malformed = stats.malformed,
            "simulator stopped"
        );
        Ok(stats)
    }

    async fn tick(&mut self, stats: &mut SimulatorStats) -> Result<()> {
        let track = self.generator.next_track()?;
        let payload = serde_json::to_vec(&track)?;
        self.send(&payload).await?;
        stats.tracks += 1;

        if self.config.health_every > 0 && stats.tracks % self.config.health_every == 0 {
            let health = self.generator.health()?;
            self.send(&serde_json::to_vec(&health)?).await?;
            stats.health += 1;
        }

        if let Some(every) = self.config.malformed_every {
            if stats.tracks % every == 0 {
                self.send(&payload[..payload.len() / 2]).await?;
                stats.malformed += 1;
            }
        }
        Ok(())
    }

    async fn send(&self, payload: &[u8]) -> Result<()> {
        self.socket
            .send_to(payload, self.config.target)
            .await
            .with_context(|| format!("failed to send datagram to {}", self.config.target))?;
        Ok(())
    }
}
