//! ---
//! radar_section: "11-simulation"
//! radar_subsection: "01-bootstrap"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "CLI streaming synthetic radar telemetry over UDP."
//! radar_version: "v0.1.0"
//! radar_owner: "tbd"
//! ---
use std::io::{self, Write};
use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use radar_common::{init_tracing, LogFormat, LoggingConfig};
use radar_sim::{SimulatorConfig, TelemetryGenerator, UdpSimulator};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Stream random radar tracks and health reports to an ingest socket",
    long_about = None
)]
struct Cli {
    /// Ingest host name or address
    #[arg(long, env = "RADAR_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Ingest UDP port
    #[arg(long, env = "RADAR_PORT", default_value_t = 9999)]
    port: u16,

    /// Tracks sent per second
    #[arg(long, default_value_t = 10.0)]
    rate_hz: f64,

    /// Send a health report after every N tracks (0 disables)
    #[arg(long, default_value_t = 50)]
    health_every: u64,

    /// Send a truncated JSON datagram after every N tracks
    #[arg(long)]
    malformed_every: Option<u64>,

    /// Stop after N tracks instead of running until Ctrl-C
    #[arg(long)]
    count: Option<u64>,

    /// Random seed for reproducible kinematics
    #[arg(long)]
    seed: Option<u64>,

    /// Print N generated tracks as JSON and exit without sending
    #[arg(long, value_name = "N")]
    print: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(samples) = cli.print {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        print_tracks(&mut out, samples, cli.seed)?;
        return Ok(());
    }

    let logging = LoggingConfig {
        format: LogFormat::Pretty,
        file_enabled: false,
        ..LoggingConfig::default()
    };
    init_tracing("radar-simgen", &logging)?;

    let target = resolve_target(&cli.host, cli.port).await?;
    let config = simulator_config(&cli, target);
    let simulator = UdpSimulator::bind(config).await?;

    let stats = simulator
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!(
        tracks = stats.tracks,
        health = stats.health,
        malformed = stats.malformed,
        "simgen finished"
    );
    Ok(())
}

fn simulator_config(cli: &Cli, target: SocketAddr) -> SimulatorConfig {
    SimulatorConfig {
        target,
        rate_hz: cli.rate_hz,
        health_every: cli.health_every,
        malformed_every: cli.malformed_every,
        count: cli.count,
        seed: cli.seed,
    }
}

async fn resolve_target(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("failed to resolve {}:{}", host, port))?
        .next()
        .ok_or_else(|| anyhow!("no address found for {}:{}", host, port))
}

fn print_tracks<W: Write>(out: &mut W, samples: usize, seed: Option<u64>) -> Result<()> {
    let mut generator = match seed {
        Some(seed) => TelemetryGenerator::new(seed),
        None => TelemetryGenerator::from_entropy(),
    };
    let tracks = (0..samples)
        .map(|_| generator.next_track())
        .collect::<Result<Vec<_>, _>>()?;
    serde_json::to_writer_pretty(&mut *out, &tracks)?;
    out.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn base_cli() -> Cli {
        Cli::parse_from(["radar-simgen"])
    }

    #[test]
    fn defaults_are_applied() {
        let cli = base_cli();
        assert_eq!(cli.rate_hz, 10.0);
        assert_eq!(cli.health_every, 50);
        assert!(cli.malformed_every.is_none());
        assert!(cli.count.is_none());
    }

    #[test]
    fn simulator_config_carries_flags() {
        let cli = Cli::parse_from([
            "radar-simgen",
            "--rate-hz",
            "25",
            "--health-every",
            "5",
            "--malformed-every",
            "7",
            "--count",
            "100",
            "--seed",
            "3",
        ]);
        let config = simulator_config(&cli, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(config.rate_hz, 25.0);
        assert_eq!(config.health_every, 5);
        assert_eq!(config.malformed_every, Some(7));
        assert_eq!(config.count, Some(100));
        assert_eq!(config.seed, Some(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn print_tracks_emits_json_array() {
        let mut out = Vec::new();
        print_tracks(&mut out, 3, Some(9)).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        let tracks = value.as_array().expect("array");
        assert_eq!(tracks.len(), 3);
        let ids: Vec<u64> = tracks.iter().map(|t| t["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn resolve_target_accepts_literal_address() {
        let addr = resolve_target("127.0.0.1", 4242).await.unwrap();
        assert_eq!(addr, "127.0.0.1:4242".parse::<SocketAddr>().unwrap());
    }
}
