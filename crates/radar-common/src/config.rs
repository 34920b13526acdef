//! ---
//! radar_section: "01-core-functionality"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Shared primitives and utilities for the ingest runtime."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_BYTES: usize = 65_535;

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    9999
}

fn default_recv_buffer_bytes() -> usize {
    MAX_DATAGRAM_BYTES
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_file_enabled() -> bool {
    true
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000)
}

/// Primary configuration object for the ingest runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and built-in defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "RADAR_CONFIG";
    pub const ENV_HOST: &str = "RADAR_HOST";
    pub const ENV_PORT: &str = "RADAR_PORT";

    /// Load configuration together with the effective source path.
    ///
    /// An explicit `RADAR_CONFIG` path must exist. Otherwise the first existing
    /// candidate wins, falling back to defaults when none exists.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        let mut loaded = Self::locate(candidates)?;
        loaded.config.apply_overrides(
            std::env::var(Self::ENV_HOST).ok().as_deref(),
            std::env::var(Self::ENV_PORT).ok().as_deref(),
        )?;
        loaded.config.validate()?;
        Ok(loaded)
    }

    fn locate<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!("no configuration file found; using defaults");
        Ok(LoadedAppConfig {
            config: AppConfig::default(),
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply host/port overrides, typically sourced from `RADAR_HOST` / `RADAR_PORT`.
    pub fn apply_overrides(&mut self, host: Option<&str>, port: Option<&str>) -> Result<()> {
        if let Some(host) = host.map(str::trim).filter(|h| !h.is_empty()) {
            self.ingest.host = host
                .parse()
                .with_context(|| format!("{} is not an IP address: {}", Self::ENV_HOST, host))?;
        }
        if let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) {
            self.ingest.port = port
                .parse()
                .with_context(|| format!("{} is not a port number: {}", Self::ENV_PORT, port))?;
        }
        Ok(())
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.ingest.validate()
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// UDP ingest socket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Receive buffer size; datagrams longer than this are truncated by the OS.
    #[serde(default = "default_recv_buffer_bytes")]
    pub recv_buffer_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            recv_buffer_bytes: default_recv_buffer_bytes(),
        }
    }
}

impl IngestConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.recv_buffer_bytes == 0 || self.recv_buffer_bytes > MAX_DATAGRAM_BYTES {
            return Err(anyhow!(
                "ingest recv_buffer_bytes must be within 1..={}, got {}",
                MAX_DATAGRAM_BYTES,
                self.recv_buffer_bytes
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default = "default_file_enabled")]
    pub file_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            file_enabled: default_file_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}
