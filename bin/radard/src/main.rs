//! ---
//! radar_section: "01-core-functionality"
//! radar_subsection: "binary"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Binary entrypoint for the radar ingest daemon."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use radar_common::{init_tracing, AppConfig, LogFormat};
use radar_ingest::{MessageHandler, TelemetryHandler, UdpIngest};
use radar_metrics::{new_registry, spawn_http_server, DaemonMetrics, IngestMetrics, SharedRegistry};
use tokio::signal;
use tracing::info;

const CONFIG_CANDIDATES: [&str; 2] = ["configs/radard.toml", "/etc/radar/radard.toml"];

#[derive(Debug, Parser)]
#[command(author, version, about = "Radar telemetry ingest daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Address to bind the UDP ingest socket on")]
    host: Option<IpAddr>,

    #[arg(long, help = "UDP port for incoming telemetry")]
    port: Option<u16>,

    #[arg(long, value_name = "ADDR", help = "Listen address of the /metrics endpoint")]
    metrics_listen: Option<SocketAddr>,

    #[arg(long, help = "Disable the Prometheus exporter")]
    no_metrics: bool,

    #[arg(long, value_enum, help = "Override the stdout log format")]
    log_format: Option<CliLogFormat>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Json,
    Pretty,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Json => LogFormat::StructuredJson,
            CliLogFormat::Pretty => LogFormat::Pretty,
        }
    }
}

impl Cli {
    fn config_candidates(&self) -> Vec<PathBuf> {
        self.config
            .iter()
            .cloned()
            .chain(CONFIG_CANDIDATES.iter().map(PathBuf::from))
            .collect()
    }

    /// Flags win over the file and environment.
    fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(host) = self.host {
            config.ingest.host = host;
        }
        if let Some(port) = self.port {
            config.ingest.port = port;
        }
        if let Some(listen) = self.metrics_listen {
            config.metrics.listen = listen;
        }
        if self.no_metrics {
            config.metrics.enabled = false;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format.into();
        }
        config.validate()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&cli.config_candidates())?;
    let mut config = loaded.config;
    cli.apply(&mut config)?;
    let load_duration = load_started.elapsed();

    init_tracing("radard", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; running with defaults"),
    }

    let registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(registry.clone())?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());
    daemon_metrics.inc_start();
    daemon_metrics.set_build_info(env!("CARGO_PKG_VERSION"), build_profile());

    run_daemon(config, registry).await
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

async fn run_daemon(config: AppConfig, registry: SharedRegistry) -> Result<()> {
    let metrics_server = if config.metrics.enabled {
        Some(spawn_http_server(registry.clone(), config.metrics.listen)?)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let ingest_metrics = IngestMetrics::register(&registry)?;
    let handler: Arc<dyn MessageHandler> = Arc::new(TelemetryHandler::register(&registry)?);
    let recv_buffer = NonZeroUsize::new(config.ingest.recv_buffer_bytes)
        .context("ingest recv_buffer_bytes must be greater than zero")?;
    let ingest = UdpIngest::bind(config.ingest.listen_addr(), handler, ingest_metrics.clone())
        .await?
        .with_recv_buffer(recv_buffer)
        .spawn();

    info!(address = %ingest.local_addr(), "daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    ingest.shutdown().await?;

    let counts = ingest_metrics.snapshot();
    info!(
        received = counts.received,
        malformed = counts.malformed,
        invalid = counts.invalid,
        "ingest socket closed"
    );

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_is_tried_first() {
        let cli = Cli::parse_from(["radard", "--config", "custom.toml"]);
        let candidates = cli.config_candidates();
        assert_eq!(candidates[0], PathBuf::from("custom.toml"));
        assert_eq!(candidates.len(), CONFIG_CANDIDATES.len() + 1);
    }

    #[test]
    fn flags_override_loaded_config() {
        let cli = Cli::parse_from([
            "radard",
            "--host",
            "127.0.0.1",
            "--port",
            "7100",
            "--metrics-listen",
            "127.0.0.1:9200",
            "--log-format",
            "pretty",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config).unwrap();
        assert_eq!(config.ingest.listen_addr(), "127.0.0.1:7100".parse::<SocketAddr>().unwrap());
        assert_eq!(config.metrics.listen, "127.0.0.1:9200".parse::<SocketAddr>().unwrap());
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn no_metrics_disables_exporter() {
        let cli = Cli::parse_from(["radard", "--no-metrics"]);
        let mut config = AppConfig::default();
        cli.apply(&mut config).unwrap();
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn unset_flags_keep_file_values() {
        let cli = Cli::parse_from(["radard"]);
        let mut config: AppConfig = "[ingest]\nport = 6000\n[logging]\nformat = \"pretty\""
            .parse()
            .unwrap();
        cli.apply(&mut config).unwrap();
        assert_eq!(config.ingest.port, 6000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.metrics.enabled);
    }
}
