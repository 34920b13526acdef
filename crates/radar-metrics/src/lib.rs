//! ---
//! radar_section: "03-persistence-logging"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Metrics collection and export utilities."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{
    Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across components.
pub type SharedRegistry = Arc<Registry>;

/// Failure label for datagrams that are not UTF-8 JSON.
pub const REASON_MALFORMED: &str = "malformed";
/// Failure label for well-formed datagrams that fail validation.
pub const REASON_INVALID: &str = "invalid";

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let bound = std_listener
        .local_addr()
        .with_context(|| "failed to read metrics listener address")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %bound, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr: bound,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(prometheus::TEXT_FORMAT),
            )],
            body,
        ),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                )],
                String::from("metrics encoding error"),
            )
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Bound address; resolves port `0` to the one the OS picked.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Point-in-time view of the receiver counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestCounts {
    pub received: u64,
    pub malformed: u64,
    pub invalid: u64,
}

impl IngestCounts {
    pub fn failed(&self) -> u64 {
        self.malformed + self.invalid
    }
}

/// Datagram and failure counters owned by one receiver.
#[derive(Clone, Debug)]
pub struct IngestMetrics {
    datagrams_total: IntCounter,
    failures_total: IntCounterVec,
}

impl IngestMetrics {
    pub fn register(registry: &Registry) -> Result<Self> {
        let datagrams_total = IntCounter::with_opts(Opts::new(
            "radar_ingest_datagrams_total",
            "Datagrams read from the ingest socket, counted before parsing",
        ))?;
        registry.register(Box::new(datagrams_total.clone()))?;

        let failures_total = IntCounterVec::new(
            Opts::new(
                "radar_ingest_failures_total",
                "Datagrams discarded because they were malformed or failed validation",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(failures_total.clone()))?;
        // Expose both series at zero from the first scrape.
        for reason in [REASON_MALFORMED, REASON_INVALID] {
            failures_total.with_label_values(&[reason]);
        }

        Ok(Self {
            datagrams_total,
            failures_total,
        })
    }

    pub fn observe_received(&self) {
        self.datagrams_total.inc();
    }

    pub fn observe_failure(&self, reason: &str) {
        self.failures_total.with_label_values(&[reason]).inc();
    }

    pub fn snapshot(&self) -> IngestCounts {
        IngestCounts {
            received: self.datagrams_total.get(),
            malformed: self
                .failures_total
                .with_label_values(&[REASON_MALFORMED])
                .get(),
            invalid: self.failures_total.with_label_values(&[REASON_INVALID]).get(),
        }
    }

    /// Total failures across every reason.
    pub fn failed(&self) -> u64 {
        self.snapshot().failed()
    }
}

/// Collectors updated by the telemetry handler.
#[derive(Clone, Debug)]
pub struct TelemetryMetrics {
    temperature_c: Gauge,
    cpu_pct: Gauge,
    packets_total: IntCounterVec,
}

impl TelemetryMetrics {
    pub fn register(registry: &Registry) -> Result<Self> {
        let temperature_c = Gauge::with_opts(Opts::new(
            "radar_temperature_c",
            "Last reported radar temperature in degrees Celsius",
        ))?;
        registry.register(Box::new(temperature_c.clone()))?;

        let cpu_pct = Gauge::with_opts(Opts::new(
            "radar_cpu_pct",
            "Last reported radar CPU load in percent",
        ))?;
        registry.register(Box::new(cpu_pct.clone()))?;

        let packets_total = IntCounterVec::new(
            Opts::new("radar_packets_total", "Handled telemetry messages by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(packets_total.clone()))?;

        Ok(Self {
            temperature_c,
            cpu_pct,
            packets_total,
        })
    }

    pub fn record_packet(&self, kind: &str) {
        self.packets_total.with_label_values(&[kind]).inc();
    }

    pub fn set_health(&self, temperature_c: f64, cpu_pct: f64) {
        self.temperature_c.set(temperature_c);
        self.cpu_pct.set(cpu_pct);
    }

    pub fn packets(&self, kind: &str) -> u64 {
        self.packets_total.with_label_values(&[kind]).get()
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature_c.get()
    }

    pub fn cpu_pct(&self) -> f64 {
        self.cpu_pct.get()
    }
}

/// Metrics recorded by the daemon process itself.
#[derive(Clone)]
pub struct DaemonMetrics {
    starts_total: IntCounter,
    config_load_seconds: Histogram,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let starts_total = IntCounter::with_opts(Opts::new(
            "radard_starts_total",
            "Total number of times the radar ingest daemon has initialised",
        ))?;
        registry.register(Box::new(starts_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.0005, 2.0, 12)
            .context("failed to construct histogram buckets")?;
        let config_load_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "radard_config_load_seconds",
                "Time spent loading and validating configuration",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(config_load_seconds.clone()))?;

        let build_info = GaugeVec::new(
            Opts::new("radard_build_info", "Build metadata for the running daemon"),
            &["version", "profile"],
        )?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            starts_total,
            config_load_seconds,
            build_info,
        })
    }

    pub fn inc_start(&self) {
        self.starts_total.inc();
    }

    pub fn observe_config_load(&self, seconds: f64) {
        self.config_load_seconds.observe(seconds);
    }

    pub fn set_build_info(&self, version: &str, profile: &str) {
        self.build_info
            .with_label_values(&[version, profile])
            .set(1.0);
    }
}

pub use prometheus;
