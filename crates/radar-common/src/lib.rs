//! ---
//! radar_section: "01-core-functionality"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Shared primitives and utilities for the ingest runtime."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
//! Shared primitives for the radar ingest workspace: configuration loading
//! and tracing initialisation consumed by the daemon and tooling binaries.

pub mod config;
pub mod logging;

pub use config::{AppConfig, IngestConfig, LoadedAppConfig, LoggingConfig, MetricsConfig};
pub use logging::{init_tracing, LogFormat};
