//! ---
//! radar_section: "04-ingest-runtime"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "UDP ingest runtime for radar telemetry."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
//! Datagram receiver and handler seam.
//!
//! [`UdpIngest`] reads one datagram at a time and spawns a task per datagram
//! that classifies, validates and hands the result to a [`MessageHandler`].
//! Receipt and failure counters live in the caller-supplied
//! [`radar_metrics::IngestMetrics`].

pub mod handler;
pub mod receiver;

pub use handler::{MessageHandler, TelemetryHandler};
pub use receiver::{IngestError, IngestHandle, ReceiverState, UdpIngest, DEFAULT_RECV_BUFFER};
