//! ---
//! radar_section: "11-simulation"
//! radar_subsection: "01-bootstrap"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Simulator module exports."
//! radar_version: "v0.1.0"
//! radar_owner: "tbd"
//! ---
//! Synthetic radar telemetry for exercising the ingest path end to end.

pub mod generator;
pub mod sender;

pub use generator::TelemetryGenerator;
pub use sender::{SimulatorConfig, SimulatorStats, UdpSimulator};
