//! ---
//! radar_section: "02-messaging-data-model"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Radar payload models and packet classification."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
//! Validated radar telemetry payloads and the datagram classifier.
//!
//! Payload values are immutable once built: every constructor runs the full
//! validation contract, so a [`Track`], [`HealthStatus`] or [`Frame`] in hand
//! always satisfies its bounds.
#![warn(missing_docs)]

pub mod model;
pub mod parser;
pub mod validation;

pub use model::{Frame, HealthStatus, RadarMode, Track, UnknownRadarMode};
pub use parser::{
    classify, parse_packet, parse_value, MalformedError, MessageKind, PacketError, ParsedMessage,
};
pub use validation::{Constraint, FieldViolation, JsonObject, ValidationFailure};
