//! ---
//! radar_section: "02-messaging-data-model"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Datagram classification and parsing into typed messages."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
//! Turns one raw UDP payload into one validated [`ParsedMessage`].
//!
//! The wire format carries no type tag. Shapes are told apart by an ordered
//! chain of structural predicates over the top-level keys; the first match
//! wins and anything unmatched is validated as a [`Track`]:
//!
//! 1. `tracks` holds an array: [`Frame`]
//! 2. keys include every [`HealthStatus::REQUIRED_KEYS`]: [`HealthStatus`]
//! 3. otherwise: [`Track`]
//!
//! A new shape must be added to [`SHAPES`] in the position that keeps the
//! existing outcomes unchanged.
use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::model::{Frame, HealthStatus, Track};
use crate::validation::{JsonObject, ValidationFailure};

/// Discriminant of a parsed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Single detection.
    Track,
    /// Subsystem health report.
    Health,
    /// Batch of detections.
    Frame,
}

impl MessageKind {
    /// Stable lowercase label used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Track => "track",
            MessageKind::Health => "health",
            MessageKind::Frame => "frame",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated payload of one datagram, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ParsedMessage {
    /// Single detection.
    Track(Track),
    /// Subsystem health report.
    Health(HealthStatus),
    /// Batch of detections.
    Frame(Frame),
}

impl ParsedMessage {
    /// Discriminant of the payload.
    pub fn kind(&self) -> MessageKind {
        match self {
            ParsedMessage::Track(_) => MessageKind::Track,
            ParsedMessage::Health(_) => MessageKind::Health,
            ParsedMessage::Frame(_) => MessageKind::Frame,
        }
    }
}

/// Why a datagram could not be decoded at all.
#[derive(Debug, thiserror::Error)]
pub enum MalformedError {
    /// The payload is not UTF-8 text.
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// The payload is not syntactically valid JSON.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-datagram parse failure.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// Not UTF-8 or not JSON.
    #[error("malformed packet: {0}")]
    Malformed(#[from] MalformedError),
    /// Well-formed JSON that fails domain validation for the classified kind.
    #[error("invalid {kind} packet: {failure}")]
    Invalid {
        /// Kind the classifier selected.
        kind: MessageKind,
        /// Every violated field.
        #[source]
        failure: ValidationFailure,
    },
}

impl PacketError {
    /// Stable label used for failure metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            PacketError::Malformed(_) => "malformed",
            PacketError::Invalid { .. } => "invalid",
        }
    }

    /// Validation details when the packet was well-formed.
    pub fn validation(&self) -> Option<&ValidationFailure> {
        match self {
            PacketError::Malformed(_) => None,
            PacketError::Invalid { failure, .. } => Some(failure),
        }
    }
}

/// Structural test over the top-level keys of a decoded object.
pub type ShapePredicate = fn(&JsonObject) -> bool;

/// Ordered classification chain; [`MessageKind::Track`] is the fallback.
pub const SHAPES: [(MessageKind, ShapePredicate); 2] = [
    (MessageKind::Frame, has_track_list),
    (MessageKind::Health, has_health_keys),
];

fn has_track_list(object: &JsonObject) -> bool {
    matches!(object.get(Frame::TRACKS_KEY), Some(JsonValue::Array(_)))
}

fn has_health_keys(object: &JsonObject) -> bool {
    HealthStatus::REQUIRED_KEYS
        .iter()
        .all(|key| object.contains_key(*key))
}

/// Select the message kind for a decoded object. Pure key-set inspection.
pub fn classify(object: &JsonObject) -> MessageKind {
    SHAPES
        .iter()
        .find(|(_, matches)| matches(object))
        .map(|(kind, _)| *kind)
        .unwrap_or(MessageKind::Track)
}

/// Decode, classify and validate one datagram payload.
pub fn parse_packet(packet: &[u8]) -> Result<ParsedMessage, PacketError> {
    let text = std::str::from_utf8(packet).map_err(MalformedError::from)?;
    let value: JsonValue = serde_json::from_str(text).map_err(MalformedError::from)?;
    parse_value(value)
}

/// Classify and validate an already-decoded JSON value.
pub fn parse_value(value: JsonValue) -> Result<ParsedMessage, PacketError> {
    // Non-object documents fall through to the track branch of the chain.
    let object = match value {
        JsonValue::Object(object) => object,
        other => {
            return Err(PacketError::Invalid {
                kind: MessageKind::Track,
                failure: ValidationFailure::not_an_object("$", &other),
            })
        }
    };

    let kind = classify(&object);
    let parsed = match kind {
        MessageKind::Frame => Frame::from_object(&object).map(ParsedMessage::Frame),
        MessageKind::Health => HealthStatus::from_object(&object).map(ParsedMessage::Health),
        MessageKind::Track => Track::from_object(&object).map(ParsedMessage::Track),
    };
    parsed.map_err(|failure| PacketError::Invalid { kind, failure })
}
