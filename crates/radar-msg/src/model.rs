//! ---
//! radar_section: "02-messaging-data-model"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Validated radar payload models."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::validation::{Constraint, FieldReader, FieldViolation, JsonObject, ValidationFailure};

/// Slant range limits in metres.
pub const RANGE_M_LIMITS: (f64, f64) = (0.0, 30_000.0);
/// Azimuth limits in degrees.
pub const AZ_DEG_LIMITS: (f64, f64) = (-180.0, 180.0);
/// Elevation limits in degrees.
pub const EL_DEG_LIMITS: (f64, f64) = (-10.0, 90.0);
/// Internal temperature limits in degrees Celsius.
pub const TEMPERATURE_C_LIMITS: (f64, f64) = (-40.0, 125.0);
/// Supply voltage limits in volts.
pub const SUPPLY_V_LIMITS: (f64, f64) = (9.0, 36.0);
/// CPU load limits in percent.
pub const CPU_LOAD_PCT_LIMITS: (f64, f64) = (0.0, 100.0);

/// Operating mode reported by the radar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RadarMode {
    /// Power-on initialisation.
    Boot,
    /// Powered, not transmitting.
    Standby,
    /// Transmitting and tracking.
    Operational,
    /// Self-test reported a fault.
    Fault,
}

impl RadarMode {
    /// Wire names of every mode, matched exactly and case-sensitively.
    pub const NAMES: &'static [&'static str] = &["BOOT", "STANDBY", "OPERATIONAL", "FAULT"];

    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            RadarMode::Boot => "BOOT",
            RadarMode::Standby => "STANDBY",
            RadarMode::Operational => "OPERATIONAL",
            RadarMode::Fault => "FAULT",
        }
    }
}

impl fmt::Display for RadarMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mode name outside [`RadarMode::NAMES`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown radar mode: {0}")]
pub struct UnknownRadarMode(pub String);

impl FromStr for RadarMode {
    type Err = UnknownRadarMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOOT" => Ok(RadarMode::Boot),
            "STANDBY" => Ok(RadarMode::Standby),
            "OPERATIONAL" => Ok(RadarMode::Operational),
            "FAULT" => Ok(RadarMode::Fault),
            other => Err(UnknownRadarMode(other.to_owned())),
        }
    }
}

/// A single radar detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonObject")]
pub struct Track {
    ts: DateTime<Utc>,
    id: u64,
    range_m: f64,
    az_deg: f64,
    el_deg: f64,
    vr_mps: f64,
    snr_db: f64,
}

impl Track {
    /// Field names every track must carry.
    pub const FIELDS: [&'static str; 7] = [
        "ts", "id", "range_m", "az_deg", "el_deg", "vr_mps", "snr_db",
    ];

    /// Construct a track from already-typed values, applying the same bounds as the wire path.
    pub fn new(
        ts: DateTime<Utc>,
        id: u64,
        range_m: f64,
        az_deg: f64,
        el_deg: f64,
        vr_mps: f64,
        snr_db: f64,
    ) -> Result<Self, ValidationFailure> {
        let mut object = JsonObject::new();
        object.insert("ts".into(), JsonValue::String(ts.to_rfc3339()));
        object.insert("id".into(), id.into());
        object.insert("range_m".into(), number(range_m));
        object.insert("az_deg".into(), number(az_deg));
        object.insert("el_deg".into(), number(el_deg));
        object.insert("vr_mps".into(), number(vr_mps));
        object.insert("snr_db".into(), number(snr_db));
        Self::from_object(&object)
    }

    /// Validate a decoded JSON object as a track.
    pub fn from_object(object: &JsonObject) -> Result<Self, ValidationFailure> {
        let mut reader = FieldReader::new(object);
        let fields = (
            reader.timestamp("ts"),
            reader.unsigned("id"),
            reader.bounded("range_m", RANGE_M_LIMITS.0, RANGE_M_LIMITS.1),
            reader.bounded("az_deg", AZ_DEG_LIMITS.0, AZ_DEG_LIMITS.1),
            reader.bounded("el_deg", EL_DEG_LIMITS.0, EL_DEG_LIMITS.1),
            reader.number("vr_mps"),
            reader.number("snr_db"),
        );
        let failure = reader.into_failure();
        match fields {
            (
                Some(ts),
                Some(id),
                Some(range_m),
                Some(az_deg),
                Some(el_deg),
                Some(vr_mps),
                Some(snr_db),
            ) if failure.is_empty() => Ok(Self {
                ts,
                id,
                range_m,
                az_deg,
                el_deg,
                vr_mps,
                snr_db,
            }),
            _ => Err(failure),
        }
    }

    /// Detection timestamp.
    pub fn ts(&self) -> DateTime<Utc> {
        self.ts
    }

    /// Track identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Slant range in metres.
    pub fn range_m(&self) -> f64 {
        self.range_m
    }

    /// Azimuth in degrees.
    pub fn az_deg(&self) -> f64 {
        self.az_deg
    }

    /// Elevation in degrees.
    pub fn el_deg(&self) -> f64 {
        self.el_deg
    }

    /// Radial velocity in metres per second.
    pub fn vr_mps(&self) -> f64 {
        self.vr_mps
    }

    /// Signal-to-noise ratio in decibels.
    pub fn snr_db(&self) -> f64 {
        self.snr_db
    }
}

impl TryFrom<JsonObject> for Track {
    type Error = ValidationFailure;

    fn try_from(object: JsonObject) -> Result<Self, Self::Error> {
        Self::from_object(&object)
    }
}

/// Radar subsystem self-report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonObject")]
pub struct HealthStatus {
    ts: DateTime<Utc>,
    radar_mode: RadarMode,
    temperature_c: f64,
    supply_v: f64,
    cpu_load_pct: f64,
}

impl HealthStatus {
    /// Keys whose joint presence identifies a health report on the wire.
    pub const REQUIRED_KEYS: [&'static str; 4] =
        ["radar_mode", "temperature_c", "supply_v", "cpu_load_pct"];

    /// Construct a health report from typed values, applying the wire bounds.
    pub fn new(
        ts: DateTime<Utc>,
        radar_mode: RadarMode,
        temperature_c: f64,
        supply_v: f64,
        cpu_load_pct: f64,
    ) -> Result<Self, ValidationFailure> {
        let mut object = JsonObject::new();
        object.insert("ts".into(), JsonValue::String(ts.to_rfc3339()));
        object.insert("radar_mode".into(), radar_mode.as_str().into());
        object.insert("temperature_c".into(), number(temperature_c));
        object.insert("supply_v".into(), number(supply_v));
        object.insert("cpu_load_pct".into(), number(cpu_load_pct));
        Self::from_object(&object)
    }

    /// Validate a decoded JSON object as a health report.
    pub fn from_object(object: &JsonObject) -> Result<Self, ValidationFailure> {
        let mut reader = FieldReader::new(object);
        let fields = (
            reader.timestamp("ts"),
            reader
                .one_of("radar_mode", RadarMode::NAMES)
                .and_then(|name| name.parse::<RadarMode>().ok()),
            reader.bounded(
                "temperature_c",
                TEMPERATURE_C_LIMITS.0,
                TEMPERATURE_C_LIMITS.1,
            ),
            reader.bounded("supply_v", SUPPLY_V_LIMITS.0, SUPPLY_V_LIMITS.1),
            reader.bounded(
                "cpu_load_pct",
                CPU_LOAD_PCT_LIMITS.0,
                CPU_LOAD_PCT_LIMITS.1,
            ),
        );
        let failure = reader.into_failure();
        match fields {
            (Some(ts), Some(radar_mode), Some(temperature_c), Some(supply_v), Some(cpu_load_pct))
                if failure.is_empty() =>
            {
                Ok(Self {
                    ts,
                    radar_mode,
                    temperature_c,
                    supply_v,
                    cpu_load_pct,
                })
            }
            _ => Err(failure),
        }
    }

    /// Report timestamp.
    pub fn ts(&self) -> DateTime<Utc> {
        self.ts
    }

    /// Radar operating mode.
    pub fn radar_mode(&self) -> RadarMode {
        self.radar_mode
    }

    /// Internal temperature in degrees Celsius.
    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    /// Supply voltage in volts.
    pub fn supply_v(&self) -> f64 {
        self.supply_v
    }

    /// CPU load in percent.
    pub fn cpu_load_pct(&self) -> f64 {
        self.cpu_load_pct
    }
}

impl TryFrom<JsonObject> for HealthStatus {
    type Error = ValidationFailure;

    fn try_from(object: JsonObject) -> Result<Self, Self::Error> {
        Self::from_object(&object)
    }
}

/// A batch of tracks delivered in one datagram.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Frame {
    tracks: Vec<Track>,
}

impl Frame {
    /// Reserved key holding the batched tracks.
    pub const TRACKS_KEY: &'static str = "tracks";

    /// Wrap tracks that were already validated.
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Validate the track list of a frame object. Any bad element rejects the whole frame.
    pub fn from_object(object: &JsonObject) -> Result<Self, ValidationFailure> {
        let (constraint, value) = match object.get(Self::TRACKS_KEY) {
            Some(JsonValue::Array(items)) => return Self::from_values(items),
            Some(other) => (Constraint::Array, Some(other.clone())),
            None => (Constraint::Required, None),
        };
        let mut failure = ValidationFailure::default();
        failure.push(FieldViolation {
            field: Self::TRACKS_KEY.to_owned(),
            constraint,
            value,
        });
        Err(failure)
    }

    fn from_values(items: &[JsonValue]) -> Result<Self, ValidationFailure> {
        let mut tracks = Vec::with_capacity(items.len());
        let mut failure = ValidationFailure::default();
        for (index, item) in items.iter().enumerate() {
            let path = format!("{}[{}]", Self::TRACKS_KEY, index);
            match item {
                JsonValue::Object(object) => match Track::from_object(object) {
                    Ok(track) => tracks.push(track),
                    Err(err) => failure.absorb(&path, err),
                },
                other => failure.push(FieldViolation {
                    field: path,
                    constraint: Constraint::Object,
                    value: Some(other.clone()),
                }),
            }
        }
        if failure.is_empty() {
            Ok(Self { tracks })
        } else {
            Err(failure)
        }
    }

    /// Tracks in wire order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the frame carries no tracks.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

fn number(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}
