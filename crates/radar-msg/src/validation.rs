//! ---
//! radar_section: "02-messaging-data-model"
//! radar_subsection: "module"
//! radar_type: "source"
//! radar_scope: "code"
//! radar_description: "Field-level validation primitives for radar payloads."
//! radar_version: "v0.0.0-prealpha"
//! radar_owner: "tbd"
//! ---
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

/// JSON object as delivered on the wire.
pub type JsonObject = serde_json::Map<String, JsonValue>;

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Constraint that a field failed to satisfy.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// The field is absent.
    Required,
    /// The value must be a JSON number.
    Number,
    /// The value must be an integral JSON number.
    Integer,
    /// The value must be a JSON string.
    Text,
    /// The value must be a JSON object.
    Object,
    /// The value must be a JSON array.
    Array,
    /// The value must parse as a timestamp with an explicit or inferable UTC offset.
    Timestamp,
    /// Inclusive lower bound.
    AtLeast(f64),
    /// Inclusive range.
    Between {
        /// Inclusive minimum.
        min: f64,
        /// Inclusive maximum.
        max: f64,
    },
    /// Exact membership in a closed set of strings.
    OneOf(&'static [&'static str]),
}

impl Constraint {
    /// Short stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Constraint::Required => "required",
            Constraint::Number => "number",
            Constraint::Integer => "integer",
            Constraint::Text => "string",
            Constraint::Object => "object",
            Constraint::Array => "array",
            Constraint::Timestamp => "timestamp",
            Constraint::AtLeast(_) => "minimum",
            Constraint::Between { .. } => "range",
            Constraint::OneOf(_) => "one_of",
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Required => f.write_str("field required"),
            Constraint::Number => f.write_str("must be a number"),
            Constraint::Integer => f.write_str("must be an integer"),
            Constraint::Text => f.write_str("must be a string"),
            Constraint::Object => f.write_str("must be a JSON object"),
            Constraint::Array => f.write_str("must be a JSON array"),
            Constraint::Timestamp => f.write_str("must be a timestamp with a UTC offset"),
            Constraint::AtLeast(min) => write!(f, "must be >= {min}"),
            Constraint::Between { min, max } => write!(f, "must be within [{min}, {max}]"),
            Constraint::OneOf(values) => write!(f, "must be one of {}", values.join("|")),
        }
    }
}

/// A single rejected field together with the offending value, if any was supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    /// Field path, e.g. `range_m` or `tracks[1].az_deg`.
    pub field: String,
    /// Constraint the value violated.
    pub constraint: Constraint,
    /// Offending value; `None` when the field was missing.
    pub value: Option<JsonValue>,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.constraint)?;
        if let Some(value) = &self.value {
            write!(f, " (got {value})")?;
        }
        Ok(())
    }
}

/// Every violated field of one payload. Never constructed empty by the model.
#[derive(Debug, Clone, PartialEq, Default, thiserror::Error)]
#[error("{}", describe(.violations))]
pub struct ValidationFailure {
    violations: Vec<FieldViolation>,
}

impl ValidationFailure {
    /// Failure for a payload that is not a JSON object at all.
    pub fn not_an_object(field: impl Into<String>, value: &JsonValue) -> Self {
        Self {
            violations: vec![FieldViolation {
                field: field.into(),
                constraint: Constraint::Object,
                value: Some(value.clone()),
            }],
        }
    }

    /// Violations in the order the fields were checked.
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    /// Names of the violated fields.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|violation| violation.field.as_str())
    }

    /// Whether the given field path was rejected.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields().any(|name| name == field)
    }

    /// Whether no violation was recorded.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub(crate) fn push(&mut self, violation: FieldViolation) {
        self.violations.push(violation);
    }

    /// Merge another failure under a path prefix such as `tracks[2]`.
    pub(crate) fn absorb(&mut self, prefix: &str, other: ValidationFailure) {
        for mut violation in other.violations {
            violation.field = format!("{prefix}.{}", violation.field);
            self.violations.push(violation);
        }
    }
}

fn describe(violations: &[FieldViolation]) -> String {
    let noun = if violations.len() == 1 { "error" } else { "errors" };
    let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
    format!("{} validation {noun}: {}", violations.len(), details.join("; "))
}

/// Reads typed fields from a JSON object, recording a violation for every miss.
///
/// Each accessor returns `None` exactly when it has recorded a violation, so a
/// payload may be assembled once every accessor returned `Some`.
pub(crate) struct FieldReader<'a> {
    object: &'a JsonObject,
    failure: ValidationFailure,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(object: &'a JsonObject) -> Self {
        Self {
            object,
            failure: ValidationFailure::default(),
        }
    }

    pub(crate) fn into_failure(self) -> ValidationFailure {
        self.failure
    }

    fn reject(&mut self, field: &str, constraint: Constraint, value: Option<&JsonValue>) {
        self.failure.push(FieldViolation {
            field: field.to_owned(),
            constraint,
            value: value.cloned(),
        });
    }

    fn require(&mut self, field: &str) -> Option<&'a JsonValue> {
        let value = self.object.get(field);
        if value.is_none() {
            self.reject(field, Constraint::Required, None);
        }
        value
    }

    pub(crate) fn timestamp(&mut self, field: &str) -> Option<DateTime<Utc>> {
        let value = self.require(field)?;
        let parsed = parse_timestamp(value);
        if parsed.is_none() {
            self.reject(field, Constraint::Timestamp, Some(value));
        }
        parsed
    }

    pub(crate) fn number(&mut self, field: &str) -> Option<f64> {
        let value = self.require(field)?;
        let number = value.as_f64();
        if number.is_none() {
            self.reject(field, Constraint::Number, Some(value));
        }
        number
    }

    pub(crate) fn bounded(&mut self, field: &str, min: f64, max: f64) -> Option<f64> {
        let number = self.number(field)?;
        if number < min || number > max {
            let value = self.object.get(field);
            self.reject(field, Constraint::Between { min, max }, value);
            return None;
        }
        Some(number)
    }

    pub(crate) fn unsigned(&mut self, field: &str) -> Option<u64> {
        let value = self.require(field)?;
        let JsonValue::Number(number) = value else {
            self.reject(field, Constraint::Integer, Some(value));
            return None;
        };
        if let Some(unsigned) = number.as_u64() {
            return Some(unsigned);
        }
        if number.is_i64() {
            self.reject(field, Constraint::AtLeast(0.0), Some(value));
            return None;
        }
        // Integral floats such as `7.0` are accepted.
        match number.as_f64() {
            Some(float) if float.fract() == 0.0 && float >= 0.0 && float < u64::MAX as f64 => {
                Some(float as u64)
            }
            Some(float) if float.fract() == 0.0 && float < 0.0 => {
                self.reject(field, Constraint::AtLeast(0.0), Some(value));
                None
            }
            _ => {
                self.reject(field, Constraint::Integer, Some(value));
                None
            }
        }
    }

    pub(crate) fn one_of(
        &mut self,
        field: &str,
        allowed: &'static [&'static str],
    ) -> Option<&'a str> {
        let value = self.require(field)?;
        let Some(text) = value.as_str() else {
            self.reject(field, Constraint::Text, Some(value));
            return None;
        };
        if !allowed.contains(&text) {
            self.reject(field, Constraint::OneOf(allowed), Some(value));
            return None;
        }
        Some(text)
    }
}

/// Parse a wire timestamp.
///
/// Accepts RFC 3339 (`Z` or numeric offset, `T` or space separator), naive
/// ISO-8601 date-times interpreted as UTC, and numeric Unix epoch seconds.
pub fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(text) => parse_timestamp_str(text),
        JsonValue::Number(number) => {
            let seconds = number.as_f64()?;
            if !seconds.is_finite() {
                return None;
            }
            let whole = seconds.floor();
            let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
            DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        }
        _ => None,
    }
}

fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn object(value: JsonValue) -> JsonObject {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn timestamps_accept_common_wire_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        for raw in [
            "2024-01-01T12:00:00Z",
            "2024-01-01T12:00:00+00:00",
            "2024-01-01T14:00:00+02:00",
            "2024-01-01 12:00:00+00:00",
            "2024-01-01T12:00:00",
        ] {
            assert_eq!(parse_timestamp(&json!(raw)), Some(expected), "{raw}");
        }
        assert_eq!(parse_timestamp(&json!(1_704_110_400)), Some(expected));
    }

    #[test]
    fn timestamps_reject_garbage() {
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!(true)), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
    }

    #[test]
    fn reader_records_every_violation() {
        let payload = object(json!({ "a": "x", "b": 500.0, "c": -3 }));
        let mut reader = FieldReader::new(&payload);
        assert!(reader.number("a").is_none());
        assert!(reader.bounded("b", 0.0, 100.0).is_none());
        assert!(reader.unsigned("c").is_none());
        assert!(reader.timestamp("missing").is_none());
        let failure = reader.into_failure();

        let constraints: Vec<_> = failure
            .violations()
            .iter()
            .map(|v| (v.field.as_str(), v.constraint.name()))
            .collect();
        assert_eq!(
            constraints,
            vec![
                ("a", "number"),
                ("b", "range"),
                ("c", "minimum"),
                ("missing", "required"),
            ]
        );
        assert_eq!(failure.violations()[3].value, None);
    }

    #[test]
    fn unsigned_accepts_integral_floats_only() {
        let payload = object(json!({ "whole": 7.0, "frac": 7.5, "neg": -2.0 }));
        let mut reader = FieldReader::new(&payload);
        assert_eq!(reader.unsigned("whole"), Some(7));
        assert_eq!(reader.unsigned("frac"), None);
        assert_eq!(reader.unsigned("neg"), None);
        let failure = reader.into_failure();
        assert_eq!(failure.violations()[0].constraint, Constraint::Integer);
        assert_eq!(failure.violations()[1].constraint, Constraint::AtLeast(0.0));
    }

    #[test]
    fn unsigned_rejects_floats_beyond_u64() {
        let payload = object(json!({ "edge": 18_446_744_073_709_551_616.0, "huge": 1e30 }));
        let mut reader = FieldReader::new(&payload);
        assert_eq!(reader.unsigned("edge"), None);
        assert_eq!(reader.unsigned("huge"), None);
        let failure = reader.into_failure();
        assert_eq!(failure.fields().collect::<Vec<_>>(), vec!["edge", "huge"]);
        assert!(failure
            .violations()
            .iter()
            .all(|v| v.constraint == Constraint::Integer));
    }

    #[test]
    fn failure_is_a_std_error() {
        let payload = object(json!({ "a": "x", "b": "y" }));
        let mut reader = FieldReader::new(&payload);
        reader.number("a");
        reader.number("b");
        let err: Box<dyn std::error::Error + Send + Sync> = Box::new(reader.into_failure());
        assert!(err.source().is_none());
        assert!(err.to_string().starts_with("2 validation errors: a: "));
        assert!(err.to_string().contains("; b: "));
    }

    #[test]
    fn failure_display_lists_fields() {
        let payload = object(json!({ "mode": "nope" }));
        let mut reader = FieldReader::new(&payload);
        reader.one_of("mode", &["A", "B"]);
        let failure = reader.into_failure();
        assert_eq!(
            failure.to_string(),
            "1 validation error: mode: must be one of A|B (got \"nope\")"
        );
    }
}
