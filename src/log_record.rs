//! Log record representation.
//!
//! A [`ScribeRecord`] is immutable once built. Pipeline stages that need to
//! change a record build a new one through the `with_*` methods, so one sink
//! rendering a record can never disturb another sink reading the same input.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Metadata keys with formatting meaning rather than payload meaning.
pub const PREFIX_KEY: &str = "prefix";
pub const SUPPRESS_TIMESTAMP_KEY: &str = "dontTimestamp";
pub const BOX_TITLE_KEY: &str = "name";

/// Payload attached to a record.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Metadata {
    /// No payload.
    #[default]
    Absent,
    /// A free-form string rendered inline after the message.
    Text(String),
    /// Structured fields merged into machine output and pretty-printed for
    /// humans.
    Fields(Map<String, Value>),
}

impl Metadata {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Return a structured field by key.
    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Fields(map) => map.get(key),
            _ => None,
        }
    }

    /// Prefix requested by the caller for pretty output.
    pub fn prefix(&self) -> Option<&str> {
        self.field(PREFIX_KEY).and_then(Value::as_str)
    }

    /// Whether pretty output should omit the trailing timestamp.
    pub fn suppress_timestamp(&self) -> bool {
        self.field(SUPPRESS_TIMESTAMP_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Payload with the formatting keys stripped.
    ///
    /// Returns [`Metadata::Absent`] when nothing but formatting keys remain.
    pub fn payload(&self) -> Metadata {
        match self {
            Self::Fields(map) => {
                let rest: Map<String, Value> = map
                    .iter()
                    .filter(|(k, _)| !matches!(k.as_str(), PREFIX_KEY | SUPPRESS_TIMESTAMP_KEY))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if rest.is_empty() {
                    Self::Absent
                } else {
                    Self::Fields(rest)
                }
            }
            other => other.clone(),
        }
    }
}

impl From<()> for Metadata {
    fn from(_: ()) -> Self {
        Self::Absent
    }
}

impl From<&str> for Metadata {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Metadata {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(value: Map<String, Value>) -> Self {
        Self::Fields(value)
    }
}

/// Objects become fields, strings become text, `null` is absent and any
/// other scalar or array is kept as its JSON text.
impl From<Value> for Metadata {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::String(s) => Self::Text(s),
            Value::Object(map) => Self::Fields(map),
            other => Self::Text(other.to_string()),
        }
    }
}

impl<T: Into<Metadata>> From<Option<T>> for Metadata {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScribeRecord {
    /// Service whose logger created this record.
    service: String,
    /// Lowercase level name; not guaranteed to exist in any table.
    level: String,
    message: String,
    metadata: Metadata,
    timestamp: DateTime<Utc>,
}

impl ScribeRecord {
    /// Construct a record stamped with the current time.
    pub fn new(service: &str, level: &str, message: &str) -> Self {
        Self {
            service: service.to_owned(),
            level: level.trim().to_ascii_lowercase(),
            message: message.to_owned(),
            metadata: Metadata::Absent,
            timestamp: Utc::now(),
        }
    }

    /// Return a copy carrying `metadata`.
    pub fn with_metadata(mut self, metadata: impl Into<Metadata>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Return a copy stamped with `timestamp`.
    pub fn with_timestamp(&self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for ScribeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.service, self.level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_is_normalised() {
        let record = ScribeRecord::new("api", " WARN ", "careful");
        assert_eq!(record.level(), "warn");
        assert_eq!(record.to_string(), "api [warn] careful");
    }

    #[test]
    fn with_timestamp_leaves_original_untouched() {
        let record = ScribeRecord::new("api", "info", "hello");
        let later = record.timestamp() + chrono::Duration::seconds(30);
        let stamped = record.with_timestamp(later);
        assert_eq!(stamped.timestamp(), later);
        assert_ne!(record.timestamp(), later);
        assert_eq!(stamped.message(), record.message());
    }

    #[test]
    fn json_values_map_onto_variants() {
        assert_eq!(Metadata::from(json!(null)), Metadata::Absent);
        assert_eq!(Metadata::from(json!("x")), Metadata::Text("x".into()));
        assert_eq!(Metadata::from(json!(3)), Metadata::Text("3".into()));
        assert!(matches!(
            Metadata::from(json!({"a": 1})),
            Metadata::Fields(_)
        ));
        assert_eq!(Metadata::from(None::<&str>), Metadata::Absent);
    }

    #[test]
    fn payload_strips_formatting_keys() {
        let meta = Metadata::from(json!({"prefix": "db", "dontTimestamp": true}));
        assert_eq!(meta.prefix(), Some("db"));
        assert!(meta.suppress_timestamp());
        assert_eq!(meta.payload(), Metadata::Absent);

        let meta = Metadata::from(json!({"prefix": "db", "rows": 3}));
        assert_eq!(meta.payload(), Metadata::from(json!({"rows": 3})));
    }
}
