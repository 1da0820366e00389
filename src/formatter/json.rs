//! Structured JSON rendering for machine sinks.

use chrono::Local;
use serde_json::{Map, Value};

use super::{Rendered, ScribeFormatter};
use crate::{
    chrono_fmt::us_date,
    log_record::{Metadata, ScribeRecord},
};

/// Renders `{level, message, service, timestamp, ...metadata}`.
///
/// Structured metadata is merged at the top level; text metadata lands in a
/// `data` field. The core keys always win over metadata keys of the same
/// name. The timestamp is rendered as a local US date to the minute.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonFormatter;

impl ScribeFormatter for JsonFormatter {
    fn render(&self, record: &ScribeRecord) -> Rendered {
        let mut object = match record.metadata() {
            Metadata::Fields(map) => map.clone(),
            Metadata::Text(text) => {
                let mut map = Map::new();
                map.insert("data".into(), Value::String(text.clone()));
                map
            }
            Metadata::Absent => Map::new(),
        };
        let local = record.timestamp().with_timezone(&Local);
        object.insert("level".into(), Value::from(record.level()));
        object.insert("message".into(), Value::from(record.message()));
        object.insert("service".into(), Value::from(record.service()));
        object.insert("timestamp".into(), Value::from(us_date(&local, false)));
        Rendered::Structured(Value::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn renders_core_fields() {
        let record = ScribeRecord::new("api", "error", "boom");
        let rendered = JsonFormatter.render(&record);
        let value = rendered.as_structured().expect("structured output");
        assert_eq!(value["level"], "error");
        assert_eq!(value["message"], "boom");
        assert_eq!(value["service"], "api");
        assert!(value["timestamp"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[test]
    fn timestamp_has_minute_precision() {
        let at = Utc
            .with_ymd_and_hms(2023, 1, 1, 9, 5, 7)
            .single()
            .expect("valid timestamp");
        let record = ScribeRecord::new("api", "info", "hi").with_timestamp(at);
        let rendered = JsonFormatter.render(&record);
        let expected = us_date(&at.with_timezone(&Local), false);
        assert_eq!(rendered.as_structured().expect("structured")["timestamp"], expected);
        assert!(!expected.contains(":07"));
    }

    #[test]
    fn merges_fields_without_overriding_core_keys() {
        let record = ScribeRecord::new("api", "info", "hi")
            .with_metadata(json!({"user": 7, "level": "spoofed"}));
        let rendered = JsonFormatter.render(&record);
        let value = rendered.as_structured().expect("structured output");
        assert_eq!(value["user"], 7);
        assert_eq!(value["level"], "info");
    }

    #[test]
    fn text_metadata_becomes_data_field() {
        let record = ScribeRecord::new("api", "info", "hi").with_metadata("ctx");
        let rendered = JsonFormatter.render(&record);
        assert_eq!(rendered.as_structured().expect("structured")["data"], "ctx");
    }
}
