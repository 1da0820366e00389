//! Human-readable single-line renderers.

use chrono::Local;

use super::{Rendered, ScribeFormatter};
use crate::{
    chrono_fmt::us_time,
    log_record::{Metadata, ScribeRecord},
};

fn local_time(record: &ScribeRecord, include_seconds: bool) -> String {
    us_time(&record.timestamp().with_timezone(&Local), include_seconds)
}

fn pretty_json(map: &serde_json::Map<String, serde_json::Value>) -> String {
    serde_json::to_string_pretty(map).unwrap_or_else(|_| format!("{map:?}"))
}

/// `prefix -> message data -| 9:05:07 AM |-`
///
/// Records without a payload render just the (prefixed) message. Text
/// payloads are appended inline before the time; structured payloads follow
/// the time as indented JSON on the next line. A `dontTimestamp: true` field
/// suppresses the time.
#[derive(Copy, Clone, Debug, Default)]
pub struct PrettyFormatter;

impl ScribeFormatter for PrettyFormatter {
    fn render(&self, record: &ScribeRecord) -> Rendered {
        let meta = record.metadata();
        let mut out = String::new();
        if let Some(prefix) = meta.prefix() {
            out.push_str(prefix);
            out.push_str(" -> ");
        }
        out.push_str(record.message());

        let stamp = (!meta.suppress_timestamp())
            .then(|| format!(" -| {} |-", local_time(record, true)));
        match meta.payload() {
            Metadata::Absent => {}
            Metadata::Text(data) => {
                out.push(' ');
                out.push_str(&data);
                out.push_str(stamp.as_deref().unwrap_or_default());
            }
            Metadata::Fields(map) => {
                out.push_str(stamp.as_deref().unwrap_or_default());
                out.push('\n');
                out.push_str(&pretty_json(&map));
            }
        }
        Rendered::Text(out.trim().to_owned())
    }
}

/// `[LEVEL]: message data -| 9:05 AM |-`, or `prefix-[LEVEL]-> ...` when a
/// prefix is supplied.
#[derive(Copy, Clone, Debug, Default)]
pub struct LevelPrettyFormatter;

impl ScribeFormatter for LevelPrettyFormatter {
    fn render(&self, record: &ScribeRecord) -> Rendered {
        let meta = record.metadata();
        let level = record.level().to_uppercase();
        let head = match meta.prefix() {
            Some(prefix) => format!("{prefix}-[{level}]->"),
            None => format!("[{level}]:"),
        };
        let data = match meta.payload() {
            Metadata::Absent => String::new(),
            Metadata::Text(text) => format!(" {text}"),
            Metadata::Fields(map) => format!(" {}", serde_json::Value::Object(map)),
        };
        Rendered::Text(format!(
            "{head} {}{data} -| {} |-",
            record.message(),
            local_time(record, false)
        ))
    }
}
