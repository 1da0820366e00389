//! Console rendering: a level badge before the message, and a framed box
//! for the `box` level.

use serde_json::Value;

use super::{Rendered, ScribeFormatter};
use crate::log_record::{BOX_TITLE_KEY, Metadata, ScribeRecord};

const BOX_PADDING: usize = 2;

fn badge(level: &str) -> Option<&'static str> {
    match level {
        "error" => Some("✖"),
        "warn" => Some("⚠"),
        "info" | "verbose" => Some("ℹ"),
        "debug" => Some("⚙"),
        "success" => Some("✔"),
        _ => None,
    }
}

/// Draw `body` inside a double-line frame, with an optional title row.
fn framed(title: Option<&str>, body: &str) -> String {
    let mut rows: Vec<&str> = Vec::new();
    if let Some(title) = title {
        rows.push(title);
        rows.push("");
    }
    rows.extend(body.lines());
    if rows.is_empty() {
        rows.push("");
    }

    let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) + BOX_PADDING * 2;
    let pad = " ".repeat(BOX_PADDING);
    let mut out = format!("╔{}╗\n", "═".repeat(width));
    for row in rows {
        let fill = width - BOX_PADDING - row.chars().count();
        out.push_str(&format!("║{pad}{row}{}║\n", " ".repeat(fill)));
    }
    out.push_str(&format!("╚{}╝", "═".repeat(width)));
    out
}

#[derive(Copy, Clone, Debug, Default)]
pub struct ConsoleFormatter;

impl ScribeFormatter for ConsoleFormatter {
    fn render(&self, record: &ScribeRecord) -> Rendered {
        let meta = record.metadata();
        if record.level() == "box" {
            let title = meta.field(BOX_TITLE_KEY).and_then(Value::as_str);
            return Rendered::Text(framed(title, record.message()));
        }

        let mut out = match badge(record.level()) {
            Some(badge) => format!("{badge} {}", record.message()),
            None => record.message().to_owned(),
        };
        if record.level() == "error"
            && let Metadata::Fields(map) = meta.payload()
        {
            out.push('\n');
            out.push_str(
                &serde_json::to_string_pretty(&map).unwrap_or_else(|_| format!("{map:?}")),
            );
        }
        Rendered::Text(out)
    }
}
