//! Render stages that turn a finished record into sink output.
//!
//! Provides the core [`ScribeFormatter`] trait, the [`Rendered`] output type
//! and the built-in renderers. Machine sinks receive
//! [`Rendered::Structured`]; human sinks receive [`Rendered::Text`].

use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::log_record::ScribeRecord;

mod console;
mod json;
mod pretty;

pub use console::ConsoleFormatter;
pub use json::JsonFormatter;
pub use pretty::{LevelPrettyFormatter, PrettyFormatter};

/// A record after its final render stage.
#[derive(Clone, Debug, PartialEq)]
pub enum Rendered {
    /// Structured payload for machine consumers.
    Structured(Value),
    /// Decorated text for human consumers.
    Text(String),
}

impl Rendered {
    /// Wire form: structured payloads serialise to compact JSON.
    pub fn to_text(&self) -> String {
        match self {
            Self::Structured(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Structured(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Trait for rendering log records.
///
/// Implementors must be thread-safe (`Send + Sync`) so formatters can be
/// shared across sink workers.
pub trait ScribeFormatter: Send + Sync {
    fn render(&self, record: &ScribeRecord) -> Rendered;
}

/// Shared formatter trait object used across pipelines.
#[derive(Clone)]
pub struct SharedFormatter {
    inner: Arc<dyn ScribeFormatter>,
}

impl SharedFormatter {
    pub fn new<F>(formatter: F) -> Self
    where
        F: ScribeFormatter + 'static,
    {
        Self {
            inner: Arc::new(formatter),
        }
    }

    pub fn render(&self, record: &ScribeRecord) -> Rendered {
        self.inner.render(record)
    }
}

impl fmt::Debug for SharedFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedFormatter(<dyn ScribeFormatter>)")
    }
}

/// Renders the bare message text; used for the broadcast channel.
#[derive(Copy, Clone, Debug, Default)]
pub struct MessageFormatter;

impl ScribeFormatter for MessageFormatter {
    fn render(&self, record: &ScribeRecord) -> Rendered {
        Rendered::Text(record.message().to_owned())
    }
}
