//! Per-level shorthands for [`ServiceLogger::log`].
//!
//! The methods are generated from the fixed list of default levels, so each
//! one is a plain static accessor that forwards to the generic entry point.
//! `box` is a keyword, hence [`ServiceLogger::boxed`].

use super::ServiceLogger;
use crate::{level::StandardLevel, log_record::Metadata};

macro_rules! level_methods {
    ($($method:ident => $variant:ident),* $(,)?) => {
        impl ServiceLogger {
            $(
                #[doc = concat!("Log a record at [`StandardLevel::", stringify!($variant), "`].")]
                pub fn $method(&self, message: &str, metadata: impl Into<Metadata>) -> usize {
                    self.log(StandardLevel::$variant.as_str(), message, metadata)
                }
            )*
        }
    };
}

level_methods! {
    error => Error,
    warn => Warn,
    info => Info,
    debug => Debug,
    success => Success,
    verbose => Verbose,
    internal => Internal,
    boxed => Box,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;
    use serde_json::json;

    use crate::{
        filters::LevelWindowBuilder,
        level::SharedLevelTable,
        logger::{ServiceLogger, SinkRoute},
        pipeline::FormatPipeline,
        sinks::MemorySink,
    };

    fn logger_with_memory() -> (ServiceLogger, Arc<MemorySink>) {
        let window = LevelWindowBuilder::new()
            .with_min("error")
            .build(&SharedLevelTable::default())
            .expect("valid window");
        let sink = Arc::new(MemorySink::default());
        let pipeline = FormatPipeline::builder().filter(window).render(LevelEcho);
        let logger = ServiceLogger::new("api", vec![SinkRoute::owned(pipeline, sink.clone())]);
        (logger, sink)
    }

    struct LevelEcho;

    impl crate::formatter::ScribeFormatter for LevelEcho {
        fn render(&self, record: &crate::log_record::ScribeRecord) -> crate::formatter::Rendered {
            crate::formatter::Rendered::Text(record.level().to_owned())
        }
    }

    #[rstest]
    #[case::error(|l: &ServiceLogger, m: &str| l.error(m, json!(null)), "error")]
    #[case::warn(|l: &ServiceLogger, m: &str| l.warn(m, json!(null)), "warn")]
    #[case::info(|l: &ServiceLogger, m: &str| l.info(m, json!(null)), "info")]
    #[case::debug(|l: &ServiceLogger, m: &str| l.debug(m, json!(null)), "debug")]
    #[case::success(|l: &ServiceLogger, m: &str| l.success(m, json!(null)), "success")]
    #[case::verbose(|l: &ServiceLogger, m: &str| l.verbose(m, json!(null)), "verbose")]
    #[case::internal(|l: &ServiceLogger, m: &str| l.internal(m, json!(null)), "internal")]
    #[case::boxed(|l: &ServiceLogger, m: &str| l.boxed(m, json!(null)), "box")]
    fn shorthand_uses_its_level(
        #[case] method: fn(&ServiceLogger, &str) -> usize,
        #[case] level: &str,
    ) {
        let (logger, sink) = logger_with_memory();
        assert_eq!(method(&logger, "msg"), 1);
        assert_eq!(sink.texts(), vec![level]);
    }
}
