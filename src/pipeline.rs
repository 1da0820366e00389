//! Ordered record transforms ending in a render stage.
//!
//! A [`FormatPipeline`] is assembled once through [`PipelineBuilder`] and is
//! immutable afterwards; changing the output format means building a new
//! pipeline. Any stage may reject a record, which silently drops it before
//! the render stage runs.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    filters::{LevelWindowFilter, ScribeFilter},
    formatter::{
        ConsoleFormatter, JsonFormatter, LevelPrettyFormatter, MessageFormatter, PrettyFormatter,
        Rendered, ScribeFormatter, SharedFormatter,
    },
    log_record::ScribeRecord,
};

/// A single transform over a record.
///
/// Returning `None` rejects the record. Stages never mutate their input;
/// they hand back the same record or a new one.
pub trait Stage: Send + Sync {
    fn apply(&self, record: ScribeRecord) -> Option<ScribeRecord>;
}

/// Adapts any [`ScribeFilter`] into a rejecting stage.
pub struct FilterStage<F>(pub F);

impl<F: ScribeFilter> Stage for FilterStage<F> {
    fn apply(&self, record: ScribeRecord) -> Option<ScribeRecord> {
        self.0.should_log(&record).then_some(record)
    }
}

pub type Clock = fn() -> DateTime<Utc>;

/// Re-stamps the record with the time it passed through the pipeline.
pub struct TimestampStage {
    clock: Clock,
}

impl TimestampStage {
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }
}

impl Default for TimestampStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for TimestampStage {
    fn apply(&self, record: ScribeRecord) -> Option<ScribeRecord> {
        Some(record.with_timestamp((self.clock)()))
    }
}

#[derive(Clone)]
pub struct FormatPipeline {
    stages: Arc<[Arc<dyn Stage>]>,
    formatter: SharedFormatter,
}

impl FormatPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Run every stage in order and render the survivor.
    pub fn run(&self, record: &ScribeRecord) -> Option<Rendered> {
        let mut current = record.clone();
        for stage in self.stages.iter() {
            current = stage.apply(current)?;
        }
        Some(self.formatter.render(&current))
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Window filter, then console badges and boxes.
    pub fn console(window: LevelWindowFilter) -> Self {
        Self::builder()
            .filter(window)
            .render(ConsoleFormatter)
    }

    /// Window filter, timestamp, then structured JSON.
    pub fn json(window: LevelWindowFilter) -> Self {
        Self::builder()
            .filter(window)
            .timestamp()
            .render(JsonFormatter)
    }

    /// Window filter, timestamp, then `prefix -> message` text.
    pub fn pretty(window: LevelWindowFilter) -> Self {
        Self::builder()
            .filter(window)
            .timestamp()
            .render(PrettyFormatter)
    }

    /// Window filter, timestamp, then `[LEVEL]: message` text.
    pub fn pretty_with_level(window: LevelWindowFilter) -> Self {
        Self::builder()
            .filter(window)
            .timestamp()
            .render(LevelPrettyFormatter)
    }

    /// Window filter, then the bare message for subscriber connections.
    pub fn broadcast(window: LevelWindowFilter) -> Self {
        Self::builder()
            .filter(window)
            .render(MessageFormatter)
    }
}

impl fmt::Debug for FormatPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatPipeline")
            .field("stages", &self.stages.len())
            .field("formatter", &self.formatter)
            .finish()
    }
}

/// Collects stages in order; [`render`](Self::render) closes the pipeline.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn filter<F: ScribeFilter + 'static>(self, filter: F) -> Self {
        self.stage(FilterStage(filter))
    }

    pub fn timestamp(self) -> Self {
        self.stage(TimestampStage::new())
    }

    pub fn render<F: ScribeFormatter + 'static>(self, formatter: F) -> FormatPipeline {
        FormatPipeline {
            stages: self.stages.into(),
            formatter: SharedFormatter::new(formatter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{filters::LevelWindowBuilder, level::SharedLevelTable};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn window(min: &str, max: &str) -> LevelWindowFilter {
        LevelWindowBuilder::new()
            .with_min(min)
            .with_max(max)
            .build(&SharedLevelTable::default())
            .expect("valid window")
    }

    struct Reject;

    impl Stage for Reject {
        fn apply(&self, _record: ScribeRecord) -> Option<ScribeRecord> {
            None
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl Stage for Counting {
        fn apply(&self, record: ScribeRecord) -> Option<ScribeRecord> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some(record)
        }
    }

    struct CountingFormatter(Arc<AtomicUsize>);

    impl ScribeFormatter for CountingFormatter {
        fn render(&self, record: &ScribeRecord) -> Rendered {
            self.0.fetch_add(1, Ordering::SeqCst);
            Rendered::Text(record.message().to_owned())
        }
    }

    #[test]
    fn rejection_short_circuits_later_stages_and_render() {
        let later = Arc::new(AtomicUsize::new(0));
        let renders = Arc::new(AtomicUsize::new(0));
        let pipeline = FormatPipeline::builder()
            .stage(Reject)
            .stage(Counting(Arc::clone(&later)))
            .render(CountingFormatter(Arc::clone(&renders)));

        assert_eq!(pipeline.run(&ScribeRecord::new("api", "info", "x")), None);
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(renders.load(Ordering::SeqCst), 0);
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 15, 4, 5)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn timestamp_stage_produces_new_record() {
        let record = ScribeRecord::new("api", "info", "x");
        let stamped = TimestampStage::with_clock(fixed_clock)
            .apply(record.clone())
            .expect("timestamp never rejects");
        assert_eq!(stamped.timestamp(), fixed_clock());
        assert_ne!(record.timestamp(), fixed_clock());
    }

    #[test]
    fn json_preset_filters_then_renders() {
        let pipeline = FormatPipeline::json(window("warn", "debug"));
        assert_eq!(pipeline.stage_count(), 2);
        assert!(pipeline.run(&ScribeRecord::new("api", "error", "x")).is_none());
        let rendered = pipeline
            .run(&ScribeRecord::new("api", "debug", "kept"))
            .expect("debug is inside the window");
        let value = rendered.as_structured().expect("structured output");
        assert_eq!(value["message"], "kept");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn broadcast_preset_sends_message_only() {
        let pipeline = FormatPipeline::broadcast(window("error", "box"));
        let rendered = pipeline
            .run(&ScribeRecord::new("api", "success", "shipped"))
            .expect("success is inside the window");
        assert_eq!(rendered, Rendered::Text("shipped".into()));
    }
}
