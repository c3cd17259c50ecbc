//! Pipeline Stage
//!
//! Turns raw generator batches into the delivered stream. A stage is an
//! ordered list of small pure steps (filters and price shifts). Optional
//! asynchronous enrichment lives in [`enrich`].
//!
//! Filtering is not an error: a sample that fails a `KeepAbove` step is
//! dropped silently.

pub mod enrich;

use chrono::Utc;

use crate::domain::price::PriceSample;

pub use enrich::{
    ENRICHMENT_DELAY, ENRICHMENT_OFFSET, EnrichmentLimiter, SimulatedEnricher,
};

/// Filter threshold for the multi-sample feed.
pub const FEED_THRESHOLD: f64 = 148.0;

/// Price shift applied to feed samples that pass the filter.
pub const FEED_OFFSET: f64 = 2.0;

/// Filter threshold for the single-value accessor.
pub const SINGLE_VALUE_THRESHOLD: f64 = 150.0;

/// Price shift applied by the single-value accessor before filtering.
pub const SINGLE_VALUE_OFFSET: f64 = 5.0;

// =============================================================================
// Steps
// =============================================================================

/// One pure pipeline step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Keep samples whose price is strictly above the threshold.
    KeepAbove(f64),
    /// New sample with the price moved by the offset, same timestamp.
    Shift(f64),
    /// New sample with the price moved by the offset and a fresh timestamp.
    ShiftAndStamp(f64),
}

impl Step {
    /// Apply the step. `None` means the sample was filtered out.
    #[must_use]
    pub fn apply(&self, sample: PriceSample) -> Option<PriceSample> {
        match *self {
            Self::KeepAbove(threshold) => (sample.price > threshold).then_some(sample),
            Self::Shift(offset) => Some(sample.shifted(offset)),
            Self::ShiftAndStamp(offset) => Some(sample.shifted_at(offset, Utc::now())),
        }
    }
}

// =============================================================================
// Pipeline Stage
// =============================================================================

/// Ordered chain of steps applied to every sample.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use price_stream::domain::price::PriceSample;
/// use price_stream::infrastructure::pipeline::PipelineStage;
///
/// let stage = PipelineStage::feed();
/// let kept = PriceSample::new("AAPL", 149.0, Utc::now()).unwrap();
/// let dropped = PriceSample::new("AAPL", 147.5, Utc::now()).unwrap();
///
/// assert_eq!(stage.process(kept).map(|s| s.price), Some(151.0));
/// assert!(stage.process(dropped).is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStage {
    steps: Vec<Step>,
}

impl PipelineStage {
    /// Create a stage from an explicit step list.
    #[must_use]
    pub const fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Multi-sample feed: keep `> 148`, then add 2.
    #[must_use]
    pub fn feed() -> Self {
        Self::new(vec![Step::KeepAbove(FEED_THRESHOLD), Step::Shift(FEED_OFFSET)])
    }

    /// Single-value accessor: add 5, then keep `> 150`.
    #[must_use]
    pub fn single_value() -> Self {
        Self::new(vec![
            Step::Shift(SINGLE_VALUE_OFFSET),
            Step::KeepAbove(SINGLE_VALUE_THRESHOLD),
        ])
    }

    /// Configured steps, in application order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run one sample through every step.
    #[must_use]
    pub fn process(&self, sample: PriceSample) -> Option<PriceSample> {
        self.steps
            .iter()
            .try_fold(sample, |current, step| step.apply(current))
    }

    /// Run a batch through the stage, preserving input order.
    #[must_use]
    pub fn process_batch(&self, batch: Vec<PriceSample>) -> Vec<PriceSample> {
        batch.into_iter().filter_map(|s| self.process(s)).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::price::SYMBOL;

    fn sample(price: f64) -> PriceSample {
        PriceSample::new(SYMBOL, price, Utc::now()).unwrap()
    }

    #[test_case(148.01 => Some(150.01) ; "just above threshold")]
    #[test_case(148.0 => None ; "threshold itself is dropped")]
    #[test_case(145.0 => None ; "lowest raw price")]
    #[test_case(154.99 => Some(156.99) ; "highest raw price")]
    fn feed_stage(raw: f64) -> Option<f64> {
        PipelineStage::feed()
            .process(sample(raw))
            .map(|s| (s.price * 100.0).round() / 100.0)
    }

    #[test_case(145.01 => Some(150.01) ; "shift lifts over threshold")]
    #[test_case(145.0 => None ; "shifted value equal to threshold")]
    #[test_case(140.0 => None ; "far below")]
    #[test_case(154.0 => Some(159.0) ; "top of range")]
    fn single_value_stage(raw: f64) -> Option<f64> {
        PipelineStage::single_value()
            .process(sample(raw))
            .map(|s| (s.price * 100.0).round() / 100.0)
    }

    #[test]
    fn step_order_matters() {
        let filter_first = PipelineStage::new(vec![Step::KeepAbove(150.0), Step::Shift(5.0)]);
        let shift_first = PipelineStage::new(vec![Step::Shift(5.0), Step::KeepAbove(150.0)]);

        assert!(filter_first.process(sample(147.0)).is_none());
        assert!(shift_first.process(sample(147.0)).is_some());
    }

    #[test]
    fn shift_keeps_timestamp() {
        let input = sample(150.0);
        let output = Step::Shift(2.0).apply(input.clone()).unwrap();
        assert_eq!(output.observed_at, input.observed_at);
    }

    #[test]
    fn shift_and_stamp_refreshes_timestamp() {
        let mut input = sample(150.0);
        input.observed_at -= chrono::Duration::seconds(60);
        let output = Step::ShiftAndStamp(2.0).apply(input.clone()).unwrap();
        assert!(output.observed_at > input.observed_at);
        assert_eq!(output.price, 152.0);
    }

    #[test]
    fn batch_keeps_enumeration_order() {
        let batch = vec![sample(149.0), sample(146.0), sample(151.0), sample(150.0)];
        let out = PipelineStage::feed().process_batch(batch);
        let prices: Vec<f64> = out.iter().map(|s| s.price).collect();
        assert_eq!(prices, vec![151.0, 153.0, 152.0]);
    }

    #[test]
    fn empty_stage_is_identity() {
        let stage = PipelineStage::new(vec![]);
        assert_eq!(stage.process(sample(1.0)).map(|s| s.price), Some(1.0));
    }
}
