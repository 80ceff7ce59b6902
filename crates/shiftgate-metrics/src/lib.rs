//! Shiftgate canary metric evaluation.
//!
//! Two gate styles for deciding whether a candidate version is healthy:
//! relative comparison against the baseline version's metrics, and
//! absolute thresholds on error rate, tail latency, and CPU.
//!
//! # Components
//!
//! - **`compare`**: baseline-vs-candidate deviation analysis
//! - **`thresholds`**: absolute stage-gate checks

pub mod compare;
pub mod thresholds;

pub use compare::{
    ComparisonConfig, ComparisonEvaluator, IssueSeverity, MetricComparison, MetricDelta,
    MetricIssue, MetricStatus,
};
pub use thresholds::{
    GateThresholds, GateVerdict, StageMetrics, evaluate_thresholds, sample_stage_metrics,
};
