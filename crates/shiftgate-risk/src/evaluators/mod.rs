//! Category evaluators.
//!
//! Each evaluator inspects one risk dimension and returns zero or more
//! factors from its own domain signals. Adding a category means adding
//! an implementation, not touching the aggregator.

pub mod compliance;
pub mod infrastructure;
pub mod security;
pub mod testing;

pub use compliance::ComplianceEvaluator;
pub use infrastructure::{InfrastructureEvaluator, InfrastructureSignals};
pub use security::{SecurityEvaluator, SecuritySignals};
pub use testing::{TestingEvaluator, TestingSignals};

use shiftgate_core::Artifact;

use crate::factor::RiskFactor;

/// Everything an evaluator may inspect about the deployment under
/// assessment.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentContext<'a> {
    pub service: &'a str,
    pub version: &'a str,
    /// Target environment, e.g. "production" or "staging".
    pub environment: &'a str,
    /// Hour of day (0-23, UTC) the deployment would start.
    pub hour_of_day: u8,
    /// The built artifact, when the build has already run.
    pub artifact: Option<&'a Artifact>,
}

/// A single risk dimension. Implementations must be deterministic for
/// a given context so assessments are reproducible.
pub trait RiskEvaluator: Send + Sync {
    fn evaluate(&self, ctx: &AssessmentContext<'_>) -> Vec<RiskFactor>;
}
