//! Compliance and governance risk evaluation.
//!
//! Policy flags come from the injected [`ComplianceDataSource`]:
//! `change_approved`, `data_residency_required`,
//! `deployment_in_correct_region`. Restricted deployment hours are
//! organization-wide policy and live on the evaluator itself.

use std::sync::Arc;

use shiftgate_core::ComplianceDataSource;

use crate::evaluators::{AssessmentContext, RiskEvaluator};
use crate::factor::{RiskCategory, RiskFactor};

/// Evaluates compliance with organizational policy.
pub struct ComplianceEvaluator {
    source: Arc<dyn ComplianceDataSource>,
    /// Hours of day (UTC) during which production deploys are
    /// restricted, e.g. `[2, 3, 4]` for a nightly maintenance window.
    restricted_hours: Vec<u8>,
}

impl ComplianceEvaluator {
    pub fn new(source: Arc<dyn ComplianceDataSource>) -> Self {
        Self {
            source,
            restricted_hours: Vec::new(),
        }
    }

    pub fn with_restricted_hours(mut self, hours: Vec<u8>) -> Self {
        self.restricted_hours = hours;
        self
    }
}

impl RiskEvaluator for ComplianceEvaluator {
    fn evaluate(&self, ctx: &AssessmentContext<'_>) -> Vec<RiskFactor> {
        let flags = self.source.policy_flags(ctx.service);
        let flag = |name: &str| flags.get(name).copied().unwrap_or(false);
        let mut factors = Vec::new();

        // Absent approval counts as not approved.
        if !flag("change_approved") {
            factors.push(
                RiskFactor::new(
                    "Change Not Approved",
                    100,
                    RiskCategory::Compliance,
                    "Release not approved by change management".to_string(),
                )
                .with_mitigation("Submit and obtain change approval"),
            );
        }

        if ctx.environment == "production" && self.restricted_hours.contains(&ctx.hour_of_day) {
            factors.push(
                RiskFactor::new(
                    "Deployment Outside Approved Window",
                    40,
                    RiskCategory::Compliance,
                    format!("Hour {} is in a restricted window", ctx.hour_of_day),
                )
                .with_mitigation("Deploy during approved maintenance windows"),
            );
        }

        if flag("data_residency_required")
            && !flags
                .get("deployment_in_correct_region")
                .copied()
                .unwrap_or(true)
        {
            factors.push(
                RiskFactor::new(
                    "Data Residency Violation",
                    85,
                    RiskCategory::Compliance,
                    "Service not deployed in a compliant region".to_string(),
                )
                .with_mitigation("Redeploy to the correct geographic region"),
            );
        }

        factors
    }
}
