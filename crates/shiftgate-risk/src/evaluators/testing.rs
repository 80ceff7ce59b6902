//! Testing risk evaluation.
//!
//! Coverage, test execution results, and performance regressions.
//! Missing test data is treated as zero coverage: an unmeasured
//! service is a risk, not a pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::evaluators::{AssessmentContext, RiskEvaluator};
use crate::factor::{RiskCategory, RiskFactor};

/// Latest test-pipeline results for one service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestingSignals {
    /// Line coverage percentage (0-100).
    pub code_coverage: u8,
    pub failed_tests: u32,
    /// Performance degradation versus the previous release, percent.
    pub performance_regression_percent: f64,
}

/// Evaluates testing-related risks.
pub struct TestingEvaluator {
    signals: HashMap<String, TestingSignals>,
}

impl TestingEvaluator {
    pub fn new(signals: HashMap<String, TestingSignals>) -> Self {
        Self { signals }
    }
}

impl RiskEvaluator for TestingEvaluator {
    fn evaluate(&self, ctx: &AssessmentContext<'_>) -> Vec<RiskFactor> {
        let signals = self.signals.get(ctx.service).cloned().unwrap_or_default();
        let mut factors = Vec::new();

        if signals.code_coverage < 70 {
            let severity = (100 - signals.code_coverage.min(100)) / 2;
            factors.push(
                RiskFactor::new(
                    "Low Code Coverage",
                    severity,
                    RiskCategory::Testing,
                    format!(
                        "Code coverage is {}% (target: 70%+)",
                        signals.code_coverage
                    ),
                )
                .with_mitigation("Add unit tests and integration tests"),
            );
        }

        if signals.failed_tests > 0 {
            factors.push(
                RiskFactor::new(
                    "Test Failures Detected",
                    60,
                    RiskCategory::Testing,
                    format!("{} tests failed", signals.failed_tests),
                )
                .with_mitigation("Fix failing tests before deployment"),
            );
        }

        if signals.performance_regression_percent > 5.0 {
            let severity = (signals.performance_regression_percent * 2.0).min(50.0) as u8;
            factors.push(
                RiskFactor::new(
                    "Performance Regression Detected",
                    severity,
                    RiskCategory::Testing,
                    format!(
                        "Performance degradation: {}%",
                        signals.performance_regression_percent
                    ),
                )
                .with_mitigation("Optimize code or increase resource allocation"),
            );
        }

        factors
    }
}
