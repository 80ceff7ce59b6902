//! Infrastructure and operational risk evaluation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::evaluators::{AssessmentContext, RiskEvaluator};
use crate::factor::{RiskCategory, RiskFactor};

/// Current infrastructure status for one service's target cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfrastructureSignals {
    /// Cluster health score (0-100).
    pub cluster_health: u8,
    pub disk_usage_percent: u8,
    pub deployments_in_queue: u32,
}

impl Default for InfrastructureSignals {
    fn default() -> Self {
        Self {
            cluster_health: 100,
            disk_usage_percent: 0,
            deployments_in_queue: 0,
        }
    }
}

/// Evaluates infrastructure health and capacity.
pub struct InfrastructureEvaluator {
    signals: HashMap<String, InfrastructureSignals>,
}

impl InfrastructureEvaluator {
    pub fn new(signals: HashMap<String, InfrastructureSignals>) -> Self {
        Self { signals }
    }
}

impl RiskEvaluator for InfrastructureEvaluator {
    fn evaluate(&self, ctx: &AssessmentContext<'_>) -> Vec<RiskFactor> {
        let signals = self.signals.get(ctx.service).cloned().unwrap_or_default();
        let mut factors = Vec::new();

        if signals.cluster_health < 80 {
            factors.push(
                RiskFactor::new(
                    "Degraded Cluster Health",
                    100 - signals.cluster_health.min(100),
                    RiskCategory::Infrastructure,
                    format!("Cluster health score: {}%", signals.cluster_health),
                )
                .with_mitigation("Investigate and resolve cluster issues before deployment"),
            );
        }

        if signals.disk_usage_percent > 85 {
            factors.push(
                RiskFactor::new(
                    "High Disk Usage",
                    30,
                    RiskCategory::Infrastructure,
                    format!("Disk usage: {}%", signals.disk_usage_percent),
                )
                .with_mitigation("Clean up old logs/data or expand storage"),
            );
        }

        if signals.deployments_in_queue > 5 {
            factors.push(
                RiskFactor::new(
                    "Pipeline Congestion",
                    20,
                    RiskCategory::Infrastructure,
                    format!("{} deployments queued", signals.deployments_in_queue),
                )
                .with_mitigation("Wait for pipeline capacity or stagger deployment"),
            );
        }

        factors
    }
}
