//! Baseline-vs-candidate metric comparison.
//!
//! For each metric, fetch both versions' samples over the window,
//! compare means, and flag deviations past the configured threshold.
//! A zero baseline never trips an alarm: with nothing to compare
//! against, deviation is defined as zero.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shiftgate_core::MetricsSource;

/// Thresholds for the comparison gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonConfig {
    /// Relative deviation above which a metric is degraded.
    pub deviation_threshold: f64,
    /// Relative deviation above which an issue is High rather than Medium.
    pub high_threshold: f64,
    /// High issues required before recommending rollback. Two by
    /// default, so one noisy metric cannot trigger churn on its own.
    pub high_issues_for_rollback: usize,
    /// Metrics compared when the caller does not name its own set.
    pub metrics: Vec<String>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            deviation_threshold: 0.15,
            high_threshold: 0.25,
            high_issues_for_rollback: 2,
            metrics: vec![
                "request_latency_p99".to_string(),
                "error_rate".to_string(),
                "cpu_usage".to_string(),
                "memory_usage".to_string(),
                "cache_hit_ratio".to_string(),
            ],
        }
    }
}

/// Health status of one compared metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricStatus {
    Healthy,
    Degraded,
}

/// Severity of a degraded-metric issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    Medium,
    High,
}

/// Comparison result for one metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricDelta {
    pub metric: String,
    pub baseline_mean: f64,
    pub candidate_mean: f64,
    /// Relative deviation, 0.16 meaning 16%.
    pub deviation: f64,
    pub status: MetricStatus,
}

/// A degraded metric worth surfacing to the operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricIssue {
    pub metric: String,
    pub severity: IssueSeverity,
    /// Deviation as a percentage, rounded to two decimals.
    pub deviation_percent: f64,
}

/// Full baseline-vs-candidate comparison for one service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricComparison {
    pub service: String,
    pub baseline_version: String,
    pub candidate_version: String,
    pub metrics: Vec<MetricDelta>,
    pub issues: Vec<MetricIssue>,
    pub rollback_recommended: bool,
}

impl MetricComparison {
    /// Short operator-facing summary of what degraded.
    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            return "all metrics within deviation threshold".to_string();
        }
        let parts: Vec<String> = self
            .issues
            .iter()
            .map(|i| format!("{} {:+.2}%", i.metric, i.deviation_percent))
            .collect();
        parts.join(", ")
    }
}

/// Compares candidate metrics against the baseline version.
pub struct ComparisonEvaluator {
    source: Arc<dyn MetricsSource>,
    config: ComparisonConfig,
}

impl ComparisonEvaluator {
    pub fn new(source: Arc<dyn MetricsSource>, config: ComparisonConfig) -> Self {
        Self { source, config }
    }

    /// Compare the configured default metric set.
    pub async fn compare(
        &self,
        service: &str,
        baseline_version: &str,
        candidate_version: &str,
        window: Duration,
    ) -> anyhow::Result<MetricComparison> {
        let metrics = self.config.metrics.clone();
        self.compare_metrics(service, baseline_version, candidate_version, &metrics, window)
            .await
    }

    /// Compare an explicit metric set.
    pub async fn compare_metrics(
        &self,
        service: &str,
        baseline_version: &str,
        candidate_version: &str,
        metrics: &[String],
        window: Duration,
    ) -> anyhow::Result<MetricComparison> {
        let mut deltas = Vec::with_capacity(metrics.len());
        let mut issues = Vec::new();

        for metric in metrics {
            let baseline = self
                .source
                .query_range(metric, service, baseline_version, window)
                .await?;
            let candidate = self
                .source
                .query_range(metric, service, candidate_version, window)
                .await?;

            let baseline_mean = mean(&baseline);
            let candidate_mean = mean(&candidate);
            let deviation = if baseline_mean > 0.0 {
                (candidate_mean - baseline_mean).abs() / baseline_mean
            } else {
                0.0
            };

            let status = if deviation > self.config.deviation_threshold {
                MetricStatus::Degraded
            } else {
                MetricStatus::Healthy
            };

            if status == MetricStatus::Degraded {
                let severity = if deviation > self.config.high_threshold {
                    IssueSeverity::High
                } else {
                    IssueSeverity::Medium
                };
                warn!(
                    %service,
                    %metric,
                    baseline = baseline_mean,
                    candidate = candidate_mean,
                    deviation = deviation,
                    ?severity,
                    "metric degraded versus baseline"
                );
                issues.push(MetricIssue {
                    metric: metric.clone(),
                    severity,
                    deviation_percent: (deviation * 10_000.0).round() / 100.0,
                });
            } else {
                debug!(%service, %metric, deviation = deviation, "metric within threshold");
            }

            deltas.push(MetricDelta {
                metric: metric.clone(),
                baseline_mean,
                candidate_mean,
                deviation,
                status,
            });
        }

        let high_issues = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::High)
            .count();

        Ok(MetricComparison {
            service: service.to_string(),
            baseline_version: baseline_version.to_string(),
            candidate_version: candidate_version.to_string(),
            metrics: deltas,
            issues,
            rollback_recommended: high_issues >= self.config.high_issues_for_rollback,
        })
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}
