//! Absolute stage-gate checks.
//!
//! The alternative to baseline comparison when no baseline exists or
//! the operator prefers fixed ceilings: error rate, p99 latency, and
//! CPU against configured maxima.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use shiftgate_core::MetricsSource;

/// Absolute ceilings for a monitoring stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateThresholds {
    /// Maximum error rate, percent.
    pub max_error_rate: f64,
    /// Maximum p99 latency, milliseconds.
    pub max_latency_p99_ms: f64,
    /// Maximum CPU usage, percent.
    pub max_cpu_percent: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            max_error_rate: 2.0,
            max_latency_p99_ms: 150.0,
            max_cpu_percent: 80.0,
        }
    }
}

/// Observed stage metrics for the candidate version.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct StageMetrics {
    pub error_rate: f64,
    pub latency_p99_ms: f64,
    pub cpu_percent: f64,
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateVerdict {
    pub healthy: bool,
    /// What breached, one entry per threshold.
    pub breaches: Vec<String>,
}

impl GateVerdict {
    /// Operator-facing one-liner.
    pub fn reason(&self) -> String {
        if self.healthy {
            "all metrics healthy".to_string()
        } else {
            self.breaches.join("; ")
        }
    }
}

/// Check observed metrics against the thresholds.
pub fn evaluate_thresholds(metrics: &StageMetrics, thresholds: &GateThresholds) -> GateVerdict {
    let mut breaches = Vec::new();

    if metrics.error_rate > thresholds.max_error_rate {
        breaches.push(format!(
            "error rate {:.2}% > {:.2}% threshold",
            metrics.error_rate, thresholds.max_error_rate
        ));
    }
    if metrics.latency_p99_ms > thresholds.max_latency_p99_ms {
        breaches.push(format!(
            "p99 latency {:.0}ms > {:.0}ms threshold",
            metrics.latency_p99_ms, thresholds.max_latency_p99_ms
        ));
    }
    if metrics.cpu_percent > thresholds.max_cpu_percent {
        breaches.push(format!(
            "CPU usage {:.1}% > {:.1}% threshold",
            metrics.cpu_percent, thresholds.max_cpu_percent
        ));
    }

    if !breaches.is_empty() {
        warn!(breaches = ?breaches, "stage gate breached");
    }

    GateVerdict {
        healthy: breaches.is_empty(),
        breaches,
    }
}

/// Sample current stage metrics for `service`/`version` from the
/// telemetry source. Each field is the mean over the window.
pub async fn sample_stage_metrics(
    source: &dyn MetricsSource,
    service: &str,
    version: &str,
    window: Duration,
) -> anyhow::Result<StageMetrics> {
    let error_rate = mean_of(source, "error_rate", service, version, window).await?;
    let latency_p99_ms = mean_of(source, "request_latency_p99", service, version, window).await?;
    let cpu_percent = mean_of(source, "cpu_usage", service, version, window).await?;
    Ok(StageMetrics {
        error_rate,
        latency_p99_ms,
        cpu_percent,
    })
}

async fn mean_of(
    source: &dyn MetricsSource,
    metric: &str,
    service: &str,
    version: &str,
    window: Duration,
) -> anyhow::Result<f64> {
    let samples = source.query_range(metric, service, version, window).await?;
    if samples.is_empty() {
        return Ok(0.0);
    }
    Ok(samples.iter().sum::<f64>() / samples.len() as f64)
}
