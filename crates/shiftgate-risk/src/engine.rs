//! Risk engine: composite scoring, reports, and assessment history.
//!
//! Runs every registered evaluator, folds the factors into one
//! weighted score, and keeps a bounded ring of past reports for
//! aggregate insight queries.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::evaluators::{AssessmentContext, RiskEvaluator};
use crate::factor::{RiskCategory, RiskFactor, RiskLevel};

/// Default capacity of the assessment history ring.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1024;

/// Autonomous approval requires the composite score below this. The
/// threshold is intentionally stricter than the Medium boundary: some
/// Medium-level risk still auto-approves, anything at or above 30
/// needs human sign-off.
pub const AUTONOMOUS_SCORE_CEILING: u8 = 30;

/// Name and severity of one factor, for per-category grouping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorSummary {
    pub name: String,
    pub severity: u8,
}

/// One complete risk assessment. Immutable once returned and
/// JSON-serializable for downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskReport {
    /// Unix timestamp (seconds) of the assessment.
    pub timestamp: u64,
    pub service: String,
    pub version: String,
    pub environment: String,
    /// Composite score, 0-100.
    pub score: u8,
    pub level: RiskLevel,
    /// All factors, descending by severity.
    pub factors: Vec<RiskFactor>,
    pub factors_by_category: BTreeMap<RiskCategory, Vec<FactorSummary>>,
    pub recommendation: String,
    /// Whether the system may proceed without human approval.
    pub autonomous_approval: bool,
}

/// Aggregate view over the assessment history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskInsights {
    pub total_assessments: usize,
    pub average_score: f64,
    /// Fraction of assessments that were autonomously approvable.
    pub approval_rate: f64,
    /// The five most frequently raised factor names with their counts.
    pub most_common_factors: Vec<(String, usize)>,
}

/// Aggregates category evaluators into deployment risk assessments.
pub struct RiskEngine {
    evaluators: Vec<Box<dyn RiskEvaluator>>,
    history: VecDeque<RiskReport>,
    history_capacity: usize,
}

impl RiskEngine {
    pub fn new(evaluators: Vec<Box<dyn RiskEvaluator>>) -> Self {
        Self {
            evaluators,
            history: VecDeque::new(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Override the history ring capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        self
    }

    /// Assess one deployment across every registered category.
    pub fn assess(&mut self, ctx: &AssessmentContext<'_>) -> RiskReport {
        debug!(service = %ctx.service, version = %ctx.version, "risk assessment starting");

        let mut factors: Vec<RiskFactor> = self
            .evaluators
            .iter()
            .flat_map(|e| e.evaluate(ctx))
            .collect();
        factors.sort_by(|a, b| b.severity.cmp(&a.severity));

        let score = composite_score(&factors);
        let level = RiskLevel::from_score(score);
        let autonomous_approval =
            score < AUTONOMOUS_SCORE_CEILING && !has_critical_compliance(&factors);

        let report = RiskReport {
            timestamp: epoch_secs(),
            service: ctx.service.to_string(),
            version: ctx.version.to_string(),
            environment: ctx.environment.to_string(),
            score,
            level,
            factors_by_category: categorize(&factors),
            recommendation: recommendation(level).to_string(),
            factors,
            autonomous_approval,
        };

        info!(
            service = %report.service,
            score = report.score,
            level = ?report.level,
            autonomous = report.autonomous_approval,
            "risk assessment complete"
        );

        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(report.clone());

        report
    }

    /// Aggregate insight over the retained history. `None` until the
    /// first assessment.
    pub fn insights(&self) -> Option<RiskInsights> {
        if self.history.is_empty() {
            return None;
        }

        let total = self.history.len();
        let score_sum: u64 = self.history.iter().map(|r| u64::from(r.score)).sum();
        let approved = self
            .history
            .iter()
            .filter(|r| r.autonomous_approval)
            .count();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for report in &self.history {
            for factor in &report.factors {
                *counts.entry(factor.name.as_str()).or_default() += 1;
            }
        }
        let mut most_common: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        // Count descending, name ascending for a stable answer.
        most_common.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        most_common.truncate(5);

        Some(RiskInsights {
            total_assessments: total,
            average_score: score_sum as f64 / total as f64,
            approval_rate: approved as f64 / total as f64,
            most_common_factors: most_common,
        })
    }

    /// Number of reports currently retained.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Weighted average of factor severities, rounded to the nearest
/// integer. 0 when there are no factors.
pub fn composite_score(factors: &[RiskFactor]) -> u8 {
    if factors.is_empty() {
        return 0;
    }
    let weighted: f64 = factors
        .iter()
        .map(|f| f64::from(f.severity) * f.category.weight())
        .sum();
    let total: f64 = factors.iter().map(|f| f.category.weight()).sum();
    (weighted / total).round() as u8
}

/// A critical compliance factor always blocks autonomous approval,
/// whatever the composite score says.
fn has_critical_compliance(factors: &[RiskFactor]) -> bool {
    factors
        .iter()
        .any(|f| f.category == RiskCategory::Compliance && f.is_critical())
}

fn categorize(factors: &[RiskFactor]) -> BTreeMap<RiskCategory, Vec<FactorSummary>> {
    let mut by_category: BTreeMap<RiskCategory, Vec<FactorSummary>> = BTreeMap::new();
    for factor in factors {
        by_category
            .entry(factor.category)
            .or_default()
            .push(FactorSummary {
                name: factor.name.clone(),
                severity: factor.severity,
            });
    }
    by_category
}

fn recommendation(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "approve: deploy immediately, all signals green",
        RiskLevel::Medium => "conditional: deploy with caution and review mitigations",
        RiskLevel::High => "manual review required: address the highest-severity factors first",
        RiskLevel::Critical => "blocked: resolve critical findings before proceeding",
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
