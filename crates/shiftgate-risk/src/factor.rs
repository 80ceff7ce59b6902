//! Risk factors, categories, and classification bands.

use serde::{Deserialize, Serialize};

/// Risk categories, ordered by the weight they carry in the composite
/// score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Compliance,
    Security,
    Testing,
    Infrastructure,
}

impl RiskCategory {
    /// Weight of this category in the composite score. Compliance
    /// outweighs security outweighs testing outweighs infrastructure.
    pub fn weight(self) -> f64 {
        match self {
            RiskCategory::Compliance => 1.5,
            RiskCategory::Security => 1.3,
            RiskCategory::Testing => 1.0,
            RiskCategory::Infrastructure => 0.8,
        }
    }
}

/// A single risk factor raised by a category evaluator.
///
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactor {
    pub name: String,
    /// 0 (negligible) to 100 (certain blocker).
    pub severity: u8,
    pub category: RiskCategory,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
}

impl RiskFactor {
    pub fn new(name: &str, severity: u8, category: RiskCategory, description: String) -> Self {
        Self {
            name: name.to_string(),
            severity: severity.min(100),
            category,
            description,
            mitigation: None,
        }
    }

    pub fn with_mitigation(mut self, mitigation: &str) -> Self {
        self.mitigation = Some(mitigation.to_string());
        self
    }

    /// Whether this factor alone sits in the critical band.
    pub fn is_critical(&self) -> bool {
        u32::from(self.severity) >= RiskLevel::CRITICAL_FLOOR
    }
}

/// Classification band for a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Scores at or above this are critical.
    pub const CRITICAL_FLOOR: u32 = 70;

    /// Classify a composite score. Boundaries are inclusive on the
    /// lower integer: 19 is Low, 20 is Medium, 45 is High, 70 is
    /// Critical.
    pub fn from_score(score: u8) -> Self {
        match u32::from(score) {
            0..20 => RiskLevel::Low,
            20..45 => RiskLevel::Medium,
            45..Self::CRITICAL_FLOOR => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}
