//! Rollout strategies: blue-green, staged canary, rolling.

use serde::{Deserialize, Serialize};

/// How to shift traffic onto a new version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RolloutStrategy {
    /// Spin up a full parallel set, then switch all traffic at once.
    BlueGreen,
    /// Route an increasing percentage of traffic to the new version.
    Canary(CanaryConfig),
    /// Replace capacity in steps; traffic follows the replaced share.
    Rolling(RollingConfig),
}

impl Default for RolloutStrategy {
    fn default() -> Self {
        Self::Canary(CanaryConfig::default())
    }
}

impl RolloutStrategy {
    /// The traffic weight sequence this strategy steps through.
    /// Blue-green is a single atomic 100% switch.
    pub fn stage_weights(&self) -> Vec<u32> {
        match self {
            RolloutStrategy::BlueGreen => vec![100],
            RolloutStrategy::Canary(cfg) => cfg.stage_weights.clone(),
            RolloutStrategy::Rolling(cfg) => cfg.stage_weights.clone(),
        }
    }

    pub fn is_blue_green(&self) -> bool {
        matches!(self, RolloutStrategy::BlueGreen)
    }

    /// Short name for logs and events.
    pub fn name(&self) -> &'static str {
        match self {
            RolloutStrategy::BlueGreen => "blue_green",
            RolloutStrategy::Canary(_) => "canary",
            RolloutStrategy::Rolling(_) => "rolling",
        }
    }
}

/// Configuration for staged canary rollouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanaryConfig {
    /// Traffic percentages stepped through, ending at 100.
    pub stage_weights: Vec<u32>,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            stage_weights: vec![5, 25, 50, 100],
        }
    }
}

/// Configuration for rolling replacements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollingConfig {
    /// Share of capacity replaced at each step, cumulative, ending at 100.
    pub stage_weights: Vec<u32>,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            stage_weights: vec![5, 25, 50, 100],
        }
    }
}
