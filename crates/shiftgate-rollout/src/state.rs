//! The rollout state machine.
//!
//! States are an explicit tagged enum with an exhaustive transition
//! table: an illegal transition (advance from a terminal state, a
//! stage skip) is rejected, never applied. Every accepted transition
//! is recorded as a structured event.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use shiftgate_metrics::MetricIssue;

use crate::strategy::RolloutStrategy;

/// Where a rollout currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RolloutStatus {
    /// Not started.
    Pending,
    /// Bringing up candidate capacity.
    Provisioning,
    /// Waiting for the candidate to report healthy.
    HealthCheck,
    /// Running synthetic-traffic validation.
    SmokeTest,
    /// Setting the traffic split for a stage.
    StageRouting { stage: usize },
    /// Observing metrics at a stage's traffic weight.
    Monitoring { stage: usize },
    /// All stages passed; old capacity released.
    Succeeded,
    /// Traffic restored to baseline after a post-shift failure.
    RolledBack { reason: String },
    /// Stopped before any traffic was exposed.
    Failed { reason: String },
}

impl RolloutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RolloutStatus::Succeeded
                | RolloutStatus::RolledBack { .. }
                | RolloutStatus::Failed { .. }
        )
    }

    /// Short label for events and logs.
    pub fn label(&self) -> &'static str {
        match self {
            RolloutStatus::Pending => "pending",
            RolloutStatus::Provisioning => "provisioning",
            RolloutStatus::HealthCheck => "health_check",
            RolloutStatus::SmokeTest => "smoke_test",
            RolloutStatus::StageRouting { .. } => "stage_routing",
            RolloutStatus::Monitoring { .. } => "monitoring",
            RolloutStatus::Succeeded => "succeeded",
            RolloutStatus::RolledBack { .. } => "rolled_back",
            RolloutStatus::Failed { .. } => "failed",
        }
    }

    /// The transition table. Terminal states accept nothing; routing
    /// and monitoring must agree on the stage index; monitoring either
    /// advances to the next stage, succeeds, or rolls back.
    fn accepts(&self, next: &RolloutStatus) -> bool {
        use RolloutStatus::*;
        match (self, next) {
            (Pending, Provisioning) => true,
            (Provisioning, HealthCheck) => true,
            (Provisioning, Failed { .. }) => true,
            (HealthCheck, SmokeTest) => true,
            (HealthCheck, Failed { .. }) => true,
            (SmokeTest, StageRouting { stage }) => *stage == 0,
            (SmokeTest, Failed { .. }) => true,
            (StageRouting { stage }, Monitoring { stage: next_stage }) => stage == next_stage,
            (StageRouting { stage }, Failed { .. }) => *stage == 0,
            (StageRouting { .. }, RolledBack { .. }) => true,
            (Monitoring { stage }, StageRouting { stage: next_stage }) => {
                *next_stage == stage + 1
            }
            (Monitoring { .. }, Succeeded) => true,
            (Monitoring { .. }, RolledBack { .. }) => true,
            _ => false,
        }
    }
}

/// Structured record of one accepted state transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionEvent {
    pub service: String,
    pub from: String,
    pub to: String,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What terminated a rollout, with the raw triggering data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureDetail {
    Provisioning { error: String },
    HealthCheckTimeout { waited_secs: u64 },
    SmokeTest { error: String },
    TrafficRouting { error: String },
    /// Comparison gate: baseline-vs-candidate issues.
    MetricDegradation { issues: Vec<MetricIssue> },
    /// Threshold gate: absolute ceiling breaches.
    ThresholdBreach { breaches: Vec<String> },
    Cancelled,
}

/// Attempted transition the table rejects.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid rollout transition for {service}: {from} -> {to}")]
pub struct InvalidTransition {
    pub service: String,
    pub from: String,
    pub to: String,
}

/// Exclusive, single-writer state of one service's rollout.
///
/// Owned by the driving controller for the duration of the rollout;
/// handed back to the caller once terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RolloutState {
    pub service: String,
    pub strategy: RolloutStrategy,
    pub stage_weights: Vec<u32>,
    pub status: RolloutStatus,
    pub started_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
    /// Raw detail behind a RolledBack/Failed status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
    /// Every accepted transition, in order.
    pub transitions: Vec<TransitionEvent>,
}

impl RolloutState {
    pub fn new(service: &str, strategy: RolloutStrategy) -> Self {
        let stage_weights = strategy.stage_weights();
        Self {
            service: service.to_string(),
            strategy,
            stage_weights,
            status: RolloutStatus::Pending,
            started_at: epoch_secs(),
            finished_at: None,
            failure: None,
            transitions: Vec::new(),
        }
    }

    /// Apply a transition if the table accepts it.
    ///
    /// Records the event, logs it, and stamps `finished_at` on entry
    /// to a terminal state.
    pub fn transition(
        &mut self,
        next: RolloutStatus,
        reason: Option<String>,
    ) -> Result<&TransitionEvent, InvalidTransition> {
        if !self.status.accepts(&next) {
            return Err(InvalidTransition {
                service: self.service.clone(),
                from: self.status.label().to_string(),
                to: next.label().to_string(),
            });
        }

        let event = TransitionEvent {
            service: self.service.clone(),
            from: self.status.label().to_string(),
            to: next.label().to_string(),
            timestamp: epoch_secs(),
            reason,
        };
        info!(
            service = %event.service,
            from = %event.from,
            to = %event.to,
            reason = event.reason.as_deref().unwrap_or(""),
            "rollout transition"
        );

        self.status = next;
        if self.status.is_terminal() {
            self.finished_at = Some(event.timestamp);
        }
        self.transitions.push(event);
        Ok(self.transitions.last().unwrap_or_else(|| unreachable!()))
    }

    /// Current stage index while routing/monitoring, if any.
    pub fn current_stage(&self) -> Option<usize> {
        match self.status {
            RolloutStatus::StageRouting { stage } | RolloutStatus::Monitoring { stage } => {
                Some(stage)
            }
            _ => None,
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
