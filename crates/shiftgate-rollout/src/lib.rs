//! Shiftgate progressive rollouts: blue-green switches and staged canaries.
//!
//! One [`RolloutController`] drives the rollout of one service: provision
//! the candidate capacity, gate it through health and smoke checks,
//! shift traffic progressively, watch metrics at every stage, and roll
//! everything back to baseline the moment the candidate disqualifies
//! itself.
//!
//! # Components
//!
//! - **`strategy`**: rollout strategy configuration (BlueGreen, Canary, Rolling)
//! - **`state`**: the rollout state machine and its transition events
//! - **`controller`**: the async driver over the injected collaborators

pub mod controller;
pub mod state;
pub mod strategy;

pub use controller::{Collaborators, GateMode, RolloutConfig, RolloutController};
pub use state::{FailureDetail, InvalidTransition, RolloutState, RolloutStatus, TransitionEvent};
pub use strategy::{CanaryConfig, RollingConfig, RolloutStrategy};
