//! Plan-level error types.
//!
//! These are reported inside the [`crate::DeploymentPlan`] rather than
//! returned as `Err`: a release with a bad subgraph still gets a plan
//! for the unaffected services. Callers must refuse to proceed with the
//! services an error names.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error that makes part of a deployment plan unusable.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanError {
    /// The named services form a dependency cycle and cannot be staged.
    #[error("circular dependency among: {services:?}")]
    CircularDependency { services: Vec<String> },

    /// A dependency's target version does not satisfy the minimum the
    /// dependent declared.
    #[error("{dependent} requires {dependency} {required}, release targets {actual}")]
    VersionConflict {
        dependent: String,
        dependency: String,
        required: String,
        actual: String,
    },
}

impl PlanError {
    /// The services this error prevents from releasing.
    pub fn affected(&self) -> Vec<&str> {
        match self {
            PlanError::CircularDependency { services } => {
                services.iter().map(String::as_str).collect()
            }
            PlanError::VersionConflict { dependent, .. } => vec![dependent.as_str()],
        }
    }
}
