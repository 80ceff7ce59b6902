//! Shiftgate deployment staging: dependency layering and blast radius.
//!
//! Turns a declared dependency graph into an ordered sequence of
//! stage-groups (services that may release concurrently), reports
//! cyclic subsets instead of dropping them, and answers blast-radius
//! queries for any service in the graph.
//!
//! # Components
//!
//! - **`resolver`**: Kahn-style stage layering and version validation
//! - **`blast`**: direct/transitive dependent analysis
//! - **`error`**: plan-level error types

pub mod blast;
pub mod error;
pub mod resolver;

pub use blast::{BlastRadius, blast_radius};
pub use error::PlanError;
pub use resolver::{DeploymentPlan, before_map, resolve};
