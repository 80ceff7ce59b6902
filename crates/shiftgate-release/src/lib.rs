//! Shiftgate release coordination.
//!
//! Takes a release request for N services and drives it end to end:
//! build artifacts concurrently, gate every service through risk
//! assessment, resolve the dependency plan, then execute stage-groups
//! in order with one rollout controller per service. A failing service
//! never aborts the release; only its dependents are blocked.
//!
//! # Components
//!
//! - **`config`**: the TOML release manifest
//! - **`coordinator`**: the release driver
//! - **`error`**: manifest errors

pub mod config;
pub mod coordinator;
pub mod error;

pub use config::ReleaseManifest;
pub use coordinator::{
    ReleaseCoordinator, ReleaseItem, ReleaseReport, ReleaseRequest, ServiceOutcome,
};
pub use error::ConfigError;
