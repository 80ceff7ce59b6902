//! Shiftgate shared domain types and collaborator contracts.
//!
//! This crate holds the vocabulary the decision core speaks: the services
//! in a release, their declared dependencies, build artifacts, and the
//! injected capability traits for everything the core does *not* do itself
//! (builds, traffic routing, health probes, telemetry, compliance flags).
//!
//! # Components
//!
//! - **`types`**: `ServiceNode`, `DependencyEdge`, `Artifact` and friends
//! - **`ports`**: dyn-compatible collaborator traits with boxed-future methods

pub mod ports;
pub mod types;

pub use ports::{
    BoxFuture, BuildService, CapacityProvider, ComplianceDataSource, HealthCheckService,
    MetricsSource, TrafficRouter,
};
pub use types::{
    Artifact, DependencyEdge, DependencyOrdering, ScanStatus, ServiceName, ServiceNode,
};
