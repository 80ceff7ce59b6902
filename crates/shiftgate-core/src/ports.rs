//! Injected collaborator contracts.
//!
//! The decision core never talks to a cloud provider directly. Builds,
//! capacity, traffic routing, health probes, telemetry, and compliance
//! flags are reached through these traits, so an AWS-style and an
//! Azure-style provider plug in behind the same abstraction. Methods
//! return boxed futures to keep the traits dyn-compatible.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::types::Artifact;

/// Boxed future alias used by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Builds a service image and returns the resulting artifact.
pub trait BuildService: Send + Sync {
    /// Build `service` at `commit_ref` according to `build_spec`
    /// (a provider-specific build file path or template name).
    fn build<'a>(
        &'a self,
        service: &'a str,
        commit_ref: &'a str,
        build_spec: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Artifact>>;
}

/// Provisions and tears down versioned serving capacity.
///
/// Capacity is addressed by (service, version); the provider maps that
/// to its own slot/ASG/deployment naming internally.
pub trait CapacityProvider: Send + Sync {
    /// Bring up capacity for `service` at `version`. Returns the
    /// endpoint the health prober and smoke test can address.
    fn provision<'a>(
        &'a self,
        service: &'a str,
        version: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<String>>;

    /// Tear down the capacity serving `service` at `version`.
    fn deprovision<'a>(
        &'a self,
        service: &'a str,
        version: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Health probing and synthetic-traffic validation for freshly
/// provisioned capacity.
pub trait HealthCheckService: Send + Sync {
    /// One health probe against `target`. `true` means healthy.
    fn is_healthy<'a>(&'a self, target: &'a str) -> BoxFuture<'a, bool>;

    /// Run synthetic-traffic validation against `target`. An `Err`
    /// carries the failure detail.
    fn run_smoke_test<'a>(&'a self, target: &'a str) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Traffic routing between the versions of one service.
pub trait TrafficRouter: Send + Sync {
    /// Set the traffic split for `service`. Keys are version labels,
    /// values are percentages summing to 100.
    fn set_split<'a>(
        &'a self,
        service: &'a str,
        split: &'a HashMap<String, u32>,
    ) -> BoxFuture<'a, anyhow::Result<()>>;

    /// Atomically exchange two slots of `service` (blue-green model).
    fn swap<'a>(
        &'a self,
        service: &'a str,
        slot_a: &'a str,
        slot_b: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Raw telemetry samples, tagged by service and version.
pub trait MetricsSource: Send + Sync {
    /// Samples observed for `metric` on `service`/`version` over the
    /// trailing `window`.
    fn query_range<'a>(
        &'a self,
        metric: &'a str,
        service: &'a str,
        version: &'a str,
        window: Duration,
    ) -> BoxFuture<'a, anyhow::Result<Vec<f64>>>;
}

/// Key-value lookup of per-service policy flags
/// (e.g. `gdpr_governed`, `change_approved`).
pub trait ComplianceDataSource: Send + Sync {
    fn policy_flags(&self, service: &str) -> HashMap<String, bool>;
}

/// A static flag table is enough for tests and single-process setups.
impl ComplianceDataSource for HashMap<String, HashMap<String, bool>> {
    fn policy_flags(&self, service: &str) -> HashMap<String, bool> {
        self.get(service).cloned().unwrap_or_default()
    }
}
