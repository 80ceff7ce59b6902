//! Domain types for one release request.
//!
//! These types describe the inputs of a release (services, declared
//! dependencies) and the artifacts the core consumes from its
//! collaborators. All of them serialize to JSON for downstream
//! consumers of plans and reports.

use serde::{Deserialize, Serialize};

/// Unique identifier for a service within a release request.
pub type ServiceName = String;

/// A service participating in a release.
///
/// Exists for the lifetime of one deployment request. Mutated only by
/// the controller driving its rollout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceNode {
    pub name: ServiceName,
    /// Version currently serving traffic.
    pub current_version: String,
    /// Version being rolled out.
    pub target_version: String,
}

impl ServiceNode {
    pub fn new(name: &str, current_version: &str, target_version: &str) -> Self {
        Self {
            name: name.to_string(),
            current_version: current_version.to_string(),
            target_version: target_version.to_string(),
        }
    }
}

/// Ordering hint declared on a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyOrdering {
    /// The dependency must be fully released before the dependent.
    Before,
    /// The dependency is released after the dependent (mirror of `Before`).
    After,
    /// No ordering constraint; the pair may share a stage-group.
    ParallelWith,
}

/// A declared dependency between two services.
///
/// Declared once per release cycle by configuration; immutable during
/// resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyEdge {
    /// The service that depends on `dependency`.
    pub dependent: ServiceName,
    pub dependency: ServiceName,
    pub ordering: DependencyOrdering,
    /// Minimum dependency version the dependent can tolerate. When set,
    /// the resolver validates the dependency's target version against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<semver::VersionReq>,
}

impl DependencyEdge {
    pub fn new(dependent: &str, dependency: &str, ordering: DependencyOrdering) -> Self {
        Self {
            dependent: dependent.to_string(),
            dependency: dependency.to_string(),
            ordering,
            min_version: None,
        }
    }

    pub fn with_min_version(mut self, req: semver::VersionReq) -> Self {
        self.min_version = Some(req);
        self
    }
}

/// Outcome of the vulnerability scan on a built image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Passed,
    Warnings,
    Failed,
}

/// A built service artifact, produced by the injected [`crate::BuildService`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub service: ServiceName,
    pub version: String,
    /// Registry reference for the built image (ECR/ACR URI, etc.).
    pub image_ref: String,
    pub size_bytes: u64,
    pub scan_status: ScanStatus,
    /// Content digest of the image (e.g. "sha256:...").
    pub digest: String,
    /// Where the software bill of materials was published.
    pub sbom_ref: String,
}
