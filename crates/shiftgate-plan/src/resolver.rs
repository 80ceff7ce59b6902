//! Deployment stage ordering.
//!
//! Kahn-style layering: repeatedly collect the services whose
//! `Before`-dependencies are all already staged; each collected set
//! becomes the next stage-group. When no service is eligible while
//! some remain, the remainder is a cycle and is reported rather than
//! silently dropped.
//!
//! Determinism: for equal eligibility, group membership follows input
//! order, so identical input always yields an identical plan.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shiftgate_core::{DependencyEdge, DependencyOrdering, ServiceNode};

use crate::error::PlanError;

/// Ordered stage-groups plus any resolution errors.
///
/// A non-empty `errors` list means the plan is incomplete: callers must
/// not release the services named by [`PlanError::affected`]. Cyclic
/// services are absent from `stages`; version-conflicted services are
/// still staged (the conflict is a policy failure, not an ordering one)
/// and it is the caller's job to hold them back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentPlan {
    pub stages: Vec<Vec<String>>,
    pub errors: Vec<PlanError>,
}

impl DeploymentPlan {
    /// Total number of staged services.
    pub fn staged_count(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    /// Whether every requested service was staged without errors.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Normalize edges to `Before` form: dependent -> dependencies that
/// must be staged first.
///
/// `After` edges are mirrored, `ParallelWith` edges impose nothing,
/// and self-edges are ignored.
pub fn before_map(edges: &[DependencyEdge]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for edge in edges {
        let (dependent, dependency) = match edge.ordering {
            DependencyOrdering::Before => (&edge.dependent, &edge.dependency),
            DependencyOrdering::After => (&edge.dependency, &edge.dependent),
            DependencyOrdering::ParallelWith => continue,
        };
        if dependent == dependency {
            continue;
        }
        let deps = map.entry(dependent.clone()).or_default();
        if !deps.contains(dependency) {
            deps.push(dependency.clone());
        }
    }
    map
}

/// Compute the deployment plan for `services` under `edges`.
///
/// Edges naming services outside the release set impose no ordering
/// constraint; those dependencies are treated as already deployed.
pub fn resolve(services: &[ServiceNode], edges: &[DependencyEdge]) -> DeploymentPlan {
    let known: HashSet<&str> = services.iter().map(|s| s.name.as_str()).collect();
    let before = before_map(edges);

    let mut errors = validate_versions(services, edges);

    let mut staged: HashSet<&str> = HashSet::new();
    let mut remaining: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
    let mut stages: Vec<Vec<String>> = Vec::new();

    while !remaining.is_empty() {
        let ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|service| {
                before.get(*service).is_none_or(|deps| {
                    deps.iter()
                        .all(|d| staged.contains(d.as_str()) || !known.contains(d.as_str()))
                })
            })
            .collect();

        if ready.is_empty() {
            let cyclic: Vec<String> = remaining.iter().map(|s| s.to_string()).collect();
            warn!(services = ?cyclic, "circular dependency detected, halting resolution");
            errors.push(PlanError::CircularDependency { services: cyclic });
            break;
        }

        debug!(stage = stages.len(), members = ?ready, "stage-group resolved");
        remaining.retain(|s| !ready.contains(s));
        staged.extend(ready.iter().copied());
        stages.push(ready.into_iter().map(str::to_string).collect());
    }

    DeploymentPlan { stages, errors }
}

/// Check `min_version` constraints against the release's target versions.
///
/// A dependency outside the release set has an unknown deployed version
/// and is skipped, as is a target version that does not parse as semver
/// (git SHAs and the like carry no ordering).
fn validate_versions(services: &[ServiceNode], edges: &[DependencyEdge]) -> Vec<PlanError> {
    let targets: HashMap<&str, &str> = services
        .iter()
        .map(|s| (s.name.as_str(), s.target_version.as_str()))
        .collect();

    let mut errors = Vec::new();
    for edge in edges {
        let Some(req) = &edge.min_version else {
            continue;
        };
        let Some(actual) = targets.get(edge.dependency.as_str()) else {
            continue;
        };
        match semver::Version::parse(actual) {
            Ok(version) if req.matches(&version) => {}
            Ok(version) => errors.push(PlanError::VersionConflict {
                dependent: edge.dependent.clone(),
                dependency: edge.dependency.clone(),
                required: req.to_string(),
                actual: version.to_string(),
            }),
            Err(_) => {
                debug!(
                    dependency = %edge.dependency,
                    version = %actual,
                    "target version is not semver, skipping min-version check"
                );
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> ServiceNode {
        ServiceNode::new(name, "1.0.0", "1.1.0")
    }

    fn before(dependent: &str, dependency: &str) -> DependencyEdge {
        DependencyEdge::new(dependent, dependency, DependencyOrdering::Before)
    }

    #[test]
    fn independent_services_share_one_stage() {
        let plan = resolve(&[node("a"), node("b"), node("c")], &[]);
        assert!(plan.is_complete());
        assert_eq!(plan.stages, vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn before_edge_orders_stages() {
        let services = [node("auth"), node("payment"), node("notify")];
        let edges = [before("payment", "auth"), before("notify", "payment")];
        let plan = resolve(&services, &edges);

        assert!(plan.is_complete());
        assert_eq!(
            plan.stages,
            vec![vec!["auth"], vec!["payment"], vec!["notify"]]
        );
    }

    #[test]
    fn after_edge_is_mirrored() {
        // "auth is released after payment" puts payment first.
        let services = [node("auth"), node("payment")];
        let edges = [DependencyEdge::new(
            "payment",
            "auth",
            DependencyOrdering::After,
        )];
        let plan = resolve(&services, &edges);

        assert_eq!(plan.stages, vec![vec!["payment"], vec!["auth"]]);
    }

    #[test]
    fn parallel_edge_imposes_nothing() {
        let services = [node("a"), node("b")];
        let edges = [DependencyEdge::new(
            "a",
            "b",
            DependencyOrdering::ParallelWith,
        )];
        let plan = resolve(&services, &edges);

        assert_eq!(plan.stages, vec![vec!["a", "b"]]);
    }

    #[test]
    fn every_service_staged_exactly_once() {
        let services = [node("a"), node("b"), node("c"), node("d")];
        let edges = [before("b", "a"), before("c", "a"), before("d", "b")];
        let plan = resolve(&services, &edges);

        let mut seen: Vec<&str> = plan
            .stages
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec!["a", "b", "c", "d"]);

        // No group contains a service alongside an unresolved dependency.
        let mut staged: HashSet<&str> = HashSet::new();
        let before = before_map(&edges);
        for group in &plan.stages {
            for service in group {
                if let Some(deps) = before.get(service) {
                    for dep in deps {
                        assert!(staged.contains(dep.as_str()), "{service} staged before {dep}");
                    }
                }
            }
            staged.extend(group.iter().map(String::as_str));
        }
    }

    #[test]
    fn cycle_reported_not_dropped() {
        let services = [node("a"), node("b"), node("c")];
        let edges = [before("a", "b"), before("b", "a")];
        let plan = resolve(&services, &edges);

        // "c" still stages; the cyclic pair is reported.
        assert_eq!(plan.stages, vec![vec!["c"]]);
        assert_eq!(plan.errors.len(), 1);
        match &plan.errors[0] {
            PlanError::CircularDependency { services } => {
                assert_eq!(services, &["a", "b"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
        assert!(!plan.is_complete());
    }

    #[test]
    fn dependency_outside_release_set_is_already_deployed() {
        // "payment" depends on "auth", which is not being released.
        let plan = resolve(&[node("payment")], &[before("payment", "auth")]);
        assert!(plan.is_complete());
        assert_eq!(plan.stages, vec![vec!["payment"]]);
    }

    #[test]
    fn identical_input_yields_identical_plan() {
        let services = [node("z"), node("m"), node("a")];
        let first = resolve(&services, &[]);
        let second = resolve(&services, &[]);
        assert_eq!(first, second);
        // Input order, not alphabetical.
        assert_eq!(first.stages, vec![vec!["z", "m", "a"]]);
    }

    #[test]
    fn plan_serializes_to_json() {
        let plan = resolve(&[node("a"), node("b")], &[before("b", "a")]);
        let json = serde_json::to_string(&plan).unwrap();
        let back: DeploymentPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn min_version_conflict_reported() {
        let services = [
            ServiceNode::new("auth", "2.0.0", "2.0.3"),
            ServiceNode::new("payment", "3.0.0", "3.1.0"),
        ];
        let edges = [before("payment", "auth")
            .with_min_version(semver::VersionReq::parse(">=2.1.0").unwrap())];
        let plan = resolve(&services, &edges);

        // Ordering still resolves; the conflict is reported alongside.
        assert_eq!(plan.stages, vec![vec!["auth"], vec!["payment"]]);
        assert_eq!(plan.errors.len(), 1);
        match &plan.errors[0] {
            PlanError::VersionConflict {
                dependent, actual, ..
            } => {
                assert_eq!(dependent, "payment");
                assert_eq!(actual, "2.0.3");
            }
            other => panic!("expected version conflict, got {other:?}"),
        }
    }

    #[test]
    fn min_version_satisfied_is_silent() {
        let services = [
            ServiceNode::new("auth", "2.0.0", "2.2.0"),
            ServiceNode::new("payment", "3.0.0", "3.1.0"),
        ];
        let edges = [before("payment", "auth")
            .with_min_version(semver::VersionReq::parse(">=2.1.0").unwrap())];
        assert!(resolve(&services, &edges).is_complete());
    }

    #[test]
    fn non_semver_target_skips_version_check() {
        let services = [
            ServiceNode::new("auth", "abc1234", "def5678"),
            ServiceNode::new("payment", "3.0.0", "3.1.0"),
        ];
        let edges = [before("payment", "auth")
            .with_min_version(semver::VersionReq::parse(">=2.1.0").unwrap())];
        assert!(resolve(&services, &edges).is_complete());
    }
}
