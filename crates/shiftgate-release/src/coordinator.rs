//! The release coordinator.
//!
//! Drives one multi-service release: concurrent artifact builds, risk
//! pre-flight, plan resolution, then stage-group execution. Groups run
//! in plan order; within a group every eligible service gets its own
//! rollout controller on the join set, and the next group starts only
//! once the current one has fully settled. One rollout per service at
//! a time: the coordinator is the only place controllers are spawned.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use shiftgate_core::{Artifact, BuildService, DependencyEdge, ServiceNode};
use shiftgate_plan::{DeploymentPlan, before_map, resolve};
use shiftgate_risk::{AssessmentContext, RiskEngine, RiskReport};
use shiftgate_rollout::{
    Collaborators, GateMode, RolloutConfig, RolloutController, RolloutState, RolloutStatus,
    RolloutStrategy, TransitionEvent,
};

/// One service in a release request.
#[derive(Debug, Clone)]
pub struct ReleaseItem {
    pub node: ServiceNode,
    /// Commit to build.
    pub commit_ref: String,
    /// Provider-specific build file.
    pub build_spec: String,
    /// Overrides the release-wide strategy when set.
    pub strategy: Option<RolloutStrategy>,
}

impl ReleaseItem {
    pub fn new(node: ServiceNode) -> Self {
        let commit_ref = node.target_version.clone();
        Self {
            node,
            commit_ref,
            build_spec: "Dockerfile".to_string(),
            strategy: None,
        }
    }
}

/// A release request: the services, their declared edges, and the
/// target environment.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub environment: String,
    pub items: Vec<ReleaseItem>,
    pub edges: Vec<DependencyEdge>,
}

/// How one service ended up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ServiceOutcome {
    Succeeded,
    /// Rolled back after traffic had shifted.
    RolledBack { reason: String },
    /// Failed before traffic exposure (build, provisioning, health,
    /// smoke).
    Failed { reason: String },
    /// Never started: risk gate, plan error, or a failed dependency.
    Blocked { reason: String },
}

/// Everything a release produced, for downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseReport {
    pub started_at: u64,
    pub finished_at: u64,
    pub environment: String,
    pub plan: DeploymentPlan,
    pub artifacts: BTreeMap<String, Artifact>,
    pub risk: BTreeMap<String, RiskReport>,
    pub outcomes: BTreeMap<String, ServiceOutcome>,
    /// Full rollout states, transition logs included.
    pub rollouts: BTreeMap<String, RolloutState>,
}

impl ReleaseReport {
    /// Whether every requested service reached Succeeded.
    pub fn fully_succeeded(&self) -> bool {
        !self.outcomes.is_empty()
            && self
                .outcomes
                .values()
                .all(|o| matches!(o, ServiceOutcome::Succeeded))
    }

    pub fn outcome(&self, service: &str) -> Option<&ServiceOutcome> {
        self.outcomes.get(service)
    }
}

/// Coordinates one release at a time.
pub struct ReleaseCoordinator {
    build: Arc<dyn BuildService>,
    collab: Collaborators,
    engine: RiskEngine,
    strategy: RolloutStrategy,
    rollout_config: RolloutConfig,
    gate: GateMode,
    events: Option<mpsc::UnboundedSender<TransitionEvent>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl ReleaseCoordinator {
    pub fn new(build: Arc<dyn BuildService>, collab: Collaborators, engine: RiskEngine) -> Self {
        Self {
            build,
            collab,
            engine,
            strategy: RolloutStrategy::default(),
            rollout_config: RolloutConfig::default(),
            gate: GateMode::default(),
            events: None,
            cancel: None,
        }
    }

    /// Release-wide default strategy (items may override).
    pub fn with_strategy(mut self, strategy: RolloutStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_rollout_config(mut self, config: RolloutConfig) -> Self {
        self.rollout_config = config;
        self
    }

    pub fn with_gate(mut self, gate: GateMode) -> Self {
        self.gate = gate;
        self
    }

    /// Forward every rollout transition on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<TransitionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Propagate operator cancellation to every controller.
    pub fn with_cancel(mut self, rx: watch::Receiver<bool>) -> Self {
        self.cancel = Some(rx);
        self
    }

    /// The risk engine, for insight queries between releases.
    pub fn engine(&self) -> &RiskEngine {
        &self.engine
    }

    /// Execute the release to completion and report per-service
    /// outcomes. Never aborts early: a failed service only blocks its
    /// dependents.
    pub async fn execute(&mut self, request: &ReleaseRequest) -> ReleaseReport {
        let started_at = epoch_secs();
        info!(
            services = request.items.len(),
            environment = %request.environment,
            "release starting"
        );

        let mut outcomes: BTreeMap<String, ServiceOutcome> = BTreeMap::new();

        // Build artifacts for every service concurrently; there is no
        // ordering constraint between builds.
        let mut artifacts: BTreeMap<String, Artifact> = BTreeMap::new();
        for (service, result) in self.build_all(request).await {
            match result {
                Ok(artifact) => {
                    artifacts.insert(service, artifact);
                }
                Err(e) => {
                    warn!(%service, error = %e, "build failed");
                    outcomes.insert(
                        service,
                        ServiceOutcome::Failed {
                            reason: format!("build failed: {e}"),
                        },
                    );
                }
            }
        }

        // Risk pre-flight: a report without autonomous approval keeps
        // the service out of the rollout.
        let mut risk: BTreeMap<String, RiskReport> = BTreeMap::new();
        let hour = current_hour_utc();
        for item in &request.items {
            if outcomes.contains_key(&item.node.name) {
                continue;
            }
            let report = self.engine.assess(&AssessmentContext {
                service: &item.node.name,
                version: &item.node.target_version,
                environment: &request.environment,
                hour_of_day: hour,
                artifact: artifacts.get(&item.node.name),
            });
            if !report.autonomous_approval {
                outcomes.insert(
                    item.node.name.clone(),
                    ServiceOutcome::Blocked {
                        reason: format!("risk gate (score {}): {}", report.score, report.recommendation),
                    },
                );
            }
            risk.insert(item.node.name.clone(), report);
        }

        // Dependency staging. Plan errors block the services they
        // name; everything else proceeds.
        let nodes: Vec<ServiceNode> = request.items.iter().map(|i| i.node.clone()).collect();
        let plan = resolve(&nodes, &request.edges);
        for plan_error in &plan.errors {
            warn!(error = %plan_error, "plan error");
            for service in plan_error.affected() {
                outcomes
                    .entry(service.to_string())
                    .or_insert_with(|| ServiceOutcome::Blocked {
                        reason: plan_error.to_string(),
                    });
            }
        }

        // Execute stage-groups in order. The next group starts only
        // when every controller in this one has settled.
        let items_by_name: HashMap<&str, &ReleaseItem> = request
            .items
            .iter()
            .map(|item| (item.node.name.as_str(), item))
            .collect();
        let in_release: HashSet<&str> = items_by_name.keys().copied().collect();
        let before = before_map(&request.edges);

        let mut succeeded: HashSet<String> = HashSet::new();
        let mut rollouts: BTreeMap<String, RolloutState> = BTreeMap::new();

        for (group_index, group) in plan.stages.iter().enumerate() {
            let mut join: JoinSet<RolloutState> = JoinSet::new();

            for service in group {
                if outcomes.contains_key(service) {
                    debug!(%service, "skipping rollout, already settled");
                    continue;
                }
                if let Some(unmet) = self.unmet_dependency(service, &before, &in_release, &succeeded)
                {
                    outcomes.insert(
                        service.clone(),
                        ServiceOutcome::Blocked {
                            reason: format!("dependency {unmet} did not succeed"),
                        },
                    );
                    continue;
                }
                let Some(item) = items_by_name.get(service.as_str()) else {
                    continue;
                };

                let strategy = item
                    .strategy
                    .clone()
                    .unwrap_or_else(|| self.strategy.clone());
                let mut controller = RolloutController::new(
                    item.node.clone(),
                    strategy,
                    self.rollout_config.clone(),
                    self.gate.clone(),
                    self.collab.clone(),
                );
                if let Some(tx) = &self.events {
                    controller = controller.with_events(tx.clone());
                }
                if let Some(rx) = &self.cancel {
                    controller = controller.with_cancel(rx.clone());
                }
                join.spawn(controller.run());
            }

            while let Some(result) = join.join_next().await {
                match result {
                    Ok(state) => {
                        let outcome = match &state.status {
                            RolloutStatus::Succeeded => {
                                succeeded.insert(state.service.clone());
                                ServiceOutcome::Succeeded
                            }
                            RolloutStatus::RolledBack { reason } => ServiceOutcome::RolledBack {
                                reason: reason.clone(),
                            },
                            RolloutStatus::Failed { reason } => ServiceOutcome::Failed {
                                reason: reason.clone(),
                            },
                            other => ServiceOutcome::Failed {
                                reason: format!(
                                    "rollout ended in non-terminal state {}",
                                    other.label()
                                ),
                            },
                        };
                        outcomes.insert(state.service.clone(), outcome);
                        rollouts.insert(state.service.clone(), state);
                    }
                    Err(e) => {
                        error!(error = %e, "rollout task aborted");
                    }
                }
            }
            debug!(group = group_index, "stage-group settled");
        }

        let report = ReleaseReport {
            started_at,
            finished_at: epoch_secs(),
            environment: request.environment.clone(),
            plan,
            artifacts,
            risk,
            outcomes,
            rollouts,
        };
        info!(
            succeeded = report
                .outcomes
                .values()
                .filter(|o| matches!(o, ServiceOutcome::Succeeded))
                .count(),
            total = report.outcomes.len(),
            "release finished"
        );
        report
    }

    /// First `Before`-dependency of `service` that is part of this
    /// release but has not succeeded.
    fn unmet_dependency<'a>(
        &self,
        service: &str,
        before: &'a HashMap<String, Vec<String>>,
        in_release: &HashSet<&str>,
        succeeded: &HashSet<String>,
    ) -> Option<&'a str> {
        before.get(service)?.iter().find_map(|dep| {
            if in_release.contains(dep.as_str()) && !succeeded.contains(dep) {
                Some(dep.as_str())
            } else {
                None
            }
        })
    }

    /// Run every build concurrently and collect per-service results.
    async fn build_all(
        &self,
        request: &ReleaseRequest,
    ) -> BTreeMap<String, anyhow::Result<Artifact>> {
        let mut join = JoinSet::new();
        for item in &request.items {
            let build = self.build.clone();
            let service = item.node.name.clone();
            let commit_ref = item.commit_ref.clone();
            let build_spec = item.build_spec.clone();
            join.spawn(async move {
                let result = build.build(&service, &commit_ref, &build_spec).await;
                (service, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok((service, result)) => {
                    results.insert(service, result);
                }
                Err(e) => error!(error = %e, "build task aborted"),
            }
        }
        results
    }
}

fn current_hour_utc() -> u8 {
    (epoch_secs() / 3600 % 24) as u8
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use shiftgate_core::{
        BoxFuture, CapacityProvider, DependencyOrdering, HealthCheckService, MetricsSource,
        ScanStatus, TrafficRouter,
    };
    use shiftgate_risk::{
        ComplianceEvaluator, InfrastructureEvaluator, SecurityEvaluator, SecuritySignals,
        TestingEvaluator, TestingSignals,
    };

    use super::*;

    /// Builds succeed except for the listed services.
    struct ScriptedBuild {
        failing: HashSet<String>,
    }

    impl BuildService for ScriptedBuild {
        fn build<'a>(
            &'a self,
            service: &'a str,
            commit_ref: &'a str,
            _build_spec: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<Artifact>> {
            Box::pin(async move {
                if self.failing.contains(service) {
                    anyhow::bail!("compile error in {service}");
                }
                Ok(Artifact {
                    service: service.to_string(),
                    version: commit_ref.to_string(),
                    image_ref: format!("registry.example.com/{service}:{commit_ref}"),
                    size_bytes: 245_300_000,
                    scan_status: ScanStatus::Passed,
                    digest: "sha256:abcd1234".to_string(),
                    sbom_ref: format!("s3://sbom/{service}.json"),
                })
            })
        }
    }

    /// Ordered log of every traffic action across all services.
    #[derive(Default)]
    struct TrafficLog {
        entries: Mutex<Vec<(String, u32)>>,
    }

    struct LoggingRouter {
        log: Arc<TrafficLog>,
    }

    impl TrafficRouter for LoggingRouter {
        fn set_split<'a>(
            &'a self,
            service: &'a str,
            split: &'a HashMap<String, u32>,
        ) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                // Only the ordering of entries matters to these tests.
                let weight = split.values().max().copied().unwrap_or(0);
                self.log
                    .entries
                    .lock()
                    .unwrap()
                    .push((service.to_string(), weight));
                Ok(())
            })
        }

        fn swap<'a>(
            &'a self,
            service: &'a str,
            _slot_a: &'a str,
            _slot_b: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                self.log
                    .entries
                    .lock()
                    .unwrap()
                    .push((service.to_string(), 100));
                Ok(())
            })
        }
    }

    struct InstantCapacity;

    impl CapacityProvider for InstantCapacity {
        fn provision<'a>(
            &'a self,
            service: &'a str,
            version: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<String>> {
            Box::pin(async move { Ok(format!("{service}-{version}.internal:8080")) })
        }

        fn deprovision<'a>(
            &'a self,
            _service: &'a str,
            _version: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move { Ok(()) })
        }
    }

    struct AlwaysHealthy;

    impl HealthCheckService for AlwaysHealthy {
        fn is_healthy<'a>(&'a self, _target: &'a str) -> BoxFuture<'a, bool> {
            Box::pin(async move { true })
        }

        fn run_smoke_test<'a>(&'a self, _target: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move { Ok(()) })
        }
    }

    /// Every metric reads healthy, for every service.
    struct QuietMetrics;

    impl MetricsSource for QuietMetrics {
        fn query_range<'a>(
            &'a self,
            metric: &'a str,
            _service: &'a str,
            _version: &'a str,
            _window: Duration,
        ) -> BoxFuture<'a, anyhow::Result<Vec<f64>>> {
            Box::pin(async move {
                let value = match metric {
                    "error_rate" => 0.3,
                    "request_latency_p99" => 80.0,
                    "cpu_usage" => 45.0,
                    _ => 1.0,
                };
                Ok(vec![value])
            })
        }
    }

    /// A risk engine whose signals clear the autonomous gate for the
    /// given services.
    fn benign_engine(services: &[&str]) -> RiskEngine {
        let testing: HashMap<String, TestingSignals> = services
            .iter()
            .map(|s| {
                (
                    s.to_string(),
                    TestingSignals {
                        code_coverage: 88,
                        ..Default::default()
                    },
                )
            })
            .collect();
        let compliance: HashMap<String, HashMap<String, bool>> = services
            .iter()
            .map(|s| {
                (
                    s.to_string(),
                    HashMap::from([("change_approved".to_string(), true)]),
                )
            })
            .collect();
        RiskEngine::new(vec![
            Box::new(SecurityEvaluator::new(HashMap::new())),
            Box::new(TestingEvaluator::new(testing)),
            Box::new(ComplianceEvaluator::new(Arc::new(compliance))),
            Box::new(InfrastructureEvaluator::new(HashMap::new())),
        ])
    }

    fn fast_config() -> RolloutConfig {
        RolloutConfig {
            health_timeout: Duration::from_millis(50),
            health_poll_interval: Duration::from_millis(5),
            dwell: Duration::ZERO,
            monitor_poll_interval: Duration::from_millis(5),
            metrics_window: Duration::from_secs(60),
        }
    }

    fn coordinator(
        services: &[&str],
        failing_builds: &[&str],
        log: Arc<TrafficLog>,
    ) -> ReleaseCoordinator {
        let collab = Collaborators {
            capacity: Arc::new(InstantCapacity),
            health: Arc::new(AlwaysHealthy),
            router: Arc::new(LoggingRouter { log }),
            metrics: Arc::new(QuietMetrics),
        };
        let build = Arc::new(ScriptedBuild {
            failing: failing_builds.iter().map(|s| s.to_string()).collect(),
        });
        ReleaseCoordinator::new(build, collab, benign_engine(services))
            .with_rollout_config(fast_config())
    }

    fn item(name: &str) -> ReleaseItem {
        ReleaseItem::new(ServiceNode::new(name, "1.0.0", "1.1.0"))
    }

    fn request(services: &[&str], edges: Vec<DependencyEdge>) -> ReleaseRequest {
        ReleaseRequest {
            environment: "production".to_string(),
            items: services.iter().map(|s| item(s)).collect(),
            edges,
        }
    }

    fn before(dependent: &str, dependency: &str) -> DependencyEdge {
        DependencyEdge::new(dependent, dependency, DependencyOrdering::Before)
    }

    #[tokio::test]
    async fn independent_services_all_succeed() {
        let log = Arc::new(TrafficLog::default());
        let mut coordinator = coordinator(&["auth", "billing"], &[], log.clone());

        let report = coordinator
            .execute(&request(&["auth", "billing"], Vec::new()))
            .await;

        assert!(report.fully_succeeded());
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.artifacts.len(), 2);
        assert_eq!(report.risk.len(), 2);
        assert_eq!(report.rollouts.len(), 2);
        assert!(report.plan.is_complete());
    }

    #[tokio::test]
    async fn dependency_groups_run_in_order() {
        let log = Arc::new(TrafficLog::default());
        let mut coordinator = coordinator(&["auth", "payment"], &[], log.clone());

        let report = coordinator
            .execute(&request(&["auth", "payment"], vec![before("payment", "auth")]))
            .await;
        assert!(report.fully_succeeded());

        // Every auth traffic action precedes every payment action.
        let entries = log.entries.lock().unwrap();
        let last_auth = entries
            .iter()
            .rposition(|(s, _)| s == "auth")
            .unwrap();
        let first_payment = entries
            .iter()
            .position(|(s, _)| s == "payment")
            .unwrap();
        assert!(
            last_auth < first_payment,
            "auth must fully settle before payment starts"
        );
    }

    #[tokio::test]
    async fn build_failure_blocks_dependents_only() {
        let log = Arc::new(TrafficLog::default());
        let mut coordinator =
            coordinator(&["auth", "payment", "search"], &["auth"], log.clone());

        let report = coordinator
            .execute(&request(
                &["auth", "payment", "search"],
                vec![before("payment", "auth")],
            ))
            .await;

        assert!(matches!(
            report.outcome("auth"),
            Some(ServiceOutcome::Failed { reason }) if reason.contains("build failed")
        ));
        assert!(matches!(
            report.outcome("payment"),
            Some(ServiceOutcome::Blocked { reason }) if reason.contains("auth")
        ));
        // The independent service still released.
        assert_eq!(report.outcome("search"), Some(&ServiceOutcome::Succeeded));
        assert!(!report.fully_succeeded());

        // No traffic ever moved for auth or payment.
        let entries = log.entries.lock().unwrap();
        assert!(entries.iter().all(|(s, _)| s == "search"));
    }

    #[tokio::test]
    async fn risk_gate_blocks_service() {
        let log = Arc::new(TrafficLog::default());
        let collab = Collaborators {
            capacity: Arc::new(InstantCapacity),
            health: Arc::new(AlwaysHealthy),
            router: Arc::new(LoggingRouter { log: log.clone() }),
            metrics: Arc::new(QuietMetrics),
        };
        let build = Arc::new(ScriptedBuild {
            failing: HashSet::new(),
        });

        // "billing" carries hardcoded secrets; "auth" is clean.
        let security = HashMap::from([(
            "billing".to_string(),
            SecuritySignals {
                secrets_detected: true,
                ..Default::default()
            },
        )]);
        let testing: HashMap<String, TestingSignals> = ["auth", "billing"]
            .iter()
            .map(|s| {
                (
                    s.to_string(),
                    TestingSignals {
                        code_coverage: 88,
                        ..Default::default()
                    },
                )
            })
            .collect();
        let compliance: HashMap<String, HashMap<String, bool>> = ["auth", "billing"]
            .iter()
            .map(|s| {
                (
                    s.to_string(),
                    HashMap::from([("change_approved".to_string(), true)]),
                )
            })
            .collect();
        let engine = RiskEngine::new(vec![
            Box::new(SecurityEvaluator::new(security)),
            Box::new(TestingEvaluator::new(testing)),
            Box::new(ComplianceEvaluator::new(Arc::new(compliance))),
            Box::new(InfrastructureEvaluator::new(HashMap::new())),
        ]);

        let mut coordinator = ReleaseCoordinator::new(build, collab, engine)
            .with_rollout_config(fast_config());
        let report = coordinator
            .execute(&request(&["auth", "billing"], Vec::new()))
            .await;

        assert_eq!(report.outcome("auth"), Some(&ServiceOutcome::Succeeded));
        assert!(matches!(
            report.outcome("billing"),
            Some(ServiceOutcome::Blocked { reason }) if reason.contains("risk gate")
        ));
        // The blocked service still has its report for the operator.
        assert!(!report.risk["billing"].autonomous_approval);
        let entries = log.entries.lock().unwrap();
        assert!(entries.iter().all(|(s, _)| s == "auth"));
    }

    #[tokio::test]
    async fn cycle_blocks_members_not_bystanders() {
        let log = Arc::new(TrafficLog::default());
        let mut coordinator = coordinator(&["a", "b", "c"], &[], log.clone());

        let report = coordinator
            .execute(&request(
                &["a", "b", "c"],
                vec![before("a", "b"), before("b", "a")],
            ))
            .await;

        assert!(matches!(
            report.outcome("a"),
            Some(ServiceOutcome::Blocked { reason }) if reason.contains("circular")
        ));
        assert!(matches!(
            report.outcome("b"),
            Some(ServiceOutcome::Blocked { .. })
        ));
        assert_eq!(report.outcome("c"), Some(&ServiceOutcome::Succeeded));
        assert!(!report.plan.is_complete());
    }

    #[tokio::test]
    async fn version_conflict_blocks_dependent_only() {
        let log = Arc::new(TrafficLog::default());
        let mut coordinator = coordinator(&["auth", "payment"], &[], log.clone());

        let mut request = ReleaseRequest {
            environment: "production".to_string(),
            items: vec![
                ReleaseItem::new(ServiceNode::new("auth", "2.0.0", "2.0.3")),
                ReleaseItem::new(ServiceNode::new("payment", "3.0.0", "3.1.0")),
            ],
            edges: vec![before("payment", "auth")],
        };
        request.edges[0].min_version = Some(semver::VersionReq::parse(">=2.1.0").unwrap());

        let report = coordinator.execute(&request).await;

        // The dependency itself is fine and releases.
        assert_eq!(report.outcome("auth"), Some(&ServiceOutcome::Succeeded));
        assert!(matches!(
            report.outcome("payment"),
            Some(ServiceOutcome::Blocked { reason }) if reason.contains(">=2.1.0")
        ));
    }

    #[tokio::test]
    async fn events_forwarded_from_all_controllers() {
        let log = Arc::new(TrafficLog::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut coordinator = coordinator(&["auth", "billing"], &[], log.clone())
            .with_events(tx);

        let report = coordinator
            .execute(&request(&["auth", "billing"], Vec::new()))
            .await;
        assert!(report.fully_succeeded());

        let mut services = HashSet::new();
        while let Ok(event) = rx.try_recv() {
            services.insert(event.service);
        }
        assert!(services.contains("auth"));
        assert!(services.contains("billing"));
    }

    #[tokio::test]
    async fn report_serializes_to_json() {
        let log = Arc::new(TrafficLog::default());
        let mut coordinator = coordinator(&["auth"], &[], log.clone());
        let report = coordinator.execute(&request(&["auth"], Vec::new())).await;

        let json = serde_json::to_string(&report).unwrap();
        let back: ReleaseReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[tokio::test]
    async fn risk_history_accumulates_across_releases() {
        let log = Arc::new(TrafficLog::default());
        let mut coordinator = coordinator(&["auth"], &[], log.clone());
        coordinator.execute(&request(&["auth"], Vec::new())).await;
        coordinator.execute(&request(&["auth"], Vec::new())).await;

        let insights = coordinator.engine().insights().unwrap();
        assert_eq!(insights.total_assessments, 2);
        assert_eq!(insights.approval_rate, 1.0);
    }
}
