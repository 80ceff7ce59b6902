//! Rollout controller: drives one service's rollout end to end.
//!
//! The controller provisions candidate capacity, gates it through
//! health and smoke checks, shifts traffic per the strategy's weight
//! sequence, and observes metrics at every stage. On any post-shift
//! failure it returns 100% of traffic to the baseline before entering
//! a terminal state; rollback is never partial and no stage is
//! re-entered afterwards.
//!
//! The controller is the sole writer of its service's traffic split
//! for the lifetime of the rollout. Within it, stages are strictly
//! sequential.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{error, info, warn};

use shiftgate_core::{
    CapacityProvider, HealthCheckService, MetricsSource, ServiceNode, TrafficRouter,
};
use shiftgate_metrics::{
    ComparisonConfig, ComparisonEvaluator, GateThresholds, evaluate_thresholds,
    sample_stage_metrics,
};

use crate::state::{FailureDetail, RolloutState, RolloutStatus, TransitionEvent};
use crate::strategy::RolloutStrategy;

/// Timing knobs for one rollout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RolloutConfig {
    /// Maximum wait for the candidate to report healthy.
    pub health_timeout: Duration,
    /// Pause between health probes.
    pub health_poll_interval: Duration,
    /// Observation window held at each traffic weight.
    pub dwell: Duration,
    /// Pause between gate evaluations inside the dwell.
    pub monitor_poll_interval: Duration,
    /// Trailing window for metric queries.
    pub metrics_window: Duration,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            health_timeout: Duration::from_secs(300),
            health_poll_interval: Duration::from_secs(5),
            dwell: Duration::from_secs(300),
            monitor_poll_interval: Duration::from_secs(30),
            metrics_window: Duration::from_secs(300),
        }
    }
}

/// How monitoring decides whether a stage is healthy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GateMode {
    /// Compare candidate metrics against the live baseline version.
    Compare(ComparisonConfig),
    /// Absolute ceilings on error rate, p99 latency, and CPU.
    Thresholds(GateThresholds),
}

impl Default for GateMode {
    fn default() -> Self {
        Self::Thresholds(GateThresholds::default())
    }
}

/// The injected collaborators a rollout needs.
#[derive(Clone)]
pub struct Collaborators {
    pub capacity: Arc<dyn CapacityProvider>,
    pub health: Arc<dyn HealthCheckService>,
    pub router: Arc<dyn TrafficRouter>,
    pub metrics: Arc<dyn MetricsSource>,
}

enum Wait {
    Ready,
    TimedOut,
    Cancelled,
}

enum Verdict {
    Healthy,
    Unhealthy(FailureDetail),
    Cancelled,
}

/// Drives the rollout state machine for a single service.
pub struct RolloutController {
    node: ServiceNode,
    state: RolloutState,
    config: RolloutConfig,
    gate: GateMode,
    collab: Collaborators,
    events: Option<mpsc::UnboundedSender<TransitionEvent>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl RolloutController {
    pub fn new(
        node: ServiceNode,
        strategy: RolloutStrategy,
        config: RolloutConfig,
        gate: GateMode,
        collab: Collaborators,
    ) -> Self {
        let state = RolloutState::new(&node.name, strategy);
        Self {
            node,
            state,
            config,
            gate,
            collab,
            events: None,
            cancel: None,
        }
    }

    /// Emit every accepted transition on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<TransitionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Honor operator cancellation signalled on `rx`.
    pub fn with_cancel(mut self, rx: watch::Receiver<bool>) -> Self {
        self.cancel = Some(rx);
        self
    }

    /// Run the rollout to a terminal state and hand the state back.
    pub async fn run(mut self) -> RolloutState {
        let service = self.node.name.clone();
        let baseline = self.node.current_version.clone();
        let target = self.node.target_version.clone();

        info!(
            %service,
            %baseline,
            %target,
            strategy = self.state.strategy.name(),
            "rollout starting"
        );

        self.set(RolloutStatus::Provisioning, None);
        let endpoint = match self.collab.capacity.provision(&service, &target).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.fail(
                    "provisioning failed",
                    FailureDetail::Provisioning {
                        error: e.to_string(),
                    },
                );
                return self.state;
            }
        };

        self.set(RolloutStatus::HealthCheck, None);
        match self.await_healthy(&endpoint).await {
            Wait::Ready => {}
            Wait::TimedOut => {
                self.release_candidate().await;
                self.fail(
                    "health check timeout",
                    FailureDetail::HealthCheckTimeout {
                        waited_secs: self.config.health_timeout.as_secs(),
                    },
                );
                return self.state;
            }
            Wait::Cancelled => {
                self.release_candidate().await;
                self.fail("cancelled by operator", FailureDetail::Cancelled);
                return self.state;
            }
        }

        self.set(RolloutStatus::SmokeTest, None);
        match self.run_smoke(&endpoint).await {
            Ok(Wait::Ready) => {}
            Ok(_) => {
                self.release_candidate().await;
                self.fail("cancelled by operator", FailureDetail::Cancelled);
                return self.state;
            }
            Err(e) => {
                self.release_candidate().await;
                self.fail(
                    "smoke test failure",
                    FailureDetail::SmokeTest {
                        error: e.to_string(),
                    },
                );
                return self.state;
            }
        }

        if self.state.strategy.is_blue_green() {
            self.run_blue_green().await;
        } else {
            self.run_staged().await;
        }

        self.state
    }

    /// Blue-green: one atomic switch, then a post-switch observation
    /// window. Degradation after the switch reverts it; a failed swap
    /// means traffic never moved.
    async fn run_blue_green(&mut self) {
        let service = self.node.name.clone();
        let baseline = self.node.current_version.clone();
        let target = self.node.target_version.clone();

        self.set(
            RolloutStatus::StageRouting { stage: 0 },
            Some(format!("atomic switch to {target}")),
        );
        if let Err(e) = self.collab.router.swap(&service, &baseline, &target).await {
            self.release_candidate().await;
            self.fail(
                "traffic swap failed",
                FailureDetail::TrafficRouting {
                    error: e.to_string(),
                },
            );
            return;
        }

        self.set(RolloutStatus::Monitoring { stage: 0 }, None);
        match self.observe_stage().await {
            Verdict::Healthy => {
                self.release_baseline().await;
                self.succeed();
            }
            Verdict::Unhealthy(detail) => {
                self.revert_swap(&service, &target, &baseline).await;
                self.roll_back(detail);
            }
            Verdict::Cancelled => {
                self.revert_swap(&service, &target, &baseline).await;
                self.roll_back(FailureDetail::Cancelled);
            }
        }
    }

    /// Canary/rolling: iterate the weight sequence, observing at each
    /// stage. Unhealthy means instant restore to baseline with the
    /// candidate capacity retained for inspection.
    async fn run_staged(&mut self) {
        let service = self.node.name.clone();
        let baseline = self.node.current_version.clone();
        let target = self.node.target_version.clone();
        let weights = self.state.stage_weights.clone();

        for (stage, weight) in weights.iter().enumerate() {
            self.set(
                RolloutStatus::StageRouting { stage },
                Some(format!("{weight}% to {target}")),
            );

            let split = HashMap::from([
                (target.clone(), *weight),
                (baseline.clone(), 100 - *weight),
            ]);
            if let Err(e) = self.collab.router.set_split(&service, &split).await {
                let detail = FailureDetail::TrafficRouting {
                    error: e.to_string(),
                };
                if stage == 0 {
                    // First shift never applied: nothing to restore.
                    self.release_candidate().await;
                    self.fail("traffic routing failed", detail);
                } else {
                    self.restore_baseline().await;
                    self.roll_back(detail);
                }
                return;
            }

            self.set(RolloutStatus::Monitoring { stage }, None);
            match self.observe_stage().await {
                Verdict::Healthy => {}
                Verdict::Unhealthy(detail) => {
                    self.restore_baseline().await;
                    self.roll_back(detail);
                    return;
                }
                Verdict::Cancelled => {
                    self.restore_baseline().await;
                    self.roll_back(FailureDetail::Cancelled);
                    return;
                }
            }
        }

        // Final weight held at 100%: the candidate owns all traffic.
        self.release_baseline().await;
        self.succeed();
    }

    /// Poll the candidate's health endpoint until healthy, timeout, or
    /// cancellation.
    async fn await_healthy(&mut self, endpoint: &str) -> Wait {
        let deadline = Instant::now() + self.config.health_timeout;
        loop {
            if self.collab.health.is_healthy(endpoint).await {
                return Wait::Ready;
            }
            if Instant::now() + self.config.health_poll_interval > deadline {
                return Wait::TimedOut;
            }
            if self.pause(self.config.health_poll_interval).await {
                return Wait::Cancelled;
            }
        }
    }

    /// Run the smoke test, racing operator cancellation.
    async fn run_smoke(&mut self, endpoint: &str) -> anyhow::Result<Wait> {
        let health = self.collab.health.clone();
        match self.cancel.as_mut() {
            None => {
                health.run_smoke_test(endpoint).await?;
                Ok(Wait::Ready)
            }
            Some(cancel) => {
                tokio::select! {
                    result = health.run_smoke_test(endpoint) => {
                        result?;
                        Ok(Wait::Ready)
                    }
                    _ = wait_cancelled(cancel) => Ok(Wait::Cancelled),
                }
            }
        }
    }

    /// Hold the dwell window, evaluating the gate at every poll
    /// interval. A disqualifying verdict short-circuits the window; a
    /// final evaluation always runs at the deadline.
    async fn observe_stage(&mut self) -> Verdict {
        let deadline = Instant::now() + self.config.dwell;
        loop {
            if let Some(detail) = self.evaluate_gate().await {
                return Verdict::Unhealthy(detail);
            }
            let now = Instant::now();
            if now >= deadline {
                return Verdict::Healthy;
            }
            let wait = self.config.monitor_poll_interval.min(deadline - now);
            if self.pause(wait).await {
                return Verdict::Cancelled;
            }
        }
    }

    /// One gate evaluation. `None` means no disqualifying signal. A
    /// telemetry outage is inconclusive and does not disqualify.
    async fn evaluate_gate(&mut self) -> Option<FailureDetail> {
        match &self.gate {
            GateMode::Thresholds(thresholds) => {
                let sampled = sample_stage_metrics(
                    self.collab.metrics.as_ref(),
                    &self.node.name,
                    &self.node.target_version,
                    self.config.metrics_window,
                )
                .await;
                match sampled {
                    Ok(observed) => {
                        let verdict = evaluate_thresholds(&observed, thresholds);
                        if verdict.healthy {
                            None
                        } else {
                            Some(FailureDetail::ThresholdBreach {
                                breaches: verdict.breaches,
                            })
                        }
                    }
                    Err(e) => {
                        warn!(
                            service = %self.node.name,
                            error = %e,
                            "stage metrics unavailable, gate inconclusive"
                        );
                        None
                    }
                }
            }
            GateMode::Compare(config) => {
                let evaluator =
                    ComparisonEvaluator::new(self.collab.metrics.clone(), config.clone());
                let compared = evaluator
                    .compare(
                        &self.node.name,
                        &self.node.current_version,
                        &self.node.target_version,
                        self.config.metrics_window,
                    )
                    .await;
                match compared {
                    Ok(comparison) if comparison.rollback_recommended => {
                        Some(FailureDetail::MetricDegradation {
                            issues: comparison.issues,
                        })
                    }
                    Ok(_) => None,
                    Err(e) => {
                        warn!(
                            service = %self.node.name,
                            error = %e,
                            "baseline comparison unavailable, gate inconclusive"
                        );
                        None
                    }
                }
            }
        }
    }

    /// Sleep for `duration` unless cancelled first. `true` means
    /// cancelled.
    async fn pause(&mut self, duration: Duration) -> bool {
        match self.cancel.as_mut() {
            None => {
                tokio::time::sleep(duration).await;
                false
            }
            Some(cancel) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => false,
                    _ = wait_cancelled(cancel) => true,
                }
            }
        }
    }

    /// Return 100% of traffic to the baseline version. Best effort: a
    /// routing error here is logged and the rollback decision stands.
    async fn restore_baseline(&mut self) {
        let split = HashMap::from([(self.node.current_version.clone(), 100)]);
        if let Err(e) = self.collab.router.set_split(&self.node.name, &split).await {
            error!(
                service = %self.node.name,
                error = %e,
                "failed to restore baseline traffic"
            );
        }
    }

    /// Undo the blue-green switch. Best effort, same as
    /// [`Self::restore_baseline`].
    async fn revert_swap(&mut self, service: &str, from: &str, to: &str) {
        if let Err(e) = self.collab.router.swap(service, from, to).await {
            error!(%service, error = %e, "failed to revert blue-green switch");
        }
    }

    /// Tear down the candidate capacity. Best effort.
    async fn release_candidate(&mut self) {
        let result = self
            .collab
            .capacity
            .deprovision(&self.node.name, &self.node.target_version)
            .await;
        if let Err(e) = result {
            warn!(
                service = %self.node.name,
                error = %e,
                "failed to deprovision candidate capacity"
            );
        }
    }

    /// Tear down the old-version capacity after a full cutover. Best
    /// effort.
    async fn release_baseline(&mut self) {
        let result = self
            .collab
            .capacity
            .deprovision(&self.node.name, &self.node.current_version)
            .await;
        if let Err(e) = result {
            warn!(
                service = %self.node.name,
                error = %e,
                "failed to deprovision old capacity"
            );
        }
    }

    fn succeed(&mut self) {
        self.set(RolloutStatus::Succeeded, None);
        info!(
            service = %self.node.name,
            version = %self.node.target_version,
            "rollout succeeded"
        );
    }

    fn fail(&mut self, reason: &str, detail: FailureDetail) {
        self.state.failure = Some(detail);
        self.set(
            RolloutStatus::Failed {
                reason: reason.to_string(),
            },
            Some(reason.to_string()),
        );
        warn!(service = %self.node.name, %reason, "rollout failed before traffic exposure");
    }

    fn roll_back(&mut self, detail: FailureDetail) {
        let reason = failure_reason(&detail);
        self.state.failure = Some(detail);
        self.set(
            RolloutStatus::RolledBack {
                reason: reason.clone(),
            },
            Some(reason.clone()),
        );
        warn!(service = %self.node.name, %reason, "rollout rolled back to baseline");
    }

    fn set(&mut self, next: RolloutStatus, reason: Option<String>) {
        match self.state.transition(next, reason) {
            Ok(event) => {
                if let Some(tx) = &self.events {
                    let _ = tx.send(event.clone());
                }
            }
            Err(e) => {
                error!(service = %self.state.service, error = %e, "rejected rollout transition");
            }
        }
    }
}

/// Resolves only when the operator requests cancellation. A dropped
/// sender means cancellation can no longer arrive.
async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Human-readable reason behind a rollback.
fn failure_reason(detail: &FailureDetail) -> String {
    match detail {
        FailureDetail::Provisioning { error } => format!("provisioning failed: {error}"),
        FailureDetail::HealthCheckTimeout { waited_secs } => {
            format!("health check timeout after {waited_secs}s")
        }
        FailureDetail::SmokeTest { error } => format!("smoke test failure: {error}"),
        FailureDetail::TrafficRouting { error } => format!("traffic routing failed: {error}"),
        FailureDetail::MetricDegradation { issues } => {
            let parts: Vec<String> = issues
                .iter()
                .map(|i| format!("{} {:+.2}%", i.metric, i.deviation_percent))
                .collect();
            format!("metric degradation: {}", parts.join(", "))
        }
        FailureDetail::ThresholdBreach { breaches } => breaches.join("; "),
        FailureDetail::Cancelled => "cancelled by operator".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use shiftgate_core::BoxFuture;

    use super::*;

    /// Records every routing and capacity call for assertions.
    #[derive(Default)]
    struct Recorder {
        splits: Mutex<Vec<HashMap<String, u32>>>,
        swaps: Mutex<Vec<(String, String)>>,
        deprovisioned: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn target_weights(&self, target: &str) -> Vec<u32> {
            self.splits
                .lock()
                .unwrap()
                .iter()
                .filter_map(|s| s.get(target).copied())
                .collect()
        }
    }

    struct MockCapacity {
        rec: Arc<Recorder>,
        fail: bool,
    }

    impl CapacityProvider for MockCapacity {
        fn provision<'a>(
            &'a self,
            service: &'a str,
            version: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<String>> {
            Box::pin(async move {
                if self.fail {
                    anyhow::bail!("quota exceeded");
                }
                Ok(format!("{service}-{version}.internal:8080"))
            })
        }

        fn deprovision<'a>(
            &'a self,
            service: &'a str,
            version: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                self.rec
                    .deprovisioned
                    .lock()
                    .unwrap()
                    .push(format!("{service}:{version}"));
                Ok(())
            })
        }
    }

    struct MockHealth {
        healthy: bool,
        smoke_ok: bool,
    }

    impl HealthCheckService for MockHealth {
        fn is_healthy<'a>(&'a self, _target: &'a str) -> BoxFuture<'a, bool> {
            Box::pin(async move { self.healthy })
        }

        fn run_smoke_test<'a>(&'a self, _target: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                if self.smoke_ok {
                    Ok(())
                } else {
                    anyhow::bail!("GET /checkout returned 500")
                }
            })
        }
    }

    struct MockRouter {
        rec: Arc<Recorder>,
    }

    impl TrafficRouter for MockRouter {
        fn set_split<'a>(
            &'a self,
            _service: &'a str,
            split: &'a HashMap<String, u32>,
        ) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                self.rec.splits.lock().unwrap().push(split.clone());
                Ok(())
            })
        }

        fn swap<'a>(
            &'a self,
            _service: &'a str,
            slot_a: &'a str,
            slot_b: &'a str,
        ) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                self.rec
                    .swaps
                    .lock()
                    .unwrap()
                    .push((slot_a.to_string(), slot_b.to_string()));
                Ok(())
            })
        }
    }

    /// Error rate follows the candidate's traffic weight: healthy
    /// below `bad_from_weight`, degraded at or above it.
    struct WeightSensitiveMetrics {
        rec: Arc<Recorder>,
        target: String,
        bad_from_weight: u32,
    }

    impl WeightSensitiveMetrics {
        fn current_weight(&self) -> u32 {
            if !self.rec.swaps.lock().unwrap().is_empty() {
                return 100;
            }
            self.rec
                .splits
                .lock()
                .unwrap()
                .last()
                .and_then(|s| s.get(&self.target).copied())
                .unwrap_or(0)
        }
    }

    impl MetricsSource for WeightSensitiveMetrics {
        fn query_range<'a>(
            &'a self,
            metric: &'a str,
            _service: &'a str,
            _version: &'a str,
            _window: Duration,
        ) -> BoxFuture<'a, anyhow::Result<Vec<f64>>> {
            Box::pin(async move {
                let degraded = self.current_weight() >= self.bad_from_weight;
                let value = match metric {
                    "error_rate" => {
                        if degraded {
                            9.5
                        } else {
                            0.4
                        }
                    }
                    "request_latency_p99" => 95.0,
                    "cpu_usage" => 55.0,
                    _ => 1.0,
                };
                Ok(vec![value])
            })
        }
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

    struct Rig {
        rec: Arc<Recorder>,
        collab: Collaborators,
    }

    /// Wire up mocks. `bad_from_weight` is the candidate traffic
    /// weight at which metrics start degrading; `u32::MAX` never
    /// degrades.
    fn rig(healthy: bool, smoke_ok: bool, fail_provision: bool, bad_from_weight: u32) -> Rig {
        let rec = Arc::new(Recorder::default());
        let collab = Collaborators {
            capacity: Arc::new(MockCapacity {
                rec: rec.clone(),
                fail: fail_provision,
            }),
            health: Arc::new(MockHealth { healthy, smoke_ok }),
            router: Arc::new(MockRouter { rec: rec.clone() }),
            metrics: Arc::new(WeightSensitiveMetrics {
                rec: rec.clone(),
                target: "v2".to_string(),
                bad_from_weight,
            }),
        };
        Rig { rec, collab }
    }

    fn node() -> ServiceNode {
        ServiceNode::new("payment", "v1", "v2")
    }

    #[tokio::test]
    async fn canary_succeeds_through_all_stages() {
        let rig = rig(true, true, false, u32::MAX);
        let controller = RolloutController::new(
            node(),
            RolloutStrategy::default(),
            fast_config(),
            GateMode::default(),
            rig.collab.clone(),
        );

        let state = controller.run().await;
        assert_eq!(state.status, RolloutStatus::Succeeded);

        // Every weight was routed, in order.
        assert_eq!(rig.rec.target_weights("v2"), vec![5, 25, 50, 100]);
        // Old capacity released, candidate kept serving.
        assert_eq!(
            *rig.rec.deprovisioned.lock().unwrap(),
            vec!["payment:v1".to_string()]
        );
    }

    #[tokio::test]
    async fn canary_rolls_back_at_degraded_stage() {
        // Healthy at 5%, degraded from 25% on.
        let rig = rig(true, true, false, 25);
        let controller = RolloutController::new(
            node(),
            RolloutStrategy::default(),
            fast_config(),
            GateMode::default(),
            rig.collab.clone(),
        );

        let state = controller.run().await;
        assert!(matches!(state.status, RolloutStatus::RolledBack { .. }));
        assert!(matches!(
            state.failure,
            Some(FailureDetail::ThresholdBreach { .. })
        ));

        // Stages beyond 25% were never entered.
        assert_eq!(rig.rec.target_weights("v2"), vec![5, 25]);
        // The last split restored 100% to baseline.
        let splits = rig.rec.splits.lock().unwrap();
        let last = splits.last().unwrap();
        assert_eq!(last.get("v1"), Some(&100));
        assert_eq!(last.get("v2"), None);
        drop(splits);

        // Candidate capacity retained for inspection.
        assert!(rig.rec.deprovisioned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blue_green_succeeds_and_releases_old_capacity() {
        let rig = rig(true, true, false, u32::MAX);
        let controller = RolloutController::new(
            node(),
            RolloutStrategy::BlueGreen,
            fast_config(),
            GateMode::default(),
            rig.collab.clone(),
        );

        let state = controller.run().await;
        assert_eq!(state.status, RolloutStatus::Succeeded);

        // One atomic switch, no split routing.
        assert_eq!(
            *rig.rec.swaps.lock().unwrap(),
            vec![("v1".to_string(), "v2".to_string())]
        );
        assert!(rig.rec.splits.lock().unwrap().is_empty());
        assert_eq!(
            *rig.rec.deprovisioned.lock().unwrap(),
            vec!["payment:v1".to_string()]
        );
    }

    #[tokio::test]
    async fn blue_green_reverts_switch_on_post_switch_degradation() {
        // Degrades once the candidate serves 100%, which for
        // blue-green is right after the swap.
        let rig = rig(true, true, false, 100);
        let controller = RolloutController::new(
            node(),
            RolloutStrategy::BlueGreen,
            fast_config(),
            GateMode::default(),
            rig.collab.clone(),
        );

        let state = controller.run().await;
        assert!(matches!(state.status, RolloutStatus::RolledBack { .. }));

        // Switched there and back.
        assert_eq!(
            *rig.rec.swaps.lock().unwrap(),
            vec![
                ("v1".to_string(), "v2".to_string()),
                ("v2".to_string(), "v1".to_string()),
            ]
        );
        // Neither capacity torn down.
        assert!(rig.rec.deprovisioned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn provisioning_failure_never_touches_traffic() {
        let rig = rig(true, true, true, u32::MAX);
        let controller = RolloutController::new(
            node(),
            RolloutStrategy::default(),
            fast_config(),
            GateMode::default(),
            rig.collab.clone(),
        );

        let state = controller.run().await;
        assert_eq!(
            state.status,
            RolloutStatus::Failed {
                reason: "provisioning failed".to_string()
            }
        );
        assert!(rig.rec.splits.lock().unwrap().is_empty());
        assert!(rig.rec.swaps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_timeout_deprovisions_and_fails() {
        let rig = rig(false, true, false, u32::MAX);
        let controller = RolloutController::new(
            node(),
            RolloutStrategy::default(),
            fast_config(),
            GateMode::default(),
            rig.collab.clone(),
        );

        let state = controller.run().await;
        assert_eq!(
            state.status,
            RolloutStatus::Failed {
                reason: "health check timeout".to_string()
            }
        );
        assert!(matches!(
            state.failure,
            Some(FailureDetail::HealthCheckTimeout { .. })
        ));
        // Candidate torn down; traffic untouched.
        assert_eq!(
            *rig.rec.deprovisioned.lock().unwrap(),
            vec!["payment:v2".to_string()]
        );
        assert!(rig.rec.splits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn smoke_failure_deprovisions_and_fails() {
        let rig = rig(true, false, false, u32::MAX);
        let controller = RolloutController::new(
            node(),
            RolloutStrategy::default(),
            fast_config(),
            GateMode::default(),
            rig.collab.clone(),
        );

        let state = controller.run().await;
        assert_eq!(
            state.status,
            RolloutStatus::Failed {
                reason: "smoke test failure".to_string()
            }
        );
        assert_eq!(
            *rig.rec.deprovisioned.lock().unwrap(),
            vec!["payment:v2".to_string()]
        );
    }

    #[tokio::test]
    async fn comparison_gate_rolls_back_on_recommendation() {
        // Candidate error rate and CPU both deviate far beyond the
        // baseline once weight reaches 25.
        struct SplitPersonality {
            rec: Arc<Recorder>,
        }
        impl MetricsSource for SplitPersonality {
            fn query_range<'a>(
                &'a self,
                metric: &'a str,
                _service: &'a str,
                version: &'a str,
                _window: Duration,
            ) -> BoxFuture<'a, anyhow::Result<Vec<f64>>> {
                Box::pin(async move {
                    let weight = self
                        .rec
                        .splits
                        .lock()
                        .unwrap()
                        .last()
                        .and_then(|s| s.get("v2").copied())
                        .unwrap_or(0);
                    let degraded = version == "v2" && weight >= 25;
                    let value = match metric {
                        "error_rate" if degraded => 3.0,
                        "cpu_usage" if degraded => 90.0,
                        "error_rate" => 1.0,
                        "cpu_usage" => 50.0,
                        _ => 10.0,
                    };
                    Ok(vec![value])
                })
            }
        }

        let rec = Arc::new(Recorder::default());
        let collab = Collaborators {
            capacity: Arc::new(MockCapacity {
                rec: rec.clone(),
                fail: false,
            }),
            health: Arc::new(MockHealth {
                healthy: true,
                smoke_ok: true,
            }),
            router: Arc::new(MockRouter { rec: rec.clone() }),
            metrics: Arc::new(SplitPersonality { rec: rec.clone() }),
        };

        let controller = RolloutController::new(
            node(),
            RolloutStrategy::default(),
            fast_config(),
            GateMode::Compare(ComparisonConfig::default()),
            collab,
        );

        let state = controller.run().await;
        assert!(matches!(state.status, RolloutStatus::RolledBack { .. }));
        match &state.failure {
            Some(FailureDetail::MetricDegradation { issues }) => {
                assert!(issues.len() >= 2);
            }
            other => panic!("expected metric degradation, got {other:?}"),
        }
        assert_eq!(rec.target_weights("v2"), vec![5, 25]);
    }

    #[tokio::test]
    async fn cancellation_mid_dwell_restores_baseline() {
        let rig = rig(true, true, false, u32::MAX);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let mut config = fast_config();
        config.dwell = Duration::from_secs(5);
        config.monitor_poll_interval = Duration::from_millis(10);

        let controller = RolloutController::new(
            node(),
            RolloutStrategy::default(),
            config,
            GateMode::default(),
            rig.collab.clone(),
        )
        .with_cancel(cancel_rx);

        let handle = tokio::spawn(controller.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send(true).unwrap();

        let state = handle.await.unwrap();
        assert_eq!(
            state.status,
            RolloutStatus::RolledBack {
                reason: "cancelled by operator".to_string()
            }
        );
        let splits = rig.rec.splits.lock().unwrap();
        assert_eq!(splits.last().unwrap().get("v1"), Some(&100));
    }

    #[tokio::test]
    async fn events_emitted_for_every_transition() {
        let rig = rig(true, true, false, u32::MAX);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let controller = RolloutController::new(
            node(),
            RolloutStrategy::BlueGreen,
            fast_config(),
            GateMode::default(),
            rig.collab.clone(),
        )
        .with_events(tx);

        let state = controller.run().await;
        assert_eq!(state.status, RolloutStatus::Succeeded);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), state.transitions.len());
        assert_eq!(events.first().unwrap().to, "provisioning");
        assert_eq!(events.last().unwrap().to, "succeeded");
        assert!(events.iter().all(|e| e.service == "payment"));
    }
}
