//! Runs a three-service release against in-memory collaborators and
//! prints the resulting report as JSON.
//!
//!     cargo run -p shiftgate-release --example release_demo

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shiftgate_core::{
    Artifact, BoxFuture, BuildService, CapacityProvider, HealthCheckService, MetricsSource,
    ScanStatus, TrafficRouter,
};
use shiftgate_release::{ReleaseCoordinator, ReleaseManifest};
use shiftgate_risk::{
    ComplianceEvaluator, InfrastructureEvaluator, InfrastructureSignals, RiskEngine,
    SecurityEvaluator, SecuritySignals, TestingEvaluator, TestingSignals,
};
use shiftgate_rollout::Collaborators;

const MANIFEST: &str = r#"
    environment = "production"

    [[services]]
    name = "auth-service"
    current_version = "2.1.0"
    target_version = "2.2.0"

    [[services]]
    name = "payment-service"
    current_version = "3.0.0"
    target_version = "3.1.0"

    [[services]]
    name = "notification-service"
    current_version = "1.4.0"
    target_version = "1.5.0"
    strategy = "blue_green"

    [[dependencies]]
    dependent = "payment-service"
    dependency = "auth-service"
    ordering = "before"
    min_version = ">=2.1"

    [[dependencies]]
    dependent = "notification-service"
    dependency = "payment-service"
    ordering = "before"

    [rollout]
    strategy = "canary"
    stage_weights = [5, 25, 50, 100]
    health_timeout_secs = 5
    health_poll_interval_secs = 1
    dwell_secs = 1
    monitor_poll_interval_secs = 1
    metrics_window_secs = 60
"#;

struct DemoBuild;

impl BuildService for DemoBuild {
    fn build<'a>(
        &'a self,
        service: &'a str,
        commit_ref: &'a str,
        _build_spec: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Artifact>> {
        Box::pin(async move {
            // Stand-in for a CodeBuild/Pipelines run.
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Artifact {
                service: service.to_string(),
                version: commit_ref.to_string(),
                image_ref: format!("registry.example.com/{service}:{commit_ref}"),
                size_bytes: 245_300_000,
                scan_status: ScanStatus::Passed,
                digest: "sha256:abcd1234".to_string(),
                sbom_ref: format!("s3://sbom-bucket/{service}-sbom.json"),
            })
        })
    }
}

struct DemoCapacity;

impl CapacityProvider for DemoCapacity {
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

struct DemoHealth;

impl HealthCheckService for DemoHealth {
    fn is_healthy<'a>(&'a self, _target: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move { true })
    }

    fn run_smoke_test<'a>(&'a self, _target: &'a str) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { Ok(()) })
    }
}

struct DemoRouter;

impl TrafficRouter for DemoRouter {
    fn set_split<'a>(
        &'a self,
        _service: &'a str,
        _split: &'a HashMap<String, u32>,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { Ok(()) })
    }

    fn swap<'a>(
        &'a self,
        _service: &'a str,
        _slot_a: &'a str,
        _slot_b: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { Ok(()) })
    }
}

struct DemoMetrics;

impl MetricsSource for DemoMetrics {
    fn query_range<'a>(
        &'a self,
        metric: &'a str,
        _service: &'a str,
        _version: &'a str,
        _window: Duration,
    ) -> BoxFuture<'a, anyhow::Result<Vec<f64>>> {
        Box::pin(async move {
            let value = match metric {
                "error_rate" => 0.4,
                "request_latency_p99" => 85.0,
                "cpu_usage" => 52.0,
                _ => 1.0,
            };
            Ok(vec![value, value, value])
        })
    }
}

fn demo_engine() -> RiskEngine {
    let services = ["auth-service", "payment-service", "notification-service"];

    let security = HashMap::from([(
        "payment-service".to_string(),
        SecuritySignals {
            vulnerability_count: 2,
            cert_expires_in_days: 45,
            secrets_detected: false,
        },
    )]);
    let testing: HashMap<String, TestingSignals> = services
        .iter()
        .map(|s| {
            (
                s.to_string(),
                TestingSignals {
                    code_coverage: 82,
                    failed_tests: 0,
                    performance_regression_percent: 2.3,
                },
            )
        })
        .collect();
    let compliance: HashMap<String, HashMap<String, bool>> = services
        .iter()
        .map(|s| {
            (
                s.to_string(),
                HashMap::from([
                    ("change_approved".to_string(), true),
                    ("gdpr_governed".to_string(), *s == "payment-service"),
                ]),
            )
        })
        .collect();
    let infrastructure = HashMap::from([(
        "payment-service".to_string(),
        InfrastructureSignals {
            cluster_health: 94,
            disk_usage_percent: 62,
            deployments_in_queue: 1,
        },
    )]);

    RiskEngine::new(vec![
        Box::new(SecurityEvaluator::new(security)),
        Box::new(TestingEvaluator::new(testing)),
        Box::new(ComplianceEvaluator::new(Arc::new(compliance))),
        Box::new(InfrastructureEvaluator::new(infrastructure)),
    ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let manifest = ReleaseManifest::from_toml(MANIFEST)?;
    let request = manifest.release_request()?;

    let collab = Collaborators {
        capacity: Arc::new(DemoCapacity),
        health: Arc::new(DemoHealth),
        router: Arc::new(DemoRouter),
        metrics: Arc::new(DemoMetrics),
    };

    let mut coordinator = ReleaseCoordinator::new(Arc::new(DemoBuild), collab, demo_engine())
        .with_strategy(manifest.strategy())
        .with_rollout_config(manifest.rollout_config())
        .with_gate(manifest.gate_mode());

    let report = coordinator.execute(&request).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if let Some(insights) = coordinator.engine().insights() {
        println!("insights: {}", serde_json::to_string_pretty(&insights)?);
    }
    Ok(())
}
