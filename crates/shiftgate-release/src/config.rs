//! The TOML release manifest.
//!
//! Declares the services in a release cycle, their dependency edges,
//! and the rollout/gate parameters. Everything but the service list
//! has spec'd defaults, so a minimal manifest is just `[[services]]`
//! entries.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use shiftgate_core::{DependencyEdge, DependencyOrdering, ServiceNode};
use shiftgate_rollout::{
    CanaryConfig, GateMode, RollingConfig, RolloutConfig, RolloutStrategy,
};
use shiftgate_metrics::{ComparisonConfig, GateThresholds};

use crate::coordinator::{ReleaseItem, ReleaseRequest};
use crate::error::ConfigError;

/// One release cycle's configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseManifest {
    #[serde(default = "default_environment")]
    pub environment: String,
    pub services: Vec<ServiceEntry>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
    #[serde(default)]
    pub rollout: RolloutSection,
    #[serde(default)]
    pub gate: GateSection,
}

/// One service in the release.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub current_version: String,
    pub target_version: String,
    /// Commit to build; defaults to the target version.
    #[serde(default)]
    pub commit_ref: Option<String>,
    /// Provider-specific build file; defaults to "Dockerfile".
    #[serde(default)]
    pub build_spec: Option<String>,
    /// Per-service strategy override.
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
}

/// A declared dependency edge.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyEntry {
    pub dependent: String,
    pub dependency: String,
    #[serde(default = "default_ordering")]
    pub ordering: DependencyOrdering,
    /// Semver requirement on the dependency's target version.
    #[serde(default)]
    pub min_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    BlueGreen,
    Canary,
    Rolling,
}

/// Rollout timing and strategy defaults for the release.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RolloutSection {
    pub strategy: StrategyKind,
    pub stage_weights: Vec<u32>,
    pub health_timeout_secs: u64,
    pub health_poll_interval_secs: u64,
    pub dwell_secs: u64,
    pub monitor_poll_interval_secs: u64,
    pub metrics_window_secs: u64,
}

impl Default for RolloutSection {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Canary,
            stage_weights: vec![5, 25, 50, 100],
            health_timeout_secs: 300,
            health_poll_interval_secs: 5,
            dwell_secs: 300,
            monitor_poll_interval_secs: 30,
            metrics_window_secs: 300,
        }
    }
}

/// Monitoring gate selection and thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateSection {
    pub mode: GateKind,
    pub max_error_rate: f64,
    pub max_latency_p99_ms: f64,
    pub max_cpu_percent: f64,
    pub deviation_threshold: f64,
    pub high_threshold: f64,
    pub high_issues_for_rollback: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Thresholds,
    Compare,
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            mode: GateKind::Thresholds,
            max_error_rate: 2.0,
            max_latency_p99_ms: 150.0,
            max_cpu_percent: 80.0,
            deviation_threshold: 0.15,
            high_threshold: 0.25,
            high_issues_for_rollback: 2,
        }
    }
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_ordering() -> DependencyOrdering {
    DependencyOrdering::Before
}

impl ReleaseManifest {
    /// Parse and validate a manifest from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let manifest: ReleaseManifest = toml::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load a manifest from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::Invalid("no services declared".to_string()));
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate service: {}",
                    service.name
                )));
            }
        }

        let weights = &self.rollout.stage_weights;
        if weights.is_empty() {
            return Err(ConfigError::Invalid("empty stage_weights".to_string()));
        }
        if weights.last() != Some(&100) {
            return Err(ConfigError::Invalid(
                "stage_weights must end at 100".to_string(),
            ));
        }
        if !weights.windows(2).all(|w| w[0] < w[1]) {
            return Err(ConfigError::Invalid(
                "stage_weights must be strictly increasing".to_string(),
            ));
        }

        for dep in &self.dependencies {
            if let Some(req) = &dep.min_version {
                semver::VersionReq::parse(req).map_err(|e| {
                    ConfigError::Invalid(format!(
                        "bad min_version for {} -> {}: {e}",
                        dep.dependent, dep.dependency
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Convert into the coordinator's release request.
    pub fn release_request(&self) -> Result<ReleaseRequest, ConfigError> {
        let items = self
            .services
            .iter()
            .map(|entry| ReleaseItem {
                node: ServiceNode::new(
                    &entry.name,
                    &entry.current_version,
                    &entry.target_version,
                ),
                commit_ref: entry
                    .commit_ref
                    .clone()
                    .unwrap_or_else(|| entry.target_version.clone()),
                build_spec: entry
                    .build_spec
                    .clone()
                    .unwrap_or_else(|| "Dockerfile".to_string()),
                strategy: entry.strategy.map(|kind| self.strategy_of(kind)),
            })
            .collect();

        let edges = self
            .dependencies
            .iter()
            .map(|dep| {
                let mut edge =
                    DependencyEdge::new(&dep.dependent, &dep.dependency, dep.ordering);
                if let Some(req) = &dep.min_version {
                    // Validated in from_toml; re-parse for ownership.
                    edge.min_version = semver::VersionReq::parse(req).ok();
                }
                edge
            })
            .collect();

        Ok(ReleaseRequest {
            environment: self.environment.clone(),
            items,
            edges,
        })
    }

    /// The release-wide default strategy.
    pub fn strategy(&self) -> RolloutStrategy {
        self.strategy_of(self.rollout.strategy)
    }

    fn strategy_of(&self, kind: StrategyKind) -> RolloutStrategy {
        match kind {
            StrategyKind::BlueGreen => RolloutStrategy::BlueGreen,
            StrategyKind::Canary => RolloutStrategy::Canary(CanaryConfig {
                stage_weights: self.rollout.stage_weights.clone(),
            }),
            StrategyKind::Rolling => RolloutStrategy::Rolling(RollingConfig {
                stage_weights: self.rollout.stage_weights.clone(),
            }),
        }
    }

    /// Rollout timing knobs.
    pub fn rollout_config(&self) -> RolloutConfig {
        RolloutConfig {
            health_timeout: Duration::from_secs(self.rollout.health_timeout_secs),
            health_poll_interval: Duration::from_secs(self.rollout.health_poll_interval_secs),
            dwell: Duration::from_secs(self.rollout.dwell_secs),
            monitor_poll_interval: Duration::from_secs(self.rollout.monitor_poll_interval_secs),
            metrics_window: Duration::from_secs(self.rollout.metrics_window_secs),
        }
    }

    /// The configured monitoring gate.
    pub fn gate_mode(&self) -> GateMode {
        match self.gate.mode {
            GateKind::Thresholds => GateMode::Thresholds(GateThresholds {
                max_error_rate: self.gate.max_error_rate,
                max_latency_p99_ms: self.gate.max_latency_p99_ms,
                max_cpu_percent: self.gate.max_cpu_percent,
            }),
            GateKind::Compare => GateMode::Compare(ComparisonConfig {
                deviation_threshold: self.gate.deviation_threshold,
                high_threshold: self.gate.high_threshold,
                high_issues_for_rollback: self.gate.high_issues_for_rollback,
                ..ComparisonConfig::default()
            }),
        }
    }
}
