//! Security risk evaluation.
//!
//! Reads per-service scan results (vulnerability counts, certificate
//! expiry, secret detection) and the image scan status of the built
//! artifact.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use shiftgate_core::ScanStatus;

use crate::evaluators::{AssessmentContext, RiskEvaluator};
use crate::factor::{RiskCategory, RiskFactor};

/// Latest scan results for one service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecuritySignals {
    /// Known vulnerabilities in the dependency scan.
    pub vulnerability_count: u32,
    /// Days until the serving certificate expires.
    pub cert_expires_in_days: u32,
    /// Hardcoded credentials found in the codebase.
    pub secrets_detected: bool,
}

impl Default for SecuritySignals {
    fn default() -> Self {
        Self {
            vulnerability_count: 0,
            cert_expires_in_days: 365,
            secrets_detected: false,
        }
    }
}

/// Evaluates security-related risks from scan data.
pub struct SecurityEvaluator {
    signals: HashMap<String, SecuritySignals>,
}

impl SecurityEvaluator {
    pub fn new(signals: HashMap<String, SecuritySignals>) -> Self {
        Self { signals }
    }
}

impl RiskEvaluator for SecurityEvaluator {
    fn evaluate(&self, ctx: &AssessmentContext<'_>) -> Vec<RiskFactor> {
        let signals = self.signals.get(ctx.service).cloned().unwrap_or_default();
        let mut factors = Vec::new();

        if signals.vulnerability_count > 0 {
            let severity = (signals.vulnerability_count * 10).min(50) as u8;
            factors.push(
                RiskFactor::new(
                    "Known Vulnerabilities Detected",
                    severity,
                    RiskCategory::Security,
                    format!(
                        "{} vulnerabilities found in dependency scan",
                        signals.vulnerability_count
                    ),
                )
                .with_mitigation("Review and patch vulnerabilities before deployment"),
            );
        }

        if signals.cert_expires_in_days < 30 {
            factors.push(
                RiskFactor::new(
                    "Certificate Expiring Soon",
                    40,
                    RiskCategory::Security,
                    format!(
                        "Serving certificate expires in {} days",
                        signals.cert_expires_in_days
                    ),
                )
                .with_mitigation("Renew certificate before expiration"),
            );
        }

        if signals.secrets_detected {
            factors.push(
                RiskFactor::new(
                    "Hardcoded Secrets Detected",
                    80,
                    RiskCategory::Security,
                    "Hardcoded credentials found in codebase".to_string(),
                )
                .with_mitigation("Remove secrets and use a secret management service"),
            );
        }

        match ctx.artifact.map(|a| a.scan_status) {
            Some(ScanStatus::Failed) => factors.push(
                RiskFactor::new(
                    "Image Scan Failed",
                    70,
                    RiskCategory::Security,
                    format!("Image scan for {}:{} failed", ctx.service, ctx.version),
                )
                .with_mitigation("Rebuild after addressing scan findings"),
            ),
            Some(ScanStatus::Warnings) => factors.push(RiskFactor::new(
                "Image Scan Warnings",
                25,
                RiskCategory::Security,
                format!(
                    "Image scan for {}:{} completed with warnings",
                    ctx.service, ctx.version
                ),
            )),
            Some(ScanStatus::Passed) | None => {}
        }

        factors
    }
}
