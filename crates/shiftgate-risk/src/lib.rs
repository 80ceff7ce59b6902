//! Shiftgate risk scoring.
//!
//! Aggregates risk factors from independent category evaluators
//! (security, testing, compliance, infrastructure) into a single
//! weighted score, a classification band, and a deploy/hold
//! recommendation. Every assessment lands in a bounded history that
//! feeds aggregate insight queries.
//!
//! # Components
//!
//! - **`factor`**: `RiskFactor`, categories with their weights, risk bands
//! - **`evaluators`**: the `RiskEvaluator` trait and the four built-in evaluators
//! - **`engine`**: composite scoring, reports, history, insights

pub mod engine;
pub mod evaluators;
pub mod factor;

pub use engine::{RiskEngine, RiskInsights, RiskReport};
pub use evaluators::{
    AssessmentContext, ComplianceEvaluator, InfrastructureEvaluator, InfrastructureSignals,
    RiskEvaluator, SecurityEvaluator, SecuritySignals, TestingEvaluator, TestingSignals,
};
pub use factor::{RiskCategory, RiskFactor, RiskLevel};
