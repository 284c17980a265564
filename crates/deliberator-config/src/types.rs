//! The `Config` tree deserialized from `.deliberator/config.yaml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One named model backend: either a local CLI subprocess or an HTTP gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Cli {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_cli_timeout_secs")]
        timeout_secs: u64,
    },
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_http_timeout_secs")]
        timeout_secs: u64,
        #[serde(default = "default_max_retries")]
        max_retries: u32,
    },
}

fn default_cli_timeout_secs() -> u64 {
    120
}

fn default_http_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

/// Round-over-round similarity thresholds that decide convergence/impasse/divergence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceDetectionConfig {
    pub enabled: bool,
    pub semantic_similarity_threshold: f64,
    pub divergence_threshold: f64,
    pub min_rounds_before_check: u32,
    pub consecutive_stable_rounds: u32,
    pub stance_stability_threshold: f64,
    pub response_length_drop_threshold: f64,
}

impl Default for ConvergenceDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            semantic_similarity_threshold: 0.85,
            divergence_threshold: 0.40,
            min_rounds_before_check: 2,
            consecutive_stable_rounds: 1,
            stance_stability_threshold: 0.80,
            response_length_drop_threshold: 0.50,
        }
    }
}

/// Vote-majority early-stop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub respect_min_rounds: bool,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.66,
            respect_min_rounds: true,
        }
    }
}

/// Deliberation-loop tuning: convergence detection and early stopping.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeliberationConfig {
    pub convergence_detection: ConvergenceDetectionConfig,
    pub early_stopping: EarlyStoppingConfig,
}

/// Similarity-score cutoffs that bucket retrieved decisions into relevance tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierBoundariesConfig {
    pub strong: f64,
    pub moderate: f64,
}

impl Default for TierBoundariesConfig {
    fn default() -> Self {
        Self {
            strong: 0.75,
            moderate: 0.60,
        }
    }
}

/// The persistent decision-graph store and retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionGraphConfig {
    pub enabled: bool,
    pub db_path: String,
    pub context_token_budget: u32,
    pub tier_boundaries: TierBoundariesConfig,
    pub query_window: u32,
    pub max_context_decisions: u32,
    pub compute_similarities: bool,
}

impl Default for DecisionGraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: "${DELIBERATOR_DATA_DIR:-.deliberator}/decisions.db".to_string(),
            context_token_budget: 1500,
            tier_boundaries: TierBoundariesConfig::default(),
            query_window: 1000,
            max_context_decisions: 10,
            compute_similarities: true,
        }
    }
}

/// Where deliberation transcripts land and how much of them gets echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptsConfig {
    pub dir: String,
    pub max_rounds_in_response: u32,
}

impl Default for TranscriptsConfig {
    fn default() -> Self {
        Self {
            dir: "${DELIBERATOR_DATA_DIR:-.deliberator}/transcripts".to_string(),
            max_rounds_in_response: 3,
        }
    }
}

/// Root configuration tree, deserialized from `.deliberator/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub backends: HashMap<String, BackendConfig>,
    pub deliberation: DeliberationConfig,
    pub decision_graph: DecisionGraphConfig,
    pub transcripts: TranscriptsConfig,
}
