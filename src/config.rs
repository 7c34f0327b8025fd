//! Runtime configuration and retention limits
//!
//! Configuration is optional: everything has a sensible default, and a
//! `delos.toml` in the project directory can override pricing, the base XP
//! award, or the metrics file name. A missing or unparseable file falls back
//! to defaults with a log line, never an error.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum events retained in the persisted state (oldest evicted first)
pub const MAX_EVENTS: usize = 500;

/// Maximum session summaries retained in the persisted state
pub const MAX_SESSIONS: usize = 50;

/// Rolling window of recent events handed to the signal detector and kept
/// on each profile as `recent_events`
pub const ROLLING_WINDOW: usize = 20;

/// Name of the optional configuration file inside the project directory
pub const CONFIG_FILE: &str = "delos.toml";

/// Application configuration loaded from file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Project name recorded in the dashboard state; defaults to the
    /// project directory's name
    #[serde(default)]
    pub project_name: Option<String>,

    /// File name of the persisted JSON document inside the project directory
    #[serde(default = "default_metrics_file")]
    pub metrics_file: String,

    /// Base XP awarded for every successful delegation
    #[serde(default = "default_base_xp")]
    pub base_xp: i64,

    /// Token pricing used for cost estimation
    #[serde(default)]
    pub pricing: PricingConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            project_name: None,
            metrics_file: default_metrics_file(),
            base_xp: default_base_xp(),
            pricing: PricingConfig::default(),
        }
    }
}

fn default_metrics_file() -> String {
    "agent_metrics.json".to_string()
}

fn default_base_xp() -> i64 {
    10
}

/// USD pricing per 1K tokens, applied at tracker finalization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingConfig {
    /// Cost per 1,000 input tokens
    #[serde(default = "default_input_per_1k")]
    pub input_per_1k_usd: f64,

    /// Cost per 1,000 output tokens
    #[serde(default = "default_output_per_1k")]
    pub output_per_1k_usd: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_1k_usd: default_input_per_1k(),
            output_per_1k_usd: default_output_per_1k(),
        }
    }
}

fn default_input_per_1k() -> f64 {
    0.003
}

fn default_output_per_1k() -> f64 {
    0.015
}

impl PricingConfig {
    /// Estimated USD cost for a delegation's token counts
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k_usd
            + (output_tokens as f64 / 1000.0) * self.output_per_1k_usd
    }
}

impl MetricsConfig {
    /// Load configuration from `<project_dir>/delos.toml`, falling back to
    /// defaults when the file is missing or unparseable
    pub fn load(project_dir: &Path) -> Self {
        Self::load_from_path(&project_dir.join(CONFIG_FILE))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file: {}, using defaults", e);
                Self::default()
            }
        }
    }
}
