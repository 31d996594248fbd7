//! Engine configuration types.
//!
//! `EngineConfig` represents the top-level `config.toml` in the data
//! directory. Retry and pacing constants are operational tuning, so every
//! field has a default and an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the curriculum engine.
///
/// Loaded from `~/.skillpath/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub stages: StageSettings,
    #[serde(default)]
    pub batch: BatchPacing,
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// `base * n`: 15s, 30s, 45s with the default base.
    #[default]
    Linear,
    /// `base * 2^(n-1)`.
    Exponential,
}

/// Bounded retry policy applied to every stage invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub backoff: BackoffKind,
    /// Randomize each delay within `[delay/2, delay]`.
    #[serde(default)]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    15_000
}

fn default_max_delay_ms() -> u64 {
    120_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: BackoffKind::default(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Settings for the stage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    /// Deadline for a single stage invocation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL of the HTTP stage service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Name of the environment variable holding the bearer token, if any.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8700".to_string()
}

fn default_api_key_env() -> String {
    "SKILLPATH_STAGE_API_KEY".to_string()
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl StageSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Pacing for batch roadmap generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPacing {
    /// Wait before each module's generation call.
    #[serde(default)]
    pub initial_delay_ms: u64,
    /// Wait after each module before starting the next.
    #[serde(default = "default_inter_module_delay_ms")]
    pub inter_module_delay_ms: u64,
}

fn default_inter_module_delay_ms() -> u64 {
    10_000
}

impl Default for BatchPacing {
    fn default() -> Self {
        Self {
            initial_delay_ms: 0,
            inter_module_delay_ms: default_inter_module_delay_ms(),
        }
    }
}

impl BatchPacing {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn inter_module_delay(&self) -> Duration {
        Duration::from_millis(self.inter_module_delay_ms)
    }
}
