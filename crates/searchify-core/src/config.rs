//! Configuration model.
//!
//! Every field has a default so a missing or partial `config.toml` still
//! yields a usable configuration.

use crate::conversation::{DEFAULT_CONVERSATION_TITLE, DEFAULT_PLACEHOLDER_MARKERS, PlaceholderPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure for config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchifyConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Remote service connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the backend, without the API prefix.
    pub base_url: String,
    /// Versioned API prefix, e.g. `/api/v1`.
    pub api_prefix: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Bearer token sent with every request.
    pub api_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_prefix: "/api/v1".to_string(),
            request_timeout_secs: 30,
            api_token: None,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Synchronization engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Title given to conversations created implicitly by a first query.
    pub default_title: String,
    /// Sentinel phrases marking an assistant reply that is still computing.
    pub placeholder_markers: Vec<String>,
    pub polling: PollingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_title: DEFAULT_CONVERSATION_TITLE.to_string(),
            placeholder_markers: DEFAULT_PLACEHOLDER_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            polling: PollingConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn placeholder_policy(&self) -> PlaceholderPolicy {
        PlaceholderPolicy::new(&self.placeholder_markers)
    }
}

/// Two-speed polling budget for placeholder resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between attempts while in the fast phase.
    pub fast_interval_ms: u64,
    /// Number of unresolved attempts before switching to the slow interval.
    pub fast_retries: u32,
    /// Delay between attempts once the fast budget is spent.
    pub slow_interval_ms: u64,
    /// Hard wall-clock lifetime of a poll task.
    pub timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: 2_000,
            fast_retries: 15,
            slow_interval_ms: 5_000,
            timeout_ms: 300_000,
        }
    }
}

impl PollingConfig {
    /// Interval to wait before the next attempt, given the retries so far.
    pub fn interval_after(&self, retries: u32) -> Duration {
        if retries < self.fast_retries {
            Duration::from_millis(self.fast_interval_ms)
        } else {
            Duration::from_millis(self.slow_interval_ms)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
