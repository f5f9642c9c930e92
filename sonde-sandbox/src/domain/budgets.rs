//! Per-invocation resource budgets

use std::time::Duration;

use serde::{Deserialize, Serialize};

use sonde_core::config::SandboxConfig;

/// Resource ceiling for one plugin invocation, supplied by the workflow
/// executor at dispatch time.
///
/// Defaults are restrictive: 30 seconds and 256 MB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxBudgets {
    /// Wall-clock execution budget
    pub time: Duration,
    /// Memory ceiling in bytes (best-effort supervision)
    pub max_memory: u64,
}

impl Default for SandboxBudgets {
    fn default() -> Self {
        Self {
            time: Duration::from_secs(30),
            max_memory: 256 * 1024 * 1024,
        }
    }
}

impl SandboxBudgets {
    /// Derive budgets from the shared sandbox configuration section.
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            time: Duration::from_millis(config.timeout_ms),
            max_memory: config.max_memory_bytes,
        }
    }

    /// Set the time budget (chainable).
    pub fn with_time(mut self, time: Duration) -> Self {
        self.time = time;
        self
    }

    /// Set the time budget in milliseconds (chainable).
    pub fn with_time_ms(mut self, ms: u64) -> Self {
        self.time = Duration::from_millis(ms);
        self
    }

    /// Set the memory ceiling in bytes (chainable).
    pub fn with_memory(mut self, bytes: u64) -> Self {
        self.max_memory = bytes;
        self
    }

    /// Set the memory ceiling in megabytes (chainable).
    pub fn with_memory_mb(mut self, mb: u64) -> Self {
        self.max_memory = mb * 1024 * 1024;
        self
    }
}
