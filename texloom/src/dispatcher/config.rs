//! Dispatcher configuration (spec.md §6.5).

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Cap on transient-failure retries per task (default 3).
    #[serde(default = "default_max_task_retries")]
    pub max_task_retries: u32,

    #[serde(default = "default_backoff_base_s")]
    pub backoff_base_s: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_backoff_cap_s")]
    pub backoff_cap_s: u64,

    /// Symmetric jitter fraction applied to the computed delay (default 0.2 = ±20%).
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,

    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_max_task_retries() -> u32 {
    3
}

fn default_backoff_base_s() -> u64 {
    30
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_backoff_cap_s() -> u64 {
    900
}

fn default_jitter_fraction() -> f64 {
    0.2
}

fn default_channel_buffer() -> usize {
    256
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_task_retries: default_max_task_retries(),
            backoff_base_s: default_backoff_base_s(),
            backoff_factor: default_backoff_factor(),
            backoff_cap_s: default_backoff_cap_s(),
            jitter_fraction: default_jitter_fraction(),
            channel_buffer: default_channel_buffer(),
        }
    }
}

impl DispatcherConfig {
    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_task_retries, 3);
        assert_eq!(config.backoff_base_s, 30);
        assert_eq!(config.backoff_cap_s, 900);
    }
}
