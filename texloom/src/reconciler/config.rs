//! Reconciler configuration (spec.md §5, §8 `RECONCILE_INTERVAL_S`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_interval_s")]
    pub interval_s: u64,
}

fn default_interval_s() -> u64 {
    60
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_s: default_interval_s(),
        }
    }
}

impl ReconcilerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec() {
        assert_eq!(ReconcilerConfig::default().interval_s, 60);
    }
}
