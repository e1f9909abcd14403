//! texloom configuration types and loading (SPEC_FULL.md §3, spec.md §6.5).

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dispatcher::DispatcherConfig;
use crate::driver::DriverConfig;
use crate::reconciler::ReconcilerConfig;

/// Top-level texloom configuration: where state lives, and the tunables
/// for the dispatcher, driver, and reconciler (spec.md §6.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub dispatcher: DispatcherConfig,
    pub driver: DriverConfig,
    pub reconciler: ReconcilerConfig,
}

impl Config {
    /// Load configuration with fallback chain: explicit path -> project-local
    /// `.texloom.yml` -> user config dir -> built-in defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".texloom.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("texloom").join("texloom.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Where the State Store Adapter keeps its SQLite database + JSONL journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".texloom/store"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.store.path, PathBuf::from(".texloom/store"));
        assert_eq!(config.dispatcher.max_task_retries, 3);
        assert_eq!(config.driver.max_refinement_attempts, 5);
        assert_eq!(config.reconciler.interval_s, 60);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
store:
  path: /var/lib/texloom/store

dispatcher:
  max_task_retries: 5

reconciler:
  interval_s: 30
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.store.path, PathBuf::from("/var/lib/texloom/store"));
        assert_eq!(config.dispatcher.max_task_retries, 5);
        assert_eq!(config.reconciler.interval_s, 30);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.driver.max_refinement_attempts, 5);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
reconciler:
  interval_s: 15
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.reconciler.interval_s, 15);
        assert_eq!(config.store.path, PathBuf::from(".texloom/store"));
        assert_eq!(config.dispatcher.max_task_retries, 3);
    }
}
