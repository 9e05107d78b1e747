use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

const MIN_POLL_INTERVAL_MS: u64 = 250;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub watched_ports: BTreeSet<u16>,
    #[serde(default = "default_notifications_enabled")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MonitoringConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watched_ports: BTreeSet::new(),
            notifications_enabled: default_notifications_enabled(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Durable storage for [`Config`]. Implementations do plain I/O only.
pub trait ConfigStore: Send {
    fn load(&self) -> Result<Config>;
    fn save(&self, config: &Config) -> Result<(), PersistenceError>;
}

/// Stores the config as pretty-printed JSON at a fixed path.
#[derive(Clone, Debug)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the config, writing defaults first when the file does not exist.
    pub fn load_or_create(&self) -> Result<Config> {
        if self.path.exists() {
            load_and_validate_config(&self.path)
        } else {
            let config = Config::default();
            self.save(&config)?;
            Ok(config)
        }
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<Config> {
        load_and_validate_config(&self.path)
    }

    fn save(&self, config: &Config) -> Result<(), PersistenceError> {
        save_config(&self.path, config).map_err(PersistenceError::from)
    }
}

pub fn get_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".portassassin.json")
}

pub fn load_and_validate_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = serde_json::from_str(&content).context("failed to parse config file")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.watched_ports.contains(&0) {
        return Err(anyhow!("watched_ports must be in 1-65535, found 0"));
    }
    if config.monitoring.poll_interval_ms < MIN_POLL_INTERVAL_MS {
        return Err(anyhow!(
            "monitoring.poll_interval_ms must be at least {}, found {}",
            MIN_POLL_INTERVAL_MS,
            config.monitoring.poll_interval_ms
        ));
    }
    Ok(())
}

/// Writes the whole config object; a temp file plus rename keeps readers from
/// ever seeing a torn file.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let content = serde_json::to_string_pretty(config).context("failed to serialize config")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)
        .with_context(|| format!("failed to write config file {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace config file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join("config.json"));

        let config = store.load_or_create().unwrap();

        assert_eq!(config, Config::default());
        assert!(store.path().exists());
        assert_eq!(config.monitoring.poll_interval_ms, 2000);
        assert!(config.notifications_enabled);
    }

    #[test]
    fn save_then_load_keeps_watch_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join("config.json"));
        let mut config = Config::default();
        config.watched_ports.extend([8080, 3000]);
        config.notifications_enabled = false;

        store.save(&config).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, config);
        assert!(!dir.path().join("config.json.tmp").exists());
    }

    #[test]
    fn partial_file_uses_defaults_and_dedupes_ports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"watched_ports": [3000, 3000, 5173]}"#).unwrap();

        let config = load_and_validate_config(&path).unwrap();

        assert_eq!(config.watched_ports.into_iter().collect::<Vec<_>>(), vec![3000, 5173]);
        assert!(config.notifications_enabled);
        assert_eq!(config.monitoring.poll_interval_ms, 2000);
    }

    #[test]
    fn rejects_port_zero_and_tiny_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{"watched_ports": [0]}"#).unwrap();
        assert!(load_and_validate_config(&path).is_err());

        fs::write(&path, r#"{"monitoring": {"poll_interval_ms": 10}}"#).unwrap();
        assert!(load_and_validate_config(&path).is_err());

        fs::write(&path, r#"{"watched_ports": [70000]}"#).unwrap();
        assert!(load_and_validate_config(&path).is_err());
    }

    #[test]
    fn save_into_missing_directory_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join("nope").join("config.json"));

        let err = store.save(&Config::default()).unwrap_err();

        assert!(err.to_string().starts_with("failed to save config"));
    }
}
