use crate::error::ConfigError;
use directories::{BaseDirs, ProjectDirs};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const QUALIFIER: &str = "dev";
pub const ORGANIZATION: &str = "chatsync";
pub const APPLICATION: &str = "chatsync";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the store file. Defaults to the per-user data dir.
    pub data_dir: Option<PathBuf>,
    pub max_retries: u32,
    pub retry_step_ms: u64,
    pub retry_cap_ms: u64,
    pub debounce_ms: u64,
    pub message_window: usize,
    pub search_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_retries: 5,
            retry_step_ms: 1_000,
            retry_cap_ms: 10_000,
            debounce_ms: 300,
            message_window: 50,
            search_limit: 50,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // TOML is the primary format. A legacy JSON file is converted to TOML the first time it is read.
    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("chatsync.toml"))
    }

    fn legacy_json_path() -> Option<PathBuf> {
        let proj = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)?;
        Some(proj.config_dir().join("config.json"))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load() -> Self {
        if let Some(path) = Self::toml_path() {
            if let Ok(text) = fs::read_to_string(&path) {
                match Self::from_toml_str(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => warn!("ignoring unreadable config {}: {}", path.display(), e),
                }
            }
        }

        if let Some(legacy) = Self::legacy_json_path() {
            if let Ok(bytes) = fs::read(&legacy) {
                if let Ok(cfg) = serde_json::from_slice::<AppConfig>(&bytes) {
                    if let Err(e) = cfg.save() {
                        warn!("could not migrate legacy config: {}", e);
                    }
                    return cfg;
                }
            }
        }

        debug!("no config file found, using defaults");
        Self::new()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::toml_path().ok_or(ConfigError::NoConfigDir)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Resolves the store file location, honouring `data_dir` when set.
    pub fn store_path(&self) -> Option<PathBuf> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)?
                .data_dir()
                .to_path_buf(),
        };
        Some(dir.join("store.sqlite"))
    }

    pub fn retry_step(&self) -> Duration {
        Duration::from_millis(self.retry_step_ms)
    }

    pub fn retry_cap(&self) -> Duration {
        Duration::from_millis(self.retry_cap_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppConfig::from_toml_str("max_retries = 2\ndebounce_ms = 50\n").unwrap();
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.debounce(), Duration::from_millis(50));
        assert_eq!(cfg.retry_cap_ms, 10_000);
        assert_eq!(cfg.data_dir, None);
    }

    #[test]
    fn data_dir_override_drives_store_path() {
        let cfg = AppConfig {
            data_dir: Some(PathBuf::from("/tmp/chatsync-test")),
            ..AppConfig::default()
        };
        assert_eq!(
            cfg.store_path(),
            Some(PathBuf::from("/tmp/chatsync-test/store.sqlite"))
        );
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(AppConfig::from_toml_str("max_retries = \"many\"").is_err());
    }
}
