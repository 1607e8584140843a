//! JSON file persistence for [`EndpointConfig`].

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::EndpointConfig;

/// File name of the persisted settings blob.
pub const STORAGE_FILE: &str = "sohook-storage.json";

/// Errors from settings persistence.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no configuration directory available")]
    NoConfigDir,
}

/// Settings file on disk.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Uses the settings file at `path`. Nothing is read until [`load`](Self::load).
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Uses the platform default location.
    pub fn open_default() -> Result<Self, SettingsError> {
        default_storage_path()
            .map(Self::new)
            .ok_or(SettingsError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored configuration.
    ///
    /// A missing file yields defaults. An unreadable or corrupt file is
    /// logged and also yields defaults; it is overwritten on the next save.
    pub fn load(&self) -> EndpointConfig {
        match self.try_load() {
            Ok(Some(config)) => {
                debug!(path = %self.path.display(), "loaded settings");
                config
            }
            Ok(None) => EndpointConfig::default(),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read settings, using defaults"
                );
                EndpointConfig::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<EndpointConfig>, SettingsError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Writes `config` to disk, creating parent directories as needed.
    pub fn save(&self, config: &EndpointConfig) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(config)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "persisted settings");
        Ok(())
    }
}

/// Returns the default settings path.
pub fn default_storage_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("sohook").join(STORAGE_FILE))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    resolve_config_dir(|name| std::env::var(name).ok())
}

/// Picks the config directory from environment lookups. Unset and empty
/// variables are skipped alike.
fn resolve_config_dir(var: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let get = |name: &str| var(name).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

    if cfg!(target_os = "windows") {
        return get("APPDATA");
    }
    if cfg!(target_os = "linux")
        && let Some(dir) = get("XDG_CONFIG_HOME")
    {
        return Some(dir);
    }
    get("HOME").map(|home| home.join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, SettingsStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(tmp.path().join("nested").join(STORAGE_FILE));
        (tmp, store)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let (_tmp, store) = test_store();
        assert_eq!(store.load(), EndpointConfig::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn save_and_load() {
        let (_tmp, store) = test_store();
        let config = EndpointConfig {
            server_url: "http://10.0.0.5:9090".into(),
            auto_refresh: false,
            refresh_interval: 5000,
        };

        store.save(&config).unwrap();
        assert!(store.path().exists());
        assert_eq!(store.load(), config);
    }

    #[test]
    fn persists_to_new_instance() {
        let (_tmp, store) = test_store();
        let config = EndpointConfig {
            refresh_interval: 750,
            ..EndpointConfig::default()
        };
        store.save(&config).unwrap();

        let reopened = SettingsStore::new(store.path().to_path_buf());
        assert_eq!(reopened.load().refresh_interval, 750);
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let (_tmp, store) = test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();

        assert_eq!(store.load(), EndpointConfig::default());
    }

    #[test]
    fn only_config_keys_written() {
        let (_tmp, store) = test_store();
        store.save(&EndpointConfig::default()).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let mut keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["autoRefresh", "refreshInterval", "serverUrl"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn config_dir_prefers_xdg_then_home() {
        fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
            move |name| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
            }
        }

        assert_eq!(
            resolve_config_dir(env(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/u")])),
            Some(PathBuf::from("/xdg"))
        );
        assert_eq!(
            resolve_config_dir(env(&[("XDG_CONFIG_HOME", ""), ("HOME", "/home/u")])),
            Some(PathBuf::from("/home/u/.config"))
        );
        assert_eq!(resolve_config_dir(env(&[("HOME", "")])), None);
        assert_eq!(resolve_config_dir(env(&[])), None);
    }

    #[test]
    fn default_path_ends_with_storage_file() {
        if let Some(path) = default_storage_path() {
            assert!(path.ends_with(Path::new("sohook").join(STORAGE_FILE)));
        }
    }
}
