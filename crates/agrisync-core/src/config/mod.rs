//! Persistent sync settings shared by AgriSync front ends.
//!
//! Settings live in a JSON file; environment variables override individual
//! fields at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sync::ClearPolicy;
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_API_URL: &str = "AGRISYNC_API_URL";
pub const ENV_DB_PATH: &str = "AGRISYNC_DB_PATH";
pub const ENV_CLEAR_POLICY: &str = "AGRISYNC_CLEAR_POLICY";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    /// Base URL of the remote service, e.g. `http://127.0.0.1:8080`
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Local database file; front ends pick a default when unset
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub clear_policy: ClearPolicy,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// User asked to keep data usage low
    #[serde(default)]
    pub save_data: bool,
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_probe_interval_secs() -> u64 {
    DEFAULT_PROBE_INTERVAL_SECS
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            db_path: None,
            clear_policy: ClearPolicy::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            save_data: false,
        }
    }
}

impl SyncSettings {
    /// Load settings, falling back to defaults when the file does not exist.
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut settings = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        normalized.validate()?;
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Apply `AGRISYNC_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = Some(url);
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(policy) = normalize_text_option(lookup(ENV_CLEAR_POLICY)) {
            self.clear_policy = policy
                .parse()
                .map_err(|error| format!("{ENV_CLEAR_POLICY}: {error}"))?;
        }
        self.validate()
    }

    pub fn api_base_url(&self) -> Option<String> {
        normalize_text_option(self.api_base_url.clone())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(url) = self.api_base_url() {
            if !is_http_url(&url) {
                return Err(format!("api_base_url must include http:// or https://: {url}"));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }
        if self.probe_interval_secs == 0 {
            return Err("probe_interval_secs must be greater than 0".to_string());
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.api_base_url =
            normalize_text_option(self.api_base_url.clone()).map(|url| url.trim_end_matches('/').to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let settings = SyncSettings::load_from_path(&tmp.path().join("config.json")).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.clear_policy, ClearPolicy::ClearAll);
        assert_eq!(settings.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn roundtrip_normalizes_url() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("agrisync").join("config.json");

        let settings = SyncSettings {
            api_base_url: Some(" http://127.0.0.1:8080/ ".to_string()),
            clear_policy: ClearPolicy::RetainFailed,
            ..SyncSettings::default()
        };
        settings.save_to_path(&path).unwrap();

        let loaded = SyncSettings::load_from_path(&path).unwrap();
        assert_eq!(loaded.api_base_url.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(loaded.clear_policy, ClearPolicy::RetainFailed);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"api_base_url":null,"turso_url":"x"}"#).unwrap();

        let error = SyncSettings::load_from_path(&path).unwrap_err();
        assert!(error.contains("Failed to parse config"));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "https://farm.example.com"),
            (ENV_DB_PATH, "/tmp/farm.db"),
            (ENV_CLEAR_POLICY, "retain-failed"),
        ]);
        let mut settings = SyncSettings::default();
        settings
            .apply_env_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(settings.api_base_url(), Some("https://farm.example.com".to_string()));
        assert_eq!(settings.db_path, Some(PathBuf::from("/tmp/farm.db")));
        assert_eq!(settings.clear_policy, ClearPolicy::RetainFailed);
    }

    #[test]
    fn env_overrides_reject_bad_values() {
        let mut settings = SyncSettings::default();
        assert!(settings
            .apply_env_overrides(|key| (key == ENV_CLEAR_POLICY).then(|| "sometimes".to_string()))
            .is_err());

        let mut settings = SyncSettings::default();
        assert!(settings
            .apply_env_overrides(|key| (key == ENV_API_URL).then(|| "farm.example.com".to_string()))
            .is_err());
    }
}
