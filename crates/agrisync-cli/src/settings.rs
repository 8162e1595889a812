//! Resolve effective settings from config file, environment and flags.

use std::env;
use std::path::{Path, PathBuf};

use agrisync_core::config::SyncSettings;
use agrisync_core::util::normalize_text_option;

use crate::error::CliError;

/// Settings after every layer has been applied, plus where they came from.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub settings: SyncSettings,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
}

impl ResolvedSettings {
    pub fn api_base_url(&self) -> Option<String> {
        self.settings.api_base_url()
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agrisync")
        .join("config.json")
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agrisync")
        .join("agrisync.db")
}

/// Load the config file, then environment overrides, then CLI flags.
pub fn resolve_settings(
    config_path: &Path,
    cli_db_path: Option<PathBuf>,
    cli_api_url: Option<String>,
) -> Result<ResolvedSettings, CliError> {
    resolve_settings_with(config_path, cli_db_path, cli_api_url, |key| {
        env::var(key).ok()
    })
}

pub fn resolve_settings_with<F>(
    config_path: &Path,
    cli_db_path: Option<PathBuf>,
    cli_api_url: Option<String>,
    lookup: F,
) -> Result<ResolvedSettings, CliError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = SyncSettings::load_from_path(config_path).map_err(CliError::Config)?;
    settings
        .apply_env_overrides(lookup)
        .map_err(CliError::Config)?;

    if let Some(url) = normalize_text_option(cli_api_url) {
        settings.api_base_url = Some(url.trim_end_matches('/').to_string());
    }

    let db_path = cli_db_path
        .or_else(|| settings.db_path.clone())
        .unwrap_or_else(default_db_path);

    Ok(ResolvedSettings {
        settings,
        config_path: config_path.to_path_buf(),
        db_path,
    })
}
