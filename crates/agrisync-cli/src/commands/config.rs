use std::path::PathBuf;

use agrisync_core::config::SyncSettings;
use agrisync_core::util::normalize_text_option;
use agrisync_core::ClearPolicy;

use crate::cli::ConfigCommands;
use crate::error::CliError;
use crate::settings::ResolvedSettings;

pub fn run_config(command: ConfigCommands, resolved: &ResolvedSettings) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { json } => run_config_show(resolved, json),
        ConfigCommands::Set {
            api_url,
            db_file,
            clear_policy,
            timeout_secs,
            save_data,
        } => {
            let update = SettingsUpdate {
                api_url,
                db_file,
                clear_policy,
                timeout_secs,
                save_data,
            };
            run_config_set(resolved, update)
        }
    }
}

fn run_config_show(resolved: &ResolvedSettings, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&resolved.settings)?);
        return Ok(());
    }

    println!("Config file:   {}", resolved.config_path.display());
    println!("Database:      {}", resolved.db_path.display());
    println!(
        "API URL:       {}",
        resolved
            .api_base_url()
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("Clear policy:  {}", resolved.settings.clear_policy);
    println!("Timeout:       {}s", resolved.settings.request_timeout_secs);
    println!("Save data:     {}", resolved.settings.save_data);
    Ok(())
}

#[derive(Debug, Default)]
pub struct SettingsUpdate {
    pub api_url: Option<String>,
    pub db_file: Option<PathBuf>,
    pub clear_policy: Option<String>,
    pub timeout_secs: Option<u64>,
    pub save_data: Option<bool>,
}

/// Apply an update to the settings stored on disk.
///
/// Starts from the file, not the resolved settings, so environment and flag
/// overrides are never persisted.
pub fn apply_settings_update(
    mut settings: SyncSettings,
    update: SettingsUpdate,
) -> Result<SyncSettings, CliError> {
    if let Some(url) = update.api_url {
        settings.api_base_url = normalize_text_option(Some(url));
    }
    if let Some(path) = update.db_file {
        settings.db_path = Some(path);
    }
    if let Some(policy) = update.clear_policy {
        settings.clear_policy = policy.parse::<ClearPolicy>()?;
    }
    if let Some(timeout) = update.timeout_secs {
        settings.request_timeout_secs = timeout;
    }
    if let Some(save_data) = update.save_data {
        settings.save_data = save_data;
    }
    Ok(settings)
}

fn run_config_set(resolved: &ResolvedSettings, update: SettingsUpdate) -> Result<(), CliError> {
    let stored = SyncSettings::load_from_path(&resolved.config_path).map_err(CliError::Config)?;
    let updated = apply_settings_update(stored, update)?;
    updated
        .save_to_path(&resolved.config_path)
        .map_err(CliError::Config)?;
    println!("Saved {}", resolved.config_path.display());
    Ok(())
}
