//! Settings resolution.
//!
//! Precedence: `--settings` flag, then `TABLEPROV_SETTINGS`, then
//! `<config_dir>/tableprov/settings.toml`, then built-in defaults. A path
//! that was named explicitly (flag or env) must exist; the user config file
//! is optional.

use crate::error::ConfigError;
use crate::settings::Settings;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the settings file.
pub const SETTINGS_ENV: &str = "TABLEPROV_SETTINGS";

/// Settings file name inside the user config directory.
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "tableprov";

/// Where the effective settings came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsSource {
    Cli,
    Env,
    UserConfig,
    Defaults,
}

/// Settings plus provenance, for `check` output and startup logs.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub settings: Settings,
    pub source: SettingsSource,
    pub path: Option<PathBuf>,
}

/// Resolve settings from the process environment.
pub fn resolve_settings(cli_path: Option<&Path>) -> Result<ResolvedSettings, ConfigError> {
    resolve_settings_with(
        cli_path,
        std::env::var_os(SETTINGS_ENV).map(PathBuf::from),
        dirs::config_dir(),
    )
}

/// Resolve settings with every input supplied by the caller.
pub fn resolve_settings_with(
    cli_path: Option<&Path>,
    env_path: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Result<ResolvedSettings, ConfigError> {
    if let Some(path) = cli_path {
        return load_explicit(path.to_path_buf(), SettingsSource::Cli);
    }
    if let Some(path) = env_path.filter(|p| !p.as_os_str().is_empty()) {
        return load_explicit(path, SettingsSource::Env);
    }
    if let Some(dir) = config_dir {
        let path = dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILE_NAME);
        if path.is_file() {
            let settings = Settings::from_file(&path)?;
            debug!(path = %path.display(), "loaded user settings");
            return Ok(ResolvedSettings {
                settings,
                source: SettingsSource::UserConfig,
                path: Some(path),
            });
        }
    }
    debug!("no settings file found, using defaults");
    Ok(ResolvedSettings {
        settings: Settings::default(),
        source: SettingsSource::Defaults,
        path: None,
    })
}

fn load_explicit(path: PathBuf, source: SettingsSource) -> Result<ResolvedSettings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path));
    }
    let settings = Settings::from_file(&path)?;
    debug!(path = %path.display(), ?source, "loaded settings");
    Ok(ResolvedSettings {
        settings,
        source,
        path: Some(path),
    })
}
