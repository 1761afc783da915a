//! Engine settings persistence
//!
//! `EngineSettings` itself lives in taprule-types; this module stores it
//! through confy (`~/.config/taprule/settings.toml` on Linux).

use std::path::{Path, PathBuf};

pub use taprule_types::{EngineSettings, MIN_UPDATE_SUBS_INTERVAL_MS};

use super::error::ConfigError;

const APP_NAME: &str = "taprule";
const CONFIG_NAME: &str = "settings";

/// Extension trait for EngineSettings persistence
pub trait SettingsExt: Sized {
    /// Load from the default location, falling back to defaults when the
    /// file is missing or unreadable.
    fn load() -> Self;
    fn load_path(path: &Path) -> Result<Self, ConfigError>;
    fn save(&self) -> Result<(), ConfigError>;
    fn save_path(&self, path: &Path) -> Result<(), ConfigError>;
    fn config_path() -> Result<PathBuf, ConfigError>;
}

impl SettingsExt for EngineSettings {
    fn load() -> Self {
        match confy::load(APP_NAME, CONFIG_NAME) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load settings, using defaults");
                Self::default()
            }
        }
    }

    fn load_path(path: &Path) -> Result<Self, ConfigError> {
        Ok(confy::load_path(path)?)
    }

    fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, CONFIG_NAME, self).map_err(ConfigError::Save)
    }

    fn save_path(&self, path: &Path) -> Result<(), ConfigError> {
        confy::store_path(path, self).map_err(ConfigError::Save)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME).map_err(ConfigError::Locate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut settings = EngineSettings::load_path(&path).unwrap();
        assert_eq!(settings, EngineSettings::default());

        settings.scan_interval_ms = 300;
        settings.enable_service = false;
        settings.save_path(&path).unwrap();

        let reloaded = EngineSettings::load_path(&path).unwrap();
        assert_eq!(reloaded.scan_interval_ms, 300);
        assert!(!reloaded.enable_service);
    }
}
