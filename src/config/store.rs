//! Settings persistence
//!
//! Pure load/save over a [`Settings`] value; nothing here is global.

use std::fs;
use std::io;
use std::path::Path;

use super::Settings;

/// Default settings file name
pub const DEFAULT_SETTINGS_FILE: &str = "hp_reactor.json";

/// Settings persistence errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access settings file: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load settings, propagating I/O and syntax errors
pub fn try_load(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Load settings, falling back to defaults on any failure
pub fn load(path: impl AsRef<Path>) -> Settings {
    let path = path.as_ref();
    if !path.exists() {
        log::info!("No settings at {}, using defaults", path.display());
        return Settings::default();
    }
    match try_load(path) {
        Ok(settings) => {
            log::info!("Loaded settings from {}", path.display());
            settings
        }
        Err(e) => {
            log::warn!("{} ({}), using defaults", e, path.display());
            Settings::default()
        }
    }
}

/// Write settings as pretty JSON
pub fn save(settings: &Settings, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    log::info!("Saved settings to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::CommandList;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load(dir.path().join(DEFAULT_SETTINGS_FILE));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SETTINGS_FILE);
        let settings = Settings {
            alive_target_command: CommandList::from("1;2"),
            far_target_command: CommandList::from(vec!["W"]),
            hp_stable_threshold_sec: 3.5,
            ..Settings::default()
        };

        save(&settings, &path).unwrap();
        assert_eq!(load(&path), settings);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(try_load(&path), Err(ConfigError::Json(_))));
        assert_eq!(load(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SETTINGS_FILE);
        fs::write(&path, r#"{"cooldown_sec": 1.25, "dead_target_command": "ESC"}"#).unwrap();

        let settings = load(&path);
        assert_eq!(settings.cooldown_sec, 1.25);
        assert_eq!(settings.dead_target_command.as_slice(), ["ESC"]);
        assert_eq!(settings.mark_key.as_deref(), Some("F2"));
    }
}
