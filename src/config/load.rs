use super::{ConfigError, Settings};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    File,
    CreatedDefault,
    /// The file could not be used; the daemon runs on the built-in defaults.
    FallbackDefault { reason: String },
}

#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub path: PathBuf,
    pub settings: Settings,
    pub source: SettingsSource,
}

/// Loads node settings once at startup. Never fails: a missing file is replaced by the
/// default, and an unreadable or invalid one falls back to the default in memory.
pub fn load_or_init(path: &Path) -> LoadedSettings {
    let loaded = |settings, source| LoadedSettings {
        path: path.to_path_buf(),
        settings,
        source,
    };

    if !path.exists() {
        let settings = Settings::default();
        return match save_settings(path, &settings) {
            Ok(()) => loaded(settings, SettingsSource::CreatedDefault),
            Err(err) => loaded(
                settings,
                SettingsSource::FallbackDefault {
                    reason: err.to_string(),
                },
            ),
        };
    }

    match Settings::from_path(path).and_then(|settings| {
        settings.validate()?;
        Ok(settings)
    }) {
        Ok(settings) => loaded(settings, SettingsSource::File),
        Err(err) => loaded(
            Settings::default(),
            SettingsSource::FallbackDefault {
                reason: err.to_string(),
            },
        ),
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let encoded = serde_yaml::to_string(settings).map_err(|source| ConfigError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, encoded).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })
}
