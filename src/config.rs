//! Persisted user settings.
//!
//! The file is the JSON object the settings window writes: durations in
//! minutes plus two flags. Anything unreadable is treated as "no config" and
//! the defaults are used instead.

use crate::error::ConfigError;
use crate::pomodoro::pomodoro::{Durations, millis_to_minutes};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const APP_DIR: &str = "tomato_bar";
const CONFIG_FILE: &str = "config.json";
const SESSION_LOG_FILE: &str = "sessions.log";

/// On-disk and on-the-wire shape of the settings. Durations are minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub work_timer: f64,
    pub relax_timer: f64,
    pub long_relax_timer: f64,
    pub show_timer: bool,
    pub launch_on_startup: bool,
}

/// Validated settings the controller runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub durations: Durations,
    pub show_timer: bool,
    pub launch_on_startup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            durations: Durations::default(),
            show_timer: true,
            launch_on_startup: false,
        }
    }
}

impl TryFrom<ConfigFile> for Settings {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        Ok(Self {
            durations: Durations::from_minutes(
                file.work_timer,
                file.relax_timer,
                file.long_relax_timer,
            )?,
            show_timer: file.show_timer,
            launch_on_startup: file.launch_on_startup,
        })
    }
}

impl From<&Settings> for ConfigFile {
    fn from(settings: &Settings) -> Self {
        Self {
            work_timer: millis_to_minutes(settings.durations.work()),
            relax_timer: millis_to_minutes(settings.durations.short_relax()),
            long_relax_timer: millis_to_minutes(settings.durations.long_relax()),
            show_timer: settings.show_timer,
            launch_on_startup: settings.launch_on_startup,
        }
    }
}

/// `$TOMATO_BAR_CONFIG_DIR/config.json`, else the platform config dir.
pub fn default_config_path() -> PathBuf {
    let dir = match std::env::var_os("TOMATO_BAR_CONFIG_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::config_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    dir.join(CONFIG_FILE)
}

pub fn session_log_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SESSION_LOG_FILE)
}

pub fn load(path: &Path) -> Result<Settings, ConfigError> {
    let raw = std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ConfigFile = serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Settings::try_from(file)
}

/// Like [`load`], but never fails.
pub fn load_or_default(path: &Path) -> Settings {
    match load(path) {
        Ok(settings) => {
            debug!(path = %path.display(), "loaded config");
            settings
        }
        Err(error) => {
            info!(%error, "Didn't find previous config. Using default settings");
            Settings::default()
        }
    }
}

pub fn save(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(&ConfigFile::from(settings)).map_err(ConfigError::Encode)?;
    let io_error = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, json).map_err(io_error)
}
