use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DurationError {
    #[error("{name} must be a positive number of minutes, got {minutes}")]
    NotPositive { name: &'static str, minutes: f64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(#[from] DurationError),
    #[error("failed to encode config: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AutostartError {
    #[error("cannot resolve the current executable: {0}")]
    CurrentExe(#[source] io::Error),
    #[error("executable path is not valid UTF-8: {}", .0.display())]
    NonUtf8Exe(PathBuf),
    #[error("{0}")]
    Launcher(String),
    #[error("launch on startup is not available on this system")]
    Unavailable,
}
