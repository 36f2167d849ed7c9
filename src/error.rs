use std::io;
use std::str::Utf8Error;
use thiserror::Error;
use btleplug;
use serde_json;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },

    #[error("Invalid scan duration {value:?} in config file: {source}")]
    InvalidDuration { value: String, source: humantime::DurationError },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to determine path to data directory")]
    NoDataPath,

    #[error("Invalid store key {0:?}")]
    InvalidKey(String),

    #[error("Failed to read/write store: {source}")]
    IOError { #[from] source: io::Error },
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to access device snapshot: {source}")]
    Store { #[from] source: StoreError },

    #[error("Failed to parse/build device snapshot: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

/// Conditions reported by the scan session controller when starting a scan.
///
/// The display text of each variant is meant to be shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Bluetooth scanning is not available on this system. Make sure a Bluetooth adapter is present and enabled.")]
    CapabilityUnavailable,

    #[error("Scan cancelled by user.")]
    UserCancelled,

    #[error("Bluetooth permission was denied. Please grant permission in your system settings.")]
    PermissionDenied,

    #[error("Continuous scanning is not supported on this system. You can select one device at a time with the prompt. The list feature requires LE scan support.")]
    DegradedModeNotice,

    #[error("An error occurred: {message}")]
    UnknownCapabilityError { message: String },
}

impl From<btleplug::Error> for ScanError {
    fn from(error: btleplug::Error) -> Self {
        match error {
            btleplug::Error::PermissionDenied => ScanError::PermissionDenied,
            other => ScanError::UnknownCapabilityError { message: other.to_string() },
        }
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No devices to export.")]
    NothingToExport,

    #[error("Failed to write export file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to open export file: {source}")]
    Open { source: io::Error },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to initialize logging: {source}")]
    Logging { #[from] source: log::SetLoggerError },

    #[error("Failed to open log file: {source}")]
    LogFile { source: io::Error },

    #[error("Failed to start async runtime: {source}")]
    Runtime { source: io::Error },

    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start application (store): {source}")]
    StoreError { #[from] source: StoreError },

    #[error("Failed to export devices: {source}")]
    ExportError { #[from] source: ExportError },

    #[error("Failed to read/write terminal: {source}")]
    Terminal { #[from] source: io::Error },
}
