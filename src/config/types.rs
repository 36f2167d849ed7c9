use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::device::constants::DEFAULT_SNAPSHOT_KEY;
use crate::error::ConfigError;

fn default_snapshot_key() -> String {
    DEFAULT_SNAPSHOT_KEY.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_snapshot_key")]
    pub snapshot_key: String,

    /// Where the device snapshot is stored. Defaults to the os data directory.
    #[serde(default)]
    pub data_directory: Option<PathBuf>,

    /// Where exports are written. Defaults to the current directory.
    #[serde(default)]
    pub export_directory: Option<PathBuf>,

    /// How long the scan command runs, e.g. "30s" or "5min". Runs until interrupted if absent.
    #[serde(default)]
    pub scan_duration: Option<String>,
}

impl Config {
    pub fn scan_duration(&self) -> Result<Option<Duration>, ConfigError> {
        match &self.scan_duration {
            None => Ok(None),
            Some(value) => humantime::parse_duration(value)
                .map(Some)
                .map_err(|source| ConfigError::InvalidDuration { value: value.clone(), source }),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            snapshot_key: default_snapshot_key(),
            data_directory: None,
            export_directory: None,
            scan_duration: None,
        }
    }
}
