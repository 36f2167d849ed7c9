use std::env::{current_exe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use directories_next::{ProjectDirs};
use tokio::fs::{File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use serde_json;
use fd_lock::{RwLock, RwLockWriteGuard};
use log::{info, warn};
use std::fs::OpenOptions;
use std::str;

use crate::config::types::Config;
use crate::error::ConfigError;

// creates a path to <exe name>.json in the same directory as the executable
// this could be useful for usb sticks
fn get_portable_config_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(mut path) => {
            // F:\beacon-scan.exe => F:\beacon-scan.json
            if !path.set_extension("json") {
                warn!("current exe has no filename: {}", path.to_string_lossy());
                return None
            }

            Some(path)
        },
        Err(err) => {
            warn!("failed to get current exe path: {:?}", err);
            None
        },
    }
}

// creates a path to beacon-scan.json in an os dependent standard directory, such as %AppData% on
// windows.
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "beacon-scan", "beacon-scan").map(|dirs| {
        dirs.config_dir().join("beacon-scan.json")
    })
}

fn get_config_path() -> Result<PathBuf, ConfigError> {
    let portable = get_portable_config_path();
    if let Some(path) = portable {
        match std::fs::metadata(&path) {
            Ok(attr) => {
                if attr.is_file() {
                    return Ok(path);
                }
            }
            Err(err) => {
                info!("No portable config at {}; Using local path instead. ({})", path.to_string_lossy(), err);
            },
        }
    }

    match get_local_config_path() {
        None => Err(ConfigError::NoConfigPath),
        Some(path) => Ok(path),
    }
}

pub struct ConfigIOLocker {
    rw_lock: RwLock<std::fs::File>,
}

impl ConfigIOLocker {
    /// Fails with `ConfigError::CanNotLock` if another instance holds the config file.
    pub fn lock(&mut self) -> Result<RwLockWriteGuard<std::fs::File>, ConfigError> {
        self.rw_lock.try_write().map_err(|source| ConfigError::CanNotLock { source })
    }
}

struct ConfigIOInner {
    file: std::fs::File,
}

#[derive(Clone)]
pub struct ConfigIO {
    inner: Arc<Mutex<ConfigIOInner>>,
}

impl ConfigIO {
    pub fn new_sync() -> Result<Self, ConfigError> {
        let path = get_config_path()?;
        ConfigIO::open_sync(&path)
    }

    pub fn open_sync(path: &Path) -> Result<Self, ConfigError> {
        info!("Using config file {}", path.to_string_lossy());

        let directory = path.parent().ok_or(ConfigError::NoConfigPath)?;
        std::fs::create_dir_all(directory)?;

        // the file is locked later on (see locker()) so that the device snapshot belonging to
        // this config is used by only one instance of this application.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .append(false)
            .create(true)
            .open(path)?;

        let inner = ConfigIOInner {
            file,
        };
        Ok(ConfigIO { inner: Arc::new(Mutex::new(inner)) })
    }

    fn lock_inner(&self) -> MutexGuard<'_, ConfigIOInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn locker(&mut self) -> Result<ConfigIOLocker, ConfigError> {
        let inner = self.lock_inner();

        Ok(ConfigIOLocker {
            rw_lock: RwLock::new(inner.file.try_clone()?),
        })
    }

    // The File returned from here should never be closed!
    fn get_file(&self) -> Result<File, ConfigError> {
        let inner = self.lock_inner();
        let file = inner.file.try_clone()?; // std File
        Ok(File::from_std(file)) // tokio File
    }

    /// Reads the config, an empty file gives `None`.
    async fn read_content(&self) -> Result<Option<Config>, ConfigError> {
        let mut file = self.get_file()?;
        file.rewind().await?;

        let mut content = vec![];
        file.read_to_end(&mut content).await?;

        if content.is_empty() {
            return Ok(None);
        }

        let content = str::from_utf8(&content)?;
        let config: Config = serde_json::from_str(content)?;
        Ok(Some(config))
    }

    /// Reads the config. An empty config file is filled with the defaults so that users have
    /// something to edit.
    pub async fn read_or_create(&self) -> Result<Config, ConfigError> {
        info!("Reading config file");

        match self.read_content().await? {
            Some(config) => Ok(config),
            None => {
                let config = Config::default();
                self.save(config.clone()).await?;
                Ok(config)
            },
        }
    }

    pub async fn save(&self, config: Config) -> Result<(), ConfigError> {
        let mut file = self.get_file()?;
        info!("Saving config");

        let content = serde_json::to_string_pretty(&config)?;
        file.rewind().await?;
        file.set_len(0).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
