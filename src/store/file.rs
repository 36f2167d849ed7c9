use std::io;
use std::path::PathBuf;
use directories_next::ProjectDirs;
use log::info;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;
use crate::store::BlobStore;

// creates a path to the data directory in an os dependent standard location, such as
// %LocalAppData% on windows or ~/.local/share on linux.
pub fn get_local_data_path() -> Result<PathBuf, StoreError> {
    ProjectDirs::from("io", "beacon-scan", "beacon-scan")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .ok_or(StoreError::NoDataPath)
}

/// A `BlobStore` that keeps every key in its own file within a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new_sync(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        info!("Using data directory {}", directory.to_string_lossy());
        std::fs::create_dir_all(&directory)?;
        Ok(FileStore { directory })
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');

        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        Ok(self.directory.join(format!("{}.blob", key)))
    }
}

impl BlobStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.blob_path(key)?;

        match fs::read(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let path = self.blob_path(key)?;
        let temp_path = path.with_extension("blob.tmp");

        // write next to the target and rename, so that a crash never leaves a truncated blob
        let mut file = File::create(&temp_path).await?;
        file.write_all(&value).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.blob_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
