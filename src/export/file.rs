use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use log::info;
use tokio::fs;
use tokio::task::spawn_blocking;

use crate::device::registry::DeviceRegistry;
use crate::error::ExportError;
use crate::export::csv::to_delimited_text;

/// `bluetooth_devices_<milliseconds since the unix epoch>.csv`
pub fn export_file_name(at: SystemTime) -> String {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0);

    format!("bluetooth_devices_{}.csv", millis)
}

/// Writes the current registry snapshot as CSV into `directory` and returns the path of the new
/// file. An empty registry is reported as `ExportError::NothingToExport` and writes nothing.
pub async fn export_registry(registry: &DeviceRegistry, directory: &Path) -> Result<PathBuf, ExportError> {
    let snapshot = registry.snapshot();
    if snapshot.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let content = to_delimited_text(&snapshot);
    let path = directory.join(export_file_name(SystemTime::now()));

    fs::create_dir_all(directory).await?;
    fs::write(&path, content).await?;
    info!("Exported {} devices to {}", snapshot.len(), path.to_string_lossy());

    Ok(path)
}

/// Opens an exported file with the default application for csv files.
pub async fn open_export(path: &Path) -> Result<(), ExportError> {
    let path = path.to_path_buf();

    spawn_blocking(move || open::that(&path))
        .await
        .map_err(|err| ExportError::Open { source: io::Error::new(io::ErrorKind::Other, err) })?
        .map_err(|source| ExportError::Open { source })?;

    Ok(())
}
