use log::{debug, error, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;

use crate::device::registry::DeviceRegistry;
use crate::device::types::DeviceObservation;
use crate::error::SnapshotError;
use crate::store::BlobStore;

/// Work for the snapshot writer, collected from the registry after it changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistRequest {
    /// Replace the snapshot with these `(id, observation)` pairs, in insertion order
    Save(Vec<(String, DeviceObservation)>),
    /// The registry became empty
    Delete,
}

/// Persists the device registry under a single key of a `BlobStore`.
///
/// The snapshot is a JSON array of `[id, observation]` pairs.
#[derive(Clone)]
pub struct SnapshotStore<S> {
    store: S,
    key: String,
}

impl<S: BlobStore> SnapshotStore<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        SnapshotStore { store, key: key.into() }
    }

    /// Reads the persisted pairs, `Ok(None)` if there is no snapshot.
    pub async fn read_entries(&self) -> Result<Option<Vec<(String, DeviceObservation)>>, SnapshotError> {
        let Some(content) = self.store.get(&self.key).await? else {
            return Ok(None);
        };

        let entries: Vec<(String, DeviceObservation)> = serde_json::from_slice(&content)?;
        Ok(Some(entries))
    }

    /// Loads the persisted registry. A missing or unreadable snapshot gives an empty registry,
    /// the cause is logged.
    pub async fn load(&self) -> DeviceRegistry {
        let entries = match self.read_entries().await {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                info!("No device snapshot found, starting with an empty registry");
                return DeviceRegistry::new();
            },
            Err(err) => {
                error!("Failed to load device snapshot, starting with an empty registry: {}", err);
                return DeviceRegistry::new();
            },
        };

        let entries: Vec<(String, DeviceObservation)> = entries
            .into_iter()
            .filter(|(id, observation)| {
                if id.is_empty() || id != &observation.id {
                    warn!("Ignoring snapshot entry with inconsistent id {:?} / {:?}", id, observation.id);
                    return false;
                }
                true
            })
            .collect();

        let registry = DeviceRegistry::from_entries(entries);
        info!("Loaded {} devices from snapshot", registry.count());
        registry
    }

    pub async fn save(&self, registry: &DeviceRegistry) -> Result<(), SnapshotError> {
        self.save_entries(&registry.entries()).await
    }

    pub async fn save_entries(&self, entries: &[(String, DeviceObservation)]) -> Result<(), SnapshotError> {
        let content = serde_json::to_vec(entries)?;
        self.store.set(&self.key, content).await?;
        debug!("Saved snapshot of {} devices", entries.len());
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), SnapshotError> {
        self.store.delete(&self.key).await?;
        debug!("Deleted device snapshot");
        Ok(())
    }

    async fn flush(&self, registry: &DeviceRegistry) {
        let Some(request) = registry.take_persist_request() else {
            return;
        };

        let result = match request {
            PersistRequest::Save(entries) => self.save_entries(&entries).await,
            PersistRequest::Delete => self.delete().await,
        };

        if let Err(err) = result {
            // the registry stays the source of truth, the next mutation tries again
            error!("Failed to persist device snapshot: {}", err);
        }
    }
}

/// Spawns the task that writes the registry after it changed. Changes made while a write is in
/// progress are written together by the next one.
///
/// The task exits after `DeviceRegistry::detach_persistence`, once the last change is written.
pub fn snapshot_writer_task<S>(snapshots: SnapshotStore<S>, registry: DeviceRegistry) -> JoinHandle<()>
where
    S: BlobStore,
{
    let mut changed = registry.attach_persistence();

    spawn(async move {
        while changed.changed().await.is_ok() {
            snapshots.flush(&registry).await;
        }

        // changes from right before detaching
        snapshots.flush(&registry).await;
        debug!("Snapshot writer stopped");
    })
}
