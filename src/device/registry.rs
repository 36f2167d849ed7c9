use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use indexmap::IndexMap;
use log::debug;
use tokio::sync::watch;

use crate::device::types::DeviceObservation;
use crate::store::snapshot::PersistRequest;

struct DeviceRegistryInner {
    // keyed by device id, in order of first insertion
    devices: IndexMap<String, DeviceObservation>,

    // set by every mutation, cleared when the snapshot writer takes the state
    dirty: bool,

    // wakes the snapshot writer, if attached
    persist: Option<watch::Sender<()>>,
}

impl DeviceRegistryInner {
    fn mark_dirty(&mut self) {
        self.dirty = true;

        if let Some(persist) = &self.persist {
            persist.send_replace(());
        }
    }

    fn entries(&self) -> Vec<(String, DeviceObservation)> {
        self.devices
            .iter()
            .map(|(id, observation)| (id.clone(), observation.clone()))
            .collect()
    }
}

/// Live, deduplicated set of observed devices.
///
/// Cloning gives another handle to the same registry. All operations take a single lock for
/// their duration, so `merge` may be called from the event delivery path while the command path
/// reads or clears.
#[derive(Clone)]
pub struct DeviceRegistry {
    inner: Arc<Mutex<DeviceRegistryInner>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        DeviceRegistry::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        DeviceRegistry::from_entries(Vec::new())
    }

    /// Builds a registry from `(id, observation)` pairs, a later pair for the same id wins.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, DeviceObservation)>,
    {
        let inner = DeviceRegistryInner {
            devices: entries.into_iter().collect(),
            dirty: false,
            persist: None,
        };
        DeviceRegistry { inner: Arc::new(Mutex::new(inner)) }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceRegistryInner> {
        // the inner state is plain data that is never left half updated
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts notifying a snapshot writer of every future mutation. The writer collects the
    /// state itself with `take_persist_request`.
    pub fn attach_persistence(&self) -> watch::Receiver<()> {
        let (persist, changed) = watch::channel(());
        self.lock().persist = Some(persist);
        changed
    }

    /// Stops notifying the snapshot writer, its receiver reports the channel as closed.
    pub fn detach_persistence(&self) {
        self.lock().persist = None;
    }

    /// The state to persist if anything changed since the last call, `Delete` for an empty
    /// registry.
    pub fn take_persist_request(&self) -> Option<PersistRequest> {
        let mut inner = self.lock();
        if !inner.dirty {
            return None;
        }

        inner.dirty = false;
        if inner.devices.is_empty() {
            Some(PersistRequest::Delete)
        } else {
            Some(PersistRequest::Save(inner.entries()))
        }
    }

    /// Inserts or replaces the observation for `observation.id`. The previous observation is
    /// replaced in full, fields absent from the new observation do not carry over.
    /// Observations without an id are ignored.
    pub fn merge(&self, observation: DeviceObservation) {
        if observation.id.is_empty() {
            debug!("Ignoring observation without a device id");
            return;
        }

        let mut inner = self.lock();
        debug!("Merging observation of {} (rssi {:?})", observation.id, observation.signal_strength);
        inner.devices.insert(observation.id.clone(), observation);
        inner.mark_dirty();
    }

    /// A copy of all observations, strongest signal first. Devices without a reported signal
    /// strength come last, equal strengths keep their insertion order.
    pub fn snapshot(&self) -> Vec<DeviceObservation> {
        let mut snapshot: Vec<DeviceObservation> = self.lock().devices.values().cloned().collect();
        // Option orders None below every Some, which is exactly "weakest possible value".
        // sort_by is stable.
        snapshot.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));
        snapshot
    }

    /// A copy of all `(id, observation)` pairs in insertion order.
    pub fn entries(&self) -> Vec<(String, DeviceObservation)> {
        self.lock().entries()
    }

    pub fn get(&self, id: &str) -> Option<DeviceObservation> {
        self.lock().devices.get(id).cloned()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.devices.clear();
        inner.mark_dirty();
    }

    pub fn count(&self) -> usize {
        self.lock().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use super::*;

    fn observation(id: &str, rssi: Option<i16>) -> DeviceObservation {
        DeviceObservation {
            id: id.to_string(),
            name: None,
            signal_strength: rssi,
            transmit_power: None,
            observed_at: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        }
    }

    #[test]
    fn merge_keeps_one_entry_per_id() {
        let registry = DeviceRegistry::new();
        registry.merge(observation("a", Some(-50)));
        registry.merge(observation("b", Some(-60)));
        registry.merge(observation("a", Some(-70)));

        assert_eq!(registry.count(), 2);
        assert_eq!(registry.get("a").unwrap().signal_strength, Some(-70));
    }

    #[test]
    fn merge_replaces_observation_in_full() {
        let registry = DeviceRegistry::new();
        let first = DeviceObservation {
            id: "a".to_string(),
            name: Some("Tag".to_string()),
            signal_strength: Some(-50),
            transmit_power: Some(4),
            observed_at: UNIX_EPOCH,
        };
        registry.merge(first);

        let second = DeviceObservation {
            id: "a".to_string(),
            name: None,
            signal_strength: None,
            transmit_power: None,
            observed_at: SystemTime::now(),
        };
        registry.merge(second.clone());

        assert_eq!(registry.get("a"), Some(second));
    }

    #[test]
    fn snapshot_sorts_by_descending_signal_with_unknown_last() {
        let registry = DeviceRegistry::new();
        registry.merge(observation("w", Some(-55)));
        registry.merge(observation("x", Some(-72)));
        registry.merge(observation("y", None));
        registry.merge(observation("z", Some(-90)));

        let order: Vec<Option<i16>> = registry.snapshot().iter().map(|o| o.signal_strength).collect();
        assert_eq!(order, vec![Some(-55), Some(-72), Some(-90), None]);
    }

    #[test]
    fn snapshot_ties_keep_insertion_order() {
        let registry = DeviceRegistry::new();
        registry.merge(observation("first", Some(-60)));
        registry.merge(observation("none-1", None));
        registry.merge(observation("second", Some(-60)));
        registry.merge(observation("none-2", None));

        let ids: Vec<String> = registry.snapshot().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["first", "second", "none-1", "none-2"]);
    }

    #[test]
    fn snapshot_is_not_affected_by_later_mutations() {
        let registry = DeviceRegistry::new();
        registry.merge(observation("a", Some(-50)));

        let snapshot = registry.snapshot();
        registry.merge(observation("b", Some(-40)));
        registry.clear();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "a");
    }

    #[test]
    fn entries_keep_insertion_order_when_overwritten() {
        let registry = DeviceRegistry::new();
        registry.merge(observation("a", Some(-90)));
        registry.merge(observation("b", Some(-40)));
        registry.merge(observation("a", Some(-30)));

        let ids: Vec<String> = registry.entries().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn from_entries_later_duplicate_wins() {
        let registry = DeviceRegistry::from_entries(vec![
            ("a".to_string(), observation("a", Some(-80))),
            ("a".to_string(), observation("a", Some(-20))),
        ]);

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get("a").unwrap().signal_strength, Some(-20));
    }

    #[test]
    fn merge_ignores_empty_id() {
        let registry = DeviceRegistry::new();
        let changed = registry.attach_persistence();

        registry.merge(observation("", Some(-10)));

        assert!(registry.is_empty());
        assert_eq!(registry.take_persist_request(), None);
        assert!(!changed.has_changed().unwrap());
    }

    #[test]
    fn pending_changes_are_taken_once() {
        let registry = DeviceRegistry::new();
        let changed = registry.attach_persistence();
        assert_eq!(registry.take_persist_request(), None);

        registry.merge(observation("a", Some(-50)));
        registry.merge(observation("b", None));
        registry.merge(observation("a", Some(-60)));
        assert!(changed.has_changed().unwrap());

        match registry.take_persist_request() {
            Some(PersistRequest::Save(entries)) => {
                let ids: Vec<&str> = entries.iter().map(|(id, _)| id.as_str()).collect();
                assert_eq!(ids, vec!["a", "b"]);
                assert_eq!(entries[0].1.signal_strength, Some(-60));
            },
            other => panic!("unexpected request {:?}", other),
        }
        assert_eq!(registry.take_persist_request(), None);

        registry.clear();
        assert_eq!(registry.take_persist_request(), Some(PersistRequest::Delete));
    }

    #[test]
    fn loaded_entries_are_not_pending() {
        let registry = DeviceRegistry::from_entries(vec![("a".to_string(), observation("a", None))]);
        assert_eq!(registry.take_persist_request(), None);
    }

    #[test]
    fn detached_registry_closes_the_channel() {
        let registry = DeviceRegistry::new();
        let changed = registry.attach_persistence();
        registry.detach_persistence();

        registry.merge(observation("a", Some(-50)));

        assert!(changed.has_changed().is_err());
    }

    #[test]
    fn concurrent_merge_snapshot_and_clear() {
        let registry = DeviceRegistry::new();

        thread::scope(|scope| {
            let merger = registry.clone();
            scope.spawn(move || {
                for i in 0..2000 {
                    let rssi = if i % 7 == 0 { None } else { Some(-((i % 90) as i16)) };
                    merger.merge(observation(&format!("dev-{}", i % 25), rssi));
                }
            });

            let clearer = registry.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    clearer.clear();
                    thread::yield_now();
                }
            });

            for _ in 0..500 {
                let snapshot = registry.snapshot();

                let mut ids = HashSet::new();
                assert!(snapshot.iter().all(|o| ids.insert(o.id.clone())), "duplicate id in {:?}", snapshot);
                assert!(snapshot.windows(2).all(|pair| pair[0].signal_strength >= pair[1].signal_strength));
                assert!(snapshot.len() <= 25);
            }
        });

        assert!(registry.count() <= 25);
    }
}
