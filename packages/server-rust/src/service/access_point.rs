//! Dataset name → access point table consulted on every request.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{info, warn};

use super::dataset::DataAccessPoint;
use super::error::ConfigError;

type Snapshot = HashMap<String, Arc<DataAccessPoint>>;

/// Registry of routable datasets.
///
/// Readers load an immutable snapshot without locking, so a lookup sees
/// either the table before a write or the table after it, never a partial
/// entry. Writers serialize on a mutex, copy the current snapshot, apply
/// their change, and publish the new snapshot atomically.
pub struct DataAccessPointRegistry {
    snapshot: ArcSwap<Snapshot>,
    write_lock: Mutex<()>,
}

impl DataAccessPointRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Adds an access point under its own name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateDataset` if the name is already taken.
    pub fn register(&self, access_point: DataAccessPoint) -> Result<Arc<DataAccessPoint>, ConfigError> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot.load_full();
        if current.contains_key(access_point.name()) {
            return Err(ConfigError::DuplicateDataset {
                name: access_point.name().to_string(),
            });
        }
        let access_point = Arc::new(access_point);
        let mut next = Snapshot::clone(&current);
        next.insert(access_point.name().to_string(), Arc::clone(&access_point));
        self.snapshot.store(Arc::new(next));
        info!(dataset = access_point.name(), "dataset registered");
        Ok(access_point)
    }

    /// Removes an access point and closes its dataset. Absent names are a no-op.
    ///
    /// Returns whether an entry was removed. Requests already holding the
    /// access point finish against a closed dataset.
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = {
            let _guard = self.write_lock.lock();
            let current = self.snapshot.load_full();
            if !current.contains_key(name) {
                return false;
            }
            let mut next = Snapshot::clone(&current);
            let removed = next.remove(name);
            self.snapshot.store(Arc::new(next));
            removed
        };

        if let Some(access_point) = removed {
            if let Err(e) = access_point.data_service().close().await {
                warn!(dataset = name, error = %e, "dataset close failed");
            }
            info!(dataset = name, "dataset unregistered");
        }
        true
    }

    /// Looks up an access point by name. Safe under any amount of concurrency.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<DataAccessPoint>> {
        self.snapshot.load().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.snapshot.load().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// Applies `action` to every entry of a point-in-time snapshot.
    /// Registrations made while iterating are not observed.
    pub fn for_each(&self, mut action: impl FnMut(&str, &Arc<DataAccessPoint>)) {
        let snapshot = self.snapshot.load_full();
        for (name, access_point) in snapshot.iter() {
            action(name, access_point);
        }
    }

    /// Point-in-time copy of every entry.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<DataAccessPoint>> {
        self.snapshot.load().values().cloned().collect()
    }
}

impl Default for DataAccessPointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
