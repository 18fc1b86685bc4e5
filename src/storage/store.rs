/// Persistent key-value asset store
///
/// Readers take lock-free snapshots through `ArcSwap`; writers are serialized by a
/// single mutex and publish a whole new map only after persistence succeeded, so a
/// failed write leaves both memory and disk exactly as they were.

use crate::config::StorageConfig;
use crate::error::{CoreError, CoreResult, EntityKind};
use crate::storage::snapshot::{SnapshotFile, SnapshotIter};
use crate::storage::types::{Asset, AssetFilter};
use arc_swap::ArcSwap;
use indexmap::IndexMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Format marker written into asset snapshots
pub const ASSET_SNAPSHOT_FORMAT: &str = "agency.asset-store";

type RecordMap = IndexMap<String, Arc<Asset>>;

/// In-memory asset map backed by one snapshot file
///
/// The backing file is exclusively owned by this instance; sharing it across
/// processes is unsupported.
#[derive(Debug)]
pub struct AssetStore {
    /// Current committed state, swapped atomically on every write
    records: ArcSwap<RecordMap>,
    /// Single-writer lock for put/delete/flush/load
    write_lock: Mutex<()>,
    /// Backing file; `None` keeps the store purely in memory
    snapshot: Option<SnapshotFile>,
    /// Persist on every mutation (otherwise only on flush/drop)
    autosave: bool,
    /// Unpersisted mutations exist (only possible with autosave off)
    dirty: AtomicBool,
}

impl AssetStore {
    /// Create an empty store persisting to `snapshot`
    ///
    /// Call `load()` to rehydrate existing state.
    pub fn new(snapshot: SnapshotFile, autosave: bool) -> Self {
        Self {
            records: ArcSwap::new(Arc::new(RecordMap::new())),
            write_lock: Mutex::new(()),
            snapshot: Some(snapshot),
            autosave,
            dirty: AtomicBool::new(false),
        }
    }

    /// Store without a backing file (tests, dry runs)
    pub fn in_memory() -> Self {
        Self {
            records: ArcSwap::new(Arc::new(RecordMap::new())),
            write_lock: Mutex::new(()),
            snapshot: None,
            autosave: false,
            dirty: AtomicBool::new(false),
        }
    }

    /// Build from configuration and load the existing snapshot
    pub fn open(config: &StorageConfig) -> CoreResult<Self> {
        let store = Self::new(
            SnapshotFile::new(config.asset_file(), ASSET_SNAPSHOT_FORMAT),
            config.autosave,
        );
        store.load()?;
        Ok(store)
    }

    /// Path of the backing snapshot, if any
    pub fn path(&self) -> Option<&Path> {
        self.snapshot.as_ref().map(SnapshotFile::path)
    }

    /// Rehydrate from the backing file
    ///
    /// A missing file yields an empty store. A file that exists but cannot be
    /// decoded fails with `StorageError` and leaves the current state untouched.
    pub fn load(&self) -> CoreResult<usize> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(self.len());
        };
        let _guard = self.writer();

        let records: Vec<Asset> = match snapshot.read()? {
            Some(records) => records,
            None => {
                tracing::info!("📭 No asset snapshot at {}, starting empty", snapshot.path().display());
                Vec::new()
            }
        };

        let map: RecordMap = records
            .into_iter()
            .map(|asset| (asset.id.clone(), Arc::new(asset)))
            .collect();
        let count = map.len();
        self.records.store(Arc::new(map));
        self.dirty.store(false, Ordering::SeqCst);

        tracing::info!("📥 Loaded {} assets from {}", count, snapshot.path().display());
        Ok(count)
    }

    /// Fetch one asset by id
    pub fn get(&self, id: &str) -> CoreResult<Asset> {
        self.records
            .load()
            .get(id)
            .map(|asset| Asset::clone(asset))
            .ok_or_else(|| CoreError::not_found(EntityKind::Asset, id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.load().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace a record
    pub fn put(&self, asset: Asset) -> CoreResult<()> {
        let _guard = self.writer();
        let mut next = RecordMap::clone(&self.records.load());
        next.insert(asset.id.clone(), Arc::new(asset));
        self.commit(next)
    }

    /// Insert a record only if its id is unused
    ///
    /// Returns `Ok(false)` without writing anything when the id is already taken.
    pub fn insert_new(&self, asset: Asset) -> CoreResult<bool> {
        let _guard = self.writer();
        let current = self.records.load();
        if current.contains_key(&asset.id) {
            return Ok(false);
        }
        let mut next = RecordMap::clone(&current);
        next.insert(asset.id.clone(), Arc::new(asset));
        self.commit(next)?;
        Ok(true)
    }

    /// Read-modify-write one record under the writer lock
    ///
    /// `change` receives the current record and returns its replacement; an error
    /// from `change` aborts without touching the store.
    pub fn update_with<F>(&self, id: &str, change: F) -> CoreResult<Asset>
    where
        F: FnOnce(&Asset) -> CoreResult<Asset>,
    {
        let _guard = self.writer();
        let current = self.records.load_full();
        let existing = current
            .get(id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Asset, id))?;

        let updated = change(existing)?;
        let mut next = RecordMap::clone(&current);
        next.insert(id.to_string(), Arc::new(updated.clone()));
        self.commit(next)?;
        Ok(updated)
    }

    /// Remove a record
    pub fn delete(&self, id: &str) -> CoreResult<Asset> {
        let _guard = self.writer();
        let mut next = RecordMap::clone(&self.records.load());
        let removed = next
            .shift_remove(id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Asset, id))?;
        self.commit(next)?;
        Ok(Asset::clone(&removed))
    }

    /// Lazily iterate over records matching `filter`
    ///
    /// The iterator reads one consistent snapshot; writes made while iterating are
    /// not observed.
    pub fn list(&self, filter: AssetFilter) -> impl Iterator<Item = Asset> {
        SnapshotIter::new(self.records.load_full(), move |asset: &Asset| filter.matches(asset))
    }

    /// Force the current state to disk
    pub fn flush(&self) -> CoreResult<()> {
        let _guard = self.writer();
        let current = self.records.load_full();
        self.persist(&current)?;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Whether mutations are waiting for a flush
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Persist (when autosaving) and publish the new state
    fn commit(&self, next: RecordMap) -> CoreResult<()> {
        if self.autosave {
            self.persist(&next)?;
        } else if self.snapshot.is_some() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        self.records.store(Arc::new(next));
        Ok(())
    }

    fn persist(&self, map: &RecordMap) -> CoreResult<()> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };
        let records: Vec<&Asset> = map.values().map(|asset| asset.as_ref()).collect();
        snapshot.write(&records).map_err(|e| {
            tracing::error!("❌ Failed to persist asset snapshot: {}", e);
            CoreError::from(e)
        })
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        // The guarded state lives in `records`; a poisoned lock carries no torn data
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for AssetStore {
    fn drop(&mut self) {
        if self.is_dirty() {
            if let Err(e) = self.flush() {
                tracing::error!("❌ Final flush of asset store failed: {}", e);
            }
        }
    }
}
