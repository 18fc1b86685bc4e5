/// Snapshot files with atomic replacement
///
/// A snapshot is the full serialized state of a store, wrapped in a small envelope
/// carrying a format marker and version. Writes go to `<file>.tmp`, are synced, and
/// then renamed over the previous snapshot, so a crash mid-write leaves the prior
/// snapshot intact.

use crate::error::StorageError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Current on-disk envelope version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    format: &'a str,
    version: u32,
    saved_at: DateTime<Utc>,
    records: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    format: String,
    version: u32,
}

#[derive(Deserialize)]
struct EnvelopeIn<T> {
    records: T,
}

/// A single snapshot file owned by one store instance
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    format: &'static str,
}

impl SnapshotFile {
    /// `format` is the marker written into every envelope and required on load
    pub fn new(path: impl Into<PathBuf>, format: &'static str) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &'static str {
        self.format
    }

    /// Path of the staging file used during writes
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read and decode the snapshot
    ///
    /// Returns `Ok(None)` when the file has never been written. A file that exists
    /// but cannot be decoded is an error, never an empty store.
    pub fn read<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let header: EnvelopeHeader =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if header.format != self.format || header.version != SNAPSHOT_VERSION {
            return Err(StorageError::Incompatible {
                path: self.path.clone(),
                found: format!("{} v{}", header.format, header.version),
                expected: format!("{} v{}", self.format, SNAPSHOT_VERSION),
            });
        }

        let envelope: EnvelopeIn<T> =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        Ok(Some(envelope.records))
    }

    /// Atomically replace the snapshot with `records`
    pub fn write<T: Serialize>(&self, records: &T) -> Result<(), StorageError> {
        let envelope = EnvelopeOut {
            format: self.format,
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            records,
        };
        let bytes =
            serde_json::to_vec_pretty(&envelope).map_err(|source| StorageError::Encode {
                path: self.path.clone(),
                source,
            })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
        }

        let temp = self.temp_path();
        let staged = write_synced(&temp, &bytes).and_then(|()| {
            fs::rename(&temp, &self.path).map_err(|e| StorageError::io(&self.path, e))
        });

        if let Err(e) = staged {
            // Previous snapshot is untouched; drop the partial staging file
            let _ = fs::remove_file(&temp);
            return Err(e);
        }

        tracing::debug!("💾 Wrote snapshot {} ({} bytes)", self.path.display(), bytes.len());
        Ok(())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    file.write_all(bytes).map_err(|e| StorageError::io(path, e))?;
    file.sync_all().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Lazy, filtered iteration over an immutable map snapshot
///
/// Holds its own `Arc` to the snapshot, so concurrent writers never affect an
/// iteration in progress: it observes exactly the state at the time it was created.
pub struct SnapshotIter<V, F> {
    snapshot: Arc<IndexMap<String, Arc<V>>>,
    position: usize,
    filter: F,
}

impl<V, F> SnapshotIter<V, F>
where
    F: Fn(&V) -> bool,
{
    pub fn new(snapshot: Arc<IndexMap<String, Arc<V>>>, filter: F) -> Self {
        Self {
            snapshot,
            position: 0,
            filter,
        }
    }
}

impl<V, F> Iterator for SnapshotIter<V, F>
where
    V: Clone,
    F: Fn(&V) -> bool,
{
    type Item = V;

    fn next(&mut self) -> Option<V> {
        while let Some((_, record)) = self.snapshot.get_index(self.position) {
            self.position += 1;
            if (self.filter)(record) {
                return Some(V::clone(record));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const FORMAT: &str = "agency.test";

    #[test]
    fn missing_file_reads_as_never_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("absent.json"), FORMAT);
        let loaded: Option<Vec<String>> = file.read().unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn write_then_read_returns_records_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("nested/state.json"), FORMAT);
        file.write(&vec!["a".to_string(), "b".to_string()]).unwrap();

        let loaded: Vec<String> = file.read().unwrap().unwrap();
        assert_eq!(loaded, vec!["a", "b"]);
        assert!(!file.temp_path().exists());
    }

    #[test]
    fn garbage_file_is_corrupt_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{\"format\": \"agency.te").unwrap();
        let file = SnapshotFile::new(&path, FORMAT);
        assert_matches!(file.read::<Vec<String>>(), Err(StorageError::Corrupt { .. }));
    }

    #[test]
    fn foreign_marker_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        SnapshotFile::new(&path, "agency.other").write(&Vec::<String>::new()).unwrap();
        let file = SnapshotFile::new(&path, FORMAT);
        assert_matches!(file.read::<Vec<String>>(), Err(StorageError::Incompatible { .. }));
    }

    #[test]
    fn future_version_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, br#"{"format":"agency.test","version":99,"records":[]}"#).unwrap();
        let file = SnapshotFile::new(&path, FORMAT);
        assert_matches!(file.read::<Vec<String>>(), Err(StorageError::Incompatible { .. }));
    }

    #[test]
    fn iterator_yields_only_matching_records_in_order() {
        let mut map = IndexMap::new();
        for n in 0..5u32 {
            map.insert(n.to_string(), Arc::new(n));
        }
        let shared = Arc::new(map);
        let evens: Vec<u32> = SnapshotIter::new(Arc::clone(&shared), |n: &u32| n % 2 == 0).collect();
        assert_eq!(evens, vec![0, 2, 4]);
    }
}
