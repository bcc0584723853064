//! Persistence - best-effort snapshots of a collection for offline-first seeding.
//!
//! Snapshots are the `{ids, entities}` form of a collection, serialized as
//! JSON under a fixed key. Writes happen after every change, are
//! debounced and de-duplicated, and never fail the caller: a storage error is
//! logged and the in-memory state stays authoritative.

use std::collections::HashMap;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::collection::{CollectionSnapshot, EntityCollection};
use crate::error::{StoreError, SyncError};
use crate::record::{Record, SyncStatus};
use crate::store::EntityStore;

/// Key-value byte storage for snapshots.
pub trait SnapshotStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

/// HashMap-backed storage. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    storage: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.storage.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStorage for InMemoryStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| StoreError::LockPoisoned("snapshot read"))?;
        Ok(storage.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::LockPoisoned("snapshot write"))?;
        storage.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::LockPoisoned("snapshot write"))?;
        Ok(storage.remove(key).is_some())
    }
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        let safe_key = key.replace(['/', '\\', ':'], "_");
        self.dir.join(format!("{}.json", safe_key))
    }
}

impl SnapshotStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.key_to_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.key_to_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.key_to_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Debounced snapshot writer for one collection.
///
/// A snapshot arriving inside the debounce window is held back and written
/// when the window ends, by a short-lived timer thread. Dropping the
/// persister writes whatever is still held back.
pub struct Persister<R> {
    writer: Arc<Writer>,
    debounce: Duration,
    _marker: PhantomData<fn() -> R>,
}

struct Writer {
    storage: Arc<dyn SnapshotStorage>,
    key: String,
    state: Mutex<WriteState>,
}

#[derive(Default)]
struct WriteState {
    last_written: Option<Vec<u8>>,
    last_write_at: Option<Instant>,
    pending: Option<Vec<u8>>,
    timer_armed: bool,
}

impl Writer {
    fn state(&self) -> Option<MutexGuard<'_, WriteState>> {
        match self.state.lock() {
            Ok(state) => Some(state),
            Err(_) => {
                warn!("{}: {}", self.key, StoreError::LockPoisoned("snapshot writer"));
                None
            }
        }
    }

    fn flush(&self) {
        if let Some(mut state) = self.state() {
            self.flush_locked(&mut state);
        }
    }

    /// Called by the timer once the window has passed.
    fn fire(&self) {
        if let Some(mut state) = self.state() {
            state.timer_armed = false;
            self.flush_locked(&mut state);
        }
    }

    fn flush_locked(&self, state: &mut WriteState) {
        if let Some(bytes) = state.pending.take() {
            if state.last_written.as_deref() != Some(bytes.as_slice()) {
                self.write(state, bytes);
            }
        }
    }

    fn write(&self, state: &mut WriteState, bytes: Vec<u8>) {
        match self.storage.write(&self.key, &bytes) {
            Ok(()) => {
                state.pending = None;
                state.last_written = Some(bytes);
                state.last_write_at = Some(Instant::now());
            }
            Err(err) => warn!("{}: snapshot write failed: {}", self.key, err),
        }
    }
}

impl<R> Persister<R> {
    pub fn key(&self) -> &str {
        &self.writer.key
    }

    /// True if a snapshot is waiting out the debounce window.
    pub fn has_pending(&self) -> bool {
        self.writer
            .state()
            .map(|state| state.pending.is_some())
            .unwrap_or(false)
    }

    /// Write any snapshot held back by the debounce window.
    pub fn flush(&mut self) {
        self.writer.flush();
    }

    /// Drop the stored snapshot.
    pub fn purge(&mut self) {
        if let Some(mut state) = self.writer.state() {
            state.pending = None;
            state.last_written = None;
        }
        if let Err(err) = self.writer.storage.remove(&self.writer.key) {
            warn!("{}: snapshot removal failed: {}", self.writer.key, err);
        }
    }

    fn schedule(&self, wait: Duration) {
        let writer = Arc::clone(&self.writer);
        let spawned = thread::Builder::new()
            .name(format!("snapshot-{}", self.writer.key))
            .spawn(move || {
                thread::sleep(wait);
                writer.fire();
            });
        if let Err(err) = spawned {
            warn!("{}: could not schedule snapshot write: {}", self.writer.key, err);
            if let Some(mut state) = self.writer.state() {
                state.timer_armed = false;
            }
        }
    }
}

impl<R> Drop for Persister<R> {
    fn drop(&mut self) {
        self.writer.flush();
    }
}

impl<R: Record> Persister<R> {
    pub fn new(storage: Arc<dyn SnapshotStorage>, key: impl Into<String>, debounce: Duration) -> Self {
        Self {
            writer: Arc::new(Writer {
                storage,
                key: key.into(),
                state: Mutex::new(WriteState::default()),
            }),
            debounce,
            _marker: PhantomData,
        }
    }

    /// Queue the collection's current state for writing.
    pub fn save(&mut self, collection: &EntityCollection<R>) {
        let bytes = match serde_json::to_vec(&collection.snapshot()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("{}: snapshot not serializable: {}", self.key(), err);
                return;
            }
        };

        let Some(mut state) = self.writer.state() else {
            return;
        };
        if state.last_written.as_deref() == Some(bytes.as_slice()) {
            state.pending = None;
            return;
        }

        let wait = state
            .last_write_at
            .map(|at| self.debounce.saturating_sub(at.elapsed()))
            .unwrap_or(Duration::ZERO);
        if wait.is_zero() {
            self.writer.write(&mut state, bytes);
            return;
        }

        state.pending = Some(bytes);
        if !state.timer_armed {
            state.timer_armed = true;
            drop(state);
            self.schedule(wait);
        }
    }

    /// Read the stored snapshot, if any.
    pub fn load(&self) -> Result<Option<EntityCollection<R>>, StoreError> {
        let Some(bytes) = self.writer.storage.read(self.key())? else {
            return Ok(None);
        };
        let snapshot: CollectionSnapshot<R> = serde_json::from_slice(&bytes)?;
        Ok(Some(EntityCollection::from_snapshot(snapshot)))
    }

    /// Seed a store from storage before any server sync.
    ///
    /// Records that were still pending when the snapshot was taken can never
    /// be confirmed, so they come back tagged as errors for the user to retry.
    pub fn seed(&mut self, store: &mut EntityStore<R>) -> bool {
        match self.load() {
            Ok(Some(mut collection)) => {
                let interrupted: Vec<String> = collection
                    .iter()
                    .filter(|entry| entry.status == SyncStatus::Pending)
                    .map(|entry| entry.id().to_string())
                    .collect();
                for id in &interrupted {
                    collection.update(id, |entry| {
                        entry.status = SyncStatus::Error;
                        entry.error = Some(SyncError::network(
                            "interrupted before server confirmation",
                        ));
                    });
                }
                debug!(
                    "{}: seeded {} records ({} interrupted)",
                    self.key(),
                    collection.len(),
                    interrupted.len()
                );
                store.restore(collection);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!("{}: ignoring unreadable snapshot: {}", self.key(), err);
                false
            }
        }
    }
}
