//! Persistent counter sinks.
//!
//! The durability pipeline applies rotated batches through the [`Storage`]
//! trait; the hydrate phase reads individual counters back through it.
//! Two implementations ship with the crate: a file-backed snapshot store
//! for single-node operation and an in-memory store for tests and
//! examples.

use crate::cache::Batch;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The persistent sink consumed by the durability pipeline.
///
/// `store` may fail; the pipeline retries the same batch every cycle until
/// it succeeds, so implementations must tolerate re-application of an
/// already stored batch (at-least-once).
pub trait Storage: Send + Sync {
    /// Applies one rotated batch to the sink.
    fn store(&self, batch: &Batch) -> Result<()>;

    /// Reads a counter's durable value, `None` if it was never stored.
    fn load(&self, name: &str) -> Result<Option<i64>>;
}

/// File-backed storage: the full counter map, rewritten atomically as a
/// bincode snapshot on every store.
///
/// The snapshot is written to a temporary file, synced, then renamed over
/// the previous one, so a crash mid-store leaves the old snapshot intact.
pub struct FileStorage {
    path: PathBuf,
    state: Mutex<HashMap<String, i64>>,
}

impl FileStorage {
    /// Opens or creates the snapshot file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let data = std::fs::read(&path)?;
            bincode::deserialize(&data)?
        } else {
            HashMap::new()
        };
        log::info!("FileStorage {:?}: {} counter(s) loaded", path, state.len());
        Ok(Self { path, state: Mutex::new(state) })
    }

    /// Number of counters in the snapshot.
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    /// Returns true if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for FileStorage {
    fn store(&self, batch: &Batch) -> Result<()> {
        let mut state = self.state.lock();
        for (name, &value) in batch {
            state.insert(name.clone(), value);
        }

        let encoded = bincode::serialize(&*state)?;
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&encoded)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        log::debug!("FileStorage: stored batch of {} counter(s)", batch.len());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.state.lock().get(name).copied())
    }
}

/// In-memory storage for tests and examples.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<HashMap<String, i64>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a counter value directly, bypassing the batch path.
    pub fn put(&self, name: impl Into<String>, value: i64) {
        self.state.lock().insert(name.into(), value);
    }

    /// Snapshot of the stored counters.
    pub fn snapshot(&self) -> HashMap<String, i64> {
        self.state.lock().clone()
    }
}

impl Storage for MemoryStorage {
    fn store(&self, batch: &Batch) -> Result<()> {
        let mut state = self.state.lock();
        for (name, &value) in batch {
            state.insert(name.clone(), value);
        }
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.state.lock().get(name).copied())
    }
}
