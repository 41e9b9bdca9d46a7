//! Sharded series store.
//!
//! Keys are distributed over a fixed set of shards by FNV-1a hash. Each
//! shard maps series keys to their [`Timeline`] behind a per-series mutex:
//! a timeline is single-writer by design, and the mutex serializes all
//! operations on one series while operations on different series proceed in
//! parallel. No operation ever holds more than one series lock.
//!
//! Puts open (and create) series on demand; queries never create anything
//! on disk — an unknown series is reported as `None`.

use crate::error::StorageError;
use crate::storage::timeline::{DiffResult, GetResult, SummaryResult, Timeline};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of shards. A power of 2 so the hash can be masked.
const NUM_SHARDS: usize = 64;
const SHARD_MASK: usize = NUM_SHARDS - 1;

/// Maximum series key length in bytes.
pub const MAX_KEY_LENGTH: usize = 128;

/// Check a series key: non-empty, at most [`MAX_KEY_LENGTH`] bytes, and
/// restricted to `[A-Za-z0-9:_.-]`. Keys name directories on disk, so
/// nothing that could traverse paths gets through.
pub fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'.' | b'-'))
        && key != "."
        && key != ".."
}

/// Compute the shard for a key using FNV-1a.
#[inline]
fn shard_index(key: &str) -> usize {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(key.as_bytes());
    hasher.finish() as usize & SHARD_MASK
}

/// One shard: the series it owns, plus an operation counter.
#[derive(Debug, Default)]
struct Shard {
    series: DashMap<String, Arc<Mutex<Timeline>>>,
    ops: AtomicU64,
}

/// The sharded store over all series under one data directory.
#[derive(Debug)]
pub struct Database {
    shards: Box<[Shard; NUM_SHARDS]>,
    root: PathBuf,
    resolution: u64,
}

impl Database {
    /// Open the store rooted at `root`, creating the directory if absent.
    /// All series share one bucket `resolution`.
    pub fn open(root: impl Into<PathBuf>, resolution: u64) -> Result<Self, StorageError> {
        assert!(resolution > 0, "resolution must be positive");
        let root = root.into();
        if root.exists() && !root.is_dir() {
            return Err(StorageError::NotADirectory(root));
        }
        fs::create_dir_all(&root)?;

        let shards: Vec<Shard> = (0..NUM_SHARDS).map(|_| Shard::default()).collect();
        let shards: Box<[Shard; NUM_SHARDS]> = shards
            .try_into()
            .unwrap_or_else(|_| unreachable!("vec built with exactly NUM_SHARDS shards"));

        Ok(Self { shards, root, resolution })
    }

    /// Bucket width shared by every series.
    #[inline]
    pub fn resolution(&self) -> u64 {
        self.resolution
    }

    /// Data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        &self.shards[shard_index(key)]
    }

    fn check_key(key: &str) -> Result<(), StorageError> {
        if valid_key(key) {
            Ok(())
        } else {
            Err(StorageError::InvalidKey(key.to_string()))
        }
    }

    /// Fetch the series for `key`, opening (and creating on disk) if needed.
    fn open_series(&self, key: &str) -> Result<Arc<Mutex<Timeline>>, StorageError> {
        Self::check_key(key)?;
        let shard = self.shard(key);
        shard.ops.fetch_add(1, Ordering::Relaxed);

        if let Some(series) = shard.series.get(key) {
            return Ok(series.clone());
        }
        match shard.series.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let timeline = Timeline::from_directory(self.root.join(key), self.resolution)?;
                let series = Arc::new(Mutex::new(timeline));
                entry.insert(series.clone());
                Ok(series)
            }
        }
    }

    /// Fetch the series for `key` without creating it. `None` when the
    /// series neither is loaded nor exists on disk.
    fn lookup_series(&self, key: &str) -> Result<Option<Arc<Mutex<Timeline>>>, StorageError> {
        Self::check_key(key)?;
        let shard = self.shard(key);
        shard.ops.fetch_add(1, Ordering::Relaxed);

        if let Some(series) = shard.series.get(key) {
            return Ok(Some(series.clone()));
        }
        if !self.root.join(key).is_dir() {
            return Ok(None);
        }
        match shard.series.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(Some(entry.get().clone())),
            Entry::Vacant(entry) => {
                let timeline = Timeline::from_directory(self.root.join(key), self.resolution)?;
                let series = Arc::new(Mutex::new(timeline));
                entry.insert(series.clone());
                Ok(Some(series))
            }
        }
    }

    /// Accumulate `c` into series `key` at time `t`. Creates the series on
    /// first contact. Returns the timeline's accept/reject decision.
    pub fn put(&self, key: &str, t: u64, c: u64) -> Result<bool, StorageError> {
        let series = self.open_series(key)?;
        let mut timeline = series.lock();
        timeline.put(t, c)
    }

    /// Read the bucket containing `t` in series `key`.
    pub fn get(&self, key: &str, t: u64, hint: usize) -> Result<Option<GetResult>, StorageError> {
        Ok(self.lookup_series(key)?.map(|series| series.lock().get(t, hint)))
    }

    /// Aggregate the window `[a, b)` of series `key`.
    pub fn diff(
        &self,
        key: &str,
        a: u64,
        b: u64,
        hint: usize,
    ) -> Result<Option<DiffResult>, StorageError> {
        Ok(self.lookup_series(key)?.map(|series| series.lock().diff(a, b, hint)))
    }

    /// Aggregate the whole of series `key`.
    pub fn summary(&self, key: &str) -> Result<Option<SummaryResult>, StorageError> {
        Ok(self.lookup_series(key)?.map(|series| series.lock().summary()))
    }

    /// Sync every open series to disk. The first failure is returned after
    /// the sweep completes.
    pub fn flush_all(&self) -> Result<(), StorageError> {
        let mut first_err = None;
        for shard in self.shards.iter() {
            for entry in shard.series.iter() {
                let timeline = entry.value().lock();
                if let Err(e) = timeline.flush() {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of series currently open.
    pub fn series_count(&self) -> usize {
        self.shards.iter().map(|s| s.series.len()).sum()
    }

    /// Total operations routed through the store.
    pub fn total_ops(&self) -> u64 {
        self.shards.iter().map(|s| s.ops.load(Ordering::Relaxed)).sum()
    }
}
