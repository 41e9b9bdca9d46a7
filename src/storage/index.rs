//! Sparse time index.
//!
//! The index maps wall-clock time to bucket positions in the data vector.
//! It stores an [`Anchor`] only where a temporal gap collapsed: between two
//! consecutive anchors the timeline is dense in bucket space, so the bucket
//! for a time inside a run is the anchor position plus
//! `(t - anchor.time) / resolution`.
//!
//! # File format
//!
//! A 16-byte header — magic `"pchi"`, format version (`u32` LE), resolution
//! (`u64` LE) — followed by a packed array of `{time: u64 LE, pos: u64 LE}`
//! records. The persisted resolution is authoritative: reopening with a
//! different one is an error.

use crate::error::StorageError;
use crate::storage::vector::{AppendVector, Record};
use std::path::Path;

/// Magic bytes at the start of every index file.
pub const INDEX_MAGIC: [u8; 4] = *b"pchi";

/// Current index file format version.
pub const INDEX_VERSION: u32 = 1;

const INDEX_HEADER_LEN: usize = 16;

/// An index entry: the quantized time of a bucket and its position in the
/// data vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// Bucket start time, a multiple of the resolution
    pub time: u64,
    /// Position of that bucket in the data vector
    pub pos: u64,
}

impl Record for Anchor {
    const WIDTH: usize = 16;

    fn decode(buf: &[u8]) -> Self {
        Anchor {
            time: u64::from_le_bytes(buf[0..8].try_into().expect("anchor time slice")),
            pos: u64::from_le_bytes(buf[8..16].try_into().expect("anchor pos slice")),
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.time.to_le_bytes());
        buf[8..16].copy_from_slice(&self.pos.to_le_bytes());
    }
}

/// Result of a time lookup.
///
/// `pos + offset` is the bucket the query time lands in (before any
/// clamping against the data length, which is the timeline's business).
/// `index_offset` is the selected anchor; callers keep it as a cursor hint
/// so monotone scans skip the binary search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosResult {
    /// Index of the selected anchor
    pub index_offset: usize,
    /// The anchor's stored time
    pub time: u64,
    /// The anchor's stored data position
    pub pos: usize,
    /// Bucket count to add to `pos` to reach the query time
    pub offset: usize,
}

/// The sparse anchor sequence backing one timeline.
#[derive(Debug)]
pub struct SparseIndex {
    anchors: AppendVector<Anchor>,
    resolution: u64,
}

impl SparseIndex {
    /// Open or create the index file at `path`.
    ///
    /// A new file is stamped with `resolution`; an existing file must carry
    /// the same one.
    pub fn open(path: impl AsRef<Path>, resolution: u64) -> Result<Self, StorageError> {
        assert!(resolution > 0, "resolution must be positive");

        let mut anchors: AppendVector<Anchor> = AppendVector::open(&path, INDEX_HEADER_LEN)?;
        if anchors.created() {
            let header = anchors.header_mut();
            header[0..4].copy_from_slice(&INDEX_MAGIC);
            header[4..8].copy_from_slice(&INDEX_VERSION.to_le_bytes());
            header[8..16].copy_from_slice(&resolution.to_le_bytes());
            anchors.flush()?;
            return Ok(Self { anchors, resolution });
        }

        let header = anchors.header();
        if header[0..4] != INDEX_MAGIC {
            return Err(StorageError::BadMagic(anchors.path().to_path_buf()));
        }
        let version = u32::from_le_bytes(header[4..8].try_into().expect("version slice"));
        if version != INDEX_VERSION {
            return Err(StorageError::UnsupportedVersion(version));
        }
        let persisted = u64::from_le_bytes(header[8..16].try_into().expect("resolution slice"));
        if persisted != resolution {
            return Err(StorageError::ResolutionMismatch { persisted, requested: resolution });
        }
        Ok(Self { anchors, resolution: persisted })
    }

    /// Bucket width in time units.
    #[inline]
    pub fn resolution(&self) -> u64 {
        self.resolution
    }

    /// Number of anchors.
    #[inline]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Check if the index holds no anchors.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Read the anchor at `i`.
    #[inline]
    pub fn get(&self, i: usize) -> Anchor {
        self.anchors.get(i)
    }

    /// First anchor. The index must be non-empty.
    pub fn front(&self) -> Anchor {
        self.anchors.front()
    }

    /// Last anchor. The index must be non-empty.
    pub fn back(&self) -> Anchor {
        self.anchors.back()
    }

    /// Append an anchor. Anchors are strictly increasing in both time and
    /// position; violating that is a programming error.
    pub fn push(&mut self, anchor: Anchor) -> Result<(), StorageError> {
        if !self.anchors.is_empty() {
            let last = self.anchors.back();
            assert!(
                anchor.time > last.time && anchor.pos > last.pos,
                "anchor {{{}, {}}} does not advance past {{{}, {}}}",
                anchor.time,
                anchor.pos,
                last.time,
                last.pos
            );
        }
        self.anchors.push(&anchor)
    }

    /// Length of the dense bucket run following anchor `i`, or `None` for
    /// the last anchor (its run is open-ended, bounded only by the data).
    pub fn run_len(&self, i: usize) -> Option<usize> {
        assert!(i < self.len(), "anchor index {} out of bounds", i);
        if i + 1 < self.len() {
            Some((self.get(i + 1).pos - self.get(i).pos) as usize)
        } else {
            None
        }
    }

    /// Locate the largest anchor whose time is `<= t`.
    ///
    /// `hint` is the caller's cached cursor from a previous lookup; when the
    /// answer is the hint anchor or its successor this is O(1), otherwise it
    /// falls back to binary search. If `t` precedes the first anchor, the
    /// first anchor is returned with `offset = 0` and `result.time > t`
    /// signals the precedence.
    pub fn find_pos(&self, t: u64, hint: usize) -> PosResult {
        assert!(!self.is_empty(), "find_pos on empty index");
        let n = self.len();
        let hint = hint.min(n - 1);

        if self.covers(hint, t) {
            return self.resolve(hint, t);
        }
        if hint + 1 < n && self.covers(hint + 1, t) {
            return self.resolve(hint + 1, t);
        }
        self.search(t, 0, n)
    }

    /// Like [`SparseIndex::find_pos`], restricted to anchors `[lo, hi)`.
    pub fn find_pos_from_range(&self, t: u64, lo: usize, hi: usize) -> PosResult {
        assert!(lo < hi && hi <= self.len(), "invalid anchor range [{}, {})", lo, hi);
        self.search(t, lo, hi)
    }

    /// True when anchor `i` is the last anchor with time `<= t`.
    fn covers(&self, i: usize, t: u64) -> bool {
        self.get(i).time <= t && (i + 1 == self.len() || self.get(i + 1).time > t)
    }

    fn search(&self, t: u64, lo: usize, hi: usize) -> PosResult {
        // First anchor in [lo, hi) with time > t.
        let mut left = lo;
        let mut right = hi;
        while left < right {
            let mid = left + (right - left) / 2;
            if self.get(mid).time <= t {
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        let selected = if left == lo { lo } else { left - 1 };
        self.resolve(selected, t)
    }

    fn resolve(&self, i: usize, t: u64) -> PosResult {
        let anchor = self.get(i);
        if t < anchor.time {
            return PosResult {
                index_offset: i,
                time: anchor.time,
                pos: anchor.pos as usize,
                offset: 0,
            };
        }
        let mut offset = ((t - anchor.time) / self.resolution) as usize;
        if let Some(run) = self.run_len(i) {
            // Times inside a collapsed gap alias to the last bucket of the run.
            offset = offset.min(run - 1);
        }
        PosResult {
            index_offset: i,
            time: anchor.time,
            pos: anchor.pos as usize,
            offset,
        }
    }

    /// Sync anchors and header to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.anchors.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(anchors: &[(u64, u64)], resolution: u64) -> (tempfile::TempDir, SparseIndex) {
        let dir = tempfile::tempdir().unwrap();
        let mut index = SparseIndex::open(dir.path().join("_.i"), resolution).unwrap();
        for &(time, pos) in anchors {
            index.push(Anchor { time, pos }).unwrap();
        }
        (dir, index)
    }

    #[test]
    fn test_reopen_checks_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_.i");
        drop(SparseIndex::open(&path, 10).unwrap());

        assert!(SparseIndex::open(&path, 10).is_ok());
        let err = SparseIndex::open(&path, 60).unwrap_err();
        assert!(matches!(
            err,
            StorageError::ResolutionMismatch { persisted: 10, requested: 60 }
        ));
    }

    #[test]
    fn test_reopen_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_.i");
        std::fs::write(&path, [0u8; 16]).unwrap();
        assert!(matches!(
            SparseIndex::open(&path, 10),
            Err(StorageError::BadMagic(_))
        ));
    }

    #[test]
    fn test_find_pos_dense_run() {
        let (_dir, index) = index_with(&[(100, 0)], 10);

        let p = index.find_pos(100, 0);
        assert_eq!((p.index_offset, p.pos, p.offset), (0, 0, 0));

        let p = index.find_pos(137, 0);
        assert_eq!((p.pos, p.offset), (0, 3));
    }

    #[test]
    fn test_find_pos_before_first_anchor() {
        let (_dir, index) = index_with(&[(100, 0)], 10);
        let p = index.find_pos(40, 0);
        assert_eq!(p.offset, 0);
        assert_eq!(p.time, 100);
        assert!(p.time > 40);
    }

    #[test]
    fn test_find_pos_selects_across_gap() {
        // Run of 3 buckets at t=100, gap, run at t=500.
        let (_dir, index) = index_with(&[(100, 0), (500, 3)], 10);

        let p = index.find_pos(120, 0);
        assert_eq!((p.index_offset, p.pos, p.offset), (0, 0, 2));

        // Inside the collapsed gap: aliases to the end of the first run.
        let p = index.find_pos(300, 0);
        assert_eq!((p.index_offset, p.pos, p.offset), (0, 0, 2));

        let p = index.find_pos(515, 0);
        assert_eq!((p.index_offset, p.pos, p.offset), (1, 3, 1));
    }

    #[test]
    fn test_find_pos_hint_and_stale_hint_agree() {
        let (_dir, index) = index_with(&[(100, 0), (500, 3), (900, 7)], 10);
        for t in [100, 250, 499, 500, 890, 900, 1200] {
            let cold = index.find_pos(t, 0);
            for hint in 0..index.len() + 2 {
                assert_eq!(index.find_pos(t, hint), cold, "t={} hint={}", t, hint);
            }
        }
    }

    #[test]
    fn test_find_pos_from_range_restricts_search() {
        let (_dir, index) = index_with(&[(100, 0), (500, 3)], 10);
        // Restricted to the tail anchor, even though anchor 0 also matches.
        let p = index.find_pos_from_range(700, 1, 2);
        assert_eq!(p.index_offset, 1);
        assert_eq!(p.offset, 20);
    }

    #[test]
    fn test_run_len() {
        let (_dir, index) = index_with(&[(100, 0), (500, 3)], 10);
        assert_eq!(index.run_len(0), Some(3));
        assert_eq!(index.run_len(1), None);
    }

    #[test]
    #[should_panic(expected = "does not advance")]
    fn test_push_rejects_non_monotone_anchor() {
        let (_dir, mut index) = index_with(&[(100, 0), (500, 3)], 10);
        index.push(Anchor { time: 200, pos: 9 }).unwrap();
    }
}
