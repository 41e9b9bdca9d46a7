//! The bucket engine.
//!
//! A [`Timeline`] accumulates `(time, count)` points into fixed-width
//! buckets and keeps every bucket's prefix sums (`integral`, the running
//! sum of values, and `second_integral`, the running sum of squares) valid
//! after every mutation. Range aggregates over any window then come from
//! two cumulative samples in O(1): `sum = B.integral - A.integral`,
//! `mean = sum / n`, `variance = second_sum / n - mean²`.
//!
//! Out-of-order arrivals are accepted only within a bounded recent suffix
//! ([`ADD_BUCKET_BACK_LIMIT`] buckets); anything older is rejected so the
//! forward re-propagation per insert stays bounded.
//!
//! On disk a timeline is two files in its series directory: `_.d`, a packed
//! array of 24-byte buckets (three `u64` LE), and `_.i`, the sparse index.

use crate::error::StorageError;
use crate::storage::index::{Anchor, PosResult, SparseIndex};
use crate::storage::vector::{AppendVector, Record};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// How many buckets back from the end a put may still update.
///
/// Updating an existing bucket rewrites the cumulative fields of every
/// bucket after it, so this cap keeps insert latency predictable while
/// leaving slow writers a window to catch up.
pub const ADD_BUCKET_BACK_LIMIT: usize = 60;

/// One fixed-width time interval of accumulated counts.
///
/// `value` is the raw count that landed in this bucket; `integral` and
/// `second_integral` are cumulative from bucket 0 through this bucket
/// inclusive. Cumulative sums wrap modulo 2^64; window differences stay
/// exact as long as the true window sum fits in a `u64`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// Count accumulated into this bucket
    pub value: u64,
    /// Running sum of values through this bucket
    pub integral: u64,
    /// Running sum of squared values through this bucket
    pub second_integral: u64,
}

impl Record for Bucket {
    const WIDTH: usize = 24;

    fn decode(buf: &[u8]) -> Self {
        Bucket {
            value: u64::from_le_bytes(buf[0..8].try_into().expect("bucket value slice")),
            integral: u64::from_le_bytes(buf[8..16].try_into().expect("bucket integral slice")),
            second_integral: u64::from_le_bytes(
                buf[16..24].try_into().expect("bucket second_integral slice"),
            ),
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.value.to_le_bytes());
        buf[8..16].copy_from_slice(&self.integral.to_le_bytes());
        buf[16..24].copy_from_slice(&self.second_integral.to_le_bytes());
    }
}

/// Rewrite `current`'s cumulative fields from its predecessor.
///
/// `current.value` is assumed to already hold the bucket's count.
#[inline]
pub fn propagate(prev: Bucket, current: &mut Bucket) {
    let v = current.value;
    current.integral = prev.integral.wrapping_add(v);
    current.second_integral = prev.second_integral.wrapping_add(v.wrapping_mul(v));
}

/// Result of [`Timeline::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GetResult {
    /// Anchor cursor for reuse as a hint on the next lookup
    pub index_offset: usize,
    /// The raw query time
    pub query_time: u64,
    /// The selected anchor's time
    pub range_time: u64,
    /// The selected anchor's data position
    pub pos: usize,
    /// Bucket offset from `pos`, clamped to the data
    pub offset: usize,
    /// The located bucket (all zeros before the beginning of the series)
    pub value: Bucket,
}

/// Result of [`Timeline::diff`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiffResult {
    /// Window start (normalized, clamped)
    pub from: u64,
    /// Window end (normalized, clamped)
    pub to: u64,
    /// Bucket width
    pub resolution: u64,
    /// Anchor cursor for reuse as a hint on the next lookup
    pub index_offset: usize,
    /// Sum of values in the window
    pub sum: u64,
    /// Mean value per bucket
    pub mean: f64,
    /// Population variance per bucket
    pub variance: f64,
    /// Number of buckets in the window
    pub n: u64,
    /// Cumulative sample at the window start
    pub left: Bucket,
    /// Cumulative sample at the window end
    pub right: Bucket,
}

impl DiffResult {
    fn zero(from: u64, to: u64, resolution: u64, left: Bucket, right: Bucket) -> Self {
        DiffResult {
            from,
            to,
            resolution,
            index_offset: 0,
            sum: 0,
            mean: 0.0,
            variance: 0.0,
            n: 0,
            left,
            right,
        }
    }
}

/// Result of [`Timeline::summary`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryResult {
    /// Time of the first bucket
    pub from: u64,
    /// Time just past the last bucket
    pub to: u64,
    /// Bucket width
    pub resolution: u64,
    /// Total sum of all values
    pub sum: u64,
    /// Mean value per bucket
    pub mean: f64,
    /// Population variance per bucket
    pub variance: f64,
    /// Number of buckets from first to last, gaps included
    pub n: u64,
}

/// Derive the aggregate for a window from its two cumulative samples.
///
/// Mean is `sum(x) / n`. Variance needs the running sum of squares as well:
/// `variance = sum(x²) / n - mean²`, clamped to zero against floating-point
/// cancellation on near-uniform data.
pub fn diff_buckets(
    from: u64,
    to: u64,
    resolution: u64,
    index_offset: usize,
    left: Bucket,
    right: Bucket,
    n: u64,
) -> DiffResult {
    assert!(resolution > 0, "resolution must be positive");
    assert!(n > 0, "diff_buckets needs a non-empty window");

    let sum = right.integral.wrapping_sub(left.integral);
    let second_sum = right.second_integral.wrapping_sub(left.second_integral);
    let mean = sum as f64 / n as f64;
    let second_mean = second_sum as f64 / n as f64;
    let variance = (second_mean - mean * mean).max(0.0);

    DiffResult {
        from,
        to,
        resolution,
        index_offset,
        sum,
        mean,
        variance,
        n,
        left,
        right,
    }
}

fn clamp(p: &mut PosResult, size: usize) {
    assert!(p.pos < size, "anchor position {} outside data (len {})", p.pos, size);
    if p.pos + p.offset >= size {
        p.offset = size - p.pos - 1;
    }
}

/// A single series: one data vector of cumulative buckets plus its sparse
/// index. Single-writer, single-reader; not thread-safe by design — the
/// store above serializes access per series.
#[derive(Debug)]
pub struct Timeline {
    data: AppendVector<Bucket>,
    index: SparseIndex,
}

impl Timeline {
    /// Open or create the series stored in directory `path`.
    ///
    /// The directory is created if absent. The index lives in `_.i` (new
    /// files are stamped with `resolution`, existing files must match) and
    /// the buckets in `_.d`.
    pub fn from_directory(path: impl AsRef<Path>, resolution: u64) -> Result<Self, StorageError> {
        assert!(resolution > 0, "resolution must be positive");
        let path = path.as_ref();

        if path.exists() && !path.is_dir() {
            return Err(StorageError::NotADirectory(path.to_path_buf()));
        }
        fs::create_dir_all(path)?;

        let index = SparseIndex::open(path.join("_.i"), resolution)?;
        let data: AppendVector<Bucket> = AppendVector::open(path.join("_.d"), 0)?;

        if index.is_empty() != data.is_empty() {
            return Err(StorageError::Corrupted(format!(
                "{}: index has {} anchors but data has {} buckets",
                path.display(),
                index.len(),
                data.len()
            )));
        }

        Ok(Timeline { data, index })
    }

    /// Bucket width in time units.
    #[inline]
    pub fn resolution(&self) -> u64 {
        self.index.resolution()
    }

    /// Number of buckets.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the timeline holds no buckets.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of index anchors.
    #[inline]
    pub fn anchor_count(&self) -> usize {
        self.index.len()
    }

    /// Accumulate `c` into the bucket containing time `t`.
    ///
    /// Returns `Ok(false)` when the point is rejected: `t` precedes the
    /// last indexed gap, or the target bucket is more than
    /// [`ADD_BUCKET_BACK_LIMIT`] buckets behind the end. A rejected put
    /// leaves the timeline untouched.
    pub fn put(&mut self, t: u64, c: u64) -> Result<bool, StorageError> {
        if self.index.is_empty() {
            debug_assert!(self.data.is_empty());
            self.data.push(&Bucket {
                value: c,
                integral: c,
                second_integral: c.wrapping_mul(c),
            })?;
            self.index.push(Anchor { time: t, pos: 0 })?;
            return Ok(true);
        }

        let last = self.index.len() - 1;
        // Arrivals older than the last indexed gap would require rewriting
        // anchors; not supported.
        if t < self.index.back().time {
            return Ok(false);
        }

        let p = self.index.find_pos_from_range(t, last, self.index.len());
        let target = p.pos + p.offset;

        if target < self.data.len() {
            if self.data.len() - target >= ADD_BUCKET_BACK_LIMIT {
                return Ok(false);
            }
            let prev = if target > 0 { self.data.get(target - 1) } else { Bucket::default() };
            let mut current = self.data.get(target);
            current.value = current.value.wrapping_add(c);
            propagate(prev, &mut current);
            self.data.set(target, &current);
            // Only the cumulative fields of the suffix change.
            for i in target + 1..self.data.len() {
                let prev = self.data.get(i - 1);
                let mut bucket = self.data.get(i);
                propagate(prev, &mut bucket);
                self.data.set(i, &bucket);
            }
            return Ok(true);
        }

        // Beyond the end: append exactly one bucket, then index the gap if
        // the position jumped past the contiguous successor.
        let new_pos = self.data.len();
        let prev = self.data.back();
        let mut current = Bucket { value: c, ..Bucket::default() };
        propagate(prev, &mut current);
        self.data.push(&current)?;

        if target != new_pos {
            let aliased_time = p.time + (p.offset as u64) * self.resolution();
            debug_assert!(aliased_time <= t);
            self.index.push(Anchor { time: aliased_time, pos: new_pos as u64 })?;
        }
        Ok(true)
    }

    /// Read the bucket containing time `t`.
    ///
    /// `hint` is the anchor cursor from a previous result (`0` for a cold
    /// lookup). Times past the end clamp to the last bucket; times before
    /// the first anchor yield a zero bucket with `range_time` set to the
    /// first anchor's time.
    pub fn get(&self, t: u64, hint: usize) -> GetResult {
        if self.index.is_empty() {
            return GetResult {
                index_offset: 0,
                query_time: t,
                range_time: t,
                pos: 0,
                offset: 0,
                value: Bucket::default(),
            };
        }

        let mut p = self.index.find_pos(t, hint);
        clamp(&mut p, self.data.len());

        let before_beginning = t < p.time;
        let value = if before_beginning {
            Bucket::default()
        } else {
            self.data.get(p.pos + p.offset)
        };

        GetResult {
            index_offset: p.index_offset,
            query_time: t,
            range_time: p.time,
            pos: p.pos,
            offset: p.offset,
            value,
        }
    }

    /// Cumulative sample just before the bucket containing the queried
    /// time, so that a window difference counts the start bucket itself.
    /// The prefix position is recomputed unclamped and then bounded by the
    /// data length, which lets times past the end cover the whole tail.
    fn cumulative(&self, r: &GetResult) -> Bucket {
        if r.query_time < r.range_time {
            return Bucket::default();
        }
        let raw = ((r.query_time - r.range_time) / self.resolution()) as usize;
        let prefix = match self.index.run_len(r.index_offset) {
            Some(run) => r.pos + raw.min(run),
            None => r.pos + raw,
        };
        if prefix == 0 {
            Bucket::default()
        } else {
            self.data.get((prefix - 1).min(self.data.len() - 1))
        }
    }

    /// Aggregate the window `[a, b)`: sum, mean, and variance of bucket
    /// values, derived from two cumulative samples in constant time.
    ///
    /// `a` and `b` are normalized (swapped if reversed); `b` is clamped up
    /// to the start of the series when it precedes it. `n` counts buckets
    /// of the requested window, gaps included.
    pub fn diff(&self, a: u64, b: u64, hint: usize) -> DiffResult {
        let resolution = self.resolution();

        let (a, b) = if a > b { (b, a) } else { (a, b) };
        if self.data.is_empty() {
            return DiffResult::zero(a, b, resolution, Bucket::default(), Bucket::default());
        }

        let ar = self.get(a, hint);
        let br = self.get(b, hint);

        let b = br.query_time.max(br.range_time);
        let a = ar.query_time.min(b);

        let n = (b - a) / resolution;
        if n == 0 {
            return DiffResult::zero(a, b, resolution, ar.value, br.value);
        }

        debug_assert!(ar.index_offset <= br.index_offset);
        let left = self.cumulative(&ar);
        let right = self.cumulative(&br);
        diff_buckets(a, b, resolution, ar.index_offset, left, right, n)
    }

    /// Aggregate the whole series, from the first bucket's time to just
    /// past the last bucket.
    ///
    /// The left sample is the zero bucket, not `data[0]`: the summary
    /// measures total cumulative load from the beginning, first bucket
    /// included.
    pub fn summary(&self) -> SummaryResult {
        let resolution = self.resolution();
        if self.index.is_empty() {
            return SummaryResult {
                from: 0,
                to: 0,
                resolution,
                sum: 0,
                mean: 0.0,
                variance: 0.0,
                n: 0,
            };
        }
        debug_assert!(!self.data.is_empty());

        let front = self.index.front();
        let back = self.index.back();

        let from = front.time;
        let tail_buckets = (self.data.len() - back.pos as usize) as u64;
        let to = back.time + tail_buckets * resolution;
        debug_assert!(to > from);

        let n = (to - from) / resolution;
        let diff = diff_buckets(from, to, resolution, 0, Bucket::default(), self.data.back(), n);

        SummaryResult {
            from,
            to,
            resolution,
            sum: diff.sum,
            mean: diff.mean,
            variance: diff.variance,
            n,
        }
    }

    /// Sync both backing files to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.data.flush()?;
        self.index.flush()
    }

    #[cfg(test)]
    pub(crate) fn bucket(&self, i: usize) -> Bucket {
        self.data.get(i)
    }

    #[cfg(test)]
    pub(crate) fn anchor(&self, i: usize) -> Anchor {
        self.index.get(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(resolution: u64) -> (tempfile::TempDir, Timeline) {
        let dir = tempfile::tempdir().unwrap();
        let t = Timeline::from_directory(dir.path().join("series"), resolution).unwrap();
        (dir, t)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_first_put_creates_one_bucket_and_one_anchor() {
        let (_dir, mut tl) = timeline(10);
        assert!(tl.put(100, 5).unwrap());
        assert_eq!(tl.len(), 1);
        assert_eq!(tl.anchor_count(), 1);
        assert_eq!(tl.bucket(0), Bucket { value: 5, integral: 5, second_integral: 25 });
        assert_eq!(tl.anchor(0), Anchor { time: 100, pos: 0 });
    }

    #[test]
    fn test_single_bucket_summary() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        let s = tl.summary();
        assert_eq!((s.from, s.to, s.sum, s.n), (100, 110, 5, 1));
        assert_close(s.mean, 5.0);
        assert_close(s.variance, 0.0);
    }

    #[test]
    fn test_contiguous_extension_adds_no_anchor() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(110, 3).unwrap();
        tl.put(120, 2).unwrap();
        assert_eq!(tl.len(), 3);
        assert_eq!(tl.anchor_count(), 1);
        assert_eq!(tl.bucket(2), Bucket { value: 2, integral: 10, second_integral: 38 });
    }

    #[test]
    fn test_diff_over_dense_run() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(110, 3).unwrap();
        tl.put(120, 2).unwrap();

        let d = tl.diff(100, 130, 0);
        assert_eq!((d.sum, d.n), (10, 3));
        assert_close(d.mean, 10.0 / 3.0);
        assert_close(d.variance, 38.0 / 3.0 - (10.0f64 / 3.0).powi(2));

        // Interior window leaves the first bucket out.
        let d = tl.diff(110, 130, 0);
        assert_eq!((d.sum, d.n), (5, 2));
        assert_close(d.variance, 0.25);
    }

    #[test]
    fn test_gap_records_anchor_and_diff_spans_it() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(200, 7).unwrap();

        assert_eq!(tl.len(), 2);
        assert_eq!(tl.anchor_count(), 2);
        assert_eq!(tl.anchor(0), Anchor { time: 100, pos: 0 });
        assert_eq!(tl.anchor(1), Anchor { time: 200, pos: 1 });

        let d = tl.diff(100, 210, 0);
        assert_eq!((d.sum, d.n), (12, 11));
        assert_close(d.mean, 12.0 / 11.0);
        assert_close(d.variance, 74.0 / 11.0 - (12.0f64 / 11.0).powi(2));
    }

    #[test]
    fn test_gap_append_uses_aliased_anchor_time() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        // 207 lands in the bucket starting at 200.
        tl.put(207, 7).unwrap();
        assert_eq!(tl.anchor(1), Anchor { time: 200, pos: 1 });
    }

    #[test]
    fn test_backfill_updates_and_repropagates() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(110, 3).unwrap();
        assert!(tl.put(100, 2).unwrap());

        assert_eq!(tl.bucket(0), Bucket { value: 7, integral: 7, second_integral: 49 });
        assert_eq!(tl.bucket(1), Bucket { value: 3, integral: 10, second_integral: 58 });
        assert_eq!(tl.diff(100, 120, 0).sum, 10);
    }

    #[test]
    fn test_put_at_last_anchor_time_targets_anchor_bucket() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(200, 7).unwrap();
        assert!(tl.put(200, 1).unwrap());
        assert_eq!(tl.bucket(1).value, 8);
    }

    #[test]
    fn test_put_before_last_anchor_rejected() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(200, 7).unwrap();
        assert!(!tl.put(199, 1).unwrap());
        assert!(!tl.put(100, 1).unwrap());
        assert_eq!(tl.bucket(0).value, 5);
    }

    #[test]
    fn test_backfill_window_boundary() {
        let (_dir, mut tl) = timeline(10);
        for i in 0..100u64 {
            assert!(tl.put(i * 10, 1).unwrap());
        }
        // 100 buckets back is past the window; 59 back is inside it.
        assert!(!tl.put(0, 1).unwrap());
        assert!(!tl.put((100 - 60) * 10, 1).unwrap());
        assert!(tl.put((100 - 59) * 10, 1).unwrap());
        assert_eq!(tl.bucket(41).value, 2);
        assert_eq!(tl.bucket(99).integral, 101);
    }

    #[test]
    fn test_reject_leaves_buckets_unchanged() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(200, 7).unwrap();
        let before: Vec<Bucket> = (0..tl.len()).map(|i| tl.bucket(i)).collect();

        assert!(!tl.put(50, 9).unwrap());
        let after: Vec<Bucket> = (0..tl.len()).map(|i| tl.bucket(i)).collect();
        assert_eq!(before, after);
        assert_eq!(tl.anchor_count(), 2);
    }

    #[test]
    fn test_get_before_beginning_is_zero() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        let r = tl.get(40, 0);
        assert_eq!(r.value, Bucket::default());
        assert_eq!(r.range_time, 100);
    }

    #[test]
    fn test_get_clamps_past_end() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(110, 3).unwrap();
        let r = tl.get(10_000, 0);
        assert_eq!(r.pos + r.offset, 1);
        assert_eq!(r.value.value, 3);
    }

    #[test]
    fn test_get_on_empty_timeline() {
        let (_dir, tl) = timeline(10);
        let r = tl.get(123, 0);
        assert_eq!(r.value, Bucket::default());
        assert_eq!(r.query_time, 123);
    }

    #[test]
    fn test_diff_is_symmetric() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(110, 3).unwrap();
        assert_eq!(tl.diff(100, 120, 0), tl.diff(120, 100, 0));
    }

    #[test]
    fn test_diff_empty_window() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        let d = tl.diff(103, 105, 0);
        assert_eq!((d.sum, d.n), (0, 0));
        assert_eq!(d.left.value, 5);
    }

    #[test]
    fn test_diff_entirely_before_beginning() {
        let (_dir, mut tl) = timeline(10);
        tl.put(1000, 5).unwrap();
        let d = tl.diff(0, 50, 0);
        assert_eq!(d.sum, 0);
        // End clamps up to the start of the series.
        assert_eq!(d.to, 1000);
    }

    #[test]
    fn test_put_then_immediate_diff_sees_the_count() {
        let (_dir, mut tl) = timeline(10);
        tl.put(500, 4).unwrap();
        tl.put(570, 9).unwrap();
        assert_eq!(tl.diff(570, 580, 0).sum, 9);
    }

    #[test]
    fn test_summary_empty() {
        let (_dir, tl) = timeline(10);
        let s = tl.summary();
        assert_eq!((s.from, s.to, s.sum, s.n), (0, 0, 0, 0));
        assert_eq!(s.resolution, 10);
    }

    #[test]
    fn test_summary_counts_first_bucket() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(200, 7).unwrap();
        let s = tl.summary();
        assert_eq!((s.from, s.to, s.sum, s.n), (100, 210, 12, 11));
    }

    #[test]
    fn test_hint_matches_cold_lookup() {
        let (_dir, mut tl) = timeline(10);
        tl.put(100, 5).unwrap();
        tl.put(500, 3).unwrap();
        tl.put(900, 2).unwrap();

        let mut hint = 0;
        for t in [100, 250, 500, 510, 900, 950] {
            let warm = tl.get(t, hint);
            let cold = tl.get(t, 0);
            assert_eq!(warm, cold, "t={}", t);
            hint = warm.index_offset;
        }
    }

    #[test]
    fn test_reopen_preserves_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series");
        {
            let mut tl = Timeline::from_directory(&path, 10).unwrap();
            tl.put(100, 5).unwrap();
            tl.put(200, 7).unwrap();
            tl.flush().unwrap();
        }
        let tl = Timeline::from_directory(&path, 10).unwrap();
        assert_eq!(tl.len(), 2);
        assert_eq!(tl.summary().sum, 12);
        assert!(matches!(
            Timeline::from_directory(&path, 60),
            Err(StorageError::ResolutionMismatch { .. })
        ));
    }

    #[test]
    fn test_from_directory_rejects_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_dir");
        std::fs::write(&path, b"x").unwrap();
        assert!(matches!(
            Timeline::from_directory(&path, 10),
            Err(StorageError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_variance_never_negative() {
        let (_dir, mut tl) = timeline(10);
        for i in 0..50u64 {
            tl.put(i * 10, 3).unwrap();
        }
        let d = tl.diff(0, 500, 0);
        assert!(d.variance >= 0.0);
        assert_close(d.mean, 3.0);
    }
}
