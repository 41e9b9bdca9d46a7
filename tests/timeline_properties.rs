//! Property-based tests for the bucket engine.
//!
//! These drive arbitrary put sequences — in-order, backfilled, and stale —
//! against a timeline and check the invariants that must survive any mix of
//! accepts and rejects.

use perch::storage::Timeline;
use proptest::prelude::*;

const RES: u64 = 10;

fn open_timeline(dir: &tempfile::TempDir) -> Timeline {
    Timeline::from_directory(dir.path().join("series"), RES).unwrap()
}

/// Arbitrary put streams: times scattered over a few hundred buckets so
/// runs, gaps, backfills, and stale rejects all occur.
fn arb_ops() -> impl Strategy<Value = Vec<(u64, u64)>> {
    prop::collection::vec((0u64..3000, 0u64..100), 1..100)
}

proptest! {
    /// Every accepted count lands in exactly one bucket, and the summary
    /// (a diff from the zero bucket to the end) counts all of them.
    #[test]
    fn prop_summary_counts_every_accepted_put(ops in arb_ops()) {
        let dir = tempfile::tempdir().unwrap();
        let mut tl = open_timeline(&dir);

        let mut accepted_total = 0u64;
        for &(t, c) in &ops {
            if tl.put(t, c).unwrap() {
                accepted_total += c;
            }
        }

        prop_assert!(!tl.is_empty());
        prop_assert_eq!(tl.summary().sum, accepted_total);
    }

    /// A diff over the summary's own window reproduces the summary.
    #[test]
    fn prop_full_range_diff_matches_summary(ops in arb_ops()) {
        let dir = tempfile::tempdir().unwrap();
        let mut tl = open_timeline(&dir);
        for &(t, c) in &ops {
            tl.put(t, c).unwrap();
        }

        let summary = tl.summary();
        let diff = tl.diff(summary.from, summary.to, 0);
        prop_assert_eq!(diff.sum, summary.sum);
        prop_assert_eq!(diff.n, summary.n);
        prop_assert_eq!(diff.mean, summary.mean);
        prop_assert_eq!(diff.variance, summary.variance);
    }

    /// Windows are additive: splitting [a, b) at any m changes nothing.
    #[test]
    fn prop_diff_is_additive(
        ops in arb_ops(),
        cuts in (0u64..4000, 0u64..4000, 0u64..4000),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut tl = open_timeline(&dir);
        for &(t, c) in &ops {
            tl.put(t, c).unwrap();
        }

        let mut cuts = [cuts.0, cuts.1, cuts.2];
        cuts.sort_unstable();
        let [a, m, b] = cuts;
        let whole = tl.diff(a, b, 0);
        let left = tl.diff(a, m, 0);
        let right = tl.diff(m, b, 0);
        prop_assert_eq!(left.sum + right.sum, whole.sum);
    }

    /// diff(a, b) equals diff(b, a).
    #[test]
    fn prop_diff_is_symmetric(ops in arb_ops(), a in 0u64..4000, b in 0u64..4000) {
        let dir = tempfile::tempdir().unwrap();
        let mut tl = open_timeline(&dir);
        for &(t, c) in &ops {
            tl.put(t, c).unwrap();
        }
        prop_assert_eq!(tl.diff(a, b, 0), tl.diff(b, a, 0));
    }

    /// An accepted put is visible to an immediate diff over its bucket.
    #[test]
    fn prop_accepted_put_visible_in_its_bucket(
        ops in arb_ops(),
        t in 0u64..4000,
        c in 1u64..100,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut tl = open_timeline(&dir);
        for &(t, c) in &ops {
            tl.put(t, c).unwrap();
        }

        if tl.put(t, c).unwrap() {
            prop_assert!(tl.diff(t, t + RES, 0).sum >= c);
        }
    }

    /// A rejected put leaves the observable state untouched.
    #[test]
    fn prop_rejected_put_changes_nothing(
        ops in arb_ops(),
        t in 0u64..4000,
        c in 1u64..100,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut tl = open_timeline(&dir);
        for &(t, c) in &ops {
            tl.put(t, c).unwrap();
        }

        let len = tl.len();
        let anchors = tl.anchor_count();
        let summary = tl.summary();

        if !tl.put(t, c).unwrap() {
            prop_assert_eq!(tl.len(), len);
            prop_assert_eq!(tl.anchor_count(), anchors);
            let after = tl.summary();
            prop_assert_eq!(after.sum, summary.sum);
            prop_assert_eq!(after.to, summary.to);
            prop_assert_eq!(after.variance, summary.variance);
        }
    }

    /// The cursor hint is an optimization, never an answer change.
    #[test]
    fn prop_hint_does_not_change_results(
        ops in arb_ops(),
        t in 0u64..4000,
        hint in 0usize..200,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut tl = open_timeline(&dir);
        for &(t, c) in &ops {
            tl.put(t, c).unwrap();
        }
        prop_assert_eq!(tl.get(t, hint), tl.get(t, 0));
        prop_assert_eq!(tl.diff(t, t + 500, hint), tl.diff(t, t + 500, 0));
    }

    /// Flush-and-reopen round-trips the whole series.
    #[test]
    fn prop_reopen_preserves_series(ops in arb_ops()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series");

        let before = {
            let mut tl = Timeline::from_directory(&path, RES).unwrap();
            for &(t, c) in &ops {
                tl.put(t, c).unwrap();
            }
            tl.flush().unwrap();
            (tl.len(), tl.anchor_count(), tl.summary())
        };

        let tl = Timeline::from_directory(&path, RES).unwrap();
        prop_assert_eq!(tl.len(), before.0);
        prop_assert_eq!(tl.anchor_count(), before.1);
        prop_assert_eq!(tl.summary(), before.2);
    }
}

mod store_properties {
    use super::*;
    use perch::storage::Database;

    proptest! {
        /// Interleaving puts across series never bleeds counts between them.
        #[test]
        fn prop_series_are_isolated(
            ops in prop::collection::vec((0u8..4, 0u64..3000, 0u64..100), 1..60),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let db = Database::open(dir.path().join("data"), RES).unwrap();

            let mut accepted = [0u64; 4];
            for &(series, t, c) in &ops {
                let key = format!("series:{}", series);
                if db.put(&key, t, c).unwrap() {
                    accepted[series as usize] += c;
                }
            }

            for (series, &total) in accepted.iter().enumerate() {
                let key = format!("series:{}", series);
                match db.summary(&key).unwrap() {
                    Some(summary) => prop_assert_eq!(summary.sum, total),
                    None => prop_assert_eq!(total, 0),
                }
            }
        }
    }
}
