//! Disk-backed series storage: append vectors, the sparse time index, the
//! bucket engine, and the sharded store that routes keys to series.

pub mod db;
pub mod index;
pub mod timeline;
pub mod vector;

pub use db::{Database, MAX_KEY_LENGTH, valid_key};
pub use index::{Anchor, PosResult, SparseIndex};
pub use timeline::{
    ADD_BUCKET_BACK_LIMIT, Bucket, DiffResult, GetResult, SummaryResult, Timeline, diff_buckets,
    propagate,
};
pub use vector::{AppendVector, Record};
