//! # Perch
//!
//! A fixed-resolution time-series store and daemon.
//!
//! Points arrive as `(key, count, time)` and are accumulated into
//! fixed-width buckets, one series per key. Every bucket carries running
//! sums of its series' values and squared values, so the count, mean, and
//! variance of any time window come from two samples in constant time. A
//! sparse index maps times to bucket positions and only grows when a
//! temporal gap is collapsed, keeping lookups at O(log gaps) — O(1) with a
//! warm cursor.
//!
//! The daemon front-end is line-based TCP: an ingest port consuming
//! `"<key> <count> <time>"` lines and a query port answering
//! `get`/`diff`/`summary` requests with JSON lines.
//!
//! ## Example
//!
//! ```no_run
//! use perch::{Config, Result, Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default();
//!     let server = Arc::new(Server::new(config)?);
//!     server.run().await
//! }
//! ```

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::all,
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_lifetimes,
    unused_qualifications
)]
#![allow(clippy::module_name_repetitions)]

// ─────────────────────────────────────────────────────────────────────────────
// Modules
// ─────────────────────────────────────────────────────────────────────────────

/// Error types and result alias.
pub mod error;
/// Line framing and request decoding.
pub mod protocol;
/// TCP server, configuration, and metrics.
pub mod server;
/// Append vectors, sparse index, bucket engine, sharded store.
pub mod storage;

// ─────────────────────────────────────────────────────────────────────────────
// Common Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use error::{Error, ProtocolError, Result, StorageError};
pub use protocol::{LineParser, MAX_LINE_LENGTH, PutRequest, QueryRequest};
pub use server::{Config, LogLevel, Server, ServerMetrics};
pub use storage::{Bucket, Database, DiffResult, GetResult, SummaryResult, Timeline};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Crate version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default port for put lines.
pub const DEFAULT_INGEST_PORT: u16 = 7070;

/// Default port for query lines.
pub const DEFAULT_QUERY_PORT: u16 = 7071;

/// Default bucket width, in the time units clients send.
pub const DEFAULT_RESOLUTION: u64 = 60;
