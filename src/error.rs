//! Error types for perch.
//!
//! Three classes of failure exist in this system: programming errors
//! (asserted, fatal), logical rejects (`put` returning `false`, not errors
//! at all), and real errors — I/O, corruption, and protocol violations —
//! which are modeled here.

use std::io;
use std::net::AddrParseError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for perch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for perch.
#[derive(Error, Debug)]
pub enum Error {
    /// Wire protocol errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection errors
    #[error("connection error: {0}")]
    Connection(String),

    /// Address parsing error
    #[error("address parse error: {0}")]
    AddrParse(#[from] AddrParseError),
}

/// Protocol-level errors while decoding request lines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Line exceeds the frame limit
    #[error("line too long: {len} bytes (max: {max})")]
    LineTooLong {
        /// Actual line length in bytes
        len: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Request line is not valid UTF-8
    #[error("invalid UTF-8 in request line")]
    InvalidUtf8,

    /// A required field is absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Series key contains forbidden characters or is too long
    #[error("invalid series key: {0:?}")]
    InvalidKey(String),

    /// Count field is not an unsigned integer
    #[error("invalid count: {0:?}")]
    InvalidCount(String),

    /// Time field is not an unsigned integer
    #[error("invalid time: {0:?}")]
    InvalidTime(String),

    /// Cursor hint is not an unsigned integer
    #[error("invalid hint: {0:?}")]
    InvalidHint(String),

    /// Unknown query verb
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// Trailing fields after a complete request
    #[error("unexpected trailing fields")]
    TrailingFields,
}

/// Storage-level errors from the append vectors and series factory.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Series path exists but is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Index file header does not start with the expected magic
    #[error("bad magic in index file: {0}")]
    BadMagic(PathBuf),

    /// Index file was written by an unknown format version
    #[error("unsupported index version: {0}")]
    UnsupportedVersion(u32),

    /// Existing series was created with a different resolution
    #[error("resolution mismatch: file has {persisted}, requested {requested}")]
    ResolutionMismatch {
        /// Resolution stored in the index header
        persisted: u64,
        /// Resolution the caller asked for
        requested: u64,
    },

    /// File contents are structurally invalid
    #[error("corrupted store: {0}")]
    Corrupted(String),

    /// Series key failed validation before touching the filesystem
    #[error("invalid series key: {0:?}")]
    InvalidKey(String),
}

impl Error {
    /// Returns true if this is a client error (bad request).
    #[inline]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Returns true if this is a server-side error.
    #[inline]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Protocol(ProtocolError::LineTooLong { len: 9000, max: 8192 });
        assert_eq!(
            err.to_string(),
            "protocol error: line too long: 9000 bytes (max: 8192)"
        );
    }

    #[test]
    fn test_error_classification() {
        let client = Error::Protocol(ProtocolError::InvalidUtf8);
        assert!(client.is_client_error());
        assert!(!client.is_server_error());

        let server = Error::Storage(StorageError::Corrupted("test".to_string()));
        assert!(server.is_server_error());
        assert!(!server.is_client_error());
    }

    #[test]
    fn test_resolution_mismatch_display() {
        let err = StorageError::ResolutionMismatch { persisted: 60, requested: 10 };
        assert_eq!(
            err.to_string(),
            "resolution mismatch: file has 60, requested 10"
        );
    }
}
