//! Incremental line framing.

use crate::error::ProtocolError;
use bytes::{Bytes, BytesMut};

/// Maximum length of one request line in bytes, terminator excluded.
pub const MAX_LINE_LENGTH: usize = 8192;

/// Splits a byte stream into newline-terminated frames.
///
/// Feed raw socket reads with [`LineParser::extend`] and drain complete
/// lines with [`LineParser::next_line`]. A line longer than
/// [`MAX_LINE_LENGTH`] is a protocol error; the connection that produced it
/// cannot be resynchronized reliably and should be dropped.
#[derive(Debug, Default)]
pub struct LineParser {
    buf: BytesMut,
}

impl LineParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }

    /// Append raw bytes from the socket.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pop the next complete line, without its terminator. A trailing `\r`
    /// is stripped. Returns `Ok(None)` when no full line is buffered yet.
    pub fn next_line(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        match memchr::memchr(b'\n', &self.buf) {
            Some(end) => {
                if end > MAX_LINE_LENGTH {
                    return Err(ProtocolError::LineTooLong { len: end, max: MAX_LINE_LENGTH });
                }
                let mut line = self.buf.split_to(end + 1);
                line.truncate(end);
                if line.last() == Some(&b'\r') {
                    line.truncate(end - 1);
                }
                Ok(Some(line.freeze()))
            }
            None => {
                if self.buf.len() > MAX_LINE_LENGTH {
                    return Err(ProtocolError::LineTooLong {
                        len: self.buf.len(),
                        max: MAX_LINE_LENGTH,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
