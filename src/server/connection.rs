//! Connection handling for individual clients.

use super::metrics::ServerMetrics;
use crate::error::Error;
use crate::protocol::{LineParser, PutRequest, QueryRequest};
use crate::storage::Database;
use crate::Result;
use bytes::BytesMut;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, trace, warn};

/// Buffer size for reading from the socket.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Maximum bytes to buffer before forcing a response flush.
const WRITE_BUFFER_HIGH_WATER: usize = 64 * 1024;

/// Read from the socket, honoring the idle timeout when one is configured.
async fn read_some(stream: &mut TcpStream, buf: &mut [u8], timeout: u32) -> Result<usize> {
    if timeout == 0 {
        return Ok(stream.read(buf).await?);
    }
    match tokio::time::timeout(Duration::from_secs(u64::from(timeout)), stream.read(buf)).await {
        Ok(n) => Ok(n?),
        Err(_) => Err(Error::Connection("idle timeout".to_string())),
    }
}

/// A connection on the ingest port: a stream of put lines, no responses.
pub struct IngestConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    parser: LineParser,
    database: Arc<Database>,
    metrics: Arc<ServerMetrics>,
    timeout: u32,
}

impl IngestConnection {
    /// Create a new ingest connection.
    pub fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        database: Arc<Database>,
        metrics: Arc<ServerMetrics>,
        timeout: u32,
    ) -> Self {
        debug!("New ingest connection from {}", peer_addr);
        Self {
            stream,
            peer_addr,
            parser: LineParser::new(),
            database,
            metrics,
            timeout,
        }
    }

    /// Run the connection until EOF, idle timeout, or an unrecoverable
    /// framing error.
    pub async fn run(&mut self) -> Result<()> {
        let mut read_buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = read_some(&mut self.stream, &mut read_buf, self.timeout).await?;
            if n == 0 {
                debug!("Ingest connection closed by peer: {}", self.peer_addr);
                return Ok(());
            }
            trace!("Read {} bytes from {}", n, self.peer_addr);
            self.parser.extend(&read_buf[..n]);

            loop {
                match self.parser.next_line() {
                    Ok(Some(line)) => self.handle_line(&line),
                    Ok(None) => break,
                    Err(e) => {
                        // An over-long frame cannot be resynchronized.
                        self.metrics.record_parse_error();
                        warn!("Dropping ingest connection {}: {}", self.peer_addr, e);
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_line(&self, line: &[u8]) {
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        let request = match PutRequest::parse(line) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.record_parse_error();
                debug!("Bad put line from {}: {}", self.peer_addr, e);
                return;
            }
        };

        match self.database.put(&request.key, request.time, request.count) {
            Ok(true) => self.metrics.record_put_accepted(),
            Ok(false) => {
                self.metrics.record_put_rejected();
                debug!(
                    "Rejected put {} t={} (outside the backfill window)",
                    request.key, request.time
                );
            }
            Err(e) => {
                self.metrics.record_put_failed();
                error!("Put to {} failed: {}", request.key, e);
            }
        }
    }
}

/// A connection on the query port: one JSON line back per request line.
pub struct QueryConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    parser: LineParser,
    database: Arc<Database>,
    metrics: Arc<ServerMetrics>,
    timeout: u32,
    write_buffer: BytesMut,
}

impl QueryConnection {
    /// Create a new query connection.
    pub fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        database: Arc<Database>,
        metrics: Arc<ServerMetrics>,
        timeout: u32,
    ) -> Self {
        debug!("New query connection from {}", peer_addr);
        Self {
            stream,
            peer_addr,
            parser: LineParser::new(),
            database,
            metrics,
            timeout,
            write_buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Run the connection until EOF, idle timeout, or an unrecoverable
    /// framing error.
    pub async fn run(&mut self) -> Result<()> {
        let mut read_buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = read_some(&mut self.stream, &mut read_buf, self.timeout).await?;
            if n == 0 {
                debug!("Query connection closed by peer: {}", self.peer_addr);
                return Ok(());
            }
            self.parser.extend(&read_buf[..n]);

            loop {
                match self.parser.next_line() {
                    Ok(Some(line)) => {
                        self.handle_line(&line);
                        if self.write_buffer.len() >= WRITE_BUFFER_HIGH_WATER {
                            self.flush_writes().await?;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        self.metrics.record_parse_error();
                        self.queue(&json!({ "error": e.to_string() }));
                        self.flush_writes().await?;
                        warn!("Dropping query connection {}: {}", self.peer_addr, e);
                        return Ok(());
                    }
                }
            }
            self.flush_writes().await?;
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        let request = match QueryRequest::parse(line) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.record_parse_error();
                self.queue(&json!({ "error": e.to_string() }));
                return;
            }
        };
        self.metrics.record_query();

        match request {
            QueryRequest::Get { key, time, hint } => {
                match self.database.get(&key, time, hint) {
                    Ok(Some(result)) => self.queue(&result),
                    Ok(None) => self.queue_unknown_series(&key),
                    Err(e) => self.queue_storage_error(&key, e),
                }
            }
            QueryRequest::Diff { key, from, to, hint } => {
                match self.database.diff(&key, from, to, hint) {
                    Ok(Some(result)) => self.queue(&result),
                    Ok(None) => self.queue_unknown_series(&key),
                    Err(e) => self.queue_storage_error(&key, e),
                }
            }
            QueryRequest::Summary { key } => match self.database.summary(&key) {
                Ok(Some(result)) => self.queue(&result),
                Ok(None) => self.queue_unknown_series(&key),
                Err(e) => self.queue_storage_error(&key, e),
            },
        }
    }

    fn queue_unknown_series(&mut self, key: &str) {
        self.queue(&json!({ "error": format!("unknown series: {key}") }));
    }

    fn queue_storage_error(&mut self, key: &str, e: crate::error::StorageError) {
        error!("Query on {} failed: {}", key, e);
        self.queue(&json!({ "error": "internal error" }));
    }

    /// Serialize one response line into the write buffer.
    fn queue<T: Serialize>(&mut self, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.write_buffer.extend_from_slice(&bytes);
                self.write_buffer.extend_from_slice(b"\n");
            }
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                self.write_buffer.extend_from_slice(b"{\"error\":\"internal error\"}\n");
            }
        }
    }

    async fn flush_writes(&mut self) -> Result<()> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }
        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;
        self.write_buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_records_serialize_to_flat_json() {
        let bucket = crate::storage::Bucket { value: 5, integral: 5, second_integral: 25 };
        let result = crate::storage::GetResult {
            index_offset: 0,
            query_time: 100,
            range_time: 100,
            pos: 0,
            offset: 0,
            value: bucket,
        };
        let encoded = serde_json::to_value(result).unwrap();
        assert_eq!(encoded["query_time"], 100);
        assert_eq!(encoded["value"]["integral"], 5);
    }
}
