//! Perch server implementation.
//!
//! Two TCP listeners share one sharded store: the ingest port consumes put
//! lines, the query port answers `get`/`diff`/`summary` lines with JSON. A
//! background task periodically flushes every open series to disk.

pub mod config;
mod connection;
pub mod metrics;

pub use config::{Config, ConfigError, LogLevel};
pub use connection::{IngestConnection, QueryConnection};
pub use metrics::{MetricsSnapshot, ServerMetrics};

use crate::Result;
use crate::storage::Database;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

/// The perch server.
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: Config,
    /// Sharded series store
    database: Arc<Database>,
    /// Counters shared with connections
    metrics: Arc<ServerMetrics>,
    /// Running flag
    running: AtomicBool,
    /// Shutdown notification
    shutdown: Arc<Notify>,
    /// Active connections
    connection_count: AtomicU64,
    /// Total connections since startup
    total_connections: AtomicU64,
    /// Connection semaphore for backpressure
    connection_semaphore: Arc<Semaphore>,
}

impl Server {
    /// Create a new server, opening the store under the configured data
    /// directory.
    pub fn new(config: Config) -> Result<Self> {
        let database = Arc::new(Database::open(&config.dir, config.resolution)?);
        let connection_semaphore = Arc::new(Semaphore::new(config.max_clients));

        Ok(Self {
            config,
            database,
            metrics: Arc::new(ServerMetrics::new()),
            running: AtomicBool::new(false),
            shutdown: Arc::new(Notify::new()),
            connection_count: AtomicU64::new(0),
            total_connections: AtomicU64::new(0),
            connection_semaphore,
        })
    }

    /// Run the server until shutdown is signaled.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let ingest_addr: SocketAddr =
            format!("{}:{}", self.config.bind, self.config.ingest_port).parse()?;
        let query_addr: SocketAddr =
            format!("{}:{}", self.config.bind, self.config.query_port).parse()?;

        let ingest_listener = TcpListener::bind(ingest_addr).await?;
        let query_listener = TcpListener::bind(query_addr).await?;
        info!(
            "Listening for puts on {} and queries on {} (resolution {}, dir {})",
            ingest_addr,
            query_addr,
            self.database.resolution(),
            self.database.root().display()
        );

        self.running.store(true, Ordering::SeqCst);

        // Background flush of open series, if enabled.
        let flush_handle = if self.config.flush_interval > 0 {
            let flush_server = self.clone();
            Some(tokio::spawn(async move {
                let mut interval =
                    tokio::time::interval(Duration::from_secs(flush_server.config.flush_interval));
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    if !flush_server.running.load(Ordering::Relaxed) {
                        break;
                    }
                    let database = flush_server.database.clone();
                    match tokio::task::spawn_blocking(move || database.flush_all()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!("Background flush failed: {}", e),
                        Err(e) => error!("Background flush task panicked: {}", e),
                    }
                }
            }))
        } else {
            None
        };

        loop {
            tokio::select! {
                result = ingest_listener.accept() => {
                    if let Some((socket, peer_addr, permit)) = self.admit(result) {
                        let server = self.clone();
                        tokio::spawn(async move {
                            let _permit = permit;
                            let mut conn = IngestConnection::new(
                                socket,
                                peer_addr,
                                server.database.clone(),
                                server.metrics.clone(),
                                server.config.timeout,
                            );
                            if let Err(e) = conn.run().await {
                                Self::log_connection_error("ingest", peer_addr, &e);
                            }
                            server.connection_count.fetch_sub(1, Ordering::Relaxed);
                            server.metrics.connection_closed();
                        });
                    }
                }
                result = query_listener.accept() => {
                    if let Some((socket, peer_addr, permit)) = self.admit(result) {
                        let server = self.clone();
                        tokio::spawn(async move {
                            let _permit = permit;
                            let mut conn = QueryConnection::new(
                                socket,
                                peer_addr,
                                server.database.clone(),
                                server.metrics.clone(),
                                server.config.timeout,
                            );
                            if let Err(e) = conn.run().await {
                                Self::log_connection_error("query", peer_addr, &e);
                            }
                            server.connection_count.fetch_sub(1, Ordering::Relaxed);
                            server.metrics.connection_closed();
                        });
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Graceful shutdown: wait for connections with a timeout.
        info!(
            "Waiting for {} active connections to close...",
            self.connection_count.load(Ordering::Relaxed)
        );
        let shutdown_timeout = Duration::from_secs(30);
        let start = Instant::now();
        while self.connection_count.load(Ordering::Relaxed) > 0 {
            if start.elapsed() > shutdown_timeout {
                warn!(
                    "Shutdown timeout reached, {} connections still active",
                    self.connection_count.load(Ordering::Relaxed)
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = flush_handle {
            handle.abort();
        }

        info!("Flushing {} open series before exit", self.database.series_count());
        if let Err(e) = self.database.flush_all() {
            error!("Final flush failed: {}", e);
        }

        let snap = self.metrics.snapshot();
        info!(
            "Served {} puts ({} rejected, {} failed), {} queries, {} parse errors over {} connections",
            snap.puts_accepted,
            snap.puts_rejected,
            snap.puts_failed,
            snap.queries,
            snap.parse_errors,
            snap.connections_opened
        );
        info!("Perch is now ready to exit, bye bye...");

        Ok(())
    }

    /// Vet an accepted socket: TCP_NODELAY, connection cap, counters.
    fn admit(
        &self,
        result: io::Result<(TcpStream, SocketAddr)>,
    ) -> Option<(TcpStream, SocketAddr, OwnedSemaphorePermit)> {
        let (socket, peer_addr) = match result {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                return None;
            }
        };

        if let Err(e) = socket.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let permit = match self.connection_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Max clients reached, rejecting connection from {}", peer_addr);
                self.metrics.connection_rejected();
                return None;
            }
        };

        self.connection_count.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.metrics.connection_opened();
        Some((socket, peer_addr, permit))
    }

    fn log_connection_error(kind: &str, peer_addr: SocketAddr, e: &crate::Error) {
        match e {
            crate::Error::Connection(_) => {
                debug!("{} connection from {} ended: {}", kind, peer_addr, e);
            }
            _ => error!("{} connection error from {}: {}", kind, peer_addr, e),
        }
    }

    /// Signal the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Check if the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the current connection count.
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }

    /// Get the total connections since startup.
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Get the store.
    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the server metrics.
    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }
}
