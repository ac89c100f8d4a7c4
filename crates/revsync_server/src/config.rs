//! Server configuration.

use revsync_core::StoreConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Pull timeout, and the deadline after which a push starts no more
    /// records.
    pub request_timeout: Duration,
    /// Maximum number of ledger entries examined by one pull.
    pub max_pull_records: usize,
    /// Maximum number of records accepted in one push.
    pub max_push_batch: usize,
    /// Store configuration.
    pub store: StoreConfig,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            request_timeout: Duration::from_secs(30),
            max_pull_records: 1000,
            max_push_batch: 100,
            store: StoreConfig::default(),
        }
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the pull cap.
    pub fn with_max_pull_records(mut self, max: usize) -> Self {
        self.max_pull_records = max;
        self
    }

    /// Sets the maximum push batch size.
    pub fn with_max_push_batch(mut self, size: usize) -> Self {
        self.max_push_batch = size;
        self
    }

    /// Sets the store configuration.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}
