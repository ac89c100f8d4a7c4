//! Store configuration.

use std::time::Duration;

/// Configuration for opening a [`Database`](crate::Database).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a writer waits for the writer lock before giving up.
    pub lock_timeout: Duration,

    /// Number of change notices kept for polling subscribers.
    pub change_feed_history: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            change_feed_history: 10_000,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the writer lock timeout.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the change feed history size.
    #[must_use]
    pub const fn change_feed_history(mut self, size: usize) -> Self {
        self.change_feed_history = size;
        self
    }
}
