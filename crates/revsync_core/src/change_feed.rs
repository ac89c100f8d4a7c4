//! Change feed for observing committed ledger writes.
//!
//! Every committed ledger entry write is announced as a [`ChangeNotice`].
//! The feed is the "something changed" signal for consumers outside the
//! sync core, such as summary-cache invalidation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use revsync_core::{Database, StoreConfig, TableRegistry};
//!
//! let db = Database::open_tracked(StoreConfig::default(), TableRegistry::survey())?;
//! let receiver = db.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(notice) = receiver.recv() {
//!         println!("{} changed at {}", notice.table, notice.ordinal);
//!     }
//! });
//! ```

use crate::ledger::RevisionEntry;
use crate::types::{Ordinal, ProjectId, RecordId, TableName};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

/// A committed ledger write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    /// Ordinal of the written entry.
    pub ordinal: Ordinal,
    /// Table of the changed record.
    pub table: TableName,
    /// The changed record.
    pub record_id: RecordId,
    /// Owning project, if any.
    pub project_id: Option<ProjectId>,
    /// Whether the record is now a tombstone.
    pub deleted: bool,
}

impl ChangeNotice {
    /// Builds the notice for a committed entry.
    pub fn from_entry(entry: &RevisionEntry) -> Self {
        Self {
            ordinal: entry.ordinal,
            table: entry.table.clone(),
            record_id: entry.record_id,
            project_id: entry.project_id,
            deleted: entry.deleted,
        }
    }
}

/// Distributes change notices to subscribers.
///
/// The change feed:
/// - Emits only committed writes
/// - Preserves ordinal order
/// - Supports multiple subscribers
/// - Keeps a bounded history for polling
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeNotice>>>,
    history: RwLock<VecDeque<ChangeNotice>>,
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(VecDeque::new()),
            max_history,
        }
    }

    /// Subscribes to all future notices.
    pub fn subscribe(&self) -> Receiver<ChangeNotice> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits a notice to all subscribers, dropping disconnected ones.
    pub fn emit(&self, notice: ChangeNotice) {
        {
            let mut history = self.history.write();
            history.push_back(notice.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(notice.clone()).is_ok());
    }

    /// Emits the notices of a single commit.
    pub fn emit_batch(&self, notices: Vec<ChangeNotice>) {
        for notice in notices {
            self.emit(notice);
        }
    }

    /// Returns retained notices with an ordinal after `cursor`, up to `limit`.
    pub fn poll(&self, cursor: Ordinal, limit: usize) -> Vec<ChangeNotice> {
        self.history
            .read()
            .iter()
            .filter(|n| n.ordinal > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest ordinal in history.
    pub fn latest_ordinal(&self) -> Ordinal {
        self.history
            .read()
            .back()
            .map_or(Ordinal::ZERO, |n| n.ordinal)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(ordinal: u64) -> ChangeNotice {
        ChangeNotice {
            ordinal: Ordinal::new(ordinal),
            table: TableName::new("site").unwrap(),
            record_id: RecordId::new(),
            project_id: None,
            deleted: false,
        }
    }

    #[test]
    fn subscribers_receive_notices() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        feed.emit(notice(1));
        assert_eq!(rx.recv().unwrap().ordinal, Ordinal::new(1));
    }

    #[test]
    fn disconnected_subscribers_are_dropped() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);
        drop(rx);
        feed.emit(notice(1));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn poll_respects_cursor_limit_and_history() {
        let feed = ChangeFeed::with_max_history(3);
        feed.emit_batch((1..=5).map(notice).collect());

        let polled = feed.poll(Ordinal::ZERO, 10);
        let ordinals: Vec<u64> = polled.iter().map(|n| n.ordinal.as_u64()).collect();
        assert_eq!(ordinals, vec![3, 4, 5]);

        assert_eq!(feed.poll(Ordinal::new(3), 1).len(), 1);
        assert_eq!(feed.latest_ordinal(), Ordinal::new(5));
    }
}
