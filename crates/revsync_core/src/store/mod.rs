//! In-memory transactional record store.
//!
//! The store plays the part of the relational engine the sync protocol sits
//! on: rows grouped by table, single-writer transactions with all-or-nothing
//! commits, snapshot reads, and synchronous change hooks that run inside the
//! writing transaction.
//!
//! ## Single-Writer Guarantee
//!
//! Only one [`WriteTransaction`] exists at a time. The writer lock is held
//! from [`Database::begin_write`] until the transaction commits, aborts or is
//! dropped, which makes ordinal allocation the serialization point of every
//! write.

mod snapshot;
mod transaction;

pub use snapshot::Snapshot;
pub use transaction::{Committed, TransactionState, WriteTransaction};

pub(crate) use snapshot::DbState;

use crate::capture::ChangeCapture;
use crate::change_feed::{ChangeFeed, ChangeNotice};
use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::schema::TableRegistry;
use crate::types::{Fields, OperationKind, Ordinal, ProfileId, RecordId, TableName};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// A row mutation as seen by change hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    /// Table of the mutated row.
    pub table: TableName,
    /// The mutated row.
    pub record_id: RecordId,
    /// Kind of mutation.
    pub kind: OperationKind,
    /// The row's new fields; for a deletion, its fields before the delete.
    /// `None` when re-acknowledging the deletion of a row that is already gone.
    pub fields: Option<Fields>,
    /// Profile performing the write.
    pub actor: Option<ProfileId>,
}

/// A hook invoked synchronously for every row mutation.
///
/// Hooks run inside the writing transaction and may stage further writes on
/// it. Returning an error poisons the transaction: it can no longer commit.
pub trait ChangeHook: Send + Sync {
    /// Called after a mutation is staged.
    fn on_change(&self, txn: &mut WriteTransaction<'_>, change: &RowChange) -> CoreResult<()>;
}

/// The record store.
pub struct Database {
    config: StoreConfig,
    registry: Arc<TableRegistry>,
    pub(crate) state: RwLock<Arc<DbState>>,
    write_lock: Mutex<()>,
    hooks: RwLock<Vec<Arc<dyn ChangeHook>>>,
    feed: ChangeFeed,
    next_txid: AtomicU64,
}

impl Database {
    /// Opens an empty store with no hooks registered.
    pub fn open(config: StoreConfig, registry: TableRegistry) -> CoreResult<Self> {
        registry.validate()?;
        Ok(Self {
            feed: ChangeFeed::with_max_history(config.change_feed_history),
            config,
            registry: Arc::new(registry),
            state: RwLock::new(Arc::new(DbState::default())),
            write_lock: Mutex::new(()),
            hooks: RwLock::new(Vec::new()),
            next_txid: AtomicU64::new(1),
        })
    }

    /// Opens an empty store with revision tracking wired in.
    pub fn open_tracked(config: StoreConfig, registry: TableRegistry) -> CoreResult<Self> {
        let db = Self::open(config, registry)?;
        db.register_hook(Arc::new(ChangeCapture::new()));
        Ok(db)
    }

    /// Registers a change hook. Hooks run in registration order.
    pub fn register_hook(&self, hook: Arc<dyn ChangeHook>) {
        self.hooks.write().push(hook);
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the table registry.
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Begins a write transaction on behalf of `actor`.
    ///
    /// Blocks for at most [`StoreConfig::lock_timeout`] waiting for the
    /// current writer to finish.
    pub fn begin_write(&self, actor: Option<ProfileId>) -> CoreResult<WriteTransaction<'_>> {
        let waited = self.config.lock_timeout;
        let guard = self
            .write_lock
            .try_lock_for(waited)
            .ok_or(CoreError::LockTimeout { waited })?;

        let txid = self.next_txid.fetch_add(1, Ordering::SeqCst);
        let base = Arc::clone(&self.state.read());
        let hooks = self.hooks.read().clone();
        Ok(WriteTransaction::new(self, guard, txid, base, actor, hooks))
    }

    /// Runs `f` in a write transaction and commits it.
    ///
    /// If `f` fails, the transaction is rolled back and the error returned.
    pub fn write<T, F>(&self, actor: Option<ProfileId>, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> CoreResult<T>,
    {
        let mut txn = self.begin_write(actor)?;
        let value = f(&mut txn)?;
        txn.commit()?;
        Ok(value)
    }

    /// Takes a snapshot of the committed state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(Arc::clone(&self.state.read()), Arc::clone(&self.registry))
    }

    /// Returns the most recently allocated ordinal.
    pub fn latest_ordinal(&self) -> Ordinal {
        self.state.read().ledger.latest_ordinal()
    }

    /// Returns the change feed.
    pub fn change_feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Subscribes to committed ledger writes.
    pub fn subscribe(&self) -> Receiver<ChangeNotice> {
        self.feed.subscribe()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("latest_ordinal", &self.latest_ordinal())
            .field("hooks", &self.hooks.read().len())
            .finish()
    }
}
