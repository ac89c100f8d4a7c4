//! Write transactions.

use crate::change_feed::ChangeNotice;
use crate::error::{CoreError, CoreResult};
use crate::ledger::RevisionEntry;
use crate::schema::{RowSource, TableRegistry};
use crate::store::snapshot::DbState;
use crate::store::{ChangeHook, Database, RowChange};
use crate::types::{Fields, OperationKind, Ordinal, ProfileId, RecordId, RecordKey, TableName};
use parking_lot::MutexGuard;
use std::collections::HashMap;
use std::sync::Arc;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// A hook failed; the transaction can only be aborted.
    Poisoned,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// Ledger writes staged by a transaction.
#[derive(Debug, Default)]
struct LedgerDelta {
    counter: Option<Ordinal>,
    entries: HashMap<RecordKey, RevisionEntry>,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Transaction id.
    pub txid: u64,
    /// Ledger entries written by the transaction, in ordinal order.
    pub entries: Vec<RevisionEntry>,
}

impl Committed {
    /// Returns the committed entry of a record.
    pub fn entry_for(&self, key: &RecordKey) -> Option<&RevisionEntry> {
        self.entries
            .iter()
            .find(|e| e.table == key.table && e.record_id == key.id)
    }

    /// Returns the highest ordinal written, if any.
    pub fn last_ordinal(&self) -> Option<Ordinal> {
        self.entries.last().map(|e| e.ordinal)
    }
}

/// An exclusive write transaction.
///
/// Holds the database writer lock for its whole lifetime, so ordinal
/// allocation and the data writes it describes are serialized with every
/// other writer. Data and ledger writes are staged and become visible
/// atomically on [`commit`](Self::commit). Dropping an uncommitted
/// transaction discards everything it staged.
pub struct WriteTransaction<'db> {
    db: &'db Database,
    _guard: MutexGuard<'db, ()>,
    txid: u64,
    base: Arc<DbState>,
    actor: Option<ProfileId>,
    hooks: Vec<Arc<dyn ChangeHook>>,
    rows: HashMap<RecordKey, Option<Fields>>,
    ledger: LedgerDelta,
    state: TransactionState,
}

impl std::fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("txid", &self.txid)
            .field("actor", &self.actor)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'db> WriteTransaction<'db> {
    pub(crate) fn new(
        db: &'db Database,
        guard: MutexGuard<'db, ()>,
        txid: u64,
        base: Arc<DbState>,
        actor: Option<ProfileId>,
        hooks: Vec<Arc<dyn ChangeHook>>,
    ) -> Self {
        Self {
            db,
            _guard: guard,
            txid,
            base,
            actor,
            hooks,
            rows: HashMap::new(),
            ledger: LedgerDelta::default(),
            state: TransactionState::Active,
        }
    }

    /// Returns the transaction id.
    pub fn id(&self) -> u64 {
        self.txid
    }

    /// Returns the acting profile.
    pub fn actor(&self) -> Option<ProfileId> {
        self.actor
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the table registry.
    pub fn registry(&self) -> &'db TableRegistry {
        self.db.registry()
    }

    /// Reads a row, seeing this transaction's own staged writes.
    pub fn get(&self, table: &TableName, id: RecordId) -> Option<&Fields> {
        match self.rows.get(&RecordKey::new(table.clone(), id)) {
            Some(staged) => staged.as_ref(),
            None => self.base.row(table, id),
        }
    }

    /// Returns true if the row exists.
    pub fn exists(&self, table: &TableName, id: RecordId) -> bool {
        self.get(table, id).is_some()
    }

    /// Returns the current revision entry of a record, staged or committed.
    pub fn revision(&self, key: &RecordKey) -> Option<&RevisionEntry> {
        self.ledger
            .entries
            .get(key)
            .or_else(|| self.base.ledger.current(key))
    }

    /// Inserts a new row.
    pub fn insert(&mut self, table: &TableName, id: RecordId, fields: Fields) -> CoreResult<()> {
        self.ensure_writable(table)?;
        if self.exists(table, id) {
            return Err(CoreError::constraint(table, id, "row already exists"));
        }
        self.stage_row(table, id, Some(fields.clone()));
        self.fire(RowChange {
            table: table.clone(),
            record_id: id,
            kind: OperationKind::Created,
            fields: Some(fields),
            actor: self.actor,
        })
    }

    /// Overwrites an existing row.
    pub fn update(&mut self, table: &TableName, id: RecordId, fields: Fields) -> CoreResult<()> {
        self.ensure_writable(table)?;
        if !self.exists(table, id) {
            return Err(CoreError::record_not_found(table, id));
        }
        self.stage_row(table, id, Some(fields.clone()));
        self.fire(RowChange {
            table: table.clone(),
            record_id: id,
            kind: OperationKind::Updated,
            fields: Some(fields),
            actor: self.actor,
        })
    }

    /// Inserts or overwrites a row, returning which of the two happened.
    pub fn upsert(
        &mut self,
        table: &TableName,
        id: RecordId,
        fields: Fields,
    ) -> CoreResult<OperationKind> {
        if self.exists(table, id) {
            self.update(table, id, fields)?;
            Ok(OperationKind::Updated)
        } else {
            self.insert(table, id, fields)?;
            Ok(OperationKind::Created)
        }
    }

    /// Deletes a row, returning its last fields.
    pub fn delete(&mut self, table: &TableName, id: RecordId) -> CoreResult<Fields> {
        self.ensure_writable(table)?;
        let previous = self
            .get(table, id)
            .cloned()
            .ok_or_else(|| CoreError::record_not_found(table, id))?;
        self.stage_row(table, id, None);
        self.fire(RowChange {
            table: table.clone(),
            record_id: id,
            kind: OperationKind::Deleted,
            fields: Some(previous.clone()),
            actor: self.actor,
        })?;
        Ok(previous)
    }

    /// Reports a deletion of a row that is already gone.
    ///
    /// Used to re-acknowledge a delete of a tombstoned record: no data
    /// changes, but hooks fire with a `Deleted` change that carries no
    /// fields.
    pub fn touch_deleted(&mut self, table: &TableName, id: RecordId) -> CoreResult<()> {
        self.ensure_writable(table)?;
        if self.exists(table, id) {
            return Err(CoreError::invalid_operation(format!(
                "{table}/{id} still exists; delete it instead"
            )));
        }
        self.fire(RowChange {
            table: table.clone(),
            record_id: id,
            kind: OperationKind::Deleted,
            fields: None,
            actor: self.actor,
        })
    }

    /// Commits all staged writes atomically.
    pub fn commit(mut self) -> CoreResult<Committed> {
        match self.state {
            TransactionState::Active => {}
            TransactionState::Poisoned => {
                self.state = TransactionState::Aborted;
                return Err(CoreError::transaction_aborted(
                    "a change hook failed; transaction cannot commit",
                ));
            }
            _ => return Err(CoreError::invalid_operation("transaction not active")),
        }

        let rows = std::mem::take(&mut self.rows);
        let delta = std::mem::take(&mut self.ledger);
        let mut entries: Vec<RevisionEntry> = delta.entries.into_values().collect();
        entries.sort_by_key(|e| e.ordinal);
        // Release our reference to the base so the state is only copied
        // when a snapshot is still holding it.
        self.base = Arc::default();

        {
            let mut current = self.db.state.write();
            let state = Arc::make_mut(&mut *current);
            for (key, staged) in rows {
                match staged {
                    Some(fields) => {
                        state.rows.entry(key.table).or_default().insert(key.id, fields);
                    }
                    None => {
                        if let Some(table_rows) = state.rows.get_mut(&key.table) {
                            table_rows.remove(&key.id);
                        }
                    }
                }
            }
            if let Some(counter) = delta.counter {
                state.ledger.set_counter(counter);
            }
            for entry in &entries {
                state.ledger.apply(entry.clone());
            }
        }

        self.state = TransactionState::Committed;
        tracing::debug!(
            txid = self.txid,
            entries = entries.len(),
            last_ordinal = entries.last().map(|e| e.ordinal.as_u64()),
            "transaction committed"
        );

        self.db
            .change_feed()
            .emit_batch(entries.iter().map(ChangeNotice::from_entry).collect());

        Ok(Committed {
            txid: self.txid,
            entries,
        })
    }

    /// Discards all staged writes.
    pub fn abort(mut self) {
        self.state = TransactionState::Aborted;
        tracing::debug!(txid = self.txid, "transaction aborted");
    }

    /// Allocates the next global ordinal from the staged counter row.
    pub(crate) fn allocate_ordinal(&mut self) -> CoreResult<Ordinal> {
        if self.state != TransactionState::Active {
            return Err(CoreError::invalid_operation("transaction not active"));
        }
        let current = self
            .ledger
            .counter
            .unwrap_or_else(|| self.base.ledger.latest_ordinal());
        let next = current
            .next()
            .ok_or(CoreError::OrdinalsExhausted { last: current })?;
        self.ledger.counter = Some(next);
        Ok(next)
    }

    pub(crate) fn stage_entry(&mut self, entry: RevisionEntry) {
        self.ledger.entries.insert(entry.key(), entry);
    }

    fn stage_row(&mut self, table: &TableName, id: RecordId, fields: Option<Fields>) {
        self.rows.insert(RecordKey::new(table.clone(), id), fields);
    }

    fn ensure_writable(&self, table: &TableName) -> CoreResult<()> {
        if self.state != TransactionState::Active {
            return Err(CoreError::invalid_operation("transaction not active"));
        }
        if !self.db.registry().contains(table) {
            return Err(CoreError::UnknownTable {
                table: table.clone(),
            });
        }
        Ok(())
    }

    /// Runs every hook for a change; the first failure poisons the transaction.
    fn fire(&mut self, change: RowChange) -> CoreResult<()> {
        let hooks = self.hooks.clone();
        for hook in &hooks {
            if let Err(err) = hook.on_change(self, &change) {
                tracing::warn!(
                    txid = self.txid,
                    table = %change.table,
                    record_id = %change.record_id,
                    kind = %change.kind,
                    error = %err,
                    "change hook failed; transaction poisoned"
                );
                self.state = TransactionState::Poisoned;
                return Err(err);
            }
        }
        Ok(())
    }
}

impl RowSource for WriteTransaction<'_> {
    fn row(&self, table: &TableName, id: RecordId) -> Option<&Fields> {
        self.get(table, id)
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        let staged = !self.rows.is_empty() || !self.ledger.entries.is_empty();
        if staged && self.state != TransactionState::Committed {
            tracing::debug!(txid = self.txid, "uncommitted transaction rolled back");
        }
    }
}
