//! Change capture.
//!
//! [`ChangeCapture`] is the only writer of the revision ledger. Registered
//! as a [`ChangeHook`], it turns every row mutation into exactly one ledger
//! entry write inside the same transaction, plus a second write touching the
//! owning project's own entry for cascading tables.

use crate::error::{CoreError, CoreResult};
use crate::ledger::{LedgerWrite, RevisionLedger};
use crate::schema::read_uuid;
use crate::store::{ChangeHook, RowChange, WriteTransaction};
use crate::types::{ProfileId, ProjectId, RecordKey};

/// Records every row mutation in the revision ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeCapture;

impl ChangeCapture {
    /// Creates the capture hook.
    pub fn new() -> Self {
        Self
    }

    /// Determines the owning project of the changed record.
    ///
    /// Deletions reuse the project of the record's existing entry when there
    /// is one, since ancestors may already be gone in the same transaction.
    fn project_for(
        txn: &WriteTransaction<'_>,
        change: &RowChange,
        key: &RecordKey,
    ) -> CoreResult<Option<ProjectId>> {
        let registry = txn.registry();
        let existing = txn.revision(key);

        if change.kind.is_delete() {
            if let Some(entry) = existing {
                return Ok(entry.project_id);
            }
        }

        match &change.fields {
            Some(fields) => registry.resolve_project(txn, &change.table, change.record_id, fields),
            None if registry.spec(&change.table)?.is_global() => Ok(None),
            None => Err(CoreError::project_resolution(
                &change.table,
                change.record_id,
                "no row or revision entry to resolve from",
            )),
        }
    }

    /// Determines the profile stamped on the entry.
    ///
    /// Owner-scoped tables record the owner column so that visibility
    /// follows the record's owner rather than whoever touched it last.
    fn profile_for(
        txn: &WriteTransaction<'_>,
        change: &RowChange,
        key: &RecordKey,
    ) -> CoreResult<Option<ProfileId>> {
        let spec = txn.registry().spec(&change.table)?;
        let Some(owner_field) = &spec.owner_field else {
            return Ok(change.actor);
        };

        let owner = change
            .fields
            .as_ref()
            .and_then(|fields| read_uuid(fields, owner_field).ok())
            .map(ProfileId::from_uuid);

        Ok(owner
            .or_else(|| txn.revision(key).and_then(|entry| entry.profile_id))
            .or(change.actor))
    }
}

impl ChangeHook for ChangeCapture {
    fn on_change(&self, txn: &mut WriteTransaction<'_>, change: &RowChange) -> CoreResult<()> {
        let key = RecordKey::new(change.table.clone(), change.record_id);
        let project = Self::project_for(txn, change, &key)?;
        let profile = Self::profile_for(txn, change, &key)?;
        let cascade = txn.registry().spec(&change.table)?.cascade;

        let entry = RevisionLedger::record(
            txn,
            LedgerWrite {
                key,
                project_id: project,
                profile_id: profile,
                deleted: change.kind.is_delete(),
            },
        )?;

        tracing::debug!(
            txid = txn.id(),
            table = %entry.table,
            record_id = %entry.record_id,
            kind = %change.kind,
            ordinal = entry.ordinal.as_u64(),
            project_id = ?entry.project_id,
            "change captured"
        );

        if let (true, Some(project)) = (cascade, project) {
            let project_key = RecordKey::project(project);
            let project_deleted = txn
                .revision(&project_key)
                .is_some_and(|existing| existing.deleted);

            let touched = RevisionLedger::record(
                txn,
                LedgerWrite {
                    key: project_key,
                    project_id: Some(project),
                    profile_id: change.actor,
                    deleted: project_deleted,
                },
            )?;

            tracing::debug!(
                txid = txn.id(),
                project_id = %project,
                ordinal = touched.ordinal.as_u64(),
                source_table = %change.table,
                "project touched"
            );
        }

        Ok(())
    }
}
