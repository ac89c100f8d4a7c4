//! The push/conflict service.

use crate::collab::{Validation, ValidationGate};
use crate::error::{ServerError, ServerResult};
use revsync_core::{
    CoreResult, Database, Ordinal, ProfileId, ProjectId, RecordKey, WriteTransaction,
};
use revsync_protocol::{Disposition, PushOutcome, PushRecord};
use std::sync::Arc;
use std::time::Instant;

/// Reason given for records a push did not start before its deadline.
pub const TIMED_OUT: &str = "timed out";

/// Applies client records with optimistic concurrency on the record's
/// ordinal.
///
/// Each record is decided and written in its own transaction, so one
/// refused record never rolls back its siblings. A record applies when the
/// server has no entry for it or when the client saw the current ordinal;
/// otherwise it is a conflict and nothing is written.
pub struct PushService {
    db: Arc<Database>,
    gate: Arc<dyn ValidationGate>,
    max_batch: usize,
}

impl PushService {
    /// Creates a push service accepting at most `max_batch` records per push.
    pub fn new(db: Arc<Database>, gate: Arc<dyn ValidationGate>, max_batch: usize) -> Self {
        Self {
            db,
            gate,
            max_batch,
        }
    }

    /// Applies a batch on behalf of `profile` within `project`.
    ///
    /// Returns one outcome per record in submission order. Only an oversized
    /// batch fails as a whole, before anything is written.
    pub fn push(
        &self,
        project: ProjectId,
        profile: Option<ProfileId>,
        records: Vec<PushRecord>,
    ) -> ServerResult<Vec<PushOutcome>> {
        self.push_until(project, profile, records, None)
    }

    /// Like [`push`](Self::push), but starts no record once `deadline` has
    /// passed.
    ///
    /// Records left unstarted are reported as rejected, so the caller still
    /// gets one outcome per record and can resend exactly those.
    pub fn push_until(
        &self,
        project: ProjectId,
        profile: Option<ProfileId>,
        records: Vec<PushRecord>,
        deadline: Option<Instant>,
    ) -> ServerResult<Vec<PushOutcome>> {
        if records.len() > self.max_batch {
            return Err(ServerError::invalid(format!(
                "too many records: {} > {}",
                records.len(),
                self.max_batch
            )));
        }

        let outcomes: Vec<PushOutcome> = records
            .iter()
            .map(|record| {
                let disposition = if deadline.is_some_and(|d| Instant::now() >= d) {
                    Disposition::rejected(TIMED_OUT)
                } else {
                    self.apply(project, profile, record)
                };
                tracing::debug!(
                    project_id = %project,
                    table = %record.table,
                    record_id = %record.id,
                    deleted = record.deleted,
                    status = disposition.status(),
                    "push record"
                );
                PushOutcome::new(record, disposition)
            })
            .collect();

        let skipped = outcomes
            .iter()
            .filter(|o| {
                matches!(&o.disposition, Disposition::Rejected { reason } if reason == TIMED_OUT)
            })
            .count();
        if skipped > 0 {
            tracing::warn!(project_id = %project, skipped, "push deadline passed");
        }
        tracing::info!(
            project_id = %project,
            records = outcomes.len(),
            applied = outcomes.iter().filter(|o| o.disposition.is_applied()).count(),
            "push processed"
        );
        Ok(outcomes)
    }

    fn apply(
        &self,
        project: ProjectId,
        profile: Option<ProfileId>,
        record: &PushRecord,
    ) -> Disposition {
        if !self.db.registry().contains(&record.table) {
            return Disposition::rejected(format!("unknown table: {}", record.table));
        }

        let mut txn = match self.db.begin_write(profile) {
            Ok(txn) => txn,
            Err(err) => {
                tracing::warn!(record_id = %record.id, error = %err, "push record not started");
                return Disposition::rejected(err.to_string());
            }
        };
        match self.decide(&mut txn, project, record) {
            Ok(Decision::Write) => {}
            Ok(Decision::Done(disposition)) => return disposition,
            Err(err) => return Disposition::rejected(err.to_string()),
        }

        let key = RecordKey::new(record.table.clone(), record.id);
        match txn.commit() {
            Ok(committed) => match committed.entry_for(&key) {
                Some(entry) => Disposition::Applied {
                    revision_num: entry.ordinal,
                },
                None => Disposition::rejected("record is not tracked"),
            },
            Err(err) => {
                tracing::warn!(record_id = %record.id, error = %err, "push record rolled back");
                Disposition::rejected(err.to_string())
            }
        }
    }

    /// Checks the record against the server's entry and stages the write.
    ///
    /// Conflicts are decided before validation, so a stale record is always
    /// reported as a conflict. Any error returned here drops `txn`, rolling
    /// back whatever was staged.
    fn decide(
        &self,
        txn: &mut WriteTransaction<'_>,
        project: ProjectId,
        record: &PushRecord,
    ) -> CoreResult<Decision> {
        let key = RecordKey::new(record.table.clone(), record.id);

        if let Some(current) = txn.revision(&key).cloned() {
            if current.project_id.is_some_and(|p| p != project) {
                return Ok(Decision::reject("record belongs to another project"));
            }
            if current.deleted {
                // A tombstone only accepts another delete, which re-acknowledges it.
                if !record.deleted {
                    return Ok(Decision::Done(Disposition::Conflict {
                        server_revision_num: current.ordinal,
                    }));
                }
                txn.touch_deleted(&record.table, record.id)?;
                return Ok(Decision::Write);
            }
            if record.last_seen.map_or(true, |seen| seen < current.ordinal) {
                return Ok(Decision::Done(Disposition::Conflict {
                    server_revision_num: current.ordinal,
                }));
            }
            if record.deleted {
                // A live entry without a row: record the deletion it was missing.
                if !txn.exists(&record.table, record.id) {
                    txn.touch_deleted(&record.table, record.id)?;
                } else {
                    txn.delete(&record.table, record.id)?;
                }
                return Ok(Decision::Write);
            }
        } else if record.deleted {
            if !txn.exists(&record.table, record.id) {
                // Never seen by the server: deleting it changes nothing.
                return Ok(Decision::Done(Disposition::Applied {
                    revision_num: Ordinal::ZERO,
                }));
            }
            txn.delete(&record.table, record.id)?;
            return Ok(Decision::Write);
        }

        let resolved = txn.registry().resolve_project(
            &*txn,
            &record.table,
            record.id,
            &record.fields,
        )?;
        if resolved.is_some_and(|p| p != project) {
            return Ok(Decision::reject("record belongs to another project"));
        }
        if let Validation::Reject(reason) = self.gate.validate(&record.table, &record.fields) {
            return Ok(Decision::Done(Disposition::Rejected { reason }));
        }
        txn.upsert(&record.table, record.id, record.fields.clone())?;
        Ok(Decision::Write)
    }
}

enum Decision {
    Write,
    Done(Disposition),
}

impl Decision {
    fn reject(reason: &str) -> Self {
        Self::Done(Disposition::rejected(reason))
    }
}
