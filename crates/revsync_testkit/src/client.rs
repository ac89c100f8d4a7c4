//! An offline client simulator.
//!
//! [`MirrorClient`] keeps a local copy of one project, records local edits
//! while "offline" and syncs pull-then-push against a [`SyncServer`] the way
//! a field device does.

use revsync_core::{Fields, Ordinal, ProfileId, ProjectId, RecordId, TableName};
use revsync_protocol::{Disposition, PullParams, PushRecord, PushResponse};
use revsync_server::{ServerResult, SyncServer};
use std::collections::BTreeMap;

/// A locally held record.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorRecord {
    /// Domain fields, without `id`.
    pub fields: Fields,
    /// Ordinal the record was last seen at, if the server ever confirmed it.
    pub revision: Option<Ordinal>,
}

/// A simulated offline client of one project.
#[derive(Debug, Clone)]
pub struct MirrorClient {
    project: ProjectId,
    profile: ProfileId,
    cursor: Ordinal,
    records: BTreeMap<(TableName, RecordId), MirrorRecord>,
    pending: Vec<PushRecord>,
}

impl MirrorClient {
    /// Creates a client that has never synced.
    pub fn new(project: ProjectId, profile: ProfileId) -> Self {
        Self {
            project,
            profile,
            cursor: Ordinal::ZERO,
            records: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    /// Returns the client's cursor.
    pub fn cursor(&self) -> Ordinal {
        self.cursor
    }

    /// Returns the local copy of a record.
    pub fn record(&self, table: &TableName, id: RecordId) -> Option<&MirrorRecord> {
        self.records.get(&(table.clone(), id))
    }

    /// Returns the ids of the local records of `table`.
    pub fn ids(&self, table: &TableName) -> Vec<RecordId> {
        self.records
            .keys()
            .filter(|(t, _)| t == table)
            .map(|(_, id)| *id)
            .collect()
    }

    /// Returns the local fields of every record of `table`.
    pub fn table_view(&self, table: &TableName) -> BTreeMap<RecordId, Fields> {
        self.records
            .iter()
            .filter(|((t, _), _)| t == table)
            .map(|((_, id), record)| (*id, record.fields.clone()))
            .collect()
    }

    /// Returns the number of unpushed edits.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Creates or edits a record locally.
    pub fn upsert(&mut self, table: &TableName, id: RecordId, fields: Fields) {
        let key = (table.clone(), id);
        let revision = self.records.get(&key).and_then(|r| r.revision);
        self.records.insert(
            key,
            MirrorRecord {
                fields: fields.clone(),
                revision,
            },
        );
        let mut record = PushRecord::upsert(table.clone(), id, fields);
        record.last_seen = revision;
        self.queue(record);
    }

    /// Deletes a record locally.
    pub fn delete(&mut self, table: &TableName, id: RecordId) {
        let revision = self
            .records
            .remove(&(table.clone(), id))
            .and_then(|r| r.revision);
        let mut record = PushRecord::delete(table.clone(), id);
        record.last_seen = revision;
        self.queue(record);
    }

    /// Pulls until the server reports nothing more.
    pub fn pull(&mut self, server: &SyncServer) -> ServerResult<usize> {
        let mut received = 0;
        let mut full_sync = false;
        loop {
            let params = PullParams {
                revision_num: Some(self.cursor.as_u64()),
                tables: None,
                full_sync,
            };
            let response = server.handle_pull(self.project, Some(self.profile), params)?;
            received += response.len();

            for update in response.updates {
                let Some(id) = update.id() else { continue };
                let mut fields = update.data;
                fields.remove("id");
                self.records.insert(
                    (update.table, id),
                    MirrorRecord {
                        fields,
                        revision: Some(update.revision_num),
                    },
                );
            }
            for delete in response.deletes {
                self.records.remove(&(delete.table, delete.id));
            }
            self.cursor = response.revision_num;

            if !response.has_more {
                return Ok(received);
            }
            full_sync = response.full_sync;
        }
    }

    /// Pushes every pending edit.
    ///
    /// Applied records take the returned ordinal. Conflicted and rejected
    /// edits are dropped; the next pull brings the server's version back.
    pub fn push(&mut self, server: &SyncServer) -> ServerResult<PushResponse> {
        let batch = std::mem::take(&mut self.pending);
        let response = server.handle_push(self.project, Some(self.profile), batch.into())?;
        for outcome in &response.results {
            if let Disposition::Applied { revision_num } = outcome.disposition {
                if let Some(record) = self.records.get_mut(&(outcome.table.clone(), outcome.id)) {
                    record.revision = Some(revision_num);
                }
            }
        }
        Ok(response)
    }

    /// Pushes pending edits, then pulls.
    pub fn sync(&mut self, server: &SyncServer) -> ServerResult<PushResponse> {
        let response = self.push(server)?;
        self.pull(server)?;
        Ok(response)
    }

    /// Replaces any pending edit of the same record, keeping the ordinal
    /// the first edit was based on.
    fn queue(&mut self, mut record: PushRecord) {
        if let Some(existing) = self
            .pending
            .iter_mut()
            .find(|p| p.table == record.table && p.id == record.id)
        {
            record.last_seen = existing.last_seen;
            *existing = record;
        } else {
            self.pending.push(record);
        }
    }
}
