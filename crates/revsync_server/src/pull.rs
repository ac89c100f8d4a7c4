//! The pull service.

use crate::collab::RecordSerializer;
use crate::error::{ServerError, ServerResult};
use revsync_core::{ChangeQuery, Database, TableName};
use revsync_protocol::{PullQuery, PullResponse, RecordDelete, RecordUpdate};
use serde_json::Value;
use std::sync::Arc;

/// Answers "what changed since my cursor" for one project.
///
/// A pull reads a single snapshot and never writes, so repeating it with
/// the same cursor returns the same answer until something new commits.
pub struct PullService {
    db: Arc<Database>,
    serializer: Arc<dyn RecordSerializer>,
    max_records: usize,
}

impl PullService {
    /// Creates a pull service examining at most `max_records` entries per
    /// pull.
    pub fn new(
        db: Arc<Database>,
        serializer: Arc<dyn RecordSerializer>,
        max_records: usize,
    ) -> Self {
        Self {
            db,
            serializer,
            max_records: max_records.max(1),
        }
    }

    /// Runs a pull.
    ///
    /// Entries after the cursor are returned in ordinal order: live records
    /// as updates and deleted ones as deletes. A full sync omits deletes on
    /// every page, since the client holds nothing to delete. The returned
    /// cursor is the last ordinal examined, or the input cursor if nothing
    /// matched.
    pub fn pull(&self, query: &PullQuery) -> ServerResult<PullResponse> {
        let snapshot = self.db.snapshot();
        let registry = snapshot.registry();

        let tables: Vec<TableName> = if query.tables.is_empty() {
            registry.tables().cloned().collect()
        } else {
            for table in &query.tables {
                if !registry.contains(table) {
                    return Err(ServerError::invalid(format!("unknown table: {table}")));
                }
            }
            query.tables.clone()
        };
        let owner_scoped: Vec<TableName> = tables
            .iter()
            .filter(|t| registry.get(t).is_some_and(|spec| spec.owner_field.is_some()))
            .cloned()
            .collect();

        let change_query = ChangeQuery::new(tables, query.since)
            .in_project(Some(query.project))
            .for_profile(query.profile, owner_scoped)
            .limit(self.max_records + 1);
        let mut entries = snapshot.ledger().changes_since(&change_query);
        let has_more = entries.len() > self.max_records;
        entries.truncate(self.max_records);

        let full_sync = query.is_full_sync();
        let mut response = PullResponse::empty(query.since);
        for entry in entries {
            response.revision_num = entry.ordinal;
            if entry.deleted {
                if !full_sync {
                    response.deletes.push(RecordDelete {
                        table: entry.table.clone(),
                        id: entry.record_id,
                        revision_num: entry.ordinal,
                    });
                }
                continue;
            }

            match self
                .serializer
                .serialize(&snapshot, &entry.table, entry.record_id)?
            {
                Some(Value::Object(data)) => response.updates.push(RecordUpdate {
                    table: entry.table.clone(),
                    revision_num: entry.ordinal,
                    data,
                }),
                Some(_) => {
                    return Err(ServerError::Internal(format!(
                        "serializer returned a non-object payload for {}/{}",
                        entry.table, entry.record_id
                    )))
                }
                None => tracing::warn!(
                    table = %entry.table,
                    record_id = %entry.record_id,
                    ordinal = entry.ordinal.as_u64(),
                    "live entry has no record; skipped"
                ),
            }
        }
        response.has_more = has_more;
        response.full_sync = full_sync;

        tracing::debug!(
            project_id = %query.project,
            since = query.since.as_u64(),
            cursor = response.revision_num.as_u64(),
            updates = response.updates.len(),
            deletes = response.deletes.len(),
            has_more,
            "pull served"
        );
        Ok(response)
    }
}
