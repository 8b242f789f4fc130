//! Service groups in `smp_service_group`

use super::backend::{SqlBackend, SqlContext};
use crate::store::{DurableStore, Mutation};
use rusqlite::{params, Connection, OptionalExtension};
use smp_core::{ParticipantId, Result, ServiceGroup};
use std::sync::Arc;

type GroupRow = (String, String, String, Option<String>);

const SELECT_GROUP: &str = "SELECT participant_scheme, participant_value, owner_id, extension
     FROM smp_service_group";

fn row_to_group(row: &rusqlite::Row) -> rusqlite::Result<GroupRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn group_from_row((scheme, value, owner_id, extension): GroupRow) -> Result<ServiceGroup> {
    let participant = ParticipantId::new(scheme, value)?;
    Ok(ServiceGroup::new(participant, owner_id).with_extension(extension))
}

fn exists(conn: &Connection, id: &str) -> Result<bool> {
    conn.query_row("SELECT 1 FROM smp_service_group WHERE id = ?1", [id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .sql_context("service group lookup")
}

/// Service group store on a shared [`SqlBackend`]
pub struct SqlServiceGroupStore {
    backend: Arc<SqlBackend>,
}

impl SqlServiceGroupStore {
    /// Create a store on `backend`
    pub fn new(backend: Arc<SqlBackend>) -> Self {
        Self { backend }
    }
}

impl DurableStore<ServiceGroup> for SqlServiceGroupStore {
    fn load_all(&self) -> Result<Vec<ServiceGroup>> {
        let rows = self.backend.read(|conn| {
            let mut stmt = conn
                .prepare(&format!("{} ORDER BY id", SELECT_GROUP))
                .sql_context("service group load")?;
            let rows = stmt
                .query_map([], row_to_group)
                .sql_context("service group load")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .sql_context("service group load")?;
            Ok(rows)
        })?;
        rows.into_iter().map(group_from_row).collect()
    }

    fn apply(&self, mutation: &Mutation<ServiceGroup>) -> Result<()> {
        let id = mutation.id();
        self.backend.transaction(|tx| {
            let found = exists(tx, &id)?;
            mutation.check(|_| found)?;
            match mutation {
                Mutation::Create(group) => {
                    tx.execute(
                        "INSERT INTO smp_service_group
                         (id, participant_scheme, participant_value, owner_id, extension)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            id,
                            group.participant().scheme(),
                            group.participant().value(),
                            group.owner_id(),
                            group.extension,
                        ],
                    )
                    .sql_context("service group insert")?;
                }
                Mutation::Update(group) => {
                    tx.execute(
                        "UPDATE smp_service_group SET owner_id = ?2, extension = ?3 WHERE id = ?1",
                        params![id, group.owner_id(), group.extension],
                    )
                    .sql_context("service group update")?;
                }
                Mutation::Delete(_) => {
                    tx.execute("DELETE FROM smp_service_group WHERE id = ?1", [&id])
                        .sql_context("service group delete")?;
                }
            }
            Ok(())
        })
    }

    fn get(&self, id: &str) -> Result<Option<ServiceGroup>> {
        let row = self.backend.read(|conn| {
            conn.query_row(
                &format!("{} WHERE id = ?1", SELECT_GROUP),
                [id],
                row_to_group,
            )
            .optional()
            .sql_context("service group lookup")
        })?;
        row.map(group_from_row).transpose()
    }

    fn backend_name(&self) -> &'static str {
        "sql"
    }
}
