//! Transport profiles in `smp_tprofile`

use super::backend::{SqlBackend, SqlContext};
use crate::store::{DurableStore, Mutation};
use rusqlite::{params, OptionalExtension};
use smp_core::{Result, TransportProfile};
use std::sync::Arc;

type ProfileRow = (String, String, bool);

fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<ProfileRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn profile_from_row((id, name, deprecated): ProfileRow) -> Result<TransportProfile> {
    TransportProfile::new(id, name, deprecated)
}

/// Transport profile store on a shared [`SqlBackend`]
pub struct SqlTransportProfileStore {
    backend: Arc<SqlBackend>,
}

impl SqlTransportProfileStore {
    /// Create a store on `backend`
    pub fn new(backend: Arc<SqlBackend>) -> Self {
        Self { backend }
    }
}

impl DurableStore<TransportProfile> for SqlTransportProfileStore {
    fn load_all(&self) -> Result<Vec<TransportProfile>> {
        let rows = self.backend.read(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, deprecated FROM smp_tprofile ORDER BY id")
                .sql_context("transport profile load")?;
            let rows = stmt
                .query_map([], row_to_profile)
                .sql_context("transport profile load")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .sql_context("transport profile load")?;
            Ok(rows)
        })?;
        rows.into_iter().map(profile_from_row).collect()
    }

    fn apply(&self, mutation: &Mutation<TransportProfile>) -> Result<()> {
        let id = mutation.id();
        self.backend.transaction(|tx| {
            let found = tx
                .query_row("SELECT 1 FROM smp_tprofile WHERE id = ?1", [&id], |_| Ok(()))
                .optional()
                .sql_context("transport profile lookup")?
                .is_some();
            mutation.check(|_| found)?;
            match mutation {
                Mutation::Create(profile) => {
                    tx.execute(
                        "INSERT INTO smp_tprofile (id, name, deprecated) VALUES (?1, ?2, ?3)",
                        params![id, profile.name(), profile.is_deprecated()],
                    )
                    .sql_context("transport profile insert")?;
                }
                Mutation::Update(profile) => {
                    tx.execute(
                        "UPDATE smp_tprofile SET name = ?2, deprecated = ?3 WHERE id = ?1",
                        params![id, profile.name(), profile.is_deprecated()],
                    )
                    .sql_context("transport profile update")?;
                }
                Mutation::Delete(_) => {
                    tx.execute("DELETE FROM smp_tprofile WHERE id = ?1", [&id])
                        .sql_context("transport profile delete")?;
                }
            }
            Ok(())
        })
    }

    fn get(&self, id: &str) -> Result<Option<TransportProfile>> {
        let row = self.backend.read(|conn| {
            conn.query_row(
                "SELECT id, name, deprecated FROM smp_tprofile WHERE id = ?1",
                [id],
                row_to_profile,
            )
            .optional()
            .sql_context("transport profile lookup")
        })?;
        row.map(profile_from_row).transpose()
    }

    fn backend_name(&self) -> &'static str {
        "sql"
    }
}
