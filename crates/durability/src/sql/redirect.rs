//! Redirects in `smp_service_metadata_redirection`

use super::backend::{SqlBackend, SqlContext};
use crate::store::{DurableStore, Mutation};
use rusqlite::{params, OptionalExtension};
use smp_core::{DocumentTypeId, ParticipantId, Redirect, Result};
use std::sync::Arc;

struct RedirectRow {
    participant_scheme: String,
    participant_value: String,
    document_scheme: String,
    document_value: String,
    target_href: String,
    subject_unique_identifier: String,
    certificate: Option<String>,
    extension: Option<String>,
}

const SELECT_REDIRECT: &str = "SELECT participant_scheme, participant_value,
            document_scheme, document_value, target_href, subject_unique_identifier,
            certificate, extension
     FROM smp_service_metadata_redirection";

fn row_to_redirect(row: &rusqlite::Row) -> rusqlite::Result<RedirectRow> {
    Ok(RedirectRow {
        participant_scheme: row.get(0)?,
        participant_value: row.get(1)?,
        document_scheme: row.get(2)?,
        document_value: row.get(3)?,
        target_href: row.get(4)?,
        subject_unique_identifier: row.get(5)?,
        certificate: row.get(6)?,
        extension: row.get(7)?,
    })
}

fn redirect_from_row(row: RedirectRow) -> Result<Redirect> {
    let participant = ParticipantId::new(row.participant_scheme, row.participant_value)?;
    let document_type = DocumentTypeId::new(row.document_scheme, row.document_value)?;
    Ok(Redirect::new(
        participant,
        document_type,
        row.target_href,
        row.subject_unique_identifier,
    )?
    .with_certificate(row.certificate)
    .with_extension(row.extension))
}

/// Redirect store on a shared [`SqlBackend`]
pub struct SqlRedirectStore {
    backend: Arc<SqlBackend>,
}

impl SqlRedirectStore {
    /// Create a store on `backend`
    pub fn new(backend: Arc<SqlBackend>) -> Self {
        Self { backend }
    }
}

impl DurableStore<Redirect> for SqlRedirectStore {
    fn load_all(&self) -> Result<Vec<Redirect>> {
        let rows = self.backend.read(|conn| {
            let mut stmt = conn
                .prepare(&format!("{} ORDER BY id", SELECT_REDIRECT))
                .sql_context("redirect load")?;
            let rows = stmt
                .query_map([], row_to_redirect)
                .sql_context("redirect load")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .sql_context("redirect load")?;
            Ok(rows)
        })?;
        rows.into_iter().map(redirect_from_row).collect()
    }

    fn apply(&self, mutation: &Mutation<Redirect>) -> Result<()> {
        let id = mutation.id();
        self.backend.transaction(|tx| {
            let found = tx
                .query_row(
                    "SELECT 1 FROM smp_service_metadata_redirection WHERE id = ?1",
                    [&id],
                    |_| Ok(()),
                )
                .optional()
                .sql_context("redirect lookup")?
                .is_some();
            mutation.check(|_| found)?;

            match mutation {
                Mutation::Create(r) => {
                    tx.execute(
                        "INSERT INTO smp_service_metadata_redirection
                         (id, service_group_id, participant_scheme, participant_value,
                          document_scheme, document_value, target_href,
                          subject_unique_identifier, certificate, extension)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                        params![
                            id,
                            r.service_group_id(),
                            r.participant().scheme(),
                            r.participant().value(),
                            r.document_type().scheme(),
                            r.document_type().value(),
                            r.target_href,
                            r.subject_unique_identifier,
                            r.certificate,
                            r.extension,
                        ],
                    )
                    .sql_context("redirect insert")?;
                }
                Mutation::Update(r) => {
                    tx.execute(
                        "UPDATE smp_service_metadata_redirection
                         SET target_href = ?2, subject_unique_identifier = ?3,
                             certificate = ?4, extension = ?5
                         WHERE id = ?1",
                        params![
                            id,
                            r.target_href,
                            r.subject_unique_identifier,
                            r.certificate,
                            r.extension,
                        ],
                    )
                    .sql_context("redirect update")?;
                }
                Mutation::Delete(_) => {
                    tx.execute(
                        "DELETE FROM smp_service_metadata_redirection WHERE id = ?1",
                        [&id],
                    )
                    .sql_context("redirect delete")?;
                }
            }
            Ok(())
        })
    }

    fn get(&self, id: &str) -> Result<Option<Redirect>> {
        let row = self.backend.read(|conn| {
            conn.query_row(
                &format!("{} WHERE id = ?1", SELECT_REDIRECT),
                [id],
                row_to_redirect,
            )
            .optional()
            .sql_context("redirect lookup")
        })?;
        row.map(redirect_from_row).transpose()
    }

    fn backend_name(&self) -> &'static str {
        "sql"
    }
}
