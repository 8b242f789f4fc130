//! Shared SQLite connection and schema

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use smp_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Map a rusqlite error into a storage error with context
pub(crate) trait SqlContext<T> {
    fn sql_context(self, what: &str) -> Result<T>;
}

impl<T> SqlContext<T> for rusqlite::Result<T> {
    fn sql_context(self, what: &str) -> Result<T> {
        self.map_err(|e| Error::storage_caused(format!("SQL {} failed", what), e))
    }
}

/// SQLite database holding every entity collection
///
/// Thread-safe via internal Mutex (SQLite Connection is not Sync).
///
/// # Schema
///
/// ```sql
/// smp_service_group                (id PK, participant, owner_id, extension)
/// smp_service_metadata             (id PK, service_group_id, participant, document type, extension)
/// smp_process                      (metadata_id + process_key PK, FK → metadata ON DELETE CASCADE)
/// smp_endpoint                     (metadata_id + process_key + transport_profile PK,
///                                   FK → process ON DELETE CASCADE)
/// smp_service_metadata_redirection (id PK, service_group_id, participant, document type,
///                                   target_href, subject_unique_identifier, certificate, extension)
/// smp_tprofile                     (id PK, name, deprecated)
/// ```
pub struct SqlBackend {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqlBackend {
    /// Open (or create) a file-based database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .sql_context(&format!("open of database at {}", path.display()))?;
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().sql_context("open of in-memory database")?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .sql_context("enabling foreign keys")?;
        let backend = Self {
            conn: Mutex::new(conn),
            path,
        };
        backend.init_schema()?;
        let location = match &backend.path {
            Some(p) => p.display().to_string(),
            None => ":memory:".to_string(),
        };
        tracing::info!(path = %location, "SQL backend ready");
        Ok(backend)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS smp_service_group (
                id TEXT PRIMARY KEY NOT NULL,
                participant_scheme TEXT NOT NULL,
                participant_value TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                extension TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_service_group_owner
                ON smp_service_group(owner_id);

            CREATE TABLE IF NOT EXISTS smp_service_metadata (
                id TEXT PRIMARY KEY NOT NULL,
                service_group_id TEXT NOT NULL,
                participant_scheme TEXT NOT NULL,
                participant_value TEXT NOT NULL,
                document_scheme TEXT NOT NULL,
                document_value TEXT NOT NULL,
                extension TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_service_metadata_group
                ON smp_service_metadata(service_group_id);

            CREATE TABLE IF NOT EXISTS smp_process (
                metadata_id TEXT NOT NULL
                    REFERENCES smp_service_metadata(id) ON DELETE CASCADE,
                process_key TEXT NOT NULL,
                process_scheme TEXT NOT NULL,
                process_value TEXT NOT NULL,
                extension TEXT,
                PRIMARY KEY (metadata_id, process_key)
            );

            CREATE TABLE IF NOT EXISTS smp_endpoint (
                metadata_id TEXT NOT NULL,
                process_key TEXT NOT NULL,
                transport_profile TEXT NOT NULL CHECK (length(trim(transport_profile)) > 0),
                endpoint_reference TEXT,
                requires_business_level_signature INTEGER NOT NULL,
                minimum_authentication_level TEXT,
                service_activation TEXT,
                service_expiration TEXT,
                certificate TEXT,
                service_description TEXT,
                technical_contact_url TEXT,
                technical_information_url TEXT,
                extension TEXT,
                PRIMARY KEY (metadata_id, process_key, transport_profile),
                FOREIGN KEY (metadata_id, process_key)
                    REFERENCES smp_process(metadata_id, process_key) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS smp_service_metadata_redirection (
                id TEXT PRIMARY KEY NOT NULL,
                service_group_id TEXT NOT NULL,
                participant_scheme TEXT NOT NULL,
                participant_value TEXT NOT NULL,
                document_scheme TEXT NOT NULL,
                document_value TEXT NOT NULL,
                target_href TEXT NOT NULL,
                subject_unique_identifier TEXT NOT NULL,
                certificate TEXT,
                extension TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_redirection_group
                ON smp_service_metadata_redirection(service_group_id);

            CREATE TABLE IF NOT EXISTS smp_tprofile (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                deprecated INTEGER NOT NULL
            );",
        )
        .sql_context("schema initialization")?;
        Ok(())
    }

    /// Database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` inside one transaction
    ///
    /// Commits if `f` returns `Ok`; otherwise the transaction is dropped,
    /// which rolls back every statement `f` executed.
    pub(crate) fn transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().sql_context("BEGIN")?;
        let out = f(&tx)?;
        tx.commit().sql_context("COMMIT")?;
        Ok(out)
    }

    /// Run read-only queries
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Row count of a table
    pub fn table_row_count(&self, table: &str) -> Result<usize> {
        let sql = match table {
            "smp_service_group"
            | "smp_service_metadata"
            | "smp_process"
            | "smp_endpoint"
            | "smp_service_metadata_redirection"
            | "smp_tprofile" => format!("SELECT COUNT(*) FROM {}", table),
            other => return Err(Error::validation(format!("unknown table '{}'", other))),
        };
        self.read(|conn| {
            let count: i64 = conn
                .query_row(&sql, [], |row| row.get(0))
                .sql_context("row count")?;
            Ok(count as usize)
        })
    }
}
