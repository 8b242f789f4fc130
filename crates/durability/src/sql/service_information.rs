//! Service information across `smp_service_metadata`, `smp_process` and
//! `smp_endpoint`
//!
//! An `Update` is applied as a field-level diff inside one transaction:
//! vanished processes and endpoints are deleted, surviving endpoints are
//! updated in place, new ones inserted. Any failed statement rolls the
//! whole diff back.

use super::backend::{SqlBackend, SqlContext};
use crate::store::{DurableStore, Mutation};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use smp_core::{
    DocumentTypeId, Endpoint, Entity, Error, MergeReport, ParticipantId, Process, ProcessId,
    Result, ServiceInformation,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

struct MetadataRow {
    id: String,
    participant_scheme: String,
    participant_value: String,
    document_scheme: String,
    document_value: String,
    extension: Option<String>,
}

struct ProcessRow {
    metadata_id: String,
    process_key: String,
    process_scheme: String,
    process_value: String,
    extension: Option<String>,
}

struct EndpointRow {
    metadata_id: String,
    process_key: String,
    transport_profile: String,
    endpoint_reference: Option<String>,
    requires_business_level_signature: bool,
    minimum_authentication_level: Option<String>,
    service_activation: Option<String>,
    service_expiration: Option<String>,
    certificate: Option<String>,
    service_description: Option<String>,
    technical_contact_url: Option<String>,
    technical_information_url: Option<String>,
    extension: Option<String>,
}

fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| Error::storage_caused(format!("bad timestamp '{}' in smp_endpoint", s), e))
        })
        .transpose()
}

fn format_timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339())
}

fn endpoint_from_row(row: EndpointRow) -> Result<Endpoint> {
    let mut endpoint = Endpoint::new(row.transport_profile)?;
    endpoint.endpoint_reference = row.endpoint_reference;
    endpoint.requires_business_level_signature = row.requires_business_level_signature;
    endpoint.minimum_authentication_level = row.minimum_authentication_level;
    endpoint.service_activation = parse_timestamp(row.service_activation)?;
    endpoint.service_expiration = parse_timestamp(row.service_expiration)?;
    endpoint.certificate = row.certificate;
    endpoint.service_description = row.service_description;
    endpoint.technical_contact_url = row.technical_contact_url;
    endpoint.technical_information_url = row.technical_information_url;
    endpoint.extension = row.extension;
    Ok(endpoint)
}

/// Load service information trees, all of them or only `id`
fn load(conn: &Connection, id: Option<&str>) -> Result<Vec<ServiceInformation>> {
    let (meta_filter, child_filter) = match id {
        Some(_) => ("WHERE id = ?1", "WHERE metadata_id = ?1"),
        None => ("", ""),
    };

    let metadata = {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, participant_scheme, participant_value, document_scheme,
                        document_value, extension
                 FROM smp_service_metadata {} ORDER BY id",
                meta_filter
            ))
            .sql_context("service metadata load")?;
        let rows = stmt
            .query_map(params_from_iter(id), |row| {
                Ok(MetadataRow {
                    id: row.get(0)?,
                    participant_scheme: row.get(1)?,
                    participant_value: row.get(2)?,
                    document_scheme: row.get(3)?,
                    document_value: row.get(4)?,
                    extension: row.get(5)?,
                })
            })
            .sql_context("service metadata load")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .sql_context("service metadata load")?;
        rows
    };

    let processes = {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT metadata_id, process_key, process_scheme, process_value, extension
                 FROM smp_process {} ORDER BY metadata_id, process_key",
                child_filter
            ))
            .sql_context("process load")?;
        let rows = stmt
            .query_map(params_from_iter(id), |row| {
                Ok(ProcessRow {
                    metadata_id: row.get(0)?,
                    process_key: row.get(1)?,
                    process_scheme: row.get(2)?,
                    process_value: row.get(3)?,
                    extension: row.get(4)?,
                })
            })
            .sql_context("process load")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .sql_context("process load")?;
        rows
    };

    let endpoints = {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT metadata_id, process_key, transport_profile, endpoint_reference,
                        requires_business_level_signature, minimum_authentication_level,
                        service_activation, service_expiration, certificate,
                        service_description, technical_contact_url,
                        technical_information_url, extension
                 FROM smp_endpoint {} ORDER BY metadata_id, process_key, transport_profile",
                child_filter
            ))
            .sql_context("endpoint load")?;
        let rows = stmt
            .query_map(params_from_iter(id), |row| {
                Ok(EndpointRow {
                    metadata_id: row.get(0)?,
                    process_key: row.get(1)?,
                    transport_profile: row.get(2)?,
                    endpoint_reference: row.get(3)?,
                    requires_business_level_signature: row.get(4)?,
                    minimum_authentication_level: row.get(5)?,
                    service_activation: row.get(6)?,
                    service_expiration: row.get(7)?,
                    certificate: row.get(8)?,
                    service_description: row.get(9)?,
                    technical_contact_url: row.get(10)?,
                    technical_information_url: row.get(11)?,
                    extension: row.get(12)?,
                })
            })
            .sql_context("endpoint load")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .sql_context("endpoint load")?;
        rows
    };

    let mut process_map: BTreeMap<(String, String), Process> = BTreeMap::new();
    for row in processes {
        let process_id = ProcessId::new(row.process_scheme, row.process_value)?;
        let mut process = Process::new(process_id);
        process.extension = row.extension;
        process_map.insert((row.metadata_id, row.process_key), process);
    }
    for row in endpoints {
        let key = (row.metadata_id.clone(), row.process_key.clone());
        let process = process_map.get_mut(&key).ok_or_else(|| {
            Error::storage(format!(
                "endpoint row without process ({}, {})",
                key.0, key.1
            ))
        })?;
        process.add_endpoint(endpoint_from_row(row)?)?;
    }

    let mut result = Vec::with_capacity(metadata.len());
    for row in metadata {
        let participant = ParticipantId::new(row.participant_scheme, row.participant_value)?;
        let document_type = DocumentTypeId::new(row.document_scheme, row.document_value)?;
        let mut info = ServiceInformation::new(participant, document_type);
        info.extension = row.extension;

        let keys: Vec<_> = process_map
            .range((row.id.clone(), String::new())..)
            .take_while(|((meta, _), _)| *meta == row.id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in keys {
            if let Some(process) = process_map.remove(&key) {
                info.add_process(process)?;
            }
        }
        result.push(info);
    }
    Ok(result)
}

fn insert_endpoint(conn: &Connection, metadata_id: &str, process_key: &str, e: &Endpoint) -> Result<()> {
    conn.execute(
        "INSERT INTO smp_endpoint
         (metadata_id, process_key, transport_profile, endpoint_reference,
          requires_business_level_signature, minimum_authentication_level,
          service_activation, service_expiration, certificate, service_description,
          technical_contact_url, technical_information_url, extension)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            metadata_id,
            process_key,
            e.transport_profile(),
            e.endpoint_reference,
            e.requires_business_level_signature,
            e.minimum_authentication_level,
            format_timestamp(e.service_activation),
            format_timestamp(e.service_expiration),
            e.certificate,
            e.service_description,
            e.technical_contact_url,
            e.technical_information_url,
            e.extension,
        ],
    )
    .sql_context("endpoint insert")?;
    Ok(())
}

fn update_endpoint(conn: &Connection, metadata_id: &str, process_key: &str, e: &Endpoint) -> Result<()> {
    conn.execute(
        "UPDATE smp_endpoint
         SET endpoint_reference = ?4, requires_business_level_signature = ?5,
             minimum_authentication_level = ?6, service_activation = ?7,
             service_expiration = ?8, certificate = ?9, service_description = ?10,
             technical_contact_url = ?11, technical_information_url = ?12, extension = ?13
         WHERE metadata_id = ?1 AND process_key = ?2 AND transport_profile = ?3",
        params![
            metadata_id,
            process_key,
            e.transport_profile(),
            e.endpoint_reference,
            e.requires_business_level_signature,
            e.minimum_authentication_level,
            format_timestamp(e.service_activation),
            format_timestamp(e.service_expiration),
            e.certificate,
            e.service_description,
            e.technical_contact_url,
            e.technical_information_url,
            e.extension,
        ],
    )
    .sql_context("endpoint update")?;
    Ok(())
}

fn insert_process(conn: &Connection, metadata_id: &str, process: &Process) -> Result<()> {
    let key = process.key();
    conn.execute(
        "INSERT INTO smp_process (metadata_id, process_key, process_scheme, process_value, extension)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            metadata_id,
            key,
            process.process_id().scheme(),
            process.process_id().value(),
            process.extension,
        ],
    )
    .sql_context("process insert")?;
    for endpoint in process.endpoints() {
        insert_endpoint(conn, metadata_id, &key, endpoint)?;
    }
    Ok(())
}

fn insert_tree(conn: &Connection, info: &ServiceInformation) -> Result<()> {
    let id = info.id();
    conn.execute(
        "INSERT INTO smp_service_metadata
         (id, service_group_id, participant_scheme, participant_value,
          document_scheme, document_value, extension)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            info.service_group_id(),
            info.participant().scheme(),
            info.participant().value(),
            info.document_type().scheme(),
            info.document_type().value(),
            info.extension,
        ],
    )
    .sql_context("service metadata insert")?;
    for process in info.processes() {
        insert_process(conn, &id, process)?;
    }
    Ok(())
}

fn submitted_endpoint<'a>(
    submitted: &'a ServiceInformation,
    process_key: &str,
    transport_profile: &str,
) -> Result<&'a Endpoint> {
    submitted
        .process_by_key(process_key)
        .and_then(|p| p.endpoint(transport_profile))
        .ok_or_else(|| {
            Error::storage(format!(
                "merge plan references missing endpoint ({}, {})",
                process_key, transport_profile
            ))
        })
}

/// Apply the diff between the stored tree and `submitted`
fn merge_tree(conn: &Connection, stored: &ServiceInformation, submitted: &ServiceInformation) -> Result<MergeReport> {
    let id = submitted.id();
    let report = MergeReport::between(stored, submitted);

    for key in &report.processes_removed {
        conn.execute(
            "DELETE FROM smp_process WHERE metadata_id = ?1 AND process_key = ?2",
            params![id, key],
        )
        .sql_context("process delete")?;
    }
    for r in &report.endpoints_removed {
        conn.execute(
            "DELETE FROM smp_endpoint
             WHERE metadata_id = ?1 AND process_key = ?2 AND transport_profile = ?3",
            params![id, r.process, r.transport_profile],
        )
        .sql_context("endpoint delete")?;
    }
    for key in &report.processes_updated {
        let extension = submitted.process_by_key(key).and_then(|p| p.extension.clone());
        conn.execute(
            "UPDATE smp_process SET extension = ?3 WHERE metadata_id = ?1 AND process_key = ?2",
            params![id, key, extension],
        )
        .sql_context("process update")?;
    }
    for r in &report.endpoints_updated {
        let endpoint = submitted_endpoint(submitted, &r.process, &r.transport_profile)?;
        update_endpoint(conn, &id, &r.process, endpoint)?;
    }
    for r in &report.endpoints_added {
        let endpoint = submitted_endpoint(submitted, &r.process, &r.transport_profile)?;
        insert_endpoint(conn, &id, &r.process, endpoint)?;
    }
    for key in &report.processes_added {
        if let Some(process) = submitted.process_by_key(key) {
            insert_process(conn, &id, process)?;
        }
    }
    if report.extension_changed {
        conn.execute(
            "UPDATE smp_service_metadata SET extension = ?2 WHERE id = ?1",
            params![id, submitted.extension],
        )
        .sql_context("service metadata update")?;
    }
    Ok(report)
}

/// Service information store on a shared [`SqlBackend`]
pub struct SqlServiceInformationStore {
    backend: Arc<SqlBackend>,
}

impl SqlServiceInformationStore {
    /// Create a store on `backend`
    pub fn new(backend: Arc<SqlBackend>) -> Self {
        Self { backend }
    }
}

impl DurableStore<ServiceInformation> for SqlServiceInformationStore {
    fn load_all(&self) -> Result<Vec<ServiceInformation>> {
        self.backend.read(|conn| load(conn, None))
    }

    fn apply(&self, mutation: &Mutation<ServiceInformation>) -> Result<()> {
        let id = mutation.id();
        self.backend.transaction(|tx| {
            let found = tx
                .query_row("SELECT 1 FROM smp_service_metadata WHERE id = ?1", [&id], |_| Ok(()))
                .optional()
                .sql_context("service metadata lookup")?
                .is_some();
            mutation.check(|_| found)?;

            match mutation {
                Mutation::Create(info) => insert_tree(tx, info)?,
                Mutation::Update(info) => {
                    let stored = load(tx, Some(&id))?
                        .into_iter()
                        .next()
                        .ok_or_else(|| Error::NotFound(id.clone()))?;
                    let report = merge_tree(tx, &stored, info)?;
                    debug!(
                        id = %id,
                        processes_added = report.processes_added.len(),
                        processes_removed = report.processes_removed.len(),
                        endpoints_added = report.endpoints_added.len(),
                        endpoints_removed = report.endpoints_removed.len(),
                        endpoints_updated = report.endpoints_updated.len(),
                        "Service metadata merged"
                    );
                }
                Mutation::Delete(_) => {
                    tx.execute("DELETE FROM smp_service_metadata WHERE id = ?1", [&id])
                        .sql_context("service metadata delete")?;
                }
            }
            Ok(())
        })
    }

    fn get(&self, id: &str) -> Result<Option<ServiceInformation>> {
        self.backend
            .read(|conn| load(conn, Some(id)))
            .map(|found| found.into_iter().next())
    }

    fn backend_name(&self) -> &'static str {
        "sql"
    }
}
