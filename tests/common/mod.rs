//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub use smp_registry::{
    ActionType, AuditSink, BackendKind, Change, Credentials, DocumentTypeId, DurableStore,
    Endpoint, Entity, EntityKind, Error, HookError, MemoryStore, Mutation, ParticipantId, Process,
    ProcessId, Redirect, RedirectCallback, RegistrationHook, RegistryConfig, RegistryStores,
    Result, ServiceGroup, ServiceGroupCallback, ServiceInformation, ServiceInformationCallback,
    SmpRegistry, TransportProfile, User, UserDirectory,
};

// ============================================================================
// Initialization
// ============================================================================

/// Route `tracing` output to the test harness (once per process).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ============================================================================
// Fixtures
// ============================================================================

pub const AS4: &str = "peppol-transport-as4-v2_0";
pub const AS2: &str = "busdox-transport-as2-ver1p0";
pub const START: &str = "busdox-transport-start";

pub fn participant(value: &str) -> ParticipantId {
    ParticipantId::peppol(value).expect("valid participant")
}

pub fn doc_type(value: &str) -> DocumentTypeId {
    DocumentTypeId::peppol(value).expect("valid document type")
}

pub fn process_id(value: &str) -> ProcessId {
    ProcessId::peppol(value).expect("valid process")
}

pub fn endpoint(profile: &str, url: &str) -> Endpoint {
    Endpoint::new(profile)
        .expect("valid transport profile")
        .with_endpoint_reference(url)
        .with_certificate("MIIC...")
        .with_service_description("Test endpoint")
        .with_technical_contact_url("mailto:ops@example.org")
}

/// Service information from `(process, [transport profiles])` pairs
pub fn service_info(
    p: &ParticipantId,
    d: &DocumentTypeId,
    processes: &[(&str, &[&str])],
) -> ServiceInformation {
    let mut si = ServiceInformation::new(p.clone(), d.clone());
    for (pid, profiles) in processes {
        let mut process = Process::new(process_id(pid));
        for profile in *profiles {
            process = process
                .with_endpoint(endpoint(profile, &format!("https://{}.example.org", pid)))
                .expect("unique transport profile");
        }
        si = si.with_process(process).expect("unique process");
    }
    si
}

/// Transport profiles of one process, sorted
pub fn profiles_of(si: &ServiceInformation, pid: &str) -> Vec<String> {
    si.process(&process_id(pid))
        .map(|p| p.endpoints().map(|e| e.transport_profile().to_string()).collect())
        .unwrap_or_default()
}

// ============================================================================
// TestRegistry - registry in a temp directory with reopen support
// ============================================================================

pub struct TestRegistry {
    registry: Option<SmpRegistry>,
    pub dir: TempDir,
    pub config: RegistryConfig,
}

impl TestRegistry {
    /// WAL backend, fsync every record
    pub fn wal() -> Self {
        Self::with_config(RegistryConfig::default().with_backend(BackendKind::Wal))
    }

    /// WAL backend with a small checkpoint threshold
    pub fn wal_with_threshold(threshold: usize) -> Self {
        Self::with_config(
            RegistryConfig::default()
                .with_backend(BackendKind::Wal)
                .with_snapshot_threshold(threshold),
        )
    }

    /// SQLite backend
    pub fn sql() -> Self {
        Self::with_config(RegistryConfig::default().with_backend(BackendKind::Sql))
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let registry = Self::open_in(dir.path(), &config);
        TestRegistry {
            registry: Some(registry),
            dir,
            config,
        }
    }

    fn open_in(path: &Path, config: &RegistryConfig) -> SmpRegistry {
        SmpRegistry::builder()
            .path(path)
            .config(config.clone())
            .default_transport_profiles(true)
            .open()
            .expect("Failed to open registry")
    }

    pub fn registry(&self) -> &SmpRegistry {
        self.registry.as_ref().expect("registry is open")
    }

    /// Drop the registry without flushing and open it again
    ///
    /// Everything not in a snapshot must come back from the recovery log.
    pub fn reopen(&mut self) {
        self.registry = None;
        self.registry = Some(Self::open_in(self.dir.path(), &self.config));
    }

    /// Drop the registry without flushing, let `damage` touch its files,
    /// then open it again
    pub fn crash_and_reopen(&mut self, damage: impl FnOnce(&Path)) {
        self.registry = None;
        damage(self.dir.path());
        self.registry = Some(Self::open_in(self.dir.path(), &self.config));
    }

    /// Like [`crash_and_reopen`](Self::crash_and_reopen), returning the
    /// open error instead of panicking
    pub fn try_crash_and_reopen(&mut self, damage: impl FnOnce(&Path)) -> Result<()> {
        self.registry = None;
        damage(self.dir.path());
        let registry = SmpRegistry::builder()
            .path(self.dir.path())
            .config(self.config.clone())
            .default_transport_profiles(true)
            .open()?;
        self.registry = Some(registry);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn wal_path(&self, kind: EntityKind) -> PathBuf {
        self.dir.path().join(format!("{}.wal", kind.name()))
    }

    pub fn snapshot_path(&self, kind: EntityKind) -> PathBuf {
        self.dir.path().join(format!("{}.json", kind.name()))
    }
}

/// Everything a registry holds, for whole-state comparisons
#[derive(Debug, PartialEq)]
pub struct RegistryState {
    pub service_groups: Vec<ServiceGroup>,
    pub service_information: Vec<ServiceInformation>,
    pub redirects: Vec<Redirect>,
    pub transport_profiles: Vec<TransportProfile>,
}

pub fn state_of(registry: &SmpRegistry) -> RegistryState {
    RegistryState {
        service_groups: registry.service_groups().all(),
        service_information: registry.service_information().all(),
        redirects: registry.redirects().all(),
        transport_profiles: registry.transport_profiles().all(),
    }
}

// ============================================================================
// File helpers
// ============================================================================

pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

pub fn truncate_file(path: &Path, len: u64) {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("open for truncate");
    file.set_len(len).expect("truncate");
}

pub fn corrupt_file_at_offset(path: &Path, offset: u64, bytes: &[u8]) {
    use std::io::{Seek, SeekFrom, Write};
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("open for corrupt");
    file.seek(SeekFrom::Start(offset)).expect("seek");
    file.write_all(bytes).expect("corrupt");
}

pub fn append_bytes(path: &Path, bytes: &[u8]) {
    use std::io::Write;
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .expect("open for append");
    file.write_all(bytes).expect("append");
}

// ============================================================================
// FlakyStore - memory store with injectable failures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailMode {
    Never,
    Next(ActionType),
    Always(ActionType),
    /// Fail the n-th (0-based) apply of this action from now on
    Nth(ActionType, usize),
}

pub struct FlakyStore<E: Entity> {
    inner: MemoryStore<E>,
    mode: Mutex<FailMode>,
    seen: AtomicUsize,
    pub failures: AtomicUsize,
}

impl<E: Entity> FlakyStore<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            mode: Mutex::new(FailMode::Never),
            seen: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        })
    }

    /// Fail the next apply of `action`
    pub fn fail_next(&self, action: ActionType) {
        *self.mode.lock() = FailMode::Next(action);
    }

    /// Fail every apply of `action` until healed
    pub fn fail_always(&self, action: ActionType) {
        *self.mode.lock() = FailMode::Always(action);
    }

    /// Let `n` applies of `action` pass, then fail one
    pub fn fail_after(&self, action: ActionType, n: usize) {
        self.seen.store(0, Ordering::SeqCst);
        *self.mode.lock() = FailMode::Nth(action, n);
    }

    pub fn heal(&self) {
        *self.mode.lock() = FailMode::Never;
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    fn should_fail(&self, action: ActionType) -> bool {
        let mut mode = self.mode.lock();
        match *mode {
            FailMode::Never => false,
            FailMode::Next(a) if a == action => {
                *mode = FailMode::Never;
                true
            }
            FailMode::Always(a) => a == action,
            FailMode::Nth(a, n) if a == action => {
                if self.seen.fetch_add(1, Ordering::SeqCst) == n {
                    *mode = FailMode::Never;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}

impl<E: Entity> DurableStore<E> for FlakyStore<E> {
    fn load_all(&self) -> Result<Vec<E>> {
        self.inner.load_all()
    }

    fn apply(&self, mutation: &Mutation<E>) -> Result<()> {
        if self.should_fail(mutation.action()) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(Error::storage(format!(
                "injected {} failure for {}",
                mutation.action(),
                mutation.id()
            )));
        }
        self.inner.apply(mutation)
    }

    fn get(&self, id: &str) -> Result<Option<E>> {
        self.inner.get(id)
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// Memory-backed stores whose failures tests can switch on
pub struct FlakyStores {
    pub service_groups: Arc<FlakyStore<ServiceGroup>>,
    pub service_information: Arc<FlakyStore<ServiceInformation>>,
    pub redirects: Arc<FlakyStore<Redirect>>,
    pub transport_profiles: Arc<FlakyStore<TransportProfile>>,
}

impl FlakyStores {
    pub fn new() -> Self {
        Self {
            service_groups: FlakyStore::new(),
            service_information: FlakyStore::new(),
            redirects: FlakyStore::new(),
            transport_profiles: FlakyStore::new(),
        }
    }

    pub fn as_registry_stores(&self) -> RegistryStores {
        RegistryStores {
            service_groups: self.service_groups.clone(),
            service_information: self.service_information.clone(),
            redirects: self.redirects.clone(),
            transport_profiles: self.transport_profiles.clone(),
        }
    }
}

// ============================================================================
// RecordingHook
// ============================================================================

#[derive(Default)]
pub struct RecordingHook {
    pub calls: Mutex<Vec<String>>,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_undo: AtomicBool,
}

impl RecordingHook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &str, participant: &ParticipantId, fail: &AtomicBool) -> std::result::Result<(), HookError> {
        self.calls
            .lock()
            .push(format!("{} {}", call, participant.value()));
        if fail.load(Ordering::SeqCst) {
            Err(HookError::new(format!("{} refused", call)))
        } else {
            Ok(())
        }
    }
}

impl RegistrationHook for RecordingHook {
    fn create_service_group(&self, p: &ParticipantId) -> std::result::Result<(), HookError> {
        self.record("create", p, &self.fail_create)
    }

    fn undo_create_service_group(&self, p: &ParticipantId) -> std::result::Result<(), HookError> {
        self.record("undo_create", p, &self.fail_undo)
    }

    fn delete_service_group(&self, p: &ParticipantId) -> std::result::Result<(), HookError> {
        self.record("delete", p, &self.fail_delete)
    }

    fn undo_delete_service_group(&self, p: &ParticipantId) -> std::result::Result<(), HookError> {
        self.record("undo_delete", p, &self.fail_undo)
    }
}

// ============================================================================
// RecordingAuditSink
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub kind: EntityKind,
    pub action: ActionType,
    pub id: String,
    pub ok: bool,
}

#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    pub fn failures(&self) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|e| !e.ok).collect()
    }

    fn push(&self, kind: EntityKind, action: ActionType, id: &str, ok: bool) {
        self.events.lock().push(AuditEvent {
            kind,
            action,
            id: id.to_string(),
            ok,
        });
    }
}

impl AuditSink for RecordingAuditSink {
    fn on_create(&self, kind: EntityKind, id: &str) {
        self.push(kind, ActionType::Create, id, true);
    }

    fn on_update(&self, kind: EntityKind, id: &str) {
        self.push(kind, ActionType::Update, id, true);
    }

    fn on_delete(&self, kind: EntityKind, id: &str) {
        self.push(kind, ActionType::Delete, id, true);
    }

    fn on_failure(&self, kind: EntityKind, action: ActionType, id: &str, _error: &Error) {
        self.push(kind, action, id, false);
    }
}

// ============================================================================
// Journal - callback recording every notification in order
// ============================================================================

#[derive(Default)]
pub struct Journal {
    entries: Mutex<Vec<String>>,
}

impl Journal {
    /// Journal subscribed to every manager of `registry`
    pub fn attach(registry: &SmpRegistry) -> Arc<Self> {
        let journal = Arc::new(Self::default());
        registry.service_groups().callbacks().add(journal.clone());
        registry.service_information().callbacks().add(journal.clone());
        registry.redirects().callbacks().add(journal.clone());
        journal
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn push(&self, entry: String) {
        self.entries.lock().push(entry);
    }
}

impl ServiceGroupCallback for Journal {
    fn on_service_group_created(&self, group: &ServiceGroup) {
        self.push(format!("group created {}", group.participant().value()));
    }

    fn on_service_group_updated(&self, participant: &ParticipantId) {
        self.push(format!("group updated {}", participant.value()));
    }

    fn on_service_group_deleted(&self, participant: &ParticipantId) {
        self.push(format!("group deleted {}", participant.value()));
    }
}

impl ServiceInformationCallback for Journal {
    fn on_service_information_created(&self, info: &ServiceInformation) {
        self.push(format!("info created {}", info.document_type().value()));
    }

    fn on_service_information_updated(&self, info: &ServiceInformation) {
        self.push(format!("info updated {}", info.document_type().value()));
    }

    fn on_service_information_deleted(&self, info: &ServiceInformation) {
        self.push(format!("info deleted {}", info.document_type().value()));
    }
}

impl RedirectCallback for Journal {
    fn on_redirect_created(&self, redirect: &Redirect) {
        self.push(format!("redirect created {}", redirect.document_type().value()));
    }

    fn on_redirect_updated(&self, redirect: &Redirect) {
        self.push(format!("redirect updated {}", redirect.document_type().value()));
    }

    fn on_redirect_deleted(&self, redirect: &Redirect) {
        self.push(format!("redirect deleted {}", redirect.document_type().value()));
    }
}

// ============================================================================
// StaticUserDirectory
// ============================================================================

#[derive(Default)]
pub struct StaticUserDirectory {
    users: HashMap<String, (String, User)>,
}

impl StaticUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: &str, name: &str, password: &str) -> Self {
        self.users
            .insert(name.to_string(), (password.to_string(), User::new(id, name)));
        self
    }
}

impl UserDirectory for StaticUserDirectory {
    fn validate_credentials(&self, credentials: &Credentials) -> Result<User> {
        match self.users.get(&credentials.user_name) {
            Some((password, user)) if *password == credentials.password => Ok(user.clone()),
            _ => Err(Error::Unauthorized(format!(
                "invalid credentials for '{}'",
                credentials.user_name
            ))),
        }
    }
}
