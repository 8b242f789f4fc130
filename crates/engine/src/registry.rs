//! Registry facade: the managers wired to one backend
//!
//! # Three Ways to Open a Registry
//!
//! ```ignore
//! use smp_engine::SmpRegistry;
//!
//! // 1. Data directory, settings from `smp.toml` (written on first open)
//! let registry = SmpRegistry::open("/var/lib/smp")?;
//!
//! // 2. Builder for explicit settings and collaborators
//! let registry = SmpRegistry::builder()
//!     .path("/var/lib/smp")
//!     .config(RegistryConfig::default().with_backend(BackendKind::Sql))
//!     .hook(Arc::new(MySmlHook::new()))
//!     .open()?;
//!
//! // 3. Ephemeral (no files, testing)
//! let registry = SmpRegistry::ephemeral()?;
//! ```
//!
//! The facade also enforces what no single manager can: for one
//! (participant, document type) pair there is service information or a
//! redirect, never both. It also refuses to delete a transport profile
//! that endpoints still reference.

use crate::audit::{AuditSink, NoopAuditSink};
use crate::auth::{Credentials, UserDirectory};
use crate::config::{BackendKind, RegistryConfig, CONFIG_FILE_NAME};
use crate::hook::{NoopRegistrationHook, RegistrationHook};
use crate::redirect::RedirectManager;
use crate::service_group::ServiceGroupManager;
use crate::service_information::ServiceInformationManager;
use crate::transport_profile::TransportProfileManager;
use parking_lot::Mutex;
use smp_core::{
    Change, DocumentTypeId, Endpoint, Error, ParticipantId, ProcessId, Redirect, Result,
    ServiceGroup, ServiceInformation, TransportProfile,
};
use smp_durability::{DurableStore, MemoryStore, WalStore, WalStoreConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One store per entity collection
#[derive(Clone)]
pub struct RegistryStores {
    /// Service group store
    pub service_groups: Arc<dyn DurableStore<ServiceGroup>>,
    /// Service information store
    pub service_information: Arc<dyn DurableStore<ServiceInformation>>,
    /// Redirect store
    pub redirects: Arc<dyn DurableStore<Redirect>>,
    /// Transport profile store
    pub transport_profiles: Arc<dyn DurableStore<TransportProfile>>,
}

impl RegistryStores {
    /// Volatile stores
    pub fn memory() -> Self {
        Self {
            service_groups: Arc::new(MemoryStore::new()),
            service_information: Arc::new(MemoryStore::new()),
            redirects: Arc::new(MemoryStore::new()),
            transport_profiles: Arc::new(MemoryStore::new()),
        }
    }

    /// Snapshot + recovery log stores in `dir`, one pair of files each
    pub fn wal(dir: &Path, config: WalStoreConfig) -> Result<Self> {
        Ok(Self {
            service_groups: Arc::new(WalStore::<ServiceGroup>::open(dir, config)?),
            service_information: Arc::new(WalStore::<ServiceInformation>::open(dir, config)?),
            redirects: Arc::new(WalStore::<Redirect>::open(dir, config)?),
            transport_profiles: Arc::new(WalStore::<TransportProfile>::open(dir, config)?),
        })
    }

    /// Stores sharing one SQLite database at `path`
    #[cfg(feature = "sql")]
    pub fn sql(path: &Path) -> Result<Self> {
        let backend = Arc::new(smp_durability::SqlBackend::open(path)?);
        Ok(Self::on_sql_backend(backend))
    }

    /// Stores sharing one in-memory SQLite database
    #[cfg(feature = "sql")]
    pub fn sql_in_memory() -> Result<Self> {
        let backend = Arc::new(smp_durability::SqlBackend::open_in_memory()?);
        Ok(Self::on_sql_backend(backend))
    }

    #[cfg(feature = "sql")]
    fn on_sql_backend(backend: Arc<smp_durability::SqlBackend>) -> Self {
        use smp_durability::{
            SqlRedirectStore, SqlServiceGroupStore, SqlServiceInformationStore,
            SqlTransportProfileStore,
        };
        Self {
            service_groups: Arc::new(SqlServiceGroupStore::new(backend.clone())),
            service_information: Arc::new(SqlServiceInformationStore::new(backend.clone())),
            redirects: Arc::new(SqlRedirectStore::new(backend.clone())),
            transport_profiles: Arc::new(SqlTransportProfileStore::new(backend)),
        }
    }

    /// Stores selected by `config.backend`
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if a persistent backend has no data
    /// directory, or the backend is not compiled in.
    pub fn from_config(config: &RegistryConfig, data_dir: Option<&Path>) -> Result<Self> {
        let dir = match (config.backend, data_dir) {
            (BackendKind::Memory, _) => return Ok(Self::memory()),
            (_, Some(dir)) => dir,
            (backend, None) => {
                return Err(Error::validation(format!(
                    "backend '{}' needs a data directory",
                    backend
                )))
            }
        };
        match config.backend {
            BackendKind::Wal => Self::wal(dir, config.wal_store_config()?),
            #[cfg(feature = "sql")]
            BackendKind::Sql => Self::sql(&config.sql_path(dir)),
            #[cfg(not(feature = "sql"))]
            BackendKind::Sql => {
                Err(crate::config::ConfigError::BackendUnavailable(BackendKind::Sql).into())
            }
            BackendKind::Memory => Ok(Self::memory()),
        }
    }
}

impl RegistryStores {
    /// Shortest interval at which any store wants its buffered writes synced
    pub fn sync_interval(&self) -> Option<Duration> {
        [
            self.service_groups.sync_interval(),
            self.service_information.sync_interval(),
            self.redirects.sync_interval(),
            self.transport_profiles.sync_interval(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Fsync every store whose buffered writes are older than its interval
    ///
    /// All stores are synced; the first error is returned.
    pub fn sync_if_overdue(&self) -> Result<()> {
        let results = [
            self.service_groups.sync_if_overdue(),
            self.service_information.sync_if_overdue(),
            self.redirects.sync_if_overdue(),
            self.transport_profiles.sync_if_overdue(),
        ];
        results.into_iter().collect::<Result<Vec<bool>>>().map(|_| ())
    }
}

/// Background thread bounding how long a buffered write stays unsynced
struct SyncThread {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncThread {
    /// Start polling `stores`, or `None` if every store syncs on apply
    fn spawn(stores: &RegistryStores) -> Result<Option<Self>> {
        let interval = match stores.sync_interval() {
            Some(interval) => interval,
            None => return Ok(None),
        };
        let stores = stores.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let handle = std::thread::Builder::new()
            .name("smp-wal-sync".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    std::thread::park_timeout(interval);
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    if let Err(e) = stores.sync_if_overdue() {
                        warn!(error = %e, "Background WAL sync failed");
                    }
                }
            })
            .map_err(|e| Error::storage_caused("Failed to spawn WAL sync thread", e))?;
        debug!(interval_ms = interval.as_millis() as u64, "WAL sync thread started");
        Ok(Some(Self {
            shutdown,
            handle: Some(handle),
        }))
    }
}

impl Drop for SyncThread {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

/// Builder for [`SmpRegistry`]
pub struct RegistryBuilder {
    path: Option<PathBuf>,
    config: Option<RegistryConfig>,
    stores: Option<RegistryStores>,
    hook: Arc<dyn RegistrationHook>,
    audit: Arc<dyn AuditSink>,
    users: Option<Arc<dyn UserDirectory>>,
    default_transport_profiles: bool,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// Builder with no-op hook and audit sink
    pub fn new() -> Self {
        Self {
            path: None,
            config: None,
            stores: None,
            hook: Arc::new(NoopRegistrationHook),
            audit: Arc::new(NoopAuditSink),
            users: None,
            default_transport_profiles: false,
        }
    }

    /// Data directory
    ///
    /// Without an explicit [`config`](Self::config), settings are read from
    /// `smp.toml` in this directory.
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Explicit settings; `smp.toml` is not read
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use these stores instead of the ones `config.backend` selects
    pub fn stores(mut self, stores: RegistryStores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Registration hook called on service group create and delete
    pub fn hook(mut self, hook: Arc<dyn RegistrationHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Audit sink notified of every mutation
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// User directory used by [`SmpRegistry::authorize`]
    pub fn user_directory(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = Some(users);
        self
    }

    /// Store the well-known transport profiles that are missing
    ///
    /// Always done on the first open of a data directory without
    /// `smp.toml`, and by [`SmpRegistry::ephemeral`]. Deleted defaults come
    /// back whenever this is set.
    pub fn default_transport_profiles(mut self, enabled: bool) -> Self {
        self.default_transport_profiles = enabled;
        self
    }

    /// Load every collection and return the registry
    pub fn open(self) -> Result<SmpRegistry> {
        let mut seed_profiles = self.default_transport_profiles;
        let config = match (self.config, &self.path) {
            (Some(config), _) => {
                config.validate()?;
                config
            }
            (None, Some(dir)) => {
                std::fs::create_dir_all(dir)?;
                let file = dir.join(CONFIG_FILE_NAME);
                if RegistryConfig::write_default_if_missing(&file)? {
                    seed_profiles = true;
                }
                RegistryConfig::from_file(&file)?
            }
            (None, None) => RegistryConfig::default().with_backend(BackendKind::Memory),
        };

        let stores = match self.stores {
            Some(stores) => stores,
            None => RegistryStores::from_config(&config, self.path.as_deref())?,
        };

        let sync_thread = SyncThread::spawn(&stores)?;
        let service_information = Arc::new(ServiceInformationManager::open(
            stores.service_information,
            self.audit.clone(),
        )?);
        let redirects = Arc::new(RedirectManager::open(stores.redirects, self.audit.clone())?);
        let service_groups = Arc::new(ServiceGroupManager::open(
            stores.service_groups,
            service_information.clone(),
            redirects.clone(),
            self.hook,
            self.audit.clone(),
        )?);
        let transport_profiles = Arc::new(TransportProfileManager::open(
            stores.transport_profiles,
            self.audit,
        )?);
        if seed_profiles {
            transport_profiles.create_defaults()?;
        }

        info!(
            backend = service_groups.backend_name(),
            path = ?self.path,
            service_groups = service_groups.count(),
            service_information = service_information.count(),
            redirects = redirects.count(),
            transport_profiles = transport_profiles.count(),
            "Registry opened"
        );

        Ok(SmpRegistry {
            service_groups,
            service_information,
            redirects,
            transport_profiles,
            users: self.users,
            pair_guard: Mutex::new(()),
            config,
            path: self.path,
            _sync_thread: sync_thread,
        })
    }
}

/// Service Metadata Publisher registry
///
/// Managers are shared via `Arc`; hand them to whatever serves requests.
pub struct SmpRegistry {
    service_groups: Arc<ServiceGroupManager>,
    service_information: Arc<ServiceInformationManager>,
    redirects: Arc<RedirectManager>,
    transport_profiles: Arc<TransportProfileManager>,
    users: Option<Arc<dyn UserDirectory>>,
    /// Serializes the service information / redirect exchange and the
    /// transport profile in-use check
    pair_guard: Mutex<()>,
    config: RegistryConfig,
    path: Option<PathBuf>,
    /// Periodic fsync for stores in Standard durability, stopped on drop
    _sync_thread: Option<SyncThread>,
}

impl SmpRegistry {
    /// Open the registry in `path`, configured by its `smp.toml`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder().path(path.as_ref()).open()
    }

    /// Builder for custom configuration
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Volatile registry, nothing touches disk
    pub fn ephemeral() -> Result<Self> {
        Self::builder()
            .config(RegistryConfig::default().with_backend(BackendKind::Memory))
            .default_transport_profiles(true)
            .open()
    }

    /// Service group manager
    pub fn service_groups(&self) -> &Arc<ServiceGroupManager> {
        &self.service_groups
    }

    /// Service information manager
    pub fn service_information(&self) -> &Arc<ServiceInformationManager> {
        &self.service_information
    }

    /// Redirect manager
    pub fn redirects(&self) -> &Arc<RedirectManager> {
        &self.redirects
    }

    /// Transport profile manager
    pub fn transport_profiles(&self) -> &Arc<TransportProfileManager> {
        &self.transport_profiles
    }

    /// Effective configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Data directory, `None` for registries opened without one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Merge service information of a registered participant
    ///
    /// A redirect for the same document type is removed first and put back
    /// if the merge fails.
    pub fn merge_service_information(&self, submitted: ServiceInformation) -> Result<Change> {
        let _guard = self.pair_guard.lock();
        self.require_group(submitted.participant())?;

        let removed = self
            .redirects
            .take(submitted.participant(), submitted.document_type())?;
        if removed.is_some() {
            debug!(id = %submitted.participant(), "Replacing redirect by service information");
        }
        match self.service_information.merge(submitted) {
            Ok(change) => Ok(self.replaced_redirect(removed, change)),
            Err(e) => {
                self.redirects.restore(removed.into_iter().collect());
                Err(e)
            }
        }
    }

    /// Insert or overwrite one endpoint of a registered participant
    ///
    /// Like [`merge_service_information`](Self::merge_service_information),
    /// this replaces a redirect for the same document type.
    pub fn upsert_endpoint(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
        process_id: &ProcessId,
        endpoint: Endpoint,
    ) -> Result<Change> {
        let _guard = self.pair_guard.lock();
        self.require_group(participant)?;

        let removed = self.redirects.take(participant, document_type)?;
        match self
            .service_information
            .upsert_endpoint(participant, document_type, process_id, endpoint)
        {
            Ok(change) => Ok(self.replaced_redirect(removed, change)),
            Err(e) => {
                self.redirects.restore(removed.into_iter().collect());
                Err(e)
            }
        }
    }

    /// Create or update the redirect of a registered participant
    ///
    /// Service information for the same document type is removed first and
    /// put back if storing the redirect fails.
    pub fn create_or_update_redirect(
        &self,
        participant: &ParticipantId,
        document_type: &DocumentTypeId,
        target_href: &str,
        subject_unique_identifier: &str,
        certificate: Option<String>,
        extension: Option<String>,
    ) -> Result<Redirect> {
        let _guard = self.pair_guard.lock();
        self.require_group(participant)?;

        let removed = self.service_information.take(participant, document_type)?;
        if removed.is_some() {
            debug!(id = %participant, "Replacing service information by redirect");
        }
        match self.redirects.create_or_update(
            participant,
            document_type,
            target_href,
            subject_unique_identifier,
            certificate,
            extension,
        ) {
            Ok(redirect) => {
                if let Some(info) = &removed {
                    self.service_information
                        .notify_deleted(std::slice::from_ref(info));
                }
                Ok(redirect)
            }
            Err(e) => {
                self.service_information
                    .restore(removed.into_iter().collect());
                Err(e)
            }
        }
    }

    /// Delete a transport profile no endpoint references
    ///
    /// `Unchanged` if the profile is unknown.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if an endpoint still uses the profile.
    pub fn delete_transport_profile(&self, id: &str) -> Result<Change> {
        let _guard = self.pair_guard.lock();
        if self
            .service_information
            .contains_any_endpoint_with_transport_profile(id)
        {
            return Err(Error::validation(format!(
                "transport profile '{}' is still used by an endpoint",
                id
            )));
        }
        self.transport_profiles.delete(id)
    }

    /// Validate credentials and check that the user owns `participant`
    ///
    /// # Errors
    ///
    /// - `Error::Unauthorized` for bad credentials, a foreign owner, or if
    ///   no user directory is configured
    /// - `Error::NotFound` if the participant is not registered
    pub fn authorize(
        &self,
        credentials: &Credentials,
        participant: &ParticipantId,
    ) -> Result<ServiceGroup> {
        let users = self
            .users
            .as_ref()
            .ok_or_else(|| Error::Unauthorized("no user directory configured".to_string()))?;
        let user = users.validate_credentials(credentials)?;
        self.service_groups.verify_ownership(participant, &user)
    }

    /// Bring every store up to date (snapshot rewrite for the WAL backend)
    ///
    /// All stores are flushed; the first error is returned.
    pub fn flush(&self) -> Result<()> {
        let results = [
            self.service_groups.flush(),
            self.service_information.flush(),
            self.redirects.flush(),
            self.transport_profiles.flush(),
        ];
        results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }

    /// Report a redirect the exchange removed, once the write succeeded
    fn replaced_redirect(&self, removed: Option<Redirect>, change: Change) -> Change {
        match removed {
            Some(redirect) => {
                self.redirects
                    .notify_deleted(std::slice::from_ref(&redirect));
                Change::Changed
            }
            None => change,
        }
    }

    fn require_group(&self, participant: &ParticipantId) -> Result<()> {
        if self.service_groups.contains(participant) {
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "service group '{}'",
                participant.uri()
            )))
        }
    }
}
