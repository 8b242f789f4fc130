//! Durable Store Contract
//!
//! Every manager persists its entities through a [`DurableStore`]. A store
//! is loaded once at startup and then receives one [`Mutation`] per write.
//! `apply` must be atomic and durable before it returns `Ok`: a caller that
//! sees success may update its in-memory view, a caller that sees an error
//! must leave it untouched.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smp_core::{Entity, Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Kind of change carried by a [`Mutation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// Insert a new entity
    Create,
    /// Replace an existing entity
    Update,
    /// Remove an entity by ID
    Delete,
}

impl ActionType {
    /// Tag byte used in the WAL frame
    pub fn to_byte(&self) -> u8 {
        match self {
            ActionType::Create => 1,
            ActionType::Update => 2,
            ActionType::Delete => 3,
        }
    }

    /// Parse a WAL frame tag byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(ActionType::Create),
            2 => Some(ActionType::Update),
            3 => Some(ActionType::Delete),
            _ => None,
        }
    }

    /// Lowercase name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One change to apply to a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "E: Entity")]
pub enum Mutation<E> {
    /// Insert a new entity
    Create(E),
    /// Replace the entity with the same ID
    Update(E),
    /// Remove the entity with this ID
    Delete(String),
}

impl<E: Entity> Mutation<E> {
    /// Action tag
    pub fn action(&self) -> ActionType {
        match self {
            Mutation::Create(_) => ActionType::Create,
            Mutation::Update(_) => ActionType::Update,
            Mutation::Delete(_) => ActionType::Delete,
        }
    }

    /// ID of the affected entity
    pub fn id(&self) -> String {
        match self {
            Mutation::Create(e) | Mutation::Update(e) => e.id(),
            Mutation::Delete(id) => id.clone(),
        }
    }

    /// Check the mutation against the current contents
    ///
    /// Create requires the ID to be absent, Update and Delete require it
    /// to be present.
    pub fn check(&self, contains: impl FnOnce(&str) -> bool) -> Result<()> {
        let id = self.id();
        let exists = contains(&id);
        match self {
            Mutation::Create(_) if exists => Err(Error::Duplicate(format!(
                "{} '{}' already exists",
                E::KIND,
                id
            ))),
            Mutation::Update(_) | Mutation::Delete(_) if !exists => Err(Error::NotFound(
                format!("{} '{}' does not exist", E::KIND, id),
            )),
            _ => Ok(()),
        }
    }

    /// Apply to an ID-keyed map without checks (upsert / remove-if-present)
    ///
    /// Used for replay, where records may be seen twice.
    pub fn replay_into(&self, map: &mut BTreeMap<String, E>) {
        match self {
            Mutation::Create(e) | Mutation::Update(e) => {
                map.insert(e.id(), e.clone());
            }
            Mutation::Delete(id) => {
                map.remove(id);
            }
        }
    }
}

/// Persistence backend for one entity collection
pub trait DurableStore<E: Entity>: Send + Sync {
    /// Load every stored entity; called once at startup
    fn load_all(&self) -> Result<Vec<E>>;

    /// Atomically and durably apply one mutation
    fn apply(&self, mutation: &Mutation<E>) -> Result<()>;

    /// Point lookup
    fn get(&self, id: &str) -> Result<Option<E>>;

    /// Bring persisted state up to date (snapshot for the WAL store)
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// How often [`sync_if_overdue`](Self::sync_if_overdue) should be
    /// polled; `None` if `apply` is already durable on return
    fn sync_interval(&self) -> Option<Duration> {
        None
    }

    /// Fsync writes older than the sync interval; `true` if a sync ran
    fn sync_if_overdue(&self) -> Result<bool> {
        Ok(false)
    }

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Volatile store; all data is lost on drop
///
/// Used by ephemeral registries and tests.
pub struct MemoryStore<E> {
    entities: RwLock<BTreeMap<String, E>>,
}

impl<E: Entity> MemoryStore<E> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store pre-populated with `entities`
    pub fn with_entities(entities: impl IntoIterator<Item = E>) -> Self {
        let map = entities.into_iter().map(|e| (e.id(), e)).collect();
        Self {
            entities: RwLock::new(map),
        }
    }

    /// Number of stored entities
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

impl<E: Entity> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> DurableStore<E> for MemoryStore<E> {
    fn load_all(&self) -> Result<Vec<E>> {
        Ok(self.entities.read().values().cloned().collect())
    }

    fn apply(&self, mutation: &Mutation<E>) -> Result<()> {
        let mut entities = self.entities.write();
        mutation.check(|id| entities.contains_key(id))?;
        mutation.replay_into(&mut entities);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<E>> {
        Ok(self.entities.read().get(id).cloned())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
