//! ID-keyed entity map behind one reader/writer lock, written through to a
//! durable store
//!
//! Writers hold the write guard across `DurableStore::apply`, so readers
//! never see a change the store has not accepted. The map is only touched
//! after `apply` succeeded.

use crate::audit::AuditSink;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use smp_core::{Entity, Error, Result};
use smp_durability::{ActionType, DurableStore, Mutation};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

pub(crate) type EntityMap<E> = BTreeMap<String, E>;

pub(crate) struct Collection<E: Entity> {
    entities: RwLock<EntityMap<E>>,
    store: Arc<dyn DurableStore<E>>,
    audit: Arc<dyn AuditSink>,
}

impl<E: Entity> Collection<E> {
    /// Load every entity from `store`
    pub(crate) fn load(store: Arc<dyn DurableStore<E>>, audit: Arc<dyn AuditSink>) -> Result<Self> {
        let entities: EntityMap<E> = store
            .load_all()?
            .into_iter()
            .map(|e| (e.id(), e))
            .collect();
        info!(
            kind = %E::KIND,
            backend = store.backend_name(),
            count = entities.len(),
            "Collection loaded"
        );
        Ok(Self {
            entities: RwLock::new(entities),
            store,
            audit,
        })
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, EntityMap<E>> {
        self.entities.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, EntityMap<E>> {
        self.entities.write()
    }

    /// Persist `mutation`, then apply it to `map`
    pub(crate) fn commit(&self, map: &mut EntityMap<E>, mutation: Mutation<E>) -> Result<()> {
        let id = mutation.id();
        let action = mutation.action();
        match self.store.apply(&mutation) {
            Ok(()) => {
                mutation.replay_into(map);
                self.audit.on_success(E::KIND, action, &id);
                Ok(())
            }
            Err(e) => {
                self.audit.on_failure(E::KIND, action, &id, &e);
                Err(e)
            }
        }
    }

    /// Report a mutation rejected before it reached the store
    pub(crate) fn reject(&self, action: ActionType, id: &str, err: Error) -> Error {
        self.audit.on_failure(E::KIND, action, id, &err);
        err
    }

    /// Delete every entity matching `pred`, returning the removed entities
    ///
    /// If one delete fails, the entities removed so far are restored and
    /// the error is returned.
    pub(crate) fn delete_where(
        &self,
        map: &mut EntityMap<E>,
        pred: impl Fn(&E) -> bool,
    ) -> Result<Vec<E>> {
        let doomed: Vec<E> = map.values().filter(|e| pred(e)).cloned().collect();
        let mut removed = Vec::with_capacity(doomed.len());
        for entity in doomed {
            if let Err(e) = self.commit(map, Mutation::Delete(entity.id())) {
                self.restore(map, removed);
                return Err(e);
            }
            removed.push(entity);
        }
        Ok(removed)
    }

    /// Re-create entities removed by an operation that failed later on
    ///
    /// Best effort: failures are logged, not returned.
    pub(crate) fn restore(&self, map: &mut EntityMap<E>, entities: Vec<E>) {
        for entity in entities {
            let id = entity.id();
            if let Err(e) = self.commit(map, Mutation::Create(entity)) {
                error!(kind = %E::KIND, id = %id, error = %e, "Failed to restore entity");
            }
        }
    }

    pub(crate) fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    pub(crate) fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}
