//! Manager callbacks
//!
//! Each manager owns a [`CallbackList`] that observers can join at any
//! time. Callbacks run after a change is stored and after the manager's
//! lock is released, so they may read the managers freely. A change that
//! is rolled back as part of a larger failed operation is never reported.
//!
//! ```ignore
//! registry
//!     .service_information()
//!     .callbacks()
//!     .add(Arc::new(MyIndexer::new()));
//! ```

use parking_lot::RwLock;
use smp_core::{ParticipantId, Redirect, ServiceGroup, ServiceInformation};
use std::sync::Arc;

/// Observer of service group changes
pub trait ServiceGroupCallback: Send + Sync {
    /// A participant was registered
    fn on_service_group_created(&self, _group: &ServiceGroup) {}

    /// Owner or extension of a participant changed
    fn on_service_group_updated(&self, _participant: &ParticipantId) {}

    /// A participant was unregistered, after its cascade was reported
    fn on_service_group_deleted(&self, _participant: &ParticipantId) {}
}

/// Observer of service information changes
pub trait ServiceInformationCallback: Send + Sync {
    /// An entry was created
    fn on_service_information_created(&self, _info: &ServiceInformation) {}

    /// An entry changed; `info` is the stored state after the change
    fn on_service_information_updated(&self, _info: &ServiceInformation) {}

    /// An entry was removed; `info` is the last stored state
    fn on_service_information_deleted(&self, _info: &ServiceInformation) {}
}

/// Observer of redirect changes
pub trait RedirectCallback: Send + Sync {
    /// A redirect was created
    fn on_redirect_created(&self, _redirect: &Redirect) {}

    /// A redirect was overwritten
    fn on_redirect_updated(&self, _redirect: &Redirect) {}

    /// A redirect was removed
    fn on_redirect_deleted(&self, _redirect: &Redirect) {}
}

/// Ordered list of callbacks, safe to modify while notifications run
pub struct CallbackList<C: ?Sized> {
    callbacks: RwLock<Vec<Arc<C>>>,
}

impl<C: ?Sized> Default for CallbackList<C> {
    fn default() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
        }
    }
}

impl<C: ?Sized> CallbackList<C> {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback; the same callback may be added more than once
    pub fn add(&self, callback: Arc<C>) {
        self.callbacks.write().push(callback);
    }

    /// Remove every registration of `callback`
    ///
    /// Returns `true` if something was removed.
    pub fn remove(&self, callback: &Arc<C>) -> bool {
        let target = Arc::as_ptr(callback) as *const ();
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|c| Arc::as_ptr(c) as *const () != target);
        callbacks.len() != before
    }

    /// Remove all callbacks
    pub fn clear(&self) {
        self.callbacks.write().clear();
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// True if no callback is registered
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Call `f` for every callback, in registration order
    ///
    /// Works on a copy of the list, so `f` may add or remove callbacks.
    pub(crate) fn for_each(&self, f: impl Fn(&C)) {
        let callbacks = self.callbacks.read().clone();
        for callback in &callbacks {
            f(&**callback);
        }
    }
}
