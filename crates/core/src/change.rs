//! Outcome of a mutating operation

use serde::{Deserialize, Serialize};

/// Whether an operation modified state
///
/// Returned by every manager mutation. `Unchanged` is a normal outcome,
/// not an error: deleting something that is not there, or merging a payload
/// identical to the stored one, both report `Unchanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Change {
    /// State was modified
    Changed,
    /// State was left as it was
    Unchanged,
}

impl Change {
    /// `Changed` if `changed` is true
    #[inline]
    pub fn from_bool(changed: bool) -> Self {
        if changed {
            Change::Changed
        } else {
            Change::Unchanged
        }
    }

    /// True for `Changed`
    #[inline]
    pub fn is_changed(self) -> bool {
        matches!(self, Change::Changed)
    }

    /// True for `Unchanged`
    #[inline]
    pub fn is_unchanged(self) -> bool {
        matches!(self, Change::Unchanged)
    }

    /// Combine two outcomes: changed if either one is
    #[inline]
    pub fn or(self, other: Change) -> Change {
        Change::from_bool(self.is_changed() || other.is_changed())
    }
}

impl From<bool> for Change {
    fn from(changed: bool) -> Self {
        Change::from_bool(changed)
    }
}
