use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Local view of which sessions the current user already counts as present in.
///
/// Only moves forward: once a session reads `true` nothing in this process
/// sets it back. Mutation is reserved for the reconciler.
#[derive(Debug, Clone, Default)]
pub struct PresenceRecord {
    inner: Arc<RwLock<HashMap<String, bool>>>,
}

impl PresenceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_attended(&self, session_id: &str) -> bool {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(session_id).copied().unwrap_or(false)
    }

    pub fn snapshot(&self) -> HashMap<String, bool> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records a confirmed mark. Returns `true` if the entry changed.
    pub(crate) fn mark_present(&self, session_id: &str) -> bool {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        !map.insert(session_id.to_owned(), true).unwrap_or(false)
    }

    /// Merges an answer from the issuer. `false` never overwrites `true`.
    pub(crate) fn merge(&self, session_id: &str, attended: bool) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(session_id.to_owned()).or_insert(false);
        *entry |= attended;
    }
}
