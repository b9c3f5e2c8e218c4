//! In-flight request registry keyed by client idempotency keys.
//!
//! A key is held from the moment its request is accepted until the guard
//! returned by [`InFlightRegistry::try_acquire`] is dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Keys of requests currently being processed.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    entries: Arc<DashMap<String, DateTime<Utc>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `None` (with the holder's start time logged) if
    /// another request already holds it.
    pub fn try_acquire(&self, key: &str) -> Option<InFlightGuard> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                tracing::debug!(
                    key = %key,
                    since = %existing.get().to_rfc3339(),
                    "Idempotency key already in flight"
                );
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Some(InFlightGuard {
                    key: key.to_string(),
                    entries: Arc::clone(&self.entries),
                })
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    key: String,
    entries: Arc<DashMap<String, DateTime<Utc>>>,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.entries.remove(&self.key);
    }
}
