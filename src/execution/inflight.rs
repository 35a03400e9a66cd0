use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::gauge;

use crate::models::SignalKey;

/// Table of keys with an outstanding ExecutionRequest.
///
/// Acquiring a key returns an [`InFlightGuard`]; the key is released when
/// the guard drops, so every exit path of the executor frees it. Locking is
/// per shard of the underlying map, never global.
#[derive(Clone, Default)]
pub struct InFlightTable {
    keys: Arc<DashMap<SignalKey, DateTime<Utc>>>,
}

impl InFlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically mark `key` in flight. Returns `None` if it already is.
    pub fn try_acquire(&self, key: &SignalKey) -> Option<InFlightGuard> {
        match self.keys.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(Utc::now());
                gauge!("in_flight_requests").increment(1.0);
                Some(InFlightGuard {
                    keys: Arc::clone(&self.keys),
                    key: key.clone(),
                })
            }
        }
    }

    pub fn is_in_flight(&self, key: &SignalKey) -> bool {
        self.keys.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Ownership of one in-flight key. Dropping it releases the key.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<DashMap<SignalKey, DateTime<Utc>>>,
    key: SignalKey,
}

impl InFlightGuard {
    pub fn key(&self) -> &SignalKey {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.keys.remove(&self.key).is_some() {
            gauge!("in_flight_requests").decrement(1.0);
            tracing::debug!(key = %self.key, "In-flight key released");
        }
    }
}
