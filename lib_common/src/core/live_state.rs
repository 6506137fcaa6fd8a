//! # Live Match Set and Lookup
//!
//! `LiveState` holds the most recently fetched match list behind an
//! atomically swapped `Arc`. The poll loop is the only writer and replaces the
//! whole list at once; readers clone the `Arc` and keep a consistent view for
//! as long as they hold it, even if a new list is swapped in meanwhile.
//!
//! `MatchLookup` answers point queries: the live set first, then the snapshot
//! cache, so a match that left the live set stays visible until its TTL ends.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tokio::time::Instant;

use crate::core::snapshot_cache::SnapshotCache;
use crate::errors::LookupError;

/// The current list of live match records.
#[derive(Default)]
pub struct LiveState {
    matches: RwLock<Arc<Vec<Value>>>,
}

impl LiveState {
    /// Creates an empty live set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the current live set.
    pub fn snapshot(&self) -> Arc<Vec<Value>> {
        Arc::clone(&self.matches.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the live set wholesale and returns the new snapshot.
    ///
    /// Records missing from `matches` are dropped from live state.
    pub fn replace(&self, matches: Vec<Value>) -> Arc<Vec<Value>> {
        let next = Arc::new(matches);
        let mut guard = self.matches.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&next);
        next
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// True when there are no live records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The `match_id` of a record, when it is a string.
pub fn match_id_of(record: &Value) -> Option<&str> {
    record.get("match_id")?.as_str()
}

/// Two-tier point lookup over the live set and the snapshot cache.
#[derive(Clone)]
pub struct MatchLookup {
    live: Arc<LiveState>,
    cache: Arc<SnapshotCache>,
}

impl MatchLookup {
    /// Creates a lookup over the given live set and cache.
    pub fn new(live: Arc<LiveState>, cache: Arc<SnapshotCache>) -> Self {
        Self { live, cache }
    }

    /// Finds a match by id using the current time.
    pub fn lookup(&self, match_id: &str) -> Result<Value, LookupError> {
        self.lookup_at(match_id, Instant::now())
    }

    /// Finds a match by id, judging cache expiry against `now`.
    pub fn lookup_at(&self, match_id: &str, now: Instant) -> Result<Value, LookupError> {
        let live = self.live.snapshot();
        if let Some(record) = live.iter().find(|m| match_id_of(m) == Some(match_id)) {
            return Ok(record.clone());
        }

        match self.cache.get(match_id, now) {
            Some(record) => {
                log::info!("Match {} served from snapshot cache", match_id);
                Ok(record)
            }
            None => Err(LookupError::NotFound(match_id.to_string())),
        }
    }

    /// The whole live set.
    pub fn all_matches(&self) -> Arc<Vec<Value>> {
        self.live.snapshot()
    }
}
