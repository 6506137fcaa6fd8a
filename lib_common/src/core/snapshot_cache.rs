//! # Snapshot Cache
//!
//! Keeps the last known state of every match seen in the feed for a bounded
//! time after its last update. Matches that rotate out of the live set (for
//! example once they finish) stay queryable here until their TTL runs out.
//!
//! Expiry is enforced on read: `get` never returns an entry older than the TTL,
//! whether or not `sweep` has physically removed it yet. `sweep` only reclaims
//! memory.
//!
//! An entry is expired once `now - written_at > ttl`; an entry exactly `ttl`
//! old is still served.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// Default lifetime of a cached snapshot.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

struct CacheEntry {
    record: Value,
    written_at: Instant,
}

/// TTL-bounded store of the latest snapshot per match id.
pub struct SnapshotCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl SnapshotCache {
    /// Creates an empty cache whose entries live for `ttl` after their last write.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// The configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores `record` under `match_id`, replacing any previous snapshot and
    /// restarting its TTL from `now`.
    pub fn put(&self, match_id: &str, record: Value, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            match_id.to_string(),
            CacheEntry {
                record,
                written_at: now,
            },
        );
    }

    /// Returns a copy of the snapshot for `match_id` if it is younger than the TTL.
    pub fn get(&self, match_id: &str, now: Instant) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(match_id)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| entry.record.clone())
    }

    /// Removes every expired entry. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("Snapshot cache swept {} expired entries, {} remain", removed, entries.len());
        }
        removed
    }

    /// Number of entries physically held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.written_at) > self.ttl
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
