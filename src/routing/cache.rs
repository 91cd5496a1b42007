use std::time::Duration;

use moka::sync::Cache;

use crate::model::RouteResponse;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_CAPACITY: u64 = 1000;

/// Route responses keyed by request signature, valid for `ttl`.
///
/// Expired entries are never returned. Once more than `capacity` entries are
/// held, the least useful ones are evicted.
#[derive(Clone)]
pub struct RouteCache {
    entries: Cache<String, RouteResponse>,
}

impl Default for RouteCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl RouteCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
        }
    }

    pub fn get(&self, key: &str) -> Option<RouteResponse> {
        self.entries.get(key)
    }

    pub fn put(&self, key: String, response: RouteResponse) {
        self.entries.insert(key, response);
    }

    /// Applies pending expirations and evictions.
    pub fn sweep(&self) {
        self.entries.run_pending_tasks();
        tracing::debug!(remaining = self.entries.entry_count(), "swept route cache");
    }

    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
