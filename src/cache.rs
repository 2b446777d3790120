use std::{sync::Mutex, time::Duration};

use lru_time_cache::LruCache;

use crate::media::MediaResult;

/// Recently resolved posts, keyed by normalized source URL. Bounded in size
/// and expiring by age.
pub struct ResolutionCache {
  entries: Mutex<LruCache<String, MediaResult>>,
}

impl ResolutionCache {
  pub fn new(ttl: Duration, capacity: usize) -> Self {
    let entries = LruCache::with_expiry_duration_and_capacity(ttl, capacity);
    Self {
      entries: Mutex::new(entries),
    }
  }

  pub fn get(&self, key: &str) -> Option<MediaResult> {
    let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
    entries.get(key).cloned()
  }

  pub fn insert(&self, key: String, result: MediaResult) {
    let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
    entries.insert(key, result);
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
    entries.len()
  }
}
