use dashmap::DashMap;
use std::time::{Duration, Instant};
use crate::data::types::Coordinates;

/// Resolved coordinates keyed by normalized address text.
pub struct GeocodeCache {
    cache: DashMap<String, CachedCoordinates>,
    ttl: Duration,
}

struct CachedCoordinates {
    coords: Coordinates,
    timestamp: Instant,
}

impl GeocodeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
        }
    }

    pub fn insert(&self, address: &str, coords: Coordinates) {
        self.cache.insert(
            Self::key(address),
            CachedCoordinates {
                coords,
                timestamp: Instant::now(),
            },
        );
    }

    /// Get coordinates if not expired (evict on read)
    pub fn get(&self, address: &str) -> Option<Coordinates> {
        let key = Self::key(address);
        self.cache.get(&key).and_then(|entry| {
            if entry.timestamp.elapsed() > self.ttl {
                drop(entry); // Drop the read lock
                self.cache.remove(&key);
                None
            } else {
                Some(entry.coords)
            }
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn key(address: &str) -> String {
        address.trim().to_lowercase()
    }
}
