//! TTL response cache.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use tokio::time::Instant;

/// A stored response: body plus the first value of each header.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: Bytes,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl CachedResponse {
    /// Snapshot `headers`, keeping one value per name.
    pub fn new(body: Bytes, headers: &HeaderMap) -> Self {
        let headers = headers
            .keys()
            .filter_map(|name| headers.get(name).map(|v| (name.clone(), v.clone())))
            .collect();
        Self { body, headers }
    }

    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            map.insert(name.clone(), value.clone());
        }
        map
    }
}

#[derive(Debug)]
struct CacheEntry {
    response: CachedResponse,
    expires_at: Instant,
}

/// In-memory response cache keyed by `METHOD:URL`.
#[derive(Debug, Default)]
pub struct CacheManager {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.read().expect("cache lock poisoned");
        entries
            .get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.response.clone())
    }

    pub fn set(&self, key: impl Into<String>, response: CachedResponse, ttl: Duration) {
        let entry = CacheEntry {
            response,
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key.into(), entry);
    }

    /// Remove expired entries. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
