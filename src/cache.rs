// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache of links the producer created in this process.
//!
//! Share links embed the decryption key, so entries live in memory only,
//! expire after a TTL and are wiped when evicted.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use zeroize::Zeroizing;

use crate::crypto::ContentKind;

/// Default number of links kept.
pub const DEFAULT_CAPACITY: usize = 32;

/// Default time-to-live of a cached link.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// A link produced by the creation flow.
#[derive(Clone, PartialEq, Eq)]
pub struct CreatedLink {
    pub secret_id: String,
    pub name: String,
    pub kind: ContentKind,
    pub created_at: DateTime<Utc>,
    link: Zeroizing<String>,
}

impl CreatedLink {
    pub fn new(
        secret_id: impl Into<String>,
        name: impl Into<String>,
        kind: ContentKind,
        link: impl Into<String>,
    ) -> Self {
        Self {
            secret_id: secret_id.into(),
            name: name.into(),
            kind,
            created_at: Utc::now(),
            link: Zeroizing::new(link.into()),
        }
    }

    /// Full share link, key fragment included.
    pub fn link(&self) -> &str {
        &self.link
    }
}

impl fmt::Debug for CreatedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedLink")
            .field("secret_id", &self.secret_id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

struct CacheEntry {
    link: CreatedLink,
    inserted_at: Instant,
}

/// In-process LRU cache keyed by secret id.
pub struct CreatedLinkCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for CreatedLinkCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl CreatedLinkCache {
    /// Create a new cache with the given capacity and TTL.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Cached link for `secret_id`, or `None` if absent or expired.
    pub fn get(&self, secret_id: &str) -> Option<CreatedLink> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(secret_id) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.link.clone());
            }
            cache.pop(secret_id);
        }
        None
    }

    pub fn put(&self, link: CreatedLink) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                link.secret_id.clone(),
                CacheEntry {
                    link,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn invalidate(&self, secret_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(secret_id);
        }
    }

    /// Unexpired links, most recently used first. Expired entries are
    /// dropped along the way.
    pub fn recent(&self) -> Vec<CreatedLink> {
        let Ok(mut cache) = self.cache.lock() else {
            return Vec::new();
        };
        let expired: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= self.ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            cache.pop(id);
        }
        cache.iter().map(|(_, entry)| entry.link.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
