//! Selector → signature memoization.
//!
//! The cache is an injectable interface so tests can substitute a
//! deterministic stub. Failed lookups are cached as [`CachedSignature::Unknown`]
//! so a selector is looked up at most once per entry lifetime.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// A cached lookup outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedSignature {
    /// The service returned this signature.
    Known(String),
    /// The service had no match, or the lookup failed.
    Unknown,
}

impl CachedSignature {
    pub fn signature(&self) -> Option<&str> {
        match self {
            Self::Known(s) => Some(s),
            Self::Unknown => None,
        }
    }
}

/// Storage for resolved selectors.
pub trait SignatureCache: Send + Sync {
    /// A live entry for `selector`, if any.
    fn get(&self, selector: [u8; 4]) -> Option<CachedSignature>;

    /// Record the outcome for `selector`.
    fn insert(&self, selector: [u8; 4], entry: CachedSignature);

    /// Number of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Entry {
    value: CachedSignature,
    inserted_at: Instant,
}

/// Process-local cache with an optional TTL.
///
/// Without a TTL, entries live for the lifetime of the process; nothing is
/// persisted, so a restart retries every previously failed selector.
#[derive(Default)]
pub struct MemorySignatureCache {
    entries: RwLock<HashMap<[u8; 4], Entry>>,
    ttl: Option<Duration>,
}

impl MemorySignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire entries `ttl` after insertion.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    fn is_live(&self, entry: &Entry) -> bool {
        self.ttl
            .map_or(true, |ttl| entry.inserted_at.elapsed() < ttl)
    }
}

impl SignatureCache for MemorySignatureCache {
    fn get(&self, selector: [u8; 4]) -> Option<CachedSignature> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&selector)
            .filter(|e| self.is_live(e))
            .map(|e| e.value.clone())
    }

    fn insert(&self, selector: [u8; 4], entry: CachedSignature) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if self.ttl.is_some() {
            entries.retain(|_, e| self.is_live(e));
        }
        entries.insert(
            selector,
            Entry {
                value: entry,
                inserted_at: Instant::now(),
            },
        );
    }

    fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|e| self.is_live(e)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

    #[test]
    fn stores_known_and_unknown() {
        let cache = MemorySignatureCache::new();
        assert!(cache.is_empty());
        cache.insert(TRANSFER, CachedSignature::Known("transfer(address,uint256)".into()));
        cache.insert([0, 0, 0, 1], CachedSignature::Unknown);

        assert_eq!(
            cache.get(TRANSFER).unwrap().signature(),
            Some("transfer(address,uint256)")
        );
        assert_eq!(cache.get([0, 0, 0, 1]), Some(CachedSignature::Unknown));
        assert_eq!(cache.get([9, 9, 9, 9]), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn ttl_expires_entries() {
        let cache = MemorySignatureCache::with_ttl(Duration::from_millis(20));
        cache.insert(TRANSFER, CachedSignature::Unknown);
        assert!(cache.get(TRANSFER).is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get(TRANSFER).is_none());
        assert_eq!(cache.len(), 0);
    }
}
