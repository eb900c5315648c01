//! Selector resolution with memoization and argument decoding.

use chaindecode_codec::calldata::{decode_arguments, function_name, selector};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CachedSignature, MemorySignatureCache, SignatureCache};
use crate::lookup::SignatureLookup;

/// A resolved function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCall {
    /// e.g. `transfer`
    pub name: String,
    /// e.g. `transfer(address,uint256)`
    pub signature: String,
    /// Decoded arguments; `None` when the call data does not match the signature.
    pub args: Option<serde_json::Value>,
}

/// Snapshot of resolver counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub lookups_failed: u64,
}

/// Resolves call data to a function signature via a cached external lookup.
pub struct SignatureResolver {
    lookup: Arc<dyn SignatureLookup>,
    cache: Arc<dyn SignatureCache>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    lookups_failed: AtomicU64,
}

impl SignatureResolver {
    /// Resolver with a process-lifetime memory cache.
    pub fn new(lookup: Arc<dyn SignatureLookup>) -> Self {
        Self::with_cache(lookup, Arc::new(MemorySignatureCache::new()))
    }

    pub fn with_cache(lookup: Arc<dyn SignatureLookup>, cache: Arc<dyn SignatureCache>) -> Self {
        Self {
            lookup,
            cache,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            lookups_failed: AtomicU64::new(0),
        }
    }

    /// Resolve `calldata` (selector included).
    ///
    /// Returns `None` for call data shorter than 4 bytes and for unknown
    /// selectors. A known signature whose arguments fail to decode still
    /// resolves, with `args = None`.
    pub async fn resolve(&self, calldata: &[u8]) -> Option<ResolvedCall> {
        let sel = selector(calldata)?;
        let signature = self.signature_for(sel).await?;

        let args = match decode_arguments(&signature, calldata) {
            Ok(args) => Some(args),
            Err(e) => {
                debug!(signature = %signature, error = %e, "argument decode failed");
                None
            }
        };

        Some(ResolvedCall {
            name: function_name(&signature).to_string(),
            signature,
            args,
        })
    }

    /// The signature for a selector, consulting the cache first.
    pub async fn signature_for(&self, selector: [u8; 4]) -> Option<String> {
        if let Some(cached) = self.cache.get(selector) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return cached.signature().map(str::to_string);
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let entry = match self.lookup.lookup(selector).await {
            Ok(Some(sig)) => CachedSignature::Known(sig),
            Ok(None) => CachedSignature::Unknown,
            Err(e) => {
                self.lookups_failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    selector = %format!("0x{}", hex::encode(selector)),
                    error = %e,
                    "signature lookup failed"
                );
                CachedSignature::Unknown
            }
        };

        let sig = entry.signature().map(str::to_string);
        self.cache.insert(selector, entry);
        sig
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            lookups_failed: self.lookups_failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::lookup::StaticLookup;
    use async_trait::async_trait;

    const TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

    /// Counts calls and fails every one of them.
    #[derive(Default)]
    struct FailingLookup {
        calls: AtomicU64,
    }

    #[async_trait]
    impl SignatureLookup for FailingLookup {
        async fn lookup(&self, _selector: [u8; 4]) -> Result<Option<String>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LookupError::Timeout { ms: 5 })
        }
    }

    fn transfer_calldata() -> Vec<u8> {
        let mut data = TRANSFER.to_vec();
        data.extend([0u8; 12]);
        data.extend([0xbb; 20]);
        let mut amount = [0u8; 32];
        amount[31] = 10;
        data.extend(amount);
        data
    }

    #[tokio::test]
    async fn resolves_and_decodes_transfer() {
        let lookup = StaticLookup::new().with(TRANSFER, "transfer(address,uint256)");
        let resolver = SignatureResolver::new(Arc::new(lookup));

        let call = resolver.resolve(&transfer_calldata()).await.unwrap();
        assert_eq!(call.name, "transfer");
        assert_eq!(call.signature, "transfer(address,uint256)");
        let args = call.args.unwrap();
        let obj = args.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["arg1"], "10");
    }

    #[tokio::test]
    async fn bad_arguments_keep_the_name() {
        let lookup = StaticLookup::new().with(TRANSFER, "transfer(address,uint256)");
        let resolver = SignatureResolver::new(Arc::new(lookup));

        let call = resolver.resolve(&TRANSFER).await.unwrap();
        assert_eq!(call.name, "transfer");
        assert!(call.args.is_none());
    }

    #[tokio::test]
    async fn short_calldata_is_unresolved() {
        let resolver = SignatureResolver::new(Arc::new(StaticLookup::new()));
        assert!(resolver.resolve(&[0xa9, 0x05]).await.is_none());
        assert!(resolver.resolve(&[]).await.is_none());
        assert_eq!(resolver.stats(), ResolverStats::default());
    }

    #[tokio::test]
    async fn failures_are_cached() {
        let lookup = Arc::new(FailingLookup::default());
        let resolver = SignatureResolver::new(lookup.clone());

        assert!(resolver.resolve(&transfer_calldata()).await.is_none());
        assert!(resolver.resolve(&transfer_calldata()).await.is_none());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);

        let stats = resolver.stats();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.lookups_failed, 1);
    }

    #[tokio::test]
    async fn hits_skip_the_lookup() {
        let cache = Arc::new(MemorySignatureCache::new());
        cache.insert(TRANSFER, CachedSignature::Known("transfer(address,uint256)".into()));
        let lookup = Arc::new(FailingLookup::default());
        let resolver = SignatureResolver::with_cache(lookup.clone(), cache);

        let call = resolver.resolve(&transfer_calldata()).await.unwrap();
        assert_eq!(call.name, "transfer");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }
}
