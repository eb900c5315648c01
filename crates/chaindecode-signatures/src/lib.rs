//! chaindecode-signatures: 4-byte selector resolution for the decode pipeline.
//!
//! Lookups are best-effort: failures, timeouts and misses all resolve to
//! "unknown" and are memoized so the same selector is not retried.
//!
//! # Usage
//! ```ignore
//! let client = FourByteClient::new(DEFAULT_LOOKUP_URL, Duration::from_secs(5))?;
//! let resolver = SignatureResolver::new(Arc::new(client));
//! if let Some(call) = resolver.resolve(&calldata).await {
//!     println!("{} {:?}", call.signature, call.args);
//! }
//! ```

pub mod cache;
pub mod error;
pub mod lookup;
pub mod resolver;

pub use cache::{CachedSignature, MemorySignatureCache, SignatureCache};
pub use error::LookupError;
pub use lookup::{FourByteClient, SignatureLookup, StaticLookup, DEFAULT_LOOKUP_URL};
pub use resolver::{ResolvedCall, ResolverStats, SignatureResolver};
