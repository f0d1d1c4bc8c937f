//! In-memory cache with TTL expiration
//!
//! Provides a string-keyed cache whose entries expire a fixed time after
//! they were stored. Expired entries are dropped lazily on access; there is
//! no background sweeper. Hit and miss counters survive `clear()` so the
//! statistics describe the whole lifetime of the cache.

mod cache;
mod types;

pub use cache::{fingerprint, TtlCache};
pub use types::{CacheEntry, CacheStats};
