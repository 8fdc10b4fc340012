//! In-process cache with TTL expiry, tag-based invalidation, and a
//! fetch-wrapping helper for composing caching at call sites.

mod store;
mod wrapper;

pub use store::{Cache, CacheStats, DEFAULT_TTL};
pub use wrapper::{with_cache, CacheKey, Cached};
