//! Cache Module
//!
//! Bounded in-memory LRU tier that can stand alone or sit in front of any
//! other store:
//! - Read-through: misses are fulfilled by the backend and promoted
//! - Write-back: evicted entries are handed to the backend asynchronously

pub mod lru;
pub mod recency;
pub mod stats;

pub use lru::LruCache;
pub use recency::RecencyIndex;
pub use stats::CacheStats;
