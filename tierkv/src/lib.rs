//! Pluggable key-value stores
//!
//! Two tiers share one [`Store`] contract:
//! - [`DirStore`]: one file per key below a root directory, asynchronous writes
//! - [`LruCache`]: bounded in-memory cache with read-through and write-back to
//!   an optional backend store
//!
//! Values implement [`Item`]; raw bytes, JSON and MessagePack adapters are
//! provided.

pub mod cache;
pub mod config;
pub mod core;
pub mod persistence;

// Re-export commonly used types
pub use cache::{CacheStats, LruCache};
pub use config::KvConfig;
pub use self::core::{
    Completion, Item, JsonItem, KvError, MsgPackItem, RawItem, Result, SharedItem, Store,
    StoreExt, transfer,
};
pub use persistence::{DirStore, DirStoreConfig, FsyncMode};
