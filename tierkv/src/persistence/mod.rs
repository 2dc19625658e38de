//! Persistence module for the file-per-key directory store
//!
//! Provides durability for stored items through:
//! - One file per key below a root directory, replaced atomically on write
//! - Asynchronous writes with a completion signal per call
//! - Configurable fsync modes for different durability/performance tradeoffs

pub mod dir_store;
pub mod types;

pub use dir_store::DirStore;
pub use types::{DirStoreConfig, FsyncMode};
