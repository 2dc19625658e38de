use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::cache::LruCache;
use crate::core::{KvError, Result, Store};
use crate::persistence::{DirStore, DirStoreConfig};

/// Top-level configuration of a store stack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KvConfig {
    #[serde(default)]
    pub store: DirStoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl KvConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: KvConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.root.as_os_str().is_empty() {
            return Err(KvError::InvalidConfig("store.root must not be empty".into()));
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(KvError::InvalidConfig(
                "cache.capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Build the store stack: the directory store, fronted by an LRU cache
    /// when the cache is enabled
    ///
    /// Must be called from within a tokio runtime.
    pub fn open_store(&self) -> Result<Arc<dyn Store>> {
        self.validate()?;

        let dir = DirStore::open(self.store.clone())?;
        if !self.cache.enabled {
            info!("Cache disabled, using directory store directly");
            return Ok(Arc::new(dir));
        }

        let cache = LruCache::with_backend(self.cache.capacity, Arc::new(dir))?;
        Ok(Arc::new(cache))
    }
}
