use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirStoreConfig {
    /// Root directory; every key lives below it
    pub root: PathBuf,
    #[serde(default)]
    pub fsync_mode: FsyncMode,
}

impl DirStoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fsync_mode: FsyncMode::default(),
        }
    }
}

impl Default for DirStoreConfig {
    fn default() -> Self {
        Self::new("./data/kv")
    }
}

/// When written files are synced to disk
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FsyncMode {
    /// Fsync every file before it replaces the previous value (safest, slowest)
    Always,
    /// Fsync the files touched since the last flush when flushing
    #[default]
    OnFlush,
    /// Never fsync (fastest, least safe)
    Never,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fsync_mode_names() {
        let mode: FsyncMode = serde_yaml::from_str("on_flush").unwrap();
        assert_eq!(mode, FsyncMode::OnFlush);
        let mode: FsyncMode = serde_yaml::from_str("always").unwrap();
        assert_eq!(mode, FsyncMode::Always);
    }

    #[test]
    fn test_config_defaults_fsync_mode() {
        let config: DirStoreConfig = serde_yaml::from_str("root: /tmp/kv").unwrap();
        assert_eq!(config.root, PathBuf::from("/tmp/kv"));
        assert_eq!(config.fsync_mode, FsyncMode::OnFlush);
    }
}
