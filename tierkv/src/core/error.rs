use thiserror::Error;

/// Main error type for tierkv operations
#[derive(Debug, Error)]
pub enum KvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("Write task aborted before reporting completion")]
    TaskAborted,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl KvError {
    /// True for the "key does not exist" outcome of a delete
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound(_))
    }
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for KvError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for KvError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}

/// Result type alias for tierkv operations
pub type Result<T> = std::result::Result<T, KvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: KvError = io.into();
        assert!(matches!(err, KvError::Io(_)));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(KvError::KeyNotFound("foo".into()).is_not_found());
        assert!(!KvError::TaskAborted.is_not_found());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: KvError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, KvError::Serialization(_)));
    }
}
