use std::path::PathBuf;
use thiserror::Error;

/// Errors from identity hashing and snapshot persistence.
#[derive(Debug, Error)]
pub enum ChangesError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot {} is unreadable: {reason}", path.display())]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("no free run index in {}", .0.display())]
    RunIndexExhausted(PathBuf),
}

pub type Result<T> = std::result::Result<T, ChangesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChangesError::CorruptSnapshot {
            path: PathBuf::from("/tmp/run-00000001.json"),
            reason: "expected value".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "snapshot /tmp/run-00000001.json is unreadable: expected value"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ChangesError = io.into();
        assert!(matches!(err, ChangesError::Io(_)));
    }
}
