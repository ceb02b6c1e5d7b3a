use thiserror::Error;

/// Errors raised by the metrics system and its storage.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// A volume read or write failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The volume could not be mounted.
    #[error("Filesystem mount failed: {0}")]
    Mount(String),

    /// Persisted bytes failed to decode or disagree with each other.
    #[error("Corrupt persisted data: {reason}")]
    Corrupt {
        /// What failed to decode or cross-check.
        reason: String,
    },

    /// A persisted file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Host I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog document (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary encoding failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// `begin` has not succeeded yet.
    #[error("Metrics system is not initialized")]
    NotInitialized,
}

/// Result type alias for metrics operations
pub type Result<T> = std::result::Result<T, MetricsError>;

impl From<bincode::Error> for MetricsError {
    fn from(err: bincode::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl MetricsError {
    /// Creates a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new corruption error
    pub fn corrupt<S: Into<String>>(reason: S) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    /// Returns true if resetting the persisted state can clear this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Corrupt { .. } | Self::NotFound(_) => true,
            Self::Serialization(_) | Self::Encoding(_) => true,
            _ => false,
        }
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Storage(_) | Self::Mount(_) => "storage",
            Self::Config(_) => "config",
            Self::Corrupt { .. } => "corrupt",
            Self::NotFound(_) => "not_found",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Encoding(_) => "serialization",
            Self::NotInitialized => "lifecycle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = MetricsError::storage("flash busy");
        assert_eq!(err.to_string(), "Storage error: flash busy");
        assert_eq!(err.category(), "storage");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(MetricsError::corrupt("bad magic").is_recoverable());
        assert!(MetricsError::NotFound("/boot_metrics.bin".into()).is_recoverable());
        assert!(!MetricsError::config("invalid config").is_recoverable());
        assert!(!MetricsError::Mount("no volume".into()).is_recoverable());
    }

    #[test]
    fn test_corrupt_error_message() {
        let err = MetricsError::corrupt("crc mismatch in record 3");
        assert_eq!(err.to_string(), "Corrupt persisted data: crc mismatch in record 3");
        assert_eq!(err.category(), "corrupt");
    }

    #[test]
    fn test_bincode_error_conversion() {
        let bytes = [0xffu8; 2];
        let err: MetricsError = bincode::deserialize::<String>(&bytes).unwrap_err().into();
        assert_eq!(err.category(), "serialization");
    }
}
