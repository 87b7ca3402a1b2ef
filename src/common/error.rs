//! Common Error Types for StakeVault
//!
//! Root error type for binary startup and service wiring. The reconciler
//! modules carry their own thiserror enums; this type is the one surface the
//! binary reports through.

use thiserror::Error;

/// Root error type for StakeVault
#[derive(Debug, Error)]
pub enum StakeVaultError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),

    /// Service errors
    #[error("service error: {0}")]
    Service(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StakeVaultError {
    /// Create a service error
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(self, StakeVaultError::Io(_))
    }

    /// Get error code for reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            StakeVaultError::Config(_) => "CONFIG_ERROR",
            StakeVaultError::Logging(_) => "LOGGING_ERROR",
            StakeVaultError::Service(_) => "SERVICE_ERROR",
            StakeVaultError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using StakeVaultError
pub type Result<T> = std::result::Result<T, StakeVaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StakeVaultError::service("reconcile failed");
        assert!(err.to_string().contains("reconcile failed"));
        assert_eq!(err.error_code(), "SERVICE_ERROR");
    }

    #[test]
    fn test_startup_errors_convert() {
        let err: StakeVaultError =
            crate::config::ConfigError::InvalidValue("STAKEVAULT_API_PORT".into(), "x".into())
                .into();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let err: StakeVaultError =
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "bind failed").into();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(!StakeVaultError::service("bad state").is_retryable());
    }
}
