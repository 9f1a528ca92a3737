//! Unified error handling for gateway services
//!
//! Service crates keep their own fine-grained error enums and convert into
//! [`ServiceError`] at the process boundary (`main`, bootstrap helpers).

use thiserror::Error;

// ============================================================================
// ServiceError - Main error type
// ============================================================================

/// Process-level error type shared by all gateway binaries
#[derive(Debug, Error)]
pub enum ServiceError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),

    // ======================================
    // Communication Errors
    // ======================================
    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Connection failed: {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    // ======================================
    // Service & Runtime Errors
    // ======================================
    #[error("Logging initialization failed: {0}")]
    Logging(String),

    #[error("Service startup failed: {0}")]
    StartupFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using ServiceError
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Stable machine-readable code for log correlation
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::Communication(_) => "COMMUNICATION_ERROR",
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::Logging(_) => "LOGGING_ERROR",
            Self::StartupFailed(_) => "STARTUP_FAILED",
            Self::Runtime(_) => "RUNTIME_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the failure came from configuration rather than the environment
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::InvalidConfig { .. } | Self::ConfigNotFound(_)
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::ConnectionFailed { .. } | Self::Communication(_)
        )
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::ServiceError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::ServiceError::Configuration(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_config_error_macro() {
        let err = config_error!("bad interval {}", 0);
        assert_eq!(err.to_string(), "Configuration error: bad interval 0");
        assert!(err.is_configuration());
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ServiceError::Timeout("heat pump".into()).is_retryable());
        assert!(ServiceError::ConnectionFailed {
            endpoint: "/dev/ttyUSB0".into(),
            reason: "busy".into(),
        }
        .is_retryable());
        assert!(!ServiceError::Configuration("x".into()).is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ServiceError = io.into();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert!(!err.is_configuration());
    }
}
