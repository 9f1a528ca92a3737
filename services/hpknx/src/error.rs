//! Error handling for the heat pump KNX gateway
//!
//! Configuration problems are fatal at startup. Heat pump and bus failures
//! are transient: callers log them and carry on with the next tick.

use errors::ServiceError;
use thiserror::Error;

use crate::core::address::GroupAddress;

/// Gateway error type
#[derive(Error, Debug, Clone)]
pub enum HpKnxError {
    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Two configuration entries claim the same group address
    #[error("Multiple use of the same KNX group address {address} ({first:?} and {second:?})")]
    DuplicateAddress {
        address: GroupAddress,
        first: String,
        second: String,
    },

    /// Malformed group or individual address
    #[error("Address error: {0}")]
    AddressError(String),

    /// Heat pump communication failure
    #[error("Heat pump error: {0}")]
    HeatPumpError(String),

    /// KNX bus communication failure
    #[error("Bus error: {0}")]
    BusError(String),

    /// Payload could not be converted into the data point's value kind
    #[error("Conversion error: {0}")]
    ConversionError(String),

    /// Operation did not finish in time
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Internal errors (task failures, closed channels)
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, HpKnxError>;

impl HpKnxError {
    pub fn config(msg: impl Into<String>) -> Self {
        HpKnxError::ConfigError(msg.into())
    }

    pub fn address(msg: impl Into<String>) -> Self {
        HpKnxError::AddressError(msg.into())
    }

    pub fn heat_pump(msg: impl Into<String>) -> Self {
        HpKnxError::HeatPumpError(msg.into())
    }

    pub fn bus(msg: impl Into<String>) -> Self {
        HpKnxError::BusError(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        HpKnxError::ConversionError(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        HpKnxError::TimeoutError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        HpKnxError::InternalError(msg.into())
    }

    /// Configuration-time errors terminate the process
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HpKnxError::ConfigError(_)
                | HpKnxError::DuplicateAddress { .. }
                | HpKnxError::AddressError(_)
        )
    }
}

impl From<figment::Error> for HpKnxError {
    fn from(err: figment::Error) -> Self {
        HpKnxError::ConfigError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for HpKnxError {
    fn from(err: tokio::task::JoinError) -> Self {
        HpKnxError::InternalError(format!("Task failed: {}", err))
    }
}

impl From<HpKnxError> for ServiceError {
    fn from(err: HpKnxError) -> Self {
        match err {
            HpKnxError::ConfigError(msg) | HpKnxError::AddressError(msg) => {
                ServiceError::Configuration(msg)
            },
            dup @ HpKnxError::DuplicateAddress { .. } => {
                ServiceError::Configuration(dup.to_string())
            },
            HpKnxError::HeatPumpError(msg) => ServiceError::ConnectionFailed {
                endpoint: "heat pump".to_string(),
                reason: msg,
            },
            HpKnxError::BusError(msg) => ServiceError::ConnectionFailed {
                endpoint: "knx".to_string(),
                reason: msg,
            },
            HpKnxError::TimeoutError(msg) => ServiceError::Timeout(msg),
            HpKnxError::ConversionError(msg) => ServiceError::Runtime(msg),
            HpKnxError::InternalError(msg) => ServiceError::Internal(msg),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_address_message() {
        let err = HpKnxError::DuplicateAddress {
            address: "1/2/3".parse().unwrap(),
            first: "Temp. Aussen".to_string(),
            second: "on_malfunction".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Multiple use of the same KNX group address 1/2/3 (\"Temp. Aussen\" and \"on_malfunction\")"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_transient_errors_are_not_fatal() {
        assert!(!HpKnxError::heat_pump("no answer").is_fatal());
        assert!(!HpKnxError::bus("tunnel down").is_fatal());
    }

    #[test]
    fn test_service_error_conversion() {
        let err: ServiceError = HpKnxError::config("bad").into();
        assert!(err.is_configuration());

        let err: ServiceError = HpKnxError::heat_pump("timeout").into();
        assert!(err.is_retryable());
    }
}
