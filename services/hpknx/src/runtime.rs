//! Runtime orchestration layer
//!
//! Wires the registry, publisher and telegram dispatcher to the heat pump
//! and bus clients for the lifetime of the service.

pub mod lifecycle;

pub use lifecycle::run_gateway;
