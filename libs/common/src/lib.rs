//! Shared service plumbing for the heat pump KNX gateway
//!
//! Provides functions shared by all gateway binaries:
//! - logging initialization
//! - command-line base arguments and startup banner
//! - configuration deserialization helpers
//! - graceful shutdown signal handling

pub mod bootstrap_args;
pub mod logging;
pub mod serde_helpers;
pub mod service_bootstrap;
pub mod shutdown;

pub use bootstrap_args::ServiceArgs;
pub use service_bootstrap::ServiceInfo;
pub use shutdown::{wait_for_shutdown, ShutdownSignal};
