//! Unified service bootstrap utilities
//!
//! Startup banner and logging initialization shared by gateway binaries.

use errors::{ServiceError, ServiceResult};
use tracing::info;

use crate::bootstrap_args::ServiceArgs;
use crate::logging::{self, LogConfig};

/// Service metadata for startup
pub struct ServiceInfo {
    /// Service name (e.g., "hpknx")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
}

impl ServiceInfo {
    /// Create new service info
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Print the startup banner through the logger
pub fn print_startup_banner(service: &ServiceInfo) {
    info!("");
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!("");
}

/// Initialize logging for a service from its command-line arguments
pub fn init_logging(args: &ServiceArgs, service: &ServiceInfo) -> ServiceResult<()> {
    let config = LogConfig {
        service_name: service.name.clone(),
        log_dir: args.log_dir.clone(),
        console_level: args.parse_log_level(),
        enable_json: args.json_log,
        ansi: !args.no_color,
    };

    logging::init_with_config(config).map_err(|e| ServiceError::Logging(e.to_string()))
}
