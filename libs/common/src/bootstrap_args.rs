//! Common command-line arguments for gateway services
//!
//! Service binaries flatten [`ServiceArgs`] into their own clap parser.

use std::path::PathBuf;

use clap::Args;

/// Common service startup arguments
#[derive(Debug, Clone, Args)]
pub struct ServiceArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: String,

    /// Directory for daily-rolling log files (console only when omitted)
    #[arg(long, env = "HPKNX_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Write log files as JSON records
    #[arg(long)]
    pub json_log: bool,

    /// Disable colored output (useful for log files)
    #[arg(long)]
    pub no_color: bool,

    /// Only validate configuration without starting service
    #[arg(long)]
    pub validate: bool,
}

impl Default for ServiceArgs {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            json_log: false,
            no_color: false,
            validate: false,
        }
    }
}

impl ServiceArgs {
    /// Parse log level string to tracing::Level
    pub fn parse_log_level(&self) -> tracing::Level {
        crate::logging::parse_level(&self.log_level)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        matches!(self.log_level.as_str(), "debug" | "trace")
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        service: ServiceArgs,
    }

    #[test]
    fn test_default_args() {
        let args = ServiceArgs::default();
        assert_eq!(args.log_level, "info");
        assert!(!args.validate);
        assert!(!args.is_development());
    }

    #[test]
    fn test_flattened_parsing() {
        let cli = TestCli::try_parse_from(["svc", "-l", "debug", "--validate", "--no-color"])
            .unwrap();
        assert_eq!(cli.service.parse_log_level(), tracing::Level::DEBUG);
        assert!(cli.service.validate);
        assert!(cli.service.no_color);
        assert!(cli.service.is_development());
    }
}
