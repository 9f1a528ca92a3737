//! Service bootstrap
//!
//! Command-line arguments and configuration validation mode.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use common::bootstrap_args::ServiceArgs;

use crate::core::clients::{BusClient, HeatPumpClient};
use crate::core::config::{GatewayConfig, DEFAULT_CONFIG_FILE};
use crate::core::registry::Registry;
use crate::error::Result;

/// Command-line arguments for hpknx
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hpknx",
    version = env!("CARGO_PKG_VERSION"),
    about = "Heat pump KNX gateway",
    long_about = None
)]
pub struct Args {
    /// Configuration file
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    #[command(flatten)]
    pub service: ServiceArgs,
}

/// Build the registry from `config` and log a summary
///
/// Catches duplicate group addresses, which plain configuration loading
/// does not.
pub fn validate_configuration(
    config: &GatewayConfig,
    heat_pump: Arc<dyn HeatPumpClient>,
    bus: Arc<dyn BusClient>,
) -> Result<Registry> {
    let registry = Registry::build(config, heat_pump, bus)?;

    info!(
        "Heat pump: {} @ {} baud",
        config.heat_pump.device, config.heat_pump.baudrate
    );
    info!(
        "KNX gateway: {}:{} (own address: {}, rate limit: {}/s)",
        config.knx.gateway_ip,
        config.knx.gateway_port,
        config.knx.own_address,
        config.knx.rate_limit
    );
    info!(
        "Update interval: {:?}, cyclic sending interval: {:?}",
        config.general.update_interval, config.general.cyclic_sending_interval
    );
    info!("Found {} data point(s)", config.data_points.len());
    for dp in registry.data_points() {
        info!("  {}", dp);
    }
    for notifier in registry.notifiers() {
        info!("  {}", notifier);
    }
    Ok(registry)
}
