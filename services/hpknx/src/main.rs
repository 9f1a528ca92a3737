//! Heat pump KNX gateway service

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use common::service_bootstrap::{self, ServiceInfo};
use common::wait_for_shutdown;
use errors::ServiceResult;
use hpknx::core::bootstrap::{self, Args};
use hpknx::core::config::GatewayConfig;
use hpknx::core::virt::{LoopbackBus, VirtualHeatPump};
use hpknx::runtime::run_gateway;

#[tokio::main]
async fn main() -> ServiceResult<()> {
    let args = Args::parse();

    let service_info = ServiceInfo::new(
        "hpknx",
        env!("CARGO_PKG_VERSION"),
        "Heat pump KNX gateway",
    );
    service_bootstrap::init_logging(&args.service, &service_info)?;
    if !args.service.no_color {
        service_bootstrap::print_startup_banner(&service_info);
    }

    let config = GatewayConfig::load(&args.config_file)?;
    info!("Configuration loaded from {}", args.config_file.display());

    // no serial or KNXnet/IP transport is linked into this binary
    let heat_pump = Arc::new(VirtualHeatPump::from_config(&config));
    let bus = Arc::new(LoopbackBus::new());

    if args.service.validate {
        bootstrap::validate_configuration(&config, heat_pump, bus)?;
        info!("Validation completed successfully");
        return Ok(());
    }

    warn!("Running against the virtual heat pump and loopback bus");
    let signal = run_gateway(&config, heat_pump, bus, wait_for_shutdown()).await?;
    info!("Service shutdown complete ({:?})", signal);
    Ok(())
}
