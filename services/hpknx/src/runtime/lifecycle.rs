//! Gateway lifecycle

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::clients::{BusClient, HeatPumpClient};
use crate::core::config::GatewayConfig;
use crate::core::dispatch::TelegramDispatcher;
use crate::core::publisher::{Publisher, PublisherConfig};
use crate::core::registry::Registry;
use crate::error::Result;

/// Run the gateway until `shutdown` completes
///
/// 1. build the registry (configuration errors end here, before any I/O)
/// 2. connect and log in to the heat pump
/// 3. start the bus client and the telegram dispatcher
/// 4. run the publisher until `shutdown` resolves
/// 5. stop dispatcher and bus
///
/// The heat pump session is logged out and closed on every exit path once
/// the connection was attempted.
pub async fn run_gateway<S>(
    config: &GatewayConfig,
    heat_pump: Arc<dyn HeatPumpClient>,
    bus: Arc<dyn BusClient>,
    shutdown: S,
) -> Result<S::Output>
where
    S: Future,
{
    let registry = Arc::new(Registry::build(config, heat_pump.clone(), bus.clone())?);
    for dp in registry.data_points() {
        debug!("{}", dp);
    }
    for notifier in registry.notifiers() {
        debug!("{}", notifier);
    }

    let result = serve(config, registry, heat_pump.clone(), bus, shutdown).await;

    if let Err(e) = heat_pump.logout().await {
        warn!("Heat pump logout failed: {}", e);
    }
    if let Err(e) = heat_pump.close_connection().await {
        warn!("Failed to close heat pump connection: {}", e);
    }
    info!("Gateway stopped");
    result
}

async fn serve<S>(
    config: &GatewayConfig,
    registry: Arc<Registry>,
    heat_pump: Arc<dyn HeatPumpClient>,
    bus: Arc<dyn BusClient>,
    shutdown: S,
) -> Result<S::Output>
where
    S: Future,
{
    heat_pump.open_connection().await?;
    heat_pump.login().await?;
    let serial_number = heat_pump.serial_number().await?;
    info!(
        "Connected successfully to heat pump with serial number: {}",
        serial_number
    );
    let version = heat_pump.version().await?;
    info!("Software version: {}", version);

    bus.start().await?;
    info!(
        "Bus connection started ({}:{})",
        config.knx.gateway_ip, config.knx.gateway_port
    );
    let mut dispatcher = TelegramDispatcher::new(registry.clone());
    dispatcher.start(bus.subscribe());

    let mut publisher = Publisher::new(
        registry,
        heat_pump,
        PublisherConfig::from(&config.general),
    );
    let output = publisher.run_until(shutdown).await;

    dispatcher.stop().await;
    bus.stop().await?;
    Ok(output)
}
