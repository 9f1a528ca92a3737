//! Shared fixtures for gateway integration tests

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::sync::Arc;

use hpknx::core::config::GatewayConfig;
use hpknx::core::virt::{LoopbackBus, VirtualHeatPump};
use hpknx::{GroupAddress, Value};

pub const GATEWAY_YAML: &str = r#"
general:
  update_interval: 30
  cyclic_sending_interval: 600
heat_pump:
  device: /dev/ttyUSB0
knx:
  gateway_ip: 192.168.1.10
data_points:
  "Temp. Aussen":
    value_type: temperature
    group_address: 1/2/1
    send_on_change: true
    on_change_of_absolute: 0.5
  "HKR Soll_Raum":
    value_type: temperature
    group_address: 1/2/2
    writable: true
    cyclic_sending: true
  "Verdichter":
    value_type: binary
    group_address: 1/2/3
    send_on_change: true
notifications:
  on_malfunction:
    group_address: 1/0/0
    repeat_after: 60
"#;

pub fn ga(s: &str) -> GroupAddress {
    s.parse().unwrap()
}

pub fn gateway_config() -> GatewayConfig {
    GatewayConfig::from_yaml(GATEWAY_YAML).unwrap()
}

/// Virtual heat pump with plausible values for every configured parameter
pub fn heat_pump() -> Arc<VirtualHeatPump> {
    let hp = Arc::new(VirtualHeatPump::new());
    hp.set_value("Temp. Aussen", Value::Numeric(12.5));
    hp.set_value("HKR Soll_Raum", Value::Numeric(20.0));
    hp.set_value("Verdichter", Value::Bool(true));
    hp.set_limits("HKR Soll_Raum", 10.0, 25.0);
    hp
}

pub fn bus() -> Arc<LoopbackBus> {
    Arc::new(LoopbackBus::new())
}
