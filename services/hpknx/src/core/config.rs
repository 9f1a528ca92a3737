//! Gateway configuration
//!
//! Loaded from a YAML file merged with `HPKNX_` environment overrides
//! (`__` separates nesting levels, e.g. `HPKNX_KNX__GATEWAY_IP`), then
//! validated before anything else is started.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use common::serde_helpers::{
    deserialize_bool_flexible, deserialize_interval, deserialize_optional_interval,
};
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::address::{GroupAddress, IndividualAddress};
use crate::core::value::{ChangeRule, ValueKind};
use crate::error::{HpKnxError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "hpknx.yaml";
pub const ENV_PREFIX: &str = "HPKNX_";

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_CYCLIC_SENDING_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const SUPPORTED_BAUDRATES: [u32; 5] = [9_600, 19_200, 38_400, 57_600, 115_200];
pub const DEFAULT_GATEWAY_PORT: u16 = 3671;
pub const DEFAULT_AUTO_RECONNECT_WAIT: Duration = Duration::from_secs(3);
pub const DEFAULT_RATE_LIMIT: u8 = 10;
pub const MAX_RATE_LIMIT: u8 = 100;

/// Complete gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    pub heat_pump: HeatPumpConfig,
    pub knx: KnxConfig,
    /// Heat pump parameter name → data point
    #[serde(default)]
    pub data_points: BTreeMap<String, DataPointConfig>,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(
        default = "default_update_interval",
        deserialize_with = "deserialize_interval"
    )]
    pub update_interval: Duration,

    #[serde(
        default = "default_cyclic_sending_interval",
        deserialize_with = "deserialize_interval"
    )]
    pub cyclic_sending_interval: Duration,

    /// Upper bound for a single login/update/cyclic tick
    #[serde(default, deserialize_with = "deserialize_optional_interval")]
    pub tick_timeout: Option<Duration>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            cyclic_sending_interval: DEFAULT_CYCLIC_SENDING_INTERVAL,
            tick_timeout: None,
        }
    }
}

fn default_update_interval() -> Duration {
    DEFAULT_UPDATE_INTERVAL
}

fn default_cyclic_sending_interval() -> Duration {
    DEFAULT_CYCLIC_SENDING_INTERVAL
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeatPumpConfig {
    /// Serial device or `host:port` of a serial-over-TCP adapter
    pub device: String,
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
}

fn default_baudrate() -> u32 {
    DEFAULT_BAUDRATE
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnxConfig {
    pub gateway_ip: String,

    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,

    #[serde(default = "default_true", deserialize_with = "deserialize_bool_flexible")]
    pub auto_reconnect: bool,

    #[serde(
        default = "default_auto_reconnect_wait",
        deserialize_with = "deserialize_interval"
    )]
    pub auto_reconnect_wait: Duration,

    #[serde(default)]
    pub local_ip: Option<String>,

    #[serde(default)]
    pub own_address: IndividualAddress,

    /// Telegrams per second, 0 disables rate limiting
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u8,
}

fn default_gateway_port() -> u16 {
    DEFAULT_GATEWAY_PORT
}

fn default_true() -> bool {
    true
}

fn default_auto_reconnect_wait() -> Duration {
    DEFAULT_AUTO_RECONNECT_WAIT
}

fn default_rate_limit() -> u8 {
    DEFAULT_RATE_LIMIT
}

/// Data point entry, keyed by heat pump parameter name
#[derive(Debug, Clone, Deserialize)]
pub struct DataPointConfig {
    pub value_type: ValueKind,
    pub group_address: GroupAddress,

    #[serde(default, deserialize_with = "deserialize_bool_flexible")]
    pub writable: bool,

    #[serde(default, deserialize_with = "deserialize_bool_flexible")]
    pub cyclic_sending: bool,

    #[serde(default, deserialize_with = "deserialize_bool_flexible")]
    pub send_on_change: bool,

    #[serde(default)]
    pub on_change_of_absolute: Option<f64>,

    #[serde(default)]
    pub on_change_of_relative: Option<f64>,
}

impl DataPointConfig {
    /// Send-on-change policy, `None` when the point only sends cyclically or on request
    pub fn change_rule(&self) -> Option<ChangeRule> {
        if !self.send_on_change {
            return None;
        }
        match (self.on_change_of_absolute, self.on_change_of_relative) {
            (Some(t), _) => Some(ChangeRule::Absolute(t)),
            (None, Some(r)) => Some(ChangeRule::Relative(r)),
            (None, None) => Some(ChangeRule::Differs),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let has_threshold =
            self.on_change_of_absolute.is_some() || self.on_change_of_relative.is_some();

        if self.value_type.is_binary() {
            if has_threshold {
                return Err(HpKnxError::config(format!(
                    "data point '{}': on_change_of_absolute, on_change_of_relative not allowed for binary data point",
                    name
                )));
            }
            return Ok(());
        }

        if self.on_change_of_absolute.is_some() && self.on_change_of_relative.is_some() {
            return Err(HpKnxError::config(format!(
                "data point '{}': on_change_of_absolute and on_change_of_relative are mutually exclusive",
                name
            )));
        }
        for (key, threshold) in [
            ("on_change_of_absolute", self.on_change_of_absolute),
            ("on_change_of_relative", self.on_change_of_relative),
        ] {
            if let Some(t) = threshold {
                if !t.is_finite() || t <= 0.0 {
                    return Err(HpKnxError::config(format!(
                        "data point '{}': {} must be greater zero, got {}",
                        name, key, t
                    )));
                }
            }
        }

        if self.send_on_change && !has_threshold {
            return Err(HpKnxError::config(format!(
                "data point '{}': must contain at least one of on_change_of_absolute, on_change_of_relative",
                name
            )));
        }
        if !self.send_on_change && has_threshold {
            warn!(
                "{} is defined, but send_on_change is set to false for data point '{}'",
                if self.on_change_of_absolute.is_some() {
                    "on_change_of_absolute"
                } else {
                    "on_change_of_relative"
                },
                name
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub on_malfunction: Option<MalfunctionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MalfunctionConfig {
    pub group_address: GroupAddress,
    /// Re-announce a still active fault after this interval (`None` = never)
    #[serde(default, deserialize_with = "deserialize_optional_interval")]
    pub repeat_after: Option<Duration>,
}

impl GatewayConfig {
    /// Load and validate the configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(HpKnxError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        debug!("Loading configuration from {}", path.display());

        let config: GatewayConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GatewayConfig = Figment::new().merge(Yaml::string(yaml)).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check constraints serde cannot express
    ///
    /// Duplicate group addresses are detected when the registry is built.
    pub fn validate(&self) -> Result<()> {
        if self.heat_pump.device.trim().is_empty() {
            return Err(HpKnxError::config("heat_pump.device must not be empty"));
        }
        if !SUPPORTED_BAUDRATES.contains(&self.heat_pump.baudrate) {
            return Err(HpKnxError::config(format!(
                "heat_pump.baudrate must be one of {:?}, got {}",
                SUPPORTED_BAUDRATES, self.heat_pump.baudrate
            )));
        }

        if self.knx.gateway_ip.trim().is_empty() {
            return Err(HpKnxError::config("knx.gateway_ip must not be empty"));
        }
        if self.knx.gateway_port == 0 {
            return Err(HpKnxError::config("knx.gateway_port must be 1-65535"));
        }
        if self.knx.rate_limit > MAX_RATE_LIMIT {
            return Err(HpKnxError::config(format!(
                "knx.rate_limit must be 0-{}, got {}",
                MAX_RATE_LIMIT, self.knx.rate_limit
            )));
        }

        for (name, dp) in &self.data_points {
            dp.validate(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::core::value::NumericType;
    use tracing_test::traced_test;

    const MINIMAL: &str = r#"
heat_pump:
  device: /dev/ttyUSB0
knx:
  gateway_ip: 192.168.1.10
"#;

    fn with_data_points(points: &str) -> String {
        format!("{}data_points:\n{}", MINIMAL, points)
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.general.update_interval, Duration::from_secs(60));
        assert_eq!(
            config.general.cyclic_sending_interval,
            Duration::from_secs(600)
        );
        assert!(config.general.tick_timeout.is_none());
        assert_eq!(config.heat_pump.baudrate, 115_200);
        assert_eq!(config.knx.gateway_port, 3671);
        assert!(config.knx.auto_reconnect);
        assert_eq!(config.knx.auto_reconnect_wait, Duration::from_secs(3));
        assert_eq!(config.knx.own_address.to_string(), "15.15.250");
        assert_eq!(config.knx.rate_limit, 10);
        assert!(config.data_points.is_empty());
        assert!(config.notifications.on_malfunction.is_none());
    }

    #[test]
    fn test_full_configuration() {
        let yaml = r#"
general:
  update_interval: "00:00:30"
  cyclic_sending_interval: { minutes: 5 }
  tick_timeout: 10
heat_pump:
  device: /dev/ttyUSB0
  baudrate: 19200
knx:
  gateway_ip: 192.168.1.10
  gateway_port: 3672
  auto_reconnect: "no"
  own_address: 1.1.250
  rate_limit: 20
data_points:
  "Temp. Aussen":
    value_type: temperature
    group_address: 1/2/3
    cyclic_sending: true
    send_on_change: true
    on_change_of_absolute: 0.5
  "Verdichter":
    value_type: binary
    group_address: 1/2/4
    send_on_change: true
notifications:
  on_malfunction:
    group_address: 1/0/0
    repeat_after: "01:00"
"#;
        let config = GatewayConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.general.update_interval, Duration::from_secs(30));
        assert_eq!(
            config.general.cyclic_sending_interval,
            Duration::from_secs(300)
        );
        assert_eq!(config.general.tick_timeout, Some(Duration::from_secs(10)));
        assert!(!config.knx.auto_reconnect);

        let temp = &config.data_points["Temp. Aussen"];
        assert_eq!(
            temp.value_type,
            ValueKind::Numeric(NumericType::Temperature)
        );
        assert_eq!(temp.group_address.to_string(), "1/2/3");
        assert_eq!(temp.change_rule(), Some(ChangeRule::Absolute(0.5)));

        let binary = &config.data_points["Verdichter"];
        assert_eq!(binary.change_rule(), Some(ChangeRule::Differs));

        let malfunction = config.notifications.on_malfunction.unwrap();
        assert_eq!(malfunction.repeat_after, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_threshold_on_binary_point_rejected() {
        let yaml = with_data_points(
            "  Verdichter:\n    value_type: binary\n    group_address: 1/2/4\n    on_change_of_absolute: 1\n",
        );
        let err = GatewayConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("not allowed for binary"));
    }

    #[test]
    fn test_exclusive_thresholds_rejected() {
        let yaml = with_data_points(
            "  P1:\n    value_type: temperature\n    group_address: 1/2/3\n    send_on_change: true\n    on_change_of_absolute: 1\n    on_change_of_relative: 5\n",
        );
        let err = GatewayConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_send_on_change_requires_threshold() {
        let yaml = with_data_points(
            "  P1:\n    value_type: power\n    group_address: 1/2/3\n    send_on_change: true\n",
        );
        assert!(GatewayConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_non_positive_threshold_rejected() {
        let yaml = with_data_points(
            "  P1:\n    value_type: percent\n    group_address: 1/2/3\n    send_on_change: true\n    on_change_of_relative: 0\n",
        );
        assert!(GatewayConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    #[traced_test]
    fn test_threshold_without_send_on_change_warns() {
        let yaml = with_data_points(
            "  P1:\n    value_type: temperature\n    group_address: 1/2/3\n    on_change_of_absolute: 2\n",
        );
        let config = GatewayConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.data_points["P1"].change_rule(), None);
        assert!(logs_contain(
            "on_change_of_absolute is defined, but send_on_change is set to false"
        ));
    }

    #[test]
    fn test_invalid_general_and_knx_values_rejected() {
        let zero_interval = format!("general:\n  update_interval: 0\n{}", MINIMAL);
        assert!(GatewayConfig::from_yaml(&zero_interval).is_err());

        let bad_baudrate = MINIMAL.replace("/dev/ttyUSB0", "/dev/ttyUSB0\n  baudrate: 4800");
        assert!(GatewayConfig::from_yaml(&bad_baudrate).is_err());

        let bad_rate = MINIMAL.replace("192.168.1.10", "192.168.1.10\n  rate_limit: 101");
        assert!(GatewayConfig::from_yaml(&bad_rate).is_err());

        let bad_address = MINIMAL.replace("192.168.1.10", "192.168.1.10\n  own_address: 16.1.1");
        assert!(GatewayConfig::from_yaml(&bad_address).is_err());
    }

    #[test]
    fn test_huge_interval_is_config_error() {
        let huge = format!("general:\n  update_interval: 1e30\n{}", MINIMAL);
        assert!(matches!(
            GatewayConfig::from_yaml(&huge),
            Err(HpKnxError::ConfigError(_))
        ));

        let huge_clock = format!(
            "general:\n  cyclic_sending_interval: \"99999999999999999:00\"\n{}",
            MINIMAL
        );
        assert!(matches!(
            GatewayConfig::from_yaml(&huge_clock),
            Err(HpKnxError::ConfigError(_))
        ));
    }

    #[test]
    fn test_unknown_notification_rejected() {
        let yaml = format!(
            "{}notifications:\n  on_fire:\n    group_address: 1/0/0\n",
            MINIMAL
        );
        assert!(GatewayConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hpknx.yaml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.heat_pump.device, "/dev/ttyUSB0");

        let missing = GatewayConfig::load(dir.path().join("missing.yaml"));
        assert!(missing.unwrap_err().is_fatal());
    }
}
