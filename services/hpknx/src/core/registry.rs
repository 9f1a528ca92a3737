//! Registry of data points and notifiers
//!
//! Built once from the configuration. Every group address may be claimed
//! by exactly one data point or notifier.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::core::address::GroupAddress;
use crate::core::clients::{BusClient, HeatPumpClient};
use crate::core::config::GatewayConfig;
use crate::core::datapoint::DataPoint;
use crate::core::fault::FaultNotifier;
use crate::error::{HpKnxError, Result};

/// Owner of a group address
#[derive(Debug, Clone)]
pub enum AddressOwner {
    DataPoint(Arc<DataPoint>),
    Notifier(Arc<FaultNotifier>),
}

impl AddressOwner {
    pub fn name(&self) -> &str {
        match self {
            AddressOwner::DataPoint(dp) => dp.name(),
            AddressOwner::Notifier(n) => n.name(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    data_points: BTreeMap<String, Arc<DataPoint>>,
    notifiers: BTreeMap<String, Arc<FaultNotifier>>,
    addresses: HashMap<GroupAddress, AddressOwner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build all data points and notifiers of `config`
    pub fn build(
        config: &GatewayConfig,
        heat_pump: Arc<dyn HeatPumpClient>,
        bus: Arc<dyn BusClient>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for (name, dp_config) in &config.data_points {
            let dp = DataPoint::from_config(name, dp_config, heat_pump.clone(), bus.clone())?;
            registry.add_data_point(dp)?;
        }
        if let Some(malfunction) = &config.notifications.on_malfunction {
            registry.add_notifier(FaultNotifier::from_config(
                malfunction,
                heat_pump.clone(),
                bus.clone(),
            ))?;
        }
        debug!(
            "Registry built: {} data point(s), {} notifier(s)",
            registry.data_points.len(),
            registry.notifiers.len()
        );
        Ok(registry)
    }

    pub fn add_data_point(&mut self, dp: DataPoint) -> Result<Arc<DataPoint>> {
        if self.data_points.contains_key(dp.name()) {
            return Err(HpKnxError::config(format!(
                "Duplicate data point name '{}'",
                dp.name()
            )));
        }
        let dp = Arc::new(dp);
        self.claim(dp.group_address(), AddressOwner::DataPoint(dp.clone()))?;
        self.data_points.insert(dp.name().to_string(), dp.clone());
        Ok(dp)
    }

    pub fn add_notifier(&mut self, notifier: FaultNotifier) -> Result<Arc<FaultNotifier>> {
        if self.notifiers.contains_key(notifier.name()) {
            return Err(HpKnxError::config(format!(
                "Duplicate notification '{}'",
                notifier.name()
            )));
        }
        let notifier = Arc::new(notifier);
        self.claim(
            notifier.group_address(),
            AddressOwner::Notifier(notifier.clone()),
        )?;
        self.notifiers
            .insert(notifier.name().to_string(), notifier.clone());
        Ok(notifier)
    }

    fn claim(&mut self, address: GroupAddress, owner: AddressOwner) -> Result<()> {
        if let Some(existing) = self.addresses.get(&address) {
            return Err(HpKnxError::DuplicateAddress {
                address,
                first: existing.name().to_string(),
                second: owner.name().to_string(),
            });
        }
        self.addresses.insert(address, owner);
        Ok(())
    }

    pub fn data_point(&self, name: &str) -> Option<&Arc<DataPoint>> {
        self.data_points.get(name)
    }

    pub fn notifier(&self, name: &str) -> Option<&Arc<FaultNotifier>> {
        self.notifiers.get(name)
    }

    pub fn data_points(&self) -> impl Iterator<Item = &Arc<DataPoint>> {
        self.data_points.values()
    }

    pub fn notifiers(&self) -> impl Iterator<Item = &Arc<FaultNotifier>> {
        self.notifiers.values()
    }

    /// Parameter names of all data points, for batched heat pump queries
    pub fn parameter_names(&self) -> Vec<String> {
        self.data_points.keys().cloned().collect()
    }

    pub fn owner(&self, address: GroupAddress) -> Option<&AddressOwner> {
        self.addresses.get(&address)
    }

    pub fn len(&self) -> usize {
        self.data_points.len() + self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
