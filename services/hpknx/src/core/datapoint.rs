//! Data point: one heat pump parameter mirrored onto one group address
//!
//! Tracks the last known value and the last value actually sent so that
//! send-on-change decisions are made against what the bus has seen.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::address::GroupAddress;
use crate::core::clients::{BusClient, BusPayload, HeatPumpClient, Telegram, TelegramKind};
use crate::core::config::DataPointConfig;
use crate::core::value::{ChangeRule, Value, ValueKind};
use crate::error::{HpKnxError, Result};

/// Mutable bus-facing state of a data point
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointState {
    /// Last known value (`None` until the first successful poll)
    pub current_value: Option<Value>,
    /// Last value broadcast because of a change
    pub last_sent_value: Option<Value>,
}

/// Behaviour flags of a data point
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DataPointOptions {
    pub writable: bool,
    pub cyclic_sending: bool,
    /// `Some` enables send-on-change
    pub on_change: Option<ChangeRule>,
}

pub struct DataPoint {
    name: String,
    group_address: GroupAddress,
    kind: ValueKind,
    options: DataPointOptions,
    // held across bus/heat pump calls so updates of one point never interleave
    state: Mutex<PointState>,
    heat_pump: Arc<dyn HeatPumpClient>,
    bus: Arc<dyn BusClient>,
}

impl DataPoint {
    pub fn new(
        name: impl Into<String>,
        group_address: GroupAddress,
        kind: ValueKind,
        options: DataPointOptions,
        heat_pump: Arc<dyn HeatPumpClient>,
        bus: Arc<dyn BusClient>,
    ) -> Result<Self> {
        let name = name.into();
        if kind.is_binary() && options.on_change.is_some_and(ChangeRule::is_threshold) {
            return Err(HpKnxError::config(format!(
                "data point '{}': change threshold not allowed for binary data point",
                name
            )));
        }
        Ok(Self {
            name,
            group_address,
            kind,
            options,
            state: Mutex::new(PointState::default()),
            heat_pump,
            bus,
        })
    }

    pub fn from_config(
        name: &str,
        config: &DataPointConfig,
        heat_pump: Arc<dyn HeatPumpClient>,
        bus: Arc<dyn BusClient>,
    ) -> Result<Self> {
        let options = DataPointOptions {
            writable: config.writable,
            cyclic_sending: config.cyclic_sending,
            on_change: config.change_rule(),
        };
        Self::new(
            name,
            config.group_address,
            config.value_type,
            options,
            heat_pump,
            bus,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group_address(&self) -> GroupAddress {
        self.group_address
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn options(&self) -> DataPointOptions {
        self.options
    }

    pub async fn state(&self) -> PointState {
        *self.state.lock().await
    }

    pub async fn current_value(&self) -> Option<Value> {
        self.state.lock().await.current_value
    }

    pub async fn last_sent_value(&self) -> Option<Value> {
        self.state.lock().await.last_sent_value
    }

    /// Apply a freshly polled value
    ///
    /// `None` (parameter not returned this cycle) is a no-op. Returns whether
    /// the value was sent to the bus.
    pub async fn set(&self, value: Option<Value>) -> Result<bool> {
        let Some(value) = value else {
            return Ok(false);
        };
        let value = self.kind.coerce(value);

        let mut state = self.state.lock().await;
        state.current_value = Some(value);

        let changed = match (self.options.on_change, state.last_sent_value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(rule), Some(last)) => rule.is_change(last, value),
        };
        if !changed {
            return Ok(false);
        }

        debug!(
            "Send DP '{}' [{}]: value={} (last sent: {:?})",
            self.name, self.group_address, value, state.last_sent_value
        );
        self.bus
            .send(self.group_address, BusPayload::Value(value), false)
            .await?;
        state.last_sent_value = Some(value);
        Ok(true)
    }

    /// Re-send the current value
    ///
    /// Only sends when answering a read (`is_response`) or when cyclic
    /// sending is enabled. Never touches `last_sent_value`.
    pub async fn broadcast_value(&self, is_response: bool) -> Result<bool> {
        if !is_response && !self.options.cyclic_sending {
            return Ok(false);
        }
        let state = self.state.lock().await;
        let Some(value) = state.current_value else {
            return Ok(false);
        };

        debug!(
            "Broadcast DP '{}' [{}]: value={} (response: {}, cyclic_sending: {})",
            self.name, self.group_address, value, is_response, self.options.cyclic_sending
        );
        self.bus
            .send(self.group_address, BusPayload::Value(value), is_response)
            .await?;
        Ok(true)
    }

    pub async fn process_group_read(&self, telegram: &Telegram) -> Result<()> {
        if telegram.is_outgoing() {
            return Ok(());
        }
        info!(
            "Received GROUP READ telegram for DP '{}' [{}]",
            self.name, self.group_address
        );
        self.broadcast_value(true).await?;
        Ok(())
    }

    /// Forward a bus write to the heat pump
    ///
    /// Heat pump failures are logged, never returned.
    pub async fn process_group_write(&self, telegram: &Telegram) -> Result<()> {
        if telegram.is_outgoing() {
            return Ok(());
        }
        let TelegramKind::GroupWrite(payload) = &telegram.kind else {
            return Ok(());
        };
        info!(
            "Received GROUP WRITE telegram for DP '{}' [{}]: {}",
            self.name, self.group_address, payload
        );

        let value = match payload {
            BusPayload::Value(v) => self.kind.coerce(*v),
            BusPayload::Text(text) => {
                warn!(
                    "Dropped GROUP WRITE for DP '{}' [{}]: cannot convert {:?} to {}",
                    self.name, self.group_address, text, self.kind
                );
                return Ok(());
            },
        };

        if !self.options.writable {
            warn!(
                "Attempted to set value for non-writable heat pump DP '{}' [{}] (value: {})",
                self.name, self.group_address, value
            );
            return Ok(());
        }

        let mut state = self.state.lock().await;
        match self.heat_pump.set_param(&self.name, value).await {
            Ok(confirmed) => {
                let confirmed = self.kind.coerce(confirmed);
                info!(
                    "Set heat pump parameter '{}' to {} (requested: {})",
                    self.name, confirmed, value
                );
                state.current_value = Some(confirmed);
            },
            Err(e) => {
                error!("Failed to set heat pump parameter '{}': {}", self.name, e);
            },
        }
        Ok(())
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<DataPoint name=\"{}\" group_address=\"{}\" value_type=\"{}\" unit=\"{}\" writable=\"{}\" cyclic_sending=\"{}\" on_change=\"{:?}\"/>",
            self.name,
            self.group_address,
            self.kind,
            self.kind.unit(),
            if self.options.writable { "yes" } else { "no" },
            if self.options.cyclic_sending { "yes" } else { "no" },
            self.options.on_change,
        )
    }
}

impl fmt::Debug for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPoint")
            .field("name", &self.name)
            .field("group_address", &self.group_address)
            .field("kind", &self.kind)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
