//! Virtual transports
//!
//! In-process heat pump and bus used by the simulation mode of the binary
//! and by tests, without requiring actual hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tracing::debug;

use crate::core::address::GroupAddress;
use crate::core::clients::{
    BusClient, BusPayload, FaultRecord, HeatPumpClient, Telegram, TelegramKind,
};
use crate::core::config::GatewayConfig;
use crate::core::value::Value;
use crate::error::{HpKnxError, Result};

const TELEGRAM_BUFFER: usize = 256;

/// Sent telegrams kept by a [`LoopbackBus`] by default
pub const SENT_LOG_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct HeatPumpState {
    params: HashMap<String, Value>,
    limits: HashMap<String, (f64, f64)>,
    faults: Vec<FaultRecord>,
    in_error: bool,
    connected: bool,
    logged_in: bool,
}

/// Simulated heat pump with failure injection and call counters
#[derive(Debug, Default)]
pub struct VirtualHeatPump {
    state: Mutex<HeatPumpState>,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
    login_calls: AtomicUsize,
    query_calls: AtomicUsize,
    set_param_calls: AtomicUsize,
}

impl VirtualHeatPump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heat pump exposing every configured data point with a zero value
    pub fn from_config(config: &GatewayConfig) -> Self {
        let hp = Self::new();
        for (name, dp) in &config.data_points {
            hp.set_value(name, dp.value_type.coerce(Value::Numeric(0.0)));
        }
        hp
    }

    pub fn set_value(&self, name: &str, value: Value) {
        self.state.lock().params.insert(name.to_string(), value);
    }

    pub fn remove_value(&self, name: &str) {
        self.state.lock().params.remove(name);
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.state.lock().params.get(name).copied()
    }

    /// Clamp written values of `name` into `min..=max`
    pub fn set_limits(&self, name: &str, min: f64, max: f64) {
        self.state.lock().limits.insert(name.to_string(), (min, max));
    }

    /// Append a fault to the log and enter the error state
    pub fn raise_fault(&self, code: u32, message: &str) {
        self.record_fault(code, message);
        self.state.lock().in_error = true;
    }

    /// Append a fault to the log without changing the error state
    pub fn record_fault(&self, code: u32, message: &str) {
        let mut state = self.state.lock();
        let index = state.faults.len() as u32;
        state.faults.push(FaultRecord {
            index,
            code,
            timestamp: Local::now().naive_local(),
            message: message.to_string(),
        });
    }

    pub fn clear_fault(&self) {
        self.state.lock().in_error = false;
    }

    /// Make every request fail with a heat pump error
    pub fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every request, simulating a slow or stuck transport
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.lock().logged_in
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn set_param_calls(&self) -> usize {
        self.set_param_calls.load(Ordering::SeqCst)
    }

    async fn request(&self) -> Result<()> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(HpKnxError::heat_pump("no response from heat pump"));
        }
        Ok(())
    }
}

#[async_trait]
impl HeatPumpClient for VirtualHeatPump {
    async fn open_connection(&self) -> Result<()> {
        self.request().await?;
        self.state.lock().connected = true;
        Ok(())
    }

    async fn close_connection(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.connected = false;
        state.logged_in = false;
        Ok(())
    }

    async fn login(&self) -> Result<()> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.request().await?;
        self.state.lock().logged_in = true;
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.request().await?;
        self.state.lock().logged_in = false;
        Ok(())
    }

    async fn serial_number(&self) -> Result<u32> {
        self.request().await?;
        Ok(123_456)
    }

    async fn version(&self) -> Result<String> {
        self.request().await?;
        Ok("3.0.20".to_string())
    }

    async fn query(&self, names: &[String]) -> Result<HashMap<String, Value>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.request().await?;
        let state = self.state.lock();
        Ok(names
            .iter()
            .filter_map(|name| state.params.get(name).map(|v| (name.clone(), *v)))
            .collect())
    }

    async fn set_param(&self, name: &str, value: Value) -> Result<Value> {
        self.set_param_calls.fetch_add(1, Ordering::SeqCst);
        self.request().await?;
        let mut state = self.state.lock();
        let confirmed = match (value, state.limits.get(name)) {
            (Value::Numeric(v), Some((min, max))) => Value::Numeric(v.clamp(*min, *max)),
            _ => value,
        };
        state.params.insert(name.to_string(), confirmed);
        Ok(confirmed)
    }

    async fn in_error(&self) -> Result<bool> {
        self.request().await?;
        Ok(self.state.lock().in_error)
    }

    async fn last_fault(&self) -> Result<FaultRecord> {
        self.request().await?;
        self.state
            .lock()
            .faults
            .last()
            .cloned()
            .ok_or_else(|| HpKnxError::heat_pump("fault log is empty"))
    }
}

/// Telegram sent through the [`LoopbackBus`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentTelegram {
    pub group_address: GroupAddress,
    pub payload: BusPayload,
    pub is_response: bool,
}

/// In-process bus: records sends, echoes them as outgoing telegrams and
/// lets callers inject incoming ones
///
/// Only the most recent sends are kept; older ones are dropped once the
/// log reaches its capacity.
pub struct LoopbackBus {
    sent: Mutex<VecDeque<SentTelegram>>,
    sent_capacity: usize,
    sent_total: AtomicUsize,
    tx: broadcast::Sender<Telegram>,
    sent_notify: Notify,
    running: AtomicBool,
    failing: AtomicBool,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::with_capacity(SENT_LOG_CAPACITY)
    }

    /// Bus keeping at most `capacity` sent telegrams (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(TELEGRAM_BUFFER);
        Self {
            sent: Mutex::new(VecDeque::with_capacity(capacity.min(TELEGRAM_BUFFER))),
            sent_capacity: capacity,
            sent_total: AtomicUsize::new(0),
            tx,
            sent_notify: Notify::new(),
            running: AtomicBool::new(false),
            failing: AtomicBool::new(false),
        }
    }

    /// Deliver a telegram from another bus participant
    pub fn inject(&self, group_address: GroupAddress, kind: TelegramKind) {
        // no subscribers is fine
        let _ = self.tx.send(Telegram::incoming(group_address, kind));
    }

    /// Retained sent telegrams, oldest first
    pub fn sent(&self) -> Vec<SentTelegram> {
        self.sent.lock().iter().cloned().collect()
    }

    /// Number of telegrams sent since the last clear, including dropped ones
    pub fn sent_count(&self) -> usize {
        self.sent_total.load(Ordering::SeqCst)
    }

    /// Values sent to `group_address`, in order
    pub fn sent_values(&self, group_address: GroupAddress) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .filter(|t| t.group_address == group_address)
            .filter_map(|t| match t.payload {
                BusPayload::Value(v) => Some(v),
                BusPayload::Text(_) => None,
            })
            .collect()
    }

    /// Forget recorded sends and reset [`Self::sent_count`]
    pub fn clear_sent(&self) {
        let mut sent = self.sent.lock();
        sent.clear();
        self.sent_total.store(0, Ordering::SeqCst);
    }

    /// Wait until [`Self::sent_count`] reaches `count`
    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            let notified = self.sent_notify.notified();
            if self.sent_count() >= count {
                return;
            }
            notified.await;
        }
    }

    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusClient for LoopbackBus {
    async fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send(
        &self,
        group_address: GroupAddress,
        payload: BusPayload,
        is_response: bool,
    ) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HpKnxError::bus(format!(
                "failed to send telegram to {}",
                group_address
            )));
        }
        debug!(
            "Bus send {} {} (response: {})",
            group_address, payload, is_response
        );

        let kind = if is_response {
            TelegramKind::GroupResponse(payload.clone())
        } else {
            TelegramKind::GroupWrite(payload.clone())
        };
        {
            let mut sent = self.sent.lock();
            if sent.len() == self.sent_capacity {
                sent.pop_front();
            }
            sent.push_back(SentTelegram {
                group_address,
                payload,
                is_response,
            });
            self.sent_total.fetch_add(1, Ordering::SeqCst);
        }
        let _ = self.tx.send(Telegram::outgoing(group_address, kind));
        self.sent_notify.notify_waiters();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Telegram> {
        self.tx.subscribe()
    }
}
