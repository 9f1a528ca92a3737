//! Malfunction notification
//!
//! Announces the last fault of the heat pump on a group address when the
//! heat pump enters the error state, optionally repeating the announcement
//! while the fault persists.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::core::address::GroupAddress;
use crate::core::clients::{BusClient, BusPayload, HeatPumpClient, Telegram, TelegramKind};
use crate::core::config::MalfunctionConfig;
use crate::error::Result;

pub const MALFUNCTION_NOTIFIER: &str = "on_malfunction";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultState {
    /// Fault latched and announced
    pub in_error: bool,
    pub last_sent_at: Option<Instant>,
}

/// Outcome of one fault check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCheck {
    /// Heat pump reports no fault (latch cleared)
    Healthy,
    /// Fault message sent to the bus
    Announced { repeated: bool },
    /// Fault still active, already announced and not due for repetition
    Suppressed,
}

pub struct FaultNotifier {
    name: String,
    group_address: GroupAddress,
    repeat_after: Option<Duration>,
    state: Mutex<FaultState>,
    heat_pump: Arc<dyn HeatPumpClient>,
    bus: Arc<dyn BusClient>,
}

impl FaultNotifier {
    pub fn new(
        name: impl Into<String>,
        group_address: GroupAddress,
        repeat_after: Option<Duration>,
        heat_pump: Arc<dyn HeatPumpClient>,
        bus: Arc<dyn BusClient>,
    ) -> Self {
        Self {
            name: name.into(),
            group_address,
            repeat_after,
            state: Mutex::new(FaultState::default()),
            heat_pump,
            bus,
        }
    }

    pub fn from_config(
        config: &MalfunctionConfig,
        heat_pump: Arc<dyn HeatPumpClient>,
        bus: Arc<dyn BusClient>,
    ) -> Self {
        Self::new(
            MALFUNCTION_NOTIFIER,
            config.group_address,
            config.repeat_after,
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

    pub fn repeat_after(&self) -> Option<Duration> {
        self.repeat_after
    }

    pub async fn state(&self) -> FaultState {
        *self.state.lock().await
    }

    /// Poll the fault flag and announce a new or repeated fault
    ///
    /// On error the state is left untouched.
    pub async fn check(&self) -> Result<FaultCheck> {
        let mut state = self.state.lock().await;

        if !self.heat_pump.in_error().await? {
            state.in_error = false;
            return Ok(FaultCheck::Healthy);
        }

        let repeat_due = match (self.repeat_after, state.last_sent_at) {
            (Some(repeat_after), Some(sent_at)) => sent_at.elapsed() >= repeat_after,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if state.in_error && !repeat_due {
            return Ok(FaultCheck::Suppressed);
        }

        let repeated = state.in_error;
        info!("HEAT PUMP in ERROR{}", if repeated { " (repeated)" } else { "" });
        let fault = self.heat_pump.last_fault().await?;
        info!("{}", fault);
        self.bus
            .send(self.group_address, BusPayload::text(&fault.message), false)
            .await?;

        state.in_error = true;
        state.last_sent_at = Some(Instant::now());
        Ok(FaultCheck::Announced { repeated })
    }

    /// Answer a read request with the last fault message, regardless of the latch
    ///
    /// The message goes out as a group write, like a regular announcement.
    pub async fn process_group_read(&self, telegram: &Telegram) -> Result<()> {
        if telegram.is_outgoing() {
            return Ok(());
        }
        info!(
            "Received GROUP READ telegram for notification '{}' [{}]",
            self.name, self.group_address
        );
        let fault = self.heat_pump.last_fault().await?;
        info!("{}", fault);
        self.bus
            .send(self.group_address, BusPayload::text(&fault.message), false)
            .await
    }

    pub async fn process_group_write(&self, telegram: &Telegram) -> Result<()> {
        if telegram.is_outgoing() {
            return Ok(());
        }
        if let TelegramKind::GroupWrite(payload) = &telegram.kind {
            warn!(
                "Ignored received GROUP WRITE telegram for notification '{}' [{}]: {}",
                self.name, self.group_address, payload
            );
        }
        Ok(())
    }
}

impl fmt::Display for FaultNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<FaultNotifier name=\"{}\" group_address=\"{}\" repeat_after=\"{:?}\"/>",
            self.name, self.group_address, self.repeat_after
        )
    }
}

impl fmt::Debug for FaultNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultNotifier")
            .field("name", &self.name)
            .field("group_address", &self.group_address)
            .field("repeat_after", &self.repeat_after)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::core::virt::{LoopbackBus, VirtualHeatPump};
    use tracing_test::traced_test;

    fn ga() -> GroupAddress {
        "1/0/0".parse().unwrap()
    }

    fn notifier(
        repeat_after: Option<Duration>,
    ) -> (FaultNotifier, Arc<VirtualHeatPump>, Arc<LoopbackBus>) {
        let hp = Arc::new(VirtualHeatPump::new());
        let bus = Arc::new(LoopbackBus::new());
        let notifier = FaultNotifier::new(
            MALFUNCTION_NOTIFIER,
            ga(),
            repeat_after,
            hp.clone(),
            bus.clone(),
        );
        (notifier, hp, bus)
    }

    #[tokio::test]
    async fn test_healthy_heat_pump_sends_nothing() {
        let (notifier, _hp, bus) = notifier(None);
        assert_eq!(notifier.check().await.unwrap(), FaultCheck::Healthy);
        assert!(bus.sent().is_empty());
        assert!(!notifier.state().await.in_error);
    }

    #[tokio::test]
    async fn test_fault_announced_once_without_repeat() {
        let (notifier, hp, bus) = notifier(None);
        hp.raise_fault(20, "EQ_Spreizung");

        assert_eq!(
            notifier.check().await.unwrap(),
            FaultCheck::Announced { repeated: false }
        );
        assert!(notifier.state().await.in_error);
        assert_eq!(notifier.check().await.unwrap(), FaultCheck::Suppressed);

        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, BusPayload::Text("EQ_Spreizung".to_string()));
        assert!(!sent[0].is_response);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_repeated_after_interval() {
        let (notifier, hp, bus) = notifier(Some(Duration::from_secs(60)));
        hp.raise_fault(20, "EQ_Spreizung");

        notifier.check().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(notifier.check().await.unwrap(), FaultCheck::Suppressed);
        assert_eq!(bus.sent().len(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(
            notifier.check().await.unwrap(),
            FaultCheck::Announced { repeated: true }
        );
        assert_eq!(bus.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_recovery_clears_latch_silently() {
        let (notifier, hp, bus) = notifier(None);
        hp.raise_fault(20, "EQ_Spreizung");
        notifier.check().await.unwrap();

        hp.clear_fault();
        assert_eq!(notifier.check().await.unwrap(), FaultCheck::Healthy);
        assert!(!notifier.state().await.in_error);
        assert_eq!(bus.sent().len(), 1);

        hp.raise_fault(21, "ND_Stoerung");
        assert_eq!(
            notifier.check().await.unwrap(),
            FaultCheck::Announced { repeated: false }
        );
        assert_eq!(bus.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_leaves_state_unchanged() {
        let (notifier, hp, bus) = notifier(None);
        hp.raise_fault(20, "EQ_Spreizung");
        bus.fail_sends(true);

        assert!(notifier.check().await.is_err());
        assert_eq!(notifier.state().await, FaultState::default());

        // latched state survives a failing in_error query
        bus.fail_sends(false);
        notifier.check().await.unwrap();
        let latched = notifier.state().await;
        hp.fail_requests(true);
        assert!(notifier.check().await.is_err());
        assert_eq!(notifier.state().await, latched);
    }

    #[tokio::test]
    async fn test_group_read_sends_last_fault() {
        let (notifier, hp, bus) = notifier(None);
        hp.record_fault(7, "Hochdruckstoerung Verdichter");

        notifier
            .process_group_read(&Telegram::incoming(ga(), TelegramKind::GroupRead))
            .await
            .unwrap();

        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, BusPayload::Text("Hochdruckstoer".to_string()));
        assert!(!notifier.state().await.in_error);
    }

    #[tokio::test]
    async fn test_outgoing_group_read_is_ignored() {
        let (notifier, hp, bus) = notifier(None);
        hp.record_fault(7, "Hochdruckstoerung Verdichter");

        notifier
            .process_group_read(&Telegram::outgoing(ga(), TelegramKind::GroupRead))
            .await
            .unwrap();

        assert!(bus.sent().is_empty());
        assert_eq!(notifier.state().await, FaultState::default());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_group_write_is_ignored() {
        let (notifier, hp, bus) = notifier(None);
        let write = Telegram::incoming(
            ga(),
            TelegramKind::GroupWrite(BusPayload::Text("hello".to_string())),
        );
        notifier.process_group_write(&write).await.unwrap();

        assert!(bus.sent().is_empty());
        assert_eq!(hp.set_param_calls(), 0);
        assert!(logs_contain("Ignored received GROUP WRITE telegram"));
    }
}
