//! Routing of inbound group telegrams to data points and notifiers

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::clients::{Telegram, TelegramKind};
use crate::core::registry::{AddressOwner, Registry};
use crate::error::Result;

/// Route one telegram to the owner of its group address
///
/// Responses and telegrams for unknown addresses are ignored.
pub async fn dispatch_telegram(registry: &Registry, telegram: &Telegram) -> Result<()> {
    let Some(owner) = registry.owner(telegram.group_address) else {
        debug!("No data point for {}", telegram);
        return Ok(());
    };

    match (&telegram.kind, owner) {
        (TelegramKind::GroupRead, AddressOwner::DataPoint(dp)) => {
            dp.process_group_read(telegram).await
        },
        (TelegramKind::GroupWrite(_), AddressOwner::DataPoint(dp)) => {
            dp.process_group_write(telegram).await
        },
        (TelegramKind::GroupRead, AddressOwner::Notifier(n)) => {
            n.process_group_read(telegram).await
        },
        (TelegramKind::GroupWrite(_), AddressOwner::Notifier(n)) => {
            n.process_group_write(telegram).await
        },
        (TelegramKind::GroupResponse(_), _) => {
            debug!("Ignored {}", telegram);
            Ok(())
        },
    }
}

/// Consumes the bus subscription and dispatches telegrams
pub struct TelegramDispatcher {
    registry: Arc<Registry>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TelegramDispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            token: CancellationToken::new(),
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start consuming `receiver`; ignored when already running
    pub fn start(&mut self, mut receiver: broadcast::Receiver<Telegram>) {
        if self.task.is_some() {
            warn!("Telegram dispatcher already running");
            return;
        }
        self.token = CancellationToken::new();
        let token = self.token.clone();
        let registry = self.registry.clone();

        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(telegram) => {
                            if let Err(e) = dispatch_telegram(&registry, &telegram).await {
                                warn!("Failed to process {}: {}", telegram, e);
                            }
                        },
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Telegram subscription lagged, {} telegram(s) skipped", skipped);
                        },
                        Err(RecvError::Closed) => {
                            info!("Telegram subscription closed");
                            break;
                        },
                    },
                }
            }
            debug!("Telegram dispatcher stopped");
        }));
    }

    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TelegramDispatcher {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
