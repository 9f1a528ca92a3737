//! Publisher: periodic heat pump synchronisation
//!
//! Runs three independent loops against the registry:
//! - login: keeps the heat pump session alive (fixed interval)
//! - update: fault checks, one batched parameter query, send-on-change
//! - cyclic sending: re-broadcasts values of cyclic data points
//!
//! Each loop performs its work first and then waits for the next tick.
//! Failures are logged per tick and never end a loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::clients::HeatPumpClient;
use crate::core::config::GeneralConfig;
use crate::core::fault::FaultCheck;
use crate::core::registry::Registry;
use crate::error::Result;

/// Heat pump re-login interval
pub const LOGIN_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherConfig {
    pub login_interval: Duration,
    /// Zero disables the update loop
    pub update_interval: Duration,
    /// Zero disables the cyclic sending loop
    pub cyclic_sending_interval: Duration,
    pub tick_timeout: Option<Duration>,
}

impl From<&GeneralConfig> for PublisherConfig {
    fn from(general: &GeneralConfig) -> Self {
        Self {
            login_interval: LOGIN_INTERVAL,
            update_interval: general.update_interval,
            cyclic_sending_interval: general.cyclic_sending_interval,
            tick_timeout: general.tick_timeout,
        }
    }
}

/// Outcome of one update tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub faults_announced: usize,
    pub values_received: usize,
    pub values_sent: usize,
    pub errors: usize,
}

struct PublishContext {
    registry: Arc<Registry>,
    heat_pump: Arc<dyn HeatPumpClient>,
}

impl PublishContext {
    async fn login(&self) -> Result<()> {
        debug!("Login heat pump");
        self.heat_pump.login().await
    }

    async fn update(&self) -> UpdateReport {
        let mut report = UpdateReport::default();

        for notifier in self.registry.notifiers() {
            match notifier.check().await {
                Ok(FaultCheck::Announced { .. }) => report.faults_announced += 1,
                Ok(_) => {},
                Err(e) => {
                    report.errors += 1;
                    error!("Fault check '{}' failed: {}", notifier.name(), e);
                },
            }
        }

        let names = self.registry.parameter_names();
        if names.is_empty() {
            return report;
        }
        let mut values = match self.heat_pump.query(&names).await {
            Ok(values) => values,
            Err(e) => {
                report.errors += 1;
                error!("Heat pump query failed: {}", e);
                return report;
            },
        };
        report.values_received = values.len();

        for dp in self.registry.data_points() {
            match dp.set(values.remove(dp.name())).await {
                Ok(true) => report.values_sent += 1,
                Ok(false) => {},
                Err(e) => {
                    report.errors += 1;
                    error!(
                        "Failed to update DP '{}' [{}]: {}",
                        dp.name(),
                        dp.group_address(),
                        e
                    );
                },
            }
        }
        report
    }

    async fn cyclic_sending(&self) -> usize {
        let mut sent = 0;
        for dp in self.registry.data_points() {
            match dp.broadcast_value(false).await {
                Ok(true) => sent += 1,
                Ok(false) => {},
                Err(e) => error!(
                    "Cyclic sending of DP '{}' [{}] failed: {}",
                    dp.name(),
                    dp.group_address(),
                    e
                ),
            }
        }
        sent
    }
}

/// Running loops of a started publisher
///
/// Dropping the handle cancels and aborts all loops.
pub struct SchedulerHandle {
    token: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|(_, task)| !task.is_finished())
    }

    /// Names of the loops that were started
    pub fn loops(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    /// Cancel all loops and wait for them to finish
    pub async fn shutdown(mut self) {
        self.token.cancel();
        let (names, tasks): (Vec<_>, Vec<_>) = self.tasks.drain(..).unzip();
        for (name, result) in names.into_iter().zip(join_all(tasks).await) {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    error!("{} loop terminated abnormally: {}", name, e);
                }
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.token.cancel();
        for (_, task) in &self.tasks {
            task.abort();
        }
    }
}

pub struct Publisher {
    ctx: Arc<PublishContext>,
    config: PublisherConfig,
    handle: Option<SchedulerHandle>,
}

impl Publisher {
    pub fn new(
        registry: Arc<Registry>,
        heat_pump: Arc<dyn HeatPumpClient>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            ctx: Arc::new(PublishContext {
                registry,
                heat_pump,
            }),
            config,
            handle: None,
        }
    }

    pub fn config(&self) -> PublisherConfig {
        self.config
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(SchedulerHandle::is_running)
    }

    /// Names of the running loops
    pub fn running_loops(&self) -> Vec<&'static str> {
        self.handle
            .as_ref()
            .map(SchedulerHandle::loops)
            .unwrap_or_default()
    }

    /// Spawn the periodic loops; calling it again while running does nothing
    pub fn start(&mut self) {
        if self.handle.is_some() {
            debug!("Publisher already running");
            return;
        }

        let token = CancellationToken::new();
        let timeout = self.config.tick_timeout;
        let mut tasks = Vec::with_capacity(3);

        let ctx = self.ctx.clone();
        tasks.push((
            "login",
            spawn_loop(
                "login",
                self.config.login_interval,
                timeout,
                token.clone(),
                move || {
                    let ctx = ctx.clone();
                    async move {
                        if let Err(e) = ctx.login().await {
                            error!("Heat pump login failed: {}", e);
                        }
                    }
                },
            ),
        ));

        if self.config.update_interval.is_zero() {
            info!("Update loop disabled");
        } else {
            let ctx = self.ctx.clone();
            tasks.push((
                "update",
                spawn_loop(
                    "update",
                    self.config.update_interval,
                    timeout,
                    token.clone(),
                    move || {
                        let ctx = ctx.clone();
                        async move {
                            let report = ctx.update().await;
                            debug!("Update tick: {:?}", report);
                        }
                    },
                ),
            ));
        }

        if self.config.cyclic_sending_interval.is_zero() {
            info!("Cyclic sending loop disabled");
        } else {
            let ctx = self.ctx.clone();
            tasks.push((
                "cyclic_sending",
                spawn_loop(
                    "cyclic_sending",
                    self.config.cyclic_sending_interval,
                    timeout,
                    token.clone(),
                    move || {
                        let ctx = ctx.clone();
                        async move {
                            let sent = ctx.cyclic_sending().await;
                            debug!("Cyclic sending tick: {} value(s) sent", sent);
                        }
                    },
                ),
            ));
        }

        info!(
            "Publisher started (update: {:?}, cyclic sending: {:?})",
            self.config.update_interval, self.config.cyclic_sending_interval
        );
        self.handle = Some(SchedulerHandle { token, tasks });
    }

    /// Stop all loops; safe to call repeatedly or before `start`
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown().await;
            info!("Publisher stopped");
        }
    }

    /// Run the loops for the lifetime of `fut`
    ///
    /// The loops are stopped when `fut` completes. If this future is
    /// dropped early, the loops are aborted together with the publisher.
    pub async fn run_until<F: Future>(&mut self, fut: F) -> F::Output {
        self.start();
        let output = fut.await;
        self.stop().await;
        output
    }

    /// One login tick
    pub async fn run_login(&self) -> Result<()> {
        self.ctx.login().await
    }

    /// One update tick: fault checks, batched query, send-on-change
    pub async fn run_update_cycle(&self) -> UpdateReport {
        self.ctx.update().await
    }

    /// One cyclic sending tick, returns the number of values sent
    pub async fn run_cyclic_sending(&self) -> usize {
        self.ctx.cyclic_sending().await
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    tick_timeout: Option<Duration>,
    token: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("{} loop started (interval: {:?})", name, period);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {},
            }

            let work = tick();
            tokio::select! {
                _ = token.cancelled() => break,
                _ = run_tick(name, tick_timeout, work) => {},
            }
        }
        debug!("{} loop stopped", name);
    })
}

async fn run_tick<Fut>(name: &'static str, tick_timeout: Option<Duration>, work: Fut)
where
    Fut: Future<Output = ()>,
{
    match tick_timeout {
        Some(limit) => {
            if tokio::time::timeout(limit, work).await.is_err() {
                warn!("{} tick abandoned after {:?}", name, limit);
            }
        },
        None => work.await,
    }
}
