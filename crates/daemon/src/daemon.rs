//! Daemon main loop for Watcherr
//!
//! Owns the instance registry and runs one reconciliation tick per interval.
//! Ticks never overlap; the work inside a tick runs concurrently across
//! instances.

use crate::config::{Config, ConfigError};
use crate::gateway::Gateway;
use crate::instance::{Instance, InstanceReport};
use crate::startup::{build_gateway, build_instances, StartupError};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Error type for daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Startup failed
    #[error("Startup failed: {0}")]
    Startup(#[from] StartupError),
}

/// Totals of one tick across all instances
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Instances probed because they were unhealthy at the start of the tick
    pub probed: usize,
    /// Instances that took part in cleanup
    pub healthy: usize,
    pub unmonitored_removed: usize,
    pub stalled_removed: usize,
    pub stalled_kept: usize,
    pub stalled_failed: usize,
}

impl TickReport {
    fn absorb(&mut self, report: &InstanceReport) {
        self.unmonitored_removed += report.unmonitored_removed;
        self.stalled_removed += report.stalled.removed;
        self.stalled_kept += report.stalled.kept;
        self.stalled_failed += report.stalled.failed;
    }
}

/// Daemon state containing the registry and schedule
pub struct Daemon {
    instances: Vec<Instance>,
    interval: Duration,
}

impl Daemon {
    /// Initialize the daemon with the reqwest gateway
    ///
    /// Validates the configuration, builds the shared gateway and the instance
    /// registry. Fails with [`StartupError::NoInstances`] when nothing is configured.
    pub fn new(config: Config) -> Result<Self, DaemonError> {
        config.validate()?;
        let gateway = build_gateway(&config)?;
        Self::with_gateway(config, gateway)
    }

    /// Initialize the daemon with a caller-supplied gateway
    pub fn with_gateway(config: Config, gateway: Arc<dyn Gateway>) -> Result<Self, DaemonError> {
        let instances = build_instances(&config, gateway)?;
        let interval = Duration::from_secs(config.general.interval_secs.max(1));

        Ok(Self {
            instances,
            interval,
        })
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single reconciliation pass
    ///
    /// 1. Probe every unhealthy instance concurrently and wait for all probes
    /// 2. Reconcile every healthy instance concurrently
    /// 3. Wait for all of it before returning
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        let probes = join_all(
            self.instances
                .iter_mut()
                .filter(|instance| !instance.is_healthy())
                .map(|instance| instance.probe()),
        )
        .await;
        report.probed = probes.len();

        let healthy: Vec<&Instance> = self.instances.iter().filter(|i| i.is_healthy()).collect();
        report.healthy = healthy.len();
        if healthy.is_empty() {
            warn!("No healthy instances this tick");
            return report;
        }

        for instance_report in join_all(healthy.iter().map(|instance| instance.reconcile())).await {
            report.absorb(&instance_report);
        }

        info!(
            "Tick complete: {}/{} healthy, {} stalled removed, {} unmonitored removed",
            report.healthy,
            self.instances.len(),
            report.stalled_removed,
            report.unmonitored_removed
        );
        report
    }

    /// Run the daemon main loop
    ///
    /// Ticks immediately, then once per interval until the process exits. A
    /// tick that overruns the interval delays the next one instead of
    /// triggering a burst.
    pub async fn run(&mut self) {
        info!(
            "Watching {} instance(s) every {}s",
            self.instances.len(),
            self.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
