//! Startup module for Watcherr
//!
//! Builds the shared HTTP gateway and the instance registry from configuration.
//! The registry is built once and never grows or shrinks afterwards.

use crate::config::Config;
use crate::gateway::{Gateway, GatewayError, HttpGateway};
use crate::instance::Instance;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Error types for startup
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("No instances configured; set APIS or add [[instances]] to the config file")]
    NoInstances,

    #[error("Failed to create HTTP gateway: {0}")]
    Gateway(#[from] GatewayError),
}

/// Create the reqwest gateway shared by every instance
pub fn build_gateway(cfg: &Config) -> Result<Arc<dyn Gateway>, StartupError> {
    let gateway = HttpGateway::new(
        Duration::from_secs(cfg.general.request_timeout_secs),
        cfg.general.dry_run,
    )?;
    if gateway.is_dry_run() {
        info!("Dry run enabled: mutating calls will be logged, not sent");
    }
    Ok(Arc::new(gateway))
}

/// Build the instance registry
///
/// Every instance starts unhealthy; the first scheduler tick probes it.
pub fn build_instances(
    cfg: &Config,
    gateway: Arc<dyn Gateway>,
) -> Result<Vec<Instance>, StartupError> {
    if cfg.instances.is_empty() {
        return Err(StartupError::NoInstances);
    }

    Ok(cfg
        .instances
        .iter()
        .map(|instance| {
            Instance::from_config(instance, cfg.general.queue_page_size, gateway.clone())
        })
        .collect())
}
