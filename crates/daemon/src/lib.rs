//! Watcherr
//!
//! Background reconciler for Sonarr/Radarr style servers: removes stalled
//! downloads (re-searching the affected item) and unmonitored library items.

pub mod app_kind;
pub mod daemon;
pub mod gateway;
pub mod instance;
pub mod models;
pub mod stalled;
pub mod startup;

pub use watcherr_config as config;
pub use watcherr_config::Config;
pub use app_kind::{AppKind, KindEndpoints};
pub use daemon::{Daemon, DaemonError, TickReport};
pub use gateway::{is_mutating, ApiRequest, Gateway, GatewayError, HttpGateway};
pub use instance::{Health, Instance, InstanceReport, RemovalOutcome, StalledReport};
pub use models::{percent_downloaded, LibraryEntry, QueueRecord, SystemStatus};
pub use stalled::{decide_removal, is_stalled, RemovalDecision};
pub use startup::{build_gateway, build_instances, StartupError};
