//! A single managed *arr server and its reconciliation operations.
//!
//! Every operation is best-effort: failures are logged inside the operation and
//! never returned to the scheduler. The only state an operation mutates is the
//! health of its own instance, and only [`Instance::probe`] does that.

use crate::app_kind::{AppKind, KindEndpoints};
use crate::config::InstanceConfig;
use crate::gateway::{ApiRequest, Gateway, GatewayError};
use crate::models::{decode_each, LibraryEntry, QueuePayload, QueueRecord, SystemStatus};
use crate::stalled::{decide_removal, is_stalled, RemovalDecision};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Path prefix of the v3 API, appended to the configured base URL.
pub const API_PREFIX: &str = "/api/v3";

/// Connectivity state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Health {
    /// Not reachable, or not probed yet. Skipped by cleanup.
    #[default]
    Unhealthy,
    Healthy,
}

/// Stalled download removal settings
#[derive(Debug, Clone, PartialEq)]
struct StalledPolicy {
    enabled: bool,
    remove_from_client: bool,
    blocklist: bool,
    percent_threshold: u8,
}

/// Unmonitored item removal settings
#[derive(Debug, Clone, PartialEq)]
struct UnmonitoredPolicy {
    enabled: bool,
    delete_files: bool,
}

/// What happened to a single stalled record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemovalOutcome {
    /// Past the percent threshold; no calls made.
    Kept { percent: f64 },
    /// Deleted; `searched` tells whether the follow-up search went through.
    Removed { searched: bool },
    /// Not deleted: the delete call failed, or the kind has no search command.
    Failed,
}

/// Totals of one stalled pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StalledReport {
    pub candidates: usize,
    pub removed: usize,
    pub kept: usize,
    pub failed: usize,
}

/// Totals of one cleanup pass over an instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceReport {
    pub unmonitored_removed: usize,
    pub stalled: StalledReport,
}

/// One managed server
pub struct Instance {
    name: String,
    base_url: String,
    api_key: String,
    kind: AppKind,
    health: Health,
    version: Option<String>,
    stalled: StalledPolicy,
    unmonitored: UnmonitoredPolicy,
    queue_page_size: u32,
    gateway: Arc<dyn Gateway>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("kind", &self.kind)
            .field("health", &self.health)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl Instance {
    /// Build an unprobed instance from its configuration entry.
    pub fn from_config(cfg: &InstanceConfig, queue_page_size: u32, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            name: cfg.name.clone(),
            base_url: cfg.url.trim().trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            kind: AppKind::Unknown,
            health: Health::Unhealthy,
            version: None,
            stalled: StalledPolicy {
                enabled: cfg.stalled.enabled,
                remove_from_client: cfg.stalled.remove_from_client,
                blocklist: cfg.stalled.blocklist,
                percent_threshold: cfg.stalled.percent_threshold,
            },
            unmonitored: UnmonitoredPolicy {
                enabled: cfg.unmonitored.enabled,
                delete_files: cfg.unmonitored.delete_files,
            },
            queue_page_size,
            gateway,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AppKind {
        self.kind
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn is_healthy(&self) -> bool {
        self.health == Health::Healthy
    }

    /// Version reported by the last successful probe
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, API_PREFIX, path)
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, GatewayError> {
        let mut request = ApiRequest::new(method, self.api_url(path), self.api_key.clone());
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.gateway.send(request).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        match self.call(Method::GET, path, None).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(GatewayError::EmptyBody(self.api_url(path))),
        }
    }

    /// Refresh connectivity and application kind.
    ///
    /// A status response with a non-empty version marks the instance healthy
    /// and sets the kind from the reported application name. Anything else
    /// marks it unhealthy and leaves the kind untouched.
    #[instrument(skip_all, fields(instance = %self.name))]
    pub async fn probe(&mut self) -> Health {
        match self.get::<SystemStatus>("system/status").await {
            Ok(status) => match status.version.filter(|v| !v.trim().is_empty()) {
                Some(version) => {
                    let app_name = status.app_name.unwrap_or_default();
                    self.kind = AppKind::from_app_name(&app_name);
                    info!(
                        "Connected to {} version {} (kind: {})",
                        if app_name.is_empty() { "server" } else { app_name.as_str() },
                        version,
                        self.kind
                    );
                    self.version = Some(version);
                    self.health = Health::Healthy;
                }
                None => {
                    warn!("Status response carried no version; marking unhealthy");
                    self.health = Health::Unhealthy;
                }
            },
            Err(e) => {
                warn!("Probe failed: {}", e);
                self.health = Health::Unhealthy;
            }
        }
        self.health
    }

    /// Fetch the download queue. Any failure yields an empty queue.
    #[instrument(skip_all, fields(instance = %self.name))]
    pub async fn fetch_queue(&self) -> Vec<QueueRecord> {
        let path = format!("queue?pageSize={}", self.queue_page_size);
        match self.get::<QueuePayload>(&path).await {
            Ok(payload) => decode_each(payload.into_records(), |index, e| {
                warn!("Skipping malformed queue record #{}: {}", index, e);
            }),
            Err(e) => {
                warn!("Failed to fetch queue: {}", e);
                Vec::new()
            }
        }
    }

    /// Delete one stalled record and re-search its library item.
    ///
    /// Nothing is sent when the record is past the percent threshold, or
    /// when the kind has no search command to pair with the delete. The
    /// search is only triggered after the delete succeeded.
    #[instrument(skip_all, fields(instance = %self.name, record = record.id))]
    pub async fn apply_removal(&self, record: &QueueRecord) -> RemovalOutcome {
        let Some(endpoints) = self.kind.endpoints() else {
            warn!(
                "No search command for kind {}; leaving '{}' in the queue",
                self.kind,
                record.display_title()
            );
            return RemovalOutcome::Failed;
        };

        let percent = match decide_removal(record, self.stalled.percent_threshold) {
            RemovalDecision::Keep { percent } => {
                debug!(
                    "Keeping '{}': {:.1}% downloaded is past the {}% threshold",
                    record.display_title(),
                    percent,
                    self.stalled.percent_threshold
                );
                return RemovalOutcome::Kept { percent };
            }
            RemovalDecision::Remove { percent } => percent,
        };

        let path = format!(
            "queue/{}?removeFromClient={}&blocklist={}",
            record.id, self.stalled.remove_from_client, self.stalled.blocklist
        );
        if let Err(e) = self.call(Method::DELETE, &path, None).await {
            warn!("Failed to remove stalled '{}': {}", record.display_title(), e);
            return RemovalOutcome::Failed;
        }
        info!(
            "Removed stalled '{}' ({:.1}% downloaded)",
            record.display_title(),
            percent
        );

        RemovalOutcome::Removed {
            searched: self.trigger_search(endpoints, record.library_item_id()).await,
        }
    }

    async fn trigger_search(&self, endpoints: &KindEndpoints, item_id: i64) -> bool {
        match self
            .call(Method::POST, "command", Some(endpoints.search_body(item_id)))
            .await
        {
            Ok(_) => {
                info!("Triggered {} for item {}", endpoints.search_command, item_id);
                true
            }
            Err(e) => {
                warn!("Failed to trigger {} for item {}: {}", endpoints.search_command, item_id, e);
                false
            }
        }
    }

    /// Fetch the queue and remove every stalled record at or below the threshold.
    ///
    /// An instance of unknown kind is left alone: a delete without its
    /// re-search would only lose the download.
    #[instrument(skip_all, fields(instance = %self.name))]
    pub async fn remove_stalled(&self) -> StalledReport {
        let mut report = StalledReport::default();
        if !self.stalled.enabled {
            return report;
        }
        if self.kind.endpoints().is_none() {
            warn!("Unknown application kind; skipping stalled downloads");
            return report;
        }

        let queue = self.fetch_queue().await;
        for record in queue.iter().filter(|r| is_stalled(r)) {
            report.candidates += 1;
            match self.apply_removal(record).await {
                RemovalOutcome::Kept { .. } => report.kept += 1,
                RemovalOutcome::Removed { .. } => report.removed += 1,
                RemovalOutcome::Failed => report.failed += 1,
            }
        }

        if report.candidates > 0 {
            info!(
                "Stalled pass: {} candidates, {} removed, {} kept, {} failed",
                report.candidates, report.removed, report.kept, report.failed
            );
        }
        report
    }

    /// Remove every library item that is no longer monitored.
    ///
    /// Returns the number of items deleted.
    #[instrument(skip_all, fields(instance = %self.name))]
    pub async fn remove_unmonitored(&self) -> usize {
        if !self.unmonitored.enabled {
            return 0;
        }

        let Some(endpoints) = self.kind.endpoints() else {
            warn!("Unknown application kind; no library to clean");
            return 0;
        };

        let entries: Vec<LibraryEntry> = match self.get::<Vec<Value>>(endpoints.library_path).await {
            Ok(items) => decode_each(items, |index, e| {
                warn!("Skipping malformed library entry #{}: {}", index, e);
            }),
            Err(e) => {
                warn!("Failed to fetch {} list: {}", endpoints.library_path, e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.iter().filter(|e| !e.monitored) {
            let path = format!(
                "{}/{}?deleteFiles={}",
                endpoints.library_path, entry.id, self.unmonitored.delete_files
            );
            match self.call(Method::DELETE, &path, None).await {
                Ok(_) => {
                    info!("Removed unmonitored '{}' ({})", entry.title, entry.id);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove unmonitored '{}': {}", entry.title, e),
            }
        }
        removed
    }

    /// Delete several queue records in one call using the stalled policy flags.
    #[instrument(skip_all, fields(instance = %self.name, count = ids.len()))]
    pub async fn remove_queue_bulk(&self, ids: &[i64]) -> Result<(), GatewayError> {
        if ids.is_empty() {
            return Ok(());
        }

        let path = format!(
            "queue/bulk?removeFromClient={}&blocklist={}",
            self.stalled.remove_from_client, self.stalled.blocklist
        );
        self.call(Method::DELETE, &path, Some(json!({ "ids": ids })))
            .await?;
        info!("Bulk removed {} queue records", ids.len());
        Ok(())
    }

    /// Run both cleanup passes concurrently.
    pub async fn reconcile(&self) -> InstanceReport {
        let (unmonitored_removed, stalled) =
            tokio::join!(self.remove_unmonitored(), self.remove_stalled());
        InstanceReport {
            unmonitored_removed,
            stalled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceConfig;
    use crate::gateway::fake::RecordingGateway;

    fn config(threshold: u8) -> InstanceConfig {
        let mut cfg = InstanceConfig::named("sonarr");
        cfg.url = "http://sonarr.local/".to_string();
        cfg.api_key = "secret".to_string();
        cfg.stalled.percent_threshold = threshold;
        cfg
    }

    fn instance(cfg: &InstanceConfig, gateway: Arc<RecordingGateway>) -> Instance {
        Instance::from_config(cfg, 1000, gateway)
    }

    fn sonarr_status() -> Value {
        json!({"appName": "Sonarr", "version": "4.0.1.929"})
    }

    async fn healthy(cfg: &InstanceConfig, gateway: Arc<RecordingGateway>) -> Instance {
        let mut inst = instance(cfg, gateway);
        assert_eq!(inst.probe().await, Health::Healthy);
        inst
    }

    #[tokio::test]
    async fn test_probe_sets_kind_and_version() {
        let gateway = Arc::new(RecordingGateway::new().on(Method::GET, "/system/status", sonarr_status()));
        let mut inst = instance(&config(10), gateway.clone());

        assert_eq!(inst.health(), Health::Unhealthy);
        assert_eq!(inst.probe().await, Health::Healthy);
        assert_eq!(inst.kind(), AppKind::Sonarr);
        assert_eq!(inst.version(), Some("4.0.1.929"));

        let calls = gateway.calls();
        assert_eq!(calls[0].url, "http://sonarr.local/api/v3/system/status");
        assert_eq!(calls[0].api_key, "secret");
    }

    #[tokio::test]
    async fn test_probe_with_empty_version_stays_unhealthy() {
        let gateway = Arc::new(
            RecordingGateway::new().on(Method::GET, "/system/status", json!({"appName": "Radarr", "version": ""})),
        );
        let mut inst = instance(&config(10), gateway);

        assert_eq!(inst.probe().await, Health::Unhealthy);
        assert_eq!(inst.kind(), AppKind::Unknown);
    }

    #[tokio::test]
    async fn test_failed_probe_keeps_previous_kind() {
        let gateway = Arc::new(RecordingGateway::new().respond_with({
            let count = std::sync::atomic::AtomicUsize::new(0);
            move |_: &ApiRequest| {
                if count.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                    Some(Ok(Some(json!({"appName": "Radarr", "version": "5.2"}))))
                } else {
                    Some(Err(503))
                }
            }
        }));
        let mut inst = instance(&config(10), gateway);

        assert_eq!(inst.probe().await, Health::Healthy);
        assert_eq!(inst.probe().await, Health::Unhealthy);
        assert_eq!(inst.kind(), AppKind::Radarr);
    }

    #[tokio::test]
    async fn test_unrecognised_app_is_healthy_but_unknown() {
        let gateway = Arc::new(
            RecordingGateway::new().on(Method::GET, "/system/status", json!({"appName": "Lidarr", "version": "2.0"})),
        );
        let mut inst = instance(&config(10), gateway);

        assert_eq!(inst.probe().await, Health::Healthy);
        assert_eq!(inst.kind(), AppKind::Unknown);
    }

    #[tokio::test]
    async fn test_stalled_record_is_deleted_then_searched() {
        let gateway = Arc::new(
            RecordingGateway::new()
                .on(Method::GET, "/system/status", sonarr_status())
                .on(
                    Method::GET,
                    "/queue",
                    json!({"records": [{
                        "id": 1,
                        "status": "warning",
                        "errorMessage": "Stalled: no peers",
                        "size": 1000,
                        "sizeleft": 950
                    }]}),
                )
                .on_empty(Method::DELETE, "/queue/1")
                .on(Method::POST, "/command", json!({"id": 99})),
        );
        let inst = healthy(&config(10), gateway.clone()).await;

        let report = inst.remove_stalled().await;
        assert_eq!(
            report,
            StalledReport {
                candidates: 1,
                removed: 1,
                kept: 0,
                failed: 0
            }
        );

        let lines = gateway.call_lines();
        assert_eq!(
            lines[1..],
            [
                "GET /queue?pageSize=1000".to_string(),
                "DELETE /queue/1?removeFromClient=true&blocklist=true".to_string(),
                "POST /command".to_string(),
            ]
        );
        let search = gateway.calls().last().cloned().unwrap();
        assert_eq!(search.body, Some(json!({"name": "SeriesSearch", "seriesId": 1})));
    }

    #[tokio::test]
    async fn test_zero_size_queued_record_removed_at_zero_threshold() {
        let gateway = Arc::new(
            RecordingGateway::new()
                .on(Method::GET, "/system/status", sonarr_status())
                .on(
                    Method::GET,
                    "/queue",
                    json!([{"id": 2, "status": "queued", "size": 0, "sizeleft": 0}]),
                )
                .on_empty(Method::DELETE, "/queue/2")
                .on_empty(Method::POST, "/command"),
        );
        let inst = healthy(&config(0), gateway.clone()).await;

        assert_eq!(inst.remove_stalled().await.removed, 1);
        assert!(gateway
            .call_lines()
            .contains(&"DELETE /queue/2?removeFromClient=true&blocklist=true".to_string()));
    }

    #[tokio::test]
    async fn test_record_past_threshold_is_kept_without_calls() {
        let gateway = Arc::new(RecordingGateway::new().on(Method::GET, "/system/status", sonarr_status()));
        let inst = healthy(&config(10), gateway.clone()).await;
        let record = QueueRecord {
            id: 5,
            status: "warning".to_string(),
            error_message: Some("stalled".to_string()),
            size: 1000.0,
            sizeleft: 500.0,
            ..Default::default()
        };

        assert_eq!(
            inst.apply_removal(&record).await,
            RemovalOutcome::Kept { percent: 50.0 }
        );
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_skips_search_and_continues() {
        let gateway = Arc::new(
            RecordingGateway::new()
                .on(Method::GET, "/system/status", sonarr_status())
                .on(
                    Method::GET,
                    "/queue",
                    json!([
                        {"id": 1, "status": "queued", "size": 0, "sizeleft": 0},
                        {"id": 2, "status": "queued", "size": 0, "sizeleft": 0}
                    ]),
                )
                .on_status(Method::DELETE, "/queue/1", 500)
                .on_empty(Method::DELETE, "/queue/2")
                .on_status(Method::POST, "/command", 500),
        );
        let inst = healthy(&config(10), gateway.clone()).await;

        let report = inst.remove_stalled().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.removed, 1);

        let posts = gateway
            .calls()
            .iter()
            .filter(|c| c.method == Method::POST)
            .count();
        assert_eq!(posts, 1);
    }

    #[tokio::test]
    async fn test_search_uses_linked_library_id() {
        let gateway = Arc::new(
            RecordingGateway::new()
                .on(Method::GET, "/system/status", json!({"appName": "radarr", "version": "5.0"}))
                .on_empty(Method::DELETE, "/queue/8")
                .on_empty(Method::POST, "/command"),
        );
        let inst = healthy(&config(10), gateway.clone()).await;
        let record = QueueRecord {
            id: 8,
            status: "queued".to_string(),
            movie_id: Some(321),
            ..Default::default()
        };

        assert_eq!(
            inst.apply_removal(&record).await,
            RemovalOutcome::Removed { searched: true }
        );
        let search = gateway.calls().last().cloned().unwrap();
        assert_eq!(search.body, Some(json!({"name": "MoviesSearch", "movieIds": [321]})));
    }

    #[tokio::test]
    async fn test_queue_fetch_failure_yields_empty_queue() {
        let gateway = Arc::new(RecordingGateway::new().on_status(Method::GET, "/queue", 500));
        let inst = instance(&config(10), gateway);

        assert!(inst.fetch_queue().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_queue_record_does_not_block_others() {
        let gateway = Arc::new(RecordingGateway::new().on(
            Method::GET,
            "/queue",
            json!([{"id": "bad"}, {"id": 4, "status": "queued", "size": 0, "sizeleft": 0}]),
        ));
        let inst = instance(&config(10), gateway);

        let queue = inst.fetch_queue().await;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, 4);
    }

    #[tokio::test]
    async fn test_unmonitored_removal_only_deletes_unmonitored() {
        let mut cfg = config(10);
        cfg.unmonitored.enabled = true;
        cfg.unmonitored.delete_files = true;
        let gateway = Arc::new(
            RecordingGateway::new()
                .on(Method::GET, "/system/status", sonarr_status())
                .on(
                    Method::GET,
                    "/series",
                    json!([
                        {"id": 3, "title": "Gone", "monitored": false},
                        {"id": 4, "title": "Kept", "monitored": true}
                    ]),
                )
                .on_empty(Method::DELETE, "/series/3"),
        );
        let inst = healthy(&cfg, gateway.clone()).await;

        assert_eq!(inst.remove_unmonitored().await, 1);
        let deletes: Vec<String> = gateway
            .call_lines()
            .into_iter()
            .filter(|l| l.starts_with("DELETE"))
            .collect();
        assert_eq!(deletes, vec!["DELETE /series/3?deleteFiles=true".to_string()]);
    }

    #[tokio::test]
    async fn test_unmonitored_removal_disabled_is_noop() {
        let gateway = Arc::new(RecordingGateway::new().on(Method::GET, "/system/status", sonarr_status()));
        let inst = healthy(&config(10), gateway.clone()).await;

        assert_eq!(inst.remove_unmonitored().await, 0);
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unmonitored_removal_unknown_kind_makes_no_calls() {
        let mut cfg = config(10);
        cfg.unmonitored.enabled = true;
        let gateway = Arc::new(RecordingGateway::new());
        let inst = instance(&cfg, gateway.clone());

        assert_eq!(inst.remove_unmonitored().await, 0);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_pass_disabled_is_noop() {
        let mut cfg = config(10);
        cfg.stalled.enabled = false;
        let gateway = Arc::new(RecordingGateway::new());
        let inst = instance(&cfg, gateway.clone());

        assert_eq!(inst.remove_stalled().await, StalledReport::default());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_library_entry_without_monitored_flag_is_not_deleted() {
        let mut cfg = config(10);
        cfg.unmonitored.enabled = true;
        cfg.unmonitored.delete_files = true;
        let gateway = Arc::new(
            RecordingGateway::new()
                .on(Method::GET, "/system/status", sonarr_status())
                .on(Method::GET, "/series", json!([{"id": 5, "title": "NoFlag"}]))
                .on_empty(Method::DELETE, "/series/5"),
        );
        let inst = healthy(&cfg, gateway.clone()).await;

        assert_eq!(inst.remove_unmonitored().await, 0);
        assert_eq!(
            gateway.call_lines(),
            vec!["GET /system/status".to_string(), "GET /series".to_string()]
        );
    }

    #[tokio::test]
    async fn test_queued_record_without_size_is_not_removed() {
        let gateway = Arc::new(
            RecordingGateway::new()
                .on(Method::GET, "/system/status", sonarr_status())
                .on(
                    Method::GET,
                    "/queue",
                    json!([{"id": 9, "status": "queued", "sizeleft": 500}]),
                )
                .on_empty(Method::DELETE, "/queue/9")
                .on_empty(Method::POST, "/command"),
        );
        let inst = healthy(&config(10), gateway.clone()).await;

        assert_eq!(inst.remove_stalled().await, StalledReport::default());
        assert!(gateway
            .calls()
            .iter()
            .all(|c| c.method == Method::GET));
    }

    #[tokio::test]
    async fn test_unknown_kind_leaves_stalled_records_alone() {
        let gateway = Arc::new(
            RecordingGateway::new()
                .on(Method::GET, "/system/status", json!({"appName": "Lidarr", "version": "2.0"}))
                .on(
                    Method::GET,
                    "/queue",
                    json!([{"id": 2, "status": "queued", "size": 0, "sizeleft": 0}]),
                )
                .on_empty(Method::DELETE, "/queue/2"),
        );
        let inst = healthy(&config(10), gateway.clone()).await;
        assert_eq!(inst.kind(), AppKind::Unknown);

        assert_eq!(inst.remove_stalled().await, StalledReport::default());
        assert_eq!(gateway.call_lines(), vec!["GET /system/status".to_string()]);

        let record = QueueRecord {
            id: 2,
            status: "queued".to_string(),
            ..Default::default()
        };
        assert_eq!(inst.apply_removal(&record).await, RemovalOutcome::Failed);
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_search_targets_series_or_falls_back_to_record_id() {
        let gateway = Arc::new(
            RecordingGateway::new()
                .on(Method::GET, "/system/status", sonarr_status())
                .on(
                    Method::GET,
                    "/queue",
                    json!({
                        "page": 1,
                        "pageSize": 1000,
                        "totalRecords": 2,
                        "records": [
                            {
                                "id": 101,
                                "seriesId": 12,
                                "episodeId": 340,
                                "title": "Show.S02E03.1080p",
                                "size": 2000,
                                "sizeleft": 1990,
                                "status": "warning",
                                "trackedDownloadStatus": "warning",
                                "trackedDownloadState": "downloading",
                                "errorMessage": "The download is stalled with no connections",
                                "protocol": "torrent"
                            },
                            {
                                "id": 102,
                                "title": "Unmatched.Release",
                                "size": 0,
                                "sizeleft": 0,
                                "status": "queued",
                                "trackedDownloadStatus": "ok",
                                "protocol": "torrent"
                            }
                        ]
                    }),
                )
                .on_empty(Method::DELETE, "/queue/101")
                .on_empty(Method::DELETE, "/queue/102")
                .on_empty(Method::POST, "/command"),
        );
        let inst = healthy(&config(10), gateway.clone()).await;

        assert_eq!(inst.remove_stalled().await.removed, 2);

        let searches: Vec<Option<Value>> = gateway
            .calls()
            .into_iter()
            .filter(|c| c.method == Method::POST)
            .map(|c| c.body)
            .collect();
        assert_eq!(
            searches,
            vec![
                Some(json!({"name": "SeriesSearch", "seriesId": 12})),
                Some(json!({"name": "SeriesSearch", "seriesId": 102})),
            ]
        );
    }

    #[tokio::test]
    async fn test_bulk_removal_sends_ids_and_flags() {
        let mut cfg = config(10);
        cfg.stalled.blocklist = false;
        let gateway = Arc::new(RecordingGateway::new().on_empty(Method::DELETE, "/queue/bulk"));
        let inst = instance(&cfg, gateway.clone());

        inst.remove_queue_bulk(&[]).await.unwrap();
        assert!(gateway.calls().is_empty());

        inst.remove_queue_bulk(&[1, 2]).await.unwrap();
        let call = gateway.calls().pop().unwrap();
        assert_eq!(
            call.url,
            "http://sonarr.local/api/v3/queue/bulk?removeFromClient=true&blocklist=false"
        );
        assert_eq!(call.body, Some(json!({"ids": [1, 2]})));
    }
}
