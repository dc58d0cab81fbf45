//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default tick interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 600;

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required per-instance setting is empty
    #[error("Instance '{instance}' is missing required setting '{field}'")]
    MissingField {
        instance: String,
        field: &'static str,
    },

    /// Two instances share the same name
    #[error("Instance '{0}' is defined more than once")]
    DuplicateInstance(String),

    /// Stalled percent threshold outside 0..=100
    #[error("Instance '{instance}' has stalled percent threshold {value}, expected 0-100")]
    InvalidThreshold { instance: String, value: u8 },

    /// Tick interval of zero
    #[error("Interval must be greater than zero seconds")]
    InvalidInterval,
}

/// Process-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Seconds between scheduler ticks (default 600)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Log mutating calls instead of sending them
    #[serde(default)]
    pub dry_run: bool,
    /// Per-request timeout for the HTTP gateway (default 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Page size requested when fetching the download queue (default 1000)
    #[serde(default = "default_queue_page_size")]
    pub queue_page_size: u32,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_queue_page_size() -> u32 {
    1000
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            dry_run: false,
            request_timeout_secs: default_request_timeout_secs(),
            queue_page_size: default_queue_page_size(),
        }
    }
}

/// Stalled download removal policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StalledConfig {
    /// Remove stalled downloads (default true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Also remove the download from the download client (default true)
    #[serde(default = "default_true")]
    pub remove_from_client: bool,
    /// Add the release to the blocklist on removal (default true)
    #[serde(default = "default_true")]
    pub blocklist: bool,
    /// Downloads further along than this percentage are left alone (default 10)
    #[serde(default = "default_percent_threshold")]
    pub percent_threshold: u8,
}

fn default_true() -> bool {
    true
}

fn default_percent_threshold() -> u8 {
    10
}

impl Default for StalledConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remove_from_client: true,
            blocklist: true,
            percent_threshold: default_percent_threshold(),
        }
    }
}

/// Unmonitored library item removal policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UnmonitoredConfig {
    /// Remove unmonitored items (default false)
    #[serde(default)]
    pub enabled: bool,
    /// Delete the files on disk together with the item (default false)
    #[serde(default)]
    pub delete_files: bool,
}

/// One managed server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceConfig {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub stalled: StalledConfig,
    #[serde(default)]
    pub unmonitored: UnmonitoredConfig,
}

impl InstanceConfig {
    /// Create an instance entry with default policies and no connection details
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: String::new(),
            api_key: String::new(),
            stalled: StalledConfig::default(),
            unmonitored: UnmonitoredConfig::default(),
        }
    }

    /// Prefix used for this instance's environment variables
    pub fn env_prefix(&self) -> String {
        self.name.to_uppercase()
    }

    fn apply_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = self.env_prefix();
        let var = |suffix: &str| lookup(&format!("{}_{}", prefix, suffix));

        if let Some(url) = var("URL").filter(|v| !v.is_empty()) {
            self.url = url;
        }
        if let Some(key) = var("KEY").filter(|v| !v.is_empty()) {
            self.api_key = key;
        }
        if let Some(enabled) = var("STALLED_REMOVE").as_deref().and_then(parse_bool) {
            self.stalled.enabled = enabled;
        }
        if let Some(remove) = var("STALLED_REMOVE_FROM_CLIENT")
            .as_deref()
            .and_then(parse_bool)
        {
            self.stalled.remove_from_client = remove;
        }
        if let Some(blocklist) = var("STALLED_BLOCKLIST").as_deref().and_then(parse_bool) {
            self.stalled.blocklist = blocklist;
        }
        if let Some(percent) = var("STALLED_PERCENT").and_then(|v| v.trim().parse::<u8>().ok()) {
            self.stalled.percent_threshold = percent;
        }
        if let Some(enabled) = var("UNMONITORED_REMOVE").as_deref().and_then(parse_bool) {
            self.unmonitored.enabled = enabled;
        }
        if let Some(delete) = var("UNMONITORED_DELETE_FILES")
            .as_deref()
            .and_then(parse_bool)
        {
            self.unmonitored.delete_files = delete;
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply process environment variable overrides to the configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides using an arbitrary variable lookup
    ///
    /// Global variables:
    /// - INTERVAL -> general.interval_secs
    /// - DRY_RUN -> general.dry_run
    /// - REQUEST_TIMEOUT -> general.request_timeout_secs
    /// - APIS -> names of instances to configure from the environment
    ///
    /// Every instance (from the file or from APIS) then reads `<NAME>_URL`,
    /// `<NAME>_KEY`, `<NAME>_STALLED_*` and `<NAME>_UNMONITORED_*`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(interval) = lookup("INTERVAL").and_then(|v| v.trim().parse::<u64>().ok()) {
            self.general.interval_secs = interval;
        }

        if let Some(dry_run) = lookup("DRY_RUN").as_deref().and_then(parse_bool) {
            self.general.dry_run = dry_run;
        }

        if let Some(timeout) = lookup("REQUEST_TIMEOUT").and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.general.request_timeout_secs = timeout;
        }

        if let Some(apis) = lookup("APIS") {
            for name in parse_api_list(&apis) {
                let exists = self
                    .instances
                    .iter()
                    .any(|i| i.name.eq_ignore_ascii_case(&name));
                if !exists {
                    self.instances.push(InstanceConfig::named(name));
                }
            }
        }

        for instance in &mut self.instances {
            instance.apply_overrides(&lookup);
        }
    }

    /// Check the configuration eagerly so bad values fail at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        let mut seen = HashSet::new();
        for instance in &self.instances {
            if !seen.insert(instance.name.to_uppercase()) {
                return Err(ConfigError::DuplicateInstance(instance.name.clone()));
            }
            if instance.url.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    instance: instance.name.clone(),
                    field: "url",
                });
            }
            if instance.api_key.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    instance: instance.name.clone(),
                    field: "api_key",
                });
            }
            if instance.stalled.percent_threshold > 100 {
                return Err(ConfigError::InvalidThreshold {
                    instance: instance.name.clone(),
                    value: instance.stalled.percent_threshold,
                });
            }
        }

        Ok(())
    }

    /// Build the effective configuration
    ///
    /// Starts from the TOML file when given (defaults otherwise), layers the
    /// process environment over values from the optional `.env` file, then
    /// validates the result.
    pub fn resolve(config_path: Option<&Path>, env_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        let file_vars = match env_file {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };

        config.apply_overrides(|key| env::var(key).ok().or_else(|| file_vars.get(key).cloned()));
        config.validate()?;
        Ok(config)
    }
}

/// Accept "true", "1", "yes" as true; "false", "0", "no" as false
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Split an APIS value on spaces, commas and semicolons, upper-casing each name
pub fn parse_api_list(value: &str) -> Vec<String> {
    value
        .split([' ', ',', ';'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_uppercase)
        .collect()
}

/// Parse `KEY=VALUE` lines; keys are upper-cased, malformed lines are ignored
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_uppercase(), value.trim().to_string()))
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .collect()
}

/// Read and parse a `.env` file
pub fn read_env_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(parse_env_file(&content))
}
