//! Application configuration
//!
//! Loaded from a TOML file, by default
//! `~/.config/texnouz-roaming/config.toml`. Every field has a default, so an
//! empty file (or no file at all) yields a working hub with no partners.
//!
//! ```toml
//! [network]
//! id = "DE-GEF"
//! name = "GraphDefined roaming"
//!
//! [queue]
//! enabled = true
//! flush_interval_secs = 30
//!
//! [[adapters]]
//! id = "hubject-test"
//! deferred = true
//! item_types = ["evse", "evse_status"]
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::propagation::{PipelineOptions, PushItem, DEFAULT_QUEUE_CAPACITY};
use crate::domain::fleet::HistoryLimits;
use crate::shared::retry::RetryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("texnouz-roaming")
        .join("config.toml")
}

// ── Sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_network_id")]
    pub id: String,

    #[serde(default = "default_network_name")]
    pub name: String,

    /// Authorizator id results produced by the hub itself carry.
    #[serde(default = "default_hub_id")]
    pub hub_id: String,
}

fn default_network_id() -> String {
    "texnouz".to_string()
}

fn default_network_name() -> String {
    "Texnouz roaming network".to_string()
}

fn default_hub_id() -> String {
    "texnouz-hub".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            id: default_network_id(),
            name: default_network_name(),
            hub_id: default_hub_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error or a full `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "plain" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "plain".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Admin status entries kept per entity.
    #[serde(default = "default_history_size")]
    pub admin_history_size: usize,

    /// Operational status entries kept per entity.
    #[serde(default = "default_history_size")]
    pub status_history_size: usize,
}

fn default_history_size() -> usize {
    15
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            admin_history_size: default_history_size(),
            status_history_size: default_history_size(),
        }
    }
}

impl StatusConfig {
    pub fn history_limits(&self) -> Result<HistoryLimits, ConfigError> {
        let admin_status = NonZeroUsize::new(self.admin_history_size)
            .ok_or_else(|| ConfigError::Invalid("status.admin_history_size must be at least 1".into()))?;
        let status = NonZeroUsize::new(self.status_history_size)
            .ok_or_else(|| ConfigError::Invalid("status.status_history_size must be at least 1".into()))?;
        Ok(HistoryLimits { admin_status, status })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationConfig {
    #[serde(default = "default_true")]
    pub parallel_adapters: bool,

    /// Per-attempt timeout; 0 disables it.
    #[serde(default = "default_item_timeout_ms")]
    pub item_timeout_ms: u64,

    /// Overall budget of one batch; 0 disables it.
    #[serde(default)]
    pub batch_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_item_timeout_ms() -> u64 {
    10_000
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            parallel_adapters: true,
            item_timeout_ms: default_item_timeout_ms(),
            batch_timeout_ms: 0,
        }
    }
}

impl PropagationConfig {
    pub fn item_timeout(&self) -> Option<Duration> {
        (self.item_timeout_ms > 0).then(|| Duration::from_millis(self.item_timeout_ms))
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        (self.batch_timeout_ms > 0).then(|| Duration::from_millis(self.batch_timeout_ms))
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            parallel_adapters: self.parallel_adapters,
            item_timeout: self.item_timeout(),
        }
    }
}

/// Deferred delivery for adapters marked `deferred = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Master switch; when off, `deferred` adapters push directly.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Time allowed for the final flush on shutdown.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_flush_interval() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    300_000
}

fn default_drain_timeout() -> u64 {
    30
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_queue_capacity(),
            flush_interval_secs: default_flush_interval(),
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

impl QueueConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address of the Prometheus scrape endpoint, e.g. "0.0.0.0:9185".
    /// Metrics are recorded but not exported when unset.
    #[serde(default)]
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// Logs every push and answers success.
    #[default]
    DryRun,
}

/// One roaming partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub id: String,

    #[serde(default)]
    pub kind: AdapterKind,

    #[serde(default)]
    pub admin_down: bool,

    #[serde(default)]
    pub out_of_service: bool,

    /// Route pushes through the deferred delivery queue.
    #[serde(default)]
    pub deferred: bool,

    /// Item types this partner receives; empty means all.
    #[serde(default)]
    pub item_types: Vec<String>,
}

impl AdapterConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: AdapterKind::default(),
            admin_down: false,
            out_of_service: false,
            deferred: false,
            item_types: Vec::new(),
        }
    }
}

// ── AppConfig ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub propagation: PropagationConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
}

impl AppConfig {
    /// Load and validate config from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, content).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.id.trim().is_empty() {
            return Err(ConfigError::Invalid("network.id must not be empty".into()));
        }
        if self.network.hub_id.trim().is_empty() {
            return Err(ConfigError::Invalid("network.hub_id must not be empty".into()));
        }
        if !matches!(self.logging.format.as_str(), "plain" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"plain\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        self.status.history_limits()?;

        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid("queue.capacity must be at least 1".into()));
        }
        if self.queue.max_attempts == 0 {
            return Err(ConfigError::Invalid("queue.max_attempts must be at least 1".into()));
        }
        if self.queue.flush_interval_secs == 0 {
            return Err(ConfigError::Invalid("queue.flush_interval_secs must be at least 1".into()));
        }
        if self.queue.backoff_multiplier.is_nan() || self.queue.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid("queue.backoff_multiplier must be >= 1.0".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for adapter in &self.adapters {
            if adapter.id.trim().is_empty() {
                return Err(ConfigError::Invalid("adapter id must not be empty".into()));
            }
            if adapter.id == self.network.hub_id {
                return Err(ConfigError::Invalid(format!(
                    "adapter {} uses the hub id",
                    adapter.id
                )));
            }
            if !seen.insert(adapter.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate adapter id {}", adapter.id)));
            }
            if let Some(unknown) = adapter
                .item_types
                .iter()
                .find(|t| !PushItem::ITEM_TYPES.contains(&t.as_str()))
            {
                return Err(ConfigError::Invalid(format!(
                    "adapter {}: unknown item type {unknown:?}",
                    adapter.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.network.hub_id, "texnouz-hub");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.status.history_limits().unwrap(), HistoryLimits::default());
        assert_eq!(config.propagation.item_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.propagation.batch_timeout(), None);
        assert!(config.adapters.is_empty());
    }

    #[test]
    fn parses_adapters_and_queue() {
        let config = AppConfig::from_toml(
            r#"
            [network]
            id = "DE-GEF"

            [queue]
            max_attempts = 3
            initial_delay_ms = 500

            [[adapters]]
            id = "partner-a"
            deferred = true
            item_types = ["evse", "evse_status"]

            [[adapters]]
            id = "partner-b"
            kind = "dry_run"
            admin_down = true
            "#,
        )
        .unwrap();

        assert_eq!(config.network.id, "DE-GEF");
        assert_eq!(config.adapters.len(), 2);
        assert!(config.adapters[0].deferred);
        assert_eq!(config.adapters[0].item_types, vec!["evse", "evse_status"]);
        assert!(config.adapters[1].admin_down);

        let retry = config.queue.retry();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay, Duration::from_millis(500));
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            "[status]\nadmin_history_size = 0",
            "[logging]\nformat = \"xml\"",
            "[queue]\nmax_attempts = 0",
            "[[adapters]]\nid = \"a\"\n[[adapters]]\nid = \"a\"",
            "[[adapters]]\nid = \"a\"\nitem_types = [\"tariff\"]",
            "[[adapters]]\nid = \"texnouz-hub\"",
        ];
        for case in cases {
            assert!(
                matches!(AppConfig::from_toml(case), Err(ConfigError::Invalid(_))),
                "accepted: {case}"
            );
        }
        assert!(matches!(AppConfig::from_toml("[[adapters]]\nid = \"a\"\nkind = \"ocpi\""), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("roaming-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let mut config = AppConfig::default();
        config.adapters.push(AdapterConfig::new("partner-a"));
        config.metrics.listen = Some("127.0.0.1:9185".into());
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.adapters[0].id, "partner-a");
        assert_eq!(loaded.metrics.listen.as_deref(), Some("127.0.0.1:9185"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = AppConfig::load("/nonexistent/roaming.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
