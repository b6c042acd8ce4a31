//! Capture settings and the service configuration file
//!
//! Settings are read fresh by the observer on every completion, so changes
//! made through a [`SettingsHandle`] apply to the next request without a
//! restart. Malformed individual settings fall back to their defaults with
//! a warning instead of failing the whole configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::code_filter::{CodeClasses, CodeFilter};
use crate::patterns::PatternSet;

/// Retention ceiling used when none (or an invalid one) is configured
pub const DEFAULT_MAX_RECORDS: u64 = 100_000;

/// Cleanup runs once a day unless configured otherwise
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 86_400;

/// Configuration file names looked up by [`LoggerConfig::discover_from`]
pub const CONFIG_FILE_NAMES: &[&str] = &["reqlog.yml", "reqlog.yaml"];

/// Errors while reading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Operator-facing capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Records kept after each cleanup
    #[serde(
        default = "default_max_records",
        deserialize_with = "lenient::max_records"
    )]
    pub max_records: u64,

    /// Comma separated patterns monitored in addition to the defaults
    #[serde(default, deserialize_with = "lenient::patterns")]
    pub extra_patterns: String,

    /// Monitor only `extra_patterns`
    #[serde(default, deserialize_with = "lenient::flag_off")]
    pub disable_default_patterns: bool,

    /// Response-code classes persisted to the database
    #[serde(default)]
    pub code_classes: CodeClasses,

    /// Seconds between two retention cleanups
    #[serde(
        default = "default_cleanup_interval",
        deserialize_with = "lenient::cleanup_interval"
    )]
    pub cleanup_interval_secs: u64,
}

fn default_max_records() -> u64 {
    DEFAULT_MAX_RECORDS
}

fn default_cleanup_interval() -> u64 {
    DEFAULT_CLEANUP_INTERVAL_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            extra_patterns: String::new(),
            disable_default_patterns: false,
            code_classes: CodeClasses::default(),
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl Settings {
    /// Effective pattern list before hooks
    pub fn pattern_set(&self) -> PatternSet {
        PatternSet::from_settings(&self.extra_patterns, self.disable_default_patterns)
    }

    pub fn code_filter(&self) -> CodeFilter {
        CodeFilter::new(&self.code_classes)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// Process-wide settings shared by the observer, the retention task and the API
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Settings>>,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings
    pub async fn snapshot(&self) -> Settings {
        self.inner.read().await.clone()
    }

    /// Replace the settings; the next observed request sees the new values
    pub async fn replace(&self, settings: Settings) {
        let mut current = self.inner.write().await;
        *current = settings;
        info!("Capture settings updated");
    }

    /// Modify the settings in place
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        let mut current = self.inner.write().await;
        f(&mut current);
    }
}

/// Admin API server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_enable_cors() -> bool {
    true
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

/// Service configuration file (`reqlog.yml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// File receiving the verbose per-request diagnostic trace
    #[serde(default)]
    pub diagnostic_log: Option<PathBuf>,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub settings: Settings,
}

fn default_database_url() -> String {
    "sqlite://./reqlog.db?mode=rwc".to_string()
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            diagnostic_log: None,
            api: ApiSettings::default(),
            settings: Settings::default(),
        }
    }
}

impl LoggerConfig {
    /// Load config from a specific file path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Parse config from YAML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_str(content)?)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Discover config starting from a specific directory
    ///
    /// Looks for `reqlog.yml` or `reqlog.yaml` in `start_dir` and each of its
    /// parents up to the filesystem root.
    pub fn discover_from(start_dir: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let mut current = start_dir.to_path_buf();

        loop {
            for name in CONFIG_FILE_NAMES {
                let candidate = current.join(name);
                if candidate.exists() {
                    let config = Self::load(&candidate)?;
                    return Ok(Some((candidate, config)));
                }
            }

            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Generate a template config file content
    pub fn template() -> String {
        r#"# reqlog configuration

database_url: "sqlite://./reqlog.db?mode=rwc"

# Verbose trace of every matched request, stored or not
# diagnostic_log: "./reqlog-diagnostic.log"

api:
  bind_addr: "127.0.0.1:8080"
  enable_cors: true

settings:
  # Records kept after the periodic cleanup
  max_records: 100000
  # Comma separated strings matched against outbound URLs, checked before the defaults.
  # Be as specific as possible: a generic string may capture a lot of requests.
  extra_patterns: ""
  disable_default_patterns: false
  code_classes:
    1xx: true
    2xx: true
    3xx: true
    4xx: true
    5xx: true
  cleanup_interval_secs: 86400
"#
        .to_string()
    }
}

/// Deserializers that never fail: malformed values fall back to a default
pub(crate) mod lenient {
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};
    use tracing::warn;

    use super::{DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_MAX_RECORDS};
    use crate::store::MAX_ROW_BOUND;

    #[derive(Deserialize)]
    #[serde(untagged)]
    #[allow(dead_code)]
    enum Loose {
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
        List(Vec<String>),
        Other(IgnoredAny),
    }

    fn flag<'de, D>(deserializer: D, default: bool) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = match Loose::deserialize(deserializer)? {
            Loose::Bool(b) => Some(b),
            Loose::Int(0) => Some(false),
            Loose::Int(1) => Some(true),
            Loose::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" | "" => Some(false),
                _ => None,
            },
            _ => None,
        };

        Ok(value.unwrap_or_else(|| {
            warn!(default = default, "Invalid boolean setting, using default");
            default
        }))
    }

    /// Boolean defaulting to `true`
    pub fn flag_on<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        flag(deserializer, true)
    }

    /// Boolean defaulting to `false`
    pub fn flag_off<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        flag(deserializer, false)
    }

    /// Positive integer, capped to what the database can bind
    fn positive(value: Loose) -> Option<u64> {
        let parsed = match value {
            Loose::Int(n) if n > 0 => Some(n as u64),
            Loose::Float(f) if f >= 1.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                Some(f as u64)
            }
            Loose::Text(s) => s.trim().parse::<u64>().ok().filter(|n| *n > 0),
            _ => None,
        };
        parsed.map(|n| n.min(MAX_ROW_BOUND))
    }

    /// Positive record count; zero, empty or garbage means the default
    pub fn max_records<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(positive(Loose::deserialize(deserializer)?).unwrap_or_else(|| {
            warn!(
                default = DEFAULT_MAX_RECORDS,
                "Invalid max_records setting, using default"
            );
            DEFAULT_MAX_RECORDS
        }))
    }

    pub fn cleanup_interval<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(positive(Loose::deserialize(deserializer)?).unwrap_or_else(|| {
            warn!(
                default = DEFAULT_CLEANUP_INTERVAL_SECS,
                "Invalid cleanup_interval_secs setting, using default"
            );
            DEFAULT_CLEANUP_INTERVAL_SECS
        }))
    }

    /// Pattern string, also accepted as a list of strings
    pub fn patterns<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Loose::deserialize(deserializer)? {
            Loose::Text(s) => s,
            Loose::List(items) => items.join(","),
            _ => {
                warn!("Invalid extra_patterns setting, ignoring it");
                String::new()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.max_records, 100_000);
        assert!(!settings.disable_default_patterns);
        assert_eq!(settings.code_classes, CodeClasses::default());
        assert_eq!(settings.cleanup_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_parse_empty_config() {
        let config = LoggerConfig::parse("").unwrap();

        assert_eq!(config, LoggerConfig::default());
    }

    #[test]
    fn test_parse_template() {
        let config = LoggerConfig::parse(&LoggerConfig::template()).unwrap();

        assert_eq!(config.settings, Settings::default());
        assert_eq!(config.api.bind_addr, "127.0.0.1:8080");
        assert!(config.diagnostic_log.is_none());
    }

    #[test]
    fn test_parse_full_settings() {
        let yaml = r#"
database_url: "sqlite::memory:"
diagnostic_log: /var/log/reqlog.log
settings:
  max_records: 500
  extra_patterns: "myhook.io, api.example.com"
  disable_default_patterns: true
  code_classes:
    4xx: false
  cleanup_interval_secs: 3600
"#;
        let config = LoggerConfig::parse(yaml).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(
            config.diagnostic_log,
            Some(PathBuf::from("/var/log/reqlog.log"))
        );
        assert_eq!(config.settings.max_records, 500);
        assert!(config.settings.disable_default_patterns);
        assert!(!config.settings.code_classes.client_error);
        assert!(config.settings.code_classes.server_error);
        assert_eq!(config.settings.cleanup_interval_secs, 3600);
        assert_eq!(
            config.settings.pattern_set().patterns(),
            &["myhook.io".to_string(), "api.example.com".to_string()]
        );
    }

    #[test]
    fn test_malformed_values_fall_back_to_defaults() {
        let yaml = r#"
settings:
  max_records: "lots"
  disable_default_patterns: "maybe"
  code_classes:
    1xx: "0"
    2xx: {nested: true}
    5xx: 0
  cleanup_interval_secs: -5
"#;
        let settings = LoggerConfig::parse(yaml).unwrap().settings;

        assert_eq!(settings.max_records, DEFAULT_MAX_RECORDS);
        assert!(!settings.disable_default_patterns);
        assert!(!settings.code_classes.informational);
        assert!(settings.code_classes.success);
        assert!(!settings.code_classes.server_error);
        assert_eq!(settings.cleanup_interval_secs, DEFAULT_CLEANUP_INTERVAL_SECS);
    }

    #[test]
    fn test_zero_max_records_means_default() {
        let settings: Settings = serde_json::from_str(r#"{"max_records": 0}"#).unwrap();
        assert_eq!(settings.max_records, DEFAULT_MAX_RECORDS);

        let settings: Settings = serde_json::from_str(r#"{"max_records": ""}"#).unwrap();
        assert_eq!(settings.max_records, DEFAULT_MAX_RECORDS);

        let settings: Settings = serde_json::from_str(r#"{"max_records": "250"}"#).unwrap();
        assert_eq!(settings.max_records, 250);
    }

    #[test]
    fn test_oversized_max_records_is_capped() {
        let settings: Settings =
            serde_json::from_str(r#"{"max_records": 18446744073709551615}"#).unwrap();
        assert_eq!(settings.max_records, i64::MAX as u64);

        let settings: Settings =
            serde_json::from_str(r#"{"max_records": "18446744073709551615"}"#).unwrap();
        assert_eq!(settings.max_records, i64::MAX as u64);
    }

    #[test]
    fn test_extra_patterns_as_list() {
        let yaml = "settings:\n  extra_patterns:\n    - myhook.io\n    - api.example.com\n";
        let settings = LoggerConfig::parse(yaml).unwrap().settings;

        assert_eq!(settings.extra_patterns, "myhook.io,api.example.com");
    }

    #[test]
    fn test_settings_json_round_trip() {
        let mut settings = Settings::default();
        settings.code_classes.set(3, false);
        settings.extra_patterns = "myhook.io".to_string();

        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, settings);
        assert!(json.contains("\"3xx\":false"));
    }

    #[test]
    fn test_discover_from_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join("reqlog.yml"),
            "settings:\n  max_records: 42\n",
        )
        .unwrap();

        let (path, config) = LoggerConfig::discover_from(&nested).unwrap().unwrap();

        assert_eq!(path, dir.path().join("reqlog.yml"));
        assert_eq!(config.settings.max_records, 42);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqlog.yml");

        let mut config = LoggerConfig::default();
        config.settings.max_records = 7;
        config.save(&path).unwrap();

        assert_eq!(LoggerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let result = LoggerConfig::load(Path::new("/nonexistent/reqlog.yml"));

        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[tokio::test]
    async fn test_settings_handle_read_through() {
        let handle = SettingsHandle::new(Settings::default());
        let clone = handle.clone();

        handle
            .update(|s| s.extra_patterns = "myhook.io".to_string())
            .await;

        assert_eq!(clone.snapshot().await.extra_patterns, "myhook.io");

        clone.replace(Settings::default()).await;
        assert_eq!(handle.snapshot().await.extra_patterns, "");
    }
}
