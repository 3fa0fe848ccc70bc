//! Configuration management for the job annotator.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use crate::canonical::CanonicalRules;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    /// URL canonicalization rule table
    #[serde(default)]
    pub canonical: CanonicalRules,

    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether pages get annotated at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Interval between page scans
    #[serde(default = "default_scan_interval")]
    pub scan_interval_ms: u64,

    /// Interval between match list refreshes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,

    /// Wait before retrying a service that was not ready
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_scan_interval(),
            refresh_interval_seconds: default_refresh_interval(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl TimingConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Lowest score the service should return
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Attempts per service request (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Unix socket of the match service
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Give up on a single request after this long
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_scan_interval() -> u64 {
    1000
}

fn default_refresh_interval() -> u64 {
    120
}

fn default_retry_backoff() -> u64 {
    100
}

fn default_min_score() -> f64 {
    0.5
}

fn default_max_attempts() -> u32 {
    2
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/job-matcher.sock")
}

fn default_request_timeout() -> u64 {
    5000
}

impl Config {
    /// `<config dir>/job-annotator/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("job-annotator")
            .join("config.toml")
    }

    /// Read `path`, or the default location when `None`.
    ///
    /// A missing file is normal. An unreadable or malformed one is logged;
    /// both yield defaults, so annotation never fails on configuration.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_config_path);

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No config file at {:?}, using defaults", path);
                return Self::default();
            }
            Err(e) => {
                warn!("Cannot read {:?}: {}, using defaults", path, e);
                return Self::default();
            }
        };

        match toml::from_str(&contents) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                config
            }
            Err(e) => {
                warn!("Invalid config {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    /// Write this configuration as a starting file for editing.
    ///
    /// Refuses to replace an existing file.
    pub fn write_new(&self, path: &Path) -> io::Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Wrote configuration to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::QueryPolicy;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.general.enabled);
        assert_eq!(config.timing.scan_interval(), Duration::from_secs(1));
        assert_eq!(config.timing.refresh_interval(), Duration::from_secs(120));
        assert_eq!(config.timing.retry_backoff(), Duration::from_millis(100));
        assert_eq!(config.matching.min_score, 0.5);
        assert_eq!(config.matching.max_attempts, 2);
        assert_eq!(config.canonical, CanonicalRules::default());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[timing]
scan_interval_ms = 250

[matching]
min_score = 0.6

[canonical]
default_query = "keep"

[service]
socket_path = "/run/user/1000/matcher.sock"
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.timing.scan_interval_ms, 250);
        assert_eq!(config.timing.refresh_interval_seconds, 120);
        assert_eq!(config.matching.min_score, 0.6);
        assert_eq!(config.matching.max_attempts, 2);
        assert_eq!(config.canonical.default_query, QueryPolicy::Keep);
        assert_eq!(config.canonical.rules.len(), 4);
        assert_eq!(
            config.service.socket_path,
            PathBuf::from("/run/user/1000/matcher.sock")
        );
    }

    #[test]
    fn test_written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.timing.scan_interval_ms = 500;
        config.service.socket_path = PathBuf::from("/run/user/1000/matcher.sock");
        config.write_new(&path).unwrap();

        let loaded = Config::load(Some(&path));
        assert_eq!(loaded.timing.scan_interval_ms, 500);
        assert_eq!(loaded.service.socket_path, config.service.socket_path);
        assert_eq!(loaded.canonical, config.canonical);
    }

    #[test]
    fn test_write_new_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timing]\nscan_interval_ms = 250\n").unwrap();

        let err = Config::default().write_new(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(Config::load(Some(&path)).timing.scan_interval_ms, 250);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml")));
        assert_eq!(config.matching.min_score, 0.5);
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timing\nscan_interval_ms = ").unwrap();

        let config = Config::load(Some(&path));
        assert_eq!(config.timing.scan_interval_ms, 1000);
    }
}
