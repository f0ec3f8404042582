use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;
use ndz_common::Coordinate;
use serde::{Deserialize, Serialize};

use crate::engine::ExpiryPolicy;
use crate::error::NdzError;
use crate::zone::NoFlyZone;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "NDZ_CONFIG";

/// Upper bound for `zone.retention_secs` (30 days)
pub const MAX_RETENTION_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with the built UI bundle, served at `/`
    #[serde(default)]
    pub static_dir: Option<String>,

    /// Allowed CORS origin; any origin is allowed when unset
    #[serde(default)]
    pub cors_origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_drones_url")]
    pub drones_url: String,

    #[serde(default = "default_pilots_url")]
    pub pilots_url: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_owner_timeout_secs")]
    pub owner_timeout_secs: u64,

    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,

    /// Run one cycle immediately on startup instead of waiting a full interval
    #[serde(default = "default_initial_poll")]
    pub initial_poll: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    #[serde(default = "default_center_x")]
    pub center_x: f64,

    #[serde(default = "default_center_y")]
    pub center_y: f64,

    #[serde(default = "default_radius_km")]
    pub radius_km: f64,

    /// How long a sighting survives without being observed again
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NdzConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub zone: ZoneConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_drones_url() -> String {
    "https://assignments.reaktor.com/birdnest/drones".to_string()
}

fn default_pilots_url() -> String {
    "https://assignments.reaktor.com/birdnest/pilots".to_string()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_owner_timeout_secs() -> u64 {
    10
}

fn default_cycle_timeout_secs() -> u64 {
    60
}

fn default_initial_poll() -> bool {
    true
}

fn default_center_x() -> f64 {
    250_000.0
}

fn default_center_y() -> f64 {
    250_000.0
}

fn default_radius_km() -> f64 {
    100.0
}

fn default_retention_secs() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            cors_origin: None,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            drones_url: default_drones_url(),
            pilots_url: default_pilots_url(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            owner_timeout_secs: default_owner_timeout_secs(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            initial_poll: default_initial_poll(),
        }
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            center_x: default_center_x(),
            center_y: default_center_y(),
            radius_km: default_radius_km(),
            retention_secs: default_retention_secs(),
        }
    }
}

impl Default for NdzConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            server: ServerConfig::default(),
            feed: FeedConfig::default(),
            zone: ZoneConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn owner_timeout(&self) -> Duration {
        Duration::from_secs(self.owner_timeout_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }
}

impl ZoneConfig {
    pub fn no_fly_zone(&self) -> NoFlyZone {
        NoFlyZone::new(Coordinate::new(self.center_x, self.center_y), self.radius_km)
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        let secs = self.retention_secs.min(MAX_RETENTION_SECS) as i64;
        ExpiryPolicy::new(chrono::Duration::seconds(secs))
    }
}

impl NdzConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, NdzError> {
        let config: NdzConfig =
            toml::from_str(content).map_err(|e| NdzError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), NdzError> {
        let positive = [
            ("feed.poll_interval_secs", self.feed.poll_interval_secs),
            ("feed.request_timeout_secs", self.feed.request_timeout_secs),
            ("feed.owner_timeout_secs", self.feed.owner_timeout_secs),
            ("feed.cycle_timeout_secs", self.feed.cycle_timeout_secs),
            ("zone.retention_secs", self.zone.retention_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(NdzError::config(format!("{} must be greater than 0", name)));
            }
        }

        if !self.zone.radius_km.is_finite() || self.zone.radius_km <= 0.0 {
            return Err(NdzError::config(format!(
                "zone.radius_km must be a positive number, got {}",
                self.zone.radius_km
            )));
        }
        if !self.zone.center_x.is_finite() || !self.zone.center_y.is_finite() {
            return Err(NdzError::config("zone center must be finite"));
        }
        if self.zone.retention_secs > MAX_RETENTION_SECS {
            return Err(NdzError::config(format!(
                "zone.retention_secs must be at most {}, got {}",
                MAX_RETENTION_SECS, self.zone.retention_secs
            )));
        }

        for (name, url) in [
            ("feed.drones_url", &self.feed.drones_url),
            ("feed.pilots_url", &self.feed.pilots_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(NdzError::config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        Ok(())
    }
}

pub static CONFIG: OnceLock<NdzConfig> = OnceLock::new();

/// Config file location: `$NDZ_CONFIG` or `config.toml` in the working directory.
pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Load the configuration once for the whole process.
pub fn read_config(path: &str) -> anyhow::Result<&'static NdzConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = NdzConfig::from_file(path)?;
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = NdzConfig::from_toml_str("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.feed.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.zone.radius_km, 100.0);
        assert_eq!(config.zone.retention_secs, 600);
        assert!(config.feed.initial_poll);
    }

    #[test]
    fn test_partial_sections() {
        let config = NdzConfig::from_toml_str(
            r#"
            log_level = "debug"

            [server]
            port = 8080
            cors_origin = "http://127.0.0.1:5173"

            [zone]
            radius_km = 50.0
            retention_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.server_address(), "0.0.0.0:8080");
        assert_eq!(config.server.cors_origin.as_deref(), Some("http://127.0.0.1:5173"));
        assert_eq!(config.zone.no_fly_zone().radius_km, 50.0);
        assert_eq!(config.zone.expiry_policy().retention(), chrono::Duration::minutes(2));
        assert_eq!(config.feed.cycle_timeout_secs, 60);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = NdzConfig::from_toml_str("[feed]\npoll_interval_secs = 0\n").unwrap_err();
        assert!(matches!(err, NdzError::Config(_)));
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn test_rejects_bad_radius_and_url() {
        assert!(NdzConfig::from_toml_str("[zone]\nradius_km = -1.0\n").is_err());
        assert!(NdzConfig::from_toml_str("[feed]\ndrones_url = \"ftp://x\"\n").is_err());
    }

    #[test]
    fn test_rejects_oversized_retention() {
        let err = NdzConfig::from_toml_str("[zone]\nretention_secs = 100000000000000000\n")
            .unwrap_err();
        assert!(matches!(err, NdzError::Config(_)));
        assert!(err.to_string().contains("retention_secs"));

        let config =
            NdzConfig::from_toml_str(&format!("[zone]\nretention_secs = {}\n", MAX_RETENTION_SECS))
                .unwrap();
        assert_eq!(config.zone.expiry_policy().retention(), chrono::Duration::days(30));

        let unchecked = ZoneConfig {
            retention_secs: u64::MAX,
            ..ZoneConfig::default()
        };
        assert_eq!(unchecked.expiry_policy().retention(), chrono::Duration::days(30));
    }

    #[test]
    fn test_rejects_invalid_toml() {
        let err = NdzConfig::from_toml_str("[server\nport = 1").unwrap_err();
        assert!(matches!(err, NdzError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[feed]\npoll_interval_secs = 5").unwrap();
        let config = NdzConfig::from_file(file.path()).unwrap();
        assert_eq!(config.feed.poll_interval_secs, 5);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = NdzConfig::from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
    }
}
