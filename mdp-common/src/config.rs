//! Configuration loading and data folder resolution
//!
//! The pipeline is configured from a single TOML bootstrap file. Every key is
//! optional; anything missing falls back to the built-in defaults below.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--data-dir`, `--config`)
//! 2. Environment variables (`MDP_DATA_DIR`, `MDP_CONFIG`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::time::millis_to_duration;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_DIR_ENV: &str = "MDP_DATA_DIR";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "MDP_CONFIG";

/// Widest bounding box span (degrees) for which raw-degree nearest matching is trusted
pub const MAX_RECOMMENDED_SPAN_DEG: f64 = 10.0;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root of the durable raw tables and tabular outputs
    pub data_dir: Option<PathBuf>,

    pub logging: LoggingConfig,

    pub bounding_box: BoundingBox,

    pub schedule: ScheduleConfig,

    pub http: HttpConfig,

    pub endpoints: EndpointConfig,

    pub fusion: FusionConfig,

    /// Downstream SQLite sink (disabled when absent)
    pub sink: Option<SinkConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr only if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Rectangular lat/lon region restricting which vessel positions are retained
///
/// Defaults cover the northern Baltic (Oulu, Mariehamn, Kotka, Tallinn).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min_lat: 59.4,
            max_lat: 65.0,
            min_lon: 19.9,
            max_lon: 27.0,
        }
    }
}

impl BoundingBox {
    /// Validate coordinate ranges and ordering
    pub fn validate(&self) -> Result<()> {
        let finite = [self.min_lat, self.max_lat, self.min_lon, self.max_lon]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(Error::Config("bounding_box values must be finite".to_string()));
        }
        if !(-90.0..=90.0).contains(&self.min_lat) || !(-90.0..=90.0).contains(&self.max_lat) {
            return Err(Error::Config(format!(
                "bounding_box latitude out of range: [{}, {}]",
                self.min_lat, self.max_lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.min_lon) || !(-180.0..=180.0).contains(&self.max_lon) {
            return Err(Error::Config(format!(
                "bounding_box longitude out of range: [{}, {}]",
                self.min_lon, self.max_lon
            )));
        }
        if self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(Error::Config(format!(
                "bounding_box min exceeds max: lat [{}, {}], lon [{}, {}]",
                self.min_lat, self.max_lat, self.min_lon, self.max_lon
            )));
        }
        Ok(())
    }

    /// Largest of the latitude and longitude spans, in degrees
    pub fn max_span(&self) -> f64 {
        (self.max_lat - self.min_lat).max(self.max_lon - self.min_lon)
    }
}

/// Polling and fusion cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub positions_interval_ms: u64,
    pub sea_state_interval_ms: u64,
    pub port_calls_interval_ms: u64,
    pub fusion_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            positions_interval_ms: 10_000,
            sea_state_interval_ms: 600_000,
            port_calls_interval_ms: 900_000,
            fusion_interval_ms: 60_000,
        }
    }
}

impl ScheduleConfig {
    pub fn positions_interval(&self) -> Duration {
        millis_to_duration(self.positions_interval_ms)
    }

    pub fn sea_state_interval(&self) -> Duration {
        millis_to_duration(self.sea_state_interval_ms)
    }

    pub fn port_calls_interval(&self) -> Duration {
        millis_to_duration(self.port_calls_interval_ms)
    }

    pub fn fusion_interval(&self) -> Duration {
        millis_to_duration(self.fusion_interval_ms)
    }
}

/// Upstream HTTP behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout_ms: u64,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// First backoff delay; doubles on every retry
    pub backoff_base_ms: u64,

    /// Sent as `User-Agent` and `Digitraffic-User`
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 3,
            backoff_base_ms: 1_000,
            user_agent: format!("mdp-pipeline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        millis_to_duration(self.timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        millis_to_duration(self.backoff_base_ms)
    }
}

/// Upstream endpoint URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub positions: String,
    pub sea_state: String,
    pub port_calls: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            positions: "https://meri.digitraffic.fi/api/ais/v1/locations".to_string(),
            sea_state: "https://meri.digitraffic.fi/api/sse/v1/measurements".to_string(),
            port_calls: "https://meri.digitraffic.fi/api/port-call/v1/port-calls".to_string(),
        }
    }
}

/// How vessel positions are joined with port calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Vessels without a port call are dropped
    #[default]
    Inner,
    /// Vessels without a port call are kept with empty port-call columns
    LeftOuter,
}

/// Fusion behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub join_kind: JoinKind,

    /// Drop rows whose nearest sea-state site is farther than this (raw degrees)
    pub max_match_distance_deg: Option<f64>,
}

/// Downstream SQLite sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub database_path: PathBuf,
}

impl TomlConfig {
    /// Reject configurations the pipeline cannot run with
    ///
    /// Wide bounding boxes are accepted with a warning: nearest sea-state
    /// matching uses raw-degree Euclidean distance, which stops tracking true
    /// distance once the region spans more than a few degrees.
    pub fn validate(&self) -> Result<()> {
        self.bounding_box.validate()?;

        let intervals = [
            ("schedule.positions_interval_ms", self.schedule.positions_interval_ms),
            ("schedule.sea_state_interval_ms", self.schedule.sea_state_interval_ms),
            ("schedule.port_calls_interval_ms", self.schedule.port_calls_interval_ms),
            ("schedule.fusion_interval_ms", self.schedule.fusion_interval_ms),
            ("http.timeout_ms", self.http.timeout_ms),
        ];
        for (key, value) in intervals {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", key)));
            }
        }

        if let Some(max) = self.fusion.max_match_distance_deg {
            if !max.is_finite() || max < 0.0 {
                return Err(Error::Config(format!(
                    "fusion.max_match_distance_deg must be a non-negative number, got {}",
                    max
                )));
            }
        }

        if self.bounding_box.max_span() > MAX_RECOMMENDED_SPAN_DEG {
            warn!(
                span_deg = self.bounding_box.max_span(),
                "Bounding box spans more than {} degrees; raw-degree nearest sea-state matching is no longer proportional to true distance",
                MAX_RECOMMENDED_SPAN_DEG
            );
        }

        Ok(())
    }
}

/// Load TOML config from `path`
///
/// A missing file is not an error: a warning is logged and defaults are used.
/// A file that exists but cannot be read or parsed is a `Config` error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve config file location
///
/// Priority: CLI argument → `MDP_CONFIG` → `<config_dir>/mdp/config.toml`.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .map(|d| d.join("mdp").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("mdp.toml"))
}

/// Resolve the data folder
///
/// Priority: CLI argument → `MDP_DATA_DIR` → TOML `data_dir` → platform default.
pub fn resolve_data_dir(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.data_dir {
        return path.clone();
    }

    default_data_dir()
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mdp"))
        .unwrap_or_else(|| PathBuf::from("./mdp_data"))
}
