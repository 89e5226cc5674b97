//! TOML Configuration File Support
//!
//! Centralized configuration loading for the panel daemon, with an optional
//! TOML file at `~/.config/homepanel/homepanel.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/homepanel/homepanel.toml` (typically `~/.config/homepanel/homepanel.toml`)
//! - The dedup log defaults to `$XDG_DATA_HOME/homepanel/feeds.db`
//!
//! # Example Configuration
//!
//! ```toml
//! [display]
//! width = 20
//! height = 4
//! refresh_secs = 4
//! banner = ["Guten Morgen!", "", "            äöüÄÖÜß°"]
//!
//! [feed]
//! url = "http://www.tagesschau.de/xml/rss2"
//! staleness_hours = 12
//! refresh_on_sight = false
//!
//! [hub]
//! url = "http://homematic-ccu2/config/xmlapi/"
//!
//! [weather]
//! lat = "48.522659"
//! lon = "9.05222"
//! app_id = "0123456789abcdef"
//!
//! [stats]
//! interfaces = ["wlan0", "eth0"]
//!
//! [sensor]
//! device_dir = "/sys/bus/iio/devices/iio:device0"
//! interval_secs = 5
//!
//! [http]
//! timeout_secs = 10
//! ```
//!
//! # Environment Variables
//!
//! | Variable                   | Overrides            |
//! |----------------------------|----------------------|
//! | `HOMEPANEL_FEED_URL`       | `feed.url`           |
//! | `HOMEPANEL_FEED_DB`        | `feed.db_path`       |
//! | `HOMEPANEL_HUB_URL`        | `hub.url`            |
//! | `HOMEPANEL_WEATHER_APPID`  | `weather.app_id`     |
//! | `HOMEPANEL_REFRESH_SECS`   | `display.refresh_secs` |
//! | `HOMEPANEL_SENSOR_DIR`     | `sensor.device_dir`  |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dedup::{DedupConfig, RefreshPolicy};
use crate::render::RenderConfig;
use crate::sensor::{SamplerConfig, DEFAULT_DEVICE_DIR};
use crate::sources::{BackoffConfig, WeatherQuery};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Display section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayToml {
    /// Columns per row
    pub width: Option<usize>,

    /// Number of rows
    pub height: Option<usize>,

    /// Seconds each text page is shown
    pub refresh_secs: Option<u64>,

    /// Clock redraw interval in milliseconds
    pub clock_refresh_ms: Option<u64>,

    /// Greeting lines shown at startup
    pub banner: Option<Vec<String>>,

    /// Seconds the greeting is shown
    pub banner_hold_secs: Option<u64>,
}

/// Feed section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedToml {
    /// RSS feed URL
    pub url: Option<String>,

    /// Dedup log path
    pub db_path: Option<String>,

    /// Hours a shown item stays suppressed
    pub staleness_hours: Option<u64>,

    /// Refresh the timestamp of items seen again
    pub refresh_on_sight: Option<bool>,

    /// Log length before compaction is considered
    pub compact_after_lines: Option<usize>,
}

/// Hub section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubToml {
    /// XML API directory URL
    pub url: Option<String>,
}

/// Weather section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherToml {
    /// API root URL
    pub base_url: Option<String>,

    /// Latitude
    pub lat: Option<String>,

    /// Longitude
    pub lon: Option<String>,

    /// Description language
    pub lang: Option<String>,

    /// Unit system
    pub units: Option<String>,

    /// API key
    pub app_id: Option<String>,

    /// Forecast slots shown
    pub forecast_entries: Option<usize>,
}

/// Statistics section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsToml {
    /// Network interfaces to report
    pub interfaces: Option<Vec<String>>,

    /// Path of the `vcgencmd` utility
    pub vcgencmd: Option<String>,
}

/// Sensor section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorToml {
    /// IIO device directory
    pub device_dir: Option<String>,

    /// Seconds between samples
    pub interval_secs: Option<u64>,

    /// Extra attempts after a failed read
    pub retries: Option<u32>,
}

/// HTTP section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpToml {
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Backoff after the first failure, in milliseconds
    pub initial_backoff_ms: Option<u64>,

    /// Backoff cap, in milliseconds
    pub max_backoff_ms: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelToml {
    /// Display configuration section
    pub display: DisplayToml,

    /// Feed configuration section
    pub feed: FeedToml,

    /// Hub configuration section
    pub hub: HubToml,

    /// Weather configuration section
    pub weather: WeatherToml,

    /// Statistics configuration section
    pub stats: StatsToml,

    /// Sensor configuration section
    pub sensor: SensorToml,

    /// HTTP configuration section
    pub http: HttpToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for the panel daemon
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct PanelConfig {
    /// Display geometry and timing
    pub render: RenderConfig,

    /// RSS feed URL
    pub feed_url: String,

    /// Dedup log path
    pub feed_db: PathBuf,

    /// Dedup behaviour
    pub dedup: DedupConfig,

    /// Hub XML API directory URL
    pub hub_url: String,

    /// Weather API parameters
    pub weather: WeatherQuery,

    /// Forecast slots shown
    pub forecast_entries: usize,

    /// Network interfaces to report
    pub interfaces: Vec<String>,

    /// Path of the `vcgencmd` utility
    pub vcgencmd: String,

    /// IIO device directory of the sensor
    pub sensor_dir: PathBuf,

    /// Sensor sampling cadence
    pub sampler: SamplerConfig,

    /// HTTP request timeout
    pub http_timeout: Duration,

    /// Per-source poll backoff
    pub backoff: BackoffConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            feed_url: "http://www.tagesschau.de/xml/rss2".to_string(),
            feed_db: default_feed_db(),
            dedup: DedupConfig::default(),
            hub_url: "http://homematic-ccu2/config/xmlapi/".to_string(),
            weather: WeatherQuery::default(),
            forecast_entries: 4,
            interfaces: vec!["wlan0".to_string(), "eth0".to_string()],
            vcgencmd: "/opt/vc/bin/vcgencmd".to_string(),
            sensor_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            sampler: SamplerConfig::default(),
            http_timeout: Duration::from_secs(10),
            backoff: BackoffConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl PanelConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Reject values the daemon cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.width == 0 || self.render.height == 0 {
            return Err(ConfigError::ValidationError(format!(
                "display must be at least 1x1, got {}x{}",
                self.render.width, self.render.height
            )));
        }
        if self.render.refresh.is_zero() {
            return Err(ConfigError::ValidationError(
                "display.refresh_secs must be positive".to_string(),
            ));
        }
        if self.render.clock_refresh.is_zero() {
            return Err(ConfigError::ValidationError(
                "display.clock_refresh_ms must be positive".to_string(),
            ));
        }
        if self.sampler.interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "sensor.interval_secs must be positive".to_string(),
            ));
        }
        if self.backoff.initial_backoff_ms > self.backoff.max_backoff_ms {
            return Err(ConfigError::ValidationError(format!(
                "http.initial_backoff_ms ({}) exceeds http.max_backoff_ms ({})",
                self.backoff.initial_backoff_ms, self.backoff.max_backoff_ms
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/homepanel/homepanel.toml` or
/// `~/.config/homepanel/homepanel.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("homepanel").join("homepanel.toml"))
}

/// Default dedup log location, `feeds.db` in the working directory as a fallback
#[must_use]
pub fn default_feed_db() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("homepanel").join("feeds.db"))
        .unwrap_or_else(|| PathBuf::from("feeds.db"))
}

/// Load configuration from all sources with proper priority
///
/// CLI overrides are not handled here; apply [`ConfigOverrides`] afterwards.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<PanelConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read, parsed or
/// validated.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<PanelConfig, ConfigError> {
    let mut config = PanelConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: PanelToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut PanelConfig, toml: &PanelToml) {
    // Display settings
    if let Some(width) = toml.display.width {
        config.render.width = width;
    }
    if let Some(height) = toml.display.height {
        config.render.height = height;
    }
    if let Some(secs) = toml.display.refresh_secs {
        config.render.refresh = Duration::from_secs(secs);
    }
    if let Some(ms) = toml.display.clock_refresh_ms {
        config.render.clock_refresh = Duration::from_millis(ms);
    }
    if let Some(ref banner) = toml.display.banner {
        config.render.banner = banner.clone();
    }
    if let Some(secs) = toml.display.banner_hold_secs {
        config.render.banner_hold = Duration::from_secs(secs);
    }

    // Feed settings
    if let Some(ref url) = toml.feed.url {
        config.feed_url = url.clone();
    }
    if let Some(ref path) = toml.feed.db_path {
        config.feed_db = PathBuf::from(path);
    }
    if let Some(hours) = toml.feed.staleness_hours {
        config.dedup.staleness_limit = Duration::from_secs(hours.saturating_mul(3600));
    }
    if let Some(refresh) = toml.feed.refresh_on_sight {
        config.dedup.policy = if refresh {
            RefreshPolicy::RefreshOnSight
        } else {
            RefreshPolicy::WriteOnce
        };
    }
    if let Some(lines) = toml.feed.compact_after_lines {
        config.dedup.compact_after_lines = lines;
    }

    // Hub settings
    if let Some(ref url) = toml.hub.url {
        config.hub_url = url.clone();
    }

    // Weather settings
    if let Some(ref base_url) = toml.weather.base_url {
        config.weather.base_url = base_url.clone();
    }
    if let Some(ref lat) = toml.weather.lat {
        config.weather.lat = lat.clone();
    }
    if let Some(ref lon) = toml.weather.lon {
        config.weather.lon = lon.clone();
    }
    if let Some(ref lang) = toml.weather.lang {
        config.weather.lang = lang.clone();
    }
    if let Some(ref units) = toml.weather.units {
        config.weather.units = units.clone();
    }
    if let Some(ref app_id) = toml.weather.app_id {
        config.weather.app_id = app_id.clone();
    }
    if let Some(entries) = toml.weather.forecast_entries {
        config.forecast_entries = entries;
    }

    // Statistics settings
    if let Some(ref interfaces) = toml.stats.interfaces {
        config.interfaces = interfaces.clone();
    }
    if let Some(ref vcgencmd) = toml.stats.vcgencmd {
        config.vcgencmd = vcgencmd.clone();
    }

    // Sensor settings
    if let Some(ref dir) = toml.sensor.device_dir {
        config.sensor_dir = PathBuf::from(dir);
    }
    if let Some(secs) = toml.sensor.interval_secs {
        config.sampler.interval = Duration::from_secs(secs);
    }
    if let Some(retries) = toml.sensor.retries {
        config.sampler.retries = retries;
    }

    // HTTP settings
    if let Some(secs) = toml.http.timeout_secs {
        config.http_timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = toml.http.initial_backoff_ms {
        config.backoff.initial_backoff_ms = ms;
    }
    if let Some(ms) = toml.http.max_backoff_ms {
        config.backoff.max_backoff_ms = ms;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut PanelConfig) {
    if let Ok(url) = std::env::var("HOMEPANEL_FEED_URL") {
        config.feed_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(path) = std::env::var("HOMEPANEL_FEED_DB") {
        config.feed_db = PathBuf::from(path);
        config.source = ConfigSource::Env;
    }
    if let Ok(url) = std::env::var("HOMEPANEL_HUB_URL") {
        config.hub_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(app_id) = std::env::var("HOMEPANEL_WEATHER_APPID") {
        config.weather.app_id = app_id;
        config.source = ConfigSource::Env;
    }
    if let Ok(refresh) = std::env::var("HOMEPANEL_REFRESH_SECS") {
        if let Ok(secs) = refresh.parse::<u64>() {
            config.render.refresh = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(dir) = std::env::var("HOMEPANEL_SENSOR_DIR") {
        config.sensor_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Feed URL override
    pub feed_url: Option<String>,

    /// Hub URL override
    pub hub_url: Option<String>,

    /// Page hold override (seconds)
    pub refresh_secs: Option<u64>,

    /// Sensor directory override
    pub sensor_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set feed URL override
    #[must_use]
    pub fn with_feed_url(mut self, url: String) -> Self {
        self.feed_url = Some(url);
        self
    }

    /// Set hub URL override
    #[must_use]
    pub fn with_hub_url(mut self, url: String) -> Self {
        self.hub_url = Some(url);
        self
    }

    /// Set page hold override
    #[must_use]
    pub fn with_refresh_secs(mut self, secs: u64) -> Self {
        self.refresh_secs = Some(secs);
        self
    }

    /// Set sensor directory override
    #[must_use]
    pub fn with_sensor_dir(mut self, dir: PathBuf) -> Self {
        self.sensor_dir = Some(dir);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut PanelConfig) {
        if self.feed_url.is_some()
            || self.hub_url.is_some()
            || self.refresh_secs.is_some()
            || self.sensor_dir.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.feed_url {
            config.feed_url = url.clone();
        }
        if let Some(ref url) = self.hub_url {
            config.hub_url = url.clone();
        }
        if let Some(secs) = self.refresh_secs {
            config.render.refresh = Duration::from_secs(secs);
        }
        if let Some(ref dir) = self.sensor_dir {
            config.sensor_dir = dir.clone();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

    /// Serialize tests that load config, starting from a clean environment.
    fn env_guard() -> parking_lot::MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock();
        clear_config_env_vars();
        guard
    }

    /// Clean up all environment variables used by config loading.
    fn clear_config_env_vars() {
        std::env::remove_var("HOMEPANEL_FEED_URL");
        std::env::remove_var("HOMEPANEL_FEED_DB");
        std::env::remove_var("HOMEPANEL_HUB_URL");
        std::env::remove_var("HOMEPANEL_WEATHER_APPID");
        std::env::remove_var("HOMEPANEL_REFRESH_SECS");
        std::env::remove_var("HOMEPANEL_SENSOR_DIR");
    }

    fn load(toml_content: &str) -> Result<PanelConfig, ConfigError> {
        let _env = env_guard();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();
        load_config_from_path(Some(file.path().to_path_buf()))
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = PanelConfig::default();

        assert_eq!(config.render.width, 20);
        assert_eq!(config.render.height, 4);
        assert_eq!(config.render.refresh, Duration::from_secs(4));
        assert_eq!(config.dedup.staleness_limit, Duration::from_secs(12 * 3600));
        assert_eq!(config.dedup.policy, RefreshPolicy::WriteOnce);
        assert_eq!(config.interfaces, vec!["wlan0".to_string(), "eth0".to_string()]);
        assert_eq!(config.forecast_entries, 4);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.ends_with("homepanel/homepanel.toml"));
        }
        assert!(default_feed_db().ends_with("feeds.db"));
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_valid_toml() {
        let config = load(
            r#"
[display]
width = 16
height = 2
refresh_secs = 6
clock_refresh_ms = 250
banner = ["Hallo"]
banner_hold_secs = 1

[feed]
db_path = "/tmp/panel-feeds.db"
staleness_hours = 24
refresh_on_sight = true
compact_after_lines = 50

[weather]
lat = "52.52"
lon = "13.40"
lang = "en"
forecast_entries = 2

[stats]
interfaces = ["end0"]
vcgencmd = "/usr/bin/vcgencmd"

[sensor]
interval_secs = 30
retries = 3

[http]
timeout_secs = 3
initial_backoff_ms = 1000
max_backoff_ms = 60000
"#,
        )
        .unwrap();

        assert_eq!(config.render.width, 16);
        assert_eq!(config.render.height, 2);
        assert_eq!(config.render.clock_refresh, Duration::from_millis(250));
        assert_eq!(config.render.banner, vec!["Hallo".to_string()]);
        assert_eq!(config.render.banner_hold, Duration::from_secs(1));
        assert_eq!(config.dedup.staleness_limit, Duration::from_secs(24 * 3600));
        assert_eq!(config.dedup.policy, RefreshPolicy::RefreshOnSight);
        assert_eq!(config.dedup.compact_after_lines, 50);
        assert_eq!(config.weather.lat, "52.52");
        assert_eq!(config.weather.lang, "en");
        assert_eq!(config.forecast_entries, 2);
        assert_eq!(config.interfaces, vec!["end0".to_string()]);
        assert_eq!(config.vcgencmd, "/usr/bin/vcgencmd");
        assert_eq!(config.sampler.interval, Duration::from_secs(30));
        assert_eq!(config.sampler.retries, 3);
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert_eq!(config.backoff.initial_backoff_ms, 1000);
        assert_eq!(config.backoff.max_backoff_ms, 60_000);
        assert!(config.config_file_path.is_some());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = load(
            r#"
[hub]
url = "http://ccu.local/config/xmlapi/"
"#,
        )
        .unwrap();

        // Default values should be preserved
        assert_eq!(config.render.width, 20);
        assert_eq!(config.forecast_entries, 4);
        assert_eq!(config.dedup.policy, RefreshPolicy::WriteOnce);
    }

    #[test]
    fn test_missing_file_graceful() {
        let _env = env_guard();

        let path = PathBuf::from("/nonexistent/path/homepanel.toml");
        let config = load_config_from_path(Some(path)).unwrap();

        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_malformed_toml_error() {
        let result = load(
            r#"
[display
width = "wide"
"#,
        );
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let result = load("[display]\nwidth = \"wide\"\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = load("[display]\nheight = 0\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));

        let result = load("[http]\ninitial_backoff_ms = 10\nmax_backoff_ms = 5\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    // =========================================================================
    // Priority Ordering Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let _env = env_guard();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[hub]\nurl = \"http://file-hub/\"\n[display]\nrefresh_secs = 6\n").unwrap();

        std::env::set_var("HOMEPANEL_HUB_URL", "http://env-hub/");
        std::env::set_var("HOMEPANEL_REFRESH_SECS", "11");
        let config = load_config_from_path(Some(file.path().to_path_buf()));
        clear_config_env_vars();
        let config = config.unwrap();

        assert_eq!(config.hub_url, "http://env-hub/");
        assert_eq!(config.render.refresh, Duration::from_secs(11));
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_unparsable_env_refresh_keeps_file_value() {
        let _env = env_guard();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[display]\nrefresh_secs = 6\n").unwrap();

        std::env::set_var("HOMEPANEL_REFRESH_SECS", "soon");
        let config = load_config_from_path(Some(file.path().to_path_buf()));
        clear_config_env_vars();
        let config = config.unwrap();

        assert_eq!(config.render.refresh, Duration::from_secs(6));
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_huge_staleness_saturates() {
        let config = load(&format!("[feed]\nstaleness_hours = {}\n", i64::MAX)).unwrap();
        assert_eq!(config.dedup.staleness_limit, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = PanelConfig::default();
        config.feed_url = "http://env-feed/".to_string();
        config.set_source(ConfigSource::Env);

        ConfigOverrides::new()
            .with_feed_url("http://cli-feed/".to_string())
            .apply(&mut config);

        assert_eq!(config.feed_url, "http://cli-feed/");
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    // =========================================================================
    // ConfigOverrides Tests
    // =========================================================================

    #[test]
    fn test_config_overrides_apply() {
        let mut config = PanelConfig::default();

        ConfigOverrides::new()
            .with_hub_url("http://hub/".to_string())
            .with_refresh_secs(9)
            .with_sensor_dir(PathBuf::from("/tmp/iio"))
            .apply(&mut config);

        assert_eq!(config.hub_url, "http://hub/");
        assert_eq!(config.render.refresh, Duration::from_secs(9));
        assert_eq!(config.sensor_dir, PathBuf::from("/tmp/iio"));
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_config_overrides_empty_no_change() {
        let mut config = PanelConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::Cli), "CLI");
        assert_eq!(format!("{}", ConfigSource::Env), "environment");
        assert_eq!(format!("{}", ConfigSource::File), "config file");
        assert_eq!(format!("{}", ConfigSource::Default), "default");
    }

    #[test]
    fn test_config_error_display() {
        let read_err = ConfigError::ReadError {
            path: PathBuf::from("/test/path"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let msg = format!("{}", read_err);
        assert!(msg.contains("/test/path"));
        assert!(msg.contains("Failed to read"));
    }
}
