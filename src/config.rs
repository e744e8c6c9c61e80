//! Viewer configuration loaded from `config.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::overlay::GeoBounds;

/// Log level accepted in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// Top-level viewer configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ViewerConfig {
    /// Base URL of the simulation API (no trailing slash needed)
    pub api_base: String,
    /// Graph preset passed to the generate endpoint
    pub preset: String,
    /// Initial value of the node count slider
    pub node_count: u32,
    pub autoplay_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// Level for this crate's own log lines; Debug when unset.
    pub log_level: Option<LogLevel>,
    pub map: MapConfig,
    pub fallback: FallbackConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            preset: "islamabad_uniform".to_string(),
            node_count: 3000,
            autoplay_interval_ms: 650,
            request_timeout_secs: 30,
            log_level: None,
            map: MapConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

/// Map backend settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MapConfig {
    pub enabled: bool,
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: f64,
    /// Raster tile template with `{z}`, `{x}` and `{y}` placeholders.
    /// Without it the map backend is unavailable.
    pub tile_url: Option<String>,
    /// Credit line drawn in the corner of the map.
    pub attribution: Option<String>,
    pub user_agent: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            center_lat: 33.69,
            center_lng: 73.055,
            zoom: 12.0,
            tile_url: None,
            attribution: None,
            user_agent: concat!("epigraph-viewer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl MapConfig {
    /// Why the map cannot be shown, or `None` when it can.
    pub fn unavailable_reason(&self) -> Option<&'static str> {
        if !self.enabled {
            Some("Map disabled in config.toml")
        } else if self.tile_url.as_deref().is_none_or(|url| url.trim().is_empty()) {
            Some("No map tile source configured (map.tile-url)")
        } else {
            None
        }
    }
}

/// Bounding box for the map-less network view.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FallbackConfig {
    pub bounds: GeoBounds,
}

impl ViewerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Returns
    /// * `Ok(ViewerConfig)` if the file was read and parsed; absent keys take defaults
    /// * `Err(String)` with a descriptive error message otherwise
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path).map_err(|e| format!("Failed to read config file {}: {}", config_path.display(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let config: ViewerConfig = toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `config_path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(config_path: &Path) -> Result<Self, String> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Config path from the first command line argument, or `config.toml`
    /// in the working directory.
    pub fn path_from_args(mut args: impl Iterator<Item = String>) -> PathBuf {
        args.nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    fn validate(&self) -> Result<(), String> {
        if self.api_base.trim().is_empty() {
            return Err("api-base must not be empty".to_string());
        }
        if self.preset.trim().is_empty() {
            return Err("preset must not be empty".to_string());
        }
        if self.autoplay_interval_ms == 0 {
            return Err("autoplay-interval-ms must be greater than zero".to_string());
        }
        if self.fallback.bounds.is_degenerate() {
            return Err("fallback.bounds must span a non-zero area".to_string());
        }
        Ok(())
    }

    /// `api-base` without trailing slashes.
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}
