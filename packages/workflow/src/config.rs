//! Analysis configuration.
//!
//! Defaults are embedded; a TOML file (from `--config` or the
//! `LOCALITY_LENS_CONFIG` environment variable) overrides any subset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use locality_lens_http_client::HttpClientConfig;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "LOCALITY_LENS_CONFIG";

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// Per-call time budgets, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Geocoding lookup.
    pub geocode_secs: u64,
    /// Intent extraction.
    pub intent_secs: u64,
    /// Geodata query.
    pub poi_fetch_secs: u64,
    /// Narrative summary.
    pub summary_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            geocode_secs: 15,
            intent_secs: 30,
            poi_fetch_secs: 60,
            summary_secs: 45,
        }
    }
}

impl TimeoutConfig {
    /// Geocoding budget.
    #[must_use]
    pub const fn geocode(&self) -> Duration {
        Duration::from_secs(self.geocode_secs)
    }

    /// Intent extraction budget.
    #[must_use]
    pub const fn intent(&self) -> Duration {
        Duration::from_secs(self.intent_secs)
    }

    /// Geodata query budget.
    #[must_use]
    pub const fn poi_fetch(&self) -> Duration {
        Duration::from_secs(self.poi_fetch_secs)
    }

    /// Summary budget.
    #[must_use]
    pub const fn summary(&self) -> Duration {
        Duration::from_secs(self.summary_secs)
    }
}

/// Everything an analysis run can be tuned with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Radius of the geodata query around the resolved point, in meters.
    pub search_radius_m: f64,
    /// Same-name features closer than this are duplicates, in meters.
    pub dedupe_distance_m: f64,
    /// Nominatim search endpoint.
    pub nominatim_url: String,
    /// Overpass interpreter endpoint.
    pub overpass_url: String,
    /// Server-side Overpass query timeout, in seconds.
    pub overpass_query_timeout_secs: u64,
    /// Per-call time budgets.
    pub timeouts: TimeoutConfig,
    /// Transport settings for every outbound request.
    pub http: HttpClientConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            search_radius_m: 2000.0,
            dedupe_distance_m: 200.0,
            nominatim_url: locality_lens_geocoder::nominatim::DEFAULT_BASE_URL.to_string(),
            overpass_url: locality_lens_poi::overpass::DEFAULT_BASE_URL.to_string(),
            overpass_query_timeout_secs: locality_lens_poi::overpass::DEFAULT_QUERY_TIMEOUT_SECS,
            timeouts: TimeoutConfig::default(),
            http: HttpClientConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parses and validates a TOML document. Missing keys keep defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed or a value is out
    /// of range.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded configuration from {}", path.display());
        Self::from_toml(&contents)
    }

    /// Loads the effective configuration: `explicit` if given, else the
    /// file named by [`CONFIG_ENV`], else the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the chosen file cannot be read or is
    /// invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => {
                log::debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.search_radius_m.is_finite() || self.search_radius_m <= 0.0 {
            return Err(ConfigError::Invalid {
                message: format!("search_radius_m must be positive, got {}", self.search_radius_m),
            });
        }
        if !self.dedupe_distance_m.is_finite() || self.dedupe_distance_m < 0.0 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "dedupe_distance_m must not be negative, got {}",
                    self.dedupe_distance_m
                ),
            });
        }
        let timeouts = &self.timeouts;
        if [
            timeouts.geocode_secs,
            timeouts.intent_secs,
            timeouts.poi_fetch_secs,
            timeouts.summary_secs,
        ]
        .contains(&0)
        {
            return Err(ConfigError::Invalid {
                message: "timeouts must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}
