//! Serializable pipeline configuration.
//!
//! A `PipelineConfig` is read from TOML and captures everything needed to
//! reproduce a positions run: the date range, leverage, engine and validator
//! parameters, the calendar source and the observation input.
//!
//! ```toml
//! start_date = "2024-01-02"
//! end_date = "20240628"
//! leverage = 1.0
//!
//! [engine]
//! fill_horizon = 5
//!
//! [validation]
//! lookback_offsets_days = [100, 50]
//!
//! [calendar]
//! type = "http"
//! base_url = "https://platform.example.com/api"
//! token_env = "PLATFORM_TOKEN"
//!
//! [observations]
//! path = "data/mentions.csv"
//! format = "mentions"
//! ticker_map = "tickers.toml"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use sentilab_core::data::{
    CalendarError, CalendarResolver, FixedCalendar, HttpCalendar, WeekdayCalendar,
    DEFAULT_MAX_RETRIES,
};
use sentilab_core::domain::parse_date;
use sentilab_core::engine::EngineConfig;
use sentilab_core::validate::{ValidatorConfig, LOOKBACK_OFFSETS_DAYS, VALIDATION_THRESHOLD};

/// Content-addressable identifier of a run configuration.
pub type RunId = String;

/// Environment variable read for the HTTP calendar token unless overridden.
pub const DEFAULT_TOKEN_ENV: &str = "SENTILAB_CALENDAR_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("environment variable '{0}' is not set")]
    MissingEnv(String),

    #[error("calendar setup failed: {0}")]
    Calendar(#[from] CalendarError),
}

/// Serializable configuration for a single positions run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// First requested session (inclusive).
    #[serde(deserialize_with = "flexible_date")]
    pub start_date: NaiveDate,

    /// Last requested session (inclusive).
    #[serde(deserialize_with = "flexible_date")]
    pub end_date: NaiveDate,

    #[serde(default = "default_leverage")]
    pub leverage: f64,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub validation: ValidationSettings,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub observations: ObservationsConfig,
}

fn default_leverage() -> f64 {
    1.0
}

fn flexible_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_date(&text).map_err(serde::de::Error::custom)
}

impl PipelineConfig {
    /// Config with contract defaults for the given range.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            leverage: default_leverage(),
            engine: EngineConfig::default(),
            validation: ValidationSettings::default(),
            calendar: CalendarConfig::default(),
            observations: ObservationsConfig::default(),
        }
    }

    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges. An inverted date range is allowed and simply
    /// produces no sessions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.leverage.is_finite() && self.leverage > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "leverage must be finite and positive, got {}",
                self.leverage
            )));
        }
        self.engine
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.validation.check()
    }

    /// Validator parameters, with the burn-in following the engine's fill
    /// horizon unless set explicitly.
    pub fn validator_config(&self) -> ValidatorConfig {
        let base = ValidatorConfig::for_horizon(self.engine.fill_horizon);
        ValidatorConfig {
            lookback_offsets_days: self.validation.lookback_offsets_days,
            threshold: self.validation.threshold,
            burn_in_sessions: self
                .validation
                .burn_in_sessions
                .unwrap_or(base.burn_in_sessions),
            ..base
        }
    }

    /// Deterministic BLAKE3 hash of the canonical JSON form.
    ///
    /// Two runs with identical configs share a run id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// `[validation]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub enabled: bool,
    pub lookback_offsets_days: [u64; 2],
    pub threshold: f64,
    /// Defaults to `fill_horizon + 1` when absent.
    pub burn_in_sessions: Option<usize>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback_offsets_days: LOOKBACK_OFFSETS_DAYS,
            threshold: VALIDATION_THRESHOLD,
            burn_in_sessions: None,
        }
    }
}

impl ValidationSettings {
    fn check(&self) -> Result<(), ConfigError> {
        if self.lookback_offsets_days.iter().any(|d| *d == 0) {
            return Err(ConfigError::Invalid(
                "lookback offsets must be at least one day".into(),
            ));
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "validation threshold must be finite and non-negative, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// `[calendar]` table: which session source to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalendarConfig {
    /// Monday to Friday minus listed holidays.
    Weekday {
        #[serde(default)]
        holidays: Vec<String>,
    },

    /// One session per line in a text file.
    File { path: PathBuf },

    /// Platform calendar service.
    Http {
        base_url: String,
        #[serde(default = "default_token_env")]
        token_env: String,
        #[serde(default = "default_max_retries")]
        max_retries: u32,
    },
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self::Weekday {
            holidays: Vec::new(),
        }
    }
}

impl CalendarConfig {
    /// Construct the configured resolver.
    pub fn build(&self) -> Result<Arc<dyn CalendarResolver>, ConfigError> {
        match self {
            Self::Weekday { holidays } => {
                let holidays = holidays
                    .iter()
                    .map(|h| parse_date(h))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ConfigError::Invalid(format!("holiday list: {e}")))?;
                Ok(Arc::new(WeekdayCalendar::with_holidays(holidays)))
            }
            Self::File { path } => Ok(Arc::new(FixedCalendar::from_file(path)?)),
            Self::Http {
                base_url,
                token_env,
                max_retries,
            } => {
                let token = std::env::var(token_env)
                    .map_err(|_| ConfigError::MissingEnv(token_env.clone()))?;
                let calendar =
                    HttpCalendar::new(base_url.as_str(), token)?.with_max_retries(*max_retries);
                Ok(Arc::new(calendar))
            }
        }
    }
}

/// Layout of the observation input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// `security_key,date,sentiment[,weight]`
    #[default]
    Observations,
    /// `ticker,date,sentiment[,score]`, aggregated through a ticker map.
    Mentions,
}

/// `[observations]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationsConfig {
    pub path: PathBuf,
    pub format: InputFormat,
    /// Ticker map TOML for the mentions format. The built-in US map is used
    /// when absent.
    pub ticker_map: Option<PathBuf>,
    /// Generate synthetic observations when the input file is missing.
    pub synthetic: bool,
}

impl Default for ObservationsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sentiment.csv"),
            format: InputFormat::Observations,
            ticker_map: None,
            synthetic: false,
        }
    }
}
