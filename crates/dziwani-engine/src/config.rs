//! Engine configuration from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dziwani_llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Settings for the hosted completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// DuckDB file. `None` keeps the catalog in memory.
    pub db_path: Option<PathBuf>,
    pub page_size: usize,
    pub escalation_threshold: f32,
    pub match_ratio: f64,
    pub completion_timeout: Duration,
    pub sql_timeout: Duration,
    pub explain: bool,
    /// Present only when `COMPLETION_API_KEY` is set.
    pub completion: Option<CompletionConfig>,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            page_size: 10,
            escalation_threshold: 0.6,
            match_ratio: 0.75,
            completion_timeout: Duration::from_secs(10),
            sql_timeout: Duration::from_secs(15),
            explain: false,
            completion: None,
            log_level: "info".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present; every variable has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let completion = get("COMPLETION_API_KEY")
            .map(|api_key| -> Result<CompletionConfig, ConfigError> {
                Ok(CompletionConfig {
                    api_key,
                    base_url: get("COMPLETION_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
                    model: get("COMPLETION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
                    temperature: parse_or(&get, "COMPLETION_TEMPERATURE", 0.1)?,
                })
            })
            .transpose()?;

        let page_size: usize = parse_or(&get, "DZIWANI_PAGE_SIZE", defaults.page_size)?;
        if page_size == 0 {
            return Err(invalid(&get, "DZIWANI_PAGE_SIZE"));
        }
        let escalation_threshold: f32 =
            parse_or(&get, "DZIWANI_ESCALATION_THRESHOLD", defaults.escalation_threshold)?;
        if !(0.0..=1.0).contains(&escalation_threshold) {
            return Err(invalid(&get, "DZIWANI_ESCALATION_THRESHOLD"));
        }
        let match_ratio: f64 = parse_or(&get, "DZIWANI_DISTRICT_MATCH_RATIO", defaults.match_ratio)?;
        if !(0.0..=1.0).contains(&match_ratio) {
            return Err(invalid(&get, "DZIWANI_DISTRICT_MATCH_RATIO"));
        }

        Ok(Self {
            db_path: get("DZIWANI_DB_PATH").map(PathBuf::from),
            page_size,
            escalation_threshold,
            match_ratio,
            completion_timeout: Duration::from_secs(parse_or(
                &get,
                "DZIWANI_COMPLETION_TIMEOUT_SECS",
                10,
            )?),
            sql_timeout: Duration::from_secs(parse_or(&get, "DZIWANI_SQL_TIMEOUT_SECS", 15)?),
            explain: parse_flag(&get, "DZIWANI_EXPLAIN")?,
            completion,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }),
    }
}

fn parse_flag(get: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<bool, ConfigError> {
    match get(var).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { var, value: v }),
        },
    }
}

fn invalid(get: &impl Fn(&str) -> Option<String>, var: &'static str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: get(var).unwrap_or_default(),
    }
}
