//! Process configuration from the environment
//!
//! `.env` is loaded first when present. Only the live oracle client needs an
//! API key; everything else has a default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::ai::{AiConfig, DEFAULT_MODEL};
use crate::confirmation::ConfirmationMode;
use crate::pipeline::PipelineConfig;

pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub oracle_timeout: Duration,
    pub data_dir: PathBuf,
    pub confirmation_mode: ConfirmationMode,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Load `.env` (if any) and read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let oracle_timeout_secs: u64 = parse(
            "INSIGHT_ORACLE_TIMEOUT_SECS",
            var("INSIGHT_ORACLE_TIMEOUT_SECS"),
            DEFAULT_ORACLE_TIMEOUT_SECS,
        )?;
        if oracle_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "INSIGHT_ORACLE_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let ai = AiConfig {
            api_key: var("GEMINI_API_KEY").unwrap_or_default(),
            model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: Some(parse("GEMINI_MAX_TOKENS", var("GEMINI_MAX_TOKENS"), 2048)?),
            temperature: Some(parse("GEMINI_TEMPERATURE", var("GEMINI_TEMPERATURE"), 0.1)?),
            timeout_seconds: oracle_timeout_secs,
        };

        let confirmation_mode = match var("INSIGHT_CONFIRMATION_MODE") {
            Some(raw) => raw.parse::<ConfirmationMode>().map_err(|reason| ConfigError::InvalidValue {
                key: "INSIGHT_CONFIRMATION_MODE",
                value: raw,
                reason,
            })?,
            None => ConfirmationMode::default(),
        };

        Ok(Self {
            ai,
            oracle_timeout: Duration::from_secs(oracle_timeout_secs),
            data_dir: PathBuf::from(var("INSIGHT_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            confirmation_mode,
            bind_addr: parse("INSIGHT_BIND_ADDR", var("INSIGHT_BIND_ADDR"), default_bind_addr())?,
        })
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            oracle_timeout: self.oracle_timeout,
            confirmation_mode: self.confirmation_mode,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn parse<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
