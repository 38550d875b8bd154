use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
    /// CSV export of the store distribution spreadsheet.
    pub const DATASET_PATH: &str = "DATASET_PATH";
    pub const DATASET_ID_COLUMN: &str = "DATASET_ID_COLUMN";
    pub const NOTES_FILE: &str = "NOTES_FILE";
    pub const SESSION_IDLE_TIMEOUT_SECS: &str = "SESSION_IDLE_TIMEOUT_SECS";
    pub const SESSION_SWEEP_INTERVAL_SECS: &str = "SESSION_SWEEP_INTERVAL_SECS";
    pub const MAX_SESSIONS: &str = "MAX_SESSIONS";
}

/// Default values
pub mod defaults {
    pub const DATASET_PATH: &str = "data/records.csv";
    pub const DATASET_ID_COLUMN: &str = "Код";
    pub const NOTES_FILE: &str = "notes.csv";
    pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 3600;
    pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 60;
    pub const MAX_SESSIONS: usize = 10_000;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} must be a positive number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    pub dataset_path: PathBuf,
    pub dataset_id_column: String,
    pub notes_file: PathBuf,
    pub session_idle_timeout: Duration,
    pub session_sweep_interval: Duration,
    pub max_sessions: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup (the process
    /// environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup(env_vars::TELEGRAM_BOT_TOKEN)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing(env_vars::TELEGRAM_BOT_TOKEN))?;

        Ok(Self {
            bot_token,
            dataset_path: lookup(env_vars::DATASET_PATH)
                .unwrap_or_else(|| defaults::DATASET_PATH.to_string())
                .into(),
            dataset_id_column: lookup(env_vars::DATASET_ID_COLUMN)
                .unwrap_or_else(|| defaults::DATASET_ID_COLUMN.to_string()),
            notes_file: lookup(env_vars::NOTES_FILE)
                .unwrap_or_else(|| defaults::NOTES_FILE.to_string())
                .into(),
            session_idle_timeout: Duration::from_secs(parse_number(
                &lookup,
                env_vars::SESSION_IDLE_TIMEOUT_SECS,
                defaults::SESSION_IDLE_TIMEOUT_SECS,
            )?),
            session_sweep_interval: Duration::from_secs(parse_number(
                &lookup,
                env_vars::SESSION_SWEEP_INTERVAL_SECS,
                defaults::SESSION_SWEEP_INTERVAL_SECS,
            )?),
            max_sessions: parse_number(&lookup, env_vars::MAX_SESSIONS, defaults::MAX_SESSIONS as u64)?
                as usize,
        })
    }
}

fn parse_number<F>(lookup: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber { name, value: raw }),
        },
    }
}
