//! services/bot/src/config.rs
//!
//! Defines the bot's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_DICTIONARY_API_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Without a database the journal lives in memory and is lost on restart.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub dictionary_api_url: String,
    pub word_cache_ttl: Duration,
    pub word_cache_capacity: usize,
    pub session_idle_timeout: Duration,
    pub quiz_size: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and Database ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Dictionary and Word Cache ---
        let dictionary_api_url = std::env::var("DICTIONARY_API_URL")
            .unwrap_or_else(|_| DEFAULT_DICTIONARY_API_URL.to_string());
        let word_cache_ttl =
            Duration::from_secs(parse_or("WORD_CACHE_TTL_SECS", 7 * 24 * 60 * 60)?);
        let word_cache_capacity = parse_or("WORD_CACHE_CAPACITY", 10_000)?;

        // --- Quiz Sessions ---
        let session_idle_timeout = Duration::from_secs(parse_or("SESSION_IDLE_SECS", 15 * 60)?);
        let quiz_size = parse_or("QUIZ_SIZE", 10)?;
        if quiz_size == 0 {
            return Err(ConfigError::InvalidValue(
                "QUIZ_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            dictionary_api_url,
            word_cache_ttl,
            word_cache_capacity,
            session_idle_timeout,
            quiz_size,
        })
    }
}

/// Reads and parses `name`, falling back to `default` when it is unset.
fn parse_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_use_the_default() {
        let value: u64 = parse_or("LEXICON_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn set_variables_are_parsed() {
        std::env::set_var("LEXICON_TEST_CAPACITY", " 250 ");
        let value: usize = parse_or("LEXICON_TEST_CAPACITY", 10).unwrap();
        assert_eq!(value, 250);
    }

    #[test]
    fn unparsable_variables_are_rejected() {
        std::env::set_var("LEXICON_TEST_TTL", "a week");
        let result: Result<u64, _> = parse_or("LEXICON_TEST_TTL", 10);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue(name, _)) if name == "LEXICON_TEST_TTL"
        ));
    }
}
