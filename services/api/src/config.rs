//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Postgres backing the document store; the in-memory store is used when absent.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub generation_model: String,
    pub scraper_user_agent: String,
    pub nextias_url: String,
    pub vajiram_base_url: String,
    pub feed_limit: usize,
    pub seconds_per_question: u32,
    /// Offset of the candidate's calendar day from UTC, used for `dateKey`s.
    pub utc_offset_minutes: i32,
    pub cors_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            log_level: Level::INFO,
            openai_api_key: None,
            openai_base_url: None,
            generation_model: "gpt-4o-mini".to_string(),
            scraper_user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            nextias_url: "https://www.nextias.com/daily-current-affairs".to_string(),
            vajiram_base_url: "https://vajiramandravi.com".to_string(),
            feed_limit: prep_core::feed::DEFAULT_FEED_LIMIT,
            seconds_per_question: prep_core::session::DEFAULT_SECONDS_PER_QUESTION,
            utc_offset_minutes: 330,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
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
        let defaults = Self::default();

        // --- Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", defaults.bind_address)?;
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

        // --- Generation ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let openai_base_url = std::env::var("OPENAI_BASE_URL").ok();
        let generation_model =
            std::env::var("GENERATION_MODEL").unwrap_or(defaults.generation_model);

        // --- Scraping ---
        let scraper_user_agent =
            std::env::var("SCRAPER_USER_AGENT").unwrap_or(defaults.scraper_user_agent);
        let nextias_url = std::env::var("NEXTIAS_URL").unwrap_or(defaults.nextias_url);
        let vajiram_base_url =
            std::env::var("VAJIRAM_BASE_URL").unwrap_or(defaults.vajiram_base_url);
        let feed_limit = parse_var("FEED_LIMIT", defaults.feed_limit)?;

        // --- Tests and Calendar ---
        let seconds_per_question = parse_var("SECONDS_PER_QUESTION", defaults.seconds_per_question)?;
        if seconds_per_question == 0 {
            return Err(ConfigError::InvalidValue(
                "SECONDS_PER_QUESTION".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let utc_offset_minutes = parse_var("UTC_OFFSET_MINUTES", defaults.utc_offset_minutes)?;
        if FixedOffset::east_opt(utc_offset_minutes * 60).is_none() {
            return Err(ConfigError::InvalidValue(
                "UTC_OFFSET_MINUTES".to_string(),
                format!("{} is not a valid offset", utc_offset_minutes),
            ));
        }
        let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_base_url,
            generation_model,
            scraper_user_agent,
            nextias_url,
            vajiram_base_url,
            feed_limit,
            seconds_per_question,
            utc_offset_minutes,
            cors_origin,
        })
    }

    /// The candidate's calendar day at `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(offset) => now.with_timezone(&offset).date_naive(),
            None => now.date_naive(),
        }
    }

    pub fn test_duration(&self, questions: usize) -> u32 {
        self.seconds_per_question
            .saturating_mul(u32::try_from(questions).unwrap_or(u32::MAX))
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
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
