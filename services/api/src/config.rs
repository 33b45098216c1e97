//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

const DEFAULT_UPLOAD_MAX_SIZE: usize = 10 * 1024 * 1024;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Deployment environment, read from `APP_ENV` (or `NODE_ENV` for compatibility).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub bind_address: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub chat_model: String,
    pub vision_model: String,
    pub allowed_origins: Vec<String>,
    pub upload_max_size: usize,
    pub wordpress_webhook_url: Option<String>,
    pub wordpress_api_key: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("APP_ENV")
            .or_else(|| var("NODE_ENV"))
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        // --- Server ---
        let bind_address = match var("BIND_ADDRESS") {
            Some(addr) => addr.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
            })?,
            None => {
                let port = var("PORT").unwrap_or_else(|| "3001".to_string());
                let port = port.parse::<u16>().map_err(|e| {
                    ConfigError::InvalidValue("PORT".to_string(), e.to_string())
                })?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let database_url = var("DATABASE_URL");
        if database_url.is_none() && environment == Environment::Production {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Language model ---
        let openai_api_key = var("OPENAI_API_KEY");
        let chat_model = var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let vision_model = var("OPENAI_VISION_MODEL").unwrap_or_else(|| "gpt-4o".to_string());

        // --- HTTP surface ---
        let allowed_origins = var("ALLOWED_ORIGINS")
            .or_else(|| var("CORS_ORIGIN"))
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let upload_max_size = match var("UPLOAD_MAX_SIZE") {
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                ConfigError::InvalidValue("UPLOAD_MAX_SIZE".to_string(), e.to_string())
            })?,
            None => DEFAULT_UPLOAD_MAX_SIZE,
        };

        // --- CRM ---
        let wordpress_webhook_url = var("WORDPRESS_WEBHOOK_URL");
        let wordpress_api_key = var("WORDPRESS_API_KEY");

        Ok(Self {
            environment,
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            chat_model,
            vision_model,
            allowed_origins,
            upload_max_size,
            wordpress_webhook_url,
            wordpress_api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = load(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_address.port(), 3001);
        assert!(config.database_url.is_none());
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.upload_max_size, 10 * 1024 * 1024);
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000".to_string()]);
    }

    #[test]
    fn origins_are_split_and_node_env_is_honoured() {
        let config = load(&[
            ("NODE_ENV", "test"),
            ("PORT", "8080"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
        ])
        .unwrap();
        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn production_requires_database() {
        let err = load(&[("APP_ENV", "production")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "DATABASE_URL"));
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "PORT"));
    }
}
