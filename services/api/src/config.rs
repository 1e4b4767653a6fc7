//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
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
    pub database_url: String,
    pub database_max_connections: u32,
    pub log_level: Level,
    /// HS256 secret shared with the identity provider that issues bearer tokens.
    pub jwt_secret: String,
    pub certificates_dir: PathBuf,
    pub cors_origin: String,
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

        // --- Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let max_connections_str =
            std::env::var("DATABASE_MAX_CONNECTIONS").unwrap_or_else(|_| "5".to_string());
        let database_max_connections = match max_connections_str.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "DATABASE_MAX_CONNECTIONS".to_string(),
                    format!("'{}' is not a positive integer", max_connections_str),
                ))
            }
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Auth ---
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must not be empty".to_string(),
            ));
        }

        // --- Certificates and CORS ---
        let certificates_dir = std::env::var("CERTIFICATES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./certificates"));
        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            log_level,
            jwt_secret,
            certificates_dir,
            cors_origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 7] = [
        "BIND_ADDRESS",
        "DATABASE_URL",
        "DATABASE_MAX_CONNECTIONS",
        "RUST_LOG",
        "JWT_SECRET",
        "CERTIFICATES_DIR",
        "CORS_ORIGIN",
    ];

    fn clear() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_only_required_vars_are_set() {
        clear();
        std::env::set_var("DATABASE_URL", "postgres://localhost/tutoring");
        std::env::set_var("JWT_SECRET", "secret");

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.certificates_dir, PathBuf::from("./certificates"));
        assert_eq!(config.cors_origin, "http://localhost:3000");
        clear();
    }

    #[test]
    #[serial]
    fn missing_database_url_is_reported() {
        clear();
        std::env::set_var("JWT_SECRET", "secret");
        match Config::from_env() {
            Err(ConfigError::MissingVar(var)) => assert_eq!(var, "DATABASE_URL"),
            other => panic!("unexpected result: {:?}", other),
        }
        clear();
    }

    #[test]
    #[serial]
    fn missing_jwt_secret_is_reported() {
        clear();
        std::env::set_var("DATABASE_URL", "postgres://localhost/tutoring");
        match Config::from_env() {
            Err(ConfigError::MissingVar(var)) => assert_eq!(var, "JWT_SECRET"),
            other => panic!("unexpected result: {:?}", other),
        }
        clear();
    }

    #[test]
    #[serial]
    fn invalid_values_are_rejected() {
        clear();
        std::env::set_var("DATABASE_URL", "postgres://localhost/tutoring");
        std::env::set_var("JWT_SECRET", "secret");
        std::env::set_var("DATABASE_MAX_CONNECTIONS", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue(var, _)) if var == "DATABASE_MAX_CONNECTIONS"
        ));

        std::env::remove_var("DATABASE_MAX_CONNECTIONS");
        std::env::set_var("BIND_ADDRESS", "not-an-address");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue(var, _)) if var == "BIND_ADDRESS"
        ));
        clear();
    }
}
