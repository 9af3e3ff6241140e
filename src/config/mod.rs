//! Configuration module for the wealth tracker backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default number of snapshots per history page when the client sends none.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound for a client-requested page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("WEALTH_API_PSK").ok();

        let db_path = env::var("WEALTH_DB_PATH")
            .unwrap_or_else(|_| "./data/wealth.sqlite".to_string())
            .into();

        let bind_addr = env::var("WEALTH_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid WEALTH_BIND_ADDR format");

        let log_level = env::var("WEALTH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("WEALTH_API_PSK");
        env::remove_var("WEALTH_DB_PATH");
        env::remove_var("WEALTH_BIND_ADDR");
        env::remove_var("WEALTH_LOG_LEVEL");

        let config = Config::from_env();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/wealth.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
    }
}
