//! Configuration management

use anyhow::{self, Context, Result};

/// Default ceiling for staged import uploads, in megabytes
pub const DEFAULT_MAX_IMPORT_FILE_SIZE_MB: u64 = 100;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// JWT secret key for token signing/validation
    pub jwt_secret: String,

    /// Ceiling for staged import uploads, in bytes
    pub max_import_file_size: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET must be set — generate one with: openssl rand -base64 48")?;

        if jwt_secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 bytes (current: {} bytes). Generate one with: openssl rand -base64 48",
                jwt_secret.len()
            );
        }

        const KNOWN_DEV_SECRETS: &[&str] = &[
            "dev-secret-change-in-production-min-32-bytes!!",
        ];
        if KNOWN_DEV_SECRETS.contains(&jwt_secret.as_str()) {
            let dev_mode = std::env::var("DEV_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            if dev_mode {
                tracing::warn!("⚠ JWT_SECRET matches a known default — change it for production!");
            } else {
                anyhow::bail!(
                    "JWT_SECRET matches a known development value. Set a real secret or set DEV_MODE=1"
                );
            }
        }

        let max_import_file_size_mb = match std::env::var("MAX_IMPORT_FILE_SIZE_MB") {
            Ok(raw) => raw
                .parse::<u64>()
                .context("MAX_IMPORT_FILE_SIZE_MB must be a positive integer")?,
            Err(_) => DEFAULT_MAX_IMPORT_FILE_SIZE_MB,
        };

        Ok(Self {
            nats_url,
            database_url,
            jwt_secret,
            max_import_file_size: max_import_file_size_mb * 1024 * 1024,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_import_size_defaults_to_100mb() {
        std::env::remove_var("MAX_IMPORT_FILE_SIZE_MB");
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");

        let config = Config::from_env().unwrap();
        assert_eq!(config.max_import_file_size, 100 * 1024 * 1024);
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_import_size_from_env() {
        std::env::set_var("MAX_IMPORT_FILE_SIZE_MB", "5");
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");

        let config = Config::from_env().unwrap();
        assert_eq!(config.max_import_file_size, 5 * 1024 * 1024);

        // Cleanup
        std::env::remove_var("MAX_IMPORT_FILE_SIZE_MB");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_rejects_short_jwt_secret() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", "too-short");

        assert!(Config::from_env().is_err());

        std::env::remove_var("JWT_SECRET");
    }
}
