//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `CART_SNAPSHOT_DIR` - Directory the cart snapshot is written to (default: .storefront)
//! - `NATS_URL` - NATS server for order notifications; notifications are only logged when unset
//! - `ORDERS_PER_PAGE` - Order history page size (default: 5)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use validator::Validate;

use crate::domain::aggregates::order::DEFAULT_ORDERS_PER_PAGE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

#[derive(Clone, Validate)]
pub struct Config {
    #[validate(length(min = 1))]
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub snapshot_dir: PathBuf,
    pub nats_url: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub orders_per_page: u32,
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("snapshot_dir", &self.snapshot_dir)
            .field("nats_url", &self.nats_url)
            .field("orders_per_page", &self.orders_per_page)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment, after reading `.env`
    /// if one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            database_url: var("DATABASE_URL").ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?,
            host: parse_or("HOST", var("HOST"), IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or("PORT", var("PORT"), 8083)?,
            snapshot_dir: var("CART_SNAPSHOT_DIR").map_or_else(|| PathBuf::from(".storefront"), PathBuf::from),
            nats_url: var("NATS_URL"),
            orders_per_page: parse_or("ORDERS_PER_PAGE", var("ORDERS_PER_PAGE"), DEFAULT_ORDERS_PER_PAGE)?,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", var("DATABASE_MAX_CONNECTIONS"), 10)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
