//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `IMAGE_DIR` - Directory holding product images (default: ./images)
//! - `IMAGE_BASE_URL` - Public URL the image directory is served under
//!   (default: <http://localhost:8083/images>)
//! - `CONTACT_FORM_URL` - Third-party endpoint contact messages are posted to
//! - `NATS_URL` - NATS server for domain events; events are logged when unset

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Connection URL, password included
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub image_dir: PathBuf,
    pub image_base_url: String,
    pub contact_form_url: Option<String>,
    pub nats_url: Option<String>,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;
        let host = get("HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = get("PORT")
            .unwrap_or_else(|| "8083".to_string())
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;
        let image_base_url = get("IMAGE_BASE_URL").unwrap_or_else(|| format!("http://localhost:{port}/images"));
        if !image_base_url.starts_with("http://") && !image_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidEnvVar("IMAGE_BASE_URL".to_string(), "must be an http(s) URL".to_string()));
        }

        Ok(Self {
            database_url,
            host,
            port,
            image_dir: get("IMAGE_DIR").map_or_else(|| PathBuf::from("./images"), PathBuf::from),
            image_base_url,
            contact_form_url: get("CONTACT_FORM_URL"),
            nats_url: get("NATS_URL"),
        })
    }

    pub const fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}
