use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Process settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub image_dir: PathBuf,
    pub max_image_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("RALLY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match var("RALLY_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("RALLY_PORT={raw} is not a port"))?,
            None => 4941,
        };
        let max_image_bytes = match var("RALLY_MAX_IMAGE_BYTES") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("RALLY_MAX_IMAGE_BYTES={raw} is not a byte count"))?,
            None => DEFAULT_MAX_IMAGE_BYTES,
        };

        Ok(Self {
            host,
            port,
            db_path: var("RALLY_DB_PATH").unwrap_or_else(|| "rally.db".into()).into(),
            image_dir: var("RALLY_IMAGE_DIR")
                .unwrap_or_else(|| "./storage/images".into())
                .into(),
            max_image_bytes,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
