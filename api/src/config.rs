//! Environment-driven configuration.
//!
//! `Config::from_env` reads the process environment (after loading `.env` if
//! present); `Config::from_lookup` takes any key lookup so parsing can be
//! exercised without touching global state.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ASSETS_ROOT, DEFAULT_PORT, DEFAULT_PRESIGN_EXPIRY_SECS, DEFAULT_S3_REGION,
};
use crate::media::MediaTools;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3 { bucket: String, region: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub assets_root: PathBuf,
    pub asset_base_url: String,
    pub storage: StorageBackend,
    pub presign_expiry: Duration,
    pub media_tools: MediaTools,
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal outside local development
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let port: u16 = parse_var(&lookup, "PORT", DEFAULT_PORT)?;
        let assets_root = lookup("ASSETS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_ROOT));
        let asset_base_url = lookup("ASSET_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}/assets", port));
        // A stored pointer with one comma reads back as `bucket,key`
        if asset_base_url.contains(',') {
            return Err(ConfigError::Invalid {
                name: "ASSET_BASE_URL",
                value: asset_base_url,
            });
        }

        let storage = match lookup("STORAGE_BACKEND").as_deref() {
            None | Some("local") => StorageBackend::Local,
            Some("s3") => StorageBackend::S3 {
                bucket: lookup("S3_BUCKET").ok_or(ConfigError::Missing("S3_BUCKET"))?,
                region: lookup("S3_REGION").unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let presign_secs: u64 =
            parse_var(&lookup, "PRESIGN_EXPIRY_SECS", DEFAULT_PRESIGN_EXPIRY_SECS)?;

        let defaults = MediaTools::default();
        let media_tools = MediaTools {
            ffprobe: lookup("FFPROBE_PATH").unwrap_or(defaults.ffprobe),
            ffmpeg: lookup("FFMPEG_PATH").unwrap_or(defaults.ffmpeg),
        };

        Ok(Config {
            database_url,
            jwt_secret,
            port,
            assets_root,
            asset_base_url,
            storage,
            presign_expiry: Duration::from_secs(presign_secs),
            media_tools,
        })
    }
}
