//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONVERSION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONVERSION_CONCURRENCY: usize = 1;
const DEFAULT_RENDER_CONCURRENCY: usize = 4;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5010;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[cfg(target_os = "windows")]
const DEFAULT_LIBREOFFICE: &str = "soffice.exe";
#[cfg(target_os = "macos")]
const DEFAULT_LIBREOFFICE: &str = "/Applications/LibreOffice.app/Contents/MacOS/soffice";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DEFAULT_LIBREOFFICE: &str = "libreoffice";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub libreoffice_path: PathBuf,
    pub conversion_timeout: Duration,
    pub conversion_concurrency: usize,
    pub render_concurrency: usize,
    pub bind_address: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            libreoffice_path: PathBuf::from(DEFAULT_LIBREOFFICE),
            conversion_timeout: Duration::from_secs(DEFAULT_CONVERSION_TIMEOUT_SECS),
            conversion_concurrency: DEFAULT_CONVERSION_CONCURRENCY,
            render_concurrency: DEFAULT_RENDER_CONCURRENCY,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment (after `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let libreoffice_path = lookup("LIBREOFFICE_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.libreoffice_path);

        let timeout_secs = positive(
            "CONVERSION_TIMEOUT",
            lookup("CONVERSION_TIMEOUT"),
            DEFAULT_CONVERSION_TIMEOUT_SECS,
        )?;
        let conversion_concurrency = positive(
            "CONVERSION_CONCURRENCY",
            lookup("CONVERSION_CONCURRENCY"),
            DEFAULT_CONVERSION_CONCURRENCY as u64,
        )? as usize;
        let render_concurrency = positive(
            "RENDER_CONCURRENCY",
            lookup("RENDER_CONCURRENCY"),
            DEFAULT_RENDER_CONCURRENCY as u64,
        )? as usize;
        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or(ConfigError::InvalidNumber { name: "PORT", value })?,
            None => defaults.port,
        };
        let max_upload_bytes = positive(
            "MAX_UPLOAD_BYTES",
            lookup("MAX_UPLOAD_BYTES"),
            DEFAULT_MAX_UPLOAD_BYTES as u64,
        )? as usize;

        Ok(Self {
            libreoffice_path,
            conversion_timeout: Duration::from_secs(timeout_secs),
            conversion_concurrency,
            render_concurrency,
            bind_address: lookup("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port,
            max_upload_bytes,
        })
    }
}

fn positive(name: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or(ConfigError::InvalidNumber { name, value: raw }),
    }
}
