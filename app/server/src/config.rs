//! Runtime configuration from environment variables
//!
//! `main` loads a `.env` file first (if present), so every value here can
//! also live there.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;
use crate::protocol::REQUIRED_PROVIDERS;

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_BIND: &str = "127.0.0.1:3830";
pub const DEFAULT_EXPORT_DIR: &str = "./exports";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the derive-and-check service.
    pub service_url: String,
    pub bind: SocketAddr,
    pub export_dir: PathBuf,
    pub request_timeout: Duration,
    /// Provider names accepted by the credential preload. Always includes
    /// `ethereum` and `tron`.
    pub providers: Vec<String>,
    pub credentials_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let service_url = get("SEEDSWEEP_SERVICE_URL")
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !service_url.starts_with("http://") && !service_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "SEEDSWEEP_SERVICE_URL",
                reason: "must start with http:// or https://".to_string(),
            });
        }

        let bind_str = get("SEEDSWEEP_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str.parse().map_err(|e| ConfigError::InvalidValue {
            var: "SEEDSWEEP_BIND",
            reason: format!("{}: {}", bind_str, e),
        })?;
        if !bind.ip().is_loopback() {
            warn!(
                "SEEDSWEEP_BIND={} is not loopback; reports contain private keys",
                bind
            );
        }

        let export_dir = get("SEEDSWEEP_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR));

        let timeout_secs = match get("SEEDSWEEP_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                ConfigError::InvalidValue {
                    var: "SEEDSWEEP_REQUEST_TIMEOUT_SECS",
                    reason: format!("'{}' is not a positive integer", raw),
                }
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let mut providers: Vec<String> = REQUIRED_PROVIDERS.iter().map(|p| p.to_string()).collect();
        if let Some(extra) = get("SEEDSWEEP_PROVIDERS") {
            for name in extra.split(',') {
                let name = name.trim().to_ascii_lowercase();
                if !name.is_empty() && !providers.contains(&name) {
                    providers.push(name);
                }
            }
        }

        Ok(Self {
            service_url,
            bind,
            export_dir,
            request_timeout: Duration::from_secs(timeout_secs),
            providers,
            credentials_file: get("SEEDSWEEP_CREDENTIALS_FILE").map(PathBuf::from),
        })
    }
}
