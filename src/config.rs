//! Runtime configuration read from the environment.
//!
//! `main` loads `.env` through `dotenvy` first, so every variable below can
//! also live in that file.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://localhost:7097/api";
pub const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("No configuration directory available for the file session backend; set MOC_SESSION_DIR")]
    NoSessionDir,
}

/// Where the access token and session snapshot are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    File,
    Keychain,
    Memory,
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(SessionBackend::File),
            "keychain" => Ok(SessionBackend::Keychain),
            "memory" => Ok(SessionBackend::Memory),
            other => Err(format!("unknown session backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub login_path: String,
    pub session_backend: SessionBackend,
    /// Only needed by the file backend; `None` when no directory could be found.
    pub session_dir: Option<PathBuf>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_base_url = checked_api_url(
            "MOC_API_URL",
            get("MOC_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;

        let login_path = get("MOC_LOGIN_PATH").unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());

        let session_backend = match get("MOC_SESSION_BACKEND") {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                name: "MOC_SESSION_BACKEND",
                value,
                reason,
            })?,
            None => SessionBackend::File,
        };

        let session_dir = get("MOC_SESSION_DIR")
            .map(PathBuf::from)
            .or_else(crate::session::FileStore::default_dir);

        let request_timeout = seconds(&get, "MOC_REQUEST_TIMEOUT_SECS", 60)?;
        let connect_timeout = seconds(&get, "MOC_CONNECT_TIMEOUT_SECS", 10)?;

        Ok(Self {
            api_base_url,
            login_path,
            session_backend,
            session_dir,
            request_timeout,
            connect_timeout,
        })
    }

    /// Replace the backend URL, e.g. from `--api-url`.
    pub fn override_api_url(&mut self, url: String) -> Result<(), ConfigError> {
        self.api_base_url = checked_api_url("--api-url", url)?;
        Ok(())
    }
}

fn checked_api_url(name: &'static str, url: String) -> Result<String, ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url)
    } else {
        Err(ConfigError::Invalid {
            name,
            value: url,
            reason: "must start with http:// or https://".to_string(),
        })
    }
}

fn seconds<G>(get: &G, name: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(value) = get(name) else {
        return Ok(Duration::from_secs(default));
    };
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            value,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        }),
    }
}
