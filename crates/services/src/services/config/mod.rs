//! Server configuration from the environment.

use std::{path::PathBuf, time::Duration};

use secrecy::SecretString;
use thiserror::Error;
use utils::assets::{default_database_path, expand_tilde};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_TOKEN_AUDIENCE: &str = "kanban";
pub const DEFAULT_PUSH_TTL_SECS: u64 = 86_400;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// `0` lets the OS pick a free port.
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: SecretString,
    pub token_audience: String,
    pub sqlite_max_connections: u32,
    pub push_ttl: Duration,
    pub push_enabled: bool,
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("KANBAN_JWT_SECRET")
            .map(SecretString::from)
            .ok_or(ConfigError::Missing("KANBAN_JWT_SECRET"))?;

        let port = match var("BACKEND_PORT").or_else(|| var("PORT")) {
            Some(raw) => parse_port(&raw)?,
            None => {
                tracing::info!("No PORT environment variable set, using port 0 for auto-assignment");
                0
            }
        };

        let sqlite_max_connections = match var("KANBAN_SQLITE_MAX_CONNECTIONS") {
            Some(raw) => parse_number::<u32>("KANBAN_SQLITE_MAX_CONNECTIONS", &raw)?.clamp(1, 100),
            None => db::DEFAULT_MAX_CONNECTIONS,
        };

        let push_ttl = match var("KANBAN_PUSH_TTL_SECS") {
            Some(raw) => parse_number::<u64>("KANBAN_PUSH_TTL_SECS", &raw)?,
            None => DEFAULT_PUSH_TTL_SECS,
        };

        let push_enabled = match var("KANBAN_PUSH_ENABLED") {
            Some(raw) => parse_bool("KANBAN_PUSH_ENABLED", &raw)?,
            None => true,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database_path: var("KANBAN_DATABASE_PATH")
                .map(|p| expand_tilde(p.trim()))
                .unwrap_or_else(default_database_path),
            jwt_secret,
            token_audience: var("KANBAN_TOKEN_AUDIENCE")
                .unwrap_or_else(|| DEFAULT_TOKEN_AUDIENCE.to_string()),
            sqlite_max_connections,
            push_ttl: Duration::from_secs(push_ttl),
            push_enabled,
            static_dir: var("KANBAN_STATIC_DIR").map(|p| expand_tilde(p.trim())),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Ports sometimes arrive wrapped in terminal colour codes from dev tooling.
fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    let cleaned = String::from_utf8_lossy(&strip_ansi_escapes::strip(raw.as_bytes())).to_string();
    parse_number("PORT", &cleaned)
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}
