//! Application-level configuration loading, including the auth token table.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Role;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SAFEQUEST_CONFIG_PATH";

/// How often the cancellation sweep scans for abandoned sessions.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 2 * 60 * 60;
/// How long a session may sit in `waiting` before the sweep cancels it.
const DEFAULT_WAITING_TIMEOUT_SECS: u64 = 30 * 60;
/// How long a fresh WebSocket connection may stay silent before authenticating.
const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Interval between cancellation sweep passes.
    pub sweep_interval: Duration,
    /// Inactivity window after which a `waiting` session is cancelled.
    pub waiting_timeout: Duration,
    /// Deadline for the first (authenticate) frame on a new connection.
    pub handshake_timeout: Duration,
    /// Static credential table consumed by the default auth provider.
    pub auth_tokens: Vec<AuthTokenEntry>,
}

/// One row of the static credential table.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokenEntry {
    /// Bearer token presented by the client.
    pub token: String,
    /// Identity the token resolves to.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Role granted to the identity.
    pub role: Role,
    /// School tag used for room subscription and score scoping.
    pub school: String,
    /// Region tag used for room subscription.
    pub region: String,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        tokens = config.auth_tokens.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            waiting_timeout: Duration::from_secs(DEFAULT_WAITING_TIMEOUT_SECS),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            auth_tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    sweep_interval_secs: Option<u64>,
    waiting_timeout_secs: Option<u64>,
    handshake_timeout_secs: Option<u64>,
    #[serde(default)]
    auth_tokens: Vec<AuthTokenEntry>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            sweep_interval: raw
                .sweep_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            waiting_timeout: raw
                .waiting_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.waiting_timeout),
            handshake_timeout: raw
                .handshake_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.handshake_timeout),
            auth_tokens: raw.auth_tokens,
        }
    }
}

fn resolve_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(7200));
        assert_eq!(config.waiting_timeout, Duration::from_secs(1800));
        assert!(config.auth_tokens.is_empty());
    }

    #[test]
    fn raw_config_overrides_selected_fields() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "waiting_timeout_secs": 60, "auth_tokens": [] }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.waiting_timeout, Duration::from_secs(60));
        assert_eq!(config.sweep_interval, Duration::from_secs(7200));
    }
}
