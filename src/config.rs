//! Application-level configuration loading.
//!
//! The auto-confirm window is deliberately configuration rather than a
//! hardcoded constant; product owners tune it without a rebuild.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BRACKET_BACK_CONFIG_PATH";
/// Environment variable carrying the admin token, overriding the config file.
const ADMIN_TOKEN_ENV: &str = "BRACKET_BACK_ADMIN_TOKEN";
/// Window before an unconfirmed, undisputed report becomes final.
const DEFAULT_AUTO_CONFIRM_WINDOW_SECS: u64 = 600;
/// Bounded internal retries on optimistic-concurrency conflicts.
const DEFAULT_CONFLICT_RETRIES: u32 = 3;

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    auto_confirm_window: Duration,
    conflict_retries: u32,
    admin_token: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        auto_confirm_window_secs = config.auto_confirm_window.as_secs(),
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

    /// Build a configuration with an explicit auto-confirm window.
    pub fn with_auto_confirm_window(window: Duration) -> Self {
        Self {
            auto_confirm_window: window,
            ..Self::default()
        }
    }

    /// How long a pending score report waits before it auto-confirms.
    pub fn auto_confirm_window(&self) -> Duration {
        self.auto_confirm_window
    }

    /// How many times a conflicting update is retried before surfacing.
    pub fn conflict_retries(&self) -> u32 {
        self.conflict_retries
    }

    /// Shared secret protecting the admin endpoints. `None` disables them.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auto_confirm_window: Duration::from_secs(DEFAULT_AUTO_CONFIRM_WINDOW_SECS),
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            admin_token: resolve_admin_token(None),
        }
    }
}

/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
#[derive(Debug, Deserialize)]
struct RawConfig {
    auto_confirm_window_secs: Option<u64>,
    conflict_retries: Option<u32>,
    admin_token: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            auto_confirm_window: value
                .auto_confirm_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.auto_confirm_window),
            conflict_retries: value.conflict_retries.unwrap_or(defaults.conflict_retries),
            admin_token: resolve_admin_token(value.admin_token),
        }
    }
}

/// Resolve the admin token, preferring the environment over the config file.
fn resolve_admin_token(from_file: Option<String>) -> Option<String> {
    env::var(ADMIN_TOKEN_ENV)
        .ok()
        .filter(|token| !token.is_empty())
        .or(from_file)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
