//! Configuration loading for the portal client.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `PORTAL_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::models::Role;

/// Application configuration derived from `PORTAL_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Websocket endpoint; derived from `api_base_url` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_bell_capacity")]
    pub bell_capacity: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_seen_id_capacity")]
    pub seen_id_capacity: usize,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Fallback poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PollerConfig {
    /// Refresh period while the push channel is down (default: 30)
    ///
    /// Environment variable: `PORTAL_POLL_INTERVAL_SECONDS`
    #[serde(default = "default_poll_interval_seconds")]
    pub interval_seconds: u64,
}

/// Push channel reconnect backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ReconnectConfig {
    /// Environment variable: `PORTAL_RECONNECT_BASE_MS`
    #[serde(default = "default_reconnect_base_ms")]
    pub base_ms: u64,
    /// Environment variable: `PORTAL_RECONNECT_MAX_MS`
    #[serde(default = "default_reconnect_max_ms")]
    pub max_ms: u64,
    /// Random spread applied to each delay, `delay * (1 ± jitter_factor)`.
    ///
    /// Environment variable: `PORTAL_RECONNECT_JITTER_FACTOR`
    #[serde(default = "default_reconnect_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_base_url: default_api_base_url(),
            push_url: None,
            auth_token: None,
            user_id: None,
            role: default_role(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            request_timeout_ms: default_request_timeout_ms(),
            bell_capacity: default_bell_capacity(),
            page_size: default_page_size(),
            seen_id_capacity: default_seen_id_capacity(),
            poller: PollerConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_poll_interval_seconds(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_ms: default_reconnect_base_ms(),
            max_ms: default_reconnect_max_ms(),
            jitter_factor: default_reconnect_jitter_factor(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_seconds == 0 || self.interval_seconds > 3600 {
            return Err(ConfigError::InvalidPollInterval {
                value: self.interval_seconds,
            });
        }
        Ok(())
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_ms == 0 || self.base_ms > self.max_ms {
            return Err(ConfigError::InvalidReconnectBounds {
                base: self.base_ms,
                max: self.max_ms,
            });
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::InvalidReconnectJitter {
                value: self.jitter_factor,
            });
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn parsed_role(&self) -> Result<Role, ConfigError> {
        self.role
            .parse()
            .map_err(|_| ConfigError::InvalidRole {
                value: self.role.clone(),
            })
    }

    /// Websocket endpoint, defaulting to `<api_base_url>/ws` with the scheme
    /// switched to `ws`/`wss`.
    pub fn resolved_push_url(&self) -> Result<Url, ConfigError> {
        if let Some(push_url) = &self.push_url {
            return Url::parse(push_url).map_err(|source| ConfigError::InvalidUrl {
                field: "PUSH_URL",
                value: push_url.clone(),
                source,
            });
        }

        let base = self.api_base_url.trim_end_matches('/');
        let derived = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}/ws", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}/ws", rest)
        } else {
            format!("{}/ws", base)
        };
        Url::parse(&derived).map_err(|source| ConfigError::InvalidUrl {
            field: "PUSH_URL",
            value: derived,
            source,
        })
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();

        if config.auth_token.is_some() {
            config.auth_token = Some("[REDACTED]".to_string());
        }

        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api_base_url).map_err(|source| ConfigError::InvalidUrl {
            field: "API_BASE_URL",
            value: self.api_base_url.clone(),
            source,
        })?;
        self.resolved_push_url()?;
        self.parsed_role()?;

        // Outside local/test an authenticated session is mandatory
        if !matches!(self.profile.as_str(), "local" | "test")
            && self.auth_token.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::MissingAuthToken);
        }

        if self.bell_capacity == 0 {
            return Err(ConfigError::InvalidBellCapacity {
                value: self.bell_capacity,
            });
        }

        if self.page_size == 0 || self.page_size > 100 {
            return Err(ConfigError::InvalidPageSize {
                value: self.page_size,
            });
        }

        if self.request_timeout_ms < 100 {
            return Err(ConfigError::InvalidRequestTimeout {
                value: self.request_timeout_ms,
            });
        }

        self.poller.validate()?;
        self.reconnect.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_role() -> String {
    "candidate".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_bell_capacity() -> usize {
    3 // bell widget shows the three most recent
}

fn default_page_size() -> u32 {
    20
}

fn default_seen_id_capacity() -> usize {
    512
}

fn default_poll_interval_seconds() -> u64 {
    30
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_reconnect_jitter_factor() -> f64 {
    0.25
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid {field} '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("invalid role '{value}'; expected admin, hr, client or candidate")]
    InvalidRole { value: String },
    #[error("auth token is missing; set PORTAL_AUTH_TOKEN")]
    MissingAuthToken,
    #[error("bell capacity must be at least 1, got {value}")]
    InvalidBellCapacity { value: usize },
    #[error("page size must be between 1 and 100, got {value}")]
    InvalidPageSize { value: u32 },
    #[error("request timeout must be at least 100 ms, got {value}")]
    InvalidRequestTimeout { value: u64 },
    #[error("poll interval must be between 1 and 3600 seconds, got {value}")]
    InvalidPollInterval { value: u64 },
    #[error("reconnect base delay ({base} ms) must be positive and not exceed max ({max} ms)")]
    InvalidReconnectBounds { base: u64, max: u64 },
    #[error("reconnect jitter factor must be between 0.0 and 1.0, got {value}")]
    InvalidReconnectJitter { value: f64 },
}

/// Loads configuration using layered `.env` files and `PORTAL_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates configuration. Later layers win:
    /// `.env`, `.env.local`, `.env.<profile>`, `.env.<profile>.local`, process env.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("PORTAL_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_base_url =
            take_string(&mut layered, "API_BASE_URL").unwrap_or_else(default_api_base_url);
        let push_url = take_string(&mut layered, "PUSH_URL");
        let auth_token = take_string(&mut layered, "AUTH_TOKEN").map(|v| v.trim().to_string());
        let user_id = take_string(&mut layered, "USER_ID");
        let role = take_string(&mut layered, "ROLE").unwrap_or_else(default_role);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);

        let request_timeout_ms = take_parsed(&mut layered, "REQUEST_TIMEOUT_MS")
            .unwrap_or_else(default_request_timeout_ms);
        let bell_capacity =
            take_parsed(&mut layered, "BELL_CAPACITY").unwrap_or_else(default_bell_capacity);
        let page_size = take_parsed(&mut layered, "PAGE_SIZE").unwrap_or_else(default_page_size);
        let seen_id_capacity = take_parsed(&mut layered, "SEEN_ID_CAPACITY")
            .unwrap_or_else(default_seen_id_capacity);

        let poller = PollerConfig {
            interval_seconds: take_parsed(&mut layered, "POLL_INTERVAL_SECONDS")
                .unwrap_or_else(default_poll_interval_seconds),
        };

        let reconnect = ReconnectConfig {
            base_ms: take_parsed(&mut layered, "RECONNECT_BASE_MS")
                .unwrap_or_else(default_reconnect_base_ms),
            max_ms: take_parsed(&mut layered, "RECONNECT_MAX_MS")
                .unwrap_or_else(default_reconnect_max_ms),
            jitter_factor: take_parsed(&mut layered, "RECONNECT_JITTER_FACTOR")
                .unwrap_or_else(default_reconnect_jitter_factor),
        };

        let config = AppConfig {
            profile,
            api_base_url,
            push_url,
            auth_token,
            user_id,
            role,
            log_level,
            log_format,
            request_timeout_ms,
            bell_capacity,
            page_size,
            seen_id_capacity,
            poller,
            reconnect,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("PORTAL_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("PORTAL_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered.remove(key).filter(|v| !v.is_empty())
}

fn take_parsed<T: std::str::FromStr>(layered: &mut BTreeMap<String, String>, key: &str) -> Option<T> {
    layered.remove(key).and_then(|v| v.trim().parse().ok())
}
