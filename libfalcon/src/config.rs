//! Configuration management for Falcon Messenger
//!
//! Configuration is read from a TOML file (`$FALCON_CONFIG`, or
//! `<config dir>/falcon-messenger/config.toml`) and then overridden by
//! `FALCON_*` environment variables. A missing file is not an error: every
//! setting has a default and credentials can come from the environment alone.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::platforms::bluesky::DEFAULT_SERVICE;
use crate::types::PlatformId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub bluesky: BlueskyConfig,
    pub discord: DiscordConfig,
    pub dispatch: DispatchConfig,
    pub recommendations: RecommendationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            debug: false,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueskyConfig {
    pub handle: Option<String>,
    pub app_password: Option<String>,
    /// PDS base URL
    pub service: String,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            handle: None,
            app_password: None,
            service: DEFAULT_SERVICE.to_string(),
        }
    }
}

impl BlueskyConfig {
    pub fn is_configured(&self) -> bool {
        is_set(&self.handle) && is_set(&self.app_password)
    }
}

impl std::fmt::Debug for BlueskyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueskyConfig")
            .field("handle", &self.handle)
            .field("app_password", &redacted(&self.app_password))
            .field("service", &self.service)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
}

impl DiscordConfig {
    pub fn is_configured(&self) -> bool {
        is_set(&self.webhook_url)
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("webhook_url", &redacted(&self.webhook_url))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on platforms contacted at once
    pub max_concurrency: usize,
    /// Per-target budget for a whole publish (retries included)
    #[serde(with = "duration_serde::option")]
    pub publish_timeout: Option<Duration>,
    /// Timeout for each individual HTTP request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    pub retry_attempts: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            publish_timeout: None,
            request_timeout: Duration::from_secs(30),
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationsConfig {
    pub endpoint_url: Option<String>,
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,
    pub verify_ssl: bool,
    pub min_rvol: f64,
    pub min_volume: u64,
    /// Posted-tickers database; `~` is expanded
    pub tracker_path: String,
}

impl Default for RecommendationsConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            poll_interval: Duration::from_secs(300),
            verify_ssl: false,
            min_rvol: 2.0,
            min_volume: 1_000_000,
            tracker_path: "~/.local/share/falcon-messenger/posted_tickers.db".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, then apply env overrides
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a specific path (no env overrides)
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Apply `FALCON_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply `FALCON_*` overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("FALCON_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("FALCON_PORT") {
            self.server.port = port.trim().parse().map_err(|_| invalid("FALCON_PORT", &port))?;
        }
        if let Some(debug) = lookup("FALCON_DEBUG") {
            self.server.debug = parse_bool(&debug);
        }
        if let Some(handle) = lookup("FALCON_BLUESKY_HANDLE") {
            self.bluesky.handle = Some(handle);
        }
        if let Some(password) = lookup("FALCON_BLUESKY_APP_PASSWORD") {
            self.bluesky.app_password = Some(password);
        }
        if let Some(url) = lookup("FALCON_DISCORD_WEBHOOK_URL") {
            self.discord.webhook_url = Some(url);
        }
        if let Some(url) = lookup("FALCON_ENDPOINT_URL") {
            self.recommendations.endpoint_url = Some(url);
        }
        if let Some(interval) = lookup("FALCON_POLL_INTERVAL") {
            self.recommendations.poll_interval =
                parse_duration(&interval).map_err(|_| invalid("FALCON_POLL_INTERVAL", &interval))?;
        }
        if let Some(verify) = lookup("FALCON_VERIFY_SSL") {
            self.recommendations.verify_ssl = parse_bool(&verify);
        }
        Ok(())
    }

    /// Platforms with complete credentials, in canonical order
    pub fn configured_targets(&self) -> Vec<PlatformId> {
        PlatformId::ALL
            .into_iter()
            .filter(|id| self.is_configured(*id))
            .collect()
    }

    pub fn is_configured(&self, platform: PlatformId) -> bool {
        match platform {
            PlatformId::Bluesky => self.bluesky.is_configured(),
            PlatformId::Discord => self.discord.is_configured(),
        }
    }

    /// Tracker database path with `~` expanded
    pub fn tracker_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.recommendations.tracker_path).to_string())
    }
}

/// Config file path: `$FALCON_CONFIG`, else `<config dir>/falcon-messenger/config.toml`
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FALCON_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("falcon-messenger").join("config.toml"))
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "[REDACTED]")
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("cannot parse '{}'", value),
    }
}

/// Plain integers are seconds; anything else goes through humantime ("5m", "90s")
pub fn parse_duration(value: &str) -> std::result::Result<Duration, humantime::DurationError> {
    let value = value.trim();
    match value.parse::<u64>() {
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => humantime::parse_duration(value),
    }
}

mod duration_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    fn from_raw<E: de::Error>(raw: Raw) -> Result<Duration, E> {
        match raw {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_duration(&text).map_err(E::custom),
        }
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        from_raw(Raw::deserialize(deserializer)?)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(duration) => super::serialize(duration, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<Raw>::deserialize(deserializer)?
                .map(from_raw)
                .transpose()
        }
    }
}
