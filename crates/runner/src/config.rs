//! Client configuration
//!
//! Loaded from a JSON file, then overridden from the environment:
//!
//! | Variable              | Field                    |
//! |-----------------------|--------------------------|
//! | `CONCORD_TOKEN`       | `token`                  |
//! | `CONCORD_GATEWAY_URL` | `gateway.url`            |
//! | `CONCORD_API_URL`     | `http.api_url`           |
//! | `CONCORD_SHARD_COUNT` | `sharding.shard_count`   |

use concord_core::Intents;
use concord_gateway::{BackoffConfig, DEFAULT_GATEWAY_URL, GatewayConfig, ShardManagerConfig};
use concord_http::HttpConfig;
use concord_ratelimit::RateLimitConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "https://discord.com/api/v10";

/// Root configuration for a client process
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bot token, usually supplied through `CONCORD_TOKEN`
    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub intents: Intents,

    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub sharding: ShardingSettings,

    #[serde(default)]
    pub backoff: BackoffSettings,

    /// Buffered dispatches per event bus subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    4096
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            intents: Intents::default(),
            gateway: GatewaySettings::default(),
            http: HttpSettings::default(),
            sharding: ShardingSettings::default(),
            backoff: BackoffSettings::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("gateway", &self.gateway)
            .field("http", &self.http)
            .field("sharding", &self.sharding)
            .field("backoff", &self.backoff)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override fields from `CONCORD_*` environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(token) = lookup("CONCORD_TOKEN") {
            self.token = token;
        }
        if let Some(url) = lookup("CONCORD_GATEWAY_URL") {
            self.gateway.url = url;
        }
        if let Some(url) = lookup("CONCORD_API_URL") {
            self.http.api_url = url;
        }
        if let Some(count) = lookup("CONCORD_SHARD_COUNT") {
            self.sharding.shard_count = count.parse().map_err(|reason| ConfigError::Env {
                var: "CONCORD_SHARD_COUNT",
                value: count,
                reason,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::Invalid("token is empty".into()));
        }
        if self.sharding.shard_count == ShardCount::Fixed(0) {
            return Err(ConfigError::Invalid("shard_count must be at least 1".into()));
        }
        if self.sharding.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid("max_concurrency must be at least 1".into()));
        }
        if let ShardCount::Fixed(count) = self.sharding.shard_count
            && let Some(id) = self.sharding.shard_ids.iter().find(|id| **id >= count)
        {
            return Err(ConfigError::Invalid(format!(
                "shard id {id} is outside shard_count {count}"
            )));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Connection settings shared by every shard
    pub fn gateway_config(&self) -> GatewayConfig {
        let gateway = &self.gateway;
        let mut config = GatewayConfig::new(self.token.clone(), self.intents)
            .with_url(gateway.url.clone())
            .with_compression(gateway.compress)
            .with_handshake_timeout(Duration::from_secs(gateway.handshake_timeout_secs))
            .with_backoff(self.backoff.to_backoff());
        config.large_threshold = gateway.large_threshold;
        config.command_limit = gateway.command_limit;
        config.command_window = Duration::from_secs(gateway.command_window_secs);
        config.command_buffer_size = gateway.command_buffer_size;
        config
    }

    pub fn http_config(&self) -> HttpConfig {
        let http = &self.http;
        HttpConfig {
            max_rate_limit_retries: http.max_rate_limit_retries,
            max_server_retries: http.max_server_retries,
            ratelimit: RateLimitConfig {
                global_per_second: http.global_per_second,
                max_wait: http.max_wait_ms.map(Duration::from_millis),
            },
            ..HttpConfig::default()
        }
    }

    /// Manager settings once the shard count and concurrency are known
    pub fn shard_manager_config(&self, shard_count: u32, max_concurrency: u32) -> ShardManagerConfig {
        ShardManagerConfig::default()
            .with_shard_count(shard_count)
            .with_shard_ids(self.sharding.shard_ids.iter().copied())
            .with_max_concurrency(max_concurrency)
            .with_startup_timeout(Duration::from_secs(self.sharding.startup_timeout_secs))
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// zlib-stream transport compression
    #[serde(default)]
    pub compress: bool,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u8,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_command_limit")]
    pub command_limit: u32,
    #[serde(default = "default_command_window_secs")]
    pub command_window_secs: u64,
    #[serde(default = "default_command_buffer_size")]
    pub command_buffer_size: usize,
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_large_threshold() -> u8 {
    250
}

fn default_handshake_timeout_secs() -> u64 {
    30
}

fn default_command_limit() -> u32 {
    120
}

fn default_command_window_secs() -> u64 {
    60
}

fn default_command_buffer_size() -> usize {
    256
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            compress: false,
            large_threshold: default_large_threshold(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            command_limit: default_command_limit(),
            command_window_secs: default_command_window_secs(),
            command_buffer_size: default_command_buffer_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Process-wide requests per second; `null` disables the ceiling
    #[serde(default = "default_global_per_second")]
    pub global_per_second: Option<u32>,
    /// Fail instead of waiting longer than this for a bucket
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
    #[serde(default = "default_retries")]
    pub max_rate_limit_retries: u32,
    #[serde(default = "default_retries")]
    pub max_server_retries: u32,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_global_per_second() -> Option<u32> {
    Some(50)
}

fn default_retries() -> u32 {
    3
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            global_per_second: default_global_per_second(),
            max_wait_ms: None,
            max_rate_limit_retries: default_retries(),
            max_server_retries: default_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardingSettings {
    /// `"auto"` asks `GET /gateway/bot` for the recommended count
    #[serde(default)]
    pub shard_count: ShardCount,
    /// Shards run by this process; all of them when empty
    #[serde(default)]
    pub shard_ids: Vec<u32>,
    /// Identify concurrency; taken from `GET /gateway/bot` when unset
    #[serde(default)]
    pub max_concurrency: Option<u32>,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_startup_timeout_secs() -> u64 {
    60
}

impl Default for ShardingSettings {
    fn default() -> Self {
        Self {
            shard_count: ShardCount::Auto,
            shard_ids: Vec::new(),
            max_concurrency: None,
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSettings {
    #[serde(default = "default_backoff_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_stable_after_secs")]
    pub stable_after_secs: u64,
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_stable_after_secs() -> u64 {
    60
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_ms: default_backoff_base_ms(),
            max_ms: default_backoff_max_ms(),
            stable_after_secs: default_stable_after_secs(),
        }
    }
}

impl BackoffSettings {
    fn to_backoff(&self) -> BackoffConfig {
        BackoffConfig {
            base: Duration::from_millis(self.base_ms),
            max: Duration::from_millis(self.max_ms.max(self.base_ms)),
            stable_after: Duration::from_secs(self.stable_after_secs),
        }
    }
}

// ============================================================================
// Shard count
// ============================================================================

/// `"auto"` or a fixed number of shards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShardCount {
    #[default]
    Auto,
    Fixed(u32),
}

impl FromStr for ShardCount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse()
            .map(Self::Fixed)
            .map_err(|_| format!("expected \"auto\" or a shard count, got {s:?}"))
    }
}

impl Serialize for ShardCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Auto => serializer.serialize_str("auto"),
            Self::Fixed(n) => serializer.serialize_u32(*n),
        }
    }
}

impl<'de> Deserialize<'de> for ShardCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::Fixed(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
