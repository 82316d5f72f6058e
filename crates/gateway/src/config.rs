use concord_core::Intents;
use std::fmt;
use std::time::Duration;

use crate::backoff::BackoffConfig;
use crate::protocol::{ConnectionProperties, Presence};

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// Per-connection settings, shared read-only by every shard
#[derive(Clone)]
pub struct GatewayConfig {
    pub token: String,
    pub intents: Intents,
    /// Base URL; version and encoding are appended
    pub url: String,
    /// Request zlib-stream transport compression
    pub compress: bool,
    /// Member count above which a guild is sent without offline members
    pub large_threshold: u8,
    pub presence: Option<Presence>,
    pub properties: ConnectionProperties,
    /// Socket open until READY/RESUMED
    pub handshake_timeout: Duration,
    pub backoff: BackoffConfig,
    /// Outbound commands per `command_window`; heartbeats are exempt
    pub command_limit: u32,
    pub command_window: Duration,
    pub command_buffer_size: usize,
}

impl GatewayConfig {
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            intents,
            url: DEFAULT_GATEWAY_URL.to_string(),
            compress: false,
            large_threshold: 250,
            presence: None,
            properties: ConnectionProperties::default(),
            handshake_timeout: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
            command_limit: 120,
            command_window: Duration::from_secs(60),
            command_buffer_size: 256,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    pub fn with_presence(mut self, presence: Presence) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("url", &self.url)
            .field("compress", &self.compress)
            .field("large_threshold", &self.large_threshold)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
