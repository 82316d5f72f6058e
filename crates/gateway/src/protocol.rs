//! Gateway wire format: `{op, d, s, t}` envelopes, outbound command
//! payloads and close-code classes.

use concord_core::{Id, Intents, Sequence};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{GatewayError, Result};

pub const GATEWAY_VERSION: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Dispatch = 0,
    Heartbeat = 1,
    Identify = 2,
    PresenceUpdate = 3,
    VoiceStateUpdate = 4,
    Resume = 6,
    Reconnect = 7,
    RequestGuildMembers = 8,
    InvalidSession = 9,
    Hello = 10,
    HeartbeatAck = 11,
}

impl OpCode {
    pub fn from_u8(op: u8) -> Option<Self> {
        let op = match op {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            _ => return None,
        };
        Some(op)
    }
}

/// Inbound envelope. `d` stays raw until the opcode says what it is.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default)]
    pub s: Option<Sequence>,
    #[serde(default)]
    pub t: Option<String>,
}

#[derive(Serialize)]
struct Outbound<'a, T> {
    op: u8,
    d: &'a T,
}

/// Serialize an outbound `{op, d}` frame
pub fn encode<T: Serialize>(op: OpCode, d: &T) -> Result<String> {
    Ok(serde_json::to_string(&Outbound { op: op as u8, d })?)
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Hello {
    /// Milliseconds
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "concord".to_string(),
            device: "concord".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Identify {
    pub token: String,
    pub intents: Intents,
    pub shard: [u32; 2],
    pub compress: bool,
    pub large_threshold: u8,
    pub properties: ConnectionProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<Presence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resume {
    pub token: String,
    pub session_id: String,
    pub seq: Option<Sequence>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Online,
    Idle,
    Dnd,
    Invisible,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    /// 0 playing, 1 streaming, 2 listening, 3 watching, 5 competing
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    /// Unix millis since the client went idle
    #[serde(default)]
    pub since: Option<u64>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub afk: bool,
}

impl Presence {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn activity(mut self, kind: u8, name: impl Into<String>) -> Self {
        self.activities.push(Activity {
            name: name.into(),
            kind,
            url: None,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceStateUpdate {
    pub guild_id: Id,
    /// `None` disconnects from voice
    pub channel_id: Option<Id>,
    pub self_mute: bool,
    pub self_deaf: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestGuildMembers {
    pub guild_id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub limit: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub presences: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<Id>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl RequestGuildMembers {
    /// Every member of the guild
    pub fn all(guild_id: Id) -> Self {
        Self {
            guild_id,
            query: Some(String::new()),
            limit: 0,
            presences: false,
            user_ids: None,
            nonce: None,
        }
    }

    pub fn users(guild_id: Id, user_ids: Vec<Id>) -> Self {
        Self {
            guild_id,
            query: None,
            limit: 0,
            presences: false,
            user_ids: Some(user_ids),
            nonce: None,
        }
    }

    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}

// ============================================================================
// Close codes
// ============================================================================

pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const UNKNOWN_ERROR: u16 = 4000;
    pub const UNKNOWN_OPCODE: u16 = 4001;
    pub const DECODE_ERROR: u16 = 4002;
    pub const NOT_AUTHENTICATED: u16 = 4003;
    pub const AUTHENTICATION_FAILED: u16 = 4004;
    pub const ALREADY_AUTHENTICATED: u16 = 4005;
    pub const INVALID_SEQ: u16 = 4007;
    pub const RATE_LIMITED: u16 = 4008;
    pub const SESSION_TIMED_OUT: u16 = 4009;
    pub const INVALID_SHARD: u16 = 4010;
    pub const SHARDING_REQUIRED: u16 = 4011;
    pub const INVALID_API_VERSION: u16 = 4012;
    pub const INVALID_INTENTS: u16 = 4013;
    pub const DISALLOWED_INTENTS: u16 = 4014;
}

/// What a close means for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseClass {
    /// Keep the session and RESUME
    Resumable,
    /// Discard the session and IDENTIFY again
    NonResumable,
    /// Stop the shard
    Fatal,
}

/// Classify a close frame. `None` means the connection dropped without one.
pub fn classify_close(code: Option<u16>) -> CloseClass {
    use close_code::*;
    match code {
        Some(
            AUTHENTICATION_FAILED | INVALID_SHARD | SHARDING_REQUIRED | INVALID_API_VERSION
            | INVALID_INTENTS | DISALLOWED_INTENTS,
        ) => CloseClass::Fatal,
        Some(INVALID_SEQ | SESSION_TIMED_OUT | NORMAL | GOING_AWAY) => CloseClass::NonResumable,
        _ => CloseClass::Resumable,
    }
}

/// Connection URL with version, encoding and optional compression
pub fn gateway_url(base: &str, compress: bool) -> Result<String> {
    let mut url = Url::parse(base).map_err(|e| GatewayError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut()
        .clear()
        .append_pair("v", &GATEWAY_VERSION.to_string())
        .append_pair("encoding", "json");
    if compress {
        url.query_pairs_mut().append_pair("compress", "zlib-stream");
    }
    Ok(url.into())
}
