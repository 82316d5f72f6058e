use concord_core::Sequence;
use serde::Deserialize;
use std::fmt;

/// Resumable gateway session, owned by one connection task.
///
/// Created from READY, kept across resume attempts, discarded whenever the
/// shard has to IDENTIFY again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    /// Last applied dispatch sequence
    pub sequence: Option<Sequence>,
    pub resume_url: Option<String>,
}

impl Session {
    pub(crate) fn from_ready(info: ReadySession, sequence: Option<Sequence>) -> Self {
        Self {
            session_id: info.session_id,
            sequence,
            resume_url: info.resume_gateway_url,
        }
    }

    /// RESUME needs a sequence to replay from
    pub fn can_resume(&self) -> bool {
        self.sequence.is_some()
    }
}

/// The part of READY the connection itself needs
#[derive(Debug, Deserialize)]
pub(crate) struct ReadySession {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingHello,
    Identifying,
    Resuming,
    Connected,
    /// Waiting to reconnect; `resumable` when the session was kept
    Reconnecting { resumable: bool },
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::AwaitingHello => f.write_str("awaiting-hello"),
            Self::Identifying => f.write_str("identifying"),
            Self::Resuming => f.write_str("resuming"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { resumable: true } => f.write_str("reconnecting(resume)"),
            Self::Reconnecting { resumable: false } => f.write_str("reconnecting(identify)"),
        }
    }
}
