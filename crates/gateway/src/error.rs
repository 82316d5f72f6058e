use concord_core::{Classified, ErrorClass};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{CloseClass, classify_close};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Close code the server will keep sending; the shard cannot continue
    #[error("gateway closed with fatal code {code}: {reason}")]
    FatalClose { code: u16, reason: String },

    #[error("gateway closed (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("websocket transport error: {0}")]
    Transport(String),

    #[error("failed to decode gateway payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("zlib-stream inflate failed: {0}")]
    Inflate(String),

    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("invalid gateway url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("shard {0} is shut down")]
    Shutdown(u32),

    #[error("shard task failed: {0}")]
    TaskFailed(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl Classified for GatewayError {
    fn classification(&self) -> ErrorClass {
        match self {
            Self::FatalClose { .. } | Self::InvalidUrl { .. } | Self::TaskFailed(_) => {
                ErrorClass::Fatal
            }
            Self::Closed { code, .. } => match classify_close(*code) {
                CloseClass::Resumable => ErrorClass::Resumable,
                CloseClass::NonResumable => ErrorClass::NonResumable,
                CloseClass::Fatal => ErrorClass::Fatal,
            },
            Self::Transport(_) => ErrorClass::Transient,
            Self::Decode(_) | Self::Inflate(_) | Self::HandshakeTimeout(_) => {
                ErrorClass::Resumable
            }
            Self::Shutdown(_) => ErrorClass::NonResumable,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
