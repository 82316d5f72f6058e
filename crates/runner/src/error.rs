use concord_core::{Classified, ErrorClass};
use concord_gateway::GatewayError;
use concord_http::HttpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid {var}={value:?}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("shards already started")]
    AlreadyStarted,

    #[error("shards not started")]
    NotStarted,
}

impl Classified for ClientError {
    fn classification(&self) -> ErrorClass {
        match self {
            Self::Http(e) => e.classification(),
            Self::Gateway(e) => e.classification(),
            Self::Config(_) | Self::AlreadyStarted | Self::NotStarted => ErrorClass::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_passes_through() {
        let err = ClientError::from(GatewayError::FatalClose {
            code: 4004,
            reason: "Authentication failed".into(),
        });
        assert_eq!(err.classification(), ErrorClass::Fatal);
        assert!(err.to_string().contains("4004"));

        let err = ClientError::from(HttpError::Network("reset".into()));
        assert_eq!(err.classification(), ErrorClass::Transient);

        let err = ClientError::from(ConfigError::Invalid("token is empty".into()));
        assert_eq!(err.classification(), ErrorClass::Fatal);
    }
}
