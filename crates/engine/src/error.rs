use thiserror::Error;

use pushgate_common::error::PushError;

/// Token filter store failures.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("blacklist store error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("blacklist store not connected")]
    Disconnected,
}

/// Terminal dispatch failures. The `Display` text becomes the recorded reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl From<PushError> for DispatchError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::Transport(msg) => DispatchError::Transport(msg),
            PushError::Config(msg) => DispatchError::Config(msg),
            PushError::InvalidMessage(msg) => DispatchError::InvalidMessage(msg),
        }
    }
}
