//! State store error types.

use bb8_redis::{bb8::RunError, redis::RedisError};
use thiserror::Error;

/// Errors that can occur while reading or writing watermarks.
#[derive(Debug, Clone, Error)]
pub enum StateError {
    /// The state store could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The state store rejected a command.
    #[error("Command error: {0}")]
    CommandError(String),

    /// Reading or writing the local state file failed.
    #[error("IO error: {0}")]
    IoError(String),

    /// Stored state is not valid JSON.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl StateError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }
}

impl From<RedisError> for StateError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            Self::ConnectionError(err.to_string())
        } else {
            Self::CommandError(err.to_string())
        }
    }
}

impl From<RunError<RedisError>> for StateError {
    fn from(err: RunError<RedisError>) -> Self {
        match err {
            RunError::User(err) => err.into(),
            RunError::TimedOut => Self::ConnectionError("timed out waiting for connection".into()),
        }
    }
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
