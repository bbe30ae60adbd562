//! Error types for typed store access.
//!
//! Absence and the store's nil reply are not errors; they are states of
//! [`Value`](crate::Value). Everything here is a genuine failure that reaches
//! the caller either as an `Err` or through [`Value::error`](crate::Value::error).

use thiserror::Error;

/// Errors that can occur while talking to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Transport or driver failure, surfaced verbatim.
    #[error("driver error: {0}")]
    Driver(String),

    /// Operation against a key holding the wrong kind of value.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// Marshal or unmarshal failure inside a codec.
    #[error("codec error: {0}")]
    Codec(String),

    /// A result value could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The call's context was canceled before the driver answered.
    #[error("context canceled")]
    Canceled,

    /// The call's context deadline passed before the driver answered.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// An atomic multi-command unit failed; nothing from it was applied.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// The key resolved to nothing the store can address.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    Config(String),
}

/// Reasons a [`Value`](crate::Value) refuses to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The key or field was not in the store.
    #[error("value is absent")]
    Absent,

    /// The store holds an explicit nil that the target type cannot take.
    #[error("value is nil")]
    Nil,

    /// The bound codec rejected the raw bytes.
    #[error("{0}")]
    Codec(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true if the call's context fired before the driver answered.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Canceled | Error::DeadlineExceeded)
    }

    /// Returns true for failures of the round trip itself rather than of
    /// the data or its encoding.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Driver(_) | Error::Canceled | Error::DeadlineExceeded
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        if err.code() == Some("WRONGTYPE") {
            Error::WrongType
        } else {
            Error::Driver(err.to_string())
        }
    }
}
