//! Errors raised while dispatching a single request.
//!
//! None of these escape the dispatcher: each one is folded into a failed
//! envelope whose `msg` is the error's display text.

use thiserror::Error;

/// Error type accepted from operations and filters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RestError {
    /// A prepare hook failed before route resolution.
    #[error("{0}")]
    Prepare(BoxError),

    /// A pre-request filter vetoed the request.
    #[error("{0}")]
    Filter(BoxError),

    /// A parameter the operation requires was not supplied.
    #[error("missing required parameter `{0}`")]
    MissingParameter(String),

    /// A parameter was supplied but could not be converted.
    #[error("invalid value for parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The request declared a JSON body that does not parse.
    #[error("invalid JSON body: {0}")]
    InvalidBody(#[source] serde_json::Error),

    /// The request body could not be read from the connection.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The operation itself failed.
    #[error("{0}")]
    Operation(BoxError),

    /// The operation's return value could not be turned into JSON.
    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),
}

impl RestError {
    /// Wrap any error raised by operation code.
    pub fn operation(err: impl Into<BoxError>) -> Self {
        RestError::Operation(err.into())
    }
}
