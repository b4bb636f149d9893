//! Error types for registration and dispatch.

use thiserror::Error;

/// Errors raised while registering routes or flattening a service tree.
///
/// These are fatal: they surface at startup and are never recovered from
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The route was empty.
    #[error("route must not be empty")]
    EmptyRoute,

    /// The route did not begin with a `/`.
    #[error("route {0:?} must start with a /")]
    MissingLeadingSlash(String),
}

/// Errors raised by a middleware or handler while a request is running.
///
/// Converted by the dispatcher into a 500 response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// A middleware faulted the chain with a message.
    #[error("{0}")]
    Message(String),

    /// A middleware or handler panicked while running.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}
