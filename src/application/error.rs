//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Boxed error returned across the I/O boundary traits.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("failed to get access token (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    /// `body` is kept for diagnostics but left out of the message.
    #[error("failed to fetch entity: {path} (HTTP {status})")]
    Fetch {
        path: String,
        status: u16,
        body: String,
    },

    #[error("request failed: {context}")]
    Transport {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("store operation failed: {context}")]
    Store {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("config error: {message}")]
    Config { message: String },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
