//! Infrastructure-level errors (wraps application errors)

use thiserror::Error;

use crate::application::ApplicationError;

/// Infrastructure errors wrap application errors and add I/O-level concerns.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {context}")]
    Sqlite {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("HTTP client error: {context}")]
    Http {
        context: String,
        #[source]
        source: reqwest::Error,
    },
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a database error with context.
    pub fn sqlite(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Sqlite {
            context: context.into(),
            source,
        }
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
