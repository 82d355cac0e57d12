//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent malformed remote data.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("entity document has no @id")]
    MissingSelfId,

    #[error("entity {id} has no numeric identifier")]
    InvalidNodeId { id: String },

    #[error("invalid entity document: {message}")]
    InvalidDocument { message: String },
}
