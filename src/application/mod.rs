//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod error;
pub mod hash;
pub mod services;

pub use error::{ApplicationError, ApplicationResult, BoxError};
