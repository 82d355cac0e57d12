//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (HttpClient, Clock, EntityStore)
//! but are themselves concrete structs, not traits.

mod crawler;
mod entity_client;
mod token;

pub use crawler::{CrawlerService, SyncEvent, SyncReport};
pub use entity_client::{CrawlOptions, EntityClient};
pub use token::{Credentials, TokenManager};
