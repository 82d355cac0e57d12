//! Crawl the WHO ICD classification API and materialize disease leaf nodes
//! (entities without children) into a local SQLite database.
//!
//! Layers, innermost first: [`domain`] (pure data), [`application`]
//! (token lifecycle and crawl services), [`infrastructure`] (HTTP, clock and
//! SQLite implementations of the I/O traits), [`cli`].

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
