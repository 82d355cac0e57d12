//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with mock implementations.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::application::BoxError;
use crate::domain::{EntityRecord, IcdEntity};
use crate::infrastructure::{InfraError, InfraResult};

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// A non-2xx status is a normal response, not an `Err`; `Err` means the
/// exchange itself failed (connect, timeout, unreadable body).
pub trait HttpClient: Send + Sync {
    /// POST a form-encoded body.
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, BoxError>;

    /// GET with extra request headers.
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, BoxError>;
}

/// Wall clock abstraction.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Relational accessor for persisted disease entities, keyed by `who_id`.
pub trait EntityStore {
    /// Point lookup by key.
    fn find(&self, who_id: u64) -> Result<Option<IcdEntity>, BoxError>;

    /// Stored fingerprint for a key, if a row exists.
    fn content_hash(&self, who_id: u64) -> Result<Option<String>, BoxError>;

    /// Insert or update the row keyed by `record.who_id`.
    fn upsert(&self, record: &EntityRecord) -> Result<(), BoxError>;

    /// Stored rows whose `parent_who_id` is the given key.
    fn children_of(&self, parent_who_id: u64) -> Result<Vec<IcdEntity>, BoxError>;

    /// Number of stored rows.
    fn count(&self) -> Result<u64, BoxError>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Blocking reqwest client. One request in flight at a time.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> InfraResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InfraError::Http {
                context: "build HTTP client".into(),
                source: e,
            })?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, BoxError> {
        let response = self.client.post(url).form(form).send()?;
        let status = response.status().as_u16();
        Ok(HttpResponse::new(status, response.text()?))
    }

    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, BoxError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send()?;
        let status = response.status().as_u16();
        Ok(HttpResponse::new(status, response.text()?))
    }
}

/// Real clock implementation.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
