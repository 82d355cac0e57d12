//! Domain entities: core data structures

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::DomainError;

/// Date format of `releaseDate` and of the stored `release_date` column.
pub const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Language-tagged string as returned by the API: `{"@language": "en", "@value": "..."}`.
#[derive(Debug, Deserialize)]
struct LanguageString {
    #[serde(rename = "@value")]
    value: Option<String>,
}

/// Wire shape of an entity document. Only the fields we classify on.
#[derive(Debug, Deserialize)]
struct EntityDocument {
    #[serde(rename = "@id")]
    id: Option<String>,
    #[serde(default)]
    title: Option<LanguageString>,
    #[serde(default)]
    definition: Option<LanguageString>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    child: Option<Vec<String>>,
    #[serde(rename = "releaseId", default)]
    release_id: Option<String>,
    #[serde(rename = "releaseDate", default)]
    release_date: Option<String>,
}

/// A node of the remote classification, fetched per request.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteNode {
    /// Self URL (`@id`)
    pub self_id: String,
    /// Numeric trailing segment of `@id`; `None` for the non-numeric root
    pub who_id: Option<u64>,
    pub title: Option<String>,
    pub definition: Option<String>,
    pub code: Option<String>,
    /// Child reference URLs in API order
    pub children: Vec<String>,
    pub release_id: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Full document, key order as received
    pub raw: Value,
}

impl RemoteNode {
    /// Parse an entity document.
    ///
    /// Absent optional fields map to `None`, an absent `child` list to an
    /// empty one. A document without `@id` is rejected.
    pub fn from_json(raw: Value) -> Result<Self, DomainError> {
        let doc: EntityDocument =
            serde_json::from_value(raw.clone()).map_err(|e| DomainError::InvalidDocument {
                message: e.to_string(),
            })?;

        let self_id = doc.id.ok_or(DomainError::MissingSelfId)?;
        let who_id = parse_who_id(&self_id);

        let release_date = doc.release_date.as_deref().and_then(|s| {
            NaiveDate::parse_from_str(s, RELEASE_DATE_FORMAT)
                .map_err(|e| tracing::debug!("ignoring releaseDate {:?} of {}: {}", s, self_id, e))
                .ok()
        });

        Ok(Self {
            who_id,
            title: doc.title.and_then(|t| t.value),
            definition: doc.definition.and_then(|d| d.value),
            code: doc.code,
            children: doc.child.unwrap_or_default(),
            release_id: doc.release_id,
            release_date,
            raw,
            self_id,
        })
    }

    /// A node with no children is a disease leaf.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Build the row to persist for this leaf.
    pub fn to_record(
        &self,
        parent_who_id: Option<u64>,
        raw_json: String,
        content_hash: String,
    ) -> Result<EntityRecord, DomainError> {
        let who_id = self.who_id.ok_or_else(|| DomainError::InvalidNodeId {
            id: self.self_id.clone(),
        })?;
        Ok(EntityRecord {
            who_id,
            parent_who_id,
            code: self.code.clone(),
            title: self.title.clone(),
            definition: self.definition.clone(),
            release_id: self.release_id.clone(),
            release_date: self.release_date,
            raw_json,
            content_hash,
        })
    }

    /// Label for output: title, falling back to the self URL.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.self_id)
    }
}

/// Field set written by an upsert, keyed by `who_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub who_id: u64,
    pub parent_who_id: Option<u64>,
    pub code: Option<String>,
    pub title: Option<String>,
    pub definition: Option<String>,
    pub release_id: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub raw_json: String,
    pub content_hash: String,
}

/// A persisted disease leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcdEntity {
    pub who_id: u64,
    pub parent_who_id: Option<u64>,
    pub code: Option<String>,
    pub title: Option<String>,
    pub definition: Option<String>,
    pub release_id: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub raw_json: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Last path segment of a URL (`basename`), ignoring a trailing slash.
pub fn trailing_segment(url: &str) -> Option<&str> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Numeric identifier from the trailing segment of a URL.
pub fn parse_who_id(url: &str) -> Option<u64> {
    trailing_segment(url).and_then(|s| s.parse().ok())
}

/// Entity path (`entity/{id}`) for a child reference URL.
pub fn child_entity_path(child_url: &str) -> Option<String> {
    trailing_segment(child_url).map(|id| format!("entity/{}", id))
}

/// Expand `~`, `$VAR` and `${VAR}` in a path-like string.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}
