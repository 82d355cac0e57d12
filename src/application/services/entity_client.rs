//! Authenticated entity fetches

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::application::services::TokenManager;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{DomainError, RemoteNode};
use crate::infrastructure::traits::HttpClient;

/// Where and how to fetch entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOptions {
    /// API host, e.g. `https://id.who.int`; entities live under `{api_base}/icd/`
    pub api_base: String,
    /// Path of the first entity, e.g. `entity`
    pub root_path: String,
    /// `Accept-Language` header value
    pub language: String,
    /// `API-Version` header value
    pub api_version: String,
    /// Skip entity paths already visited in this run
    pub cycle_guard: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            api_base: "https://id.who.int".into(),
            root_path: "entity".into(),
            language: "en".into(),
            api_version: "v2".into(),
            cycle_guard: false,
        }
    }
}

/// Fetches and parses single entity documents.
pub struct EntityClient {
    http: Arc<dyn HttpClient>,
    options: CrawlOptions,
}

impl EntityClient {
    pub fn new(http: Arc<dyn HttpClient>, options: CrawlOptions) -> Self {
        Self { http, options }
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// `{api_base}/icd/{entity_path}`
    pub fn entity_url(&self, entity_path: &str) -> String {
        format!(
            "{}/icd/{}",
            self.options.api_base.trim_end_matches('/'),
            entity_path.trim_start_matches('/')
        )
    }

    /// GET one entity with the bearer token.
    ///
    /// Non-2xx is `Fetch`, an unparsable or malformed body is `Domain`.
    pub fn fetch(&self, entity_path: &str, token: &str) -> ApplicationResult<RemoteNode> {
        let url = self.entity_url(entity_path);
        debug!("fetch: GET {}", url);
        let authorization = format!("Bearer {}", token);
        let headers = [
            ("Authorization", authorization.as_str()),
            ("Accept", "application/json"),
            ("Accept-Language", self.options.language.as_str()),
            ("API-Version", self.options.api_version.as_str()),
        ];

        let response =
            self.http
                .get(&url, &headers)
                .map_err(|e| ApplicationError::Transport {
                    context: format!("GET {}", url),
                    source: e,
                })?;

        if !response.is_success() {
            return Err(ApplicationError::Fetch {
                path: entity_path.to_string(),
                status: response.status,
                body: response.body,
            });
        }

        let raw: Value =
            serde_json::from_str(&response.body).map_err(|e| DomainError::InvalidDocument {
                message: e.to_string(),
            })?;
        Ok(RemoteNode::from_json(raw)?)
    }

    /// Acquire a fresh token and fetch the root entity once.
    pub fn probe_root(&self, tokens: &mut TokenManager) -> ApplicationResult<RemoteNode> {
        let token = tokens.acquire()?.value.clone();
        self.fetch(&self.options.root_path, &token)
    }
}
