//! OAuth2 client-credentials token lifecycle
//!
//! The token is renewed proactively before use, never reactively on 401.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::BearerToken;
use crate::infrastructure::traits::{Clock, HttpClient};

/// Client credentials for the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// Success body of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    expires_in: i64,
}

/// Owns acquisition and renewal of the bearer token.
pub struct TokenManager {
    http: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    token_url: String,
    scope: String,
    credentials: Credentials,
    token: Option<BearerToken>,
}

impl TokenManager {
    pub fn new(
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
        token_url: impl Into<String>,
        scope: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            http,
            clock,
            token_url: token_url.into(),
            scope: scope.into(),
            credentials,
            token: None,
        }
    }

    /// Current token, if one was acquired.
    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    /// Request a new token, replacing any held one.
    ///
    /// A non-2xx response or an unreadable success body is an `Auth` error
    /// carrying the response body. The held token is left untouched on failure.
    pub fn acquire(&mut self) -> ApplicationResult<&BearerToken> {
        debug!("acquire: POST {}", self.token_url);
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", self.scope.as_str()),
        ];

        let response =
            self.http
                .post_form(&self.token_url, &form)
                .map_err(|e| ApplicationError::Transport {
                    context: format!("POST {}", self.token_url),
                    source: e,
                })?;

        if !response.is_success() {
            return Err(ApplicationError::Auth {
                status: response.status,
                body: response.body,
            });
        }

        let grant: TokenGrant =
            serde_json::from_str(&response.body).map_err(|e| ApplicationError::Auth {
                status: response.status,
                body: format!("unreadable token response: {}", e),
            })?;

        let token = BearerToken::new(grant.access_token, self.clock.now(), grant.expires_in);
        if token.refresh_at().is_none() {
            return Err(ApplicationError::Auth {
                status: response.status,
                body: format!("unusable expires_in: {}", grant.expires_in),
            });
        }
        info!("Token acquired, expires in {}s", token.expires_in);
        Ok(self.token.insert(token))
    }

    /// Whether the next fetch must renew the token first.
    pub fn refresh_due(&self) -> bool {
        match &self.token {
            Some(token) => token.refresh_due(self.clock.now()),
            None => true,
        }
    }

    /// Return a token valid for the next request, renewing it in place if it
    /// is within the safety margin of expiry.
    pub fn ensure_fresh(&mut self) -> ApplicationResult<&str> {
        if self.refresh_due() {
            if self.token.is_some() {
                info!("Token near expiry, refreshing");
            }
            if let Err(e) = self.acquire() {
                warn!("Failed to refresh token: {}", e);
                return Err(e);
            }
        }
        self.token
            .as_ref()
            .map(|t| t.value.as_str())
            .ok_or_else(|| ApplicationError::Auth {
                status: 0,
                body: "no token held".into(),
            })
    }
}
