//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;
use std::time::Duration;

use crate::application::services::{CrawlerService, EntityClient, TokenManager};
use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::infrastructure::traits::{Clock, EntityStore, HttpClient, ReqwestHttpClient, SystemClock};
use crate::infrastructure::{InfraResult, SqliteEntityStore};

/// Container holding the I/O dependencies and building services from them.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// HTTP client abstraction
    pub http: Arc<dyn HttpClient>,

    /// Clock abstraction
    pub clock: Arc<dyn Clock>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        let http = ReqwestHttpClient::new(Duration::from_secs(settings.timeout_secs))?;
        Ok(Self::with_deps(
            settings,
            Arc::new(http),
            Arc::new(SystemClock),
        ))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, http: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            http,
            clock,
        }
    }

    /// Open the configured database.
    pub fn open_store(&self) -> InfraResult<Arc<SqliteEntityStore>> {
        Ok(Arc::new(SqliteEntityStore::open(&self.settings.database_path)?))
    }

    /// Token manager for the configured credentials.
    pub fn token_manager(&self) -> ApplicationResult<TokenManager> {
        Ok(TokenManager::new(
            self.http.clone(),
            self.clock.clone(),
            self.settings.token_url(),
            self.settings.scope.clone(),
            self.settings.credentials()?,
        ))
    }

    /// Entity client for the configured API.
    pub fn entity_client(&self) -> EntityClient {
        EntityClient::new(self.http.clone(), self.settings.crawl_options())
    }

    /// Crawler writing into `store`.
    pub fn crawler(&self, store: Arc<dyn EntityStore>) -> ApplicationResult<CrawlerService> {
        Ok(CrawlerService::new(
            self.entity_client(),
            store,
            self.token_manager()?,
        ))
    }
}
