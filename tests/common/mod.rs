//! Shared fakes for integration tests: a scripted HTTP backend and a manual clock.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use icdsync::application::services::{CrawlerService, EntityClient, TokenManager};
use icdsync::application::BoxError;
use icdsync::config::Settings;
use icdsync::infrastructure::di::ServiceContainer;
use icdsync::infrastructure::traits::{Clock, HttpClient, HttpResponse};
use icdsync::infrastructure::SqliteEntityStore;

pub const AUTH_BASE: &str = "https://auth.test";
pub const API_BASE: &str = "https://api.test";
pub const TOKEN_URL: &str = "https://auth.test/connect/token";

/// Self URL of an entity as the API reports it.
pub fn who_url(id: &str) -> String {
    if id == "entity" {
        "http://id.who.int/icd/entity".to_string()
    } else {
        format!("http://id.who.int/icd/entity/{}", id)
    }
}

/// Request URL of an entity path (`entity` or `entity/123`).
pub fn api_url(entity_path: &str) -> String {
    format!("{}/icd/{}", API_BASE, entity_path)
}

/// Entity document with `child` references omitted when `children` is empty.
pub fn entity_doc(id: &str, title: &str, children: &[&str]) -> Value {
    let mut doc = json!({
        "@context": "http://id.who.int/icd/contexts/contextForFoundationEntity.json",
        "@id": who_url(id),
        "title": {"@language": "en", "@value": title},
        "releaseId": "2024-01",
        "releaseDate": "2024-01-21",
    });
    if !children.is_empty() {
        doc["child"] = json!(children.iter().map(|c| who_url(c)).collect::<Vec<_>>());
    }
    doc
}

pub fn token_ok(value: &str, expires_in: i64) -> HttpResponse {
    HttpResponse::new(
        200,
        json!({
            "access_token": value,
            "expires_in": expires_in,
            "token_type": "Bearer",
            "scope": "icdapi_access",
        })
        .to_string(),
    )
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

// ============================================================
// Clock
// ============================================================

#[derive(Debug)]
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::seconds(secs);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ============================================================
// HTTP backend
// ============================================================

/// One request as seen by the fake.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: &'static str,
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl Recorded {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct ApiState {
    token_queue: VecDeque<HttpResponse>,
    token_requests: usize,
    entities: HashMap<String, HttpResponse>,
    requests: Vec<Recorded>,
    get_budget: Option<usize>,
    gets: usize,
    offline: bool,
    advance_after: HashMap<String, i64>,
}

/// Scripted token endpoint and entity API.
///
/// Token requests consume queued responses first; once the queue is empty
/// every request is granted `token-<n>` (n = 1-based request count) valid
/// for 3600s. Unknown entity URLs answer 404. With a GET budget, requests
/// beyond it answer 503.
pub struct FakeApi {
    clock: Arc<FakeClock>,
    state: Mutex<ApiState>,
}

impl FakeApi {
    pub fn new(clock: Arc<FakeClock>) -> Self {
        Self {
            clock,
            state: Mutex::new(ApiState::default()),
        }
    }

    pub fn add_entity(&self, entity_path: &str, doc: Value) {
        self.respond(entity_path, HttpResponse::new(200, doc.to_string()));
    }

    pub fn respond(&self, entity_path: &str, response: HttpResponse) {
        self.state
            .lock()
            .unwrap()
            .entities
            .insert(api_url(entity_path), response);
    }

    pub fn queue_token(&self, response: HttpResponse) {
        self.state.lock().unwrap().token_queue.push_back(response);
    }

    pub fn limit_gets(&self, budget: usize) {
        self.state.lock().unwrap().get_budget = Some(budget);
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Move the clock forward right after serving `entity_path`.
    pub fn advance_clock_after(&self, entity_path: &str, secs: i64) {
        self.state
            .lock()
            .unwrap()
            .advance_after
            .insert(api_url(entity_path), secs);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn token_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "POST")
            .collect()
    }

    pub fn entity_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "GET")
            .collect()
    }

    /// Requested URLs in request order.
    pub fn fetched(&self) -> Vec<String> {
        self.entity_requests().into_iter().map(|r| r.url).collect()
    }
}

fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl HttpClient for FakeApi {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, BoxError> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err("connection refused".into());
        }
        state.requests.push(Recorded {
            method: "POST",
            url: url.to_string(),
            params: owned(form),
        });
        state.token_requests += 1;
        if url != TOKEN_URL {
            return Ok(HttpResponse::new(404, "no such endpoint"));
        }
        let n = state.token_requests;
        Ok(state
            .token_queue
            .pop_front()
            .unwrap_or_else(|| token_ok(&format!("token-{}", n), 3600)))
    }

    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, BoxError> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err("connection refused".into());
        }
        state.requests.push(Recorded {
            method: "GET",
            url: url.to_string(),
            params: owned(headers),
        });
        state.gets += 1;
        if let Some(budget) = state.get_budget {
            if state.gets > budget {
                return Ok(HttpResponse::new(503, "budget exhausted"));
            }
        }
        let response = state
            .entities
            .get(url)
            .cloned()
            .unwrap_or_else(|| HttpResponse::new(404, "not found"));
        if let Some(secs) = state.advance_after.get(url) {
            self.clock.advance(*secs);
        }
        Ok(response)
    }
}

// ============================================================
// Wiring
// ============================================================

pub fn test_settings(database_path: PathBuf) -> Settings {
    Settings {
        client_id: Some("test-client".into()),
        client_secret: Some("test-secret".into()),
        auth_base: AUTH_BASE.into(),
        api_base: API_BASE.into(),
        database_path,
        ..Settings::default()
    }
}

/// Fakes wired through the service container against an in-memory store.
pub struct Harness {
    pub clock: Arc<FakeClock>,
    pub api: Arc<FakeApi>,
    pub store: Arc<SqliteEntityStore>,
    pub container: ServiceContainer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(test_settings(PathBuf::from("unused.db")))
    }

    pub fn with_cycle_guard() -> Self {
        Self::with_settings(Settings {
            cycle_guard: true,
            ..test_settings(PathBuf::from("unused.db"))
        })
    }

    pub fn with_settings(settings: Settings) -> Self {
        icdsync::util::testing::init_test_setup();
        let clock = Arc::new(FakeClock::new(start_time()));
        let api = Arc::new(FakeApi::new(clock.clone()));
        let container = ServiceContainer::with_deps(settings, api.clone(), clock.clone());
        Self {
            clock,
            api,
            store: Arc::new(SqliteEntityStore::open_in_memory().unwrap()),
            container,
        }
    }

    pub fn crawler(&self) -> CrawlerService {
        self.container.crawler(self.store.clone()).unwrap()
    }

    pub fn token_manager(&self) -> TokenManager {
        self.container.token_manager().unwrap()
    }

    pub fn entity_client(&self) -> EntityClient {
        self.container.entity_client()
    }

    /// root → A(100, leaf), B(200) → C(300, leaf)
    pub fn seed_small_tree(&self) {
        self.api
            .add_entity("entity", entity_doc("entity", "ICD Entity", &["100", "200"]));
        self.api
            .add_entity("entity/100", entity_doc("100", "Cholera", &[]));
        self.api
            .add_entity("entity/200", entity_doc("200", "Intestinal infections", &["300"]));
        self.api
            .add_entity("entity/300", entity_doc("300", "Typhoid fever", &[]));
    }
}
