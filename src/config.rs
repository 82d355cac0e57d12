//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/icdsync/icdsync.toml`
//! 3. Explicit config file (`--config <path>`)
//! 4. Environment variables: `ICD_*` prefix (`ICD_CLIENT_ID`, `ICD_CLIENT_SECRET`, ...)

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::services::{CrawlOptions, Credentials};
use crate::application::ApplicationError;
use crate::domain::expand_env_vars;

/// Unified configuration for icdsync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// OAuth2 client id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// OAuth2 client secret
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Token service host; the token endpoint is `{auth_base}/connect/token`
    pub auth_base: String,
    /// API host; entities live under `{api_base}/icd/`
    pub api_base: String,
    /// Entity path the sync starts from
    pub root_path: String,
    /// OAuth2 scope
    pub scope: String,
    /// `Accept-Language` header
    pub language: String,
    /// `API-Version` header
    pub api_version: String,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Skip entity paths already visited in one run
    pub cycle_guard: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_base: "https://icdaccessmanagement.who.int".into(),
            api_base: "https://id.who.int".into(),
            root_path: "entity".into(),
            scope: "icdapi_access".into(),
            language: "en".into(),
            api_version: "v2".into(),
            database_path: default_database_path(),
            timeout_secs: 30,
            cycle_guard: false,
        }
    }
}

/// Raw settings for intermediate parsing (`None` → not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub auth_base: Option<String>,
    pub api_base: Option<String>,
    pub root_path: Option<String>,
    pub scope: Option<String>,
    pub language: Option<String>,
    pub api_version: Option<String>,
    pub database_path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub cycle_guard: Option<bool>,
}

/// Get the default database path (`<XDG data dir>/icdsync/icd.db`).
fn default_database_path() -> PathBuf {
    ProjectDirs::from("", "", "icdsync")
        .map(|dirs| dirs.data_dir().join("icd.db"))
        .unwrap_or_else(|| PathBuf::from("icd.db"))
}

/// Get the XDG config directory for icdsync.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "icdsync").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("icdsync.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Token endpoint URL.
    pub fn token_url(&self) -> String {
        format!("{}/connect/token", self.auth_base.trim_end_matches('/'))
    }

    /// Credentials, or a config error naming what is missing.
    pub fn credentials(&self) -> Result<Credentials, ApplicationError> {
        let client_id = non_empty(&self.client_id).ok_or_else(|| ApplicationError::Config {
            message: "client_id not set (ICD_CLIENT_ID or config file)".into(),
        })?;
        let client_secret =
            non_empty(&self.client_secret).ok_or_else(|| ApplicationError::Config {
                message: "client_secret not set (ICD_CLIENT_SECRET or config file)".into(),
            })?;
        Ok(Credentials {
            client_id,
            client_secret,
        })
    }

    /// Crawl parameters derived from these settings.
    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            api_base: self.api_base.clone(),
            root_path: self.root_path.clone(),
            language: self.language.clone(),
            api_version: self.api_version.clone(),
            cycle_guard: self.cycle_guard,
        }
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.database_path.to_string_lossy().as_ref());
        self.database_path = PathBuf::from(expanded);
    }

    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            client_id: overlay.client_id.clone().or_else(|| self.client_id.clone()),
            client_secret: overlay
                .client_secret
                .clone()
                .or_else(|| self.client_secret.clone()),
            auth_base: overlay
                .auth_base
                .clone()
                .unwrap_or_else(|| self.auth_base.clone()),
            api_base: overlay
                .api_base
                .clone()
                .unwrap_or_else(|| self.api_base.clone()),
            root_path: overlay
                .root_path
                .clone()
                .unwrap_or_else(|| self.root_path.clone()),
            scope: overlay.scope.clone().unwrap_or_else(|| self.scope.clone()),
            language: overlay
                .language
                .clone()
                .unwrap_or_else(|| self.language.clone()),
            api_version: overlay
                .api_version
                .clone()
                .unwrap_or_else(|| self.api_version.clone()),
            database_path: overlay
                .database_path
                .clone()
                .unwrap_or_else(|| self.database_path.clone()),
            timeout_secs: overlay.timeout_secs.unwrap_or(self.timeout_secs),
            cycle_guard: overlay.cycle_guard.unwrap_or(self.cycle_guard),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `explicit` - Optional config file given on the command line; must exist
    pub fn load(explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Explicit config file
        if let Some(path) = explicit {
            let raw = load_raw_settings(path)?;
            current = current.merge_with(&raw);
        }

        // 4. Environment variables (explicit override)
        current = Self::apply_env_overrides(current)?;

        current.expand_paths();

        Ok(current)
    }

    /// Apply ICD_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("ICD")
                .prefix_separator("_")
                .separator("__"),
        );
        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("client_id") {
            settings.client_id = Some(val);
        }
        if let Ok(val) = config.get_string("client_secret") {
            settings.client_secret = Some(val);
        }
        if let Ok(val) = config.get_string("auth_base") {
            settings.auth_base = val;
        }
        if let Ok(val) = config.get_string("api_base") {
            settings.api_base = val;
        }
        if let Ok(val) = config.get_string("root_path") {
            settings.root_path = val;
        }
        if let Ok(val) = config.get_string("scope") {
            settings.scope = val;
        }
        if let Ok(val) = config.get_string("language") {
            settings.language = val;
        }
        if let Ok(val) = config.get_string("api_version") {
            settings.api_version = val;
        }
        if let Ok(val) = config.get_string("database_path") {
            settings.database_path = PathBuf::from(val);
        }
        if let Ok(val) = config.get_int("timeout_secs") {
            settings.timeout_secs = u64::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("ICD_TIMEOUT_SECS must not be negative: {}", val),
            })?;
        }
        if let Ok(val) = config.get_bool("cycle_guard") {
            settings.cycle_guard = val;
        }

        Ok(settings)
    }

    /// Merged settings as TOML with the secret masked.
    pub fn to_display_toml(&self) -> Result<String, ApplicationError> {
        let mut shown = self.clone();
        if shown.client_secret.is_some() {
            shown.client_secret = Some("***".into());
        }
        toml::to_string_pretty(&shown).map_err(|e| ApplicationError::Config {
            message: format!("serialize settings: {}", e),
        })
    }

    /// Commented template for `config init`.
    pub fn template() -> String {
        r#"# icdsync configuration
# Environment variables ICD_* override values here (e.g. ICD_CLIENT_SECRET).

# OAuth2 client credentials from https://icd.who.int/icdapi
# client_id = ""
# client_secret = ""

# Token service and API hosts
# auth_base = "https://icdaccessmanagement.who.int"
# api_base = "https://id.who.int"

# Entity path the sync starts from
# root_path = "entity"

# scope = "icdapi_access"
# language = "en"
# api_version = "v2"

# SQLite database file (~ and $VAR are expanded)
# database_path = "~/.local/share/icdsync/icd.db"

# timeout_secs = 30

# Skip entity paths already visited in one run (guards against cyclic data)
# cycle_guard = false
"#
        .to_string()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
