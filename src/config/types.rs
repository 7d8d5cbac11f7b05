//! Configuration data model.
//!
//! Struct definitions plus default values. Loader and source-resolution
//! logic lives in `config::mod` so precedence behavior stays centralized.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::{
    DEFAULT_APP_ORIGIN, DEFAULT_IDENTITY_AUDIENCE, DEFAULT_IDENTITY_DOMAIN,
    DEFAULT_IDENTITY_RESPONSE_TYPE, DEFAULT_IDENTITY_SCOPE, DEFAULT_LOGIN_CALLBACK_PATH,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SERVICE_CALLBACK_PATH, DEFAULT_SERVICE_ROOT_URL,
    DEFAULT_SERVICE_SCOPE,
};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub identity: IdentityConfig,
    pub service: ServiceConfig,
    pub app: AppConfig,
    pub storage: StorageConfig,
}

/// Identity-provider (OIDC implicit flow) settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct IdentityConfig {
    /// Tenant host, e.g. `auth.example.com`.
    pub domain: String,
    /// Public client id. Required before an interactive login can start.
    pub client_id: String,
    pub audience: String,
    pub scope: String,
    pub response_type: String,
    /// Callback URL registered with the provider. Derived from `app.origin`
    /// when omitted.
    pub redirect_uri: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_IDENTITY_DOMAIN.to_string(),
            client_id: String::new(),
            audience: DEFAULT_IDENTITY_AUDIENCE.to_string(),
            scope: DEFAULT_IDENTITY_SCOPE.to_string(),
            response_type: DEFAULT_IDENTITY_RESPONSE_TYPE.to_string(),
            redirect_uri: None,
        }
    }
}

/// Second-tier service whose credential is reconciled after login.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Root URL keying the stored credential map.
    pub root_url: String,
    pub client_id: String,
    pub scope: String,
    /// Callback URL for the authorization-code exchange. Derived from
    /// `app.origin` when omitted.
    pub redirect_uri: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_url: DEFAULT_SERVICE_ROOT_URL.to_string(),
            client_id: String::new(),
            scope: DEFAULT_SERVICE_SCOPE.to_string(),
            redirect_uri: None,
        }
    }
}

/// Application surface settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Origin that receives silent-renewal messages and post-login redirects.
    pub origin: String,
    /// Optional backend API base. When set, successful logins are announced
    /// to `{api_base_url}/auth/login/` before the session is persisted.
    pub api_base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_APP_ORIGIN.to_string(),
            api_base_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Durable storage settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage document path. Defaults to `~/.config/login-callback/storage.json`.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Identity-provider redirect URI, falling back to `{origin}/login`.
    pub fn identity_redirect_uri(&self) -> String {
        self.identity
            .redirect_uri
            .clone()
            .unwrap_or_else(|| join_origin(&self.app.origin, DEFAULT_LOGIN_CALLBACK_PATH))
    }

    /// Service-auth redirect URI, falling back to `{origin}/taskcluster-auth`.
    pub fn service_redirect_uri(&self) -> String {
        self.service
            .redirect_uri
            .clone()
            .unwrap_or_else(|| join_origin(&self.app.origin, DEFAULT_SERVICE_CALLBACK_PATH))
    }
}

fn join_origin(origin: &str, path: &str) -> String {
    format!("{}{path}", origin.trim_end_matches('/'))
}

/// Where the active configuration text was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Local(PathBuf),
    Global(PathBuf),
    BuiltInDefaults,
}

/// Loaded configuration plus the source it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: ConfigSource,
}
