//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`LOGIN_CALLBACK_CLIENT_ID`,
//!    `LOGIN_CALLBACK_SERVICE_ROOT_URL`, `LOGIN_CALLBACK_APP_ORIGIN`,
//!    `LOGIN_CALLBACK_API_BASE_URL`)
//! 2. TOML file specified via --config CLI flag
//! 3. ./login-callback.toml in the current directory
//! 4. $XDG_CONFIG_HOME/login-callback/config.toml (or
//!    ~/.config/login-callback/config.toml)
//! 5. Built-in defaults

use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use url::Url;

mod defaults;
mod types;

use defaults::{
    CONFIG_DIR_NAME, GLOBAL_CONFIG_FILE_NAME, LOCAL_CONFIG_FILE_NAME, STORAGE_FILE_NAME,
};
pub use types::{
    AppConfig, Config, ConfigSource, IdentityConfig, LoadedConfig, ServiceConfig, StorageConfig,
};

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    Ok(load_config_with_source(path_override)?.config)
}

/// Load configuration and report which file (if any) supplied it.
pub fn load_config_with_source(path_override: Option<&str>) -> Result<LoadedConfig, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<LoadedConfig, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (config_text, source) = read_config_text_with_sources(path_override, &read_file, &config_root)?;
    let mut config: Config = toml::from_str(&config_text)?;
    apply_env_overrides(&mut config, &env_lookup)?;
    normalize_config(&mut config);
    validate_config(&config)?;
    Ok(LoadedConfig { config, source })
}

fn read_config_text_with_sources<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    if let Some(p) = path_override {
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, ConfigSource::Explicit(path)));
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if let Ok(text) = read_file(&local) {
        return Ok((text, ConfigSource::Local(local)));
    }
    if let Some(dir) = config_root() {
        let global = dir.join(CONFIG_DIR_NAME).join(GLOBAL_CONFIG_FILE_NAME);
        if let Ok(text) = read_file(&global) {
            return Ok((text, ConfigSource::Global(global)));
        }
    }

    Ok((String::new(), ConfigSource::BuiltInDefaults))
}

fn apply_env_overrides<FEnv>(config: &mut Config, env_lookup: &FEnv) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(client_id) = env_value(env_lookup, "LOGIN_CALLBACK_CLIENT_ID") {
        config.identity.client_id = client_id;
    }
    if let Some(root_url) = env_value(env_lookup, "LOGIN_CALLBACK_SERVICE_ROOT_URL") {
        config.service.root_url = root_url;
    }
    if let Some(origin) = env_value(env_lookup, "LOGIN_CALLBACK_APP_ORIGIN") {
        config.app.origin = origin;
    }
    if let Some(api) = env_value(env_lookup, "LOGIN_CALLBACK_API_BASE_URL") {
        config.app.api_base_url = Some(api);
    }
    if let Some(timeout) = env_value(env_lookup, "LOGIN_CALLBACK_REQUEST_TIMEOUT_SECS") {
        let parsed = timeout.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid LOGIN_CALLBACK_REQUEST_TIMEOUT_SECS value `{timeout}`: expected positive integer seconds"
            ))
        })?;
        config.app.request_timeout_secs = parsed;
    }
    Ok(())
}

fn env_value<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name).and_then(|value| normalized_string(&value))
}

fn normalize_config(config: &mut Config) {
    // Credential-map keys and message origins are compared verbatim, so a
    // trailing slash would silently miss the stored entry.
    config.service.root_url = config.service.root_url.trim().trim_end_matches('/').to_string();
    config.app.origin = config.app.origin.trim().trim_end_matches('/').to_string();
    config.identity.client_id = config.identity.client_id.trim().to_string();
    config.service.client_id = config.service.client_id.trim().to_string();
    config.app.api_base_url = config
        .app
        .api_base_url
        .as_deref()
        .and_then(normalized_string)
        .map(|value| value.trim_end_matches('/').to_string());
    config.app.request_timeout_secs = config.app.request_timeout_secs.max(1);
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if normalized_string(&config.identity.domain).is_none() {
        return Err(ConfigError::Invalid(
            "identity.domain must not be empty".to_string(),
        ));
    }
    validate_url("service.root_url", &config.service.root_url)?;
    validate_url("app.origin", &config.app.origin)?;
    if let Some(api) = &config.app.api_base_url {
        validate_url("app.api_base_url", api)?;
    }
    if let Some(uri) = &config.identity.redirect_uri {
        validate_url("identity.redirect_uri", uri)?;
    }
    if let Some(uri) = &config.service.redirect_uri {
        validate_url("service.redirect_uri", uri)?;
    }
    Ok(())
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }
    Url::parse(value)
        .map(|_| ())
        .map_err(|err| ConfigError::Invalid(format!("{field} `{value}` is not a valid URL: {err}")))
}

fn normalized_string(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Resolve the storage document path, honoring `storage.path` when set.
pub fn storage_path(config: &Config) -> Option<PathBuf> {
    if let Some(path) = &config.storage.path {
        return Some(path.clone());
    }
    config_root_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(STORAGE_FILE_NAME))
}

/// Per-user configuration root (`$XDG_CONFIG_HOME` or `~/.config`).
pub fn config_root_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".config"))
        .or_else(dirs::config_dir)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
