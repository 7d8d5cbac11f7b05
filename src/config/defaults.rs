//! Default configuration constants.
//!
//! Callers share these literals instead of repeating them across the
//! loader, the data model, and tests.

/// Identity-provider tenant host used for interactive login.
pub(super) const DEFAULT_IDENTITY_DOMAIN: &str = "auth.mozilla.auth0.com";
/// Audience requested from the identity provider.
pub(super) const DEFAULT_IDENTITY_AUDIENCE: &str = "login.taskcluster.net";
/// Scopes requested from the identity provider.
pub(super) const DEFAULT_IDENTITY_SCOPE: &str = "taskcluster-credentials openid profile email";
/// Implicit-flow response type: both tokens come back in the fragment.
pub(super) const DEFAULT_IDENTITY_RESPONSE_TYPE: &str = "id_token token";
/// Application origin the callback page is served from.
pub(super) const DEFAULT_APP_ORIGIN: &str = "http://localhost:5000";
/// Path of the login-callback route under the application origin.
pub(super) const DEFAULT_LOGIN_CALLBACK_PATH: &str = "/login";
/// Path of the service-auth callback route under the application origin.
pub(super) const DEFAULT_SERVICE_CALLBACK_PATH: &str = "/taskcluster-auth";
/// Default service root URL whose credential decides close-vs-reauthorize.
pub(super) const DEFAULT_SERVICE_ROOT_URL: &str = "https://firefox-ci-tc.services.mozilla.com";
/// Scope requested from the service token exchange.
pub(super) const DEFAULT_SERVICE_SCOPE: &str = "treeherder";
/// Timeout for outbound HTTP requests.
pub(super) const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Directory name under the user config root.
pub(super) const CONFIG_DIR_NAME: &str = "login-callback";
/// Local config file name looked up in the working directory.
pub(super) const LOCAL_CONFIG_FILE_NAME: &str = "login-callback.toml";
/// Global config file name under the per-user config directory.
pub(super) const GLOBAL_CONFIG_FILE_NAME: &str = "config.toml";
/// Storage document file name under the per-user config directory.
pub(super) const STORAGE_FILE_NAME: &str = "storage.json";
