//! Identity-provider login, service credentials, and their storage.
//!
//! The completion controller talks to three collaborators through the
//! traits below. Production adapters live in the submodules:
//! [`OidcProvider`] for the identity provider, [`LocalCredentialStore`] for
//! durable credentials, and [`ServiceAuthCodeRequester`] for the
//! second-tier authorization-code request.

mod api;
mod error;
pub mod fragment;
mod provider;
mod service;
mod store;
mod types;

use async_trait::async_trait;

pub use api::LoginApi;
pub use error::{AuthError, RedirectParseError};
pub use provider::{LoginTransaction, OidcProvider};
pub use service::ServiceAuthCodeRequester;
pub use store::{
    LocalCredentialStore, LOGIN_TRANSACTION_KEY, REQUESTED_ROOT_URL_KEY, REQUEST_STATE_KEY,
    USER_CREDENTIALS_KEY, USER_KEY, USER_SESSION_KEY,
};
pub use types::{
    AuthResult, Clock, CredentialMap, IdTokenClaims, StoredCredential, SystemClock, User,
    UserSession,
};

/// Client for the external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Begin interactive redirect-based login. Navigates away on success.
    async fn authorize(&self) -> Result<(), AuthError>;

    /// Decode and validate one redirect fragment.
    async fn parse_redirect_fragment(&self, fragment: &str)
        -> Result<AuthResult, RedirectParseError>;
}

/// Durable credential storage shared across page loads.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist the identity-provider session derived from `result`.
    async fn save_credentials_from_auth_result(&self, result: &AuthResult)
        -> Result<(), AuthError>;

    /// Read the whole service credential map. A missing key is an empty map.
    fn read_credential_map(&self) -> Result<CredentialMap, AuthError>;
}

/// Second-tier token exchange for service credentials.
#[async_trait]
pub trait ServiceAuthorizer: Send + Sync {
    /// Request a fresh service authorization code. `force_interactive`
    /// replaces the current window instead of opening a new one.
    async fn request_service_auth_code(&self, force_interactive: bool) -> Result<(), AuthError>;
}

/// Random URL-safe token for `state`/`nonce` values.
pub(crate) fn random_token() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
