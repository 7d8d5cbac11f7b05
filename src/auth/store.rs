//! Persistent credential store backed by [`LocalStorage`].
//!
//! The service credential map lives under one key and is always replaced
//! as a whole. Two processes completing a login at the same time resolve
//! as last writer wins; no merge is attempted.

use async_trait::async_trait;
use std::sync::Arc;

use super::api::LoginApi;
use super::error::AuthError;
use super::types::{AuthResult, Clock, CredentialMap, StoredCredential, User, UserSession};
use super::CredentialStore;
use crate::storage::LocalStorage;

/// Service root URL -> credential map.
pub const USER_CREDENTIALS_KEY: &str = "userCredentials";
/// Identity-provider session.
pub const USER_SESSION_KEY: &str = "userSession";
/// Backend user record.
pub const USER_KEY: &str = "user";
/// Pending identity-provider login (`state`/`nonce`).
pub const LOGIN_TRANSACTION_KEY: &str = "loginTransaction";
/// Pending service auth-code request state.
pub const REQUEST_STATE_KEY: &str = "requestState";
/// Root URL the pending service auth-code request targets.
pub const REQUESTED_ROOT_URL_KEY: &str = "requestedRootUrl";

/// Production [`CredentialStore`].
pub struct LocalCredentialStore {
    storage: Arc<LocalStorage>,
    clock: Arc<dyn Clock>,
    api: Option<LoginApi>,
}

impl LocalCredentialStore {
    pub fn new(storage: Arc<LocalStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            api: None,
        }
    }

    /// Announce each login to the backend before persisting it.
    pub fn with_login_api(mut self, api: LoginApi) -> Self {
        self.api = Some(api);
        self
    }

    pub fn load_session(&self) -> Result<Option<UserSession>, AuthError> {
        Ok(self.storage.get_json(USER_SESSION_KEY)?)
    }

    pub fn load_user(&self) -> Result<Option<User>, AuthError> {
        Ok(self.storage.get_json(USER_KEY)?)
    }

    /// Insert or replace one service credential, rewriting the whole map.
    pub fn store_service_credential(
        &self,
        root_url: &str,
        credential: StoredCredential,
    ) -> Result<(), AuthError> {
        let mut map = self.read_credential_map()?;
        map.insert(root_url, credential);
        self.storage.set_json(USER_CREDENTIALS_KEY, &map)?;
        Ok(())
    }

    /// Remove the session, user record, and every service credential.
    ///
    /// Returns `true` when anything was removed.
    pub fn clear_login(&self) -> Result<bool, AuthError> {
        let mut removed = false;
        for key in [USER_SESSION_KEY, USER_KEY, USER_CREDENTIALS_KEY] {
            removed |= self.storage.remove_item(key)?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl CredentialStore for LocalCredentialStore {
    async fn save_credentials_from_auth_result(
        &self,
        result: &AuthResult,
    ) -> Result<(), AuthError> {
        let session = UserSession::from_auth_result(result, self.clock.now()).ok_or_else(|| {
            AuthError::Invalid("authentication result has no access token to save".to_string())
        })?;

        let user = match &self.api {
            Some(api) => Some(api.announce_login(result).await?),
            None => None,
        };

        self.storage.set_json(USER_SESSION_KEY, &session)?;
        if let Some(user) = user {
            self.storage.set_json(USER_KEY, &user)?;
        }
        tracing::debug!(expires_at = %session.expires_at, "saved login session");
        Ok(())
    }

    fn read_credential_map(&self) -> Result<CredentialMap, AuthError> {
        Ok(self
            .storage
            .get_json::<CredentialMap>(USER_CREDENTIALS_KEY)?
            .unwrap_or_default())
    }
}
