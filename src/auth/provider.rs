//! OIDC implicit-flow identity-provider client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use super::error::{AuthError, RedirectParseError};
use super::fragment::{fragment_params, parse_redirect_fragment, FragmentExpectations};
use super::store::LOGIN_TRANSACTION_KEY;
use super::types::{AuthResult, Clock};
use super::{random_token, IdentityProvider};
use crate::config::Config;
use crate::host::HostWindow;
use crate::storage::LocalStorage;

/// `state`/`nonce` pair recorded by `authorize()` and checked on return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginTransaction {
    pub state: String,
    pub nonce: String,
}

/// Production [`IdentityProvider`] that redirects the host window to the
/// provider's `/authorize` endpoint.
pub struct OidcProvider {
    authorize_endpoint: String,
    client_id: String,
    audience: String,
    scope: String,
    response_type: String,
    redirect_uri: String,
    storage: Arc<LocalStorage>,
    window: Arc<dyn HostWindow>,
    clock: Arc<dyn Clock>,
}

impl OidcProvider {
    pub fn new(
        config: &Config,
        storage: Arc<LocalStorage>,
        window: Arc<dyn HostWindow>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            authorize_endpoint: authorize_endpoint(&config.identity.domain),
            client_id: config.identity.client_id.clone(),
            audience: config.identity.audience.clone(),
            scope: config.identity.scope.clone(),
            response_type: config.identity.response_type.clone(),
            redirect_uri: config.identity_redirect_uri(),
            storage,
            window,
            clock,
        }
    }

    /// Build the authorization URL for one transaction.
    pub fn authorize_url(&self, transaction: &LoginTransaction) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.authorize_endpoint).map_err(|err| {
            AuthError::Invalid(format!(
                "invalid identity authorize endpoint `{}`: {err}",
                self.authorize_endpoint
            ))
        })?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", &self.response_type);
            params.append_pair("client_id", &self.client_id);
            params.append_pair("redirect_uri", &self.redirect_uri);
            params.append_pair("scope", &self.scope);
            if !self.audience.trim().is_empty() {
                params.append_pair("audience", &self.audience);
            }
            params.append_pair("state", &transaction.state);
            params.append_pair("nonce", &transaction.nonce);
        }
        Ok(url)
    }

    fn load_transaction(&self) -> Result<Option<LoginTransaction>, RedirectParseError> {
        self.storage
            .get_json::<LoginTransaction>(LOGIN_TRANSACTION_KEY)
            .map_err(|err| {
                RedirectParseError::with_message(format!("failed to read login transaction: {err}"))
            })
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    async fn authorize(&self) -> Result<(), AuthError> {
        if self.client_id.is_empty() {
            return Err(AuthError::Invalid(
                "identity.client_id is not configured; set it in login-callback.toml or LOGIN_CALLBACK_CLIENT_ID"
                    .to_string(),
            ));
        }
        let transaction = LoginTransaction {
            state: random_token(),
            nonce: random_token(),
        };
        let url = self.authorize_url(&transaction)?;
        self.storage.set_json(LOGIN_TRANSACTION_KEY, &transaction)?;
        tracing::info!(endpoint = %self.authorize_endpoint, "starting interactive login");
        self.window.navigate_to(url.as_str());
        Ok(())
    }

    async fn parse_redirect_fragment(
        &self,
        fragment: &str,
    ) -> Result<AuthResult, RedirectParseError> {
        let params = fragment_params(fragment);
        if params.contains_key("error") {
            let expectations = FragmentExpectations::default();
            return parse_redirect_fragment(fragment, &expectations, self.clock.now());
        }
        // A success redirect without a recorded transaction (replayed or
        // opened directly) cannot be matched to a login we started.
        let Some(transaction) = self.load_transaction()? else {
            tracing::debug!("redirect arrived without a login transaction");
            return Err(RedirectParseError::invalid_token("`state` does not match."));
        };
        let expectations = FragmentExpectations {
            state: Some(transaction.state.as_str()),
            nonce: Some(transaction.nonce.as_str()),
            client_id: Some(self.client_id.as_str()),
        };
        let parsed = parse_redirect_fragment(fragment, &expectations, self.clock.now());

        // A transaction is single-use whatever the outcome.
        if let Err(err) = self.storage.remove_item(LOGIN_TRANSACTION_KEY) {
            tracing::warn!(error = %err, "failed to clear login transaction");
        }
        parsed
    }
}

fn authorize_endpoint(domain: &str) -> String {
    let trimmed = domain.trim().trim_end_matches('/');
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        format!("{trimmed}/authorize")
    } else {
        format!("https://{trimmed}/authorize")
    }
}
