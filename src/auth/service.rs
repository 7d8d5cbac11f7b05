//! Service authorization-code requests.
//!
//! The service issues its own credentials in exchange for an authorization
//! code. Requesting one means sending the user to
//! `{root_url}/login/oauth/authorize`; the code comes back to the service
//! redirect URI, which validates `state` against `requestState`.

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use super::error::AuthError;
use super::store::{REQUESTED_ROOT_URL_KEY, REQUEST_STATE_KEY};
use super::{random_token, ServiceAuthorizer};
use crate::config::Config;
use crate::host::HostWindow;
use crate::storage::LocalStorage;

pub struct ServiceAuthCodeRequester {
    root_url: String,
    client_id: String,
    scope: String,
    redirect_uri: String,
    storage: Arc<LocalStorage>,
    window: Arc<dyn HostWindow>,
}

impl ServiceAuthCodeRequester {
    pub fn new(config: &Config, storage: Arc<LocalStorage>, window: Arc<dyn HostWindow>) -> Self {
        Self {
            root_url: config.service.root_url.clone(),
            client_id: config.service.client_id.clone(),
            scope: config.service.scope.clone(),
            redirect_uri: config.service_redirect_uri(),
            storage,
            window,
        }
    }

    pub fn authorize_url(&self, state: &str) -> Result<Url, AuthError> {
        let endpoint = format!("{}/login/oauth/authorize", self.root_url);
        let mut url = Url::parse(&endpoint).map_err(|err| {
            AuthError::Invalid(format!("invalid service authorize endpoint `{endpoint}`: {err}"))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scope)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state);
        Ok(url)
    }
}

#[async_trait]
impl ServiceAuthorizer for ServiceAuthCodeRequester {
    async fn request_service_auth_code(&self, force_interactive: bool) -> Result<(), AuthError> {
        if self.client_id.is_empty() {
            return Err(AuthError::Invalid(
                "service.client_id is not configured; cannot request service credentials"
                    .to_string(),
            ));
        }
        let state = random_token();
        let url = self.authorize_url(&state)?;
        self.storage.set_item(REQUEST_STATE_KEY, &state)?;
        self.storage.set_item(REQUESTED_ROOT_URL_KEY, &self.root_url)?;

        tracing::info!(root_url = %self.root_url, force_interactive, "requesting service auth code");
        if force_interactive {
            self.window.navigate_to(url.as_str());
        } else {
            self.window.open_new(url.as_str());
        }
        Ok(())
    }
}
