//! Backend login announcement.
//!
//! Before a session is persisted the backend is told about the new tokens
//! so it can establish its own session and return the user record.

use serde::Deserialize;
use std::time::Duration;

use super::error::AuthError;
use super::types::{AuthResult, User};

/// Error body shape returned by the backend on rejected logins.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
}

const USER_AGENT: &str = concat!("login-callback/", env!("CARGO_PKG_VERSION"));

fn build_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, AuthError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()?)
}

/// HTTP client for `{api_base_url}/auth/login/`.
#[derive(Debug, Clone)]
pub struct LoginApi {
    base_url: String,
    client: reqwest::Client,
}

impl LoginApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let client = build_client(timeout, USER_AGENT)?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn login_url(&self) -> String {
        format!("{}/auth/login/", self.base_url)
    }

    /// Announce a successful login and return the backend's user record.
    pub async fn announce_login(&self, result: &AuthResult) -> Result<User, AuthError> {
        let access_token = result.usable_access_token().ok_or_else(|| {
            AuthError::Invalid("cannot announce a login without an access token".to_string())
        })?;

        let mut request = self.client.get(self.login_url()).bearer_auth(access_token);
        if let Some(exp) = result.id_token_claims.as_ref().and_then(|claims| claims.exp) {
            request = request.header("Access-Token-Expires-At", exp.to_string());
        }
        if let Some(id_token) = result.id_token.as_deref() {
            request = request.header("Id-Token", id_token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.detail)
                .unwrap_or(body);
            return Err(AuthError::Status(code, detail));
        }
        Ok(response.json().await?)
    }
}
