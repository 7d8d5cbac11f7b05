//! Redirect-fragment decoding and validation.
//!
//! The provider returns its result as `application/x-www-form-urlencoded`
//! pairs after `#`. A fragment carrying `error` is a failed login; one
//! carrying `access_token` and/or `id_token` is a candidate success that
//! still has to pass the state, nonce, expiry and audience checks.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::error::RedirectParseError;
use super::types::{AuthResult, IdTokenClaims};

/// Values recorded when the login was started, checked against the redirect.
#[derive(Debug, Clone, Default)]
pub struct FragmentExpectations<'a> {
    pub state: Option<&'a str>,
    pub nonce: Option<&'a str>,
    /// Client id that must appear in the id token's `aud`.
    pub client_id: Option<&'a str>,
}

/// Decode a raw fragment (with or without the leading `#`) into its pairs.
///
/// Repeated keys keep their first value.
pub fn fragment_params(fragment: &str) -> BTreeMap<String, String> {
    let body = fragment.strip_prefix('#').unwrap_or(fragment);
    let mut params = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    params
}

/// True when the fragment contains anything at all after `#`.
pub fn is_present(fragment: Option<&str>) -> bool {
    fragment
        .map(|raw| raw.strip_prefix('#').unwrap_or(raw))
        .is_some_and(|body| !body.trim().is_empty())
}

/// Parse and validate one redirect fragment.
pub fn parse_redirect_fragment(
    fragment: &str,
    expect: &FragmentExpectations<'_>,
    now: DateTime<Utc>,
) -> Result<AuthResult, RedirectParseError> {
    let mut params = fragment_params(fragment);

    if let Some(error) = params.remove("error") {
        return Err(RedirectParseError::from_provider(
            error,
            params.remove("error_description"),
        ));
    }

    let access_token = params.remove("access_token");
    let id_token = params.remove("id_token");
    if access_token.is_none() && id_token.is_none() {
        return Err(RedirectParseError::with_message(
            "redirect fragment does not contain an authentication response",
        ));
    }

    let state = params.remove("state");
    if let Some(expected) = expect.state {
        if state.as_deref() != Some(expected) {
            return Err(RedirectParseError::invalid_token("`state` does not match."));
        }
    }

    let id_token_claims = match id_token.as_deref() {
        Some(token) => {
            let claims = decode_id_token_claims(token)?;
            validate_claims(&claims, expect, now)?;
            Some(claims)
        }
        None => None,
    };

    let expires_in = match params.remove("expires_in") {
        Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
            RedirectParseError::invalid_token(format!("invalid expires_in value `{raw}`"))
        })?),
        None => None,
    };

    Ok(AuthResult {
        access_token,
        id_token,
        token_type: params.remove("token_type"),
        expires_in,
        scope: params.remove("scope"),
        state,
        id_token_claims,
    })
}

/// Decode the JSON payload segment of a compact JWS.
///
/// Signature verification is not performed here; the token arrived over the
/// provider's TLS redirect and the backend re-validates it on login.
pub fn decode_id_token_claims(token: &str) -> Result<IdTokenClaims, RedirectParseError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(RedirectParseError::invalid_token(
            "ID token is not a compact JWT",
        ));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|err| {
            RedirectParseError::invalid_token(format!("ID token payload is not base64url: {err}"))
        })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        RedirectParseError::invalid_token(format!("ID token payload is not valid JSON: {err}"))
    })
}

fn validate_claims(
    claims: &IdTokenClaims,
    expect: &FragmentExpectations<'_>,
    now: DateTime<Utc>,
) -> Result<(), RedirectParseError> {
    if let Some(expected) = expect.nonce {
        if claims.nonce.as_deref() != Some(expected) {
            return Err(RedirectParseError::invalid_token("Nonce does not match."));
        }
    }
    if let Some(exp) = claims.exp {
        if exp <= now.timestamp() {
            return Err(RedirectParseError::invalid_token(
                "Expiration Time (exp) claim error in the ID token",
            ));
        }
    }
    if let Some(client_id) = expect.client_id.filter(|id| !id.is_empty()) {
        if !claims.aud.is_empty() && !claims.aud.iter().any(|aud| aud == client_id) {
            return Err(RedirectParseError::invalid_token(
                "Audience (aud) claim mismatch in the ID token",
            ));
        }
    }
    Ok(())
}
