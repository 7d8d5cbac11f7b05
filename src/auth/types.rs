//! Public auth model types.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fallback access-token lifetime when neither `exp` nor `expires_in` is known.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;
/// How long before expiry a session should be silently renewed.
const RENEWAL_LEAD_SECS: i64 = 15 * 60;

/// Authentication result decoded from one identity-provider redirect.
///
/// `access_token` is present iff authentication succeeded. Constructed once
/// per redirect and consumed immediately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthResult {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub token_type: Option<String>,
    /// Access-token lifetime in seconds.
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub id_token_claims: Option<IdTokenClaims>,
}

impl AuthResult {
    /// Access token when present and non-blank.
    pub fn usable_access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// Subset of OIDC id-token claims this crate reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default, deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,
    /// Expiry as unix seconds.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// One stored service credential, keyed by service root URL in a
/// [`CredentialMap`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCredential {
    /// Opaque credential payload.
    #[serde(default)]
    pub token: String,
    /// `None` when the entry carries no readable expiry; such an entry is
    /// never valid.
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_expiry",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires: Option<DateTime<Utc>>,
    /// Fields written by other clients are kept on rewrite.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl StoredCredential {
    pub fn new(token: impl Into<String>, expires: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires: Some(expires),
            extra: BTreeMap::new(),
        }
    }

    /// Valid only while `expires` is known and strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires > now)
    }
}

/// Service root URL -> stored credential.
///
/// Persisted as the entire value of one storage key and replaced as a whole
/// on write. Unknown root URLs are absent, never placeholder entries.
/// Entries that are not objects are skipped on read so one malformed root
/// cannot hide the others.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct CredentialMap(BTreeMap<String, StoredCredential>);

impl<'de> Deserialize<'de> for CredentialMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut entries = BTreeMap::new();
        for (root_url, value) in raw {
            match StoredCredential::deserialize(value) {
                Ok(credential) => {
                    entries.insert(root_url, credential);
                }
                Err(err) => {
                    tracing::warn!(%root_url, error = %err, "skipping malformed stored credential");
                }
            }
        }
        Ok(Self(entries))
    }
}

impl CredentialMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, root_url: &str) -> Option<&StoredCredential> {
        self.0.get(root_url)
    }

    /// Credential for `root_url` when one exists and has not expired.
    pub fn valid_credential(&self, root_url: &str, now: DateTime<Utc>) -> Option<&StoredCredential> {
        self.get(root_url).filter(|credential| credential.is_valid_at(now))
    }

    pub fn insert(&mut self, root_url: impl Into<String>, credential: StoredCredential) {
        self.0.insert(root_url.into(), credential);
    }

    pub fn remove(&mut self, root_url: &str) -> Option<StoredCredential> {
        self.0.remove(root_url)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StoredCredential)> {
        self.0.iter()
    }
}

impl FromIterator<(String, StoredCredential)> for CredentialMap {
    fn from_iter<I: IntoIterator<Item = (String, StoredCredential)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Identity-provider session persisted after a successful login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub id_token: Option<String>,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    /// When silent renewal should be attempted.
    pub renew_after: DateTime<Utc>,
    pub full_name: Option<String>,
    pub picture: Option<String>,
    pub oidc_subject: Option<String>,
}

impl UserSession {
    /// Derive a session from a successful result. Returns `None` when the
    /// result carries no usable access token.
    pub fn from_auth_result(result: &AuthResult, now: DateTime<Utc>) -> Option<Self> {
        let access_token = result.usable_access_token()?.to_string();
        let claims = result.id_token_claims.clone().unwrap_or_default();

        // Prefer the id-token expiry; the backend validates against it.
        let expires_at = claims
            .exp
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
            .unwrap_or_else(|| {
                let lifetime = result
                    .expires_in
                    .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
                    .max(60);
                now + Duration::seconds(lifetime)
            });
        let renew_after = (expires_at - Duration::seconds(RENEWAL_LEAD_SECS)).max(now);

        Some(Self {
            id_token: result.id_token.clone(),
            access_token,
            expires_at,
            renew_after,
            full_name: claims.nickname.or(claims.name),
            picture: claims.picture,
            oidc_subject: claims.sub,
        })
    }
}

/// Backend user record returned when a login is announced to the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Read `expires` as RFC 3339; missing, null or unparseable values become `None`.
fn deserialize_lenient_expiry<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
        .map(|expires| expires.with_timezone(&Utc)))
}

/// Deserialize `aud` claims encoded as a single string or an array.
fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::String(text) => Ok(vec![text]),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(text) => Ok(text),
                _ => Err(serde::de::Error::custom("aud entries must be strings")),
            })
            .collect(),
        _ => Err(serde::de::Error::custom("aud must be a string or array")),
    }
}
