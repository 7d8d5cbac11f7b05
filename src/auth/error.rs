//! Auth subsystem error definitions.

use std::fmt;

use crate::error::StorageError;

/// Fallback shown when a failed redirect carries neither a message nor a
/// description.
const GENERIC_LOGIN_FAILURE: &str = "login failed";

/// Errors surfaced by the auth collaborators.
#[derive(Debug)]
pub enum AuthError {
    Io(std::io::Error),
    Http(reqwest::Error),
    Status(u16, String),
    Invalid(String),
    Storage(StorageError),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Http(err) => write!(f, "http: {err}"),
            Self::Status(code, body) => write!(f, "status {code}: {body}"),
            Self::Invalid(msg) => write!(f, "{msg}"),
            Self::Storage(err) => write!(f, "storage: {err}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<std::io::Error> for AuthError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<StorageError> for AuthError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// A redirect fragment that is malformed, fails validation, or denotes a
/// denied/failed login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectParseError {
    /// Machine-readable code, e.g. `access_denied` or `invalid_token`.
    pub error: Option<String>,
    /// Locally produced message (decoding/validation failures).
    pub message: Option<String>,
    /// Provider-supplied `error_description`.
    pub error_description: Option<String>,
}

impl RedirectParseError {
    /// Error reported by the provider in the fragment itself.
    pub fn from_provider(error: impl Into<String>, description: Option<String>) -> Self {
        Self {
            error: Some(error.into()),
            message: None,
            error_description: description,
        }
    }

    /// Validation failure detected locally; carries a description the way
    /// the provider would.
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self {
            error: Some("invalid_token".to_string()),
            message: None,
            error_description: Some(description.into()),
        }
    }

    /// Failure with only a message (decode errors, storage faults).
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            error: None,
            message: Some(message.into()),
            error_description: None,
        }
    }

    /// User-facing text: `message` when present, else `error_description`.
    pub fn display_message(&self) -> String {
        non_blank(self.message.as_deref())
            .or_else(|| non_blank(self.error_description.as_deref()))
            .or_else(|| non_blank(self.error.as_deref()))
            .unwrap_or(GENERIC_LOGIN_FAILURE)
            .to_string()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

impl fmt::Display for RedirectParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(code) => write!(f, "{code}: {}", self.display_message()),
            None => write!(f, "{}", self.display_message()),
        }
    }
}

impl std::error::Error for RedirectParseError {}
