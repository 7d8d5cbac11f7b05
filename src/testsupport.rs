//! Shared test fixtures for storage, auth, host, and controller test modules.
//!
//! Recording doubles for every collaborator seam live here so each test
//! module asserts on the same call logs instead of rebuilding its own fakes.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{
    AuthError, AuthResult, Clock, CredentialMap, CredentialStore, IdentityProvider,
    RedirectParseError, ServiceAuthorizer,
};
use crate::host::HostWindow;
use crate::render::RenderSink;

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!("login-callback-{prefix}-{millis}-{suffix}"));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a child path under the fixture root.
    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.child(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Unsigned JWT carrying `claims`, shaped like a provider id token.
pub fn unsigned_id_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn at_unix(secs: i64) -> Self {
        Self(Utc.timestamp_opt(secs, 0).single().expect("valid timestamp"))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// [`HostWindow`] that records every side effect.
#[derive(Debug, Default)]
pub struct RecordingWindow {
    fragment: Option<String>,
    framed: bool,
    opener: bool,
    posted: Mutex<Vec<(String, String)>>,
    navigations: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl RecordingWindow {
    pub fn top_level(fragment: Option<&str>) -> Self {
        Self {
            fragment: fragment.map(str::to_string),
            ..Self::default()
        }
    }

    /// Window embedded in a hidden frame with `fragment` in its URL.
    pub fn framed(fragment: &str) -> Self {
        Self {
            fragment: Some(fragment.to_string()),
            framed: true,
            ..Self::default()
        }
    }

    pub fn with_opener(mut self) -> Self {
        self.opener = true;
        self
    }

    pub fn posted_messages(&self) -> Vec<(String, String)> {
        lock(&self.posted).clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        lock(&self.navigations).clone()
    }

    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }

    pub fn close_calls(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl HostWindow for RecordingWindow {
    fn redirect_fragment(&self) -> Option<String> {
        self.fragment.clone()
    }

    fn is_top_level_frame(&self) -> bool {
        !self.framed
    }

    fn post_message_to_parent(&self, payload: &str, target_origin: &str) {
        lock(&self.posted).push((payload.to_string(), target_origin.to_string()));
    }

    fn has_opener(&self) -> bool {
        self.opener
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn navigate_to(&self, url: &str) {
        lock(&self.navigations).push(url.to_string());
    }

    fn open_new(&self, url: &str) {
        lock(&self.opened).push(url.to_string());
    }
}

/// [`RenderSink`] that keeps stdout lines and details.
#[derive(Debug, Default)]
pub struct RecordingSink {
    outputs: Mutex<Vec<String>>,
    details: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn outputs(&self) -> Vec<String> {
        lock(&self.outputs).clone()
    }

    pub fn details(&self) -> Vec<String> {
        lock(&self.details).clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        lock(&self.warnings).clone()
    }
}

impl RenderSink for RecordingSink {
    fn section(&self, _title: &str) {}
    fn activity(&self, _text: &str) {}
    fn field(&self, _key: &str, _value: &str) {}

    fn detail(&self, text: &str) {
        lock(&self.details).push(text.to_string());
    }

    fn warn(&self, msg: &str) {
        lock(&self.warnings).push(msg.to_string());
    }

    fn error(&self, msg: &str) {
        lock(&self.warnings).push(msg.to_string());
    }

    fn output(&self, line: &str) {
        lock(&self.outputs).push(line.to_string());
    }
}

/// Scripted [`IdentityProvider`].
pub struct FakeIdentityProvider {
    parse_result: Result<AuthResult, RedirectParseError>,
    authorize_error: Option<String>,
    stall_parse: bool,
    authorize_calls: AtomicUsize,
    parse_calls: AtomicUsize,
}

impl FakeIdentityProvider {
    /// Parses every fragment into a result carrying `access_token`.
    pub fn succeeding(access_token: &str) -> Self {
        Self::returning(AuthResult {
            access_token: Some(access_token.to_string()),
            id_token: Some("header.payload.sig".to_string()),
            expires_in: Some(3600),
            ..AuthResult::default()
        })
    }

    pub fn returning(result: AuthResult) -> Self {
        Self {
            parse_result: Ok(result),
            authorize_error: None,
            stall_parse: false,
            authorize_calls: AtomicUsize::new(0),
            parse_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: RedirectParseError) -> Self {
        Self {
            parse_result: Err(err),
            ..Self::succeeding("unused")
        }
    }

    /// `authorize()` fails with `message`.
    pub fn unauthorizable(message: &str) -> Self {
        Self {
            authorize_error: Some(message.to_string()),
            ..Self::succeeding("unused")
        }
    }

    /// `parse_redirect_fragment()` never completes.
    pub fn stalling() -> Self {
        Self {
            stall_parse: true,
            ..Self::succeeding("unused")
        }
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn parse_calls(&self) -> usize {
        self.parse_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn authorize(&self) -> Result<(), AuthError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        match &self.authorize_error {
            Some(message) => Err(AuthError::Invalid(message.clone())),
            None => Ok(()),
        }
    }

    async fn parse_redirect_fragment(
        &self,
        _fragment: &str,
    ) -> Result<AuthResult, RedirectParseError> {
        self.parse_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_parse {
            std::future::pending::<()>().await;
        }
        self.parse_result.clone()
    }
}

/// In-memory [`CredentialStore`] with call counters.
#[derive(Debug, Default)]
pub struct FakeCredentialStore {
    map: Mutex<CredentialMap>,
    saved: Mutex<Vec<String>>,
    save_error: Mutex<Option<AuthError>>,
    read_calls: AtomicUsize,
}

impl FakeCredentialStore {
    pub fn set_map(&self, map: CredentialMap) {
        *lock(&self.map) = map;
    }

    /// The next save fails with `err`.
    pub fn fail_saves_with(&self, err: AuthError) {
        *lock(&self.save_error) = Some(err);
    }

    pub fn save_calls(&self) -> usize {
        lock(&self.saved).len()
    }

    pub fn saved_tokens(&self) -> Vec<String> {
        lock(&self.saved).clone()
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for FakeCredentialStore {
    async fn save_credentials_from_auth_result(
        &self,
        result: &AuthResult,
    ) -> Result<(), AuthError> {
        lock(&self.saved).push(result.access_token.clone().unwrap_or_default());
        match lock(&self.save_error).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn read_credential_map(&self) -> Result<CredentialMap, AuthError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.map).clone())
    }
}

/// [`ServiceAuthorizer`] that records each `force_interactive` flag.
#[derive(Debug, Default)]
pub struct FakeServiceAuthorizer {
    calls: Mutex<Vec<bool>>,
    error: Option<String>,
}

impl FakeServiceAuthorizer {
    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<bool> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl ServiceAuthorizer for FakeServiceAuthorizer {
    async fn request_service_auth_code(&self, force_interactive: bool) -> Result<(), AuthError> {
        lock(&self.calls).push(force_interactive);
        match &self.error {
            Some(message) => Err(AuthError::Invalid(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verifies temp fixture helper writes nested files and exposes child paths.
    #[test]
    fn temp_dir_writes_nested_files() {
        let tmp = TestTempDir::new("fixture");
        let path = tmp.write_text("nested/file.txt", "hello");
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
        assert!(path.starts_with(tmp.path()));
    }

    // Verifies unsigned tokens decode back to the original claims.
    #[test]
    fn unsigned_token_payload_round_trips() {
        let token = unsigned_id_token(serde_json::json!({"sub": "abc"}));
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["sub"], "abc");
    }

    // Verifies the save-failure hook fires once and then clears.
    #[tokio::test]
    async fn credential_store_failure_is_one_shot() {
        let store = FakeCredentialStore::default();
        store.fail_saves_with(AuthError::Invalid("boom".into()));
        let result = AuthResult::default();
        assert!(store.save_credentials_from_auth_result(&result).await.is_err());
        assert!(store.save_credentials_from_auth_result(&result).await.is_ok());
        assert_eq!(store.save_calls(), 2);
    }
}
