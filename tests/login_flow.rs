//! End-to-end login callback flow against file-backed storage.
//!
//! Drives the controller through the production provider, credential store,
//! and service requester, with only the host window replaced.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use login_callback::auth::{
    Clock, CredentialStore, LocalCredentialStore, OidcProvider, ServiceAuthCodeRequester,
    StoredCredential, SystemClock, REQUESTED_ROOT_URL_KEY, REQUEST_STATE_KEY, USER_CREDENTIALS_KEY,
};
use login_callback::config::Config;
use login_callback::controller::{
    Collaborators, CompletionSettings, CompletionState, ExitAction, LoginCompletionController,
};
use login_callback::host::HostWindow;
use login_callback::storage::LocalStorage;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

const ROOT: &str = "https://tc.example.com";

/// scrypt cost for test documents; the production cost makes every write slow.
const TEST_KDF_LOG_N: u8 = 10;

struct TempDir(PathBuf);

impl TempDir {
    fn new(label: &str) -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let dir = std::env::temp_dir().join(format!(
            "login-callback-it-{label}-{}-{nanos}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        Self(dir)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[derive(Default)]
struct PageWindow {
    fragment: Option<String>,
    opener: bool,
    navigations: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl PageWindow {
    fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

impl HostWindow for PageWindow {
    fn redirect_fragment(&self) -> Option<String> {
        self.fragment.clone()
    }
    fn is_top_level_frame(&self) -> bool {
        true
    }
    fn post_message_to_parent(&self, _payload: &str, _target_origin: &str) {
        panic!("top-level page must not post to a parent");
    }
    fn has_opener(&self) -> bool {
        self.opener
    }
    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
    fn navigate_to(&self, url: &str) {
        self.navigations.lock().unwrap().push(url.to_string());
    }
    fn open_new(&self, _url: &str) {
        panic!("service auth code must replace the current window");
    }
}

fn config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.identity.domain = "login.example.com".to_string();
    config.identity.client_id = "client-1".to_string();
    config.service.root_url = ROOT.to_string();
    config.service.client_id = "svc-client".to_string();
    config.storage.path = Some(tmp.0.join("storage.json"));
    config
}

fn storage(config: &Config) -> Arc<LocalStorage> {
    let path = config.storage.path.clone().expect("storage path");
    Arc::new(LocalStorage::new(path).with_kdf_log_n(TEST_KDF_LOG_N))
}

fn controller(
    config: &Config,
    storage: &Arc<LocalStorage>,
    window: &Arc<PageWindow>,
) -> LoginCompletionController {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let host: Arc<dyn HostWindow> = window.clone();
    LoginCompletionController::new(
        Collaborators {
            identity: Arc::new(OidcProvider::new(
                config,
                storage.clone(),
                host.clone(),
                clock.clone(),
            )),
            credentials: Arc::new(LocalCredentialStore::new(storage.clone(), clock.clone())),
            service: Arc::new(ServiceAuthCodeRequester::new(
                config,
                storage.clone(),
                host.clone(),
            )),
            window: host,
            clock,
        },
        CompletionSettings::from_config(config),
    )
}

/// Run a fragment-less load and build the redirect the provider would send.
async fn start_login(config: &Config, storage: &Arc<LocalStorage>) -> String {
    let window = Arc::new(PageWindow::default());
    let mut login = controller(config, storage, &window);
    assert_eq!(
        login.on_mounted().await,
        &CompletionState::Finished(ExitAction::Authorize)
    );
    let navigations = window.navigations();
    assert_eq!(navigations.len(), 1);
    let url = Url::parse(&navigations[0]).expect("authorize url");
    let pairs: BTreeMap<String, String> = url.query_pairs().into_owned().collect();

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = serde_json::json!({
        "aud": pairs["client_id"],
        "nonce": pairs["nonce"],
        "exp": Utc::now().timestamp() + 3600,
        "nickname": "alice",
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!(
        "#access_token=T&id_token={header}.{payload}.sig&token_type=Bearer&expires_in=3600&state={}",
        pairs["state"]
    )
}

#[tokio::test]
async fn fresh_login_without_service_credential_requests_auth_code() {
    let tmp = TempDir::new("auth-code");
    let config = config(&tmp);
    let storage = storage(&config);
    let fragment = start_login(&config, &storage).await;

    let window = Arc::new(PageWindow {
        fragment: Some(fragment),
        opener: true,
        ..PageWindow::default()
    });
    let mut callback = controller(&config, &storage, &window);
    assert_eq!(
        callback.on_mounted().await,
        &CompletionState::Finished(ExitAction::RequestedServiceAuthCode)
    );

    let navigations = window.navigations();
    assert_eq!(navigations.len(), 1);
    assert!(navigations[0].starts_with("https://tc.example.com/login/oauth/authorize?"));
    let url = Url::parse(&navigations[0]).unwrap();
    let state = url
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .expect("state");
    assert_eq!(storage.get_item(REQUEST_STATE_KEY).unwrap(), Some(state));
    assert_eq!(
        storage.get_item(REQUESTED_ROOT_URL_KEY).unwrap().as_deref(),
        Some(ROOT)
    );
    assert_eq!(window.closes.load(Ordering::SeqCst), 0);

    let store = LocalCredentialStore::new(storage.clone(), Arc::new(SystemClock));
    let session = store.load_session().unwrap().expect("session saved");
    assert_eq!(session.access_token, "T");
    assert_eq!(session.full_name.as_deref(), Some("alice"));
}

#[tokio::test]
async fn credential_entry_without_expiry_does_not_block_login() {
    let tmp = TempDir::new("no-expiry");
    let config = config(&tmp);
    let storage = storage(&config);
    storage
        .set_item(
            USER_CREDENTIALS_KEY,
            r#"{"https://other.example":{"credentials":{"clientId":"c"}}}"#,
        )
        .unwrap();
    let fragment = start_login(&config, &storage).await;

    let window = Arc::new(PageWindow {
        fragment: Some(fragment),
        ..PageWindow::default()
    });
    let mut callback = controller(&config, &storage, &window);
    assert_eq!(
        callback.on_mounted().await,
        &CompletionState::Finished(ExitAction::RequestedServiceAuthCode)
    );
    assert_eq!(window.navigations().len(), 1);
    assert!(window.navigations()[0].starts_with("https://tc.example.com/login/oauth/authorize?"));
}

#[tokio::test]
async fn encrypted_document_records_configured_cost() {
    let tmp = TempDir::new("kdf-cost");
    let config = config(&tmp);
    let storage = storage(&config);
    storage.set_item("k", "v").unwrap();

    let raw = std::fs::read_to_string(storage.path()).unwrap();
    let document: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(document["encryption"]["kdf_log_n"], TEST_KDF_LOG_N);
    assert!(!raw.contains("\"v\""));
    assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn popup_with_valid_service_credential_closes() {
    let tmp = TempDir::new("close");
    let config = config(&tmp);
    let storage = storage(&config);
    LocalCredentialStore::new(storage.clone(), Arc::new(SystemClock))
        .store_service_credential(ROOT, StoredCredential::new("svc", Utc::now() + Duration::hours(1)))
        .unwrap();
    let fragment = start_login(&config, &storage).await;

    let window = Arc::new(PageWindow {
        fragment: Some(fragment),
        opener: true,
        ..PageWindow::default()
    });
    let mut callback = controller(&config, &storage, &window);
    assert_eq!(
        callback.on_mounted().await,
        &CompletionState::Finished(ExitAction::ClosedWindow)
    );
    assert_eq!(window.closes.load(Ordering::SeqCst), 1);
    assert!(window.navigations().is_empty());
}

#[tokio::test]
async fn replayed_redirect_is_rejected() {
    let tmp = TempDir::new("replay");
    let config = config(&tmp);
    let storage = storage(&config);
    let fragment = start_login(&config, &storage).await;

    let first = Arc::new(PageWindow {
        fragment: Some(fragment.clone()),
        ..PageWindow::default()
    });
    let mut accepted = controller(&config, &storage, &first);
    assert!(!matches!(
        accepted.on_mounted().await,
        CompletionState::Error(_)
    ));

    let second = Arc::new(PageWindow {
        fragment: Some(fragment),
        ..PageWindow::default()
    });
    let mut replay = controller(&config, &storage, &second);
    replay.on_mounted().await;
    assert_eq!(replay.error_message(), Some("`state` does not match."));
    assert!(second.navigations().is_empty());
}

#[tokio::test]
async fn logout_clears_session_and_credentials() {
    let tmp = TempDir::new("logout");
    let config = config(&tmp);
    let storage = storage(&config);
    let store = LocalCredentialStore::new(storage.clone(), Arc::new(SystemClock));
    store
        .store_service_credential(ROOT, StoredCredential::new("svc", Utc::now() + Duration::hours(1)))
        .unwrap();
    assert_eq!(store.read_credential_map().unwrap().len(), 1);

    assert!(store.clear_login().unwrap());
    assert!(store.read_credential_map().unwrap().is_empty());
    assert!(!store.clear_login().unwrap());
}
