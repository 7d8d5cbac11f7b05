//! CLI entry point for login-callback.

mod cli;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::Parser;
use login_callback::auth::{
    Clock, CredentialStore, LocalCredentialStore, LoginApi, OidcProvider,
    ServiceAuthCodeRequester, StoredCredential, SystemClock,
};
use login_callback::build_info;
use login_callback::config::{load_config_with_source, storage_path, Config};
use login_callback::controller::{
    Collaborators, CompletionSettings, CompletionState, ExitAction, LoginCompletionController,
};
use login_callback::error::StorageError;
use login_callback::host::TerminalWindow;
use login_callback::render::{RenderSink, Renderer};
use login_callback::storage::LocalStorage;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How the callback page was loaded, as described on the command line.
struct PageFlags {
    fragment: Option<String>,
    framed: bool,
    opener: bool,
    launch_browser: bool,
}

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();
    init_tracing();

    let renderer = Renderer::new(!args.no_color && std::io::stderr().is_terminal());

    let loaded = match load_config_with_source(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            renderer.error(&e.to_string());
            std::process::exit(1);
        }
    };
    tracing::debug!(
        version = %build_info::version_line(),
        source = ?loaded.source,
        "configuration loaded"
    );
    let config = loaded.config;

    let Some(path) = storage_path(&config) else {
        renderer.error(&format!(
            "{}; set `storage.path` in login-callback.toml",
            StorageError::Unavailable
        ));
        std::process::exit(1);
    };
    let storage = Arc::new(LocalStorage::new(path));

    let result = match args.command {
        cli::Command::Complete {
            fragment,
            framed,
            opener,
            no_browser,
        } => {
            let page = PageFlags {
                fragment,
                framed,
                opener,
                launch_browser: !no_browser,
            };
            run_completion(renderer, &config, storage, page).await
        }
        cli::Command::Login { no_browser } => {
            let page = PageFlags {
                fragment: None,
                framed: false,
                opener: false,
                launch_browser: !no_browser,
            };
            run_completion(renderer, &config, storage, page).await
        }
        cli::Command::Status => run_status(&renderer, &config, storage),
        cli::Command::Store {
            token,
            root_url,
            expires_in,
        } => run_store(&renderer, &config, storage, &token, root_url, expires_in),
        cli::Command::Logout => run_logout(&renderer, storage),
    };

    if let Err(msg) = result {
        renderer.error(&msg);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn credential_store(
    config: &Config,
    storage: Arc<LocalStorage>,
    clock: Arc<dyn Clock>,
) -> Result<LocalCredentialStore, String> {
    let store = LocalCredentialStore::new(storage, clock);
    match config.app.api_base_url.as_deref() {
        Some(base_url) => {
            let api = LoginApi::new(base_url, Duration::from_secs(config.app.request_timeout_secs))
                .map_err(|err| format!("failed to build the login API client: {err}"))?;
            Ok(store.with_login_api(api))
        }
        None => Ok(store),
    }
}

async fn run_completion(
    renderer: Renderer,
    config: &Config,
    storage: Arc<LocalStorage>,
    page: PageFlags,
) -> Result<(), String> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sink: Arc<dyn RenderSink> = Arc::new(renderer);
    let window = Arc::new(
        TerminalWindow::new(sink)
            .with_fragment(page.fragment)
            .framed(page.framed)
            .with_opener(page.opener)
            .launch_browser(page.launch_browser),
    );

    let collaborators = Collaborators {
        identity: Arc::new(OidcProvider::new(
            config,
            storage.clone(),
            window.clone(),
            clock.clone(),
        )),
        credentials: Arc::new(credential_store(config, storage.clone(), clock.clone())?),
        service: Arc::new(ServiceAuthCodeRequester::new(config, storage, window.clone())),
        window,
        clock,
    };
    let mut controller =
        LoginCompletionController::new(collaborators, CompletionSettings::from_config(config));

    renderer.activity(controller.view().text);
    match controller.on_mounted().await {
        CompletionState::Finished(action) => {
            renderer.field("result", &describe_exit(action));
            Ok(())
        }
        CompletionState::Error(message) => Err(message.clone()),
        other => Err(format!("login callback stopped in unexpected state {other:?}")),
    }
}

fn describe_exit(action: &ExitAction) -> String {
    match action {
        ExitAction::Authorize => "redirected to the identity provider".to_string(),
        ExitAction::PostedToParent => "forwarded the redirect to the parent frame".to_string(),
        ExitAction::RequestedServiceAuthCode => {
            "requested a service authorization code".to_string()
        }
        ExitAction::ClosedWindow => "closed the login window".to_string(),
        ExitAction::Navigated(url) => format!("returned to {url}"),
    }
}

fn run_status(
    renderer: &Renderer,
    config: &Config,
    storage: Arc<LocalStorage>,
) -> Result<(), String> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let now = clock.now();
    let store = LocalCredentialStore::new(storage.clone(), clock);

    renderer.section("session");
    renderer.field("storage", &storage.path().display().to_string());
    match store
        .load_session()
        .map_err(|err| format!("failed to read session: {err}"))?
    {
        Some(session) => {
            if let Some(name) = &session.full_name {
                renderer.field("user", name);
            }
            let state = if session.expires_at > now { "valid" } else { "expired" };
            renderer.field("expires", &format!("{} ({state})", session.expires_at.to_rfc3339()));
        }
        None => renderer.field("session", "not logged in"),
    }
    if let Some(user) = store
        .load_user()
        .map_err(|err| format!("failed to read user: {err}"))?
    {
        renderer.field("username", &user.username);
    }

    let credentials = store
        .read_credential_map()
        .map_err(|err| format!("failed to read service credentials: {err}"))?;
    renderer.section("service credentials");
    if credentials.is_empty() {
        renderer.detail("none");
    }
    for (root_url, credential) in credentials.iter() {
        let state = if credential.is_valid_at(now) { "valid" } else { "expired" };
        let marker = if *root_url == config.service.root_url { " (configured)" } else { "" };
        let detail = match credential.expires {
            Some(expires) => format!("{state} until {}", expires.to_rfc3339()),
            None => "no readable expiry".to_string(),
        };
        renderer.field(&format!("{root_url}{marker}"), &detail);
    }
    Ok(())
}

fn run_store(
    renderer: &Renderer,
    config: &Config,
    storage: Arc<LocalStorage>,
    token: &str,
    root_url: Option<String>,
    expires_in: i64,
) -> Result<(), String> {
    if token.trim().is_empty() {
        return Err("--token must not be empty".to_string());
    }
    let expires = credential_expiry(Utc::now(), expires_in)?;
    let root_url = root_url.unwrap_or_else(|| config.service.root_url.clone());
    LocalCredentialStore::new(storage, Arc::new(SystemClock))
        .store_service_credential(&root_url, StoredCredential::new(token, expires))
        .map_err(|err| format!("failed to store service credential: {err}"))?;
    renderer.section("service credential stored");
    renderer.field("root url", &root_url);
    renderer.field("expires", &expires.to_rfc3339());
    Ok(())
}

/// Expiry `expires_in` seconds after `now`.
fn credential_expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, String> {
    if expires_in <= 0 {
        return Err("--expires-in must be a positive number of seconds".to_string());
    }
    ChronoDuration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| "--expires-in is too large".to_string())
}

fn run_logout(renderer: &Renderer, storage: Arc<LocalStorage>) -> Result<(), String> {
    let removed = LocalCredentialStore::new(storage, Arc::new(SystemClock))
        .clear_login()
        .map_err(|err| format!("failed to clear stored login: {err}"))?;
    if removed {
        renderer.activity("logged out; stored session and service credentials removed");
    } else {
        renderer.activity("nothing to clear");
    }
    Ok(())
}
