//! Login-callback completion for an identity-provider + service-credential
//! login flow.
//!
//! The [`controller::LoginCompletionController`] decides what a login
//! callback page does next: start interactive login, forward a silent
//! renewal result to its parent frame, persist a fresh session, request a
//! service authorization code, close a popup, or return to the app. All of
//! its collaborators are traits in [`auth`] and [`host`], with file-backed
//! and terminal implementations provided here.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use login_callback::auth::{LocalCredentialStore, OidcProvider, ServiceAuthCodeRequester, SystemClock};
//! use login_callback::config::{load_config, storage_path};
//! use login_callback::controller::{Collaborators, CompletionSettings, LoginCompletionController};
//! use login_callback::host::TerminalWindow;
//! use login_callback::render::Renderer;
//! use login_callback::storage::LocalStorage;
//!
//! # async fn example() {
//! let config = load_config(None).unwrap();
//! let storage = Arc::new(LocalStorage::new(storage_path(&config).unwrap()));
//! let window = Arc::new(
//!     TerminalWindow::new(Arc::new(Renderer::new(true)))
//!         .with_fragment(Some("#access_token=...".into())),
//! );
//! let clock = Arc::new(SystemClock);
//! let collaborators = Collaborators {
//!     identity: Arc::new(OidcProvider::new(&config, storage.clone(), window.clone(), clock.clone())),
//!     credentials: Arc::new(LocalCredentialStore::new(storage.clone(), clock.clone())),
//!     service: Arc::new(ServiceAuthCodeRequester::new(&config, storage, window.clone())),
//!     window,
//!     clock,
//! };
//! let mut controller =
//!     LoginCompletionController::new(collaborators, CompletionSettings::from_config(&config));
//! println!("{:?}", controller.on_mounted().await);
//! # }
//! ```

pub mod auth;
pub mod build_info;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod render;
pub mod storage;
#[cfg(test)]
pub mod testsupport;
