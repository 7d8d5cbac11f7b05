//! Login-callback completion controller.
//!
//! Drives the page shown right after the identity provider redirects back
//! (or loads it in a hidden frame for silent renewal) and decides the next
//! navigation action. The flow is an explicit state machine:
//!
//! ```text
//! AwaitingRedirect --(no fragment)--------> Finished(Authorize)
//! AwaitingRedirect --(fragment, framed)---> EmbeddedRenewal -> Finished(PostedToParent)
//! AwaitingRedirect --(fragment, top)------> ParsingResult
//! ParsingResult ----(parse fails/no token)-> Error
//! ParsingResult ----(token, saved)--------> CheckingServiceCredential
//! CheckingServiceCredential --(stale/missing)--> Finished(RequestedServiceAuthCode)
//! CheckingServiceCredential --(valid, opener)--> Closing -> Finished(ClosedWindow)
//! CheckingServiceCredential --(valid)----------> Redirecting -> Finished(Navigated)
//! ```
//!
//! `Error` and `Finished` are terminal. Every external call is attempted at
//! most once per controller; failures after the parse step (persistence,
//! credential read, service request) also land in `Error` rather than
//! propagating.

use std::sync::Arc;

use crate::auth::{Clock, CredentialStore, IdentityProvider, ServiceAuthorizer};
use crate::host::HostWindow;

/// Shown while a redirect is being processed.
pub const TEXT_LOGGING_IN: &str = "Logging in...";
/// Shown when there is no redirect and the user is sent to log in.
pub const TEXT_REDIRECTING: &str = "Redirecting...";
/// Error shown when the provider reports success without an access token.
pub const MISSING_ACCESS_TOKEN_MESSAGE: &str =
    "authentication response did not include an access token";

/// Terminal action taken by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitAction {
    /// Interactive authorization started; the page navigates away.
    Authorize,
    /// Fragment forwarded to the parent frame.
    PostedToParent,
    /// Fresh service authorization code requested.
    RequestedServiceAuthCode,
    /// Popup closed, returning control to the opener.
    ClosedWindow,
    /// Top-level window sent to the given URL.
    Navigated(String),
}

/// Completion state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionState {
    AwaitingRedirect,
    EmbeddedRenewal { fragment: String },
    ParsingResult { fragment: String },
    /// Terminal, display-only.
    Error(String),
    CheckingServiceCredential,
    Closing,
    Redirecting,
    /// Terminal; the page is about to be replaced, closed, or is waiting on
    /// a new external event.
    Finished(ExitAction),
}

impl CompletionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Finished(_))
    }

    fn name(&self) -> &'static str {
        match self {
            Self::AwaitingRedirect => "awaiting_redirect",
            Self::EmbeddedRenewal { .. } => "embedded_renewal",
            Self::ParsingResult { .. } => "parsing_result",
            Self::Error(_) => "error",
            Self::CheckingServiceCredential => "checking_service_credential",
            Self::Closing => "closing",
            Self::Redirecting => "redirecting",
            Self::Finished(_) => "finished",
        }
    }
}

/// Fixed inputs the flow compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSettings {
    /// Service root URL whose stored credential decides close-vs-reauthorize.
    pub service_root_url: String,
    /// Origin for parent messages and the post-login redirect.
    pub app_origin: String,
}

impl CompletionSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            service_root_url: config.service.root_url.clone(),
            app_origin: config.app.origin.clone(),
        }
    }
}

/// What the callback page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackView {
    pub text: &'static str,
    pub error_message: Option<String>,
}

/// Collaborators the controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub credentials: Arc<dyn CredentialStore>,
    pub service: Arc<dyn ServiceAuthorizer>,
    pub window: Arc<dyn HostWindow>,
    pub clock: Arc<dyn Clock>,
}

pub struct LoginCompletionController {
    collaborators: Collaborators,
    settings: CompletionSettings,
    state: CompletionState,
}

impl LoginCompletionController {
    pub fn new(collaborators: Collaborators, settings: CompletionSettings) -> Self {
        Self {
            collaborators,
            settings,
            state: CompletionState::AwaitingRedirect,
        }
    }

    pub fn state(&self) -> &CompletionState {
        &self.state
    }

    /// Message to display when the flow ended in an error.
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            CompletionState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn view(&self) -> CallbackView {
        let text = if self.collaborators.window.has_redirect_fragment() {
            TEXT_LOGGING_IN
        } else {
            TEXT_REDIRECTING
        };
        CallbackView {
            text,
            error_message: self.error_message().map(str::to_string),
        }
    }

    /// Run the flow to a terminal state.
    ///
    /// Calling this again after a terminal state is a no-op.
    pub async fn on_mounted(&mut self) -> &CompletionState {
        if self.state.is_terminal() {
            tracing::debug!(state = self.state.name(), "completion already finished");
            return &self.state;
        }
        // The current state stays in place until its step returns, so a
        // cancelled mount resumes where it stopped.
        while !self.state.is_terminal() {
            let current = self.state.clone();
            let from = current.name();
            let next = self.step(current).await;
            tracing::debug!(from, to = next.name(), "completion transition");
            self.state = next;
        }
        match &self.state {
            CompletionState::Finished(action) => tracing::info!(?action, "login callback finished"),
            CompletionState::Error(message) => tracing::warn!(%message, "login callback failed"),
            _ => {}
        }
        &self.state
    }

    async fn step(&self, state: CompletionState) -> CompletionState {
        match state {
            CompletionState::AwaitingRedirect => self.route_redirect().await,
            CompletionState::EmbeddedRenewal { fragment } => {
                self.collaborators
                    .window
                    .post_message_to_parent(&fragment, &self.settings.app_origin);
                CompletionState::Finished(ExitAction::PostedToParent)
            }
            CompletionState::ParsingResult { fragment } => self.complete_login(&fragment).await,
            CompletionState::CheckingServiceCredential => self.check_service_credential().await,
            CompletionState::Closing => {
                self.collaborators.window.close();
                CompletionState::Finished(ExitAction::ClosedWindow)
            }
            CompletionState::Redirecting => {
                let target = self.settings.app_origin.clone();
                self.collaborators.window.navigate_to(&target);
                CompletionState::Finished(ExitAction::Navigated(target))
            }
            terminal @ (CompletionState::Error(_) | CompletionState::Finished(_)) => terminal,
        }
    }

    async fn route_redirect(&self) -> CompletionState {
        let window = &self.collaborators.window;
        let fragment = window
            .redirect_fragment()
            .filter(|raw| crate::auth::fragment::is_present(Some(raw)));
        let Some(fragment) = fragment else {
            return match self.collaborators.identity.authorize().await {
                Ok(()) => CompletionState::Finished(ExitAction::Authorize),
                Err(err) => CompletionState::Error(err.to_string()),
            };
        };
        // Silent renewal: the parent frame owns parsing and persistence.
        if !window.is_top_level_frame() {
            return CompletionState::EmbeddedRenewal { fragment };
        }
        CompletionState::ParsingResult { fragment }
    }

    async fn complete_login(&self, fragment: &str) -> CompletionState {
        let result = match self
            .collaborators
            .identity
            .parse_redirect_fragment(fragment)
            .await
        {
            Ok(result) => result,
            Err(err) => return CompletionState::Error(err.display_message()),
        };
        if result.usable_access_token().is_none() {
            return CompletionState::Error(MISSING_ACCESS_TOKEN_MESSAGE.to_string());
        }
        match self
            .collaborators
            .credentials
            .save_credentials_from_auth_result(&result)
            .await
        {
            Ok(()) => CompletionState::CheckingServiceCredential,
            Err(err) => CompletionState::Error(err.to_string()),
        }
    }

    async fn check_service_credential(&self) -> CompletionState {
        let map = match self.collaborators.credentials.read_credential_map() {
            Ok(map) => map,
            Err(err) => return CompletionState::Error(err.to_string()),
        };
        let now = self.collaborators.clock.now();
        if map
            .valid_credential(&self.settings.service_root_url, now)
            .is_none()
        {
            return match self
                .collaborators
                .service
                .request_service_auth_code(true)
                .await
            {
                Ok(()) => CompletionState::Finished(ExitAction::RequestedServiceAuthCode),
                Err(err) => CompletionState::Error(err.to_string()),
            };
        }
        if self.collaborators.window.has_opener() {
            CompletionState::Closing
        } else {
            CompletionState::Redirecting
        }
    }
}
