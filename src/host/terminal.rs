//! Terminal-backed [`HostWindow`] used by the CLI.
//!
//! The "page" is described by command-line flags: the redirect fragment,
//! whether it is framed, and whether it has an opener. Navigation opens the
//! system browser, parent messages are printed as JSON on stdout, and every
//! action is recorded for inspection.

use serde_json::json;
use std::sync::{Arc, Mutex};

use super::browser::try_open_browser;
use super::HostWindow;
use crate::render::RenderSink;

/// One side effect performed on the terminal window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    PostedMessage {
        payload: String,
        target_origin: String,
    },
    Closed,
    Navigated(String),
    Opened(String),
}

pub struct TerminalWindow {
    fragment: Option<String>,
    top_level: bool,
    opener: bool,
    launch_browser: bool,
    sink: Arc<dyn RenderSink>,
    events: Mutex<Vec<WindowEvent>>,
}

impl TerminalWindow {
    /// Top-level window without a fragment or opener.
    pub fn new(sink: Arc<dyn RenderSink>) -> Self {
        Self {
            fragment: None,
            top_level: true,
            opener: false,
            launch_browser: true,
            sink,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fragment(mut self, fragment: Option<String>) -> Self {
        self.fragment = fragment.map(|raw| {
            if raw.starts_with('#') {
                raw
            } else {
                format!("#{raw}")
            }
        });
        self
    }

    /// Pretend the page is embedded in a hidden frame.
    pub fn framed(mut self, framed: bool) -> Self {
        self.top_level = !framed;
        self
    }

    pub fn with_opener(mut self, opener: bool) -> Self {
        self.opener = opener;
        self
    }

    /// Disable launching the system browser on navigation.
    pub fn launch_browser(mut self, launch: bool) -> Self {
        self.launch_browser = launch;
        self
    }

    /// Every side effect performed so far, in order.
    pub fn events(&self) -> Vec<WindowEvent> {
        self.lock_events().clone()
    }

    fn record(&self, event: WindowEvent) {
        self.lock_events().push(event);
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, Vec<WindowEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn visit(&self, label: &str, url: &str) {
        self.sink.activity(label);
        self.sink.detail(url);
        if self.launch_browser && !try_open_browser(url) {
            self.sink
                .warn("could not open a browser; open the URL above manually");
        }
    }
}

impl HostWindow for TerminalWindow {
    fn redirect_fragment(&self) -> Option<String> {
        self.fragment.clone()
    }

    fn is_top_level_frame(&self) -> bool {
        self.top_level
    }

    fn post_message_to_parent(&self, payload: &str, target_origin: &str) {
        let envelope = json!({
            "type": "postMessage",
            "targetOrigin": target_origin,
            "payload": payload,
        });
        self.sink.output(&envelope.to_string());
        self.record(WindowEvent::PostedMessage {
            payload: payload.to_string(),
            target_origin: target_origin.to_string(),
        });
    }

    fn has_opener(&self) -> bool {
        self.opener
    }

    fn close(&self) {
        self.sink
            .activity("login complete; closing window and returning to the opener");
        self.record(WindowEvent::Closed);
    }

    fn navigate_to(&self, url: &str) {
        self.visit("navigating to", url);
        self.record(WindowEvent::Navigated(url.to_string()));
    }

    fn open_new(&self, url: &str) {
        self.visit("opening new window at", url);
        self.record(WindowEvent::Opened(url.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::RecordingSink;

    fn window(sink: &Arc<RecordingSink>) -> TerminalWindow {
        TerminalWindow::new(sink.clone()).launch_browser(false)
    }

    #[test]
    fn fragment_gains_leading_hash() {
        let sink = Arc::new(RecordingSink::default());
        let w = window(&sink).with_fragment(Some("access_token=T".into()));
        assert_eq!(w.redirect_fragment().as_deref(), Some("#access_token=T"));
        assert!(w.has_redirect_fragment());
    }

    #[test]
    fn bare_hash_is_not_a_fragment() {
        let sink = Arc::new(RecordingSink::default());
        let w = window(&sink).with_fragment(Some("#".into()));
        assert!(!w.has_redirect_fragment());
    }

    #[test]
    fn post_message_prints_json_envelope() {
        let sink = Arc::new(RecordingSink::default());
        let w = window(&sink).framed(true);
        assert!(!w.is_top_level_frame());
        w.post_message_to_parent("#access_token=T", "http://localhost:5000");

        let outputs = sink.outputs();
        assert_eq!(outputs.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&outputs[0]).unwrap();
        assert_eq!(value["payload"], "#access_token=T");
        assert_eq!(value["targetOrigin"], "http://localhost:5000");
        assert_eq!(
            w.events(),
            vec![WindowEvent::PostedMessage {
                payload: "#access_token=T".into(),
                target_origin: "http://localhost:5000".into(),
            }]
        );
    }

    #[test]
    fn navigation_and_close_are_recorded_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let w = window(&sink).with_opener(true);
        w.navigate_to("https://login.example.com/authorize");
        w.open_new("https://tc.example.com/login/oauth/authorize");
        w.close();
        assert_eq!(
            w.events(),
            vec![
                WindowEvent::Navigated("https://login.example.com/authorize".into()),
                WindowEvent::Opened("https://tc.example.com/login/oauth/authorize".into()),
                WindowEvent::Closed,
            ]
        );
        assert!(sink
            .details()
            .contains(&"https://login.example.com/authorize".to_string()));
    }
}
