//! Host-window capability seam.
//!
//! The completion flow never touches a real browser window. Everything it
//! needs from its environment goes through [`HostWindow`], so the controller
//! can run against the terminal host here or against test doubles.

mod browser;
mod terminal;

pub use browser::try_open_browser;
pub use terminal::{TerminalWindow, WindowEvent};

/// Environment the callback page runs in.
pub trait HostWindow: Send + Sync {
    /// Raw redirect fragment (including `#`) when the page URL has one.
    fn redirect_fragment(&self) -> Option<String>;

    /// True when a non-empty redirect fragment is present.
    fn has_redirect_fragment(&self) -> bool {
        crate::auth::fragment::is_present(self.redirect_fragment().as_deref())
    }

    /// False when the page is embedded in another frame (silent renewal).
    fn is_top_level_frame(&self) -> bool;

    /// Post `payload` to the parent frame, restricted to `target_origin`.
    fn post_message_to_parent(&self, payload: &str, target_origin: &str);

    /// True when this window was opened as a popup by another window.
    fn has_opener(&self) -> bool;

    fn close(&self);

    /// Replace the current page with `url`.
    fn navigate_to(&self, url: &str);

    /// Open `url` in a new window, leaving this one in place.
    fn open_new(&self, url: &str);
}
