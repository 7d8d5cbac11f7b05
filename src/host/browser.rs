//! Best-effort system browser launching.

use std::process::Command;

/// Platform launcher command for `url`, when this platform has one.
fn launcher(url: &str) -> Option<Command> {
    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        Some(command)
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        Some(command)
    } else if cfg!(unix) {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        Some(command)
    } else {
        None
    }
}

/// Open `url` in the system browser. Returns `false` when no launcher ran
/// successfully; callers fall back to printing the URL.
pub fn try_open_browser(url: &str) -> bool {
    let Some(mut command) = launcher(url) else {
        return false;
    };
    match command.status() {
        Ok(status) => status.success(),
        Err(err) => {
            tracing::debug!(error = %err, "browser launcher unavailable");
            false
        }
    }
}
