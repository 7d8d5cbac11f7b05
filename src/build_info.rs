//! Compile-time build metadata for `--version` and `--help`.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source revision captured by the build script.
pub const GIT_COMMIT: &str = env!("LOGIN_CALLBACK_BUILD_GIT_HASH");

pub const BUILD_TIMESTAMP: &str = env!("LOGIN_CALLBACK_BUILD_TIMESTAMP");

/// Help trailer listing build metadata.
pub const HELP_BUILD_METADATA: &str = concat!(
    "Build metadata:\n  commit: ",
    env!("LOGIN_CALLBACK_BUILD_GIT_HASH"),
    "\n  built: ",
    env!("LOGIN_CALLBACK_BUILD_TIMESTAMP")
);

/// One-line version string logged at startup.
pub fn version_line() -> String {
    format!("login-callback v{VERSION} ({GIT_COMMIT}, built {BUILD_TIMESTAMP})")
}
