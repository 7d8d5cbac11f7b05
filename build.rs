//! Stamps `login-callback --version` with the source revision and build time.
//!
//! `LOGIN_CALLBACK_BUILD_GIT_HASH` / `LOGIN_CALLBACK_BUILD_TIMESTAMP` in the
//! build environment take precedence, for reproducible release builds.

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

const HASH_VAR: &str = "LOGIN_CALLBACK_BUILD_GIT_HASH";
const TIMESTAMP_VAR: &str = "LOGIN_CALLBACK_BUILD_TIMESTAMP";

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    if let Some(reference) = current_branch_ref() {
        println!("cargo:rerun-if-changed=.git/{reference}");
    }

    let git_hash = stamp(HASH_VAR, || {
        git(&["describe", "--always", "--dirty", "--abbrev=12"])
            .unwrap_or_else(|| "unknown".to_string())
    });
    let timestamp = stamp(TIMESTAMP_VAR, || {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        format!("unix:{secs}")
    });

    println!("cargo:rustc-env={HASH_VAR}={git_hash}");
    println!("cargo:rustc-env={TIMESTAMP_VAR}={timestamp}");
}

fn stamp(var: &str, fallback: impl FnOnce() -> String) -> String {
    println!("cargo:rerun-if-env-changed={var}");
    std::env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(fallback)
}

fn current_branch_ref() -> Option<String> {
    let head = std::fs::read_to_string(".git/HEAD").ok()?;
    head.trim().strip_prefix("ref: ").map(str::to_string)
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
