//! Desktop notifications: terminal-notifier on macOS, notify-send elsewhere.
//!
//! Arguments are passed directly (no shell, no AppleScript) so process names
//! cannot inject commands.

use std::process::Command;

#[cfg(target_os = "macos")]
const BUNDLE_ID: &str = "com.portassassin.app";

#[cfg(target_os = "macos")]
pub fn show(title: &str, body: &str) {
    let notifier = crate::utils::notifier_path();
    if let Err(err) = Command::new(notifier)
        .args(["-title", title, "-message", body, "-sender", BUNDLE_ID])
        .spawn()
    {
        log::debug!("terminal-notifier unavailable: {}", err);
    }
}

#[cfg(not(target_os = "macos"))]
pub fn show(title: &str, body: &str) {
    if let Err(err) = Command::new("notify-send")
        .args(["--app-name=portassassin", title, body])
        .spawn()
    {
        log::debug!("notify-send unavailable: {}", err);
    }
}
