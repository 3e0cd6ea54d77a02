// src/notify_desktop.rs

//! Best-effort desktop notifications.
//!
//! Notification failures never fail a build; a missing notifier binary is
//! logged at debug and otherwise ignored.

use tokio::process::Command;
use tracing::debug;

/// Show a desktop notification with the given title and message.
pub async fn notify(title: &str, message: &str) {
    let mut cmd = if cfg!(target_os = "macos") {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            message.replace('"', "\\\""),
            title.replace('"', "\\\"")
        );
        let mut c = Command::new("osascript");
        c.arg("-e").arg(script);
        c
    } else {
        let mut c = Command::new("notify-send");
        c.arg(title).arg(message);
        c
    };

    match cmd.output().await {
        Ok(output) if output.status.success() => {}
        Ok(output) => {
            debug!(status = ?output.status.code(), "notifier exited nonzero");
        }
        Err(err) => {
            debug!(error = %err, "no desktop notifier available");
        }
    }
}
