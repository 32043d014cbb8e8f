pub mod hooks;

use crate::daemon::KillNotification;
use anyhow::Result;
use log::{error, info};
use std::process::Command;

#[cfg(feature = "dbus-notify")]
use notify_rust::{Notification, Timeout};

/// Sanitize a string for safe use in environment variables and shell scripts
fn sanitize_env_value(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            c if c.is_alphanumeric() => c,
            ' ' | '.' | '-' | '_' | '/' => c,
            // Control characters and shell metacharacters
            _ => '_',
        })
        .take(256)
        .collect()
}

/// Space separated pid list handed to hook scripts
fn pid_list(notification: &KillNotification) -> String {
    notification
        .pids()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tells the outside world about kills: hook script and desktop notification
pub struct NotificationManager {
    enable_dbus: bool,
    post_kill_script: Option<String>,
}

impl NotificationManager {
    pub fn new(enable_dbus: bool, post_kill_script: Option<String>) -> Self {
        Self {
            enable_dbus,
            post_kill_script,
        }
    }

    pub fn send_kill_notification(&self, name: &str, notification: &KillNotification) -> Result<()> {
        if let Some(script) = &self.post_kill_script {
            info!(
                "Executing post-kill script: {} for {} ({})",
                script,
                name,
                pid_list(notification)
            );
            if let Err(e) = self.execute_script(script, name, notification) {
                error!("Failed to execute post-kill script: {}", e);
            }
        }

        #[cfg(feature = "dbus-notify")]
        if self.enable_dbus {
            if let Err(e) = self.send_dbus_notification(name, notification) {
                error!("Failed to send D-Bus notification: {}", e);
            }
        }

        #[cfg(not(feature = "dbus-notify"))]
        if self.enable_dbus {
            error!("D-Bus notifications enabled but feature 'dbus-notify' not compiled in");
        }

        Ok(())
    }

    fn execute_script(
        &self,
        script_path: &str,
        name: &str,
        notification: &KillNotification,
    ) -> Result<()> {
        let output = Command::new(script_path)
            .env(hooks::ENV_NAME, sanitize_env_value(name))
            .env(hooks::ENV_PIDS, pid_list(notification))
            .env(hooks::ENV_COUNT, notification.len().to_string())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "Script {} failed with status {}: {}",
                script_path,
                output.status,
                stderr.trim()
            );
        } else {
            info!("Script {} executed successfully", script_path);
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.is_empty() {
                info!("Script output: {}", stdout.trim());
            }
        }

        Ok(())
    }

    #[cfg(feature = "dbus-notify")]
    fn send_dbus_notification(&self, name: &str, notification: &KillNotification) -> Result<()> {
        let message = format!(
            "RSS Guard killed {} '{}' process(es):\nPIDs: {}",
            notification.len(),
            name,
            pid_list(notification)
        );

        Notification::new()
            .summary("RSS Guard: Process Killed")
            .body(&message)
            .icon("dialog-warning")
            .timeout(Timeout::Milliseconds(6000))
            .show()?;

        info!("D-Bus notification sent for {}", name);
        Ok(())
    }
}
