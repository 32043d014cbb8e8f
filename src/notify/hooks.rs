use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::fs;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub struct HookValidator;

impl HookValidator {
    /// Validates that a hook script exists and is executable
    pub fn validate_hook_script(script_path: &str) -> Result<()> {
        let path = Path::new(script_path);

        if !path.exists() {
            return Err(anyhow::anyhow!("Script does not exist: {}", script_path));
        }

        if !path.is_file() {
            return Err(anyhow::anyhow!("Path is not a file: {}", script_path));
        }

        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to read metadata for: {}", script_path))?;

        #[cfg(unix)]
        {
            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                warn!(
                    "Script {} is not executable (permissions: {:o})",
                    script_path, mode
                );
                return Err(anyhow::anyhow!(
                    "Script is not executable: {}. Use 'chmod +x {}'",
                    script_path,
                    script_path
                ));
            }
            debug!(
                "Script {} is valid and executable (permissions: {:o})",
                script_path, mode
            );
        }
        #[cfg(not(unix))]
        let _ = metadata;

        Ok(())
    }

    /// Validates the post-kill script if one is provided
    pub fn validate_hooks(post_kill_script: Option<&str>) -> Result<()> {
        if let Some(script) = post_kill_script {
            info!("Validating post-kill script: {}", script);
            if let Err(e) = Self::validate_hook_script(script) {
                error!("Post-kill script validation failed: {}", e);
                return Err(e);
            }
            info!("Post-kill script validated successfully");
        }

        Ok(())
    }
}

// Environment variables passed to the post-kill script

/// Executable name being watched
pub const ENV_NAME: &str = "RSS_GUARD_NAME";
/// Space separated pids killed in this cycle
pub const ENV_PIDS: &str = "RSS_GUARD_PIDS";
/// Number of pids killed in this cycle
pub const ENV_COUNT: &str = "RSS_GUARD_COUNT";
