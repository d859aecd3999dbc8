use super::BiometricProvider;
use crate::error::AuthError;
use log::{debug, warn};
use std::process::Command;

/// AppleScript error number for "User canceled."
const USER_CANCELED_CODE: &str = "-128";

/// Touch ID through the system authorization prompt.
///
/// `osascript` raises the admin authorization sheet, which offers Touch ID
/// on machines that have it enrolled and falls back to the account password
/// otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct TouchIdProvider;

impl TouchIdProvider {
    pub fn new() -> Self {
        Self
    }
}

impl BiometricProvider for TouchIdProvider {
    fn can_evaluate(&self) -> bool {
        is_available()
    }

    fn authenticate(&self, reason: &str) -> Result<bool, AuthError> {
        if !is_available() {
            return Err(AuthError::NotAvailable);
        }

        let script = prompt_script(reason);
        let output = Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .output()
            .map_err(|e| {
                warn!("Failed to launch osascript: {}", e);
                AuthError::Failed(e.to_string())
            })?;

        if output.status.success() {
            debug!("Touch ID prompt accepted");
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(&stderr))
    }
}

/// Check if Touch ID is available on this system
pub fn is_available() -> bool {
    match Command::new("bioutil").arg("-r").output() {
        Ok(out) => out.status.success(),
        Err(_) => false,
    }
}

fn prompt_script(reason: &str) -> String {
    let escaped = reason.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        r#"do shell script "true" with prompt "{}" with administrator privileges"#,
        escaped
    )
}

/// Map osascript's stderr to an auth error.
fn classify_failure(stderr: &str) -> AuthError {
    if stderr.contains(USER_CANCELED_CODE) || stderr.contains("User canceled") {
        debug!("Touch ID prompt cancelled by user");
        AuthError::Cancelled
    } else {
        warn!("Touch ID prompt failed: {}", stderr.trim());
        AuthError::Failed(String::new())
    }
}
