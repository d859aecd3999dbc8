//! Error taxonomy for the lock core.
//!
//! Recoverable, typed failures live here. Plumbing around files, FFI setup and
//! the binaries uses `anyhow` instead.

use crate::constants::{
    AUTH_FAILED_MESSAGE, AUTH_NOT_AVAILABLE_MESSAGE, LOCK_REQUIRES_PIN_MESSAGE,
};

/// Failures of the sleep-prevention assertion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PowerError {
    #[error("Failed to enable sleep prevention")]
    AssertionCreationFailed,
    #[error("Failed to release sleep prevention")]
    AssertionReleaseFailed,
}

/// Outcome kinds of a biometric prompt other than success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The user, the system or the app dismissed the prompt.
    #[error("Authentication was cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
    #[error("{}", AUTH_NOT_AVAILABLE_MESSAGE)]
    NotAvailable,
}

impl AuthError {
    /// Message to surface on the shield, `None` for outcomes that stay silent.
    pub fn user_message(&self) -> Option<String> {
        match self {
            AuthError::Cancelled => None,
            AuthError::Failed(message) if message.is_empty() => {
                Some(AUTH_FAILED_MESSAGE.to_string())
            }
            other => Some(other.to_string()),
        }
    }
}

/// Reasons `LockCoordinator::lock` refuses to engage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("{}", LOCK_REQUIRES_PIN_MESSAGE)]
    PinNotConfigured,
    #[error("Failed to show shield windows: {0}")]
    Shield(String),
}

/// PIN store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinError {
    #[error("PIN must be 4-8 digits")]
    InvalidFormat,
    #[error("PINs do not match")]
    Mismatch,
    #[error("Failed to store PIN: {0}")]
    Storage(String),
}
