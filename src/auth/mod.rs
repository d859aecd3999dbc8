pub mod flow;
pub mod pin_store;
pub mod settings;
pub mod touchid;

pub use flow::{AuthAttemptState, AuthFlow, AuthMode};
pub use pin_store::{ConfigPinStore, MemoryPinStore};
pub use settings::PinSettings;

use crate::constants::{PIN_MAX_DIGITS, PIN_MIN_DIGITS};
use crate::error::{AuthError, PinError};

/// Biometric prompt (Touch ID) used as the first unlock factor.
///
/// `authenticate` blocks until the user answers; callers run it off the
/// owner thread.
pub trait BiometricProvider: Send + Sync {
    fn can_evaluate(&self) -> bool;
    fn authenticate(&self, reason: &str) -> Result<bool, AuthError>;
}

/// Single stored unlock PIN.
pub trait PinStore: Send + Sync {
    fn is_set(&self) -> bool;
    fn verify(&self, candidate: &str) -> bool;
    fn set(&self, pin: &str) -> Result<(), PinError>;
    fn delete(&self) -> Result<(), PinError>;

    /// Format check for the settings surface.
    fn validate(&self, candidate: &str) -> bool {
        validate_pin(candidate).is_ok()
    }
}

/// A PIN is 4-8 ASCII decimal digits.
pub fn validate_pin(pin: &str) -> Result<(), PinError> {
    let len_ok = (PIN_MIN_DIGITS..=PIN_MAX_DIGITS).contains(&pin.len());
    if len_ok && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(PinError::InvalidFormat)
    }
}

/// Hash a PIN for in-memory comparison
pub fn hash_pin(pin: &str) -> String {
    crate::utils::hash_pin(pin)
}

/// Verify a PIN against a stored hash
pub fn verify_pin(input: &str, stored_hash: &str) -> bool {
    crate::utils::verify_pin(input, stored_hash)
}
