//! PIN set/change/delete from the settings surface (CLI setup or tray).

use super::{validate_pin, PinStore};
use crate::error::PinError;
use log::info;
use std::sync::Arc;

/// Settings-side PIN editor with confirmation matching.
pub struct PinSettings {
    store: Arc<dyn PinStore>,
    new_pin: String,
    confirm_pin: String,
    error: Option<String>,
    success: Option<String>,
}

impl PinSettings {
    pub fn new(store: Arc<dyn PinStore>) -> Self {
        Self {
            store,
            new_pin: String::new(),
            confirm_pin: String::new(),
            error: None,
            success: None,
        }
    }

    pub fn is_pin_set(&self) -> bool {
        self.store.is_set()
    }

    pub fn set_new_pin(&mut self, pin: impl Into<String>) {
        self.new_pin = pin.into();
    }

    pub fn set_confirm_pin(&mut self, pin: impl Into<String>) {
        self.confirm_pin = pin.into();
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success_message(&self) -> Option<&str> {
        self.success.as_deref()
    }

    pub fn can_set_pin(&self) -> bool {
        !self.new_pin.is_empty()
            && self.new_pin == self.confirm_pin
            && validate_pin(&self.new_pin).is_ok()
    }

    /// Store the entered PIN once both fields agree.
    pub fn set_pin(&mut self) -> Result<(), PinError> {
        self.clear_messages();

        let result = if self.new_pin != self.confirm_pin {
            Err(PinError::Mismatch)
        } else {
            self.store.set(&self.new_pin)
        };

        match &result {
            Ok(()) => {
                info!("PIN set from settings");
                self.success = Some("PIN saved".to_string());
                self.clear_input();
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        result
    }

    pub fn delete_pin(&mut self) -> Result<(), PinError> {
        self.clear_messages();
        let result = self.store.delete();
        match &result {
            Ok(()) => self.success = Some("PIN deleted".to_string()),
            Err(e) => self.error = Some(e.to_string()),
        }
        result
    }

    /// Drop the current PIN so a new one can be entered.
    pub fn begin_change(&mut self) -> Result<(), PinError> {
        self.clear_messages();
        self.clear_input();
        self.store.delete()
    }

    fn clear_input(&mut self) {
        self.new_pin.clear();
        self.confirm_pin.clear();
    }

    fn clear_messages(&mut self) {
        self.error = None;
        self.success = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryPinStore;

    fn settings() -> (PinSettings, Arc<MemoryPinStore>) {
        let store = Arc::new(MemoryPinStore::new());
        (PinSettings::new(store.clone()), store)
    }

    #[test]
    fn test_mismatch_is_rejected() {
        let (mut settings, store) = settings();
        settings.set_new_pin("1234");
        settings.set_confirm_pin("1235");

        assert!(!settings.can_set_pin());
        assert_eq!(settings.set_pin(), Err(PinError::Mismatch));
        assert_eq!(settings.error_message(), Some("PINs do not match"));
        assert!(!store.is_set());
    }

    #[test]
    fn test_non_digit_pin_is_rejected() {
        let (mut settings, store) = settings();
        settings.set_new_pin("12ab");
        settings.set_confirm_pin("12ab");

        assert_eq!(settings.set_pin(), Err(PinError::InvalidFormat));
        assert!(!store.is_set());
    }

    #[test]
    fn test_set_then_change() {
        let (mut settings, store) = settings();
        settings.set_new_pin("123456");
        settings.set_confirm_pin("123456");
        assert!(settings.can_set_pin());

        settings.set_pin().expect("set");
        assert!(store.verify("123456"));
        assert_eq!(settings.success_message(), Some("PIN saved"));
        assert!(!settings.can_set_pin(), "Inputs cleared after save");

        settings.begin_change().expect("change");
        assert!(!settings.is_pin_set());
    }

    #[test]
    fn test_delete() {
        let (mut settings, store) = settings();
        store.set("4444").expect("seed");
        settings.delete_pin().expect("delete");
        assert!(!store.is_set());
        assert_eq!(settings.success_message(), Some("PIN deleted"));
    }
}
