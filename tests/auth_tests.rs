use coffee_screen::auth::{self, MemoryPinStore, PinSettings, PinStore};
use coffee_screen::error::PinError;
use std::sync::Arc;

#[test]
fn test_hash_pin() {
    let hash = auth::hash_pin("1234");
    assert_eq!(hash.len(), 64); // SHA-256 hex is 64 chars
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_verify_pin() {
    let hash = auth::hash_pin("1234");
    assert!(auth::verify_pin("1234", &hash));
    assert!(!auth::verify_pin("9999", &hash));
}

#[test]
fn test_pin_format() {
    assert!(auth::validate_pin("1234").is_ok());
    assert!(auth::validate_pin("12345678").is_ok());
    assert_eq!(auth::validate_pin("123"), Err(PinError::InvalidFormat));
    assert_eq!(auth::validate_pin("123456789"), Err(PinError::InvalidFormat));
    assert_eq!(auth::validate_pin("12a4"), Err(PinError::InvalidFormat));
    assert_eq!(auth::validate_pin(""), Err(PinError::InvalidFormat));
    // Non-ASCII digits are rejected
    assert_eq!(auth::validate_pin("١٢٣٤"), Err(PinError::InvalidFormat));
}

#[test]
fn test_memory_store_lifecycle() {
    let store = MemoryPinStore::new();
    assert!(!store.is_set());
    assert!(!store.verify("1234"));

    store.set("1234").expect("set");
    assert!(store.is_set());
    assert!(store.verify("1234"));
    assert!(!store.verify("4321"));

    assert_eq!(store.set("12"), Err(PinError::InvalidFormat));
    assert!(store.verify("1234"), "Rejected PIN leaves old one in place");

    store.delete().expect("delete");
    assert!(!store.is_set());
}

#[test]
fn test_settings_mismatch() {
    let store = Arc::new(MemoryPinStore::new());
    let mut settings = PinSettings::new(store.clone());
    settings.set_new_pin("1234");
    settings.set_confirm_pin("1235");

    assert!(!settings.can_set_pin());
    assert_eq!(settings.set_pin(), Err(PinError::Mismatch));
    assert!(settings.error_message().is_some());
    assert!(!store.is_set());
}

#[test]
fn test_settings_saves_and_deletes() {
    let store = Arc::new(MemoryPinStore::new());
    let mut settings = PinSettings::new(store.clone());
    settings.set_new_pin("246810");
    settings.set_confirm_pin("246810");

    assert!(settings.can_set_pin());
    settings.set_pin().expect("set");
    assert_eq!(settings.success_message(), Some("PIN saved"));
    assert!(settings.is_pin_set());
    assert!(store.verify("246810"));

    settings.delete_pin().expect("delete");
    assert_eq!(settings.success_message(), Some("PIN deleted"));
    assert!(!store.is_set());
}
