pub mod keycode;

use ring::digest;

/// Hash a PIN using SHA-256
pub fn hash_pin(pin: &str) -> String {
    let hash = digest::digest(&digest::SHA256, pin.as_bytes());
    hex::encode(hash.as_ref())
}

/// Verify a PIN against a stored hash
pub fn verify_pin(pin: &str, hash: &str) -> bool {
    hash_pin(pin) == hash
}
