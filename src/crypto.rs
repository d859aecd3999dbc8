//! At-rest encryption of the unlock PIN
//!
//! The PIN is sealed with AES-256-GCM under a key derived from a fixed seed,
//! so a config file copied between machines still opens. This keeps the PIN
//! out of plain sight in `config.toml`; it is not a defense against someone
//! holding this binary.

use crate::constants::NONCE_LENGTH_BYTES;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};

/// Seed for the sealing key. Changing it orphans every stored PIN.
const KEY_SEED: &str = "com.coffeescreen.shield.pin.v1";

fn sealing_key() -> [u8; 32] {
    Sha256::digest(KEY_SEED.as_bytes()).into()
}

fn cipher() -> Aes256Gcm {
    Aes256Gcm::new(&sealing_key().into())
}

/// Seal a PIN into `base64(nonce || ciphertext || tag)`.
pub fn seal_pin(pin: &str) -> Result<String> {
    let mut nonce_bytes = [0u8; NONCE_LENGTH_BYTES];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|e| anyhow!("Failed to generate random nonce: {:?}", e))?;

    let sealed = cipher()
        .encrypt(Nonce::from_slice(&nonce_bytes), pin.as_bytes())
        .map_err(|e| anyhow!("PIN encryption failed: {}", e))?;

    let mut blob = Vec::with_capacity(NONCE_LENGTH_BYTES + sealed.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&sealed);
    Ok(BASE64.encode(blob))
}

/// Open a value produced by [`seal_pin`].
pub fn open_pin(sealed: &str) -> Result<String> {
    let blob = BASE64
        .decode(sealed.trim())
        .context("Sealed PIN is not valid base64")?;

    if blob.len() <= NONCE_LENGTH_BYTES {
        bail!("Sealed PIN is truncated");
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LENGTH_BYTES);
    let plaintext = cipher()
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| anyhow!("PIN decryption failed: {}", e))?;

    String::from_utf8(plaintext).context("Decrypted PIN is not UTF-8")
}
