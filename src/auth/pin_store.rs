use super::{hash_pin, validate_pin, verify_pin, PinStore};
use crate::config_file::Config;
use crate::error::PinError;
use anyhow::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// PIN store that lives only as long as the process. Keeps a SHA-256 hash.
#[derive(Default)]
pub struct MemoryPinStore {
    hash: Mutex<Option<String>>,
}

impl MemoryPinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `pin`; the format is not checked.
    pub fn with_pin(pin: &str) -> Self {
        Self {
            hash: Mutex::new(Some(hash_pin(pin))),
        }
    }
}

impl PinStore for MemoryPinStore {
    fn is_set(&self) -> bool {
        self.hash.lock().is_some()
    }

    fn verify(&self, candidate: &str) -> bool {
        self.hash
            .lock()
            .as_deref()
            .is_some_and(|hash| verify_pin(candidate, hash))
    }

    fn set(&self, pin: &str) -> Result<(), PinError> {
        validate_pin(pin)?;
        *self.hash.lock() = Some(hash_pin(pin));
        Ok(())
    }

    fn delete(&self) -> Result<(), PinError> {
        *self.hash.lock() = None;
        Ok(())
    }
}

/// PIN store persisted (sealed) in the config file.
///
/// The file is shared with the CLI, which may change the PIN while the tray
/// is running, so every query reads it again. The last hash that loaded
/// cleanly is kept for when the file cannot be read.
pub struct ConfigPinStore {
    path: PathBuf,
    hash: Mutex<Option<String>>,
}

impl ConfigPinStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let hash = Self::load_hash(&path)?;
        if hash.is_none() {
            info!("No PIN configured in {}", path.display());
        }
        Ok(Self {
            path,
            hash: Mutex::new(hash),
        })
    }

    fn load_hash(path: &Path) -> Result<Option<String>> {
        let config = Config::load_or_default(path)?;
        Ok(config.pin()?.as_deref().map(hash_pin))
    }

    /// Current hash from disk, falling back to the last good one.
    fn current_hash(&self) -> Option<String> {
        let mut cached = self.hash.lock();
        match Self::load_hash(&self.path) {
            Ok(hash) => {
                if hash != *cached {
                    debug!("PIN changed on disk, reloaded");
                    *cached = hash;
                }
            }
            Err(e) => warn!("Failed to reload PIN, using last known value: {:#}", e),
        }
        cached.clone()
    }

    fn update_config(&self, apply: impl FnOnce(&mut Config) -> Result<()>) -> Result<(), PinError> {
        let result = Config::load_or_default(&self.path).and_then(|mut config| {
            apply(&mut config)?;
            config.save_to_path(&self.path)
        });
        result.map_err(|e| {
            warn!("Failed to update PIN in config file: {:#}", e);
            PinError::Storage(format!("{:#}", e))
        })
    }
}

impl PinStore for ConfigPinStore {
    fn is_set(&self) -> bool {
        self.current_hash().is_some()
    }

    fn verify(&self, candidate: &str) -> bool {
        self.current_hash()
            .is_some_and(|hash| verify_pin(candidate, &hash))
    }

    fn set(&self, pin: &str) -> Result<(), PinError> {
        validate_pin(pin)?;
        self.update_config(|config| config.set_pin(pin))?;
        *self.hash.lock() = Some(hash_pin(pin));
        info!("PIN updated");
        Ok(())
    }

    fn delete(&self) -> Result<(), PinError> {
        self.update_config(|config| {
            config.clear_pin();
            Ok(())
        })?;
        *self.hash.lock() = None;
        info!("PIN deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryPinStore::new();
        assert!(!store.is_set());
        assert!(!store.verify("1234"), "Nothing verifies without a PIN");

        store.set("1234").expect("set");
        assert!(store.is_set());
        assert!(store.verify("1234"));
        assert!(!store.verify("4321"));

        store.delete().expect("delete");
        assert!(!store.is_set());
    }

    #[test]
    fn test_memory_store_rejects_invalid_pin() {
        let store = MemoryPinStore::with_pin("1234");
        assert_eq!(store.set("12"), Err(PinError::InvalidFormat));
        assert!(store.verify("1234"), "Old PIN is kept");
    }

    #[test]
    fn test_validate_via_trait() {
        let store = MemoryPinStore::new();
        assert!(store.validate("0000"));
        assert!(store.validate("12345678"));
        assert!(!store.validate("123456789"));
        assert!(!store.validate("12 4"));
    }

    #[test]
    fn test_config_store_persists() {
        let dir = std::env::temp_dir().join(format!(
            "coffee_screen_pin_store_{:?}",
            std::thread::current().id()
        ));
        let path = dir.join("config.toml");
        let _ = std::fs::remove_file(&path);

        let store = ConfigPinStore::open(path.clone()).expect("open");
        assert!(!store.is_set());
        store.set("5555").expect("set");

        let reopened = ConfigPinStore::open(path.clone()).expect("reopen");
        assert!(reopened.verify("5555"));

        reopened.delete().expect("delete");
        let again = ConfigPinStore::open(path.clone()).expect("open again");
        assert!(!again.is_set());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_config_store_sees_changes_from_another_instance() {
        let dir = std::env::temp_dir().join(format!(
            "coffee_screen_pin_shared_{:?}",
            std::thread::current().id()
        ));
        let path = dir.join("config.toml");
        let _ = std::fs::remove_file(&path);

        let tray = ConfigPinStore::open(path.clone()).expect("open tray store");
        assert!(!tray.is_set());

        let cli = ConfigPinStore::open(path.clone()).expect("open cli store");
        cli.set("1234").expect("set");
        assert!(tray.is_set(), "PIN set elsewhere is picked up");
        assert!(tray.verify("1234"));

        cli.set("9876").expect("change");
        assert!(!tray.verify("1234"), "Old PIN stops working");
        assert!(tray.verify("9876"));

        cli.delete().expect("delete");
        assert!(!tray.is_set());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_config_store_ignores_invalid_chord() {
        let dir = std::env::temp_dir().join(format!(
            "coffee_screen_pin_bad_chord_{:?}",
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("config.toml");

        let mut config = Config::default();
        config.set_pin("2468").expect("pin");
        config.save_to_path(&path).expect("save");
        let contents = std::fs::read_to_string(&path).expect("read");
        let contents = format!(
            "{}\n[emergency_chord]\nkey_code = 37\nkey = \"L\"\nshift = true\n",
            contents
        );
        std::fs::write(&path, contents).expect("write");

        let store = ConfigPinStore::open(path.clone()).expect("PIN loads despite bad chord");
        assert!(store.verify("2468"));

        std::fs::remove_file(path).ok();
    }
}
