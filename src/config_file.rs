//! Configuration file management with encrypted PIN storage
//!
//! This module loads and saves `config.toml`, which holds the sealed unlock
//! PIN and the emergency escape chord. Both are optional: a missing file means
//! "no PIN, default chord".

use crate::auth::validate_pin;
use crate::chord::{KeyChord, ModifierMask};
use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, CONFIG_FILE_PERMISSIONS,
    CONFIG_PERMISSION_MASK_GROUP_OTHER,
};
use crate::crypto;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Application configuration stored in config.toml
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Base64-encoded AES-256-GCM sealed PIN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_pin: Option<String>,
    /// Custom emergency escape chord (default: both Shifts + Cmd + L)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_chord: Option<ChordConfig>,
}

/// On-disk form of a [`KeyChord`]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChordConfig {
    /// macOS virtual keycode
    pub key_code: u16,
    /// Label shown to the user (e.g. "L", "F1")
    pub key: String,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub control: bool,
    #[serde(default)]
    pub option: bool,
    #[serde(default)]
    pub command: bool,
    #[serde(default)]
    pub both_shifts: bool,
}

impl ChordConfig {
    pub fn from_chord(chord: &KeyChord) -> Self {
        let modifiers = chord.modifiers();
        Self {
            key_code: chord.key_code(),
            key: chord.display_character().to_string(),
            shift: modifiers.shift,
            control: modifiers.control,
            option: modifiers.option,
            command: modifiers.command,
            both_shifts: chord.requires_both_shifts(),
        }
    }

    /// Convert back, rejecting chords without Cmd or Ctrl
    pub fn to_chord(&self) -> Result<KeyChord> {
        let modifiers = ModifierMask {
            shift: self.shift || self.both_shifts,
            control: self.control,
            option: self.option,
            command: self.command,
        };
        let chord = KeyChord::new(self.key_code, self.key.clone(), modifiers, self.both_shifts);
        if !chord.is_valid() {
            return Err(anyhow!(
                "Escape chord {} must include Cmd or Ctrl",
                chord.display_string()
            ));
        }
        Ok(chord)
    }
}

impl Config {
    /// Get the standard config file path
    ///
    /// - macOS: `~/Library/Application Support/coffee-screen/config.toml`
    /// - Linux: `~/.config/coffee-screen/config.toml`
    ///
    /// `COFFEE_SCREEN_CONFIG` overrides the location.
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = crate::config::parse_config_path_override() {
            return Ok(path);
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Failed to determine config directory"))?
            .join(CONFIG_DIR_NAME);

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Load config from a specific path, treating a missing file as empty
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Failed to read an existing file
    /// - TOML parsing fails
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(path)
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at: {}\n\nRun 'coffee-screen --setup' to create it.",
                path.display()
            );
        }

        // Check file permissions (warning if too permissive)
        #[cfg(unix)]
        {
            let metadata = fs::metadata(path).context("Failed to read config file metadata")?;
            let mode = metadata.permissions().mode();

            if mode & CONFIG_PERMISSION_MASK_GROUP_OTHER != 0 {
                log::warn!(
                    "Config file has permissive permissions: {:o}. Should be 600 (user read/write only).",
                    mode & 0o777
                );
            }
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // The chord is validated by `chord()` so a bad chord never hides the PIN
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to a specific path
    ///
    /// Creates the parent directory if needed and sets permissions to 600.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        #[cfg(unix)]
        {
            let mut permissions = fs::metadata(path)?.permissions();
            permissions.set_mode(CONFIG_FILE_PERMISSIONS);
            fs::set_permissions(path, permissions)
                .context("Failed to set config file permissions")?;
        }

        log::info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    pub fn has_pin(&self) -> bool {
        self.encrypted_pin.is_some()
    }

    /// Validate and seal a new PIN
    pub fn set_pin(&mut self, pin: &str) -> Result<()> {
        validate_pin(pin).map_err(|e| anyhow!(e))?;
        self.encrypted_pin = Some(crypto::seal_pin(pin).context("Failed to encrypt PIN")?);
        Ok(())
    }

    /// Decrypt and return the plaintext PIN, if one is stored
    pub fn pin(&self) -> Result<Option<String>> {
        self.encrypted_pin
            .as_deref()
            .map(|sealed| crypto::open_pin(sealed).context("Failed to decrypt PIN"))
            .transpose()
    }

    pub fn clear_pin(&mut self) {
        self.encrypted_pin = None;
    }

    /// The stored chord, `None` when the default applies
    pub fn chord(&self) -> Result<Option<KeyChord>> {
        self.emergency_chord
            .as_ref()
            .map(ChordConfig::to_chord)
            .transpose()
            .context("Invalid emergency_chord in config file")
    }

    pub fn set_chord(&mut self, chord: &KeyChord) -> Result<()> {
        let config = ChordConfig::from_chord(chord);
        config.to_chord()?;
        self.emergency_chord = Some(config);
        Ok(())
    }

    pub fn clear_chord(&mut self) {
        self.emergency_chord = None;
    }
}
