//! Environment overrides for Coffee-Screen
//!
//! The config file (see config_file module) is the primary source. These
//! variables are optional and only tweak behaviour for one run:
//! - COFFEE_SCREEN_CONFIG: Use a different config file path
//! - COFFEE_SCREEN_ESCAPE_KEY: Replace the escape chord's key (A-Z or 0-9)
//! - COFFEE_SCREEN_PREVENT_SLEEP: Set to 0 to skip the sleep-prevention assertion

use crate::chord::KeyChord;
use crate::utils::keycode::key_string_to_keycode;
use log::{debug, info, warn};
use std::env;
use std::path::PathBuf;

/// Parse the COFFEE_SCREEN_CONFIG environment variable
pub fn parse_config_path_override() -> Option<PathBuf> {
    match env::var("COFFEE_SCREEN_CONFIG") {
        Ok(val) if !val.trim().is_empty() => {
            debug!("Using config path from COFFEE_SCREEN_CONFIG: {}", val);
            Some(PathBuf::from(val))
        }
        Ok(_) => {
            warn!("COFFEE_SCREEN_CONFIG is set but empty. Using default path.");
            None
        }
        Err(_) => None,
    }
}

/// Apply the COFFEE_SCREEN_ESCAPE_KEY environment variable to `chord`
///
/// Only the key changes; modifiers and the both-shifts requirement are kept.
pub fn apply_escape_key_override(chord: KeyChord) -> KeyChord {
    let val = match env::var("COFFEE_SCREEN_ESCAPE_KEY") {
        Ok(val) => val,
        Err(_) => {
            debug!("COFFEE_SCREEN_ESCAPE_KEY not set.");
            return chord;
        }
    };

    match key_string_to_keycode(&val) {
        Ok(key_code) => {
            let overridden = KeyChord::new(
                key_code,
                val.trim().to_uppercase(),
                chord.modifiers(),
                chord.requires_both_shifts(),
            );
            info!(
                "Escape chord key overridden via environment variable: {}",
                overridden
            );
            overridden
        }
        Err(e) => {
            warn!(
                "Invalid COFFEE_SCREEN_ESCAPE_KEY '{}': {}. Keeping {}.",
                val, e, chord
            );
            chord
        }
    }
}

/// Parse the COFFEE_SCREEN_PREVENT_SLEEP environment variable
///
/// Returns false only for an explicit "0"/"false"/"no"
pub fn parse_prevent_sleep() -> bool {
    match env::var("COFFEE_SCREEN_PREVENT_SLEEP") {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "0" | "false" | "no" => {
                info!("Sleep prevention disabled via COFFEE_SCREEN_PREVENT_SLEEP");
                false
            }
            "1" | "true" | "yes" | "" => true,
            other => {
                warn!(
                    "Invalid COFFEE_SCREEN_PREVENT_SLEEP value '{}'. Sleep prevention stays enabled.",
                    other
                );
                true
            }
        },
        Err(_) => true,
    }
}
