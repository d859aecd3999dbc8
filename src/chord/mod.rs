//! Emergency escape key chord model.

pub mod matcher;
pub mod recorder;
pub mod store;

pub use matcher::matches;
pub use recorder::{ChordRecorder, RecorderMessage};
pub use store::{ChordStore, ConfigChordStore, MemoryChordStore};

use crate::constants::{DEFAULT_ESCAPE_CHARACTER, DEFAULT_ESCAPE_KEYCODE};
use crate::utils::keycode::key_string_to_keycode;
use anyhow::{bail, Context, Result};
use std::fmt;
use std::str::FromStr;

/// Set of modifier keys held during a key event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierMask {
    pub shift: bool,
    pub control: bool,
    pub option: bool,
    pub command: bool,
}

impl ModifierMask {
    pub const NONE: ModifierMask = ModifierMask {
        shift: false,
        control: false,
        option: false,
        command: false,
    };

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_control(mut self) -> Self {
        self.control = true;
        self
    }

    pub fn with_option(mut self) -> Self {
        self.option = true;
        self
    }

    pub fn with_command(mut self) -> Self {
        self.command = true;
        self
    }

    /// The command/control/option subset, with shift cleared.
    pub fn without_shift(self) -> Self {
        Self {
            shift: false,
            ..self
        }
    }

    /// True if every modifier set in `other` is also set in `self`.
    pub fn contains(self, other: ModifierMask) -> bool {
        (self.shift || !other.shift)
            && (self.control || !other.control)
            && (self.option || !other.option)
            && (self.command || !other.command)
    }
}

/// A key code plus the modifiers that must accompany it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    key_code: u16,
    display_character: String,
    modifiers: ModifierMask,
    requires_both_shifts: bool,
}

impl KeyChord {
    pub fn new(
        key_code: u16,
        display_character: impl Into<String>,
        modifiers: ModifierMask,
        requires_both_shifts: bool,
    ) -> Self {
        Self {
            key_code,
            display_character: display_character.into(),
            modifiers,
            requires_both_shifts,
        }
    }

    pub fn key_code(&self) -> u16 {
        self.key_code
    }

    pub fn display_character(&self) -> &str {
        &self.display_character
    }

    pub fn modifiers(&self) -> ModifierMask {
        self.modifiers
    }

    pub fn requires_both_shifts(&self) -> bool {
        self.requires_both_shifts
    }

    /// A chord must include Command or Control so it cannot be typed by accident.
    pub fn is_valid(&self) -> bool {
        self.modifiers.command || self.modifiers.control
    }

    /// Human readable form, e.g. `Shift+Shift+Cmd+L`.
    pub fn display_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.requires_both_shifts {
            parts.push("Shift+Shift".to_string());
        } else if self.modifiers.shift {
            parts.push("Shift".to_string());
        }
        if self.modifiers.control {
            parts.push("Ctrl".to_string());
        }
        if self.modifiers.option {
            parts.push("Option".to_string());
        }
        if self.modifiers.command {
            parts.push("Cmd".to_string());
        }
        parts.push(self.display_character.to_uppercase());

        parts.join("+")
    }
}

impl Default for KeyChord {
    /// Both Shift keys + Command + L.
    fn default() -> Self {
        Self::new(
            DEFAULT_ESCAPE_KEYCODE,
            DEFAULT_ESCAPE_CHARACTER,
            ModifierMask::NONE.with_shift().with_command(),
            true,
        )
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl FromStr for KeyChord {
    type Err = anyhow::Error;

    /// Parse the `display_string` form, e.g. `Shift+Shift+Cmd+L` or `ctrl+opt+k`.
    /// Naming Shift twice requires both physical Shift keys.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((key, modifier_parts)) = parts.split_last() else {
            bail!("Empty key chord");
        };

        let mut modifiers = ModifierMask::NONE;
        let mut shift_count = 0;
        for part in modifier_parts {
            match part.to_lowercase().as_str() {
                "shift" => {
                    shift_count += 1;
                    modifiers.shift = true;
                }
                "ctrl" | "control" => modifiers.control = true,
                "opt" | "option" | "alt" => modifiers.option = true,
                "cmd" | "command" | "super" => modifiers.command = true,
                other => bail!("Unknown modifier '{}' in '{}'", other, s),
            }
        }
        if shift_count > 2 {
            bail!("Shift can appear at most twice in '{}'", s);
        }

        let key_code = key_string_to_keycode(key)
            .with_context(|| format!("Invalid key in chord '{}'", s))?;

        Ok(Self::new(
            key_code,
            key.to_uppercase(),
            modifiers,
            shift_count == 2,
        ))
    }
}
