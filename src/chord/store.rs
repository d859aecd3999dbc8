//! Persistence of the emergency escape chord.

use super::KeyChord;
use crate::config_file::Config;
use anyhow::Result;
use log::{info, warn};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Single-value store for the configured escape chord.
pub trait ChordStore: Send + Sync {
    /// The stored chord, or the default when none is stored.
    fn current(&self) -> KeyChord;

    /// Store `chord`. Invalid chords are rejected and the stored value is kept.
    fn set(&self, chord: &KeyChord) -> bool;

    /// Forget any custom chord.
    fn reset_to_default(&self);

    /// Whether a custom chord is stored.
    fn is_custom(&self) -> bool;

    /// Pick up changes made outside this store. Called when a lock starts.
    fn refresh(&self) {}
}

/// Process-local chord store.
#[derive(Default)]
pub struct MemoryChordStore {
    chord: Mutex<Option<KeyChord>>,
}

impl MemoryChordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chord(chord: KeyChord) -> Self {
        Self {
            chord: Mutex::new(Some(chord)),
        }
    }
}

impl ChordStore for MemoryChordStore {
    fn current(&self) -> KeyChord {
        self.chord.lock().clone().unwrap_or_default()
    }

    fn set(&self, chord: &KeyChord) -> bool {
        if !chord.is_valid() {
            warn!("Rejected escape chord {} (needs Cmd or Ctrl)", chord);
            return false;
        }
        *self.chord.lock() = Some(chord.clone());
        true
    }

    fn reset_to_default(&self) {
        *self.chord.lock() = None;
    }

    fn is_custom(&self) -> bool {
        self.chord.lock().is_some()
    }
}

/// Chord store backed by the config file.
///
/// `current` serves a cached chord so the event tap never touches disk.
/// `refresh` reloads it, which picks up chords saved by the CLI.
pub struct ConfigChordStore {
    path: PathBuf,
    cached: Mutex<Option<KeyChord>>,
}

impl ConfigChordStore {
    /// Load the chord from the config file at `path`.
    pub fn open(path: PathBuf) -> Result<Self> {
        let cached = Self::load(&path)?;
        Ok(Self {
            path,
            cached: Mutex::new(cached),
        })
    }

    /// An invalid stored chord falls back to the default.
    fn load(path: &Path) -> Result<Option<KeyChord>> {
        let config = Config::load_or_default(path)?;
        match config.chord() {
            Ok(chord) => Ok(chord),
            Err(e) => {
                warn!("{:#}, using {}", e, KeyChord::default());
                Ok(None)
            }
        }
    }

    fn persist(&self, chord: Option<&KeyChord>) -> Result<()> {
        let mut config = Config::load_or_default(&self.path)?;
        match chord {
            Some(chord) => config.set_chord(chord)?,
            None => config.clear_chord(),
        }
        config.save_to_path(&self.path)
    }
}

impl ChordStore for ConfigChordStore {
    fn current(&self) -> KeyChord {
        self.cached.lock().clone().unwrap_or_default()
    }

    fn set(&self, chord: &KeyChord) -> bool {
        if !chord.is_valid() {
            warn!("Rejected escape chord {} (needs Cmd or Ctrl)", chord);
            return false;
        }
        match self.persist(Some(chord)) {
            Ok(()) => {
                *self.cached.lock() = Some(chord.clone());
                info!("Escape chord set to {}", chord);
                true
            }
            Err(e) => {
                warn!("Failed to save escape chord: {:#}", e);
                false
            }
        }
    }

    fn reset_to_default(&self) {
        if let Err(e) = self.persist(None) {
            warn!("Failed to reset escape chord: {:#}", e);
            return;
        }
        *self.cached.lock() = None;
        info!("Escape chord reset to {}", KeyChord::default());
    }

    fn is_custom(&self) -> bool {
        self.cached.lock().is_some()
    }

    fn refresh(&self) {
        match Self::load(&self.path) {
            Ok(chord) => *self.cached.lock() = chord,
            Err(e) => warn!("Failed to reload escape chord, keeping {}: {:#}", self.current(), e),
        }
    }
}
