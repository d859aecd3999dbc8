//! Capture of a new escape chord from the settings surface.

use super::{ChordStore, KeyChord, ModifierMask};
use crate::constants::{LEFT_SHIFT_KEYCODE, RIGHT_SHIFT_KEYCODE};
use crate::utils::keycode::keycode_label;
use log::info;
use std::sync::Arc;

/// Feedback shown next to the recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderMessage {
    Error(String),
    Success(String),
}

/// Records the next key-down (with its modifiers) as a candidate chord.
pub struct ChordRecorder {
    store: Arc<dyn ChordStore>,
    recording: bool,
    recorded: Option<KeyChord>,
    left_shift: bool,
    right_shift: bool,
    message: Option<RecorderMessage>,
}

impl ChordRecorder {
    pub fn new(store: Arc<dyn ChordStore>) -> Self {
        Self {
            store,
            recording: false,
            recorded: None,
            left_shift: false,
            right_shift: false,
            message: None,
        }
    }

    pub fn current_display(&self) -> String {
        self.store.current().display_string()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn recorded(&self) -> Option<&KeyChord> {
        self.recorded.as_ref()
    }

    pub fn message(&self) -> Option<&RecorderMessage> {
        self.message.as_ref()
    }

    pub fn can_save(&self) -> bool {
        self.recorded.as_ref().is_some_and(KeyChord::is_valid)
    }

    pub fn start_recording(&mut self) {
        self.message = None;
        self.recording = true;
        self.clear_capture();
    }

    pub fn cancel_recording(&mut self) {
        self.recording = false;
        self.clear_capture();
    }

    /// Track physical shift keys from a flags-changed event.
    pub fn update_shift_state(&mut self, key_code: u16, pressed: bool) {
        if key_code == LEFT_SHIFT_KEYCODE {
            self.left_shift = pressed;
        } else if key_code == RIGHT_SHIFT_KEYCODE {
            self.right_shift = pressed;
        }
    }

    /// Record a key-down while recording. `characters` is what the key typed, if known.
    pub fn handle_key_event(
        &mut self,
        key_code: u16,
        characters: Option<&str>,
        modifiers: ModifierMask,
    ) {
        if !self.recording {
            return;
        }

        let label = match characters {
            Some(chars) if !chars.trim().is_empty() => chars.to_uppercase(),
            _ => keycode_label(key_code),
        };

        self.recorded = Some(KeyChord::new(
            key_code,
            label,
            modifiers,
            self.left_shift && self.right_shift,
        ));
    }

    pub fn save(&mut self) {
        self.message = None;

        let Some(chord) = self.recorded.clone() else {
            self.message = Some(RecorderMessage::Error(
                "No key combination recorded".to_string(),
            ));
            return;
        };

        if !chord.is_valid() {
            self.message = Some(RecorderMessage::Error("Must include Cmd or Ctrl".to_string()));
            return;
        }

        if self.store.set(&chord) {
            info!("Recorded escape chord saved: {}", chord);
            self.message = Some(RecorderMessage::Success("Key saved".to_string()));
            self.recording = false;
            self.recorded = None;
        } else {
            self.message = Some(RecorderMessage::Error("Failed to save key".to_string()));
        }
    }

    pub fn reset_to_default(&mut self) {
        self.message = None;
        self.store.reset_to_default();
        self.message = Some(RecorderMessage::Success("Reset to default".to_string()));
    }

    fn clear_capture(&mut self) {
        self.recorded = None;
        self.left_shift = false;
        self.right_shift = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::MemoryChordStore;

    fn recorder() -> (ChordRecorder, Arc<MemoryChordStore>) {
        let store = Arc::new(MemoryChordStore::new());
        (ChordRecorder::new(store.clone()), store)
    }

    #[test]
    fn test_ignores_keys_when_not_recording() {
        let (mut rec, _) = recorder();
        rec.handle_key_event(40, Some("k"), ModifierMask::NONE.with_command());
        assert!(rec.recorded().is_none());
    }

    #[test]
    fn test_records_both_shifts() {
        let (mut rec, _) = recorder();
        rec.start_recording();
        rec.update_shift_state(LEFT_SHIFT_KEYCODE, true);
        rec.update_shift_state(RIGHT_SHIFT_KEYCODE, true);
        rec.handle_key_event(
            40,
            Some("k"),
            ModifierMask::NONE.with_command().with_shift(),
        );

        let chord = rec.recorded().cloned().expect("chord recorded");
        assert!(chord.requires_both_shifts());
        assert_eq!(chord.display_string(), "Shift+Shift+Cmd+K");
        assert!(rec.can_save());
    }

    #[test]
    fn test_falls_back_to_keycode_label() {
        let (mut rec, _) = recorder();
        rec.start_recording();
        rec.handle_key_event(122, None, ModifierMask::NONE.with_control());
        assert_eq!(rec.recorded().map(|c| c.display_character()), Some("F1"));
    }

    #[test]
    fn test_save_rejects_chord_without_command_or_control() {
        let (mut rec, store) = recorder();
        rec.start_recording();
        rec.handle_key_event(40, Some("k"), ModifierMask::NONE.with_option());
        assert!(!rec.can_save());

        rec.save();
        assert_eq!(
            rec.message(),
            Some(&RecorderMessage::Error("Must include Cmd or Ctrl".to_string()))
        );
        assert!(rec.is_recording());
        assert!(!store.is_custom());
    }

    #[test]
    fn test_save_without_recording() {
        let (mut rec, _) = recorder();
        rec.start_recording();
        rec.save();
        assert!(matches!(rec.message(), Some(RecorderMessage::Error(_))));
    }

    #[test]
    fn test_save_and_reset() {
        let (mut rec, store) = recorder();
        rec.start_recording();
        rec.handle_key_event(40, Some("k"), ModifierMask::NONE.with_control());
        rec.save();

        assert!(!rec.is_recording());
        assert_eq!(store.current().display_string(), "Ctrl+K");
        assert_eq!(rec.current_display(), "Ctrl+K");

        rec.reset_to_default();
        assert_eq!(rec.current_display(), "Shift+Shift+Cmd+L");
    }

    #[test]
    fn test_cancel_clears_shift_tracking() {
        let (mut rec, _) = recorder();
        rec.start_recording();
        rec.update_shift_state(LEFT_SHIFT_KEYCODE, true);
        rec.update_shift_state(RIGHT_SHIFT_KEYCODE, true);
        rec.cancel_recording();

        rec.start_recording();
        rec.handle_key_event(40, Some("k"), ModifierMask::NONE.with_command());
        assert!(!rec.recorded().is_some_and(KeyChord::requires_both_shifts));
    }
}
