use super::{KeyChord, ModifierMask};

/// Decide whether a single key-down event triggers `chord`.
///
/// Command, control and option must be a superset of what the chord asks for,
/// so stray flags (caps lock, fn) never break a match. Shift is checked on its
/// own: a both-shifts chord needs both physical keys down, a single-shift
/// chord needs the shift flag, any other chord ignores shift.
pub fn matches(
    chord: &KeyChord,
    key_code: u16,
    modifiers: ModifierMask,
    both_shifts_pressed: bool,
) -> bool {
    if key_code != chord.key_code() {
        return false;
    }

    let required = chord.modifiers().without_shift();
    if !modifiers.without_shift().contains(required) {
        return false;
    }

    if chord.requires_both_shifts() {
        modifiers.shift && both_shifts_pressed
    } else if chord.modifiers().shift {
        modifiers.shift
    } else {
        true
    }
}
