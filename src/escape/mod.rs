//! Emergency escape chord detection while the shield is up.
//!
//! The watcher installs a key-event interceptor ([`EventTap`]) that tracks the
//! physical left/right Shift keys and swallows the configured chord, posting
//! [`LockEvent::EscapeChord`] to the coordinator.

#[cfg(target_os = "macos")]
pub mod event_tap;

use crate::chord::{matches, ChordStore, ModifierMask};
use crate::constants::{LEFT_SHIFT_KEYCODE, RIGHT_SHIFT_KEYCODE};
use crate::events::{EventSender, LockEvent};
use anyhow::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    KeyDown,
    FlagsChanged,
}

/// A keyboard event as seen by the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key_code: u16,
    pub modifiers: ModifierMask,
}

impl KeyEvent {
    pub fn key_down(key_code: u16, modifiers: ModifierMask) -> Self {
        Self {
            kind: KeyEventKind::KeyDown,
            key_code,
            modifiers,
        }
    }

    pub fn flags_changed(key_code: u16, modifiers: ModifierMask) -> Self {
        Self {
            kind: KeyEventKind::FlagsChanged,
            key_code,
            modifiers,
        }
    }
}

/// What the interceptor tells the OS to do with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    Consume,
    PassThrough,
}

pub type KeyEventHandler = Box<dyn FnMut(KeyEvent) -> EventDisposition + Send>;

/// Source of key-down and flags-changed events.
pub trait EventTap {
    fn install(&mut self, handler: KeyEventHandler) -> Result<()>;
    fn remove(&mut self);
}

/// Physical Shift key state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftTrackState {
    pub left_down: bool,
    pub right_down: bool,
}

impl ShiftTrackState {
    pub fn both_down(&self) -> bool {
        self.left_down && self.right_down
    }

    fn update(&mut self, key_code: u16, shift_flag: bool) {
        if key_code == LEFT_SHIFT_KEYCODE {
            self.left_down = shift_flag;
        } else if key_code == RIGHT_SHIFT_KEYCODE {
            self.right_down = shift_flag;
        }
    }
}

/// Per-event logic run inside the tap callback.
pub struct ChordInterceptor {
    chords: Arc<dyn ChordStore>,
    shifts: Arc<Mutex<ShiftTrackState>>,
    events: EventSender,
}

impl ChordInterceptor {
    pub fn handle(&mut self, event: KeyEvent) -> EventDisposition {
        match event.kind {
            KeyEventKind::FlagsChanged => {
                self.shifts
                    .lock()
                    .update(event.key_code, event.modifiers.shift);
                EventDisposition::PassThrough
            }
            KeyEventKind::KeyDown => {
                // Chord is read per event so a change in settings applies immediately
                let chord = self.chords.current();
                let both_shifts = self.shifts.lock().both_down();
                if matches(&chord, event.key_code, event.modifiers, both_shifts) {
                    info!("Emergency escape chord {} detected", chord);
                    if self.events.send(LockEvent::EscapeChord).is_err() {
                        warn!("Lock event channel closed, escape chord dropped");
                    }
                    EventDisposition::Consume
                } else {
                    EventDisposition::PassThrough
                }
            }
        }
    }
}

pub struct EscapeWatcher {
    tap: Box<dyn EventTap>,
    chords: Arc<dyn ChordStore>,
    events: EventSender,
    shifts: Arc<Mutex<ShiftTrackState>>,
    monitoring: bool,
}

impl EscapeWatcher {
    pub fn new(tap: Box<dyn EventTap>, chords: Arc<dyn ChordStore>, events: EventSender) -> Self {
        Self {
            tap,
            chords,
            events,
            shifts: Arc::new(Mutex::new(ShiftTrackState::default())),
            monitoring: false,
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn shift_state(&self) -> ShiftTrackState {
        *self.shifts.lock()
    }

    pub fn interceptor(&self) -> ChordInterceptor {
        ChordInterceptor {
            chords: Arc::clone(&self.chords),
            shifts: Arc::clone(&self.shifts),
            events: self.events.clone(),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.monitoring {
            return Ok(());
        }

        self.chords.refresh();
        let mut interceptor = self.interceptor();
        self.tap
            .install(Box::new(move |event| interceptor.handle(event)))?;
        self.monitoring = true;
        info!("Escape watcher started ({})", self.chords.current());
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.monitoring {
            return;
        }

        self.tap.remove();
        *self.shifts.lock() = ShiftTrackState::default();
        self.monitoring = false;
        debug!("Escape watcher stopped");
    }
}

impl Drop for EscapeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::{KeyChord, MemoryChordStore};
    use crate::events::channel;

    const L: u16 = 0x25;

    fn cmd_shift() -> ModifierMask {
        ModifierMask::NONE.with_command().with_shift()
    }

    struct NullTap {
        installed: Arc<Mutex<u32>>,
    }

    impl EventTap for NullTap {
        fn install(&mut self, _handler: KeyEventHandler) -> Result<()> {
            *self.installed.lock() += 1;
            Ok(())
        }

        fn remove(&mut self) {
            *self.installed.lock() -= 1;
        }
    }

    fn watcher() -> (EscapeWatcher, crate::events::EventReceiver, Arc<Mutex<u32>>) {
        let (tx, rx) = channel();
        let installed = Arc::new(Mutex::new(0));
        let tap = NullTap {
            installed: installed.clone(),
        };
        let chords = Arc::new(MemoryChordStore::new());
        (EscapeWatcher::new(Box::new(tap), chords, tx), rx, installed)
    }

    #[test]
    fn test_start_stop_idempotent() {
        let (mut watcher, _rx, installed) = watcher();
        watcher.start().expect("start");
        watcher.start().expect("start again");
        assert_eq!(*installed.lock(), 1);

        watcher.stop();
        watcher.stop();
        assert_eq!(*installed.lock(), 0);
        assert!(!watcher.is_monitoring());
    }

    #[test]
    fn test_default_chord_needs_both_shifts() {
        let (watcher, rx, _) = watcher();
        let mut interceptor = watcher.interceptor();

        interceptor.handle(KeyEvent::flags_changed(LEFT_SHIFT_KEYCODE, cmd_shift()));
        assert_eq!(
            interceptor.handle(KeyEvent::key_down(L, cmd_shift())),
            EventDisposition::PassThrough
        );
        assert!(rx.try_recv().is_err());

        interceptor.handle(KeyEvent::flags_changed(RIGHT_SHIFT_KEYCODE, cmd_shift()));
        assert!(watcher.shift_state().both_down());
        assert_eq!(
            interceptor.handle(KeyEvent::key_down(L, cmd_shift())),
            EventDisposition::Consume
        );
        assert_eq!(rx.try_recv(), Ok(LockEvent::EscapeChord));
    }

    #[test]
    fn test_flags_changed_passes_through() {
        let (watcher, _rx, _) = watcher();
        let mut interceptor = watcher.interceptor();
        assert_eq!(
            interceptor.handle(KeyEvent::flags_changed(LEFT_SHIFT_KEYCODE, cmd_shift())),
            EventDisposition::PassThrough
        );
        interceptor.handle(KeyEvent::flags_changed(LEFT_SHIFT_KEYCODE, ModifierMask::NONE));
        assert!(!watcher.shift_state().left_down);
    }

    #[test]
    fn test_stop_clears_shift_state() {
        let (mut watcher, _rx, _) = watcher();
        watcher.start().expect("start");
        let mut interceptor = watcher.interceptor();
        interceptor.handle(KeyEvent::flags_changed(LEFT_SHIFT_KEYCODE, cmd_shift()));
        interceptor.handle(KeyEvent::flags_changed(RIGHT_SHIFT_KEYCODE, cmd_shift()));

        watcher.stop();
        assert_eq!(watcher.shift_state(), ShiftTrackState::default());
    }

    #[test]
    fn test_chord_is_read_at_event_time() {
        let (tx, rx) = channel();
        let store = Arc::new(MemoryChordStore::new());
        let installed = Arc::new(Mutex::new(0));
        let watcher = EscapeWatcher::new(
            Box::new(NullTap { installed }),
            store.clone(),
            tx,
        );
        let mut interceptor = watcher.interceptor();

        let custom: KeyChord = "Ctrl+Opt+K".parse().expect("chord");
        assert!(store.set(&custom));

        let mods = ModifierMask::NONE.with_control().with_option();
        assert_eq!(
            interceptor.handle(KeyEvent::key_down(40, mods)),
            EventDisposition::Consume
        );
        assert_eq!(rx.try_recv(), Ok(LockEvent::EscapeChord));
    }

    struct CountingChords {
        inner: MemoryChordStore,
        refreshes: Mutex<u32>,
    }

    impl ChordStore for CountingChords {
        fn current(&self) -> KeyChord {
            self.inner.current()
        }
        fn set(&self, chord: &KeyChord) -> bool {
            self.inner.set(chord)
        }
        fn reset_to_default(&self) {
            self.inner.reset_to_default()
        }
        fn is_custom(&self) -> bool {
            self.inner.is_custom()
        }
        fn refresh(&self) {
            *self.refreshes.lock() += 1;
        }
    }

    #[test]
    fn test_start_refreshes_chord_store() {
        let (tx, _rx) = channel();
        let store = Arc::new(CountingChords {
            inner: MemoryChordStore::new(),
            refreshes: Mutex::new(0),
        });
        let installed = Arc::new(Mutex::new(0));
        let mut watcher = EscapeWatcher::new(Box::new(NullTap { installed }), store.clone(), tx);

        watcher.start().expect("start");
        watcher.start().expect("already running");
        assert_eq!(*store.refreshes.lock(), 1);

        watcher.stop();
        watcher.start().expect("restart");
        assert_eq!(*store.refreshes.lock(), 2);
    }
}
