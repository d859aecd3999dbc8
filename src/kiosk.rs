//! Presentation restrictions (no Dock, no menu bar, no app switching) while locked.

use log::{debug, info};

/// System UI mode values (HIToolbox `SystemUIMode`).
pub mod ui_mode {
    pub const NORMAL: u32 = 0;
    /// Dock and menu bar hidden, not revealed on hover.
    pub const ALL_HIDDEN: u32 = 3;
}

/// System UI option bits (HIToolbox `SystemUIOptions`).
pub mod ui_options {
    pub const DISABLE_APPLE_MENU: u32 = 1 << 2;
    pub const DISABLE_PROCESS_SWITCH: u32 = 1 << 3;
    pub const DISABLE_FORCE_QUIT: u32 = 1 << 4;
    pub const DISABLE_SESSION_TERMINATE: u32 = 1 << 5;
    pub const DISABLE_HIDE: u32 = 1 << 6;

    pub const KIOSK: u32 = DISABLE_APPLE_MENU
        | DISABLE_PROCESS_SWITCH
        | DISABLE_FORCE_QUIT
        | DISABLE_SESSION_TERMINATE
        | DISABLE_HIDE;
}

/// Presentation state captured before kiosk mode and restored after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestrictionSnapshot {
    pub ui_mode: u32,
    pub ui_options: u32,
    pub cursor_hidden: bool,
}

impl RestrictionSnapshot {
    pub const UNRESTRICTED: RestrictionSnapshot = RestrictionSnapshot {
        ui_mode: ui_mode::NORMAL,
        ui_options: 0,
        cursor_hidden: false,
    };

    pub const KIOSK: RestrictionSnapshot = RestrictionSnapshot {
        ui_mode: ui_mode::ALL_HIDDEN,
        ui_options: ui_options::KIOSK,
        cursor_hidden: true,
    };
}

impl Default for RestrictionSnapshot {
    fn default() -> Self {
        Self::UNRESTRICTED
    }
}

pub trait PresentationRestrictor: Send {
    fn snapshot(&self) -> RestrictionSnapshot;
    fn restore(&self, snapshot: &RestrictionSnapshot);
    fn activate_application(&self);

    fn apply_kiosk(&self) {
        self.restore(&RestrictionSnapshot::KIOSK);
    }
}

/// Applies kiosk restrictions and puts back exactly what was there before.
pub struct KioskGuard {
    restrictor: Box<dyn PresentationRestrictor>,
    saved: Option<RestrictionSnapshot>,
}

impl KioskGuard {
    pub fn new(restrictor: Box<dyn PresentationRestrictor>) -> Self {
        Self {
            restrictor,
            saved: None,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.saved.is_some()
    }

    pub fn apply(&mut self) {
        if self.saved.is_some() {
            return;
        }

        let snapshot = self.restrictor.snapshot();
        debug!("Saved presentation state: {:?}", snapshot);
        self.restrictor.apply_kiosk();
        self.restrictor.activate_application();
        self.saved = Some(snapshot);
        info!("Kiosk mode applied");
    }

    pub fn revert(&mut self) {
        let Some(snapshot) = self.saved.take() else {
            return;
        };

        self.restrictor.restore(&snapshot);
        info!("Kiosk mode reverted");
    }

    /// Bring the app forward again (after a system prompt took focus).
    pub fn activate_application(&self) {
        self.restrictor.activate_application();
    }
}

impl Drop for KioskGuard {
    fn drop(&mut self) {
        self.revert();
    }
}

#[cfg(target_os = "macos")]
pub use self::hitoolbox::SystemUiRestrictor;

#[cfg(target_os = "macos")]
mod hitoolbox {
    use super::{PresentationRestrictor, RestrictionSnapshot};
    use log::warn;

    #[repr(C)]
    struct ProcessSerialNumber {
        high: u32,
        low: u32,
    }

    const K_CURRENT_PROCESS: u32 = 2;
    const K_SET_FRONT_PROCESS_FRONT_WINDOW_ONLY: u32 = 1;
    const K_CG_DIRECT_MAIN_DISPLAY: u32 = 0;

    #[link(name = "Carbon", kind = "framework")]
    extern "C" {
        fn GetSystemUIMode(out_mode: *mut u32, out_options: *mut u32);
        fn SetSystemUIMode(mode: u32, options: u32) -> i32;
    }

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn SetFrontProcessWithOptions(psn: *const ProcessSerialNumber, options: u32) -> i32;
    }

    #[link(name = "CoreGraphics", kind = "framework")]
    extern "C" {
        fn CGDisplayHideCursor(display: u32) -> i32;
        fn CGDisplayShowCursor(display: u32) -> i32;
        fn CGCursorIsVisible() -> bool;
    }

    /// HIToolbox system UI mode plus CoreGraphics cursor visibility.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SystemUiRestrictor;

    impl PresentationRestrictor for SystemUiRestrictor {
        fn snapshot(&self) -> RestrictionSnapshot {
            let mut mode = 0;
            let mut options = 0;
            unsafe { GetSystemUIMode(&mut mode, &mut options) };
            RestrictionSnapshot {
                ui_mode: mode,
                ui_options: options,
                cursor_hidden: unsafe { !CGCursorIsVisible() },
            }
        }

        fn restore(&self, snapshot: &RestrictionSnapshot) {
            let status = unsafe { SetSystemUIMode(snapshot.ui_mode, snapshot.ui_options) };
            if status != 0 {
                warn!("SetSystemUIMode failed with status {}", status);
            }

            let visible = unsafe { CGCursorIsVisible() };
            if snapshot.cursor_hidden && visible {
                unsafe { CGDisplayHideCursor(K_CG_DIRECT_MAIN_DISPLAY) };
            } else if !snapshot.cursor_hidden && !visible {
                unsafe { CGDisplayShowCursor(K_CG_DIRECT_MAIN_DISPLAY) };
            }
        }

        fn activate_application(&self) {
            let psn = ProcessSerialNumber {
                high: 0,
                low: K_CURRENT_PROCESS,
            };
            let status =
                unsafe { SetFrontProcessWithOptions(&psn, K_SET_FRONT_PROCESS_FRONT_WINDOW_ONLY) };
            if status != 0 {
                warn!("Failed to activate application (status {})", status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FakeRestrictor {
        current: Arc<Mutex<RestrictionSnapshot>>,
        activations: Arc<Mutex<u32>>,
    }

    impl PresentationRestrictor for FakeRestrictor {
        fn snapshot(&self) -> RestrictionSnapshot {
            *self.current.lock()
        }

        fn restore(&self, snapshot: &RestrictionSnapshot) {
            *self.current.lock() = *snapshot;
        }

        fn activate_application(&self) {
            *self.activations.lock() += 1;
        }
    }

    #[test]
    fn test_apply_and_revert_restore_snapshot() {
        let before = RestrictionSnapshot {
            ui_mode: 1,
            ui_options: ui_options::DISABLE_HIDE,
            cursor_hidden: false,
        };
        let current = Arc::new(Mutex::new(before));
        let activations = Arc::new(Mutex::new(0));
        let mut guard = KioskGuard::new(Box::new(FakeRestrictor {
            current: current.clone(),
            activations: activations.clone(),
        }));

        guard.apply();
        assert!(guard.is_applied());
        assert_eq!(*current.lock(), RestrictionSnapshot::KIOSK);
        assert_eq!(*activations.lock(), 1);

        guard.apply();
        assert_eq!(*activations.lock(), 1, "Second apply is a no-op");

        guard.revert();
        assert!(!guard.is_applied());
        assert_eq!(*current.lock(), before);

        guard.revert();
        assert_eq!(*current.lock(), before);
    }

    #[test]
    fn test_kiosk_options_cover_all_restrictions() {
        for bit in [
            ui_options::DISABLE_APPLE_MENU,
            ui_options::DISABLE_PROCESS_SWITCH,
            ui_options::DISABLE_FORCE_QUIT,
            ui_options::DISABLE_SESSION_TERMINATE,
            ui_options::DISABLE_HIDE,
        ] {
            assert_ne!(ui_options::KIOSK & bit, 0);
        }
    }
}
