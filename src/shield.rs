//! One opaque always-on-top window per display.
//!
//! The set is either empty or complete. A display change closes every window
//! and rebuilds the whole set around the same [`ShieldContent`].

use crate::auth::AuthFlow;
use crate::events::EventSender;
use anyhow::Result;
use log::{debug, error, info};
use parking_lot::Mutex;
use std::sync::Arc;

pub type DisplayId = u32;

/// Content shared by every shield window. Survives window rebuilds.
pub type ShieldContent = Arc<Mutex<AuthFlow>>;

/// Display frame in global screen coordinates (points).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayFrame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Display {
    pub id: DisplayId,
    pub frame: DisplayFrame,
}

pub trait ShieldWindow {
    fn display_id(&self) -> DisplayId;
    fn order_front(&mut self);
    fn make_key(&mut self);
    fn close(&mut self);
}

/// AppKit placement for shield windows: above the screen saver, on every
/// space and next to full-screen apps.
pub mod window_level {
    /// `NSScreenSaverWindowLevel`
    pub const SCREEN_SAVER: isize = 1000;
    pub const SHIELD: isize = SCREEN_SAVER + 1;

    /// `NSWindowCollectionBehavior` bits
    pub const CAN_JOIN_ALL_SPACES: usize = 1 << 0;
    pub const FULL_SCREEN_AUXILIARY: usize = 1 << 8;

    pub const SHIELD_COLLECTION_BEHAVIOR: usize = CAN_JOIN_ALL_SPACES | FULL_SCREEN_AUXILIARY;
}

/// Creates borderless, opaque, always-on-top windows visible on all spaces.
pub trait WindowHost {
    fn create_shield_window(
        &mut self,
        display: &Display,
        content: &ShieldContent,
    ) -> Result<Box<dyn ShieldWindow>>;
}

pub trait DisplayEnumerator {
    fn connected_displays(&self) -> Vec<Display>;

    /// Post `LockEvent::DisplaysChanged` on every reconfiguration.
    fn subscribe(&mut self, events: EventSender) -> Result<()>;
}

pub struct ShieldSetManager {
    host: Box<dyn WindowHost>,
    displays: Box<dyn DisplayEnumerator>,
    windows: Vec<Box<dyn ShieldWindow>>,
    content: Option<ShieldContent>,
}

impl ShieldSetManager {
    pub fn new(host: Box<dyn WindowHost>, displays: Box<dyn DisplayEnumerator>) -> Self {
        Self {
            host,
            displays,
            windows: Vec::new(),
            content: None,
        }
    }

    pub fn count(&self) -> usize {
        self.windows.len()
    }

    pub fn is_showing(&self) -> bool {
        self.content.is_some()
    }

    pub fn content(&self) -> Option<&ShieldContent> {
        self.content.as_ref()
    }

    pub fn connected_display_count(&self) -> usize {
        self.displays.connected_displays().len()
    }

    pub fn subscribe(&mut self, events: EventSender) -> Result<()> {
        self.displays.subscribe(events)
    }

    /// Cover every connected display. No-op while already showing.
    pub fn show(&mut self, content: ShieldContent) -> Result<()> {
        if self.is_showing() {
            debug!("Shield already showing");
            return Ok(());
        }

        self.windows = self.build_windows(&content)?;
        self.content = Some(content);
        info!("Shield shown on {} display(s)", self.windows.len());
        Ok(())
    }

    pub fn hide(&mut self) {
        self.close_all();
        if self.content.take().is_some() {
            info!("Shield hidden");
        }
    }

    pub fn bring_to_front(&mut self) {
        for window in self.windows.iter_mut() {
            window.order_front();
        }
        if let Some(first) = self.windows.first_mut() {
            first.make_key();
        }
    }

    /// Rebuild the whole set for the current display layout.
    ///
    /// On failure the set is left empty and no longer showing.
    pub fn handle_display_change(&mut self) -> Result<()> {
        let Some(content) = self.content.clone() else {
            return Ok(());
        };

        self.close_all();
        match self.build_windows(&content) {
            Ok(windows) => self.windows = windows,
            Err(e) => {
                self.content = None;
                return Err(e);
            }
        }
        info!(
            "Display configuration changed, shield rebuilt on {} display(s)",
            self.windows.len()
        );
        Ok(())
    }

    fn build_windows(&mut self, content: &ShieldContent) -> Result<Vec<Box<dyn ShieldWindow>>> {
        let mut created: Vec<Box<dyn ShieldWindow>> = Vec::new();

        for display in self.displays.connected_displays() {
            match self.host.create_shield_window(&display, content) {
                Ok(mut window) => {
                    window.order_front();
                    created.push(window);
                }
                Err(e) => {
                    error!("Failed to create shield window for display {}: {:#}", display.id, e);
                    for window in created.iter_mut() {
                        window.close();
                    }
                    return Err(e.context(format!("display {}", display.id)));
                }
            }
        }

        if let Some(first) = created.first_mut() {
            first.make_key();
        }
        Ok(created)
    }

    fn close_all(&mut self) {
        for mut window in self.windows.drain(..) {
            window.close();
        }
    }
}

impl Drop for ShieldSetManager {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(target_os = "macos")]
pub use self::quartz::CgDisplayEnumerator;

#[cfg(target_os = "macos")]
mod quartz {
    use super::{Display, DisplayEnumerator, DisplayFrame};
    use crate::events::{EventSender, LockEvent};
    use anyhow::{bail, Result};
    use core_graphics::display::CGDisplay;
    use log::{debug, warn};
    use std::ffi::c_void;

    const K_CG_DISPLAY_BEGIN_CONFIGURATION_FLAG: u32 = 1;

    type ReconfigurationCallback =
        unsafe extern "C" fn(display: u32, flags: u32, user_info: *mut c_void);

    #[link(name = "CoreGraphics", kind = "framework")]
    extern "C" {
        fn CGDisplayRegisterReconfigurationCallback(
            callback: ReconfigurationCallback,
            user_info: *mut c_void,
        ) -> i32;
        fn CGDisplayRemoveReconfigurationCallback(
            callback: ReconfigurationCallback,
            user_info: *mut c_void,
        ) -> i32;
    }

    /// Active displays from Quartz Display Services.
    #[derive(Default)]
    pub struct CgDisplayEnumerator {
        subscription: Option<*mut EventSender>,
    }

    impl CgDisplayEnumerator {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DisplayEnumerator for CgDisplayEnumerator {
        fn connected_displays(&self) -> Vec<Display> {
            match CGDisplay::active_displays() {
                Ok(ids) => ids
                    .into_iter()
                    .map(|id| {
                        let bounds = CGDisplay::new(id).bounds();
                        Display {
                            id,
                            frame: DisplayFrame {
                                x: bounds.origin.x,
                                y: bounds.origin.y,
                                width: bounds.size.width,
                                height: bounds.size.height,
                            },
                        }
                    })
                    .collect(),
                Err(e) => {
                    warn!("Failed to list active displays (CGError {})", e);
                    Vec::new()
                }
            }
        }

        fn subscribe(&mut self, events: EventSender) -> Result<()> {
            if self.subscription.is_some() {
                return Ok(());
            }

            let user_info = Box::into_raw(Box::new(events));
            let status = unsafe {
                CGDisplayRegisterReconfigurationCallback(
                    reconfiguration_callback,
                    user_info as *mut c_void,
                )
            };
            if status != 0 {
                drop(unsafe { Box::from_raw(user_info) });
                bail!("Failed to register display reconfiguration callback (CGError {})", status);
            }

            self.subscription = Some(user_info);
            debug!("Display reconfiguration callback registered");
            Ok(())
        }
    }

    impl Drop for CgDisplayEnumerator {
        fn drop(&mut self) {
            if let Some(user_info) = self.subscription.take() {
                unsafe {
                    CGDisplayRemoveReconfigurationCallback(
                        reconfiguration_callback,
                        user_info as *mut c_void,
                    );
                    drop(Box::from_raw(user_info));
                }
            }
        }
    }

    unsafe extern "C" fn reconfiguration_callback(display: u32, flags: u32, user_info: *mut c_void) {
        if flags & K_CG_DISPLAY_BEGIN_CONFIGURATION_FLAG != 0 {
            return;
        }

        let events = &*(user_info as *const EventSender);
        debug!("Display {} reconfigured (flags {:#x})", display, flags);
        let _ = events.send(LockEvent::DisplaysChanged);
    }
}
