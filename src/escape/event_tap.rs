//! CoreGraphics session event tap feeding the escape watcher.

use super::{EventDisposition, EventTap, KeyEvent, KeyEventHandler, KeyEventKind};
use crate::chord::ModifierMask;
use anyhow::{bail, Result};
use core_foundation::base::TCFType;
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop, CFRunLoopSource};
use core_graphics::event::{CGEvent, CGEventFlags, CGEventType, EventField};
use core_graphics::sys::{CGEventRef, CGEventTapRef};
use foreign_types::ForeignType;
use log::{error, info, warn};
use std::ffi::c_void;

type CFMachPortRef = *mut c_void;
type CFAllocatorRef = *mut c_void;
type CFIndex = i64;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: unsafe extern "C" fn(
            proxy: CGEventTapRef,
            event_type: u32,
            event: CGEventRef,
            user_info: *mut c_void,
        ) -> CGEventRef,
        user_info: *mut c_void,
    ) -> CGEventTapRef;

    fn CGEventTapEnable(tap: CGEventTapRef, enable: bool);
}

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortCreateRunLoopSource(
        allocator: CFAllocatorRef,
        port: CFMachPortRef,
        order: CFIndex,
    ) -> *mut c_void;

    fn CFMachPortInvalidate(port: CFMachPortRef);
    fn CFRelease(cf: *const c_void);
}

const SESSION_EVENT_TAP: u32 = 1;
const HEAD_INSERT_EVENT_TAP: u32 = 0;
const TAP_OPTION_DEFAULT: u32 = 0;
const TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

/// Handed to the C callback through `user_info`.
struct TapContext {
    tap: CGEventTapRef,
    handler: KeyEventHandler,
}

struct InstalledTap {
    tap: CGEventTapRef,
    source: CFRunLoopSource,
    context: *mut TapContext,
}

/// Session-level event tap on the current thread's run loop.
///
/// Must be installed and removed on the thread that runs the main run loop.
#[derive(Default)]
pub struct CgEventTap {
    installed: Option<InstalledTap>,
}

impl CgEventTap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventTap for CgEventTap {
    fn install(&mut self, handler: KeyEventHandler) -> Result<()> {
        if self.installed.is_some() {
            return Ok(());
        }

        let event_mask: u64 =
            (1 << CGEventType::KeyDown as u64) | (1 << CGEventType::FlagsChanged as u64);

        let context = Box::into_raw(Box::new(TapContext {
            tap: std::ptr::null_mut(),
            handler,
        }));

        unsafe {
            let tap = CGEventTapCreate(
                SESSION_EVENT_TAP,
                HEAD_INSERT_EVENT_TAP,
                TAP_OPTION_DEFAULT,
                event_mask,
                event_tap_callback,
                context as *mut c_void,
            );

            if tap.is_null() {
                drop(Box::from_raw(context));
                error!("Failed to create event tap - accessibility permissions may not be granted");
                bail!("Failed to create key event tap. Grant Accessibility permission and retry.");
            }
            (*context).tap = tap;

            let source_ref = CFMachPortCreateRunLoopSource(std::ptr::null_mut(), tap as CFMachPortRef, 0);
            if source_ref.is_null() {
                CFMachPortInvalidate(tap as CFMachPortRef);
                CFRelease(tap as *const c_void);
                drop(Box::from_raw(context));
                bail!("Failed to create run loop source for event tap");
            }

            let source = CFRunLoopSource::wrap_under_create_rule(
                source_ref as core_foundation::runloop::CFRunLoopSourceRef,
            );
            CFRunLoop::get_current().add_source(&source, kCFRunLoopCommonModes);
            CGEventTapEnable(tap, true);

            self.installed = Some(InstalledTap {
                tap,
                source,
                context,
            });
        }

        info!("Key event tap enabled");
        Ok(())
    }

    fn remove(&mut self) {
        let Some(installed) = self.installed.take() else {
            return;
        };

        unsafe {
            CGEventTapEnable(installed.tap, false);
            CFRunLoop::get_current().remove_source(&installed.source, kCFRunLoopCommonModes);
            CFMachPortInvalidate(installed.tap as CFMachPortRef);
            CFRelease(installed.tap as *const c_void);
            drop(Box::from_raw(installed.context));
        }
        info!("Key event tap disabled");
    }
}

impl Drop for CgEventTap {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Whether this process may install a session event tap.
pub fn accessibility_granted() -> bool {
    unsafe { AXIsProcessTrusted() }
}

fn modifiers_from_flags(flags: CGEventFlags) -> ModifierMask {
    ModifierMask {
        shift: flags.contains(CGEventFlags::CGEventFlagShift),
        control: flags.contains(CGEventFlags::CGEventFlagControl),
        option: flags.contains(CGEventFlags::CGEventFlagAlternate),
        command: flags.contains(CGEventFlags::CGEventFlagCommand),
    }
}

unsafe extern "C" fn event_tap_callback(
    _proxy: CGEventTapRef,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    let context = &mut *(user_info as *mut TapContext);

    if event_type == TAP_DISABLED_BY_TIMEOUT || event_type == TAP_DISABLED_BY_USER_INPUT {
        warn!("Event tap was disabled by the system, re-enabling");
        CGEventTapEnable(context.tap, true);
        return event;
    }

    let kind = if event_type == CGEventType::KeyDown as u32 {
        KeyEventKind::KeyDown
    } else if event_type == CGEventType::FlagsChanged as u32 {
        KeyEventKind::FlagsChanged
    } else {
        return event;
    };

    // Borrow the event without taking ownership; the tap hands it back to the OS
    let cg_event = std::mem::ManuallyDrop::new(CGEvent::from_ptr(event));
    let key_code = cg_event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
    let modifiers = modifiers_from_flags(cg_event.get_flags());

    match (context.handler)(KeyEvent {
        kind,
        key_code,
        modifiers,
    }) {
        EventDisposition::Consume => std::ptr::null_mut(),
        EventDisposition::PassThrough => event,
    }
}
