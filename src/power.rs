//! Sleep prevention while the shield is up.

use crate::constants::POWER_ASSERTION_REASON;
use crate::error::PowerError;
use log::{debug, info, warn};

/// Opaque id of a live power assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertionHandle(pub u32);

/// OS power-assertion facility. Errors carry the raw OS status code.
pub trait PowerAssertionApi: Send {
    fn acquire(&self, reason: &str) -> Result<AssertionHandle, i32>;
    fn release(&self, handle: AssertionHandle) -> Result<(), i32>;
}

/// Owns at most one "prevent idle display sleep" assertion.
pub struct PowerHold {
    api: Box<dyn PowerAssertionApi>,
    handle: Option<AssertionHandle>,
}

impl PowerHold {
    pub fn new(api: Box<dyn PowerAssertionApi>) -> Self {
        Self { api, handle: None }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Acquire the assertion, replacing any live one.
    pub fn start(&mut self) -> Result<(), PowerError> {
        if self.handle.is_some() {
            debug!("Power assertion already held, re-acquiring");
            self.stop();
        }

        match self.api.acquire(POWER_ASSERTION_REASON) {
            Ok(handle) => {
                info!("Sleep prevention enabled (assertion {})", handle.0);
                self.handle = Some(handle);
                Ok(())
            }
            Err(status) => {
                warn!("Power assertion denied (status {})", status);
                Err(PowerError::AssertionCreationFailed)
            }
        }
    }

    /// Release the assertion. A failed release still forgets the handle.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        match self.api.release(handle) {
            Ok(()) => info!("Sleep prevention disabled"),
            Err(status) => warn!(
                "{} (assertion {}, status {})",
                PowerError::AssertionReleaseFailed,
                handle.0,
                status
            ),
        }
    }
}

impl Drop for PowerHold {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(target_os = "macos")]
pub use self::iokit::IoKitPowerApi;

#[cfg(target_os = "macos")]
mod iokit {
    use super::{AssertionHandle, PowerAssertionApi};
    use core_foundation::base::TCFType;
    use core_foundation::string::{CFString, CFStringRef};

    const K_IOPM_ASSERTION_LEVEL_ON: u32 = 255;
    const K_IO_RETURN_SUCCESS: i32 = 0;
    const PREVENT_USER_IDLE_DISPLAY_SLEEP: &str = "PreventUserIdleDisplaySleep";

    #[link(name = "IOKit", kind = "framework")]
    extern "C" {
        fn IOPMAssertionCreateWithName(
            assertion_type: CFStringRef,
            assertion_level: u32,
            assertion_name: CFStringRef,
            assertion_id: *mut u32,
        ) -> i32;

        fn IOPMAssertionRelease(assertion_id: u32) -> i32;
    }

    /// IOKit power management assertions.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct IoKitPowerApi;

    impl PowerAssertionApi for IoKitPowerApi {
        fn acquire(&self, reason: &str) -> Result<AssertionHandle, i32> {
            let assertion_type = CFString::new(PREVENT_USER_IDLE_DISPLAY_SLEEP);
            let name = CFString::new(reason);
            let mut id: u32 = 0;

            let status = unsafe {
                IOPMAssertionCreateWithName(
                    assertion_type.as_concrete_TypeRef(),
                    K_IOPM_ASSERTION_LEVEL_ON,
                    name.as_concrete_TypeRef(),
                    &mut id,
                )
            };

            if status == K_IO_RETURN_SUCCESS {
                Ok(AssertionHandle(id))
            } else {
                Err(status)
            }
        }

        fn release(&self, handle: AssertionHandle) -> Result<(), i32> {
            let status = unsafe { IOPMAssertionRelease(handle.0) };
            if status == K_IO_RETURN_SUCCESS {
                Ok(())
            } else {
                Err(status)
            }
        }
    }
}
