// Library interface for Coffee-Screen
// Shared by the CLI, the tray app and the integration tests

pub mod app_state;
pub mod auth;
pub mod chord;
pub mod config;
pub mod config_file;
pub mod constants;
pub mod coordinator;
pub mod crypto;
pub mod error;
pub mod escape;
pub mod events;
pub mod kiosk;
pub mod power;
pub mod shield;
pub mod utils;

pub use app_state::{AppStatus, LockState};
pub use coordinator::{LockCoordinator, LockServices};
pub use error::{AuthError, LockError, PinError, PowerError};
pub use events::LockEvent;

/// macOS implementations of every OS-facing trait, ready to hand to
/// [`LockCoordinator::new`] together with a window host.
#[cfg(target_os = "macos")]
pub mod platform {
    use crate::auth::touchid::TouchIdProvider;
    use crate::auth::{BiometricProvider, PinStore};
    use crate::chord::ChordStore;
    use crate::coordinator::LockServices;
    use crate::escape::event_tap::CgEventTap;
    use crate::kiosk::SystemUiRestrictor;
    use crate::power::IoKitPowerApi;
    use crate::shield::{CgDisplayEnumerator, WindowHost};
    use std::sync::Arc;

    pub fn macos_services(
        window_host: Box<dyn WindowHost>,
        pins: Arc<dyn PinStore>,
        chords: Arc<dyn ChordStore>,
    ) -> LockServices {
        let biometric: Arc<dyn BiometricProvider> = Arc::new(TouchIdProvider::new());
        LockServices {
            power: Box::new(IoKitPowerApi),
            restrictor: Box::new(SystemUiRestrictor),
            window_host,
            displays: Box::new(CgDisplayEnumerator::new()),
            event_tap: Box::new(CgEventTap::new()),
            biometric,
            pins,
            chords,
        }
    }
}
