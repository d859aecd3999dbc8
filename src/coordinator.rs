//! Top-level lock/unlock state machine.

use crate::app_state::{AppStatus, LockState};
use crate::auth::{AuthFlow, BiometricProvider, PinStore};
use crate::chord::ChordStore;
use crate::constants::{LOCK_REQUIRES_PIN_MESSAGE, POWER_WARNING_MESSAGE, SHIELD_LOST_MESSAGE};
use crate::error::LockError;
use crate::escape::{EscapeWatcher, EventTap};
use crate::events::{self, EventReceiver, EventSender, LockEvent};
use crate::kiosk::{KioskGuard, PresentationRestrictor};
use crate::power::{PowerAssertionApi, PowerHold};
use crate::shield::{DisplayEnumerator, ShieldContent, ShieldSetManager, WindowHost};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// OS facilities the coordinator drives.
pub struct LockServices {
    pub power: Box<dyn PowerAssertionApi>,
    pub restrictor: Box<dyn PresentationRestrictor>,
    pub window_host: Box<dyn WindowHost>,
    pub displays: Box<dyn DisplayEnumerator>,
    pub event_tap: Box<dyn EventTap>,
    pub biometric: Arc<dyn BiometricProvider>,
    pub pins: Arc<dyn PinStore>,
    pub chords: Arc<dyn ChordStore>,
}

/// Wires power, kiosk, shield, escape and auth together.
///
/// Owned by one thread; other threads talk to it through [`LockEvent`]s that
/// [`LockCoordinator::process_events`] applies.
pub struct LockCoordinator {
    power: PowerHold,
    kiosk: KioskGuard,
    shields: ShieldSetManager,
    escape: EscapeWatcher,
    auth: ShieldContent,
    pins: Arc<dyn PinStore>,
    sender: EventSender,
    receiver: EventReceiver,
    status: AppStatus,
    state: LockState,
    prevent_sleep: bool,
}

impl LockCoordinator {
    pub fn new(services: LockServices) -> Result<Self> {
        let (sender, receiver) = events::channel();

        let mut shields = ShieldSetManager::new(services.window_host, services.displays);
        shields
            .subscribe(sender.clone())
            .context("Failed to watch display changes")?;

        let auth = AuthFlow::new(services.biometric, Arc::clone(&services.pins), sender.clone());
        let escape = EscapeWatcher::new(services.event_tap, services.chords, sender.clone());

        let status = AppStatus::new();
        status.set_connected_screens(shields.connected_display_count());

        Ok(Self {
            power: PowerHold::new(services.power),
            kiosk: KioskGuard::new(services.restrictor),
            shields,
            escape,
            auth: Arc::new(Mutex::new(auth)),
            pins: services.pins,
            sender,
            receiver,
            status,
            state: LockState::Unlocked,
            prevent_sleep: true,
        })
    }

    /// Skip the sleep-prevention assertion when `false`.
    pub fn with_prevent_sleep(mut self, prevent_sleep: bool) -> Self {
        self.prevent_sleep = prevent_sleep;
        self
    }

    pub fn is_locked(&self) -> bool {
        self.state == LockState::Locked
    }

    pub fn status(&self) -> AppStatus {
        self.status.clone()
    }

    /// Shared auth state rendered by the shield windows.
    pub fn auth_flow(&self) -> ShieldContent {
        Arc::clone(&self.auth)
    }

    pub fn shield_count(&self) -> usize {
        self.shields.count()
    }

    pub fn shield_content(&self) -> Option<&ShieldContent> {
        self.shields.content()
    }

    pub fn is_power_held(&self) -> bool {
        self.power.is_active()
    }

    pub fn is_kiosk_applied(&self) -> bool {
        self.kiosk.is_applied()
    }

    pub fn is_escape_armed(&self) -> bool {
        self.escape.is_monitoring()
    }

    /// Sender for producers outside the coordinator (tray, tests).
    pub fn event_sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Engage the lock. Refused while no PIN is configured.
    pub fn lock(&mut self) -> Result<(), LockError> {
        if self.is_locked() {
            debug!("Already locked");
            return Ok(());
        }

        if !self.pins.is_set() {
            warn!("Lock refused: no PIN configured");
            self.status.set_last_error(LOCK_REQUIRES_PIN_MESSAGE);
            return Err(LockError::PinNotConfigured);
        }

        self.status.clear_last_error();

        if self.prevent_sleep {
            match self.power.start() {
                Ok(()) => self.status.set_awake(true),
                Err(e) => {
                    warn!("{}. Locking anyway.", e);
                    self.status.set_last_error(POWER_WARNING_MESSAGE);
                }
            }
        }

        self.kiosk.apply();
        self.auth.lock().prepare_for_presentation();

        if let Err(e) = self.shields.show(Arc::clone(&self.auth)) {
            error!("Lock aborted, shield could not be shown: {:#}", e);
            self.kiosk.revert();
            self.power.stop();
            self.status.set_awake(false);
            let err = LockError::Shield(format!("{:#}", e));
            self.status.set_last_error(err.to_string());
            return Err(err);
        }

        if let Err(e) = self.escape.start() {
            warn!("Emergency escape chord unavailable: {:#}", e);
            self.status
                .set_last_error(format!("Emergency escape unavailable: {}", e));
        }

        self.state = LockState::Locked;
        self.status.set_locked(true);
        self.status.set_connected_screens(self.shields.count());
        info!("Screen locked on {} display(s)", self.shields.count());
        Ok(())
    }

    /// Tear everything down in reverse order of `lock`.
    pub fn unlock(&mut self) {
        let was_locked = self.is_locked();

        self.escape.stop();
        self.shields.hide();
        self.kiosk.revert();
        self.power.stop();
        self.auth.lock().reset_all();

        self.state = LockState::Unlocked;
        self.status.set_locked(false);
        self.status.set_awake(false);
        self.status.clear_last_error();

        if was_locked {
            info!("Screen unlocked");
        }
    }

    /// Apply every pending event. Returns how many were handled.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        let mut displays_changed = false;

        while let Ok(event) = self.receiver.try_recv() {
            handled += 1;
            match event {
                // One rebuild covers a burst of per-display callbacks
                LockEvent::DisplaysChanged => displays_changed = true,
                other => self.handle_event(other),
            }
        }

        if displays_changed {
            self.handle_displays_changed();
        }
        handled
    }

    fn handle_event(&mut self, event: LockEvent) {
        match event {
            LockEvent::EscapeChord => {
                if self.is_locked() {
                    info!("Unlocking via emergency escape chord");
                    self.unlock();
                }
            }
            LockEvent::UnlockSucceeded => {
                if self.is_locked() {
                    self.unlock();
                }
            }
            LockEvent::AuthAttemptCompleted => {
                if self.is_locked() {
                    self.kiosk.activate_application();
                    self.shields.bring_to_front();
                    self.auth.lock().reset_auth_state();
                }
            }
            LockEvent::BiometricFinished { attempt, result } => {
                self.auth.lock().complete_biometric(attempt, result);
            }
            LockEvent::DisplaysChanged => self.handle_displays_changed(),
            LockEvent::ShieldWindowFailed { display, reason } => {
                if self.is_locked() {
                    self.release_incomplete_shield(format!("display {}: {}", display, reason));
                } else {
                    debug!("Ignoring late window failure for display {}", display);
                }
            }
        }
    }

    fn handle_displays_changed(&mut self) {
        if let Err(e) = self.shields.handle_display_change() {
            if self.is_locked() {
                self.release_incomplete_shield(format!("{:#}", e));
            }
        }

        let count = if self.shields.is_showing() {
            self.shields.count()
        } else {
            self.shields.connected_display_count()
        };
        self.status.set_connected_screens(count);
    }

    /// A locked session never keeps running with displays left uncovered.
    fn release_incomplete_shield(&mut self, reason: String) {
        error!("Shield incomplete ({}), releasing lock", reason);
        self.unlock();
        self.status
            .set_last_error(format!("{}: {}", SHIELD_LOST_MESSAGE, reason));
    }
}

impl Drop for LockCoordinator {
    fn drop(&mut self) {
        if self.is_locked() {
            warn!("Coordinator dropped while locked, releasing lock");
            self.unlock();
        }
    }
}
