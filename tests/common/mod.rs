// In-memory stand-ins for the OS facilities the coordinator drives
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use coffee_screen::auth::{BiometricProvider, MemoryPinStore};
use coffee_screen::chord::MemoryChordStore;
use coffee_screen::error::AuthError;
use coffee_screen::escape::{EventDisposition, EventTap, KeyEvent, KeyEventHandler};
use coffee_screen::events::{EventSender, LockEvent};
use coffee_screen::kiosk::{PresentationRestrictor, RestrictionSnapshot};
use coffee_screen::power::{AssertionHandle, PowerAssertionApi};
use coffee_screen::shield::{
    Display, DisplayEnumerator, DisplayFrame, DisplayId, ShieldContent, ShieldWindow, WindowHost,
};
use coffee_screen::{LockCoordinator, LockServices};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct PowerState {
    pub live: Option<u32>,
    pub acquired: u32,
    pub released: u32,
}

pub struct FakePower {
    state: Arc<Mutex<PowerState>>,
    deny: bool,
}

impl PowerAssertionApi for FakePower {
    fn acquire(&self, _reason: &str) -> Result<AssertionHandle, i32> {
        if self.deny {
            return Err(-536870210);
        }
        let mut state = self.state.lock();
        state.acquired += 1;
        state.live = Some(state.acquired);
        Ok(AssertionHandle(state.acquired))
    }

    fn release(&self, _handle: AssertionHandle) -> Result<(), i32> {
        let mut state = self.state.lock();
        state.released += 1;
        state.live = None;
        Ok(())
    }
}

pub struct FakeRestrictor {
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

/// A window the fake host has open: display plus the content it was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenWindow {
    pub display: DisplayId,
    pub content: usize,
}

/// How often windows were ordered front or made key
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WindowActivity {
    pub fronts: u32,
    pub keys: u32,
}

pub struct FakeWindow {
    display: DisplayId,
    open: Arc<Mutex<Vec<OpenWindow>>>,
    activity: Arc<Mutex<WindowActivity>>,
}

impl ShieldWindow for FakeWindow {
    fn display_id(&self) -> DisplayId {
        self.display
    }

    fn order_front(&mut self) {
        self.activity.lock().fronts += 1;
    }

    fn make_key(&mut self) {
        self.activity.lock().keys += 1;
    }

    fn close(&mut self) {
        self.open.lock().retain(|w| w.display != self.display);
    }
}

pub struct FakeHost {
    open: Arc<Mutex<Vec<OpenWindow>>>,
    fail_on: Arc<Mutex<Option<DisplayId>>>,
    activity: Arc<Mutex<WindowActivity>>,
}

impl WindowHost for FakeHost {
    fn create_shield_window(
        &mut self,
        display: &Display,
        content: &ShieldContent,
    ) -> Result<Box<dyn ShieldWindow>> {
        if *self.fail_on.lock() == Some(display.id) {
            return Err(anyhow!("window server refused display {}", display.id));
        }
        self.open.lock().push(OpenWindow {
            display: display.id,
            content: Arc::as_ptr(content) as usize,
        });
        Ok(Box::new(FakeWindow {
            display: display.id,
            open: self.open.clone(),
            activity: self.activity.clone(),
        }))
    }
}

pub struct FakeDisplays {
    ids: Arc<Mutex<Vec<DisplayId>>>,
    subscriber: Arc<Mutex<Option<EventSender>>>,
}

impl DisplayEnumerator for FakeDisplays {
    fn connected_displays(&self) -> Vec<Display> {
        self.ids
            .lock()
            .iter()
            .enumerate()
            .map(|(i, &id)| Display {
                id,
                frame: DisplayFrame {
                    x: 1920.0 * i as f64,
                    y: 0.0,
                    width: 1920.0,
                    height: 1080.0,
                },
            })
            .collect()
    }

    fn subscribe(&mut self, events: EventSender) -> Result<()> {
        *self.subscriber.lock() = Some(events);
        Ok(())
    }
}

pub struct FakeTap {
    handler: Arc<Mutex<Option<KeyEventHandler>>>,
}

impl EventTap for FakeTap {
    fn install(&mut self, handler: KeyEventHandler) -> Result<()> {
        *self.handler.lock() = Some(handler);
        Ok(())
    }

    fn remove(&mut self) {
        *self.handler.lock() = None;
    }
}

pub struct StubBiometric {
    pub available: bool,
    pub result: Result<bool, AuthError>,
}

impl BiometricProvider for StubBiometric {
    fn can_evaluate(&self) -> bool {
        self.available
    }

    fn authenticate(&self, _reason: &str) -> Result<bool, AuthError> {
        self.result.clone()
    }
}

pub struct HarnessOptions {
    pub pin: Option<&'static str>,
    pub biometric: Result<bool, AuthError>,
    pub displays: Vec<DisplayId>,
    pub deny_power: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            pin: Some("1234"),
            biometric: Ok(true),
            displays: vec![1],
            deny_power: false,
        }
    }
}

/// Coordinator wired to fakes, with handles to observe and drive them
pub struct Harness {
    pub coordinator: LockCoordinator,
    pub pins: Arc<MemoryPinStore>,
    pub chords: Arc<MemoryChordStore>,
    pub power: Arc<Mutex<PowerState>>,
    pub presentation: Arc<Mutex<RestrictionSnapshot>>,
    pub activations: Arc<Mutex<u32>>,
    pub windows: Arc<Mutex<Vec<OpenWindow>>>,
    pub window_activity: Arc<Mutex<WindowActivity>>,
    pub fail_window_on: Arc<Mutex<Option<DisplayId>>>,
    pub displays: Arc<Mutex<Vec<DisplayId>>>,
    pub display_events: Arc<Mutex<Option<EventSender>>>,
    pub tap: Arc<Mutex<Option<KeyEventHandler>>>,
}

impl Harness {
    pub fn new(options: HarnessOptions) -> Self {
        let pins = Arc::new(match options.pin {
            Some(pin) => MemoryPinStore::with_pin(pin),
            None => MemoryPinStore::new(),
        });
        let chords = Arc::new(MemoryChordStore::new());
        let power = Arc::new(Mutex::new(PowerState::default()));
        let presentation = Arc::new(Mutex::new(RestrictionSnapshot::UNRESTRICTED));
        let activations = Arc::new(Mutex::new(0));
        let windows = Arc::new(Mutex::new(Vec::new()));
        let window_activity = Arc::new(Mutex::new(WindowActivity::default()));
        let fail_window_on = Arc::new(Mutex::new(None));
        let displays = Arc::new(Mutex::new(options.displays));
        let display_events = Arc::new(Mutex::new(None));
        let tap = Arc::new(Mutex::new(None));

        let services = LockServices {
            power: Box::new(FakePower {
                state: power.clone(),
                deny: options.deny_power,
            }),
            restrictor: Box::new(FakeRestrictor {
                current: presentation.clone(),
                activations: activations.clone(),
            }),
            window_host: Box::new(FakeHost {
                open: windows.clone(),
                fail_on: fail_window_on.clone(),
                activity: window_activity.clone(),
            }),
            displays: Box::new(FakeDisplays {
                ids: displays.clone(),
                subscriber: display_events.clone(),
            }),
            event_tap: Box::new(FakeTap { handler: tap.clone() }),
            biometric: Arc::new(StubBiometric {
                available: true,
                result: options.biometric,
            }),
            pins: pins.clone(),
            chords: chords.clone(),
        };

        let coordinator = LockCoordinator::new(services).expect("coordinator");

        Self {
            coordinator,
            pins,
            chords,
            power,
            presentation,
            activations,
            windows,
            window_activity,
            fail_window_on,
            displays,
            display_events,
            tap,
        }
    }

    /// Feed a key event through the installed tap, if any
    pub fn press(&self, event: KeyEvent) -> Option<EventDisposition> {
        self.tap.lock().as_mut().map(|handler| handler(event))
    }

    /// Replace the connected displays and post the change notification
    pub fn change_displays(&self, ids: Vec<DisplayId>) {
        *self.displays.lock() = ids;
        if let Some(sender) = self.display_events.lock().as_ref() {
            sender.send(LockEvent::DisplaysChanged).expect("send");
        }
    }

    pub fn open_displays(&self) -> Vec<DisplayId> {
        self.windows.lock().iter().map(|w| w.display).collect()
    }

    /// Pump events until the biometric prompt has been applied
    pub fn wait_for_biometric(&mut self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            self.coordinator.process_events();
            if !self.coordinator.auth_flow().lock().is_authenticating() {
                return;
            }
            assert!(Instant::now() < deadline, "biometric result never arrived");
            thread::sleep(Duration::from_millis(5));
        }
    }
}
