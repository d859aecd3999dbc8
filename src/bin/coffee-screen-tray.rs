// Coffee-Screen Tray App - macOS menu bar application
// Owns the lock coordinator and renders the shield windows on the tao event loop

#[cfg(target_os = "macos")]
fn main() -> anyhow::Result<()> {
    tray::run()
}

#[cfg(not(target_os = "macos"))]
fn main() {
    eprintln!("coffee-screen-tray only runs on macOS");
    std::process::exit(1);
}

#[cfg(target_os = "macos")]
mod tray {
    use anyhow::{Context, Result};
    use coffee_screen::auth::{AuthAttemptState, AuthMode, ConfigPinStore, PinStore};
    use coffee_screen::chord::{
        ChordRecorder, ChordStore, ConfigChordStore, MemoryChordStore, ModifierMask, RecorderMessage,
    };
    use coffee_screen::config::{apply_escape_key_override, parse_prevent_sleep};
    use coffee_screen::config_file::Config;
    use coffee_screen::constants::{
        APP_NAME, ESCAPE_KEYCODE, EVENT_POLL_INTERVAL_MS, NOTIFICATION_TIMEOUT_MS,
        NOTIFICATION_WARNING_TIMEOUT_MS,
    };
    use coffee_screen::escape::event_tap::{accessibility_granted, CgEventTap};
    use coffee_screen::escape::{EventDisposition, EventTap, KeyEvent, KeyEventKind};
    use coffee_screen::events::{EventSender, LockEvent};
    use coffee_screen::shield::{
        window_level, Display, DisplayId, ShieldContent, ShieldWindow, WindowHost,
    };
    use coffee_screen::{platform, LockCoordinator, LockError};
    use log::{debug, error, info, warn};
    use objc::runtime::Object;
    use objc::{msg_send, sel, sel_impl};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::sync::{mpsc, Arc};
    use std::time::{Duration, Instant};
    use tao::dpi::{LogicalPosition, LogicalSize};
    use tao::event::{ElementState, Event, WindowEvent};
    use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopWindowTarget};
    use tao::keyboard::KeyCode;
    use tao::platform::macos::WindowExtMacOS;
    use tao::window::{Window, WindowBuilder, WindowId};
    use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
    use tray_icon::{Icon, TrayIconBuilder};

    const VERSION: &str = env!("CARGO_PKG_VERSION");

    // Shield windows are created on the event loop thread, so the coordinator
    // queues window operations and the loop applies them after each drain.
    enum WindowCommand {
        Create(Display),
        OrderFront(DisplayId),
        MakeKey(DisplayId),
        Close(DisplayId),
    }

    type CommandQueue = Rc<RefCell<Vec<WindowCommand>>>;

    struct TaoWindowHost {
        queue: CommandQueue,
    }

    impl WindowHost for TaoWindowHost {
        fn create_shield_window(
            &mut self,
            display: &Display,
            _content: &ShieldContent,
        ) -> Result<Box<dyn ShieldWindow>> {
            self.queue
                .borrow_mut()
                .push(WindowCommand::Create(display.clone()));
            Ok(Box::new(QueuedShieldWindow {
                id: display.id,
                queue: Rc::clone(&self.queue),
            }))
        }
    }

    struct QueuedShieldWindow {
        id: DisplayId,
        queue: CommandQueue,
    }

    impl ShieldWindow for QueuedShieldWindow {
        fn display_id(&self) -> DisplayId {
            self.id
        }

        fn order_front(&mut self) {
            self.queue.borrow_mut().push(WindowCommand::OrderFront(self.id));
        }

        fn make_key(&mut self) {
            self.queue.borrow_mut().push(WindowCommand::MakeKey(self.id));
        }

        fn close(&mut self) {
            self.queue.borrow_mut().push(WindowCommand::Close(self.id));
        }
    }

    /// The real tao windows, keyed by display
    #[derive(Default)]
    struct ShieldWindows {
        windows: HashMap<DisplayId, Window>,
    }

    impl ShieldWindows {
        /// Failed creations go back to the coordinator as `ShieldWindowFailed`
        fn apply(
            &mut self,
            target: &EventLoopWindowTarget<()>,
            queue: &CommandQueue,
            events: &EventSender,
        ) {
            let commands: Vec<WindowCommand> = queue.borrow_mut().drain(..).collect();
            for command in commands {
                match command {
                    WindowCommand::Create(display) => match build_shield_window(target, &display) {
                        Ok(window) => {
                            self.windows.insert(display.id, window);
                        }
                        Err(e) => {
                            error!("{:#}", e);
                            let _ = events.send(LockEvent::ShieldWindowFailed {
                                display: display.id,
                                reason: format!("{:#}", e),
                            });
                        }
                    },
                    WindowCommand::OrderFront(id) => {
                        if let Some(window) = self.windows.get(&id) {
                            window.set_visible(true);
                            raise_above_screen_saver(window);
                        }
                    }
                    WindowCommand::MakeKey(id) => {
                        if let Some(window) = self.windows.get(&id) {
                            window.set_focus();
                        }
                    }
                    WindowCommand::Close(id) => {
                        // Dropping the window closes it
                        self.windows.remove(&id);
                    }
                }
            }
        }

        fn owns(&self, id: WindowId) -> bool {
            self.windows.values().any(|window| window.id() == id)
        }
    }

    fn build_shield_window(target: &EventLoopWindowTarget<()>, display: &Display) -> Result<Window> {
        let window = WindowBuilder::new()
            .with_title(APP_NAME)
            .with_decorations(false)
            .with_resizable(false)
            .with_always_on_top(true)
            .with_visible_on_all_workspaces(true)
            .with_background_color((0, 0, 0, 255))
            .with_position(LogicalPosition::new(display.frame.x, display.frame.y))
            .with_inner_size(LogicalSize::new(display.frame.width, display.frame.height))
            .build(target)
            .with_context(|| format!("Failed to create shield window for display {}", display.id))?;
        raise_above_screen_saver(&window);
        Ok(window)
    }

    /// tao only offers the floating level, which the Dock and screen saver cover
    fn raise_above_screen_saver(window: &Window) {
        let ns_window = window.ns_window() as *mut Object;
        if ns_window.is_null() {
            warn!("Shield window has no NSWindow, leaving it at the floating level");
            return;
        }
        unsafe {
            let _: () = msg_send![ns_window, setLevel: window_level::SHIELD];
            let _: () = msg_send![
                ns_window,
                setCollectionBehavior: window_level::SHIELD_COLLECTION_BEHAVIOR
            ];
        }
        debug!("Shield window raised to level {}", window_level::SHIELD);
    }

    fn digit_for(key: KeyCode) -> Option<char> {
        let digit = match key {
            KeyCode::Digit0 | KeyCode::Numpad0 => '0',
            KeyCode::Digit1 | KeyCode::Numpad1 => '1',
            KeyCode::Digit2 | KeyCode::Numpad2 => '2',
            KeyCode::Digit3 | KeyCode::Numpad3 => '3',
            KeyCode::Digit4 | KeyCode::Numpad4 => '4',
            KeyCode::Digit5 | KeyCode::Numpad5 => '5',
            KeyCode::Digit6 | KeyCode::Numpad6 => '6',
            KeyCode::Digit7 | KeyCode::Numpad7 => '7',
            KeyCode::Digit8 | KeyCode::Numpad8 => '8',
            KeyCode::Digit9 | KeyCode::Numpad9 => '9',
            _ => return None,
        };
        Some(digit)
    }

    /// Keyboard on the shield: Return/Space for Touch ID, digits for the PIN
    fn handle_shield_key(flow: &ShieldContent, key: KeyCode) {
        let mut flow = flow.lock();
        match key {
            KeyCode::Backspace => flow.pop_pin_digit(),
            KeyCode::Enter | KeyCode::NumpadEnter => match flow.mode() {
                AuthMode::Pin => flow.submit_pin(),
                AuthMode::Biometric => flow.attempt_biometric(),
            },
            KeyCode::Space if flow.mode() == AuthMode::Biometric => flow.attempt_biometric(),
            KeyCode::KeyP => flow.switch_to_pin(),
            other => {
                if let Some(digit) = digit_for(other) {
                    if flow.mode() == AuthMode::Biometric {
                        flow.switch_to_pin();
                    }
                    if flow.mode() == AuthMode::Pin {
                        flow.push_pin_digit(digit);
                    }
                }
            }
        }
    }

    /// Surfaces auth prompts and errors while the shield is up
    #[derive(Default)]
    struct AuthFeedback {
        last: AuthAttemptState,
    }

    impl AuthFeedback {
        fn update(&mut self, state: &AuthAttemptState) {
            if state.auth_error != self.last.auth_error {
                if let Some(ref message) = state.auth_error {
                    notify(message, NOTIFICATION_TIMEOUT_MS);
                }
            }
            if state.mode != self.last.mode && state.mode == AuthMode::Pin {
                notify("Type your PIN and press Return", NOTIFICATION_TIMEOUT_MS);
            }
            self.last = state.clone();
        }
    }

    /// Records a new escape chord from the next key-down
    struct ChordRecording {
        recorder: ChordRecorder,
        keys: mpsc::Receiver<KeyEvent>,
        _tap: CgEventTap,
    }

    impl ChordRecording {
        fn start(chords: Arc<dyn ChordStore>) -> Result<Self> {
            let (tx, rx) = mpsc::channel();
            let mut tap = CgEventTap::new();
            tap.install(Box::new(move |event: KeyEvent| {
                let _ = tx.send(event);
                match event.kind {
                    KeyEventKind::KeyDown => EventDisposition::Consume,
                    KeyEventKind::FlagsChanged => EventDisposition::PassThrough,
                }
            }))
            .context("Failed to capture keys for recording")?;

            let mut recorder = ChordRecorder::new(chords);
            recorder.start_recording();
            notify(
                "Press the new emergency key combination (Esc to cancel)",
                NOTIFICATION_WARNING_TIMEOUT_MS,
            );
            Ok(Self {
                recorder,
                keys: rx,
                _tap: tap,
            })
        }

        /// Returns true once recording is finished
        fn pump(&mut self) -> bool {
            while let Ok(event) = self.keys.try_recv() {
                match event.kind {
                    KeyEventKind::FlagsChanged => self
                        .recorder
                        .update_shift_state(event.key_code, event.modifiers.shift),
                    KeyEventKind::KeyDown => {
                        if event.key_code == ESCAPE_KEYCODE && event.modifiers == ModifierMask::NONE {
                            self.recorder.cancel_recording();
                            notify("Recording cancelled", NOTIFICATION_TIMEOUT_MS);
                            return true;
                        }

                        self.recorder
                            .handle_key_event(event.key_code, None, event.modifiers);
                        self.recorder.save();
                        match self.recorder.message() {
                            Some(RecorderMessage::Success(message)) => {
                                notify(
                                    &format!(
                                        "{}. Emergency escape: {}",
                                        message,
                                        self.recorder.current_display()
                                    ),
                                    NOTIFICATION_TIMEOUT_MS,
                                );
                                return true;
                            }
                            Some(RecorderMessage::Error(message)) => {
                                notify(&format!("{}. Try again.", message), NOTIFICATION_TIMEOUT_MS);
                            }
                            None => {}
                        }
                    }
                }
            }
            false
        }
    }

    pub fn run() -> Result<()> {
        // Initialize logger
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();

        info!("Starting {} Tray App v{}", APP_NAME, VERSION);

        let config_path = Config::config_path()?;
        let pins = Arc::new(ConfigPinStore::open(config_path.clone()).context("Failed to load PIN")?);
        let chords: Arc<dyn ChordStore> =
            Arc::new(ConfigChordStore::open(config_path).context("Failed to load escape chord")?);

        // COFFEE_SCREEN_ESCAPE_KEY only affects this run
        let configured = chords.current();
        let effective = apply_escape_key_override(configured.clone());
        let watcher_chords: Arc<dyn ChordStore> = if effective != configured {
            Arc::new(MemoryChordStore::with_chord(effective))
        } else {
            Arc::clone(&chords)
        };

        if !accessibility_granted() {
            warn!("Accessibility permissions not granted, the emergency escape chord will not work");
            show_alert(
                "Accessibility Permissions Recommended",
                "Coffee-Screen needs Accessibility permission for the emergency escape key.\n\nPlease go to:\nSystem Settings > Privacy & Security > Accessibility\n\nand grant permissions to Coffee-Screen.",
            );
        }

        if !pins.is_set() {
            warn!("No PIN configured, locking is disabled until one is set");
        }

        let queue: CommandQueue = Rc::new(RefCell::new(Vec::new()));
        let host = TaoWindowHost {
            queue: Rc::clone(&queue),
        };
        let services = platform::macos_services(Box::new(host), pins, watcher_chords.clone());
        let mut coordinator = LockCoordinator::new(services)
            .context("Failed to initialize Coffee-Screen")?
            .with_prevent_sleep(parse_prevent_sleep());
        let status = coordinator.status();
        let window_events = coordinator.event_sender();

        // Create event loop for tray app
        let event_loop = EventLoopBuilder::new().build();

        // Build tray menu
        let lock_item = MenuItem::new("Lock Screen", true, None);
        let record_item = MenuItem::new("Record Emergency Key...", true, None);
        let separator = PredefinedMenuItem::separator();
        let version_item = MenuItem::new(format!("Version {}", VERSION), true, None);
        let help_item = MenuItem::new("Help", true, None);
        let quit_item = MenuItem::new("Quit", true, None);

        let menu = Menu::new();
        menu.append(&lock_item).context("Failed to add lock menu item")?;
        menu.append(&record_item).context("Failed to add record menu item")?;
        menu.append(&separator).context("Failed to add separator")?;
        menu.append(&version_item).context("Failed to add version menu item")?;
        menu.append(&help_item).context("Failed to add help menu item")?;
        menu.append(&quit_item).context("Failed to add quit menu item")?;

        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip("Coffee-Screen - Screen Shield")
            .with_icon(create_icon(false)?)
            .build()
            .context("Failed to create tray icon")?;

        info!("Tray icon created, running event loop");

        let lock_id = lock_item.id().clone();
        let record_id = record_item.id().clone();
        let version_id = version_item.id().clone();
        let help_id = help_item.id().clone();
        let quit_id = quit_item.id().clone();

        let locked_icon = create_icon(true)?;
        let unlocked_icon = create_icon(false)?;
        let poll = Duration::from_millis(EVENT_POLL_INTERVAL_MS);

        let mut shield_windows = ShieldWindows::default();
        let mut feedback = AuthFeedback::default();
        let mut recording: Option<ChordRecording> = None;
        let mut was_locked = false;
        let mut locked_secs: u64 = 0;

        // Run event loop
        event_loop.run(move |event, target, control_flow| {
            *control_flow = ControlFlow::WaitUntil(Instant::now() + poll);

            if let Event::WindowEvent {
                window_id,
                event: WindowEvent::KeyboardInput { event: key, .. },
                ..
            } = event
            {
                if key.state == ElementState::Pressed
                    && coordinator.is_locked()
                    && shield_windows.owns(window_id)
                {
                    handle_shield_key(&coordinator.auth_flow(), key.physical_key);
                }
            }

            // Handle menu events
            if let Ok(event) = MenuEvent::receiver().try_recv() {
                let event_id = event.id;

                if event_id == lock_id {
                    handle_lock(&mut coordinator);
                } else if event_id == record_id {
                    if recording.is_none() && !coordinator.is_locked() {
                        match ChordRecording::start(Arc::clone(&chords)) {
                            Ok(session) => recording = Some(session),
                            Err(e) => {
                                error!("{:#}", e);
                                show_alert("Recording Failed", &format!("{:#}", e));
                            }
                        }
                    }
                } else if event_id == version_id {
                    show_version();
                } else if event_id == help_id {
                    show_help(&watcher_chords.current().display_string());
                } else if event_id == quit_id {
                    info!("Quit menu item clicked, exiting");
                    coordinator.unlock();
                    *control_flow = ControlFlow::Exit;
                }
            }

            coordinator.process_events();
            shield_windows.apply(target, &queue, &window_events);

            if let Some(session) = recording.as_mut() {
                if session.pump() {
                    recording = None;
                }
            }

            let is_locked = status.is_locked();
            if is_locked {
                feedback.update(coordinator.auth_flow().lock().state());
                locked_secs = status.lock_elapsed_secs().unwrap_or(locked_secs);
            }

            if is_locked != was_locked {
                was_locked = is_locked;

                let icon = if is_locked {
                    locked_icon.clone()
                } else {
                    unlocked_icon.clone()
                };
                if let Err(e) = tray.set_icon(Some(icon)) {
                    error!("Failed to update tray icon: {}", e);
                }
                lock_item.set_enabled(!is_locked);
                record_item.set_enabled(!is_locked);

                if is_locked {
                    notify("Screen locked. Press Return for Touch ID.", NOTIFICATION_TIMEOUT_MS);
                } else {
                    feedback = AuthFeedback::default();
                    info!("Unlocked after {}s", locked_secs);
                    match status.last_error() {
                        Some(message) => notify(&message, NOTIFICATION_WARNING_TIMEOUT_MS),
                        None => notify(
                            &format!("Screen unlocked after {}", format_duration(locked_secs)),
                            NOTIFICATION_TIMEOUT_MS,
                        ),
                    }
                    locked_secs = 0;
                }
            }
        });
    }

    fn format_duration(secs: u64) -> String {
        match secs {
            0..=59 => format!("{}s", secs),
            60..=3599 => format!("{} min", secs / 60),
            _ => format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60),
        }
    }

    /// Handle "Lock Screen" from the menu
    fn handle_lock(coordinator: &mut LockCoordinator) {
        match coordinator.lock() {
            Ok(()) => {
                info!("Screen locked via menu");
                if let Some(warning) = coordinator.status().last_error() {
                    notify(&warning, NOTIFICATION_WARNING_TIMEOUT_MS);
                }
            }
            Err(LockError::PinNotConfigured) => {
                show_alert(
                    "PIN Required",
                    "Set a PIN before locking the screen.\n\nRun this in Terminal:\ncoffee-screen --set-pin",
                );
            }
            Err(e) => {
                error!("Error locking: {}", e);
                show_alert("Lock Failed", &format!("Failed to lock: {}", e));
            }
        }
    }

    /// Show version information
    fn show_version() {
        info!("Version menu item clicked");
        show_alert(
            "Coffee-Screen Version",
            &format!(
                "Coffee-Screen Tray App\nVersion {}\n\nShields every display while you step away.",
                VERSION
            ),
        );
    }

    /// Show help information
    fn show_help(chord: &str) {
        info!("Help menu item clicked");
        show_alert(
            "Coffee-Screen Help",
            &format!(
                "Coffee-Screen Tray App\n\nMenu Items:\n\
                • Lock Screen: Cover every display and keep the Mac awake\n\
                • Record Emergency Key: Press a new escape combination\n\
                • Version: Show version information\n\
                • Quit: Exit the application\n\n\
                While locked:\n\
                • Return or Space: Unlock with Touch ID\n\
                • Digits then Return: Unlock with your PIN\n\
                • {}: Emergency unlock\n\n\
                Configuration:\n\
                Run 'coffee-screen --setup' to set your PIN.\n\n\
                Permissions:\n\
                The emergency key requires Accessibility permission.",
                chord
            ),
        );
    }

    fn notify(body: &str, timeout_ms: u32) {
        let _ = notify_rust::Notification::new()
            .summary(APP_NAME)
            .body(body)
            .timeout(notify_rust::Timeout::Milliseconds(timeout_ms))
            .show();
    }

    /// Show native macOS alert dialog
    fn show_alert(title: &str, message: &str) {
        use std::process::Command;

        // Escape quotes in message
        let message = message.replace('"', "\\\"");

        let script = format!(
            r#"display dialog "{}" with title "{}" buttons {{"OK"}} default button "OK""#,
            message, title
        );

        let _ = Command::new("osascript").arg("-e").arg(&script).output();
    }

    /// Menu bar icon: a coffee cup silhouette, filled when locked
    fn create_icon(locked: bool) -> Result<Icon> {
        let size: u32 = 32;
        let mut rgba = vec![0u8; (size * size * 4) as usize];
        let color = if locked {
            [200, 60, 40, 255]
        } else {
            [150, 100, 60, 255]
        };

        for y in 0..size {
            for x in 0..size {
                let cup = (6..=21).contains(&x) && (10..=27).contains(&y);
                let wall = cup && (x <= 7 || x >= 20 || y >= 26);
                let handle = (22..=26).contains(&x)
                    && (13..=22).contains(&y)
                    && (x == 26 || y == 13 || y == 22);
                let lit = if locked { cup || handle } else { wall || handle };
                if lit {
                    let i = ((y * size + x) * 4) as usize;
                    rgba[i..i + 4].copy_from_slice(&color);
                }
            }
        }

        Icon::from_rgba(rgba, size, size).context("Failed to create icon")
    }

}
