use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Unlocked,
    Locked,
}

/// Status shared with the tray icon poller and other readers
#[derive(Clone, Default)]
pub struct AppStatus {
    inner: Arc<Mutex<AppStatusInner>>,
}

#[derive(Debug, Clone, Default)]
pub struct AppStatusInner {
    /// Current lock state
    pub lock_state: LockState,
    /// Whether the sleep-prevention assertion is held
    pub is_awake: bool,
    /// Number of displays covered (or present when unlocked)
    pub connected_screens: usize,
    /// Last user-facing error or warning
    pub last_error: Option<String>,
    /// When the current lock started
    pub lock_start_time: Option<Instant>,
}

impl AppStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> parking_lot::MutexGuard<'_, AppStatusInner> {
        self.inner.lock()
    }

    /// Copy of the current status
    pub fn snapshot(&self) -> AppStatusInner {
        self.inner.lock().clone()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().lock_state == LockState::Locked
    }

    pub fn set_locked(&self, locked: bool) {
        let mut state = self.inner.lock();
        if locked {
            state.lock_state = LockState::Locked;
            state.lock_start_time = Some(Instant::now());
            log::debug!("Lock engaged at {:?}", state.lock_start_time);
        } else {
            state.lock_state = LockState::Unlocked;
            state.lock_start_time = None;
            log::debug!("Lock disengaged");
        }
    }

    pub fn is_awake(&self) -> bool {
        self.inner.lock().is_awake
    }

    pub fn set_awake(&self, awake: bool) {
        self.inner.lock().is_awake = awake;
    }

    pub fn connected_screens(&self) -> usize {
        self.inner.lock().connected_screens
    }

    pub fn set_connected_screens(&self, count: usize) {
        self.inner.lock().connected_screens = count;
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn set_last_error(&self, message: impl Into<String>) {
        self.inner.lock().last_error = Some(message.into());
    }

    pub fn clear_last_error(&self) {
        self.inner.lock().last_error = None;
    }

    /// Elapsed time since the lock was engaged (in seconds)
    pub fn lock_elapsed_secs(&self) -> Option<u64> {
        self.inner
            .lock()
            .lock_start_time
            .map(|start| start.elapsed().as_secs())
    }
}
