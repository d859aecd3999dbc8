//! Biometric-then-PIN unlock orchestration shown on the shield.

use super::{BiometricProvider, PinStore};
use crate::constants::{INCORRECT_PIN_MESSAGE, PIN_MAX_DIGITS, PIN_NOT_SET_MESSAGE, UNLOCK_REASON};
use crate::error::AuthError;
use crate::events::{EventSender, LockEvent};
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Biometric,
    Pin,
}

/// What the shield renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthAttemptState {
    pub is_authenticating: bool,
    pub mode: AuthMode,
    pub has_biometric_been_tried: bool,
    pub pin_buffer: String,
    pub auth_error: Option<String>,
}

pub struct AuthFlow {
    biometric: Arc<dyn BiometricProvider>,
    pins: Arc<dyn PinStore>,
    events: EventSender,
    state: AuthAttemptState,
    /// Bumped per biometric prompt so late results from an earlier session are dropped.
    attempt: u64,
}

impl AuthFlow {
    pub fn new(
        biometric: Arc<dyn BiometricProvider>,
        pins: Arc<dyn PinStore>,
        events: EventSender,
    ) -> Self {
        Self {
            biometric,
            pins,
            events,
            state: AuthAttemptState::default(),
            attempt: 0,
        }
    }

    pub fn state(&self) -> &AuthAttemptState {
        &self.state
    }

    pub fn is_authenticating(&self) -> bool {
        self.state.is_authenticating
    }

    pub fn mode(&self) -> AuthMode {
        self.state.mode
    }

    pub fn auth_error(&self) -> Option<&str> {
        self.state.auth_error.as_deref()
    }

    pub fn pin_buffer(&self) -> &str {
        &self.state.pin_buffer
    }

    pub fn has_pin(&self) -> bool {
        self.pins.is_set()
    }

    pub fn can_use_biometric(&self) -> bool {
        self.biometric.can_evaluate()
    }

    /// Start a biometric prompt on a worker thread.
    ///
    /// The result comes back as [`LockEvent::BiometricFinished`] and must be
    /// fed to [`AuthFlow::complete_biometric`] on the owner thread.
    pub fn attempt_biometric(&mut self) {
        if self.state.is_authenticating {
            debug!("Biometric prompt already in flight");
            return;
        }

        self.attempt += 1;
        self.state.is_authenticating = true;
        self.state.auth_error = None;
        self.state.has_biometric_been_tried = true;

        let attempt = self.attempt;
        let provider = Arc::clone(&self.biometric);
        let events = self.events.clone();
        info!("Requesting biometric authentication");

        let spawned = thread::Builder::new()
            .name("biometric-prompt".into())
            .spawn(move || {
                let result = provider.authenticate(UNLOCK_REASON);
                if events
                    .send(LockEvent::BiometricFinished { attempt, result })
                    .is_err()
                {
                    debug!("Coordinator gone before biometric result arrived");
                }
            });

        if let Err(e) = spawned {
            warn!("Failed to spawn biometric worker: {}", e);
            self.complete_biometric(attempt, Err(AuthError::Failed(String::new())));
        }
    }

    /// Apply a biometric result. Results for stale attempts are ignored.
    pub fn complete_biometric(&mut self, attempt: u64, result: Result<bool, AuthError>) {
        if attempt != self.attempt || !self.state.is_authenticating {
            debug!("Ignoring stale biometric result for attempt {}", attempt);
            return;
        }

        self.state.is_authenticating = false;
        self.emit(LockEvent::AuthAttemptCompleted);

        match result {
            Ok(true) => {
                info!("Biometric authentication succeeded");
                self.emit(LockEvent::UnlockSucceeded);
            }
            Ok(false) => {
                info!("Biometric authentication failed");
                self.fall_back_to_pin(AuthError::Failed(String::new()).user_message());
            }
            Err(e) => {
                info!("Biometric authentication did not succeed: {:?}", e);
                self.fall_back_to_pin(e.user_message());
            }
        }
    }

    fn fall_back_to_pin(&mut self, message: Option<String>) {
        if self.pins.is_set() {
            self.state.mode = AuthMode::Pin;
            self.state.auth_error = message;
        } else {
            self.state.auth_error = Some(PIN_NOT_SET_MESSAGE.to_string());
        }
    }

    /// Check `candidate` against the stored PIN.
    pub fn attempt_pin(&mut self, candidate: &str) {
        if candidate.is_empty() {
            return;
        }

        self.state.pin_buffer.clear();
        if self.pins.verify(candidate) {
            info!("PIN accepted");
            self.state.mode = AuthMode::Biometric;
            self.state.auth_error = None;
            self.emit(LockEvent::UnlockSucceeded);
        } else {
            info!("Incorrect PIN entered");
            self.state.auth_error = Some(INCORRECT_PIN_MESSAGE.to_string());
        }
    }

    /// Append a typed digit. Non-digits and digits past the cap are dropped.
    pub fn push_pin_digit(&mut self, ch: char) -> bool {
        if !ch.is_ascii_digit() || self.state.pin_buffer.len() >= PIN_MAX_DIGITS {
            return false;
        }
        self.state.pin_buffer.push(ch);
        debug!("PIN buffer length: {}", self.state.pin_buffer.len());
        true
    }

    pub fn pop_pin_digit(&mut self) {
        self.state.pin_buffer.pop();
    }

    pub fn submit_pin(&mut self) {
        let candidate = std::mem::take(&mut self.state.pin_buffer);
        self.attempt_pin(&candidate);
    }

    /// Manual switch from the biometric screen to PIN entry.
    pub fn switch_to_pin(&mut self) {
        if self.pins.is_set() {
            self.state.mode = AuthMode::Pin;
            self.state.auth_error = None;
        } else {
            self.state.auth_error = Some(PIN_NOT_SET_MESSAGE.to_string());
        }
    }

    /// Re-arm biometric mode after a prompt, unless it already had its turn.
    pub fn reset_auth_state(&mut self) {
        if !self.state.is_authenticating
            && self.biometric.can_evaluate()
            && !self.state.has_biometric_been_tried
        {
            self.state.mode = AuthMode::Biometric;
        }
    }

    pub fn reset_all(&mut self) {
        self.state = AuthAttemptState::default();
    }

    /// Fresh state for a newly shown shield set.
    pub fn prepare_for_presentation(&mut self) {
        self.reset_all();
    }

    fn emit(&self, event: LockEvent) {
        if self.events.send(event).is_err() {
            warn!("Lock event channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryPinStore;
    use crate::events::{channel, EventReceiver};
    use std::time::Duration;

    struct FixedBiometric {
        available: bool,
        result: Result<bool, AuthError>,
    }

    impl BiometricProvider for FixedBiometric {
        fn can_evaluate(&self) -> bool {
            self.available
        }

        fn authenticate(&self, _reason: &str) -> Result<bool, AuthError> {
            self.result.clone()
        }
    }

    fn flow_with(result: Result<bool, AuthError>, pin: Option<&str>) -> (AuthFlow, EventReceiver) {
        let (tx, rx) = channel();
        let pins: Arc<dyn PinStore> = match pin {
            Some(pin) => Arc::new(MemoryPinStore::with_pin(pin)),
            None => Arc::new(MemoryPinStore::new()),
        };
        let biometric = Arc::new(FixedBiometric {
            available: true,
            result,
        });
        (AuthFlow::new(biometric, pins, tx), rx)
    }

    fn run_biometric(flow: &mut AuthFlow, rx: &EventReceiver) {
        flow.attempt_biometric();
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(LockEvent::BiometricFinished { attempt, result }) => {
                flow.complete_biometric(attempt, result)
            }
            other => panic!("Expected biometric result, got {:?}", other),
        }
    }

    fn drain(rx: &EventReceiver) -> Vec<LockEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_biometric_success_emits_unlock() {
        let (mut flow, rx) = flow_with(Ok(true), Some("1234"));
        run_biometric(&mut flow, &rx);

        assert_eq!(
            drain(&rx),
            vec![LockEvent::AuthAttemptCompleted, LockEvent::UnlockSucceeded]
        );
        assert!(!flow.is_authenticating());
    }

    #[test]
    fn test_cancel_falls_back_silently() {
        let (mut flow, rx) = flow_with(Err(AuthError::Cancelled), Some("1234"));
        run_biometric(&mut flow, &rx);

        assert_eq!(flow.mode(), AuthMode::Pin);
        assert_eq!(flow.auth_error(), None);
        assert_eq!(drain(&rx), vec![LockEvent::AuthAttemptCompleted]);
    }

    #[test]
    fn test_failure_without_pin_stays_biometric() {
        let (mut flow, rx) = flow_with(Ok(false), None);
        run_biometric(&mut flow, &rx);

        assert_eq!(flow.mode(), AuthMode::Biometric);
        assert_eq!(flow.auth_error(), Some(PIN_NOT_SET_MESSAGE));
    }

    #[test]
    fn test_second_attempt_ignored_while_in_flight() {
        let (mut flow, rx) = flow_with(Ok(true), Some("1234"));
        flow.attempt_biometric();
        flow.attempt_biometric();

        let first = rx.recv_timeout(Duration::from_secs(5)).expect("result");
        assert!(matches!(first, LockEvent::BiometricFinished { attempt: 1, .. }));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_stale_result_after_reset_is_ignored() {
        let (mut flow, rx) = flow_with(Ok(true), Some("1234"));
        flow.attempt_biometric();
        let event = rx.recv_timeout(Duration::from_secs(5)).expect("result");
        flow.reset_all();

        if let LockEvent::BiometricFinished { attempt, result } = event {
            flow.complete_biometric(attempt, result);
        }
        assert!(drain(&rx).is_empty(), "No unlock from a stale prompt");
    }

    #[test]
    fn test_pin_entry() {
        let (mut flow, rx) = flow_with(Ok(false), Some("2468"));
        flow.switch_to_pin();
        assert_eq!(flow.mode(), AuthMode::Pin);

        for ch in "1111".chars() {
            flow.push_pin_digit(ch);
        }
        flow.submit_pin();
        assert_eq!(flow.auth_error(), Some(INCORRECT_PIN_MESSAGE));
        assert_eq!(flow.pin_buffer(), "");
        assert!(drain(&rx).is_empty());

        for ch in "2468".chars() {
            flow.push_pin_digit(ch);
        }
        flow.submit_pin();
        assert_eq!(flow.auth_error(), None);
        assert_eq!(flow.mode(), AuthMode::Biometric);
        assert_eq!(drain(&rx), vec![LockEvent::UnlockSucceeded]);
    }

    #[test]
    fn test_pin_buffer_limits() {
        let (mut flow, _rx) = flow_with(Ok(false), Some("1234"));
        assert!(!flow.push_pin_digit('x'));
        for _ in 0..PIN_MAX_DIGITS {
            assert!(flow.push_pin_digit('9'));
        }
        assert!(!flow.push_pin_digit('9'));
        assert_eq!(flow.pin_buffer().len(), PIN_MAX_DIGITS);

        flow.pop_pin_digit();
        assert_eq!(flow.pin_buffer().len(), PIN_MAX_DIGITS - 1);
    }

    #[test]
    fn test_empty_pin_is_noop() {
        let (mut flow, rx) = flow_with(Ok(false), Some("1234"));
        flow.attempt_pin("");
        assert_eq!(flow.auth_error(), None);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_reset_auth_state_respects_tried_flag() {
        let (mut flow, rx) = flow_with(Err(AuthError::Cancelled), Some("1234"));
        run_biometric(&mut flow, &rx);
        flow.reset_auth_state();
        assert_eq!(flow.mode(), AuthMode::Pin, "Biometric already tried");

        flow.prepare_for_presentation();
        assert_eq!(flow.state(), &AuthAttemptState::default());
    }
}
