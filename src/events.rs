//! Notifications flowing into the lock coordinator.
//!
//! Every producer (event tap, biometric worker, display callback, auth flow)
//! holds a `Sender<LockEvent>`; the coordinator is the single consumer and
//! applies them on its own thread.

use crate::error::AuthError;
use crate::shield::DisplayId;
use std::sync::mpsc::{Receiver, Sender};

/// Something the coordinator must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// The emergency escape chord was pressed.
    EscapeChord,
    /// Biometric or PIN authentication succeeded.
    UnlockSucceeded,
    /// A biometric prompt returned, whatever the outcome.
    AuthAttemptCompleted,
    /// Result of the biometric worker, tagged with the attempt it belongs to.
    BiometricFinished {
        attempt: u64,
        result: Result<bool, AuthError>,
    },
    /// Displays were added, removed or rearranged.
    DisplaysChanged,
    /// A window host could not realize a shield window it had accepted.
    ShieldWindowFailed { display: DisplayId, reason: String },
}

pub type EventSender = Sender<LockEvent>;
pub type EventReceiver = Receiver<LockEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    std::sync::mpsc::channel()
}
