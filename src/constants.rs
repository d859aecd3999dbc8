//! Centralized constants for Coffee-Screen
//!
//! This module contains the fixed values used throughout the application.
//! Each constant includes documentation on its purpose, unit, and range.

// ============================================================================
// APPLICATION IDENTITY
// ============================================================================

/// Application display name.
pub const APP_NAME: &str = "Coffee-Screen";

/// Directory name under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "coffee-screen";

/// Config file name inside `CONFIG_DIR_NAME`.
pub const CONFIG_FILE_NAME: &str = "config.toml";

// ============================================================================
// PIN CONFIGURATION
// ============================================================================

/// Minimum PIN length.
/// Unit: decimal digits
/// Range: Fixed, do not change without updating the setup prompts
pub const PIN_MIN_DIGITS: usize = 4;

/// Maximum PIN length.
/// Unit: decimal digits
/// Range: Fixed, also caps the shield's PIN input buffer
pub const PIN_MAX_DIGITS: usize = 8;

// ============================================================================
// USER-FACING STRINGS
// ============================================================================

/// Reason shown in the biometric prompt.
pub const UNLOCK_REASON: &str = "Unlock Coffee-Screen";

/// Shown when biometric authentication returns a plain failure.
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed";

/// Shown when biometric authentication is unavailable on this machine.
pub const AUTH_NOT_AVAILABLE_MESSAGE: &str = "Touch ID is not available";

/// Shown when no PIN fallback exists.
pub const PIN_NOT_SET_MESSAGE: &str = "PIN not set";

/// Shown after a wrong PIN.
pub const INCORRECT_PIN_MESSAGE: &str = "Incorrect PIN";

/// Shown when lock is refused because no PIN exists.
pub const LOCK_REQUIRES_PIN_MESSAGE: &str = "Set a PIN before locking the screen";

/// Shown when a shield window was lost while locked and the lock was released.
pub const SHIELD_LOST_MESSAGE: &str = "Shield could not cover every display, screen unlocked";

/// Shown when sleep prevention could not be enabled.
pub const POWER_WARNING_MESSAGE: &str = "Could not prevent sleep. The display may turn off while locked.";

// ============================================================================
// POWER MANAGEMENT
// ============================================================================

/// Name attached to the idle display sleep assertion.
pub const POWER_ASSERTION_REASON: &str = "Coffee-Screen: Screen lock active - preventing sleep";

// ============================================================================
// SHIELD WINDOWS
// ============================================================================

/// Interval at which the tray app drains coordinator events and polls monitors.
/// Unit: milliseconds
/// Recommended range: 50-250 (PIN typing feels laggy above that)
pub const EVENT_POLL_INTERVAL_MS: u64 = 100;

// ============================================================================
// NOTIFICATION TIMEOUTS
// ============================================================================

/// Standard notification display duration.
/// Unit: milliseconds
pub const NOTIFICATION_TIMEOUT_MS: u32 = 3000;

/// Warning notification display duration.
/// Unit: milliseconds
pub const NOTIFICATION_WARNING_TIMEOUT_MS: u32 = 6000;

// ============================================================================
// MACOS KEYCODES
// ============================================================================

/// macOS keycode for the left Shift key.
/// Unit: macOS virtual keycode (hardware constant)
pub const LEFT_SHIFT_KEYCODE: u16 = 56;

/// macOS keycode for the right Shift key.
/// Unit: macOS virtual keycode (hardware constant)
pub const RIGHT_SHIFT_KEYCODE: u16 = 60;

/// macOS keycode for Backspace/Delete.
pub const BACKSPACE_KEYCODE: u16 = 51;

/// macOS keycodes for Return and keypad Enter.
pub const RETURN_KEYCODE: u16 = 36;
pub const KEYPAD_ENTER_KEYCODE: u16 = 76;

/// macOS keycode for Escape (cancels chord recording).
pub const ESCAPE_KEYCODE: u16 = 53;

/// Default escape chord key ('L').
/// Unit: macOS virtual keycode
pub const DEFAULT_ESCAPE_KEYCODE: u16 = 0x25;

/// Display character for the default escape chord key.
pub const DEFAULT_ESCAPE_CHARACTER: &str = "L";

// ============================================================================
// FILE PERMISSIONS
// ============================================================================

/// Config file permissions (user read/write only).
/// Unit: Unix permission bits (octal)
pub const CONFIG_FILE_PERMISSIONS: u32 = 0o600;

/// Permission mask to check for group/other access.
/// Unit: Unix permission bits (octal)
pub const CONFIG_PERMISSION_MASK_GROUP_OTHER: u32 = 0o077;

// ============================================================================
// CRYPTOGRAPHY
// ============================================================================

/// AES-256-GCM nonce length.
/// Unit: bytes
/// Range: Fixed at 12 bytes (96 bits) per GCM specification
pub const NONCE_LENGTH_BYTES: usize = 12;
