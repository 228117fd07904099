//! macOS platform backend.
//!
//! Capture: listen-only CGEventTap (HID level) via `MacOSCapture`.
//! Injection: CGEventPost at the session level via `MacOSExecutor`.
//!
//! Recording requires Accessibility (and, on recent releases, Input
//! Monitoring) permission. `MacOSCapture::start()` calls `AXIsProcessTrusted()`
//! and returns `PlatformError::PermissionDenied` if it has not been granted.
//! Guide the user to:
//!   System Settings > Privacy & Security > Accessibility

mod capture;
mod executor;
mod keycodes;

use capture::MacOSCapture;
use executor::MacOSExecutor;

use crate::platform::{ActionExecutor, InputCapture, PlatformError};

/// Returns the CGEventTap-based capture backend.
///
/// The permission check happens in `start()` so that this always succeeds.
pub fn create_input_capture() -> Result<Box<dyn InputCapture>, PlatformError> {
    Ok(Box::new(MacOSCapture::new()))
}

/// Returns the CGEventPost-based action executor.
pub fn create_action_executor() -> Result<Box<dyn ActionExecutor>, PlatformError> {
    Ok(Box::new(MacOSExecutor::new()))
}
