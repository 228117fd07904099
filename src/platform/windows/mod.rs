//! Windows platform backend: WH_KEYBOARD_LL / WH_MOUSE_LL capture, SendInput injection.
//!
//! No special permissions are required for low-level hooks. `SendInput` is
//! subject to UIPI: events aimed at windows of a higher integrity level are
//! dropped, which surfaces as a `PermissionDenied` from the executor.

mod capture;
mod executor;
mod keycodes;

use capture::WindowsCapture;
use executor::WindowsExecutor;

use crate::platform::{ActionExecutor, InputCapture, PlatformError};

/// Returns a `WindowsCapture` backed by the low-level keyboard and mouse hooks.
pub fn create_input_capture() -> Result<Box<dyn InputCapture>, PlatformError> {
    Ok(Box::new(WindowsCapture::new()))
}

/// Returns a `WindowsExecutor` backed by `SendInput`.
pub fn create_action_executor() -> Result<Box<dyn ActionExecutor>, PlatformError> {
    Ok(Box::new(WindowsExecutor::new()))
}
