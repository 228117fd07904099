//! Linux platform backend.
//!
//! Capture and injection both use X11 (RECORD and XTEST), which also covers
//! XWayland clients in a Wayland session. Startup detection:
//! 1. `DISPLAY` only            → X11
//! 2. `WAYLAND_DISPLAY` + `DISPLAY` → X11 through XWayland, with a warning
//! 3. `WAYLAND_DISPLAY` only    → unavailable, clear error
//! 4. Neither variable set      → no display, clear error

mod detect;
mod keycodes;
mod x11;

use x11::{X11Capture, X11Executor};

use crate::platform::{ActionExecutor, InputCapture, PlatformError};

/// Returns the RECORD-based keyboard and mouse capture backend.
pub fn create_input_capture() -> Result<Box<dyn InputCapture>, PlatformError> {
    detect::require_x11()?;
    Ok(Box::new(X11Capture::new()?))
}

/// Returns the XTEST-based injection backend.
pub fn create_action_executor() -> Result<Box<dyn ActionExecutor>, PlatformError> {
    detect::require_x11()?;
    Ok(Box::new(X11Executor::new()?))
}
