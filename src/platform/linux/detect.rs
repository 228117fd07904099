//! Display server detection for Linux.
//!
//! Capture and injection both go through X11. The session type decides
//! whether that is possible and what the X11 connection can see.

use std::env;

use crate::platform::PlatformError;

/// What the current session offers to an X11 client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    /// Plain X11 session; every client is visible.
    X11,
    /// Wayland session with XWayland. Only XWayland clients receive
    /// injected input, and only their input is recorded.
    XWayland,
    /// Wayland without `DISPLAY`: no X server to talk to.
    WaylandOnly,
}

/// Detects the session type from `WAYLAND_DISPLAY` and `DISPLAY`.
///
/// Returns `None` outside any graphical session.
pub fn detect_display_server() -> Option<DisplayServer> {
    let set = |name| env::var_os(name).is_some_and(|v| !v.is_empty());
    classify_display(set("WAYLAND_DISPLAY"), set("DISPLAY"))
}

/// Classification without touching the process environment, for tests.
fn classify_display(has_wayland: bool, has_display: bool) -> Option<DisplayServer> {
    match (has_wayland, has_display) {
        (true, true) => Some(DisplayServer::XWayland),
        (true, false) => Some(DisplayServer::WaylandOnly),
        (false, true) => Some(DisplayServer::X11),
        (false, false) => None,
    }
}

/// Checks that an X11 connection is worth attempting, warning when the
/// session limits what it can reach.
pub fn require_x11() -> Result<(), PlatformError> {
    match detect_display_server() {
        Some(DisplayServer::X11) => Ok(()),
        Some(DisplayServer::XWayland) => {
            log::warn!(
                "capture: Wayland session detected; only XWayland applications \
                 are recorded and receive replayed input"
            );
            Ok(())
        }
        Some(DisplayServer::WaylandOnly) => Err(PlatformError::Unavailable(
            "Wayland sessions without XWayland are not supported (DISPLAY is not set)".into(),
        )),
        None => Err(PlatformError::Unavailable(
            "No display server detected.".into(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_only_detects_x11() {
        assert_eq!(classify_display(false, true), Some(DisplayServer::X11));
    }

    #[test]
    fn wayland_and_display_detects_xwayland() {
        assert_eq!(classify_display(true, true), Some(DisplayServer::XWayland));
    }

    #[test]
    fn wayland_without_display_is_wayland_only() {
        assert_eq!(
            classify_display(true, false),
            Some(DisplayServer::WaylandOnly)
        );
    }

    #[test]
    fn no_vars_returns_none() {
        assert_eq!(classify_display(false, false), None);
    }
}
