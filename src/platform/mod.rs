//! Platform abstraction layer.
//!
//! Defines the `InputCapture` and `ActionExecutor` traits and the value types
//! that cross them. Platform-specific implementations live in child modules;
//! the two factory functions at the bottom select the backend for the target OS.

mod keycode;

#[cfg(test)]
pub mod fake;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

use std::fmt;
use std::time::Instant;

pub use keycode::KeyCode;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The backend cannot run in this session (no display, missing extension).
    #[error("input backend unavailable: {0}")]
    Unavailable(String),
    /// The OS refused access (Accessibility permission, input group, ...).
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The backend has no way to perform the requested action.
    #[error("not supported by this backend: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// Screen position in physical pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Extra buttons (back/forward, ...) identified by their platform number.
    Other(u8),
}

impl MouseButton {
    /// Parses a button name as written in a recording.
    ///
    /// Accepts `left`/`right`/`middle` and the `Button.left` spelling used by
    /// older recordings. Anything else replays as a left click.
    pub fn from_recorded(name: &str) -> MouseButton {
        match name.strip_prefix("Button.").unwrap_or(name) {
            "right" => MouseButton::Right,
            "middle" => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseButton::Left => f.write_str("left"),
            MouseButton::Right => f.write_str("right"),
            MouseButton::Middle => f.write_str("middle"),
            MouseButton::Other(n) => write!(f, "button{n}"),
        }
    }
}

/// A key as reported by a capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKey {
    /// A key the backend's code table knows.
    Key(KeyCode),
    /// A native code with no `KeyCode` equivalent (media keys, OEM keys, ...).
    Unmapped(u32),
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawKey::Key(key) => write!(f, "{key:?}"),
            RawKey::Unmapped(code) => write!(f, "keycode:{code}"),
        }
    }
}

/// What happened, as seen by the capture hook.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureKind {
    Motion {
        at: Point,
    },
    Button {
        at: Point,
        button: MouseButton,
        pressed: bool,
    },
    /// Wheel notches; positive `dy` scrolls up, positive `dx` scrolls right.
    Scroll {
        at: Point,
        dx: i32,
        dy: i32,
    },
    Key {
        key: RawKey,
        state: KeyState,
    },
}

/// A captured input occurrence stamped with the instant the hook saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEvent {
    pub at: Instant,
    pub kind: CaptureKind,
}

impl CaptureEvent {
    pub fn now(kind: CaptureKind) -> Self {
        Self {
            at: Instant::now(),
            kind,
        }
    }
}

/// A single injection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    MoveTo(Point),
    /// Move to `at`, then press and release `button`.
    Click { at: Point, button: MouseButton },
    /// Vertical wheel notches at `at`; positive scrolls up.
    Scroll { at: Point, amount: i32 },
    Key { key: KeyCode, state: KeyState },
    /// Press every key in order, then release in reverse order, as one unit.
    Chord(Vec<KeyCode>),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

pub type CaptureCallback = Box<dyn Fn(CaptureEvent) + Send>;

/// Listen-only source of keyboard and mouse events.
///
/// `start()` installs the OS hook on a background thread and invokes
/// `callback` from that thread, serially, for every event. Physical input is
/// never suppressed. `stop()` is idempotent and must be safe on an unstarted
/// capture.
pub trait InputCapture {
    fn start(&mut self, callback: CaptureCallback) -> Result<(), PlatformError>;
    fn stop(&mut self) -> Result<(), PlatformError>;
    fn cursor_position(&self) -> Result<Point, PlatformError>;
}

/// Sink for synthetic input.
///
/// `execute()` is synchronous: when it returns, the OS has accepted the input.
/// Backends that cannot inject a chord atomically return
/// `PlatformError::Unsupported` for `Action::Chord`; callers fall back to
/// individual `Action::Key` events.
pub trait ActionExecutor {
    fn execute(&self, action: &Action) -> Result<(), PlatformError>;
    fn cursor_position(&self) -> Result<Point, PlatformError>;
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

#[cfg(target_os = "linux")]
pub use linux::{create_action_executor, create_input_capture};
#[cfg(target_os = "macos")]
pub use macos::{create_action_executor, create_input_capture};
#[cfg(target_os = "windows")]
pub use windows::{create_action_executor, create_input_capture};

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn create_input_capture() -> Result<Box<dyn InputCapture>, PlatformError> {
    Err(PlatformError::Unavailable(
        "no input capture backend for this OS".into(),
    ))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn create_action_executor() -> Result<Box<dyn ActionExecutor>, PlatformError> {
    Err(PlatformError::Unavailable(
        "no input injection backend for this OS".into(),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_button_names_parse() {
        assert_eq!(MouseButton::from_recorded("left"), MouseButton::Left);
        assert_eq!(MouseButton::from_recorded("right"), MouseButton::Right);
        assert_eq!(MouseButton::from_recorded("middle"), MouseButton::Middle);
    }

    #[test]
    fn legacy_button_spelling_is_accepted() {
        assert_eq!(MouseButton::from_recorded("Button.right"), MouseButton::Right);
        assert_eq!(MouseButton::from_recorded("Button.middle"), MouseButton::Middle);
    }

    #[test]
    fn unknown_button_replays_as_left() {
        assert_eq!(MouseButton::from_recorded("Button.x1"), MouseButton::Left);
        assert_eq!(MouseButton::from_recorded("button8"), MouseButton::Left);
        assert_eq!(MouseButton::from_recorded(""), MouseButton::Left);
    }

    #[test]
    fn button_display_matches_recorded_names() {
        assert_eq!(MouseButton::Left.to_string(), "left");
        assert_eq!(MouseButton::Middle.to_string(), "middle");
        assert_eq!(MouseButton::Other(8).to_string(), "button8");
    }

    #[test]
    fn raw_key_display() {
        assert_eq!(RawKey::Key(KeyCode::CapsLock).to_string(), "CapsLock");
        assert_eq!(RawKey::Unmapped(171).to_string(), "keycode:171");
    }
}
