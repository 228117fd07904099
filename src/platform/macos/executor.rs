//! macOS action executor via CGEventPost.
//!
//! `MacOSExecutor` implements `ActionExecutor`. Each action creates one or
//! more `CGEvent`s, posts them at the session tap and releases them.
//! `CGEventPost` has no way to post several events as a unit, so
//! `Action::Chord` is reported as unsupported and callers send the keys one
//! by one.

use std::ffi::c_void;

use super::capture::CGPoint;
use super::keycodes::keycode_to_vkcode;
use crate::platform::{
    Action, ActionExecutor, KeyCode, KeyState, MouseButton, PlatformError, Point,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// kCGSessionEventTap: downstream of the HID-level capture tap, so injected
/// events are not recorded.
const CG_SESSION_EVENT_TAP: u32 = 1;

/// kCGEventSourceStateHIDSystemState
const CG_EVENT_SOURCE_STATE_HID_SYSTEM_STATE: i32 = 1;

/// kCGScrollEventUnitLine
const CG_SCROLL_EVENT_UNIT_LINE: u32 = 1;

// CGEventType values used for posting.
const LEFT_MOUSE_DOWN: u32 = 1;
const LEFT_MOUSE_UP: u32 = 2;
const RIGHT_MOUSE_DOWN: u32 = 3;
const RIGHT_MOUSE_UP: u32 = 4;
const MOUSE_MOVED: u32 = 5;
const OTHER_MOUSE_DOWN: u32 = 25;
const OTHER_MOUSE_UP: u32 = 26;

// ---------------------------------------------------------------------------
// Raw FFI
// ---------------------------------------------------------------------------

type CGEventRef = *mut c_void;
type CGEventSourceRef = *mut c_void;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn CGEventSourceCreate(state_id: i32) -> CGEventSourceRef;
    fn CGEventCreate(source: CGEventSourceRef) -> CGEventRef;
    fn CGEventGetLocation(event: CGEventRef) -> CGPoint;
    fn CGEventCreateKeyboardEvent(
        source: CGEventSourceRef,
        virtual_key: u16,
        key_down: bool,
    ) -> CGEventRef;
    fn CGEventCreateMouseEvent(
        source: CGEventSourceRef,
        mouse_type: u32,
        position: CGPoint,
        button: u32,
    ) -> CGEventRef;
    fn CGEventCreateScrollWheelEvent(
        source: CGEventSourceRef,
        units: u32,
        wheel_count: u32,
        wheel1: i32,
        ...
    ) -> CGEventRef;
    fn CGEventPost(tap_location: u32, event: CGEventRef);
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFRelease(cf: *const c_void);
}

/// Owns a CoreFoundation reference and releases it on drop.
struct CfOwned(*mut c_void);

impl CfOwned {
    fn new(ptr: *mut c_void, what: &str) -> Result<Self, PlatformError> {
        if ptr.is_null() {
            return Err(PlatformError::Other(format!("{what} returned null")));
        }
        Ok(Self(ptr))
    }
}

impl Drop for CfOwned {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0.cast_const()) };
    }
}

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

/// Stateless: no background thread is required.
pub struct MacOSExecutor;

impl MacOSExecutor {
    pub fn new() -> Self {
        MacOSExecutor
    }
}

impl ActionExecutor for MacOSExecutor {
    fn execute(&self, action: &Action) -> Result<(), PlatformError> {
        let started = std::time::Instant::now();
        if let Action::Chord(_) = action {
            return Err(PlatformError::Unsupported(
                "CGEventPost cannot post a chord atomically".into(),
            ));
        }
        let source = CfOwned::new(
            unsafe { CGEventSourceCreate(CG_EVENT_SOURCE_STATE_HID_SYSTEM_STATE) },
            "CGEventSourceCreate",
        )?;
        match action {
            Action::MoveTo(at) => post_mouse(&source, MOUSE_MOVED, *at, 0)?,
            Action::Click { at, button } => {
                let (down, up, number) = button_events(*button);
                post_mouse(&source, MOUSE_MOVED, *at, 0)?;
                post_mouse(&source, down, *at, number)?;
                post_mouse(&source, up, *at, number)?;
            }
            Action::Scroll { at, amount } => {
                post_mouse(&source, MOUSE_MOVED, *at, 0)?;
                let event = CfOwned::new(
                    unsafe {
                        CGEventCreateScrollWheelEvent(
                            source.0,
                            CG_SCROLL_EVENT_UNIT_LINE,
                            1,
                            *amount,
                        )
                    },
                    "CGEventCreateScrollWheelEvent",
                )?;
                unsafe { CGEventPost(CG_SESSION_EVENT_TAP, event.0) };
            }
            Action::Key { key, state } => post_key(&source, *key, *state)?,
            Action::Chord(_) => {}
        }
        log::debug!(
            "executor: injected {action:?} in {:.2}ms",
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    fn cursor_position(&self) -> Result<Point, PlatformError> {
        cursor_position()
    }
}

/// Reads the pointer location from an empty event, in global display
/// coordinates with the origin at the top-left of the main display.
pub(super) fn cursor_position() -> Result<Point, PlatformError> {
    let event = CfOwned::new(
        unsafe { CGEventCreate(std::ptr::null_mut()) },
        "CGEventCreate",
    )?;
    let at = unsafe { CGEventGetLocation(event.0) };
    Ok(Point::new(at.x.round() as i32, at.y.round() as i32))
}

fn post_mouse(
    source: &CfOwned,
    event_type: u32,
    at: Point,
    button: u32,
) -> Result<(), PlatformError> {
    let position = CGPoint {
        x: f64::from(at.x),
        y: f64::from(at.y),
    };
    let event = CfOwned::new(
        unsafe { CGEventCreateMouseEvent(source.0, event_type, position, button) },
        "CGEventCreateMouseEvent",
    )?;
    unsafe { CGEventPost(CG_SESSION_EVENT_TAP, event.0) };
    Ok(())
}

fn post_key(source: &CfOwned, key: KeyCode, state: KeyState) -> Result<(), PlatformError> {
    let vk = keycode_to_vkcode(key)
        .ok_or_else(|| PlatformError::Unsupported(format!("no macOS key code for {key:?}")))?;
    let event = CfOwned::new(
        unsafe { CGEventCreateKeyboardEvent(source.0, vk, state == KeyState::Down) },
        "CGEventCreateKeyboardEvent",
    )?;
    unsafe { CGEventPost(CG_SESSION_EVENT_TAP, event.0) };
    Ok(())
}

/// `(down type, up type, CGMouseButton)` for a button.
fn button_events(button: MouseButton) -> (u32, u32, u32) {
    match button {
        MouseButton::Left => (LEFT_MOUSE_DOWN, LEFT_MOUSE_UP, 0),
        MouseButton::Right => (RIGHT_MOUSE_DOWN, RIGHT_MOUSE_UP, 1),
        MouseButton::Middle => (OTHER_MOUSE_DOWN, OTHER_MOUSE_UP, 2),
        // X11-style 8 and 9 are CoreGraphics buttons 3 and 4.
        MouseButton::Other(n) => (
            OTHER_MOUSE_DOWN,
            OTHER_MOUSE_UP,
            u32::from(n.saturating_sub(5).max(3)),
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
