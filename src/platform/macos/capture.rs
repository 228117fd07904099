//! macOS keyboard and mouse capture via a listen-only CGEventTap.
//!
//! `MacOSCapture` implements `InputCapture`. `start()` creates the event tap
//! on the calling thread so that permission errors surface immediately, then
//! spawns a background thread that adds the tap to a CFRunLoop and drives it.
//!
//! The tap sits at the HID level with `kCGEventTapOptionListenOnly`: it
//! observes events and always hands them on. Events posted by the executor
//! enter at the session level, downstream of the tap, and are not seen.
//!
//! Memory ownership:
//!   The background thread owns the tap port (CFMachPortRef), the run loop
//!   source and the callback state (TapState). All three are released after
//!   `CFRunLoopRun` returns (i.e. after `stop()` completes).

use std::ffi::c_void;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use super::keycodes::{modifier_flag, vkcode_to_keycode};
use crate::platform::{
    CaptureCallback, CaptureEvent, CaptureKind, InputCapture, KeyState, MouseButton,
    PlatformError, Point, RawKey,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// CGEventType values.
const LEFT_MOUSE_DOWN: u32 = 1;
const LEFT_MOUSE_UP: u32 = 2;
const RIGHT_MOUSE_DOWN: u32 = 3;
const RIGHT_MOUSE_UP: u32 = 4;
const MOUSE_MOVED: u32 = 5;
const LEFT_MOUSE_DRAGGED: u32 = 6;
const RIGHT_MOUSE_DRAGGED: u32 = 7;
const KEY_DOWN: u32 = 10;
const KEY_UP: u32 = 11;
const FLAGS_CHANGED: u32 = 12;
const SCROLL_WHEEL: u32 = 22;
const OTHER_MOUSE_DOWN: u32 = 25;
const OTHER_MOUSE_UP: u32 = 26;
const OTHER_MOUSE_DRAGGED: u32 = 27;
const TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

const EVENT_MASK: u64 = (1 << LEFT_MOUSE_DOWN)
    | (1 << LEFT_MOUSE_UP)
    | (1 << RIGHT_MOUSE_DOWN)
    | (1 << RIGHT_MOUSE_UP)
    | (1 << MOUSE_MOVED)
    | (1 << LEFT_MOUSE_DRAGGED)
    | (1 << RIGHT_MOUSE_DRAGGED)
    | (1 << KEY_DOWN)
    | (1 << KEY_UP)
    | (1 << FLAGS_CHANGED)
    | (1 << SCROLL_WHEEL)
    | (1 << OTHER_MOUSE_DOWN)
    | (1 << OTHER_MOUSE_UP)
    | (1 << OTHER_MOUSE_DRAGGED);

// CGEventField values.
const MOUSE_EVENT_BUTTON_NUMBER: u32 = 3;
const KEYBOARD_EVENT_KEYCODE: u32 = 9;
const SCROLL_WHEEL_DELTA_AXIS_1: u32 = 11;
const SCROLL_WHEEL_DELTA_AXIS_2: u32 = 12;

/// kCGHIDEventTap
const CG_HID_EVENT_TAP: u32 = 0;
/// kCGHeadInsertEventTap
const CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
/// kCGEventTapOptionListenOnly
const CG_EVENT_TAP_OPTION_LISTEN_ONLY: u32 = 1;

// ---------------------------------------------------------------------------
// Raw FFI types and declarations
// ---------------------------------------------------------------------------

type CFMachPortRef = *mut c_void;
type CFRunLoopRef = *mut c_void;
type CFRunLoopSourceRef = *mut c_void;
type CFStringRef = *const c_void;
type CGEventRef = *mut c_void;
type CGEventTapProxy = *mut c_void;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(super) struct CGPoint {
    pub x: f64,
    pub y: f64,
}

type CGEventTapCallBack = unsafe extern "C" fn(
    proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: CGEventTapCallBack,
        user_info: *mut c_void,
    ) -> CFMachPortRef;
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
    fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;
    fn CGEventGetFlags(event: CGEventRef) -> u64;
    fn CGEventGetLocation(event: CGEventRef) -> CGPoint;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortCreateRunLoopSource(
        allocator: *mut c_void,
        port: CFMachPortRef,
        order: isize,
    ) -> CFRunLoopSourceRef;
    fn CFRunLoopGetCurrent() -> CFRunLoopRef;
    fn CFRunLoopAddSource(rl: CFRunLoopRef, source: CFRunLoopSourceRef, mode: CFStringRef);
    fn CFRunLoopRun();
    fn CFRunLoopStop(rl: CFRunLoopRef);
    fn CFRelease(cf: *const c_void);
    static kCFRunLoopDefaultMode: CFStringRef;
}

// ---------------------------------------------------------------------------
// Thread-safety wrappers for raw pointers
// ---------------------------------------------------------------------------

/// CFRunLoopStop may be called from any thread.
struct SendableRunLoop(CFRunLoopRef);
unsafe impl Send for SendableRunLoop {}

/// Tap port and callback state, handed to the run loop thread which becomes
/// their sole owner.
struct TapHandoff(CFMachPortRef, *mut TapState);
unsafe impl Send for TapHandoff {}

// ---------------------------------------------------------------------------
// Callback state
// ---------------------------------------------------------------------------

/// Passed to the C callback through `user_info`. Lives (via `Box::into_raw`)
/// until the run loop thread reclaims it.
struct TapState {
    callback: CaptureCallback,
    /// Needed to re-enable the tap after the system disables it.
    tap: CFMachPortRef,
}

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

pub struct MacOSCapture {
    run_loop: Option<SendableRunLoop>,
    thread: Option<JoinHandle<()>>,
}

impl MacOSCapture {
    pub fn new() -> Self {
        Self {
            run_loop: None,
            thread: None,
        }
    }
}

impl InputCapture for MacOSCapture {
    fn start(&mut self, callback: CaptureCallback) -> Result<(), PlatformError> {
        if self.run_loop.is_some() {
            return Err(PlatformError::Other("capture is already running".into()));
        }

        if !unsafe { AXIsProcessTrusted() } {
            return Err(PlatformError::PermissionDenied(
                "Accessibility permission required. \
                 Grant it in System Settings > Privacy & Security > Accessibility."
                    .into(),
            ));
        }

        let state_ptr = Box::into_raw(Box::new(TapState {
            callback,
            tap: std::ptr::null_mut(),
        }));

        let tap_port = unsafe {
            CGEventTapCreate(
                CG_HID_EVENT_TAP,
                CG_HEAD_INSERT_EVENT_TAP,
                CG_EVENT_TAP_OPTION_LISTEN_ONLY,
                EVENT_MASK,
                event_tap_callback,
                state_ptr.cast::<c_void>(),
            )
        };

        if tap_port.is_null() {
            drop(unsafe { Box::from_raw(state_ptr) });
            return Err(PlatformError::PermissionDenied(
                "CGEventTapCreate returned null. \
                 Verify Accessibility (and Input Monitoring) permission is active."
                    .into(),
            ));
        }
        // No events are delivered before the tap joins a run loop.
        unsafe { (*state_ptr).tap = tap_port };

        let handoff = TapHandoff(tap_port, state_ptr);
        let (rl_tx, rl_rx) = mpsc::channel::<SendableRunLoop>();

        let thread = thread::spawn(move || {
            let TapHandoff(tap_port, state_ptr) = handoff;
            unsafe {
                let source = CFMachPortCreateRunLoopSource(std::ptr::null_mut(), tap_port, 0);
                let run_loop = CFRunLoopGetCurrent();
                CFRunLoopAddSource(run_loop, source, kCFRunLoopDefaultMode);
                // The run loop retains the source.
                CFRelease(source.cast::<c_void>());

                CGEventTapEnable(tap_port, true);
                log::info!("capture: CGEventTap active (listen-only)");
                let _ = rl_tx.send(SendableRunLoop(run_loop));

                CFRunLoopRun();

                log::info!("capture: CFRunLoop exited");
                CGEventTapEnable(tap_port, false);
                CFRelease(tap_port.cast::<c_void>());
                drop(Box::from_raw(state_ptr));
            }
        });

        match rl_rx.recv() {
            Ok(rl) => {
                self.run_loop = Some(rl);
                self.thread = Some(thread);
                Ok(())
            }
            Err(_) => {
                let _ = thread.join();
                Err(PlatformError::Other(
                    "background thread exited before run loop was ready".into(),
                ))
            }
        }
    }

    fn stop(&mut self) -> Result<(), PlatformError> {
        if let Some(SendableRunLoop(rl)) = self.run_loop.take() {
            unsafe { CFRunLoopStop(rl) };
        }
        if let Some(t) = self.thread.take() {
            t.join()
                .map_err(|_| PlatformError::Other("capture thread panicked".into()))?;
        }
        Ok(())
    }

    fn cursor_position(&self) -> Result<Point, PlatformError> {
        super::executor::cursor_position()
    }
}

impl Drop for MacOSCapture {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ---------------------------------------------------------------------------
// C callback
// ---------------------------------------------------------------------------

/// Runs on the run loop thread for every tapped event. Always returns the
/// event untouched.
unsafe extern "C" fn event_tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    let state = &*(user_info as *const TapState);

    if matches!(
        event_type,
        TAP_DISABLED_BY_TIMEOUT | TAP_DISABLED_BY_USER_INPUT
    ) {
        log::warn!("capture: event tap was disabled by the system, re-enabling");
        CGEventTapEnable(state.tap, true);
        return event;
    }

    let at = CGEventGetLocation(event);
    let fields = Fields {
        at: Point::new(at.x.round() as i32, at.y.round() as i32),
        keycode: CGEventGetIntegerValueField(event, KEYBOARD_EVENT_KEYCODE),
        button: CGEventGetIntegerValueField(event, MOUSE_EVENT_BUTTON_NUMBER),
        flags: CGEventGetFlags(event),
        scroll: (
            CGEventGetIntegerValueField(event, SCROLL_WHEEL_DELTA_AXIS_2),
            CGEventGetIntegerValueField(event, SCROLL_WHEEL_DELTA_AXIS_1),
        ),
    };
    if let Some(kind) = classify(event_type, &fields) {
        (state.callback)(CaptureEvent::now(kind));
    }
    event
}

/// The parts of a CGEvent the classifier reads.
struct Fields {
    at: Point,
    keycode: i64,
    button: i64,
    flags: u64,
    /// `(horizontal, vertical)` line deltas.
    scroll: (i64, i64),
}

fn classify(event_type: u32, f: &Fields) -> Option<CaptureKind> {
    let at = f.at;
    let button = |button, pressed| {
        Some(CaptureKind::Button {
            at,
            button,
            pressed,
        })
    };
    match event_type {
        MOUSE_MOVED | LEFT_MOUSE_DRAGGED | RIGHT_MOUSE_DRAGGED | OTHER_MOUSE_DRAGGED => {
            Some(CaptureKind::Motion { at })
        }
        LEFT_MOUSE_DOWN => button(MouseButton::Left, true),
        LEFT_MOUSE_UP => button(MouseButton::Left, false),
        RIGHT_MOUSE_DOWN => button(MouseButton::Right, true),
        RIGHT_MOUSE_UP => button(MouseButton::Right, false),
        OTHER_MOUSE_DOWN => button(other_button(f.button), true),
        OTHER_MOUSE_UP => button(other_button(f.button), false),
        SCROLL_WHEEL => {
            let (dx, dy) = (clamp(f.scroll.0), clamp(f.scroll.1));
            (dx != 0 || dy != 0).then_some(CaptureKind::Scroll { at, dx, dy })
        }
        KEY_DOWN | KEY_UP => {
            let state = if event_type == KEY_DOWN {
                KeyState::Down
            } else {
                KeyState::Up
            };
            Some(CaptureKind::Key {
                key: raw_key(f.keycode),
                state,
            })
        }
        FLAGS_CHANGED => {
            let key = raw_key(f.keycode);
            // The fn key and other unknown flag keys carry no usable state.
            let RawKey::Key(code) = key else {
                return None;
            };
            let flag = modifier_flag(code)?;
            let state = if f.flags & flag != 0 {
                KeyState::Down
            } else {
                KeyState::Up
            };
            Some(CaptureKind::Key { key, state })
        }
        _ => None,
    }
}

fn raw_key(keycode: i64) -> RawKey {
    u16::try_from(keycode)
        .ok()
        .and_then(vkcode_to_keycode)
        .map_or(RawKey::Unmapped(keycode as u32), RawKey::Key)
}

/// Button 2 is the middle button; 3 and 4 (back, forward) are numbered
/// like X11 buttons 8 and 9.
fn other_button(number: i64) -> MouseButton {
    match number {
        2 => MouseButton::Middle,
        n => MouseButton::Other(u8::try_from(n + 5).unwrap_or(u8::MAX)),
    }
}

fn clamp(v: i64) -> i32 {
    v.clamp(i32::MIN.into(), i32::MAX.into()) as i32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::KeyCode;

    fn fields() -> Fields {
        Fields {
            at: Point::new(100, 200),
            keycode: 0,
            button: 0,
            flags: 0,
            scroll: (0, 0),
        }
    }

    #[test]
    fn new_produces_idle_state() {
        let capture = MacOSCapture::new();
        assert!(capture.run_loop.is_none());
        assert!(capture.thread.is_none());
    }

    /// Stopping a capture that was never started must return Ok and not panic.
    #[test]
    fn stop_on_unstarted_capture_is_noop() {
        let mut capture = MacOSCapture::new();
        assert!(capture.stop().is_ok());
    }

    #[test]
    fn drags_are_motion() {
        assert_eq!(
            classify(LEFT_MOUSE_DRAGGED, &fields()),
            Some(CaptureKind::Motion {
                at: Point::new(100, 200)
            })
        );
    }

    #[test]
    fn other_buttons_use_their_number() {
        let f = Fields {
            button: 2,
            ..fields()
        };
        assert!(matches!(
            classify(OTHER_MOUSE_DOWN, &f),
            Some(CaptureKind::Button {
                button: MouseButton::Middle,
                pressed: true,
                ..
            })
        ));
        assert_eq!(other_button(3), MouseButton::Other(8));
    }

    #[test]
    fn flags_changed_reads_press_from_flag_bit() {
        let down = Fields {
            keycode: 0x37,
            flags: 0x0010_0000,
            ..fields()
        };
        assert_eq!(
            classify(FLAGS_CHANGED, &down),
            Some(CaptureKind::Key {
                key: RawKey::Key(KeyCode::Meta),
                state: KeyState::Down
            })
        );
        let up = Fields {
            keycode: 0x37,
            ..fields()
        };
        assert!(matches!(
            classify(FLAGS_CHANGED, &up),
            Some(CaptureKind::Key {
                state: KeyState::Up,
                ..
            })
        ));
        // fn key
        let function = Fields {
            keycode: 0x3F,
            ..fields()
        };
        assert_eq!(classify(FLAGS_CHANGED, &function), None);
    }

    #[test]
    fn scroll_reports_line_deltas() {
        let f = Fields {
            scroll: (0, -3),
            ..fields()
        };
        assert_eq!(
            classify(SCROLL_WHEEL, &f),
            Some(CaptureKind::Scroll {
                at: Point::new(100, 200),
                dx: 0,
                dy: -3
            })
        );
        assert_eq!(classify(SCROLL_WHEEL, &fields()), None);
    }

    #[test]
    fn unknown_keys_keep_their_code() {
        let f = Fields {
            keycode: 0x41,
            ..fields()
        };
        assert_eq!(
            classify(KEY_UP, &f),
            Some(CaptureKind::Key {
                key: RawKey::Unmapped(0x41),
                state: KeyState::Up
            })
        );
    }
}
