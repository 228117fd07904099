//! Keyboard and mouse capture via the X RECORD extension.
//!
//! `start()` creates a RECORD context for core device events
//! (KeyPress..MotionNotify) from all clients on the control connection, then
//! enables it on the data connection inside a background thread. The enable
//! request answers with a stream of replies, one per batch of intercepted
//! events, until the context is disabled. Recording is passive: events still
//! reach their windows unchanged.

use std::thread::{self, JoinHandle};

use x11rb::connection::Connection;
use x11rb::protocol::record::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    ButtonPressEvent, KeyPressEvent, MotionNotifyEvent, BUTTON_PRESS_EVENT,
    BUTTON_RELEASE_EVENT, KEY_PRESS_EVENT, KEY_RELEASE_EVENT, MOTION_NOTIFY_EVENT,
};
use x11rb::x11_utils::TryParse;

use super::super::keycodes::x11_to_keycode;
use super::{sync, x11, Display};
use crate::platform::{
    CaptureCallback, CaptureEvent, CaptureKind, InputCapture, KeyState, MouseButton,
    PlatformError, Point, RawKey,
};

/// RECORD reply category for intercepted server-to-client data.
const FROM_SERVER: u8 = 0;
/// Every core event on the wire is 32 bytes.
const EVENT_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

pub struct X11Capture {
    ctrl: Display,
    context: Option<record::Context>,
    thread: Option<JoinHandle<()>>,
}

impl X11Capture {
    pub fn new() -> Result<Self, PlatformError> {
        let ctrl = Display::open(record::X11_EXTENSION_NAME)?;
        Ok(Self {
            ctrl,
            context: None,
            thread: None,
        })
    }
}

impl InputCapture for X11Capture {
    fn start(&mut self, callback: CaptureCallback) -> Result<(), PlatformError> {
        if self.thread.is_some() {
            return Err(PlatformError::Other("capture already started".into()));
        }
        let data = Display::open(record::X11_EXTENSION_NAME)?;
        let conn = &self.ctrl.conn;

        let context = conn.generate_id().map_err(x11)?;
        let range = record::Range {
            core_requests: record::Range8 { first: 0, last: 0 },
            core_replies: record::Range8 { first: 0, last: 0 },
            ext_requests: record::ExtRange {
                major: record::Range8 { first: 0, last: 0 },
                minor: record::Range16 { first: 0, last: 0 },
            },
            ext_replies: record::ExtRange {
                major: record::Range8 { first: 0, last: 0 },
                minor: record::Range16 { first: 0, last: 0 },
            },
            delivered_events: record::Range8 { first: 0, last: 0 },
            device_events: record::Range8 {
                first: KEY_PRESS_EVENT,
                last: MOTION_NOTIFY_EVENT,
            },
            errors: record::Range8 { first: 0, last: 0 },
            client_started: false,
            client_died: false,
        };
        conn.record_create_context(context, 0, &[record::CS::ALL_CLIENTS.into()], &[range])
            .map_err(x11)?;
        sync(conn)?;

        self.thread = Some(thread::spawn(move || {
            if let Err(e) = record_loop(&data, context, &callback) {
                log::error!("capture: RECORD stream ended: {e}");
            }
            log::info!("capture: RECORD stream closed");
        }));
        self.context = Some(context);
        log::info!("capture: RECORD context {context:#x} enabled");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlatformError> {
        let Some(context) = self.context.take() else {
            return Ok(());
        };
        let conn = &self.ctrl.conn;
        // Ends the reply stream on the data connection.
        conn.record_disable_context(context).map_err(x11)?;
        sync(conn)?;

        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| PlatformError::Other("capture thread panicked".into()))?;
        }
        conn.record_free_context(context).map_err(x11)?;
        conn.flush().map_err(x11)?;
        Ok(())
    }

    fn cursor_position(&self) -> Result<Point, PlatformError> {
        self.ctrl.pointer()
    }
}

impl Drop for X11Capture {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ---------------------------------------------------------------------------
// Record loop
// ---------------------------------------------------------------------------

fn record_loop(
    data: &Display,
    context: record::Context,
    callback: &CaptureCallback,
) -> Result<(), PlatformError> {
    for reply in data.conn.record_enable_context(context).map_err(x11)? {
        let reply = reply.map_err(x11)?;
        if reply.category != FROM_SERVER {
            continue;
        }
        for raw in reply.data.chunks_exact(EVENT_SIZE) {
            match parse_event(raw) {
                Some(kind) => callback(CaptureEvent::now(kind)),
                None => log::trace!("capture: skipping event type {}", raw[0] & 0x7f),
            }
        }
    }
    Ok(())
}

/// Decodes one wire event into a capture kind. Button releases of the
/// wheel buttons (4..=7) are dropped; their presses become scroll notches.
fn parse_event(raw: &[u8]) -> Option<CaptureKind> {
    match raw.first()? & 0x7f {
        code @ (KEY_PRESS_EVENT | KEY_RELEASE_EVENT) => {
            let (event, _) = KeyPressEvent::try_parse(raw).ok()?;
            let state = if code == KEY_PRESS_EVENT {
                KeyState::Down
            } else {
                KeyState::Up
            };
            let key = x11_to_keycode(event.detail)
                .map_or(RawKey::Unmapped(event.detail.into()), RawKey::Key);
            Some(CaptureKind::Key { key, state })
        }
        code @ (BUTTON_PRESS_EVENT | BUTTON_RELEASE_EVENT) => {
            let (event, _) = ButtonPressEvent::try_parse(raw).ok()?;
            let at = Point::new(event.root_x.into(), event.root_y.into());
            let pressed = code == BUTTON_PRESS_EVENT;
            button_event(event.detail, at, pressed)
        }
        MOTION_NOTIFY_EVENT => {
            let (event, _) = MotionNotifyEvent::try_parse(raw).ok()?;
            Some(CaptureKind::Motion {
                at: Point::new(event.root_x.into(), event.root_y.into()),
            })
        }
        _ => None,
    }
}

fn button_event(detail: u8, at: Point, pressed: bool) -> Option<CaptureKind> {
    let scroll = |dx, dy| pressed.then_some(CaptureKind::Scroll { at, dx, dy });
    let button = match detail {
        1 => MouseButton::Left,
        2 => MouseButton::Middle,
        3 => MouseButton::Right,
        4 => return scroll(0, 1),
        5 => return scroll(0, -1),
        6 => return scroll(-1, 0),
        7 => return scroll(1, 0),
        n => MouseButton::Other(n),
    };
    Some(CaptureKind::Button {
        at,
        button,
        pressed,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::KeyCode;

    /// Builds a core input event as it appears on the wire (native byte order).
    fn wire(code: u8, detail: u8, root_x: i16, root_y: i16) -> [u8; EVENT_SIZE] {
        let mut raw = [0u8; EVENT_SIZE];
        raw[0] = code;
        raw[1] = detail;
        raw[20..22].copy_from_slice(&root_x.to_ne_bytes());
        raw[22..24].copy_from_slice(&root_y.to_ne_bytes());
        raw
    }

    #[test]
    fn key_events_use_evdev_offset() {
        assert_eq!(
            parse_event(&wire(KEY_PRESS_EVENT, 38, 0, 0)),
            Some(CaptureKind::Key {
                key: RawKey::Key(KeyCode::A),
                state: KeyState::Down
            })
        );
        assert_eq!(
            parse_event(&wire(KEY_RELEASE_EVENT, 121, 0, 0)),
            Some(CaptureKind::Key {
                key: RawKey::Unmapped(121),
                state: KeyState::Up
            })
        );
    }

    #[test]
    fn motion_reports_root_coordinates() {
        assert_eq!(
            parse_event(&wire(MOTION_NOTIFY_EVENT, 0, 640, 480)),
            Some(CaptureKind::Motion {
                at: Point::new(640, 480)
            })
        );
    }

    #[test]
    fn button_events_map_physical_buttons() {
        assert_eq!(
            parse_event(&wire(BUTTON_PRESS_EVENT, 3, 10, 20)),
            Some(CaptureKind::Button {
                at: Point::new(10, 20),
                button: MouseButton::Right,
                pressed: true
            })
        );
        assert_eq!(
            parse_event(&wire(BUTTON_RELEASE_EVENT, 8, 10, 20)),
            Some(CaptureKind::Button {
                at: Point::new(10, 20),
                button: MouseButton::Other(8),
                pressed: false
            })
        );
    }

    #[test]
    fn wheel_buttons_become_scroll_notches() {
        let at = Point::new(5, 5);
        assert_eq!(
            button_event(4, at, true),
            Some(CaptureKind::Scroll { at, dx: 0, dy: 1 })
        );
        assert_eq!(
            button_event(5, at, true),
            Some(CaptureKind::Scroll { at, dx: 0, dy: -1 })
        );
        assert_eq!(
            button_event(7, at, true),
            Some(CaptureKind::Scroll { at, dx: 1, dy: 0 })
        );
        assert_eq!(button_event(4, at, false), None);
    }

    #[test]
    fn sent_event_bit_is_ignored() {
        assert!(matches!(
            parse_event(&wire(MOTION_NOTIFY_EVENT | 0x80, 0, 1, 2)),
            Some(CaptureKind::Motion { .. })
        ));
    }
}
