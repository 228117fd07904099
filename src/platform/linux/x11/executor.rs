//! Input injection via the XTEST extension.
//!
//! Each action becomes one or more `FakeInput` requests followed by a round
//! trip, so `execute()` returns only after the server has processed them.
//! A chord's requests are sent back to back before that round trip.

use x11rb::protocol::xproto::{
    BUTTON_PRESS_EVENT, BUTTON_RELEASE_EVENT, KEY_PRESS_EVENT, KEY_RELEASE_EVENT,
    MOTION_NOTIFY_EVENT,
};
use x11rb::protocol::xtest::{self, ConnectionExt as _};

use super::super::keycodes::keycode_to_x11;
use super::{coord, sync, x11, Display};
use crate::platform::{
    Action, ActionExecutor, KeyCode, KeyState, MouseButton, PlatformError, Point,
};

/// `detail` of a motion request: 0 means absolute coordinates.
const ABSOLUTE: u8 = 0;
/// Core pointer device for `FakeInput`.
const CORE_DEVICE: u8 = 0;

pub struct X11Executor {
    display: Display,
}

impl X11Executor {
    pub fn new() -> Result<Self, PlatformError> {
        let display = Display::open(xtest::X11_EXTENSION_NAME)?;
        log::info!("executor: XTEST injection ready");
        Ok(Self { display })
    }

    fn fake(&self, kind: u8, detail: u8, at: Option<Point>) -> Result<(), PlatformError> {
        let (x, y) = at.map_or((0, 0), |p| (coord(p.x), coord(p.y)));
        self.display
            .conn
            .xtest_fake_input(kind, detail, 0, self.display.root, x, y, CORE_DEVICE)
            .map_err(x11)?;
        Ok(())
    }

    fn move_to(&self, at: Point) -> Result<(), PlatformError> {
        self.fake(MOTION_NOTIFY_EVENT, ABSOLUTE, Some(at))
    }

    fn tap_button(&self, detail: u8) -> Result<(), PlatformError> {
        self.fake(BUTTON_PRESS_EVENT, detail, None)?;
        self.fake(BUTTON_RELEASE_EVENT, detail, None)
    }

    fn key(&self, key: KeyCode, state: KeyState) -> Result<(), PlatformError> {
        let code = keycode_to_x11(key)
            .ok_or_else(|| PlatformError::Unsupported(format!("no X11 keycode for {key:?}")))?;
        let kind = match state {
            KeyState::Down => KEY_PRESS_EVENT,
            KeyState::Up => KEY_RELEASE_EVENT,
        };
        self.fake(kind, code, None)
    }
}

impl ActionExecutor for X11Executor {
    fn execute(&self, action: &Action) -> Result<(), PlatformError> {
        match action {
            Action::MoveTo(at) => self.move_to(*at)?,
            Action::Click { at, button } => {
                self.move_to(*at)?;
                self.tap_button(button_detail(*button))?;
            }
            Action::Scroll { at, amount } => {
                self.move_to(*at)?;
                let detail = if *amount > 0 { 4 } else { 5 };
                for _ in 0..amount.unsigned_abs() {
                    self.tap_button(detail)?;
                }
            }
            Action::Key { key, state } => self.key(*key, *state)?,
            Action::Chord(keys) => {
                // Resolve every key first so a bad key sends nothing.
                if let Some(key) = keys.iter().find(|k| keycode_to_x11(**k).is_none()) {
                    return Err(PlatformError::Unsupported(format!(
                        "no X11 keycode for {key:?}"
                    )));
                }
                for key in keys {
                    self.key(*key, KeyState::Down)?;
                }
                for key in keys.iter().rev() {
                    self.key(*key, KeyState::Up)?;
                }
            }
        }
        sync(&self.display.conn)?;
        log::debug!("executor: injected {action:?}");
        Ok(())
    }

    fn cursor_position(&self) -> Result<Point, PlatformError> {
        self.display.pointer()
    }
}

fn button_detail(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 1,
        MouseButton::Middle => 2,
        MouseButton::Right => 3,
        MouseButton::Other(n) => n,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
