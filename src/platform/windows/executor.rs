//! Windows action executor via SendInput.
//!
//! `WindowsExecutor` implements `ActionExecutor`. Injection is synchronous:
//! `SendInput` returns after the events are queued. Each action becomes one
//! `SendInput` call, so a chord's presses and releases reach the input
//! queue as a single uninterrupted run.

use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_KEYUP,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL, MOUSEEVENTF_XDOWN,
    MOUSEEVENTF_XUP, MOUSEINPUT,
};
use windows_sys::Win32::UI::WindowsAndMessaging::SetCursorPos;

use super::keycodes::keycode_to_vkcode;
use crate::platform::{
    Action, ActionExecutor, KeyCode, KeyState, MouseButton, PlatformError, Point,
};

const WHEEL_DELTA: i32 = 120;

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

/// Injects mouse and keyboard events via SendInput on Windows.
///
/// Stateless; no background thread is required.
pub struct WindowsExecutor;

impl WindowsExecutor {
    pub fn new() -> Self {
        WindowsExecutor
    }
}

impl ActionExecutor for WindowsExecutor {
    fn execute(&self, action: &Action) -> Result<(), PlatformError> {
        let started = std::time::Instant::now();
        match action {
            Action::MoveTo(at) => move_to(*at)?,
            Action::Click { at, button } => {
                move_to(*at)?;
                let (down, up, data) = button_flags(*button);
                send(&[mouse_input(down, data), mouse_input(up, data)])?;
            }
            Action::Scroll { at, amount } => {
                move_to(*at)?;
                let delta = amount.saturating_mul(WHEEL_DELTA);
                // mouseData is a DWORD carrying a signed delta.
                send(&[mouse_input(MOUSEEVENTF_WHEEL, delta as u32)])?;
            }
            Action::Key { key, state } => send(&[key_input(*key, *state)?])?,
            Action::Chord(keys) => {
                let mut inputs = Vec::with_capacity(keys.len() * 2);
                for key in keys {
                    inputs.push(key_input(*key, KeyState::Down)?);
                }
                for key in keys.iter().rev() {
                    inputs.push(key_input(*key, KeyState::Up)?);
                }
                send(&inputs)?;
            }
        }
        log::debug!(
            "executor: injected {action:?} in {:.2}ms",
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    fn cursor_position(&self) -> Result<Point, PlatformError> {
        super::capture::cursor_position()
    }
}

fn move_to(at: Point) -> Result<(), PlatformError> {
    if unsafe { SetCursorPos(at.x, at.y) } == 0 {
        return Err(PlatformError::Other(format!(
            "SetCursorPos({}, {}) failed",
            at.x, at.y
        )));
    }
    Ok(())
}

/// `(down flags, up flags, mouseData)` for a button.
fn button_flags(button: MouseButton) -> (u32, u32, u32) {
    match button {
        MouseButton::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, 0),
        MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, 0),
        MouseButton::Middle => (MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, 0),
        // Buttons 8 and 9 are XBUTTON1 and XBUTTON2.
        MouseButton::Other(n) => (
            MOUSEEVENTF_XDOWN,
            MOUSEEVENTF_XUP,
            u32::from(n.saturating_sub(7).clamp(1, 2)),
        ),
    }
}

fn mouse_input(flags: u32, data: u32) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: data,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn key_input(key: KeyCode, state: KeyState) -> Result<INPUT, PlatformError> {
    let (vk, mut flags) = keycode_to_vkcode(key)
        .ok_or_else(|| PlatformError::Unsupported(format!("no virtual key for {key:?}")))?;
    if state == KeyState::Up {
        flags |= KEYEVENTF_KEYUP;
    }
    Ok(INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    })
}

fn send(inputs: &[INPUT]) -> Result<(), PlatformError> {
    let count = u32::try_from(inputs.len())
        .map_err(|_| PlatformError::Other("too many inputs for one SendInput".into()))?;
    let sent = unsafe {
        SendInput(
            count,
            inputs.as_ptr(),
            std::mem::size_of::<INPUT>() as i32,
        )
    };
    if sent != count {
        // UIPI blocks injection into elevated windows without an error code.
        return Err(PlatformError::PermissionDenied(format!(
            "SendInput accepted {sent} of {count} events"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
