//! Windows keyboard and mouse capture via low-level hooks.
//!
//! `WindowsCapture` implements `InputCapture`. `start()` spawns a background
//! thread that installs `WH_KEYBOARD_LL` and `WH_MOUSE_LL` and runs a
//! `GetMessageW` loop (required for low-level hooks to deliver events).
//! `stop()` posts `WM_QUIT` to that thread and joins it; the thread removes
//! both hooks on its way out.
//!
//! The hooks only listen: every event is handed on with `CallNextHookEx`.
//! Events carrying `LLKHF_INJECTED` / `LLMHF_INJECTED` (produced by
//! `SendInput`, including our own playback) are not reported.
//!
//! Low-level hook procs receive no `user_info` pointer, so the callback is
//! stored in a process-global `Mutex`. Only one `WindowsCapture` should be
//! active at a time.

use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use windows_sys::Win32::Foundation::{LPARAM, LRESULT, POINT, WPARAM};
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetCursorPos, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, LLKHF_EXTENDED, LLKHF_INJECTED,
    LLMHF_INJECTED, MSG, MSLLHOOKSTRUCT, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_KEYUP,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSEMOVE,
    WM_MOUSEWHEEL, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
    WM_XBUTTONDOWN, WM_XBUTTONUP,
};

use super::keycodes::vkcode_to_keycode;
use crate::platform::{
    CaptureCallback, CaptureEvent, CaptureKind, InputCapture, KeyState, MouseButton,
    PlatformError, Point, RawKey,
};

/// One wheel notch in `MSLLHOOKSTRUCT.mouseData` units.
const WHEEL_DELTA: i32 = 120;

// ---------------------------------------------------------------------------
// Process-global hook state
// ---------------------------------------------------------------------------

static HOOK_CALLBACK: Mutex<Option<CaptureCallback>> = Mutex::new(None);

/// Sub-notch wheel movement (precision touchpads) carried until it adds up
/// to a whole notch. Index 0 is vertical, 1 is horizontal.
static WHEEL_REMAINDER: [AtomicI32; 2] = [AtomicI32::new(0), AtomicI32::new(0)];

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

pub struct WindowsCapture {
    /// Thread ID of the message-loop thread; target of `PostThreadMessageW`.
    thread_id: u32,
    thread: Option<JoinHandle<()>>,
}

impl WindowsCapture {
    pub fn new() -> Self {
        Self {
            thread_id: 0,
            thread: None,
        }
    }
}

impl InputCapture for WindowsCapture {
    fn start(&mut self, callback: CaptureCallback) -> Result<(), PlatformError> {
        if self.thread.is_some() {
            return Err(PlatformError::Other("capture already started".into()));
        }
        {
            let mut guard = HOOK_CALLBACK
                .lock()
                .map_err(|_| PlatformError::Other("callback mutex poisoned".into()))?;
            *guard = Some(callback);
        }
        for remainder in &WHEEL_REMAINDER {
            remainder.store(0, Ordering::Relaxed);
        }

        let (info_tx, info_rx) = mpsc::channel::<Result<u32, PlatformError>>();

        let thread = thread::spawn(move || {
            let keyboard = unsafe {
                SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), ptr::null_mut(), 0)
            };
            if keyboard.is_null() {
                let _ = info_tx.send(Err(PlatformError::Other(
                    "SetWindowsHookExW(WH_KEYBOARD_LL) failed".into(),
                )));
                return;
            }
            let mouse =
                unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), ptr::null_mut(), 0) };
            if mouse.is_null() {
                unsafe { UnhookWindowsHookEx(keyboard) };
                let _ = info_tx.send(Err(PlatformError::Other(
                    "SetWindowsHookExW(WH_MOUSE_LL) failed".into(),
                )));
                return;
            }

            let _ = info_tx.send(Ok(unsafe { GetCurrentThreadId() }));
            log::info!("capture: WH_KEYBOARD_LL and WH_MOUSE_LL hooks active");

            // Returns 0 on WM_QUIT, -1 on error; both exit the loop.
            unsafe {
                let mut msg: MSG = std::mem::zeroed();
                while GetMessageW(&mut msg, ptr::null_mut(), 0, 0) > 0 {}
            }

            unhook(mouse);
            unhook(keyboard);
            log::info!("capture: message loop exited");
        });

        match info_rx.recv() {
            Ok(Ok(thread_id)) => {
                self.thread_id = thread_id;
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                clear_callback();
                Err(e)
            }
            Err(_) => {
                clear_callback();
                Err(PlatformError::Other(
                    "capture thread exited before reporting hook status".into(),
                ))
            }
        }
    }

    fn stop(&mut self) -> Result<(), PlatformError> {
        if self.thread_id != 0 {
            unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, 0, 0) };
            self.thread_id = 0;
        }
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| PlatformError::Other("capture thread panicked".into()))?;
        }
        // The hooks are gone once the thread has exited.
        clear_callback();
        Ok(())
    }

    fn cursor_position(&self) -> Result<Point, PlatformError> {
        cursor_position()
    }
}

impl Drop for WindowsCapture {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

pub(super) fn cursor_position() -> Result<Point, PlatformError> {
    let mut pt = POINT { x: 0, y: 0 };
    if unsafe { GetCursorPos(&mut pt) } == 0 {
        return Err(PlatformError::Other("GetCursorPos failed".into()));
    }
    Ok(Point::new(pt.x, pt.y))
}

fn unhook(hook: HHOOK) {
    if unsafe { UnhookWindowsHookEx(hook) } == 0 {
        log::warn!("capture: UnhookWindowsHookEx failed");
    }
}

fn clear_callback() {
    let _ = HOOK_CALLBACK.lock().map(|mut g| *g = None);
}

fn emit(kind: CaptureKind) {
    let event = CaptureEvent::now(kind);
    if let Ok(guard) = HOOK_CALLBACK.lock() {
        if let Some(cb) = guard.as_ref() {
            cb(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Hook procedures
// ---------------------------------------------------------------------------

unsafe extern "system" fn keyboard_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        let kb = &*(l_param as *const KBDLLHOOKSTRUCT);
        if kb.flags & LLKHF_INJECTED == 0 {
            if let Some(kind) = key_event(w_param as u32, kb.vkCode, kb.flags & LLKHF_EXTENDED != 0)
            {
                emit(kind);
            }
        }
    }
    CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param)
}

unsafe extern "system" fn mouse_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        let ms = &*(l_param as *const MSLLHOOKSTRUCT);
        if ms.flags & LLMHF_INJECTED == 0 {
            let at = Point::new(ms.pt.x, ms.pt.y);
            if let Some(kind) = mouse_event(w_param as u32, at, ms.mouseData) {
                emit(kind);
            }
        }
    }
    CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param)
}

fn key_event(message: u32, vk: u32, extended: bool) -> Option<CaptureKind> {
    let state = match message {
        WM_KEYDOWN | WM_SYSKEYDOWN => KeyState::Down,
        WM_KEYUP | WM_SYSKEYUP => KeyState::Up,
        _ => return None,
    };
    let key = u16::try_from(vk)
        .ok()
        .and_then(|vk| vkcode_to_keycode(vk, extended))
        .map_or(RawKey::Unmapped(vk), RawKey::Key);
    Some(CaptureKind::Key { key, state })
}

fn mouse_event(message: u32, at: Point, mouse_data: u32) -> Option<CaptureKind> {
    let button = |button, pressed| {
        Some(CaptureKind::Button {
            at,
            button,
            pressed,
        })
    };
    // XBUTTON1/XBUTTON2 in the high word; numbered like X11 buttons 8 and 9.
    let xbutton = || MouseButton::Other(high_word(mouse_data).clamp(1, 2) as u8 + 7);

    match message {
        WM_MOUSEMOVE => Some(CaptureKind::Motion { at }),
        WM_LBUTTONDOWN => button(MouseButton::Left, true),
        WM_LBUTTONUP => button(MouseButton::Left, false),
        WM_RBUTTONDOWN => button(MouseButton::Right, true),
        WM_RBUTTONUP => button(MouseButton::Right, false),
        WM_MBUTTONDOWN => button(MouseButton::Middle, true),
        WM_MBUTTONUP => button(MouseButton::Middle, false),
        WM_XBUTTONDOWN => button(xbutton(), true),
        WM_XBUTTONUP => button(xbutton(), false),
        WM_MOUSEWHEEL => {
            let dy = notches(&WHEEL_REMAINDER[0], high_word(mouse_data));
            (dy != 0).then_some(CaptureKind::Scroll { at, dx: 0, dy })
        }
        WM_MOUSEHWHEEL => {
            let dx = notches(&WHEEL_REMAINDER[1], high_word(mouse_data));
            (dx != 0).then_some(CaptureKind::Scroll { at, dx, dy: 0 })
        }
        _ => None,
    }
}

/// Signed high word of `mouseData` (wheel delta or X button number).
fn high_word(mouse_data: u32) -> i32 {
    i32::from((mouse_data >> 16) as u16 as i16)
}

/// Adds `delta` to the carried remainder and returns the whole notches.
fn notches(remainder: &AtomicI32, delta: i32) -> i32 {
    let total = remainder.load(Ordering::Relaxed) + delta;
    remainder.store(total % WHEEL_DELTA, Ordering::Relaxed);
    total / WHEEL_DELTA
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
