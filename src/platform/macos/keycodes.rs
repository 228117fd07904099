//! macOS virtual key code (CGKeyCode, u16) <-> KeyCode mapping.
//!
//! Key codes are physical key positions per Apple HIToolbox/Events.h.
//! They are layout-independent: this mapping assumes an ANSI keyboard.
//!
//! Lookups take the first matching entry, so left-hand modifiers come
//! before their right-hand twins, and F13-F15 before the PrintScreen,
//! ScrollLock and Pause keys that share their codes.

use crate::platform::KeyCode;

#[rustfmt::skip]
const KEYS: &[(u16, KeyCode)] = &[
    (0x00, KeyCode::A), (0x0B, KeyCode::B), (0x08, KeyCode::C), (0x02, KeyCode::D),
    (0x0E, KeyCode::E), (0x03, KeyCode::F), (0x05, KeyCode::G), (0x04, KeyCode::H),
    (0x22, KeyCode::I), (0x26, KeyCode::J), (0x28, KeyCode::K), (0x25, KeyCode::L),
    (0x2E, KeyCode::M), (0x2D, KeyCode::N), (0x1F, KeyCode::O), (0x23, KeyCode::P),
    (0x0C, KeyCode::Q), (0x0F, KeyCode::R), (0x01, KeyCode::S), (0x11, KeyCode::T),
    (0x20, KeyCode::U), (0x09, KeyCode::V), (0x0D, KeyCode::W), (0x07, KeyCode::X),
    (0x10, KeyCode::Y), (0x06, KeyCode::Z),

    (0x1D, KeyCode::Key0), (0x12, KeyCode::Key1), (0x13, KeyCode::Key2),
    (0x14, KeyCode::Key3), (0x15, KeyCode::Key4), (0x17, KeyCode::Key5),
    (0x16, KeyCode::Key6), (0x1A, KeyCode::Key7), (0x1C, KeyCode::Key8),
    (0x19, KeyCode::Key9),

    (0x7A, KeyCode::F1), (0x78, KeyCode::F2), (0x63, KeyCode::F3), (0x76, KeyCode::F4),
    (0x60, KeyCode::F5), (0x61, KeyCode::F6), (0x62, KeyCode::F7), (0x64, KeyCode::F8),
    (0x65, KeyCode::F9), (0x6D, KeyCode::F10), (0x67, KeyCode::F11), (0x6F, KeyCode::F12),
    (0x69, KeyCode::F13), (0x6B, KeyCode::F14), (0x71, KeyCode::F15), (0x6A, KeyCode::F16),
    (0x40, KeyCode::F17), (0x4F, KeyCode::F18), (0x50, KeyCode::F19), (0x5A, KeyCode::F20),
    (0x69, KeyCode::PrintScreen), (0x6B, KeyCode::ScrollLock), (0x71, KeyCode::Pause),

    (0x3B, KeyCode::Ctrl), (0x3E, KeyCode::Ctrl),
    (0x38, KeyCode::Shift), (0x3C, KeyCode::Shift),
    (0x3A, KeyCode::Alt), (0x3D, KeyCode::Alt),       // Option
    (0x37, KeyCode::Meta), (0x36, KeyCode::Meta),     // Command

    (0x31, KeyCode::Space), (0x24, KeyCode::Enter), (0x30, KeyCode::Tab),
    (0x35, KeyCode::Escape),
    (0x33, KeyCode::Backspace),   // kVK_Delete
    (0x75, KeyCode::Delete),      // kVK_ForwardDelete
    (0x72, KeyCode::Insert),      // kVK_Help
    (0x73, KeyCode::Home), (0x77, KeyCode::End), (0x74, KeyCode::PageUp),
    (0x79, KeyCode::PageDown), (0x7E, KeyCode::Up), (0x7D, KeyCode::Down),
    (0x7B, KeyCode::Left), (0x7C, KeyCode::Right),

    (0x39, KeyCode::CapsLock),
    (0x47, KeyCode::NumLock),     // kVK_ANSI_KeypadClear

    (0x52, KeyCode::Numpad0), (0x53, KeyCode::Numpad1), (0x54, KeyCode::Numpad2),
    (0x55, KeyCode::Numpad3), (0x56, KeyCode::Numpad4), (0x57, KeyCode::Numpad5),
    (0x58, KeyCode::Numpad6), (0x59, KeyCode::Numpad7), (0x5B, KeyCode::Numpad8),
    (0x5C, KeyCode::Numpad9), (0x45, KeyCode::NumpadAdd), (0x4E, KeyCode::NumpadSub),
    (0x43, KeyCode::NumpadMul), (0x4B, KeyCode::NumpadDiv), (0x4C, KeyCode::NumpadEnter),

    (0x32, KeyCode::Backtick), (0x1B, KeyCode::Minus), (0x18, KeyCode::Equal),
    (0x21, KeyCode::LeftBracket), (0x1E, KeyCode::RightBracket), (0x2A, KeyCode::Backslash),
    (0x29, KeyCode::Semicolon), (0x27, KeyCode::Apostrophe), (0x2B, KeyCode::Comma),
    (0x2F, KeyCode::Period), (0x2C, KeyCode::Slash),
];

/// Converts a CGKeyCode to a `KeyCode`. `None` for media keys, keypad
/// decimal and other unmapped codes.
pub fn vkcode_to_keycode(vk: u16) -> Option<KeyCode> {
    KEYS.iter().find(|&&(code, _)| code == vk).map(|&(_, key)| key)
}

/// Converts a `KeyCode` to a CGKeyCode. `None` for F21-F24, which have no
/// macOS key code.
pub fn keycode_to_vkcode(key: KeyCode) -> Option<u16> {
    KEYS.iter().find(|&&(_, k)| k == key).map(|&(code, _)| code)
}

/// The `CGEventFlags` bit that is set while `key` is down. Modifier keys
/// arrive as FlagsChanged events; this bit tells a press from a release.
pub fn modifier_flag(key: KeyCode) -> Option<u64> {
    match key {
        KeyCode::CapsLock => Some(0x0001_0000),
        KeyCode::Shift => Some(0x0002_0000),
        KeyCode::Ctrl => Some(0x0004_0000),
        KeyCode::Alt => Some(0x0008_0000),
        KeyCode::Meta => Some(0x0010_0000),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
