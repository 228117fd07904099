//! Windows virtual key code (u16) <-> KeyCode mapping.
//!
//! VK codes are from the Windows SDK (winuser.h). Letters, digits and F-keys
//! are contiguous ranges; everything else is listed in `KEYS`. When a key
//! appears more than once (left/right modifiers) the first entry is the one
//! injected.

use crate::platform::KeyCode;

/// `KEYEVENTF_EXTENDEDKEY`, set in `KEYBDINPUT.dwFlags` for extended keys.
pub const EXTENDED: u32 = 0x0001;

const VK_RETURN: u16 = 0x0D;
const VK_0: u16 = 0x30;
const VK_A: u16 = 0x41;
const VK_F1: u16 = 0x70;

/// `(vk, key, needs KEYEVENTF_EXTENDEDKEY)`
#[rustfmt::skip]
const KEYS: &[(u16, KeyCode, bool)] = &[
    (0xA0, KeyCode::Shift, false),        // VK_LSHIFT
    (0xA1, KeyCode::Shift, false),        // VK_RSHIFT
    (0x10, KeyCode::Shift, false),        // VK_SHIFT
    (0xA2, KeyCode::Ctrl, false),         // VK_LCONTROL
    (0xA3, KeyCode::Ctrl, false),
    (0x11, KeyCode::Ctrl, false),
    (0xA4, KeyCode::Alt, false),          // VK_LMENU
    (0xA5, KeyCode::Alt, false),
    (0x12, KeyCode::Alt, false),
    (0x5B, KeyCode::Meta, false),         // VK_LWIN
    (0x5C, KeyCode::Meta, false),

    (0x20, KeyCode::Space, false),
    (VK_RETURN, KeyCode::Enter, false),
    (VK_RETURN, KeyCode::NumpadEnter, true),
    (0x09, KeyCode::Tab, false),
    (0x1B, KeyCode::Escape, false),
    (0x08, KeyCode::Backspace, false),
    (0x2E, KeyCode::Delete, true),
    (0x2D, KeyCode::Insert, true),
    (0x24, KeyCode::Home, true),
    (0x23, KeyCode::End, true),
    (0x21, KeyCode::PageUp, true),
    (0x22, KeyCode::PageDown, true),
    (0x26, KeyCode::Up, true),
    (0x28, KeyCode::Down, true),
    (0x25, KeyCode::Left, true),
    (0x27, KeyCode::Right, true),

    (0x14, KeyCode::CapsLock, false),
    (0x90, KeyCode::NumLock, false),
    (0x91, KeyCode::ScrollLock, false),
    (0x2C, KeyCode::PrintScreen, false),
    (0x13, KeyCode::Pause, false),

    (0x60, KeyCode::Numpad0, false),
    (0x61, KeyCode::Numpad1, false),
    (0x62, KeyCode::Numpad2, false),
    (0x63, KeyCode::Numpad3, false),
    (0x64, KeyCode::Numpad4, false),
    (0x65, KeyCode::Numpad5, false),
    (0x66, KeyCode::Numpad6, false),
    (0x67, KeyCode::Numpad7, false),
    (0x68, KeyCode::Numpad8, false),
    (0x69, KeyCode::Numpad9, false),
    (0x6B, KeyCode::NumpadAdd, false),
    (0x6D, KeyCode::NumpadSub, false),
    (0x6A, KeyCode::NumpadMul, false),
    (0x6F, KeyCode::NumpadDiv, true),

    // OEM codes, ANSI layout assumed
    (0xC0, KeyCode::Backtick, false),
    (0xBD, KeyCode::Minus, false),
    (0xBB, KeyCode::Equal, false),
    (0xDB, KeyCode::LeftBracket, false),
    (0xDD, KeyCode::RightBracket, false),
    (0xDC, KeyCode::Backslash, false),
    (0xBA, KeyCode::Semicolon, false),
    (0xDE, KeyCode::Apostrophe, false),
    (0xBC, KeyCode::Comma, false),
    (0xBE, KeyCode::Period, false),
    (0xBF, KeyCode::Slash, false),
];

fn in_range(vk: u16, first: u16, keys: &[KeyCode]) -> Option<KeyCode> {
    let offset = vk.checked_sub(first)?;
    keys.get(usize::from(offset)).copied()
}

fn range_code(key: KeyCode, first: u16, keys: &[KeyCode]) -> Option<u16> {
    let index = keys.iter().position(|&k| k == key)?;
    u16::try_from(index).ok().map(|i| first + i)
}

/// Converts a virtual key code to a `KeyCode`.
///
/// `extended` is the `LLKHF_EXTENDED` bit of `KBDLLHOOKSTRUCT.flags`; it only
/// matters for VK_RETURN, where it marks the keypad Enter.
pub fn vkcode_to_keycode(vk: u16, extended: bool) -> Option<KeyCode> {
    if let Some(key) = in_range(vk, VK_A, &KeyCode::LETTERS)
        .or_else(|| in_range(vk, VK_0, &KeyCode::DIGITS))
        .or_else(|| in_range(vk, VK_F1, &KeyCode::FUNCTION))
    {
        return Some(key);
    }
    KEYS.iter()
        .find(|&&(code, _, ext)| code == vk && (vk != VK_RETURN || ext == extended))
        .map(|&(_, key, _)| key)
}

/// Converts a `KeyCode` to `(vk, extra dwFlags)` for `KEYBDINPUT`.
///
/// Navigation keys carry `EXTENDED` so they are not read as their keypad
/// twins. Modifiers use the left-hand key.
pub fn keycode_to_vkcode(key: KeyCode) -> Option<(u16, u32)> {
    if let Some(vk) = range_code(key, VK_A, &KeyCode::LETTERS)
        .or_else(|| range_code(key, VK_0, &KeyCode::DIGITS))
        .or_else(|| range_code(key, VK_F1, &KeyCode::FUNCTION))
    {
        return Some((vk, 0));
    }
    KEYS.iter()
        .find(|&&(_, k, _)| k == key)
        .map(|&(vk, _, ext)| (vk, if ext { EXTENDED } else { 0 }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_cover_letters_digits_and_function_keys() {
        assert_eq!(vkcode_to_keycode(0x41, false), Some(KeyCode::A));
        assert_eq!(vkcode_to_keycode(0x5A, false), Some(KeyCode::Z));
        assert_eq!(vkcode_to_keycode(0x30, false), Some(KeyCode::Key0));
        assert_eq!(vkcode_to_keycode(0x39, false), Some(KeyCode::Key9));
        assert_eq!(vkcode_to_keycode(0x70, false), Some(KeyCode::F1));
        assert_eq!(vkcode_to_keycode(0x87, false), Some(KeyCode::F24));
        assert_eq!(vkcode_to_keycode(0x88, false), None);
    }

    #[test]
    fn numpad_enter_requires_extended_bit() {
        assert_eq!(vkcode_to_keycode(0x0D, false), Some(KeyCode::Enter));
        assert_eq!(vkcode_to_keycode(0x0D, true), Some(KeyCode::NumpadEnter));
        assert_eq!(keycode_to_vkcode(KeyCode::NumpadEnter), Some((0x0D, EXTENDED)));
    }

    #[test]
    fn both_sides_of_a_modifier_capture_as_one_key() {
        for (left, right, key) in [
            (0xA0, 0xA1, KeyCode::Shift),
            (0xA2, 0xA3, KeyCode::Ctrl),
            (0xA4, 0xA5, KeyCode::Alt),
            (0x5B, 0x5C, KeyCode::Meta),
        ] {
            assert_eq!(vkcode_to_keycode(left, false), Some(key));
            assert_eq!(vkcode_to_keycode(right, false), Some(key));
            assert_eq!(keycode_to_vkcode(key), Some((left, 0)));
        }
    }

    #[test]
    fn unknown_vkcode_returns_none() {
        assert_eq!(vkcode_to_keycode(0xFF, false), None);
        assert_eq!(vkcode_to_keycode(0xAD, false), None); // VK_VOLUME_MUTE
    }

    #[test]
    fn every_keycode_round_trips() {
        for &(_, key, _) in KEYS {
            let (vk, flags) = keycode_to_vkcode(key).unwrap();
            assert_eq!(vkcode_to_keycode(vk, flags == EXTENDED), Some(key), "{key:?}");
        }
        for key in KeyCode::LETTERS.into_iter().chain(KeyCode::FUNCTION) {
            let (vk, _) = keycode_to_vkcode(key).unwrap();
            assert_eq!(vkcode_to_keycode(vk, false), Some(key));
        }
    }

    #[test]
    fn navigation_keys_carry_extended_flag() {
        for key in [
            KeyCode::Up,
            KeyCode::Down,
            KeyCode::Left,
            KeyCode::Right,
            KeyCode::Home,
            KeyCode::End,
            KeyCode::PageUp,
            KeyCode::PageDown,
            KeyCode::Insert,
            KeyCode::Delete,
        ] {
            let (_, flags) = keycode_to_vkcode(key).unwrap();
            assert_eq!(flags, EXTENDED, "{key:?} should carry EXTENDED flag");
        }
    }
}
