//! Linux key code conversions.
//!
//! The table holds evdev codes from `linux/input-event-codes.h`. X servers
//! using the evdev driver (and XWayland) number their keycodes as the evdev
//! code plus 8; `x11_to_keycode` and `keycode_to_x11` apply that offset.
//!
//! Left and right modifiers share a `KeyCode`; the left-hand entry comes
//! first and is the one injected.

use crate::platform::KeyCode;

const X11_OFFSET: u32 = 8;

#[rustfmt::skip]
const EVDEV: &[(u32, KeyCode)] = &[
    (30, KeyCode::A), (48, KeyCode::B), (46, KeyCode::C), (32, KeyCode::D),
    (18, KeyCode::E), (33, KeyCode::F), (34, KeyCode::G), (35, KeyCode::H),
    (23, KeyCode::I), (36, KeyCode::J), (37, KeyCode::K), (38, KeyCode::L),
    (50, KeyCode::M), (49, KeyCode::N), (24, KeyCode::O), (25, KeyCode::P),
    (16, KeyCode::Q), (19, KeyCode::R), (31, KeyCode::S), (20, KeyCode::T),
    (22, KeyCode::U), (47, KeyCode::V), (17, KeyCode::W), (45, KeyCode::X),
    (21, KeyCode::Y), (44, KeyCode::Z),

    // 2..=11 is the top row 1..0
    (11, KeyCode::Key0), (2, KeyCode::Key1), (3, KeyCode::Key2), (4, KeyCode::Key3),
    (5, KeyCode::Key4), (6, KeyCode::Key5), (7, KeyCode::Key6), (8, KeyCode::Key7),
    (9, KeyCode::Key8), (10, KeyCode::Key9),

    (59, KeyCode::F1), (60, KeyCode::F2), (61, KeyCode::F3), (62, KeyCode::F4),
    (63, KeyCode::F5), (64, KeyCode::F6), (65, KeyCode::F7), (66, KeyCode::F8),
    (67, KeyCode::F9), (68, KeyCode::F10), (87, KeyCode::F11), (88, KeyCode::F12),
    (183, KeyCode::F13), (184, KeyCode::F14), (185, KeyCode::F15), (186, KeyCode::F16),
    (187, KeyCode::F17), (188, KeyCode::F18), (189, KeyCode::F19), (190, KeyCode::F20),
    (191, KeyCode::F21), (192, KeyCode::F22), (193, KeyCode::F23), (194, KeyCode::F24),

    (29, KeyCode::Ctrl), (97, KeyCode::Ctrl),
    (42, KeyCode::Shift), (54, KeyCode::Shift),
    (56, KeyCode::Alt), (100, KeyCode::Alt),
    (125, KeyCode::Meta), (126, KeyCode::Meta),

    (57, KeyCode::Space), (28, KeyCode::Enter), (15, KeyCode::Tab), (1, KeyCode::Escape),
    (14, KeyCode::Backspace), (111, KeyCode::Delete), (110, KeyCode::Insert),
    (102, KeyCode::Home), (107, KeyCode::End), (104, KeyCode::PageUp),
    (109, KeyCode::PageDown), (103, KeyCode::Up), (108, KeyCode::Down),
    (105, KeyCode::Left), (106, KeyCode::Right),

    (58, KeyCode::CapsLock), (69, KeyCode::NumLock), (70, KeyCode::ScrollLock),
    (99, KeyCode::PrintScreen), (119, KeyCode::Pause),

    (82, KeyCode::Numpad0), (79, KeyCode::Numpad1), (80, KeyCode::Numpad2),
    (81, KeyCode::Numpad3), (75, KeyCode::Numpad4), (76, KeyCode::Numpad5),
    (77, KeyCode::Numpad6), (71, KeyCode::Numpad7), (72, KeyCode::Numpad8),
    (73, KeyCode::Numpad9), (78, KeyCode::NumpadAdd), (74, KeyCode::NumpadSub),
    (55, KeyCode::NumpadMul), (98, KeyCode::NumpadDiv), (96, KeyCode::NumpadEnter),

    (41, KeyCode::Backtick), (12, KeyCode::Minus), (13, KeyCode::Equal),
    (26, KeyCode::LeftBracket), (27, KeyCode::RightBracket), (43, KeyCode::Backslash),
    (39, KeyCode::Semicolon), (40, KeyCode::Apostrophe), (51, KeyCode::Comma),
    (52, KeyCode::Period), (53, KeyCode::Slash),
];

/// Converts an evdev code to a `KeyCode`. `None` for media keys and other
/// codes without a canonical variant.
pub fn evdev_to_keycode(code: u32) -> Option<KeyCode> {
    EVDEV.iter().find(|&&(c, _)| c == code).map(|&(_, key)| key)
}

/// Converts a `KeyCode` to its evdev code; modifiers resolve to the left key.
pub fn keycode_to_evdev(key: KeyCode) -> Option<u32> {
    EVDEV.iter().find(|&&(_, k)| k == key).map(|&(code, _)| code)
}

pub fn x11_to_keycode(keycode: u8) -> Option<KeyCode> {
    u32::from(keycode)
        .checked_sub(X11_OFFSET)
        .and_then(evdev_to_keycode)
}

pub fn keycode_to_x11(key: KeyCode) -> Option<u8> {
    keycode_to_evdev(key).and_then(|code| u8::try_from(code + X11_OFFSET).ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spot_check_evdev_codes() {
        assert_eq!(evdev_to_keycode(30), Some(KeyCode::A));
        assert_eq!(evdev_to_keycode(11), Some(KeyCode::Key0));
        assert_eq!(evdev_to_keycode(88), Some(KeyCode::F12));
        assert_eq!(evdev_to_keycode(96), Some(KeyCode::NumpadEnter));
        assert_eq!(evdev_to_keycode(113), None); // KEY_MUTE
    }

    #[test]
    fn right_modifiers_capture_as_canonical_and_inject_as_left() {
        assert_eq!(evdev_to_keycode(97), Some(KeyCode::Ctrl));
        assert_eq!(evdev_to_keycode(126), Some(KeyCode::Meta));
        assert_eq!(keycode_to_evdev(KeyCode::Ctrl), Some(29));
        assert_eq!(keycode_to_evdev(KeyCode::Shift), Some(42));
        assert_eq!(keycode_to_evdev(KeyCode::Alt), Some(56));
        assert_eq!(keycode_to_evdev(KeyCode::Meta), Some(125));
    }

    #[test]
    fn x11_keycodes_are_offset_by_eight() {
        assert_eq!(x11_to_keycode(38), Some(KeyCode::A));
        assert_eq!(x11_to_keycode(9), Some(KeyCode::Escape));
        assert_eq!(x11_to_keycode(3), None);
        assert_eq!(keycode_to_x11(KeyCode::Space), Some(65));
        assert_eq!(keycode_to_x11(KeyCode::F24), Some(202));
    }

    #[test]
    fn every_keycode_has_an_injection_code() {
        let all = KeyCode::LETTERS
            .into_iter()
            .chain(KeyCode::DIGITS)
            .chain(KeyCode::FUNCTION);
        for key in all {
            let x11 = keycode_to_x11(key).unwrap();
            assert_eq!(x11_to_keycode(x11), Some(key), "{key:?}");
        }
        for &(_, key) in EVDEV {
            assert!(keycode_to_x11(key).is_some(), "{key:?}");
        }
    }

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<u32> = EVDEV.iter().map(|&(code, _)| code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), EVDEV.len());
    }
}
