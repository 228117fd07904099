//! Symbolic key names.
//!
//! Recordings store keys as short lowercase names (`ctrl`, `enter`, `f5`) or
//! as the literal character the key produces. `normalize` turns a captured
//! key into that name; the `*_key` helpers resolve names back to physical
//! keys at playback time.

use crate::platform::{KeyCode, RawKey};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Named keys, in the spelling written to recordings.
const NAMED: &[(KeyCode, &str)] = &[
    (KeyCode::Ctrl, "ctrl"),
    (KeyCode::Alt, "alt"),
    (KeyCode::Shift, "shift"),
    (KeyCode::Meta, "super"),
    (KeyCode::Space, "space"),
    (KeyCode::Enter, "enter"),
    (KeyCode::Tab, "tab"),
    (KeyCode::Backspace, "backspace"),
    (KeyCode::Delete, "delete"),
    (KeyCode::Escape, "esc"),
    (KeyCode::Up, "up"),
    (KeyCode::Down, "down"),
    (KeyCode::Left, "left"),
    (KeyCode::Right, "right"),
    (KeyCode::Home, "home"),
    (KeyCode::End, "end"),
    (KeyCode::PageUp, "pageup"),
    (KeyCode::PageDown, "pagedown"),
    (KeyCode::Insert, "insert"),
    (KeyCode::F1, "f1"),
    (KeyCode::F2, "f2"),
    (KeyCode::F3, "f3"),
    (KeyCode::F4, "f4"),
    (KeyCode::F5, "f5"),
    (KeyCode::F6, "f6"),
    (KeyCode::F7, "f7"),
    (KeyCode::F8, "f8"),
    (KeyCode::F9, "f9"),
    (KeyCode::F10, "f10"),
    (KeyCode::F11, "f11"),
    (KeyCode::F12, "f12"),
];

/// Character keys on an ANSI layout: (key, plain, with shift).
const CHARACTERS: &[(KeyCode, char, char)] = &[
    (KeyCode::A, 'a', 'A'),
    (KeyCode::B, 'b', 'B'),
    (KeyCode::C, 'c', 'C'),
    (KeyCode::D, 'd', 'D'),
    (KeyCode::E, 'e', 'E'),
    (KeyCode::F, 'f', 'F'),
    (KeyCode::G, 'g', 'G'),
    (KeyCode::H, 'h', 'H'),
    (KeyCode::I, 'i', 'I'),
    (KeyCode::J, 'j', 'J'),
    (KeyCode::K, 'k', 'K'),
    (KeyCode::L, 'l', 'L'),
    (KeyCode::M, 'm', 'M'),
    (KeyCode::N, 'n', 'N'),
    (KeyCode::O, 'o', 'O'),
    (KeyCode::P, 'p', 'P'),
    (KeyCode::Q, 'q', 'Q'),
    (KeyCode::R, 'r', 'R'),
    (KeyCode::S, 's', 'S'),
    (KeyCode::T, 't', 'T'),
    (KeyCode::U, 'u', 'U'),
    (KeyCode::V, 'v', 'V'),
    (KeyCode::W, 'w', 'W'),
    (KeyCode::X, 'x', 'X'),
    (KeyCode::Y, 'y', 'Y'),
    (KeyCode::Z, 'z', 'Z'),
    (KeyCode::Key1, '1', '!'),
    (KeyCode::Key2, '2', '@'),
    (KeyCode::Key3, '3', '#'),
    (KeyCode::Key4, '4', '$'),
    (KeyCode::Key5, '5', '%'),
    (KeyCode::Key6, '6', '^'),
    (KeyCode::Key7, '7', '&'),
    (KeyCode::Key8, '8', '*'),
    (KeyCode::Key9, '9', '('),
    (KeyCode::Key0, '0', ')'),
    (KeyCode::Backtick, '`', '~'),
    (KeyCode::Minus, '-', '_'),
    (KeyCode::Equal, '=', '+'),
    (KeyCode::LeftBracket, '[', '{'),
    (KeyCode::RightBracket, ']', '}'),
    (KeyCode::Backslash, '\\', '|'),
    (KeyCode::Semicolon, ';', ':'),
    (KeyCode::Apostrophe, '\'', '"'),
    (KeyCode::Comma, ',', '<'),
    (KeyCode::Period, '.', '>'),
    (KeyCode::Slash, '/', '?'),
    (KeyCode::Space, ' ', ' '),
];

pub const MODIFIERS: [&str; 4] = ["ctrl", "alt", "shift", "super"];

pub fn is_modifier(name: &str) -> bool {
    MODIFIERS.contains(&name)
}

/// Named non-modifier keys that take part in a chord on their own merit.
/// `insert` is deliberately absent: a modifier plus Insert records as a plain
/// press.
pub fn is_chord_special(name: &str) -> bool {
    name != "insert" && !is_modifier(name) && NAMED.iter().any(|(_, n)| *n == name)
}

// ---------------------------------------------------------------------------
// Capture side
// ---------------------------------------------------------------------------

/// Maps a captured key to its symbolic name.
///
/// Total: keys outside the tables keep their raw spelling (`CapsLock`,
/// `Numpad5`, `keycode:171`).
pub fn normalize(key: RawKey) -> String {
    match key {
        RawKey::Key(code) => symbolic_name(code)
            .map(str::to_owned)
            .or_else(|| plain_char(code).map(String::from))
            .unwrap_or_else(|| key.to_string()),
        RawKey::Unmapped(_) => key.to_string(),
    }
}

fn symbolic_name(code: KeyCode) -> Option<&'static str> {
    NAMED.iter().find(|(k, _)| *k == code).map(|(_, n)| *n)
}

fn plain_char(code: KeyCode) -> Option<char> {
    CHARACTERS
        .iter()
        .find(|(k, _, _)| *k == code)
        .map(|(_, c, _)| *c)
}

// ---------------------------------------------------------------------------
// Playback side
// ---------------------------------------------------------------------------

/// A physical key plus whether Shift must be held to produce the character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stroke {
    pub key: KeyCode,
    pub shift: bool,
}

/// Folds alternate spellings onto the recorded names: the raw `Key.page_up`
/// style of older recordings, side-specific modifiers, and platform names
/// for the super key.
fn canonical(name: &str) -> &str {
    let bare = name.strip_prefix("Key.").unwrap_or(name);
    match bare {
        "page_up" => "pageup",
        "page_down" => "pagedown",
        "escape" => "esc",
        "return" => "enter",
        "ctrl_l" | "ctrl_r" => "ctrl",
        "alt_l" | "alt_r" | "alt_gr" => "alt",
        "shift_l" | "shift_r" => "shift",
        "cmd" | "cmd_l" | "cmd_r" | "win" => "super",
        other => other,
    }
}

fn named_key(name: &str) -> Option<KeyCode> {
    let name = canonical(name);
    NAMED.iter().find(|(_, n)| *n == name).map(|(k, _)| *k)
}

/// Resolves a `key_press` name to a named key to tap.
///
/// Bare modifiers resolve to `None`: tapping Alt alone would open menu bars.
/// This includes side-specific names such as `Key.ctrl_l` and `Key.shift`.
pub fn press_key(name: &str) -> Option<KeyCode> {
    named_key(name).filter(|key| !key.is_modifier())
}

/// Resolves a single character to the key that types it.
pub fn char_stroke(c: char) -> Option<Stroke> {
    CHARACTERS.iter().find_map(|&(key, plain, shifted)| {
        if c == plain {
            Some(Stroke { key, shift: false })
        } else if c == shifted {
            Some(Stroke { key, shift: true })
        } else {
            None
        }
    })
}

/// Returns the only character of `s`, if it has exactly one.
pub fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Resolves the names of a recorded hotkey to the keys of one chord.
///
/// Order is preserved. A character that needs Shift pulls Shift in ahead of
/// it unless the chord already holds it. Returns the first unresolvable name
/// as the error.
pub fn chord_keys(names: &[String]) -> Result<Vec<KeyCode>, String> {
    let mut keys: Vec<KeyCode> = Vec::with_capacity(names.len() + 1);
    for name in names {
        let (key, shift) = if let Some(key) = named_key(name) {
            (key, false)
        } else if let Some(stroke) = single_char(name).and_then(char_stroke) {
            (stroke.key, stroke.shift)
        } else {
            return Err(name.clone());
        };
        if shift && !keys.contains(&KeyCode::Shift) {
            keys.push(KeyCode::Shift);
        }
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
