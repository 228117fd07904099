//! Hotkey detection over the set of currently held keys.

use std::collections::BTreeSet;

use crate::keys;

/// What a key press turns into in the recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Press {
    /// A single key, recorded as `key_press`.
    Key(String),
    /// Modifiers plus at least one other key, recorded as `hotkey`.
    /// Sorted modifiers first, then the sorted remaining keys.
    Hotkey(Vec<String>),
}

/// Tracks held keys for one recording session.
///
/// OS key repeat re-delivers presses for a held key; each one re-evaluates
/// the chord, so a held hotkey is reported once per repeat unless
/// `collapse_repeats` is set.
#[derive(Debug, Default)]
pub struct HeldKeys {
    held: BTreeSet<String>,
    collapse_repeats: bool,
    last_hotkey: Option<Vec<String>>,
}

impl HeldKeys {
    pub fn new(collapse_repeats: bool) -> Self {
        Self {
            collapse_repeats,
            ..Self::default()
        }
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.last_hotkey = None;
    }

    pub fn held(&self) -> impl Iterator<Item = &str> {
        self.held.iter().map(String::as_str)
    }

    /// Registers a press and decides how to record it.
    ///
    /// Returns `None` for an empty key name, and for a repeated identical
    /// hotkey when repeats are collapsed.
    pub fn press(&mut self, key: &str) -> Option<Press> {
        if key.is_empty() {
            return None;
        }
        self.held.insert(key.to_owned());

        match self.chord() {
            Some(chord) => {
                if self.collapse_repeats && self.last_hotkey.as_ref() == Some(&chord) {
                    return None;
                }
                self.last_hotkey = Some(chord.clone());
                Some(Press::Hotkey(chord))
            }
            None => Some(Press::Key(key.to_owned())),
        }
    }

    /// Registers a release. Returns the key to record as `key_release`;
    /// modifier releases are not recorded.
    pub fn release(&mut self, key: &str) -> Option<String> {
        if key.is_empty() {
            return None;
        }
        self.held.remove(key);
        self.last_hotkey = None;
        if keys::is_modifier(key) {
            None
        } else {
            Some(key.to_owned())
        }
    }

    fn chord(&self) -> Option<Vec<String>> {
        // BTreeSet iteration is already sorted, so both partitions come out
        // in order regardless of press order.
        let modifiers: Vec<String> = self
            .held
            .iter()
            .filter(|k| keys::is_modifier(k))
            .cloned()
            .collect();
        let others: Vec<String> = self
            .held
            .iter()
            .filter(|k| keys::single_char(k).is_some() || keys::is_chord_special(k))
            .cloned()
            .collect();

        if modifiers.is_empty() || others.is_empty() {
            return None;
        }
        let mut chord = modifiers;
        chord.extend(others);
        Some(chord)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn hotkey(keys: &[&str]) -> Option<Press> {
        Some(Press::Hotkey(keys.iter().map(|k| k.to_string()).collect()))
    }

    fn key(k: &str) -> Option<Press> {
        Some(Press::Key(k.to_string()))
    }

    #[test]
    fn ctrl_then_c_is_one_hotkey() {
        let mut held = HeldKeys::new(false);
        assert_eq!(held.press("ctrl"), key("ctrl"));
        assert_eq!(held.press("c"), hotkey(&["ctrl", "c"]));
    }

    #[test]
    fn releases_log_only_non_modifiers() {
        let mut held = HeldKeys::new(false);
        held.press("ctrl");
        held.press("c");
        assert_eq!(held.release("c"), Some("c".to_string()));
        assert_eq!(held.release("ctrl"), None);
        assert_eq!(held.held().count(), 0);
    }

    #[test]
    fn chord_order_is_independent_of_press_order() {
        let mut held = HeldKeys::new(false);
        assert_eq!(held.press("t"), key("t"));
        assert_eq!(held.press("shift"), hotkey(&["shift", "t"]));
        assert_eq!(held.press("ctrl"), hotkey(&["ctrl", "shift", "t"]));
    }

    #[test]
    fn lone_special_key_is_a_plain_press() {
        let mut held = HeldKeys::new(false);
        assert_eq!(held.press("enter"), key("enter"));
    }

    #[test]
    fn modifier_with_special_key_is_a_hotkey() {
        let mut held = HeldKeys::new(false);
        held.press("alt");
        assert_eq!(held.press("f4"), hotkey(&["alt", "f4"]));
    }

    #[test]
    fn keys_outside_the_chord_set_stay_plain() {
        let mut held = HeldKeys::new(false);
        held.press("ctrl");
        assert_eq!(held.press("insert"), key("insert"));
        assert_eq!(held.press("CapsLock"), key("CapsLock"));
    }

    #[test]
    fn key_repeat_reemits_the_hotkey() {
        let mut held = HeldKeys::new(false);
        held.press("ctrl");
        assert_eq!(held.press("v"), hotkey(&["ctrl", "v"]));
        assert_eq!(held.press("v"), hotkey(&["ctrl", "v"]));
        assert_eq!(held.press("v"), hotkey(&["ctrl", "v"]));
    }

    #[test]
    fn collapsed_repeats_emit_the_hotkey_once() {
        let mut held = HeldKeys::new(true);
        held.press("ctrl");
        assert_eq!(held.press("v"), hotkey(&["ctrl", "v"]));
        assert_eq!(held.press("v"), None);
        held.release("v");
        assert_eq!(held.press("v"), hotkey(&["ctrl", "v"]));
    }

    #[test]
    fn empty_names_are_ignored() {
        let mut held = HeldKeys::new(false);
        assert_eq!(held.press(""), None);
        assert_eq!(held.release(""), None);
    }

    #[test]
    fn clear_forgets_held_keys() {
        let mut held = HeldKeys::new(false);
        held.press("ctrl");
        held.clear();
        assert_eq!(held.press("c"), key("c"));
    }
}
