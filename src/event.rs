//! Recorded events.
//!
//! One variant per event kind; the JSON form is a flat object whose `type`
//! field names the variant, e.g.
//! `{"type": "mouse_click", "x": 100, "y": 200, "button": "left", "pressed": true, "time": 1.25}`.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    /// Seconds since the recording started.
    pub time: f64,
}

impl Event {
    pub fn new(time: f64, kind: EventKind) -> Self {
        Self { kind, time }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    MouseMove {
        #[serde(deserialize_with = "lenient_int")]
        x: i32,
        #[serde(deserialize_with = "lenient_int")]
        y: i32,
    },
    MouseClick {
        #[serde(deserialize_with = "lenient_int")]
        x: i32,
        #[serde(deserialize_with = "lenient_int")]
        y: i32,
        button: String,
        pressed: bool,
    },
    MouseScroll {
        #[serde(deserialize_with = "lenient_int")]
        x: i32,
        #[serde(deserialize_with = "lenient_int")]
        y: i32,
        #[serde(deserialize_with = "lenient_int")]
        dx: i32,
        #[serde(deserialize_with = "lenient_int")]
        dy: i32,
    },
    KeyPress {
        key: String,
    },
    KeyRelease {
        key: String,
    },
    Hotkey {
        keys: Vec<String>,
    },
}

impl EventKind {
    /// The `type` tag written to recordings.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::MouseMove { .. } => "mouse_move",
            EventKind::MouseClick { .. } => "mouse_click",
            EventKind::MouseScroll { .. } => "mouse_scroll",
            EventKind::KeyPress { .. } => "key_press",
            EventKind::KeyRelease { .. } => "key_release",
            EventKind::Hotkey { .. } => "hotkey",
        }
    }
}

/// Accepts integral and fractional JSON numbers, truncating toward zero.
/// Some capture layers report sub-pixel positions and fractional wheel deltas.
fn lenient_int<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return Err(D::Error::custom(format!("number out of range: {value}")));
    }
    Ok(value.trunc() as i32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_flat_with_type_tag() {
        let event = Event::new(
            1.5,
            EventKind::MouseClick {
                x: 100,
                y: 200,
                button: "left".into(),
                pressed: true,
            },
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "mouse_click",
                "x": 100,
                "y": 200,
                "button": "left",
                "pressed": true,
                "time": 1.5
            })
        );
    }

    #[test]
    fn hotkey_keeps_key_order() {
        let value = json!({"type": "hotkey", "keys": ["ctrl", "shift", "t"], "time": 0.25});
        let event: Event = serde_json::from_value(value).unwrap();
        assert_eq!(
            event.kind,
            EventKind::Hotkey {
                keys: vec!["ctrl".into(), "shift".into(), "t".into()]
            }
        );
    }

    #[test]
    fn fractional_coordinates_truncate() {
        let value = json!({
            "type": "mouse_scroll", "x": 10.7, "y": 20.2, "dx": 0, "dy": -1.9, "time": 0.0
        });
        let event: Event = serde_json::from_value(value).unwrap();
        assert_eq!(
            event.kind,
            EventKind::MouseScroll {
                x: 10,
                y: 20,
                dx: 0,
                dy: -1
            }
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let value = json!({"type": "window_focus", "time": 0.0});
        assert!(serde_json::from_value::<Event>(value).is_err());
    }

    #[test]
    fn missing_payload_field_is_rejected() {
        let value = json!({"type": "mouse_move", "x": 1, "time": 0.0});
        assert!(serde_json::from_value::<Event>(value).is_err());
    }

    #[test]
    fn kind_names_match_tags() {
        let kinds = [
            EventKind::MouseMove { x: 0, y: 0 },
            EventKind::KeyPress { key: "a".into() },
            EventKind::KeyRelease { key: "a".into() },
            EventKind::Hotkey { keys: vec![] },
        ];
        for kind in kinds {
            let value = serde_json::to_value(Event::new(0.0, kind.clone())).unwrap();
            assert_eq!(value["type"], kind.name());
        }
    }
}
