//! Turns captured input into recorded events.
//!
//! A `Session` goes idle -> active -> finished exactly once. While active it
//! appends one `Event` per capture callback, with two exceptions: pointer
//! motion is dropped when the position has not changed, and key input goes
//! through the hotkey detector first.

use std::time::Instant;

use crate::combo::{HeldKeys, Press};
use crate::event::{Event, EventKind};
use crate::keys;
use crate::platform::{CaptureEvent, CaptureKind, KeyState, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Active { started: Instant },
    Finished,
}

#[derive(Debug)]
pub struct Session {
    state: State,
    events: Vec<Event>,
    held: HeldKeys,
    last_position: Option<Point>,
    last_time: f64,
}

impl Session {
    pub fn new(collapse_repeated_hotkeys: bool) -> Self {
        Self {
            state: State::Idle,
            events: Vec::new(),
            held: HeldKeys::new(collapse_repeated_hotkeys),
            last_position: None,
            last_time: 0.0,
        }
    }

    /// Starts the clock. `pointer` is where the cursor sits right now; a
    /// first motion event to that same spot is not recorded.
    ///
    /// Does nothing unless the session is idle.
    pub fn start(&mut self, started: Instant, pointer: Option<Point>) {
        if self.state != State::Idle {
            return;
        }
        self.events.clear();
        self.held.clear();
        self.last_position = pointer;
        self.last_time = 0.0;
        self.state = State::Active { started };
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Encodes one captured event. Ignored unless the session is active.
    pub fn push(&mut self, captured: CaptureEvent) {
        let State::Active { started } = self.state else {
            return;
        };
        // Hooks stamp events on their own thread, so a stamp can trail the
        // previous one by a few microseconds. Times must never go backwards.
        let time = captured
            .at
            .saturating_duration_since(started)
            .as_secs_f64()
            .max(self.last_time);

        let kind = match captured.kind {
            CaptureKind::Motion { at } => {
                if self.last_position == Some(at) {
                    return;
                }
                self.last_position = Some(at);
                EventKind::MouseMove { x: at.x, y: at.y }
            }
            CaptureKind::Button {
                at,
                button,
                pressed,
            } => EventKind::MouseClick {
                x: at.x,
                y: at.y,
                button: button.to_string(),
                pressed,
            },
            CaptureKind::Scroll { at, dx, dy } => EventKind::MouseScroll {
                x: at.x,
                y: at.y,
                dx,
                dy,
            },
            CaptureKind::Key {
                key,
                state: KeyState::Down,
            } => match self.held.press(&keys::normalize(key)) {
                Some(Press::Key(key)) => EventKind::KeyPress { key },
                Some(Press::Hotkey(keys)) => EventKind::Hotkey { keys },
                None => return,
            },
            CaptureKind::Key {
                key,
                state: KeyState::Up,
            } => match self.held.release(&keys::normalize(key)) {
                Some(key) => EventKind::KeyRelease { key },
                None => return,
            },
        };

        self.last_time = time;
        self.events.push(Event::new(time, kind));
    }

    /// Stops the session and hands over the recorded events.
    ///
    /// Later calls, and calls on a session that never started, return nothing.
    pub fn finish(&mut self) -> Vec<Event> {
        if !self.is_active() {
            return Vec::new();
        }
        self.state = State::Finished;
        self.held.clear();
        std::mem::take(&mut self.events)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
