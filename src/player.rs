//! Playback scheduler.
//!
//! Replays a recorded event sequence through an `ActionExecutor`. The wait
//! before each event is the gap to the previous event's recorded time,
//! divided by the speed factor. Time spent injecting is not subtracted, so
//! long recordings drift slightly late.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::interrupt::CancelToken;
use crate::keys;
use crate::platform::{
    Action, ActionExecutor, KeyCode, KeyState, MouseButton, PlatformError, Point,
};

// ---------------------------------------------------------------------------
// Speed
// ---------------------------------------------------------------------------

/// Playback time-scale divisor. Always finite and greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Speed(f64);

impl Speed {
    pub const NORMAL: Speed = Speed(1.0);

    pub fn new(factor: f64) -> Result<Speed> {
        if factor.is_finite() && factor > 0.0 {
            Ok(Speed(factor))
        } else {
            Err(Error::InvalidSpeed(factor.to_string()))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Scales a recorded gap in seconds to a wall-clock wait.
    pub fn scale(self, seconds: f64) -> Duration {
        Duration::try_from_secs_f64(seconds / self.0).unwrap_or(Duration::MAX)
    }
}

impl Default for Speed {
    fn default() -> Self {
        Speed::NORMAL
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl FromStr for Speed {
    type Err = Error;

    fn from_str(s: &str) -> Result<Speed> {
        let factor: f64 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidSpeed(s.to_owned()))?;
        Speed::new(factor).map_err(|_| Error::InvalidSpeed(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Settings and report
// ---------------------------------------------------------------------------

/// Process-wide playback behaviour, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSettings {
    /// Pause after every event that injected input.
    pub pacing: Duration,
    /// Abort when the pointer is parked in the top-left corner.
    pub failsafe: bool,
    /// Log progress every this many events; 0 disables.
    pub progress_every: usize,
}

impl PlayerSettings {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            pacing: config.pacing(),
            failsafe: config.failsafe,
            progress_every: config.progress_every,
        }
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self::from_config(&PlaybackConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    /// Events processed, including ones with no playback action.
    pub executed: usize,
    /// Events whose injection failed. Counted in `executed` too.
    pub failed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl PlaybackReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.executed == self.total
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

pub struct Player<'a> {
    executor: &'a dyn ActionExecutor,
    cancel: &'a CancelToken,
    settings: PlayerSettings,
}

impl<'a> Player<'a> {
    pub fn new(
        executor: &'a dyn ActionExecutor,
        cancel: &'a CancelToken,
        settings: PlayerSettings,
    ) -> Self {
        Self {
            executor,
            cancel,
            settings,
        }
    }

    /// Replays `events` in order.
    ///
    /// Per-event injection failures are logged and counted; playback goes on.
    /// Cancellation stops at once with `UserCancelled`, and the failsafe with
    /// `FailSafe`, both carrying the number of events already processed.
    pub fn play(&self, events: &[Event], speed: Speed) -> Result<PlaybackReport> {
        let _armed = self.cancel.arm();
        let started = Instant::now();
        let total = events.len();
        let mut previous_time = 0.0_f64;
        let mut executed = 0;
        let mut failed = 0;

        log::info!("player: playing {total} events at {speed}");

        for (index, event) in events.iter().enumerate() {
            let every = self.settings.progress_every;
            if every > 0 && index > 0 && index % every == 0 {
                log::info!(
                    "player: progress {:.1}% ({index}/{total})",
                    index as f64 * 100.0 / total as f64
                );
            }

            let delay = event.time - previous_time;
            if delay > 0.0 && !self.cancel.sleep(speed.scale(delay)) {
                return Err(Error::UserCancelled { completed: executed });
            }
            if self.cancel.is_cancelled() {
                return Err(Error::UserCancelled { completed: executed });
            }
            if self.settings.failsafe && self.pointer_in_corner() {
                log::warn!("player: failsafe triggered after {executed} events");
                return Err(Error::FailSafe { completed: executed });
            }

            match self.dispatch(&event.kind) {
                Ok(true) => {
                    if !self.settings.pacing.is_zero() && !self.cancel.sleep(self.settings.pacing)
                    {
                        return Err(Error::UserCancelled {
                            completed: executed + 1,
                        });
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    log::warn!("player: event {index} ({}) failed: {e}", event.kind.name());
                }
            }
            previous_time = event.time;
            executed += 1;
        }

        let report = PlaybackReport {
            executed,
            failed,
            total,
            elapsed: started.elapsed(),
        };
        log::info!(
            "player: done, {executed}/{total} events, {failed} failed, {:.2}s",
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    fn pointer_in_corner(&self) -> bool {
        match self.executor.cursor_position() {
            Ok(at) => at == Point::new(0, 0),
            Err(e) => {
                log::debug!("player: cannot read pointer for failsafe: {e}");
                false
            }
        }
    }

    /// Performs the playback action for one event.
    /// Returns whether anything was injected.
    fn dispatch(&self, kind: &EventKind) -> Result<bool> {
        match kind {
            EventKind::MouseMove { x, y } => {
                self.inject(&Action::MoveTo(Point::new(*x, *y)))?;
                Ok(true)
            }
            // The release of a click is recorded but a click already
            // includes it.
            EventKind::MouseClick { pressed: false, .. } => Ok(false),
            EventKind::MouseClick { x, y, button, .. } => {
                self.inject(&Action::Click {
                    at: Point::new(*x, *y),
                    button: MouseButton::from_recorded(button),
                })?;
                Ok(true)
            }
            // Horizontal scroll is not replayed.
            EventKind::MouseScroll { dy: 0, .. } => Ok(false),
            EventKind::MouseScroll { x, y, dy, .. } => {
                self.inject(&Action::Scroll {
                    at: Point::new(*x, *y),
                    amount: *dy,
                })?;
                Ok(true)
            }
            EventKind::KeyPress { key } => self.press(key),
            EventKind::Hotkey { keys } if keys.is_empty() => Ok(false),
            EventKind::Hotkey { keys: names } => {
                let chord = keys::chord_keys(names).map_err(|name| {
                    Error::InjectionFailure(format!("unknown key {name:?} in hotkey"))
                })?;
                self.chord(&chord, names)?;
                Ok(true)
            }
            EventKind::KeyRelease { .. } => Ok(false),
        }
    }

    fn press(&self, name: &str) -> Result<bool> {
        if let Some(key) = keys::press_key(name) {
            self.tap(key)?;
            return Ok(true);
        }
        let Some(c) = keys::single_char(name) else {
            log::debug!("player: no playback for key {name:?}");
            return Ok(false);
        };
        let stroke = keys::char_stroke(c)
            .ok_or_else(|| Error::InjectionFailure(format!("no key types {c:?}")))?;
        if stroke.shift {
            self.chord(&[KeyCode::Shift, stroke.key], &[name.to_owned()])?;
        } else {
            self.tap(stroke.key)?;
        }
        Ok(true)
    }

    fn tap(&self, key: KeyCode) -> Result<()> {
        self.inject(&Action::Key {
            key,
            state: KeyState::Down,
        })?;
        self.inject(&Action::Key {
            key,
            state: KeyState::Up,
        })
    }

    /// Injects a chord atomically, or key by key when the backend cannot.
    fn chord(&self, chord: &[KeyCode], names: &[String]) -> Result<()> {
        match self.executor.execute(&Action::Chord(chord.to_vec())) {
            Ok(()) => Ok(()),
            Err(PlatformError::Unsupported(_)) => {
                log::debug!("player: hotkey fallback for {}", names.join("+"));
                self.chord_fallback(chord)
            }
            Err(e) => Err(Error::InjectionFailure(e.to_string())),
        }
    }

    /// Presses in order and releases in reverse. Keys that went down are
    /// always released, even when a later press fails.
    fn chord_fallback(&self, chord: &[KeyCode]) -> Result<()> {
        let mut pressed = 0;
        let mut outcome = Ok(());
        for &key in chord {
            if let Err(e) = self.inject(&Action::Key {
                key,
                state: KeyState::Down,
            }) {
                outcome = Err(e);
                break;
            }
            pressed += 1;
        }
        for &key in chord[..pressed].iter().rev() {
            let released = self.inject(&Action::Key {
                key,
                state: KeyState::Up,
            });
            if outcome.is_ok() {
                outcome = released;
            }
        }
        outcome
    }

    fn inject(&self, action: &Action) -> Result<()> {
        self.executor
            .execute(action)
            .map_err(|e| Error::InjectionFailure(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakeExecutor;
    use std::thread;

    fn quiet() -> PlayerSettings {
        PlayerSettings {
            pacing: Duration::ZERO,
            failsafe: false,
            progress_every: 0,
        }
    }

    fn play(executor: &FakeExecutor, events: &[Event]) -> Result<PlaybackReport> {
        let cancel = CancelToken::new();
        Player::new(executor, &cancel, quiet()).play(events, Speed::NORMAL)
    }

    fn click(time: f64, pressed: bool) -> Event {
        Event::new(
            time,
            EventKind::MouseClick {
                x: 100,
                y: 200,
                button: "left".into(),
                pressed,
            },
        )
    }

    fn down(key: KeyCode) -> Action {
        Action::Key {
            key,
            state: KeyState::Down,
        }
    }

    fn up(key: KeyCode) -> Action {
        Action::Key {
            key,
            state: KeyState::Up,
        }
    }

    #[test]
    fn speed_rejects_non_positive_and_non_finite() {
        assert!(Speed::new(0.0).is_err());
        assert!(Speed::new(-1.0).is_err());
        assert!(Speed::new(f64::NAN).is_err());
        assert!(Speed::new(f64::INFINITY).is_err());
        assert_eq!(Speed::new(1.5).unwrap().get(), 1.5);
    }

    #[test]
    fn speed_parses_from_text() {
        assert_eq!("2".parse::<Speed>().unwrap().get(), 2.0);
        assert_eq!(" 0.5 ".parse::<Speed>().unwrap().get(), 0.5);
        assert!(matches!("fast".parse::<Speed>(), Err(Error::InvalidSpeed(_))));
        assert!(matches!("0".parse::<Speed>(), Err(Error::InvalidSpeed(_))));
    }

    #[test]
    fn pressed_and_released_click_replays_one_click() {
        let executor = FakeExecutor::new();
        let report = play(&executor, &[click(0.0, true), click(0.01, false)]).unwrap();
        assert_eq!(
            executor.taken(),
            vec![Action::Click {
                at: Point::new(100, 200),
                button: MouseButton::Left,
            }]
        );
        assert_eq!(report.executed, 2);
        assert!(report.is_clean());
    }

    #[test]
    fn legacy_button_names_map_to_buttons() {
        let executor = FakeExecutor::new();
        let event = Event::new(
            0.0,
            EventKind::MouseClick {
                x: 1,
                y: 2,
                button: "Button.right".into(),
                pressed: true,
            },
        );
        play(&executor, &[event]).unwrap();
        assert_eq!(
            executor.taken(),
            vec![Action::Click {
                at: Point::new(1, 2),
                button: MouseButton::Right,
            }]
        );
    }

    #[test]
    fn horizontal_only_scroll_is_skipped() {
        let executor = FakeExecutor::new();
        let events = [
            Event::new(0.0, EventKind::MouseScroll { x: 5, y: 5, dx: 3, dy: 0 }),
            Event::new(0.0, EventKind::MouseScroll { x: 5, y: 5, dx: 0, dy: -2 }),
        ];
        play(&executor, &events).unwrap();
        assert_eq!(
            executor.taken(),
            vec![Action::Scroll {
                at: Point::new(5, 5),
                amount: -2,
            }]
        );
    }

    #[test]
    fn key_press_dispatch() {
        let executor = FakeExecutor::new();
        let events = [
            Event::new(0.0, EventKind::KeyPress { key: "enter".into() }),
            Event::new(0.0, EventKind::KeyPress { key: "Key.f5".into() }),
            Event::new(0.0, EventKind::KeyPress { key: "a".into() }),
            Event::new(0.0, EventKind::KeyPress { key: "A".into() }),
            // No playback for bare modifiers, releases or unknown names.
            Event::new(0.0, EventKind::KeyPress { key: "ctrl".into() }),
            Event::new(0.0, EventKind::KeyPress { key: "CapsLock".into() }),
            Event::new(0.0, EventKind::KeyRelease { key: "a".into() }),
        ];
        let report = play(&executor, &events).unwrap();
        assert_eq!(
            executor.taken(),
            vec![
                down(KeyCode::Enter),
                up(KeyCode::Enter),
                down(KeyCode::F5),
                up(KeyCode::F5),
                down(KeyCode::A),
                up(KeyCode::A),
                Action::Chord(vec![KeyCode::Shift, KeyCode::A]),
            ]
        );
        assert_eq!(report.executed, 7);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn hotkey_is_one_chord() {
        let executor = FakeExecutor::new();
        let event = Event::new(
            0.0,
            EventKind::Hotkey {
                keys: vec!["ctrl".into(), "c".into()],
            },
        );
        play(&executor, &[event]).unwrap();
        assert_eq!(
            executor.taken(),
            vec![Action::Chord(vec![KeyCode::Ctrl, KeyCode::C])]
        );
    }

    #[test]
    fn hotkey_falls_back_to_ordered_presses() {
        let executor = FakeExecutor::without_chords();
        let event = Event::new(
            0.0,
            EventKind::Hotkey {
                keys: vec!["ctrl".into(), "shift".into(), "t".into()],
            },
        );
        let report = play(&executor, &[event]).unwrap();
        assert_eq!(
            executor.taken(),
            vec![
                down(KeyCode::Ctrl),
                down(KeyCode::Shift),
                down(KeyCode::T),
                up(KeyCode::T),
                up(KeyCode::Shift),
                up(KeyCode::Ctrl),
            ]
        );
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn failed_fallback_still_releases_pressed_keys() {
        let mut executor = FakeExecutor::without_chords();
        executor.fail_when = Some(|a| *a == down(KeyCode::C));
        let event = Event::new(
            0.0,
            EventKind::Hotkey {
                keys: vec!["ctrl".into(), "c".into()],
            },
        );
        let report = play(&executor, &[event]).unwrap();
        assert_eq!(executor.taken(), vec![down(KeyCode::Ctrl), up(KeyCode::Ctrl)]);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn injection_failures_are_counted_and_playback_continues() {
        let executor = FakeExecutor::failing(|a| matches!(a, Action::MoveTo(_)));
        let events = [
            Event::new(0.0, EventKind::MouseMove { x: 1, y: 1 }),
            Event::new(0.0, EventKind::KeyPress { key: "tab".into() }),
            Event::new(0.0, EventKind::MouseMove { x: 2, y: 2 }),
            Event::new(
                0.0,
                EventKind::Hotkey {
                    keys: vec!["ctrl".into(), "NoSuchKey".into()],
                },
            ),
        ];
        let report = play(&executor, &events).unwrap();
        assert_eq!(report.executed, 4);
        assert_eq!(report.failed, 3);
        assert!(!report.is_clean());
        assert_eq!(executor.taken(), vec![down(KeyCode::Tab), up(KeyCode::Tab)]);
    }

    #[test]
    fn characters_without_a_key_fail() {
        let executor = FakeExecutor::new();
        let events = [Event::new(0.0, EventKind::KeyPress { key: "é".into() })];
        let report = play(&executor, &events).unwrap();
        assert_eq!(report.failed, 1);
    }

    fn timed_log(duration: f64) -> Vec<Event> {
        // Key releases have no playback action, so only the delays count.
        (0..=4)
            .map(|i| {
                Event::new(
                    duration * f64::from(i) / 4.0,
                    EventKind::KeyRelease { key: "a".into() },
                )
            })
            .collect()
    }

    #[test]
    fn wall_clock_time_scales_with_speed() {
        let events = timed_log(0.4);
        for factor in [0.5, 1.0, 2.0] {
            let executor = FakeExecutor::new();
            let cancel = CancelToken::new();
            let report = Player::new(&executor, &cancel, quiet())
                .play(&events, Speed::new(factor).unwrap())
                .unwrap();
            let expected = 0.4 / factor;
            let elapsed = report.elapsed.as_secs_f64();
            assert!(elapsed >= expected * 0.95, "{factor}: {elapsed} < {expected}");
            assert!(elapsed < expected + 0.2, "{factor}: {elapsed} vs {expected}");
        }
    }

    #[test]
    fn cancellation_reports_partial_progress() {
        let executor = FakeExecutor::new();
        let cancel = CancelToken::new();
        let events = vec![
            Event::new(0.0, EventKind::MouseMove { x: 1, y: 1 }),
            Event::new(0.0, EventKind::MouseMove { x: 2, y: 2 }),
            Event::new(10.0, EventKind::MouseMove { x: 3, y: 3 }),
        ];

        let result = thread::scope(|s| {
            let remote = cancel.clone();
            s.spawn(move || {
                thread::sleep(Duration::from_millis(100));
                remote.cancel();
            });
            Player::new(&executor, &cancel, quiet()).play(&events, Speed::NORMAL)
        });

        assert!(matches!(result, Err(Error::UserCancelled { completed: 2 })));
        assert_eq!(executor.taken().len(), 2);
    }

    #[test]
    fn cancel_during_pacing_after_last_event_is_reported() {
        let executor = FakeExecutor::new();
        let cancel = CancelToken::new();
        let settings = PlayerSettings {
            pacing: Duration::from_millis(500),
            ..quiet()
        };
        let events = [Event::new(0.0, EventKind::MouseMove { x: 4, y: 4 })];

        let result = thread::scope(|s| {
            let remote = cancel.clone();
            s.spawn(move || {
                thread::sleep(Duration::from_millis(100));
                remote.cancel();
            });
            Player::new(&executor, &cancel, settings).play(&events, Speed::NORMAL)
        });

        assert!(matches!(result, Err(Error::UserCancelled { completed: 1 })));
        assert_eq!(executor.taken().len(), 1);
    }

    #[test]
    fn failsafe_stops_at_the_corner() {
        let executor = FakeExecutor::new();
        let cancel = CancelToken::new();
        let settings = PlayerSettings {
            failsafe: true,
            ..quiet()
        };
        let events = [
            Event::new(0.0, EventKind::MouseMove { x: 0, y: 0 }),
            Event::new(0.0, EventKind::MouseMove { x: 9, y: 9 }),
        ];
        let result = Player::new(&executor, &cancel, settings).play(&events, Speed::NORMAL);
        assert!(matches!(result, Err(Error::FailSafe { completed: 1 })));
    }

    #[test]
    fn failsafe_is_off_by_default() {
        assert!(!PlayerSettings::default().failsafe);
        let executor = FakeExecutor::new();
        let events = [
            Event::new(0.0, EventKind::MouseMove { x: 0, y: 0 }),
            Event::new(0.0, EventKind::MouseMove { x: 9, y: 9 }),
        ];
        assert_eq!(play(&executor, &events).unwrap().executed, 2);
    }
}
