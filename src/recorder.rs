//! Recording runtime.
//!
//! The capture backend calls back from its own thread. Callbacks only push
//! into a bounded queue; a single consumer on a current-thread tokio
//! runtime owns the encoder session and is the only writer of the log.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tokio::sync::mpsc;

use crate::config::RecordConfig;
use crate::document::EventLog;
use crate::encoder::Session;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::interrupt::CancelToken;
use crate::platform::{CaptureEvent, InputCapture};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSettings {
    pub duration: Duration,
    pub capture_queue: usize,
    pub collapse_repeated_hotkeys: bool,
    pub output_dir: PathBuf,
}

impl RecordSettings {
    pub fn from_config(config: &RecordConfig, duration: Duration) -> Self {
        Self {
            duration,
            capture_queue: config.capture_queue.max(1),
            collapse_repeated_hotkeys: config.collapse_repeated_hotkeys,
            output_dir: config.output_dir.clone(),
        }
    }
}

/// A saved recording.
#[derive(Debug)]
pub struct Recording {
    pub path: PathBuf,
    pub log: EventLog,
}

/// `<YYYYMMDD_HHMMSS>.json`
pub fn file_name(at: &DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S.json").to_string()
}

/// Records for `settings.duration`, then writes the log to
/// `<output_dir>/<YYYYMMDD_HHMMSS>.json`.
///
/// Ctrl+C discards the capture and returns `UserCancelled` with the number
/// of events that were thrown away. A recording with no events is not
/// written and returns `EmptyLog`.
pub fn record(
    capture: &mut dyn InputCapture,
    settings: &RecordSettings,
    cancel: &CancelToken,
) -> Result<Recording> {
    let recording_date = Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
    let events = capture_events(capture, settings, cancel)?;

    let path = settings.output_dir.join(file_name(&Local::now()));
    if events.is_empty() {
        return Err(Error::EmptyLog(path));
    }

    let log = EventLog::new(recording_date, events);
    save(&path, &log)?;
    log::info!(
        "recorder: saved {} events ({:.2}s) to {}",
        log.summary.total_events,
        log.duration_seconds(),
        path.display()
    );
    Ok(Recording { path, log })
}

fn save(path: &Path, log: &EventLog) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    log.save(path)
}

/// Runs one capture session and returns the encoded events.
pub fn capture_events(
    capture: &mut dyn InputCapture,
    settings: &RecordSettings,
    cancel: &CancelToken,
) -> Result<Vec<Event>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let _armed = cancel.arm();

    let (tx, mut rx) = mpsc::channel::<CaptureEvent>(settings.capture_queue);
    let dropped = Arc::new(AtomicUsize::new(0));
    let dropped_in_hook = Arc::clone(&dropped);

    let mut session = Session::new(settings.collapse_repeated_hotkeys);
    let pointer = match capture.cursor_position() {
        Ok(at) => Some(at),
        Err(e) => {
            log::debug!("recorder: no initial pointer position: {e}");
            None
        }
    };
    session.start(Instant::now(), pointer);

    capture.start(Box::new(move |event| match tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            if dropped_in_hook.fetch_add(1, Ordering::Relaxed) == 0 {
                log::warn!("recorder: capture queue full, dropping events");
            }
        }
        // The consumer has finished; late events are discarded.
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }))?;
    log::info!(
        "recorder: recording for {:.1}s",
        settings.duration.as_secs_f64()
    );

    let cancelled = runtime.block_on(async {
        let deadline = tokio::time::sleep(settings.duration);
        tokio::pin!(deadline);
        let mut connected = true;
        loop {
            tokio::select! {
                _ = &mut deadline => break false,
                _ = cancel.cancelled() => break true,
                received = rx.recv(), if connected => match received {
                    Some(event) => session.push(event),
                    None => {
                        log::warn!("recorder: capture stopped delivering events early");
                        connected = false;
                    }
                },
            }
        }
    });
    let stopped_at = Instant::now();
    log::debug!("recorder: window closed with {} events", session.len());

    let stopped = capture.stop();
    // Keep what the hook saw before the stop; anything later is not part of
    // the recording window.
    rx.close();
    while let Ok(event) = rx.try_recv() {
        if event.at <= stopped_at {
            session.push(event);
        }
    }
    let events = session.finish();
    stopped?;

    let lost = dropped.load(Ordering::Relaxed);
    if lost > 0 {
        log::warn!("recorder: {lost} events were dropped because the capture queue was full");
    }

    if cancelled {
        log::info!("recorder: cancelled, discarding {} events", events.len());
        return Err(Error::UserCancelled {
            completed: events.len(),
        });
    }
    Ok(events)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::platform::fake::FakeCapture;
    use crate::platform::{CaptureKind, KeyCode, KeyState, Point, RawKey};
    use chrono::TimeZone;

    fn settings(dir: &Path, millis: u64) -> RecordSettings {
        RecordSettings {
            duration: Duration::from_millis(millis),
            capture_queue: 64,
            collapse_repeated_hotkeys: false,
            output_dir: dir.to_path_buf(),
        }
    }

    fn motion(x: i32, y: i32) -> CaptureKind {
        CaptureKind::Motion {
            at: Point::new(x, y),
        }
    }

    fn key(code: KeyCode, state: KeyState) -> CaptureKind {
        CaptureKind::Key {
            key: RawKey::Key(code),
            state,
        }
    }

    #[test]
    fn file_names_are_timestamps() {
        let at = Local.with_ymd_and_hms(2025, 1, 15, 14, 30, 22).unwrap();
        assert_eq!(file_name(&at), "20250115_143022.json");
    }

    #[test]
    fn records_and_saves_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let step = Duration::from_millis(10);
        let mut capture = FakeCapture::new(
            Point::new(0, 0),
            vec![
                (step, motion(10, 10)),
                (step, motion(10, 10)),
                (step, key(KeyCode::Ctrl, KeyState::Down)),
                (step, key(KeyCode::C, KeyState::Down)),
                (step, key(KeyCode::C, KeyState::Up)),
                (step, key(KeyCode::Ctrl, KeyState::Up)),
            ],
        );
        let cancel = CancelToken::new();

        let recording = record(&mut capture, &settings(dir.path(), 400), &cancel).unwrap();

        let kinds: Vec<&EventKind> = recording.log.events.iter().map(|e| &e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &EventKind::MouseMove { x: 10, y: 10 },
                &EventKind::KeyPress { key: "ctrl".into() },
                &EventKind::Hotkey {
                    keys: vec!["ctrl".into(), "c".into()]
                },
                &EventKind::KeyRelease { key: "c".into() },
            ]
        );
        assert!(recording.path.starts_with(dir.path()));
        assert_eq!(EventLog::load(&recording.path).unwrap(), recording.log);
    }

    #[test]
    fn recording_lasts_the_requested_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mut capture = FakeCapture::new(Point::new(0, 0), vec![(Duration::ZERO, motion(1, 1))]);
        let cancel = CancelToken::new();
        let started = Instant::now();
        record(&mut capture, &settings(dir.path(), 200), &cancel).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn nothing_captured_is_an_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut capture = FakeCapture::new(Point::new(0, 0), Vec::new());
        let cancel = CancelToken::new();
        let err = record(&mut capture, &settings(dir.path(), 50), &cancel).unwrap_err();
        assert!(matches!(err, Error::EmptyLog(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn cancel_discards_the_capture() {
        let dir = tempfile::tempdir().unwrap();
        let mut capture = FakeCapture::new(
            Point::new(0, 0),
            vec![(Duration::ZERO, motion(1, 1)), (Duration::ZERO, motion(2, 2))],
        );
        let cancel = CancelToken::new();

        let result = std::thread::scope(|s| {
            let remote = cancel.clone();
            s.spawn(move || {
                std::thread::sleep(Duration::from_millis(150));
                remote.cancel();
            });
            record(&mut capture, &settings(dir.path(), 10_000), &cancel)
        });

        assert!(matches!(result, Err(Error::UserCancelled { completed: 2 })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
