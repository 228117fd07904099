//! In-memory executor for tests.

use std::cell::{Cell, RefCell};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{
    Action, ActionExecutor, CaptureCallback, CaptureEvent, CaptureKind, InputCapture, PlatformError,
    Point,
};

/// Records every accepted action. Can be told to reject chords (like a
/// backend without atomic chord injection) or to fail selected actions.
#[derive(Default)]
pub struct FakeExecutor {
    pub actions: RefCell<Vec<Action>>,
    pub chords_unsupported: bool,
    pub fail_when: Option<fn(&Action) -> bool>,
    pub pointer: Cell<Point>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            pointer: Cell::new(Point::new(500, 500)),
            ..Self::default()
        }
    }

    pub fn without_chords() -> Self {
        Self {
            chords_unsupported: true,
            ..Self::new()
        }
    }

    pub fn failing(fail_when: fn(&Action) -> bool) -> Self {
        Self {
            fail_when: Some(fail_when),
            ..Self::new()
        }
    }

    pub fn taken(&self) -> Vec<Action> {
        self.actions.borrow().clone()
    }
}

impl ActionExecutor for FakeExecutor {
    fn execute(&self, action: &Action) -> Result<(), PlatformError> {
        if self.chords_unsupported && matches!(action, Action::Chord(_)) {
            return Err(PlatformError::Unsupported("chord".into()));
        }
        if self.fail_when.is_some_and(|fail| fail(action)) {
            return Err(PlatformError::Other(format!("rejected {action:?}")));
        }
        if let Action::MoveTo(at) | Action::Click { at, .. } | Action::Scroll { at, .. } = action {
            self.pointer.set(*at);
        }
        self.actions.borrow_mut().push(action.clone());
        Ok(())
    }

    fn cursor_position(&self) -> Result<Point, PlatformError> {
        Ok(self.pointer.get())
    }
}

/// Replays a fixed script of input from a background thread, stamping each
/// event when it is delivered.
pub struct FakeCapture {
    script: Vec<(Duration, CaptureKind)>,
    pointer: Point,
    worker: Option<JoinHandle<()>>,
}

impl FakeCapture {
    pub fn new(pointer: Point, script: Vec<(Duration, CaptureKind)>) -> Self {
        Self {
            script,
            pointer,
            worker: None,
        }
    }
}

impl InputCapture for FakeCapture {
    fn start(&mut self, callback: CaptureCallback) -> Result<(), PlatformError> {
        let script = std::mem::take(&mut self.script);
        self.worker = Some(thread::spawn(move || {
            for (delay, kind) in script {
                thread::sleep(delay);
                callback(CaptureEvent::now(kind));
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlatformError> {
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| PlatformError::Other("capture thread panicked".into()))?;
        }
        Ok(())
    }

    fn cursor_position(&self) -> Result<Point, PlatformError> {
        Ok(self.pointer)
    }
}
