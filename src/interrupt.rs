//! Ctrl+C handling.
//!
//! One SIGINT handler for the whole process. While some operation holds an
//! `Armed` guard, Ctrl+C flips the shared `CancelToken` and the operation
//! winds down on its own. A prompt asked inside an armed section sees the
//! cancel once it has been answered. Outside armed sections (the opening
//! prompts, argument handling) Ctrl+C exits immediately with status 130.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::error::{Error, Result};

/// Upper bound on how long a blocking sleep goes without checking the token.
const SLICE: Duration = Duration::from_millis(20);

pub const EXIT_CANCELLED: i32 = 130;

#[derive(Debug)]
struct Inner {
    armed: AtomicUsize,
    cancelled: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                armed: AtomicUsize::new(0),
                cancelled,
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.cancelled.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Blocks for `duration`, waking early on cancellation.
    /// Returns `false` when the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        // An unrepresentable deadline means "until cancelled".
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_cancelled() {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => SLICE,
            };
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(SLICE.min(remaining));
        }
    }

    /// Routes Ctrl+C to this token until the guard is dropped.
    ///
    /// Arming from idle clears a stale cancellation. Guards nest.
    pub fn arm(&self) -> Armed<'_> {
        if self.inner.armed.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inner.cancelled.send_replace(false);
        }
        Armed { token: self }
    }

    fn is_armed(&self) -> bool {
        self.inner.armed.load(Ordering::SeqCst) > 0
    }
}

#[must_use = "the token is disarmed as soon as the guard is dropped"]
pub struct Armed<'a> {
    token: &'a CancelToken,
}

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        self.token.inner.armed.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Installs the process-wide Ctrl+C handler. Call once, from `main`.
pub fn install(token: &CancelToken) -> Result<()> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        if token.is_armed() {
            log::debug!("interrupt: cancellation requested");
            eprintln!("\nStopping...");
            token.cancel();
        } else {
            eprintln!("\nCancelled.");
            std::process::exit(EXIT_CANCELLED);
        }
    })
    .map_err(|e| Error::Io(std::io::Error::other(format!("cannot install Ctrl+C handler: {e}"))))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_runs_to_completion_without_cancel() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(token.sleep(Duration::from_millis(60)));
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn sleep_wakes_early_on_cancel() {
        let token = CancelToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
        canceller.join().unwrap();
    }

    #[test]
    fn arming_clears_a_stale_cancel() {
        let token = CancelToken::new();
        token.cancel();
        let guard = token.arm();
        assert!(!token.is_cancelled());
        assert!(token.is_armed());
        drop(guard);
        assert!(!token.is_armed());
    }

    #[test]
    fn nested_guards_keep_the_token_armed() {
        let token = CancelToken::new();
        let outer = token.arm();
        {
            let _inner = token.arm();
            token.cancel();
        }
        assert!(token.is_armed());
        // The inner guard must not reset the outer section's cancel.
        assert!(token.is_cancelled());
        drop(outer);
        assert!(!token.is_armed());
    }

    #[test]
    fn async_waiters_see_the_cancel() {
        let token = CancelToken::new();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let remote = token.clone();
        rt.block_on(async move {
            let waiter = token.cancelled();
            remote.cancel();
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("cancel not observed");
        });
    }
}
