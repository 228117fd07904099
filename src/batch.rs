//! Batch orchestration: validate many recordings, confirm once, then play
//! them back to back.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::document::EventLog;
use crate::error::{Error, Result};
use crate::interrupt::CancelToken;
use crate::player::{Player, Speed};

// ---------------------------------------------------------------------------
// Confirmation
// ---------------------------------------------------------------------------

/// Yes/no questions asked of the operator.
pub trait Prompt {
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Answers accepted as "yes". Anything else, including an empty line, is no.
pub fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "s" | "si" | "sí"
    )
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Rejected {
    pub path: PathBuf,
    pub error: Error,
}

/// The outcome of validating every candidate file. Order is input order.
#[derive(Debug, Default)]
pub struct Plan {
    pub valid: Vec<(PathBuf, EventLog)>,
    pub rejected: Vec<Rejected>,
}

impl Plan {
    pub fn total_events(&self) -> usize {
        self.valid.iter().map(|(_, log)| log.events.len()).sum()
    }

    pub fn total_duration(&self) -> f64 {
        self.valid.iter().map(|(_, log)| log.duration_seconds()).sum()
    }
}

/// Loads every file. A file that fails to load is recorded with its reason;
/// validation itself never fails.
pub fn validate(paths: &[PathBuf]) -> Plan {
    let mut plan = Plan::default();
    for path in paths {
        match EventLog::load(path) {
            Ok(log) => {
                log::info!("batch: {} ok, {} events", path.display(), log.events.len());
                plan.valid.push((path.clone(), log));
            }
            Err(error) => {
                log::warn!("batch: skipping {}: {error}", path.display());
                plan.rejected.push(Rejected {
                    path: path.clone(),
                    error,
                });
            }
        }
    }
    plan
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSettings {
    /// Cancellable wait between confirmation and the first file.
    pub countdown_secs: u32,
    pub pause: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Files played without a single failed event.
    pub completed: usize,
    pub valid: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

pub struct Batch<'a> {
    player: &'a Player<'a>,
    cancel: &'a CancelToken,
    settings: BatchSettings,
}

impl<'a> Batch<'a> {
    pub fn new(player: &'a Player<'a>, cancel: &'a CancelToken, settings: BatchSettings) -> Self {
        Self {
            player,
            cancel,
            settings,
        }
    }

    /// Asks for confirmation, then plays every valid file in order.
    ///
    /// Declining the confirmation is `UserCancelled { completed: 0 }`.
    /// Ctrl+C at any later point, including the prompt after a failed file,
    /// stops the batch and is reported through `BatchReport::cancelled`.
    /// A failsafe abort is returned as an error.
    pub fn run(&self, plan: &Plan, speed: Speed, prompt: &mut dyn Prompt) -> Result<BatchReport> {
        let valid = plan.valid.len();
        if !prompt.confirm("Continue with batch playback?")? {
            return Err(Error::UserCancelled { completed: 0 });
        }
        let _armed = self.cancel.arm();

        let started = Instant::now();
        let mut completed = 0;
        let report = |completed, cancelled| BatchReport {
            completed,
            valid,
            cancelled,
            elapsed: started.elapsed(),
        };

        if !self.countdown() {
            return Ok(report(0, true));
        }

        for (index, (path, log)) in plan.valid.iter().enumerate() {
            log::info!(
                "batch: [{}/{valid}] playing {} ({} events)",
                index + 1,
                display_name(path),
                log.events.len()
            );
            let file_started = Instant::now();
            let succeeded = match self.player.play(&log.events, speed) {
                Ok(played) if played.failed == 0 => {
                    log::info!(
                        "batch: {} completed in {:.1}s",
                        display_name(path),
                        file_started.elapsed().as_secs_f64()
                    );
                    true
                }
                Ok(played) => {
                    log::warn!(
                        "batch: {} finished with {}/{} failed events after {:.1}s",
                        display_name(path),
                        played.failed,
                        played.total,
                        file_started.elapsed().as_secs_f64()
                    );
                    false
                }
                Err(Error::UserCancelled { completed: events }) => {
                    log::info!(
                        "batch: interrupted in {} after {events}/{} events",
                        display_name(path),
                        log.events.len()
                    );
                    return Ok(report(completed, true));
                }
                Err(e @ Error::FailSafe { .. }) => return Err(e),
                Err(e) => {
                    log::warn!("batch: {} failed: {e}", display_name(path));
                    false
                }
            };

            if succeeded {
                completed += 1;
            } else {
                let go_on = prompt.confirm("Continue with next file?")?;
                if self.cancel.is_cancelled() {
                    log::info!("batch: interrupted at the prompt after {}", display_name(path));
                    return Ok(report(completed, true));
                }
                if !go_on {
                    break;
                }
            }

            if index + 1 < valid {
                log::info!(
                    "batch: pausing {:.1}s before the next file",
                    self.settings.pause.as_secs_f64()
                );
                if !self.cancel.sleep(self.settings.pause) {
                    return Ok(report(completed, true));
                }
            }
        }

        Ok(report(completed, false))
    }

    fn countdown(&self) -> bool {
        for remaining in (1..=self.settings.countdown_secs).rev() {
            println!("  {remaining}...");
            if !self.cancel.sleep(Duration::from_secs(1)) {
                return false;
            }
        }
        true
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
