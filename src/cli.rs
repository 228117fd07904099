//! Command-line surface: argument parsing, prompts, countdowns and the
//! summaries printed for the operator.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::batch::{self, Plan, Prompt};
use crate::document::EventLog;
use crate::error::{Error, Result};
use crate::interrupt::CancelToken;
use crate::player::Speed;

#[derive(Parser, Debug)]
#[command(name = "pcmacro", version, about = "Record and replay mouse and keyboard input")]
pub struct Args {
    /// Configuration file (default: $XDG_CONFIG_HOME/pcmacro/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record mouse and keyboard input to a timestamped JSON file
    Record {
        /// Seconds to record; asked interactively when omitted
        #[arg(long, value_parser = parse_duration)]
        duration: Option<f64>,
        /// Directory for the recording
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Replay one recording
    Play {
        file: PathBuf,
        /// Speed factor: 0.5 is slower, 2.0 is faster. Must be a positive
        /// number; anything else is rejected
        #[arg(value_parser = parse_speed, default_value = "1.0")]
        speed: Speed,
    },
    /// Replay several recordings in sequence
    Batch {
        /// Files or glob patterns, optionally followed by a speed factor
        #[arg(required = true, num_args = 1.., value_name = "FILE|GLOB... [SPEED]")]
        inputs: Vec<String>,
    },
}

fn parse_speed(s: &str) -> std::result::Result<Speed, String> {
    s.parse::<Speed>().map_err(|e| e.to_string())
}

fn parse_duration(s: &str) -> std::result::Result<f64, String> {
    match s.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(secs),
        Ok(_) => Err("duration must be greater than 0".into()),
        Err(_) => Err(format!("not a number: {s}")),
    }
}

// ---------------------------------------------------------------------------
// Batch inputs
// ---------------------------------------------------------------------------

/// Splits a trailing speed factor off the batch arguments.
///
/// The last argument counts as the speed only when it parses as a positive
/// number; otherwise every argument is a file or pattern.
pub fn split_speed(mut inputs: Vec<String>) -> (Vec<String>, Speed) {
    match inputs.last().and_then(|last| last.parse::<Speed>().ok()) {
        Some(speed) => {
            inputs.pop();
            (inputs, speed)
        }
        None => (inputs, Speed::NORMAL),
    }
}

fn is_pattern(arg: &str) -> bool {
    arg.contains(['*', '?', '['])
}

/// Expands glob patterns, each sorted on its own; plain paths are kept
/// as given, in order. Patterns that match nothing are reported and skipped.
pub fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for arg in inputs {
        if !is_pattern(arg) {
            files.push(PathBuf::from(arg));
            continue;
        }
        let mut matched: Vec<PathBuf> = Vec::new();
        for entry in glob::glob(arg)? {
            match entry {
                Ok(path) => matched.push(path),
                Err(e) => log::warn!("batch: cannot read {}: {e}", e.path().display()),
            }
        }
        if matched.is_empty() {
            println!("No files found matching: {arg}");
        }
        matched.sort();
        files.extend(matched);
    }
    Ok(files)
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Asks on stdout and reads the answer from stdin. End of input is "no".
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        confirm(&mut io::stdin().lock(), &mut io::stdout(), question)
    }
}

fn confirm(input: &mut impl BufRead, output: &mut impl Write, question: &str) -> Result<bool> {
    write!(output, "{question} (y/N): ")?;
    output.flush()?;
    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(output)?;
        return Ok(false);
    }
    Ok(batch::is_yes(&answer))
}

/// Asks for the recording length until a positive number (or nothing, for
/// the default) is entered. End of input cancels.
pub fn ask_duration(
    input: &mut impl BufRead,
    output: &mut impl Write,
    default: f64,
) -> Result<f64> {
    loop {
        write!(output, "How many seconds to record? (Enter for {default}): ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Err(Error::UserCancelled { completed: 0 });
        }
        let line = line.trim();
        if line.is_empty() {
            return Ok(default);
        }
        match line.parse::<f64>() {
            Ok(secs) if secs.is_finite() && secs > 0.0 => return Ok(secs),
            Ok(_) => writeln!(output, "Time must be greater than 0")?,
            Err(_) => writeln!(output, "Please enter a valid number")?,
        }
    }
}

/// Prints `secs` ticks, one per second. Ctrl+C cuts it short.
pub fn countdown(cancel: &CancelToken, secs: u32) -> Result<()> {
    let _armed = cancel.arm();
    if secs > 0 {
        println!("Starting in:");
    }
    for remaining in (1..=secs).rev() {
        println!("  {remaining}...");
        if !cancel.sleep(std::time::Duration::from_secs(1)) {
            return Err(Error::UserCancelled { completed: 0 });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

pub fn print_log_summary(log: &EventLog) {
    println!("   Total events: {}", log.summary.total_events);
    println!("   Duration: {} seconds", log.summary.duration_seconds);
    if !log.summary.event_types.is_empty() {
        println!("   Event types:");
        for (kind, count) in &log.summary.event_types {
            println!("      {kind}: {count}");
        }
    }
}

pub fn print_plan(plan: &Plan, speed: Speed, pause: std::time::Duration) {
    println!("Validating files...");
    for (path, log) in &plan.valid {
        println!("   ok   {} - {} events", path.display(), log.events.len());
    }
    for rejected in &plan.rejected {
        println!("   skip {} - {}", rejected.path.display(), rejected.error);
    }
    if plan.valid.is_empty() {
        return;
    }
    println!();
    println!("Summary:");
    println!("   Valid files: {}", plan.valid.len());
    println!("   Total events: {}", plan.total_events());
    println!("   Total duration: {:.1} seconds", plan.total_duration());
    println!("   Speed: {speed}");
    println!("   Pause between files: {}s", pause.as_secs_f64());
    println!();
    println!(
        "WARNING: {} real events will be reproduced!",
        plan.total_events()
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
