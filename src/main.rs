//! pcmacro -- mouse and keyboard macro recorder and player.
//!
//! Entry point: logging, configuration, Ctrl+C handling and the three
//! subcommands.

mod batch;
mod cli;
mod combo;
mod config;
mod document;
mod encoder;
mod error;
mod event;
mod interrupt;
mod keys;
mod platform;
mod player;
mod recorder;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use batch::{Batch, BatchSettings};
use cli::{Args, Command, StdinPrompt};
use config::Config;
use document::EventLog;
use error::{Error, Result};
use interrupt::CancelToken;
use player::{Player, PlayerSettings, Speed};
use recorder::RecordSettings;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_cancelled() => {
            println!("Cancelled by user.");
            ExitCode::from(interrupt::EXIT_CANCELLED as u8)
        }
        Err(e @ Error::Usage(_)) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let cancel = CancelToken::new();
    interrupt::install(&cancel)?;

    // Pacing and failsafe are fixed here for the life of the process.
    let player_settings = PlayerSettings::from_config(&config.playback);
    log::debug!("main: playback settings {player_settings:?}");

    match args.command {
        Command::Record {
            duration,
            output_dir,
        } => run_record(&config, &cancel, duration, output_dir),
        Command::Play { file, speed } => run_play(&config, &cancel, player_settings, &file, speed),
        Command::Batch { inputs } => run_batch(&config, &cancel, player_settings, inputs),
    }
}

fn run_record(
    config: &Config,
    cancel: &CancelToken,
    duration: Option<f64>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let secs = match duration {
        Some(secs) => secs,
        None => cli::ask_duration(
            &mut io::stdin().lock(),
            &mut io::stdout(),
            config.record.default_duration_secs,
        )?,
    };
    let duration = Duration::try_from_secs_f64(secs)
        .map_err(|_| Error::Usage(format!("unusable recording duration: {secs}")))?;

    let mut settings = RecordSettings::from_config(&config.record, duration);
    if let Some(dir) = output_dir {
        settings.output_dir = dir;
    }
    let mut capture = platform::create_input_capture()?;

    println!("Preparing to record for {secs} seconds.");
    println!("Will record mouse movements, clicks, scrolling and keystrokes.");
    cli::countdown(cancel, config.record.countdown_secs)?;
    println!("RECORDING! Interact normally... (Ctrl+C to cancel)");

    let recording = recorder::record(capture.as_mut(), &settings, cancel)?;

    println!();
    println!("Recording completed!");
    cli::print_log_summary(&recording.log);
    println!("File saved: {}", recording.path.display());
    println!("To play back: pcmacro play {}", recording.path.display());
    Ok(())
}

fn run_play(
    config: &Config,
    cancel: &CancelToken,
    settings: PlayerSettings,
    file: &std::path::Path,
    speed: Speed,
) -> Result<()> {
    let log = EventLog::load(file)?;
    println!("File loaded: {}", file.display());
    cli::print_log_summary(&log);

    println!();
    println!("WARNING: {} real events will be reproduced!", log.events.len());
    if speed != Speed::NORMAL {
        println!("   Configured speed: {speed}");
    }
    if !batch::Prompt::confirm(&mut StdinPrompt, "Continue with playback?")? {
        println!("Playback cancelled.");
        return Ok(());
    }

    let executor = platform::create_action_executor()?;
    cli::countdown(cancel, config.playback.countdown_secs)?;
    println!("PLAYING! (Ctrl+C to stop)");

    let player = Player::new(executor.as_ref(), cancel, settings);
    match player.play(&log.events, speed) {
        Ok(report) => {
            println!();
            println!("Playback completed!");
            println!("   Events executed: {}/{}", report.executed, report.total);
            if !report.is_clean() {
                println!("   Events that failed: {}", report.failed);
            }
            Ok(())
        }
        Err(e @ (Error::UserCancelled { completed } | Error::FailSafe { completed })) => {
            println!();
            println!("Playback stopped.");
            println!("   Events executed: {completed}/{}", log.events.len());
            Err(e)
        }
        Err(e) => Err(e),
    }
}

fn run_batch(
    config: &Config,
    cancel: &CancelToken,
    settings: PlayerSettings,
    inputs: Vec<String>,
) -> Result<()> {
    let (patterns, speed) = cli::split_speed(inputs);
    if patterns.is_empty() {
        return Err(Error::Usage("no files specified".into()));
    }
    let files = cli::expand_inputs(&patterns)?;
    if files.is_empty() {
        return Err(Error::NothingToPlay);
    }
    let pause = config.batch.pause_for(files.len());

    let plan = batch::validate(&files);
    cli::print_plan(&plan, speed, pause);
    if plan.valid.is_empty() {
        return Err(Error::NothingToPlay);
    }

    let executor = platform::create_action_executor()?;
    let player = Player::new(
        executor.as_ref(),
        cancel,
        PlayerSettings {
            progress_every: config.batch.progress_every,
            ..settings
        },
    );
    let batch = Batch::new(
        &player,
        cancel,
        BatchSettings {
            countdown_secs: config.playback.countdown_secs,
            pause,
        },
    );

    let report = match batch.run(&plan, speed, &mut StdinPrompt) {
        Err(Error::UserCancelled { completed: 0 }) => {
            println!("Batch playback cancelled.");
            return Ok(());
        }
        other => other?,
    };

    println!();
    println!("Batch playback finished.");
    println!(
        "   Files processed successfully: {}/{}",
        report.completed, report.valid
    );
    println!("   Total time: {:.1} seconds", report.elapsed.as_secs_f64());
    if report.cancelled {
        return Err(Error::UserCancelled {
            completed: report.completed,
        });
    }
    Ok(())
}
