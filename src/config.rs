//! TOML configuration.
//!
//! Every key is optional; a missing file means all defaults.
//!
//! ```toml
//! [record]
//! default_duration_secs = 10.0
//! countdown_secs = 3
//! capture_queue = 4096
//! collapse_repeated_hotkeys = false
//! output_dir = "."
//!
//! [playback]
//! countdown_secs = 5
//! progress_every = 20
//! pacing_ms = 10
//! failsafe = false
//!
//! [batch]
//! pause_secs = 2.0
//! crowded_pause_secs = 1.0
//! crowded_threshold = 5
//! progress_every = 50
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub record: RecordConfig,
    pub playback: PlaybackConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordConfig {
    /// Offered when the duration prompt is left empty.
    pub default_duration_secs: f64,
    pub countdown_secs: u32,
    /// Capacity of the queue between the capture thread and the encoder.
    pub capture_queue: usize,
    /// Record a held hotkey once instead of once per key repeat.
    pub collapse_repeated_hotkeys: bool,
    pub output_dir: PathBuf,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: 10.0,
            countdown_secs: 3,
            capture_queue: 4096,
            collapse_repeated_hotkeys: false,
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    pub countdown_secs: u32,
    /// Log progress every this many events; 0 disables.
    pub progress_every: usize,
    /// Minimum pause after every injected action.
    pub pacing_ms: u64,
    /// Abort playback when the pointer is parked at (0, 0).
    pub failsafe: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 5,
            progress_every: 20,
            pacing_ms: 10,
            failsafe: false,
        }
    }
}

impl PlaybackConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub pause_secs: f64,
    /// Used instead of `pause_secs` when the batch has more than
    /// `crowded_threshold` files.
    pub crowded_pause_secs: f64,
    pub crowded_threshold: usize,
    pub progress_every: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            pause_secs: 2.0,
            crowded_pause_secs: 1.0,
            crowded_threshold: 5,
            progress_every: 50,
        }
    }
}

impl BatchConfig {
    /// Pause between consecutive files of a batch of `files` files.
    pub fn pause_for(&self, files: usize) -> Duration {
        let secs = if files > self.crowded_threshold {
            self.crowded_pause_secs
        } else {
            self.pause_secs
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

impl Config {
    /// Loads `explicit` if given, else the per-user default file.
    ///
    /// An explicit path must exist; the default one may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_path() {
                Some(path) => match Self::from_file(&path) {
                    Err(Error::FileNotFound(_)) => {
                        log::debug!("config: no file at {}, using defaults", path.display());
                        Ok(Config::default())
                    }
                    other => other,
                },
                None => Ok(Config::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;
        let config = Self::parse(path, &text)?;
        log::info!("config: loaded {}", path.display());
        Ok(config)
    }

    fn parse(path: &Path, text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let bad = |message: &str| -> Result<()> {
            Err(Error::Config {
                path: path.to_path_buf(),
                message: message.to_owned(),
            })
        };
        let duration = self.record.default_duration_secs;
        if !(duration.is_finite() && duration > 0.0) {
            return bad("record.default_duration_secs must be greater than 0");
        }
        if self.record.capture_queue == 0 {
            return bad("record.capture_queue must be at least 1");
        }
        let pause = |secs: f64| secs.is_finite() && secs >= 0.0;
        if !pause(self.batch.pause_secs) || !pause(self.batch.crowded_pause_secs) {
            return bad("batch pauses must be non-negative numbers");
        }
        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/pcmacro/config.toml`, falling back to `$HOME/.config`.
pub fn default_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(config_dir.join("pcmacro").join("config.toml"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Config> {
        Config::parse(Path::new("test.toml"), text)
    }

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(parse("").unwrap(), Config::default());
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.record.default_duration_secs, 10.0);
        assert_eq!(config.record.countdown_secs, 3);
        assert_eq!(config.playback.countdown_secs, 5);
        assert_eq!(config.playback.progress_every, 20);
        assert_eq!(config.playback.pacing(), Duration::from_millis(10));
        assert!(!config.playback.failsafe);
        assert_eq!(config.batch.progress_every, 50);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse(
            r#"
            [playback]
            failsafe = true

            [record]
            collapse_repeated_hotkeys = true
            "#,
        )
        .unwrap();
        assert!(config.playback.failsafe);
        assert_eq!(config.playback.pacing_ms, 10);
        assert!(config.record.collapse_repeated_hotkeys);
        assert_eq!(config.record.capture_queue, 4096);
    }

    #[test]
    fn crowded_batches_use_the_short_pause() {
        let batch = BatchConfig::default();
        assert_eq!(batch.pause_for(5), Duration::from_secs(2));
        assert_eq!(batch.pause_for(6), Duration::from_secs(1));
    }

    #[test]
    fn syntax_errors_carry_a_location() {
        let err = parse("[record\ncountdown_secs = 3").unwrap_err();
        let Error::Config { message, .. } = err else {
            panic!("expected a config error");
        };
        assert!(message.contains("line"), "{message}");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse("[playback]\nspeed = 2.0").is_err());
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        assert!(parse("[record]\ndefault_duration_secs = 0").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn explicit_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[batch]\npause_secs = 0.5\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.batch.pause_secs, 0.5);
    }
}
