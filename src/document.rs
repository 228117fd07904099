//! Recording documents: an ordered event log plus summary metadata.
//!
//! Written as
//! `{recording_date, total_events, duration_seconds, event_types, events}`.
//! Older recordings spell the keys `eventos`, `duracion_segundos`,
//! `tipos_eventos` and, per event, `tipo` / `tiempo`. Only `decode` knows
//! about those spellings; everything past it sees `Event` values.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::event::Event;

/// Counts derived from the events of a log.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_events: usize,
    /// Time of the last event, in seconds.
    pub duration_seconds: f64,
    pub event_types: BTreeMap<String, usize>,
}

impl Summary {
    pub fn of(events: &[Event]) -> Self {
        let mut event_types = BTreeMap::new();
        for event in events {
            *event_types.entry(event.kind.name().to_owned()).or_insert(0) += 1;
        }
        Self {
            total_events: events.len(),
            duration_seconds: events.last().map_or(0.0, |e| e.time),
            event_types,
        }
    }
}

/// A finalized recording. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    pub recording_date: String,
    pub summary: Summary,
    pub events: Vec<Event>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    recording_date: &'a str,
    total_events: usize,
    duration_seconds: f64,
    event_types: &'a BTreeMap<String, usize>,
    events: &'a [Event],
}

impl EventLog {
    /// Builds a log from captured events, computing the summary.
    pub fn new(recording_date: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            recording_date: recording_date.into(),
            summary: Summary::of(&events),
            events,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.summary.duration_seconds
    }

    pub fn to_json(&self) -> Result<String> {
        let doc = DocumentRef {
            recording_date: &self.recording_date,
            total_events: self.summary.total_events,
            duration_seconds: self.summary.duration_seconds,
            event_types: &self.summary.event_types,
            events: &self.events,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        log::debug!(
            "document: wrote {} events to {}",
            self.events.len(),
            path.display()
        );
        Ok(())
    }

    /// Reads and validates a recording.
    ///
    /// Fails with `FileNotFound`, `InvalidDocument` or `EmptyLog`; these are
    /// the per-file errors the batch player reports and skips.
    pub fn load(path: &Path) -> Result<EventLog> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            io::ErrorKind::InvalidData => invalid(path, "file is not valid UTF-8"),
            _ => Error::Io(e),
        })?;
        decode(path, &text)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Parses a recording in either key vocabulary.
///
/// `path` is only used for error messages. Events must carry a known `type`
/// and a finite, non-negative, non-decreasing `time`.
pub fn decode(path: &Path, text: &str) -> Result<EventLog> {
    let value: Value = serde_json::from_str(text).map_err(|e| invalid(path, e))?;
    let Value::Object(doc) = value else {
        return Err(invalid(path, "top level is not a JSON object"));
    };

    let items = match field(&doc, "events", "eventos") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid(path, "`events` is not an array")),
        None => return Err(invalid(path, "missing `events`")),
    };

    let mut events = Vec::with_capacity(items.len());
    let mut previous = 0.0_f64;
    for (index, item) in items.iter().enumerate() {
        let event = decode_event(item)
            .map_err(|reason| invalid(path, format!("event {index}: {reason}")))?;
        if !event.time.is_finite() || event.time < 0.0 {
            return Err(invalid(
                path,
                format!("event {index}: time {} is not a non-negative number", event.time),
            ));
        }
        if event.time < previous {
            return Err(invalid(
                path,
                format!(
                    "event {index}: time {} is earlier than the previous event ({previous})",
                    event.time
                ),
            ));
        }
        previous = event.time;
        events.push(event);
    }

    if events.is_empty() {
        return Err(Error::EmptyLog(path.to_path_buf()));
    }

    let recording_date = doc
        .get("recording_date")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let summary = stored_summary(path, &doc, Summary::of(&events));
    Ok(EventLog {
        recording_date,
        summary,
        events,
    })
}

fn decode_event(item: &Value) -> std::result::Result<Event, String> {
    let Value::Object(obj) = item else {
        return Err("not a JSON object".into());
    };
    let mut obj = obj.clone();
    adopt_legacy(&mut obj, "type", "tipo");
    adopt_legacy(&mut obj, "time", "tiempo");
    serde_json::from_value(Value::Object(obj)).map_err(|e| e.to_string())
}

/// Looks a key up under its current name, then its legacy name.
fn field<'a>(obj: &'a Map<String, Value>, current: &str, legacy: &str) -> Option<&'a Value> {
    obj.get(current).or_else(|| obj.get(legacy))
}

/// Moves `legacy` to `current` when only the legacy key is present.
fn adopt_legacy(obj: &mut Map<String, Value>, current: &str, legacy: &str) {
    if obj.contains_key(current) {
        return;
    }
    if let Some(value) = obj.remove(legacy) {
        obj.insert(current.to_owned(), value);
    }
}

/// Counts always come from the events themselves; only the stored duration
/// is kept. Disagreements are logged, not rejected.
fn stored_summary(path: &Path, doc: &Map<String, Value>, computed: Summary) -> Summary {
    let mut summary = computed.clone();

    if let Some(total) = doc.get("total_events").and_then(Value::as_u64) {
        if total as usize != computed.total_events {
            log::warn!(
                "document: {} declares {total} events but holds {}",
                path.display(),
                computed.total_events
            );
        }
    }
    if let Some(duration) =
        field(doc, "duration_seconds", "duracion_segundos").and_then(Value::as_f64)
    {
        summary.duration_seconds = duration;
        // Older recorders rounded the duration to two decimals.
        if (duration - computed.duration_seconds).abs() > 0.01 {
            log::warn!(
                "document: {} declares {duration}s but its last event is at {:.2}s",
                path.display(),
                computed.duration_seconds
            );
        }
    }
    if let Some(types) = field(doc, "event_types", "tipos_eventos") {
        match serde_json::from_value::<BTreeMap<String, usize>>(types.clone()) {
            Ok(declared) if declared != computed.event_types => log::warn!(
                "document: {} has event type counts that do not match its events",
                path.display()
            ),
            Ok(_) => {}
            Err(e) => log::warn!(
                "document: {} has an unreadable event type summary: {e}",
                path.display()
            ),
        }
    }
    summary
}

fn invalid(path: &Path, reason: impl ToString) -> Error {
    Error::InvalidDocument {
        path: PathBuf::from(path),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
