//! Structured JSONL logging for benchmark runs.
//!
//! Provides:
//! - [`LogEntry`]: one JSONL record with required + optional fields.
//! - [`LogEmitter`]: writes records to a file or an in-memory capture with
//!   sequential trace ids.
//!
//! Required fields are `timestamp`, `trace_id`, `level` and `event`. The runner
//! emits `run.start`, `trial.start`, `trial.phase`, `trial.complete`,
//! `trial.alloc_failed` and `report.summary`.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::strategy::AllocationStrategy;

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Error,
}

/// Trial phase a timing belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    FirstWrite,
    SecondWrite,
    ThirdWrite,
}

impl Phase {
    /// Console label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::FirstWrite => "first write",
            Self::SecondWrite => "second write",
            Self::ThirdWrite => "third write",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<AllocationStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_bytes: Option<usize>,
    /// Phase duration in microseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_us: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            run_id: None,
            strategy: None,
            phase: None,
            buffer_bytes: None,
            duration_us: None,
            outcome: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set the phase and its duration.
    #[must_use]
    pub fn with_phase(mut self, phase: Phase, duration_us: f64) -> Self {
        self.phase = Some(phase);
        self.duration_us = Some(duration_us);
        self
    }

    #[must_use]
    pub fn with_buffer_bytes(mut self, bytes: usize) -> Self {
        self.buffer_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Set free-form details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// In-memory sink shared with a [`LogEmitter`].
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    /// Parsed entries, skipping lines that fail to decode.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Writes structured JSONL log entries.
pub struct LogEmitter {
    writer: Box<dyn Write>,
    seq: u64,
    run_id: String,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, run_id: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::to_writer(
            Box::new(std::io::BufWriter::new(file)),
            run_id,
        ))
    }

    /// Create an emitter over an arbitrary writer.
    #[must_use]
    pub fn to_writer(writer: Box<dyn Write>, run_id: &str) -> Self {
        Self {
            writer,
            seq: 0,
            run_id: run_id.to_string(),
        }
    }

    /// Create an emitter that writes to memory, returning the readable capture.
    #[must_use]
    pub fn to_capture(run_id: &str) -> (Self, LogCapture) {
        let capture = LogCapture::default();
        (Self::to_writer(Box::new(capture.clone()), run_id), capture)
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("lazyalloc::{}::{:03}", self.run_id, self.seq)
    }

    /// Start an entry with a fresh trace id and the emitter's run id.
    pub fn entry(&mut self, level: LogLevel, event: &str) -> LogEntry {
        let trace_id = self.next_trace_id();
        LogEntry::new(trace_id, level, event).with_run(self.run_id.clone())
    }

    /// Emit a bare entry with auto-generated trace id.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let entry = self.entry(level, event);
        self.write_line(&entry)?;
        Ok(entry)
    }

    /// Emit a fully-populated entry, filling trace and run ids if missing.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        if entry.run_id.is_none() {
            entry.run_id = Some(self.run_id.clone());
        }
        self.write_line(&entry)
    }

    fn write_line(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let line = entry.to_jsonl().map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60,
    )
}

// Days since 1970-01-01 to proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_serializes_required_fields() {
        let entry = LogEntry::new("lazyalloc::run-1::001", LogLevel::Info, "trial.start");
        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["timestamp"].is_string());
        assert_eq!(parsed["trace_id"], "lazyalloc::run-1::001");
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["event"], "trial.start");
        // Optional fields should be absent
        assert!(parsed.get("run_id").is_none());
        assert!(parsed.get("strategy").is_none());
        assert!(parsed.get("phase").is_none());
        assert!(parsed.get("duration_us").is_none());
    }

    #[test]
    fn log_entry_with_optional_fields() {
        let entry = LogEntry::new("lazyalloc::run-1::002", LogLevel::Info, "trial.phase")
            .with_run("run-1")
            .with_strategy(AllocationStrategy::Touched)
            .with_phase(Phase::FirstWrite, 1234.5)
            .with_buffer_bytes(4096)
            .with_outcome(Outcome::Pass)
            .with_details(serde_json::json!({"pages": 1}));

        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["run_id"], "run-1");
        assert_eq!(parsed["strategy"], "touched");
        assert_eq!(parsed["phase"], "first_write");
        assert_eq!(parsed["duration_us"], 1234.5);
        assert_eq!(parsed["buffer_bytes"], 4096);
        assert_eq!(parsed["outcome"], "pass");
        assert_eq!(parsed["details"]["pages"], 1);
    }

    #[test]
    fn emitter_generates_sequential_trace_ids() {
        let (mut emitter, capture) = LogEmitter::to_capture("run-42");
        let e1 = emitter.emit(LogLevel::Info, "start").unwrap();
        let e2 = emitter.emit(LogLevel::Info, "end").unwrap();
        assert_eq!(e1.trace_id, "lazyalloc::run-42::001");
        assert_eq!(e2.trace_id, "lazyalloc::run-42::002");

        let entries = capture.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].event, "end");
        assert_eq!(entries[1].run_id.as_deref(), Some("run-42"));
    }

    #[test]
    fn emit_entry_fills_missing_ids() {
        let (mut emitter, capture) = LogEmitter::to_capture("run-7");
        emitter
            .emit_entry(LogEntry::new("", LogLevel::Warn, "custom"))
            .unwrap();
        let entries = capture.entries();
        assert_eq!(entries[0].trace_id, "lazyalloc::run-7::001");
        assert_eq!(entries[0].run_id.as_deref(), Some("run-7"));
    }

    #[test]
    fn emitter_writes_jsonl_file() {
        let path = std::env::temp_dir().join(format!(
            "lazyalloc-structured-log-{}.jsonl",
            std::process::id()
        ));
        {
            let mut emitter = LogEmitter::to_file(&path, "file-run").unwrap();
            emitter.emit(LogLevel::Info, "run.start").unwrap();
            emitter.flush().unwrap();
        }
        let body = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let parsed: serde_json::Value = serde_json::from_str(body.trim()).unwrap();
        assert_eq!(parsed["event"], "run.start");
    }

    #[test]
    fn roundtrip_deserialization() {
        let entry = LogEntry::new("lazyalloc::run-1::001", LogLevel::Warn, "trial.phase")
            .with_phase(Phase::SecondWrite, 25.0);
        let json = entry.to_jsonl().unwrap();
        let restored: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.level, LogLevel::Warn);
        assert_eq!(restored.phase, Some(Phase::SecondWrite));
        assert_eq!(restored.duration_us, Some(25.0));
    }

    #[test]
    fn utc_formatting_is_calendar_exact() {
        assert_eq!(format_utc(0, 0), "1970-01-01T00:00:00.000Z");
        // 2000-02-29 12:34:56
        assert_eq!(format_utc(951_827_696, 7), "2000-02-29T12:34:56.007Z");
        // 2026-10-16 00:00:00
        assert_eq!(format_utc(1_792_108_800, 999), "2026-10-16T00:00:00.999Z");
    }
}
