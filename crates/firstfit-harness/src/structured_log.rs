//! Structured logging contract for arena demo and stress workflows.
//!
//! Provides:
//! - [`LogEntry`]: canonical JSONL log record with required + optional fields.
//! - [`ArtifactIndex`]: links logs to run artifacts with SHA-256 integrity.
//! - [`LogEmitter`]: writes JSONL lines to a file or an in-memory buffer.
//! - [`validate_log_line`]: validates a single JSONL line against the schema.
//! - [`validate_log_file`]: validates an entire JSONL file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use firstfit_core::{ArenaLogLevel, ArenaLogRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::HarnessError;

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<ArenaLogLevel> for LogLevel {
    fn from(level: ArenaLogLevel) -> Self {
        match level {
            ArenaLogLevel::Trace => Self::Trace,
            ArenaLogLevel::Debug => Self::Debug,
            ArenaLogLevel::Info => Self::Info,
            ArenaLogLevel::Warn => Self::Warn,
            ArenaLogLevel::Error => Self::Error,
        }
    }
}

/// Step or run outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
}

/// Which workflow produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Arena lifecycle records forwarded from the core crate.
    Arena,
    Demo,
    Stress,
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const OUTCOMES: [&str; 3] = ["pass", "fail", "skip"];
const STREAMS: [&str; 3] = ["arena", "demo", "stress"];

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
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
    pub stream: Option<StreamKind>,
    /// Arena operation (`allocate`, `release`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Core decision id the entry was derived from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<u64>,
    /// Step number inside a scripted or generated run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptr: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_allocated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_free: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_blocks: Option<usize>,
    /// Wall-clock duration of a step or run (milliseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_refs: Option<Vec<String>>,
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
            stream: None,
            symbol: None,
            decision_id: None,
            step: None,
            ptr: None,
            size: None,
            outcome: None,
            bytes_allocated: None,
            bytes_free: None,
            free_blocks: None,
            duration_ms: None,
            artifact_refs: None,
            details: None,
        }
    }

    /// Convert a core lifecycle record, keeping its trace id and snapshot.
    #[must_use]
    pub fn from_arena_record(record: &ArenaLogRecord) -> Self {
        let mut entry = Self::new(&record.trace_id, record.level.into(), record.event)
            .with_stream(StreamKind::Arena)
            .with_symbol(record.symbol)
            .with_snapshot(record.bytes_allocated, record.bytes_free, record.free_blocks)
            .with_details(serde_json::json!({
                "outcome": record.outcome,
                "details": record.details,
            }));
        entry.decision_id = Some(record.decision_id);
        entry.ptr = record.ptr;
        entry.size = record.size;
        entry
    }

    /// Set the stream kind.
    #[must_use]
    pub fn with_stream(mut self, stream: StreamKind) -> Self {
        self.stream = Some(stream);
        self
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    #[must_use]
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }

    /// Set the address and size involved.
    #[must_use]
    pub fn with_block(mut self, ptr: Option<usize>, size: Option<usize>) -> Self {
        self.ptr = ptr;
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Attach an arena counter snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, bytes_allocated: usize, bytes_free: usize, free_blocks: usize) -> Self {
        self.bytes_allocated = Some(bytes_allocated);
        self.bytes_free = Some(bytes_free);
        self.free_blocks = Some(free_blocks);
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn with_artifacts(mut self, refs: Vec<String>) -> Self {
        self.artifact_refs = Some(refs);
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
// Artifact index
// ---------------------------------------------------------------------------

/// A single artifact entry in the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Artifact index linking logs and reports of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub index_version: u32,
    pub run_id: String,
    pub generated_utc: String,
    pub artifacts: Vec<ArtifactEntry>,
}

/// One artifact whose file no longer matches its index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMismatch {
    pub path: String,
    pub expected: String,
    /// `None` when the file could not be read.
    pub actual: Option<String>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            index_version: 1,
            run_id: run_id.into(),
            generated_utc: now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Add an artifact entry with a known digest.
    pub fn add(
        &mut self,
        path: impl Into<String>,
        kind: impl Into<String>,
        sha256: impl Into<String>,
    ) -> &mut Self {
        self.artifacts.push(ArtifactEntry {
            path: path.into(),
            kind: kind.into(),
            sha256: sha256.into(),
            size_bytes: None,
            description: None,
        });
        self
    }

    /// Hash `path` and add it. The entry records the path relative to
    /// `root` when possible.
    pub fn add_file(
        &mut self,
        root: &Path,
        path: &Path,
        kind: impl Into<String>,
        description: Option<String>,
    ) -> Result<&mut Self, HarnessError> {
        let data = std::fs::read(path)?;
        let recorded = path.strip_prefix(root).unwrap_or(path);
        self.artifacts.push(ArtifactEntry {
            path: recorded.display().to_string(),
            kind: kind.into(),
            sha256: sha256_hex(&data),
            size_bytes: Some(data.len() as u64),
            description,
        });
        Ok(self)
    }

    /// Re-hash every artifact relative to `root` and report mismatches.
    #[must_use]
    pub fn verify(&self, root: &Path) -> Vec<ArtifactMismatch> {
        self.artifacts
            .iter()
            .filter_map(|artifact| {
                let candidate = Path::new(&artifact.path);
                let resolved = if candidate.is_absolute() {
                    candidate.to_path_buf()
                } else {
                    root.join(candidate)
                };
                let actual = std::fs::read(&resolved).ok().map(|data| sha256_hex(&data));
                let matches = actual
                    .as_deref()
                    .is_some_and(|digest| digest.eq_ignore_ascii_case(&artifact.sha256));
                (!matches).then(|| ArtifactMismatch {
                    path: artifact.path.clone(),
                    expected: artifact.sha256.clone(),
                    actual,
                })
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Lowercase hex SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    use std::fmt::Write as _;
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

enum Sink {
    File(BufWriter<File>),
    Buffer(Vec<u8>),
}

impl Sink {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::File(file) => file,
            Self::Buffer(buffer) => buffer,
        }
    }
}

/// Writes structured JSONL log entries to a file or a buffer.
pub struct LogEmitter {
    sink: Sink,
    seq: u64,
    run_id: String,
    stream: StreamKind,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, stream: StreamKind, run_id: &str) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::with_sink(
            Sink::File(BufWriter::new(file)),
            stream,
            run_id,
        ))
    }

    /// Create an emitter that writes to an in-memory buffer.
    #[must_use]
    pub fn to_buffer(stream: StreamKind, run_id: &str) -> Self {
        Self::with_sink(Sink::Buffer(Vec::new()), stream, run_id)
    }

    fn with_sink(sink: Sink, stream: StreamKind, run_id: &str) -> Self {
        Self {
            sink,
            seq: 0,
            run_id: run_id.to_string(),
            stream,
        }
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("harness::{}::{:03}", self.run_id, self.seq)
    }

    /// Emit a bare entry with an auto-generated trace id.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(trace_id, level, event);
        self.emit_entry(entry.clone())?;
        Ok(entry)
    }

    /// Emit a fully-populated entry, filling in trace id, run id and stream
    /// when absent.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        if entry.run_id.is_none() {
            entry.run_id = Some(self.run_id.clone());
        }
        if entry.stream.is_none() {
            entry.stream = Some(self.stream);
        }
        let line = entry.to_jsonl().map_err(std::io::Error::other)?;
        writeln!(self.sink.writer(), "{line}")
    }

    /// Forward core lifecycle records.
    pub fn emit_arena_records<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a ArenaLogRecord>,
    ) -> std::io::Result<usize> {
        let mut written = 0;
        for record in records {
            self.emit_entry(LogEntry::from_arena_record(record))?;
            written += 1;
        }
        Ok(written)
    }

    /// Lines emitted so far (buffer sink only).
    #[must_use]
    pub fn buffered_lines(&self) -> Vec<String> {
        match &self.sink {
            Sink::Buffer(buffer) => String::from_utf8_lossy(buffer)
                .lines()
                .map(str::to_string)
                .collect(),
            Sink::File(_) => Vec::new(),
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.sink.writer().flush()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validation error for a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

fn check_enum(
    errors: &mut Vec<LogValidationError>,
    obj: &serde_json::Map<String, serde_json::Value>,
    line_number: usize,
    field: &str,
    allowed: &[&str],
) {
    if let Some(value) = obj.get(field).and_then(|v| v.as_str())
        && !allowed.contains(&value)
    {
        errors.push(LogValidationError {
            line_number,
            field: field.to_string(),
            message: format!("invalid {field}: '{value}'"),
        });
    }
}

/// Validate a single JSONL line against the schema.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            errors.push(LogValidationError {
                line_number,
                field: "<json>".to_string(),
                message: format!("invalid JSON: {e}"),
            });
            return Err(errors);
        }
    };

    let Some(obj) = value.as_object() else {
        errors.push(LogValidationError {
            line_number,
            field: "<root>".to_string(),
            message: "expected JSON object".to_string(),
        });
        return Err(errors);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            errors.push(LogValidationError {
                line_number,
                field: field.to_string(),
                message: "required field missing".to_string(),
            });
        }
    }

    check_enum(&mut errors, obj, line_number, "level", &LEVELS);
    check_enum(&mut errors, obj, line_number, "outcome", &OUTCOMES);
    check_enum(&mut errors, obj, line_number, "stream", &STREAMS);

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && !trace_id.contains("::")
    {
        errors.push(LogValidationError {
            line_number,
            field: "trace_id".to_string(),
            message: format!("trace_id should be '::'-separated, got: '{trace_id}'"),
        });
    }

    // A snapshot is all-or-nothing.
    let snapshot_fields = ["bytes_allocated", "bytes_free", "free_blocks"];
    let present = snapshot_fields
        .iter()
        .filter(|f| obj.contains_key(**f))
        .count();
    if present != 0 && present != snapshot_fields.len() {
        errors.push(LogValidationError {
            line_number,
            field: "bytes_allocated".to_string(),
            message: "snapshot fields must appear together".to_string(),
        });
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value::<LogEntry>(value).map_err(|e| {
        vec![LogValidationError {
            line_number,
            field: "<deserialization>".to_string(),
            message: format!("failed to deserialize: {e}"),
        }]
    })
}

/// Validate an entire JSONL file.
///
/// Returns the non-empty line count and any validation errors found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current UTC time as RFC 3339 with millisecond precision.
#[must_use]
pub fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

/// Civil date from days since the epoch (proleptic Gregorian).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = (secs / 86_400) as i64;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
    )
}
