//! Parsing of the lipsync tool's output protocol.
//!
//! The tool writes one JSON document to stdout on success and
//! newline-delimited JSON status events to stderr while running. All
//! functions here are pure; malformed input is logged and skipped, it
//! never aborts an operation.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::logging::LogLevel;
use crate::models::{CaptureMetadata, MouthCue};

/// One status line from the tool's stderr stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub kind: StatusKind,
    /// Log entry the tool attached to the event, if any.
    pub log: Option<LogEntry>,
}

/// The recognized status event types.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusKind {
    /// Processing started on the given file.
    Start { file: String },
    /// Progress in `0.0..=1.0`.
    Progress { value: f64 },
    /// The tool reported a fatal problem.
    Failure { reason: String },
    /// Any other (or missing) event type; kept for logging only.
    Other(String),
}

/// A log message embedded in a status event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// The stdout document written on success.
#[derive(Debug, Deserialize)]
struct CaptureDocument {
    #[serde(default)]
    metadata: CaptureMetadata,
    #[serde(rename = "mouthCues", default)]
    mouth_cues: Vec<MouthCue>,
}

fn version_regex() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"version\s+(\d+\.\d+\.\d+)").expect("static regex"))
}

/// Extract the version token from `--version` output.
///
/// The output contains the literal word `version` followed by a
/// `MAJOR.MINOR.PATCH` token. Returns an empty string when absent.
pub fn parse_version(stdout: &str) -> String {
    version_regex()
        .captures(stdout)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Parse newline-delimited status events.
///
/// Each non-empty line is parsed independently; a line that is not valid
/// JSON is logged and dropped.
pub fn parse_status_lines(stderr: &str) -> Vec<StatusEvent> {
    stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_status_line)
        .collect()
}

/// Parse a single status line. Returns `None` for malformed JSON.
pub fn parse_status_line(line: &str) -> Option<StatusEvent> {
    let json: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to parse status line '{}': {}", truncate(line, 100), e);
            return None;
        }
    };

    let kind = match json.get("type").and_then(|t| t.as_str()) {
        Some("start") => StatusKind::Start {
            file: json
                .get("file")
                .and_then(|f| f.as_str())
                .unwrap_or_default()
                .to_string(),
        },
        Some("progress") => StatusKind::Progress {
            value: json.get("value").and_then(|v| v.as_f64()).unwrap_or(0.0),
        },
        Some("failure") => StatusKind::Failure {
            reason: json
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("unknown reason")
                .to_string(),
        },
        Some(other) => StatusKind::Other(other.to_string()),
        None => StatusKind::Other(String::new()),
    };

    let log = json.get("log").map(|entry| LogEntry {
        level: map_log_level(entry.get("level").and_then(|l| l.as_str()).unwrap_or("")),
        message: entry
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string(),
    });

    Some(StatusEvent { kind, log })
}

/// Map the tool's log level names onto ours. Unknown names are demoted to
/// debug. `tracing` has no level above error, so `Fatal` folds into error.
pub fn map_log_level(level: &str) -> LogLevel {
    match level {
        "Fatal" | "Error" => LogLevel::Error,
        "Info" => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

/// Parse the final stdout document and return the mouth cues.
///
/// Unparsable input yields an empty list; callers should treat an empty
/// capture as a possible failure signal, not as success.
pub fn parse_capture_cues(stdout: &str) -> Vec<MouthCue> {
    parse_capture_document(stdout)
        .map(|doc| doc.mouth_cues)
        .unwrap_or_default()
}

/// Parse the metadata block (sound file name, duration) of the final
/// stdout document.
pub fn parse_capture_metadata(stdout: &str) -> Option<CaptureMetadata> {
    parse_capture_document(stdout).map(|doc| doc.metadata)
}

fn parse_capture_document(stdout: &str) -> Option<CaptureDocument> {
    if stdout.is_empty() {
        return None;
    }
    match serde_json::from_str::<CaptureDocument>(stdout) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::warn!(
                "Failed to parse capture output json '{}...': {}",
                truncate(stdout, 200),
                e
            );
            None
        }
    }
}

/// Clip a string to at most `max` characters for log output.
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((index, _)) => &s[..index],
        None => s,
    }
}
