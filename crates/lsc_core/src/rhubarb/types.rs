//! Error and session-state types for the capture driver.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from driving the lipsync executable.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The executable is missing or misconfigured. Carries the same
    /// message that [`errors()`](super::RhubarbCommand::errors) reports.
    #[error("Lipsync executable is not usable: {0}")]
    Config(String),

    /// `launch` was called while a capture is already running.
    #[error("A capture session is already running")]
    AlreadyRunning,

    /// A poll was made with no active session.
    #[error("No capture session is running")]
    NotRunning,

    /// The tool reported a failure or exited with a non-zero code.
    #[error("Lipsync tool failed: {reason}")]
    ExecutionFailed { reason: String },

    /// The synchronous version query did not finish in time.
    #[error("Timed out after {timeout_secs}s waiting for the lipsync tool")]
    Timeout { timeout_secs: u64 },

    /// Output was requested before the session finished.
    #[error("Capture output is not available: {0}")]
    OutputUnavailable(String),

    /// Failed to spawn or talk to the process.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl CaptureError {
    /// Create an execution failure with a reason.
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            reason: reason.into(),
        }
    }

    /// Create an I/O error with operation context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Lifecycle of one tool invocation.
///
/// `Idle` and the terminal states allow a new launch; `Running` is the
/// only state in which polling performs I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No process has been started yet.
    #[default]
    Idle,
    /// The process is running and may be polled.
    Running,
    /// The process exited cleanly; the exit code is recorded.
    Finished,
    /// The tool reported a failure or exited with a non-zero code.
    Failed,
    /// The session was cancelled by the caller.
    Cancelled,
}

impl SessionState {
    /// Whether the session reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Finished | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Speech recognizer the tool analyzes the audio with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Recognizer {
    /// Dictionary-based recognizer for English recordings.
    #[default]
    #[serde(rename = "pocketSphinx")]
    PocketSphinx,
    /// Language-independent recognizer for non-English recordings.
    #[serde(rename = "phonetic")]
    Phonetic,
}

impl Recognizer {
    /// The value passed to the tool's `-r` argument.
    pub fn as_arg(self) -> &'static str {
        match self {
            Recognizer::PocketSphinx => "pocketSphinx",
            Recognizer::Phonetic => "phonetic",
        }
    }
}
