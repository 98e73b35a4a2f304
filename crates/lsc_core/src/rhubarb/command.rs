//! Non-blocking driver for the lipsync executable.
//!
//! Owns one external process at a time. The host's tick loop calls
//! [`RhubarbCommand::check_progress`] repeatedly; the call never blocks on
//! pipe I/O because dedicated reader threads drain stdout and stderr into
//! channels. The tool reports status only every few seconds, so a blocking
//! read here would freeze the caller's loop for that long.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::RhubarbSettings;
use crate::logging::LogLevel;
use crate::models::{CaptureMetadata, MouthCue, ShapeKey};

use super::parser::{self, LogEntry, StatusKind};
use super::types::{CaptureError, CaptureResult, Recognizer, SessionState};

/// Bound on draining leftover output once the process is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);
/// Bound on the synchronous `--version` query.
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);
/// Poll interval while waiting synchronously for a process to exit.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Default executable file name per platform.
pub fn executable_default_filename() -> &'static str {
    if cfg!(windows) {
        "rhubarb.exe"
    } else {
        "rhubarb"
    }
}

/// A running tool invocation: the child plus the channels its reader
/// threads feed. The threads end on their own when the pipes close.
struct CaptureSession {
    child: Child,
    stderr_rx: Receiver<String>,
    stdout_rx: Receiver<String>,
}

/// Drives the lipsync executable: builds arguments, launches, polls
/// without blocking, cancels, and collects the final output.
///
/// One driver owns at most one external process; independent drivers can
/// run concurrently on different inputs.
pub struct RhubarbCommand {
    executable: Option<PathBuf>,
    recognizer: Recognizer,
    use_extended_shapes: bool,
    /// Prefix command the tool is launched through (e.g. `wine`).
    extra_args: Vec<String>,
    session: Option<CaptureSession>,
    state: SessionState,
    last_exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl RhubarbCommand {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(executable.into()),
            recognizer: Recognizer::default(),
            use_extended_shapes: true,
            extra_args: Vec::new(),
            session: None,
            state: SessionState::Idle,
            last_exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Build a driver from the `[rhubarb]` config section.
    pub fn from_settings(settings: &RhubarbSettings) -> Self {
        let mut cmd = Self::new(PathBuf::from(&settings.executable));
        if settings.executable.is_empty() {
            cmd.executable = None;
        }
        cmd.recognizer = settings.recognizer;
        cmd.use_extended_shapes = settings.use_extended_shapes;
        cmd.extra_args = settings.extra_args.clone();
        cmd
    }

    pub fn set_executable(&mut self, path: impl Into<PathBuf>) {
        self.executable = Some(path.into());
    }

    pub fn set_recognizer(&mut self, recognizer: Recognizer) {
        self.recognizer = recognizer;
    }

    /// Preflight validation of the configured executable.
    ///
    /// Returns the first problem as a user-facing message, or `None` when
    /// the tool looks runnable. As a side effect, makes sure the file
    /// carries the execute bit; zip archives don't preserve file modes.
    pub fn errors(&self) -> Option<String> {
        let Some(path) = &self.executable else {
            return Some("Configure the lipsync executable file path first.".to_string());
        };
        if path.as_os_str().is_empty() {
            return Some("Configure the lipsync executable file path first.".to_string());
        }
        if !path.exists() {
            return Some(format!("The '{}' doesn't exist.", path.display()));
        }
        if !path.is_file() {
            return Some(format!("The '{}' is not a valid file.", path.display()));
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(path) {
                let mut perms = metadata.permissions();
                if perms.mode() & 0o100 == 0 {
                    perms.set_mode(perms.mode() | 0o744);
                    if let Err(e) = std::fs::set_permissions(path, perms) {
                        tracing::warn!("Could not mark '{}' executable: {}", path.display(), e);
                    }
                }
            }
        }
        None
    }

    /// Start the lipsync analysis in the background. Does not block.
    ///
    /// Fails with [`CaptureError::AlreadyRunning`] while a session is
    /// active and with [`CaptureError::Config`] when `errors()` reports a
    /// problem. A terminal session (finished, failed or cancelled) is
    /// replaced.
    pub fn launch(&mut self, input_file: &Path, dialog_file: Option<&Path>) -> CaptureResult<()> {
        let args = self.build_lipsync_args(input_file, dialog_file);
        self.open_process(args)
    }

    /// Poll the running capture. Non-blocking; safe to call from a UI tick.
    ///
    /// Returns `Some(progress)` (0-100) when a progress event arrived,
    /// `None` when there is nothing new. Once the process exits cleanly
    /// the session turns terminal and this returns `None`; fetch the
    /// result with [`output_cues`](Self::output_cues). A failure event or
    /// a non-zero exit surfaces as [`CaptureError::ExecutionFailed`].
    pub fn check_progress(&mut self) -> CaptureResult<Option<i32>> {
        let Some(mut session) = self.session.take() else {
            return Err(CaptureError::NotRunning);
        };

        match session.child.try_wait() {
            Err(e) => {
                let _ = session.child.kill();
                let _ = session.child.wait();
                self.state = SessionState::Failed;
                Err(CaptureError::io("poll lipsync process", e))
            }
            Ok(Some(status)) => {
                // Process exited: pick up whatever is left on both pipes,
                // surface a reported failure first, then judge the exit.
                let lines = drain_stderr(&session.stderr_rx, DRAIN_TIMEOUT);
                self.append_stderr(&lines);
                if let Some(blob) = drain_stdout(&session.stdout_rx, DRAIN_TIMEOUT) {
                    self.stdout.push_str(&blob);
                }
                let exit_code = status.code().unwrap_or(-1);
                self.last_exit_code = Some(exit_code);

                if let Err(e) = process_status_lines(&lines) {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
                if exit_code != 0 {
                    self.state = SessionState::Failed;
                    return Err(CaptureError::execution_failed(format!(
                        "exited with a non-zero code ({exit_code})"
                    )));
                }
                self.state = SessionState::Finished;
                tracing::debug!(
                    "Lipsync process finished with {} bytes of output",
                    self.stdout.len()
                );
                Ok(None)
            }
            Ok(None) => {
                // Still running: read at most one status line, never block.
                let line = session.stderr_rx.try_recv().ok();
                self.session = Some(session);
                let Some(line) = line else {
                    return Ok(None);
                };
                self.append_stderr(std::slice::from_ref(&line));
                match process_status_lines(std::slice::from_ref(&line)) {
                    Ok(progress) => Ok(progress),
                    Err(e) => {
                        // The tool told us it failed; don't wait for the
                        // exit code.
                        self.abort_session(SessionState::Failed);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Run `--version` and parse the version token from its output.
    ///
    /// The one deliberately synchronous operation: version queries return
    /// near-instantly and are invoked interactively.
    pub fn get_version(&mut self) -> CaptureResult<String> {
        self.cancel();
        let args = self.build_version_args();
        self.open_process(args)?;
        self.wait_and_collect(VERSION_TIMEOUT)?;
        Ok(parser::parse_version(&self.stdout))
    }

    /// Stop the current session immediately. Idempotent; a no-op when
    /// nothing was ever started or the session is already terminal.
    pub fn cancel(&mut self) {
        if self.session.is_none() {
            return;
        }
        tracing::info!("Cancelling the running lipsync process");
        self.abort_session(SessionState::Cancelled);
    }

    /// Whether a session is currently active.
    pub fn was_started(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Whether the session reached a terminal state: a known exit code, a
    /// reported failure, or cancellation.
    pub fn has_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Exit code of the last finished process, if one was observed.
    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    /// Everything the tool wrote to stdout so far.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Everything the tool wrote to stderr so far.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Parsed mouth cues of the finished capture.
    ///
    /// An empty list can also mean the tool produced unusable output;
    /// callers presenting results should treat it as suspect.
    pub fn output_cues(&self) -> CaptureResult<Vec<MouthCue>> {
        if !self.has_finished() {
            return Err(CaptureError::OutputUnavailable(
                "the capture has not finished yet".to_string(),
            ));
        }
        Ok(parser::parse_capture_cues(&self.stdout))
    }

    /// Metadata block (sound file name, duration) of the finished capture.
    pub fn output_metadata(&self) -> CaptureResult<Option<CaptureMetadata>> {
        if !self.has_finished() {
            return Err(CaptureError::OutputUnavailable(
                "the capture has not finished yet".to_string(),
            ));
        }
        Ok(parser::parse_capture_metadata(&self.stdout))
    }

    fn build_lipsync_args(&self, input_file: &Path, dialog_file: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-f".into(), "json".into(), "--machineReadable".into()];
        if self.use_extended_shapes {
            args.push("--extendedShapes".into());
            args.push(ShapeKey::extended_arg().into());
        }
        args.push("-r".into());
        args.push(self.recognizer.as_arg().into());
        if let Some(dialog) = dialog_file {
            args.push("--dialogFile".into());
            args.push(dialog.into());
        }
        args.push(input_file.into());
        args
    }

    fn build_version_args(&self) -> Vec<OsString> {
        vec!["--version".into()]
    }

    /// Spawn the tool with the given arguments and wire up the reader
    /// threads. Resets the accumulated output.
    fn open_process(&mut self, args: Vec<OsString>) -> CaptureResult<()> {
        if self.state == SessionState::Running {
            return Err(CaptureError::AlreadyRunning);
        }
        if let Some(problem) = self.errors() {
            return Err(CaptureError::Config(problem));
        }
        let Some(executable) = self.executable.clone() else {
            return Err(CaptureError::Config(
                "Configure the lipsync executable file path first.".to_string(),
            ));
        };

        self.stdout.clear();
        self.stderr.clear();
        self.last_exit_code = None;

        let mut cmd = if let Some((first, rest)) = self.extra_args.split_first() {
            let mut cmd = Command::new(first);
            cmd.args(rest);
            cmd.arg(&executable);
            cmd
        } else {
            Command::new(&executable)
        };
        cmd.args(&args).stdout(Stdio::piped()).stderr(Stdio::piped());

        tracing::info!("Starting process: {} {:?}", executable.display(), args);
        let mut child = cmd
            .spawn()
            .map_err(|e| CaptureError::io("spawn lipsync process", e))?;

        let stderr = child.stderr.take().expect("stderr was piped");
        let (stderr_tx, stderr_rx) = mpsc::channel();
        thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if stderr_tx.send(line).is_err() {
                    break;
                }
            }
            tracing::debug!("EOF reached while reading the tool's stderr");
        });

        let stdout = child.stdout.take().expect("stdout was piped");
        let (stdout_tx, stdout_rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buffer = String::new();
            let mut reader = BufReader::new(stdout);
            if let Err(e) = reader.read_to_string(&mut buffer) {
                tracing::warn!("Failed to read the tool's stdout: {}", e);
            }
            let _ = stdout_tx.send(buffer);
        });

        self.session = Some(CaptureSession {
            child,
            stderr_rx,
            stdout_rx,
        });
        self.state = SessionState::Running;
        Ok(())
    }

    /// Kill the running process (best effort), collect leftovers, and move
    /// to the given terminal state.
    fn abort_session(&mut self, terminal: SessionState) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.child.kill() {
                tracing::debug!("Kill failed, process likely exited already: {}", e);
            }
            let _ = session.child.wait();
            let lines = drain_stderr(&session.stderr_rx, DRAIN_TIMEOUT);
            self.append_stderr(&lines);
            if let Some(blob) = drain_stdout(&session.stdout_rx, DRAIN_TIMEOUT) {
                self.stdout.push_str(&blob);
            }
        }
        self.state = terminal;
    }

    /// Block until the current process exits, bounded by `timeout`, then
    /// collect its output.
    fn wait_and_collect(&mut self, timeout: Duration) -> CaptureResult<()> {
        let Some(mut session) = self.session.take() else {
            return Err(CaptureError::NotRunning);
        };
        let deadline = Instant::now() + timeout;
        let status = loop {
            match session.child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        tracing::warn!("Timed out waiting for the lipsync process to exit");
                        let _ = session.child.kill();
                        let _ = session.child.wait();
                        self.state = SessionState::Failed;
                        return Err(CaptureError::Timeout {
                            timeout_secs: timeout.as_secs(),
                        });
                    }
                    thread::sleep(WAIT_POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = session.child.kill();
                    let _ = session.child.wait();
                    self.state = SessionState::Failed;
                    return Err(CaptureError::io("wait for lipsync process", e));
                }
            }
        };

        let lines = drain_stderr(&session.stderr_rx, DRAIN_TIMEOUT);
        self.append_stderr(&lines);
        if let Some(blob) = drain_stdout(&session.stdout_rx, DRAIN_TIMEOUT) {
            self.stdout.push_str(&blob);
        }
        self.last_exit_code = status.code();

        if status.success() {
            self.state = SessionState::Finished;
            Ok(())
        } else {
            self.state = SessionState::Failed;
            Err(CaptureError::execution_failed(format!(
                "exited with a non-zero code ({})",
                status.code().unwrap_or(-1)
            )))
        }
    }

    fn append_stderr(&mut self, lines: &[String]) {
        for line in lines {
            self.stderr.push_str(line);
            self.stderr.push('\n');
        }
    }
}

impl Drop for RhubarbCommand {
    fn drop(&mut self) {
        // Don't leave an orphaned analysis running.
        self.cancel();
    }
}

/// Log any embedded log entries and fold freshly received status lines
/// into a progress value. A failure event yields the error to raise.
fn process_status_lines(lines: &[String]) -> CaptureResult<Option<i32>> {
    let mut progress = None;
    let text = lines.join("\n");
    for event in parser::parse_status_lines(&text) {
        if let Some(entry) = &event.log {
            log_tool_message(entry);
        }
        match event.kind {
            StatusKind::Failure { reason } => {
                return Err(CaptureError::execution_failed(reason));
            }
            StatusKind::Progress { value } => {
                progress = Some(((value * 100.0) as i32).clamp(0, 100));
            }
            StatusKind::Start { file } => {
                tracing::info!("Lipsync tool started processing '{}'", file);
            }
            StatusKind::Other(_) => {}
        }
    }
    Ok(progress)
}

/// Forward a tool log entry at its mapped severity.
fn log_tool_message(entry: &LogEntry) {
    match entry.level {
        LogLevel::Error => tracing::error!("Rhubarb: {}", entry.message),
        LogLevel::Warn => tracing::warn!("Rhubarb: {}", entry.message),
        LogLevel::Info => tracing::info!("Rhubarb: {}", entry.message),
        _ => tracing::debug!("Rhubarb: {}", entry.message),
    }
}

/// Receive buffered stderr lines until the channel runs dry or the
/// deadline passes. The reader thread closes the channel at pipe EOF.
fn drain_stderr(rx: &Receiver<String>, timeout: Duration) -> Vec<String> {
    let deadline = Instant::now() + timeout;
    let mut lines = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(line) => lines.push(line),
            Err(_) => break,
        }
    }
    lines
}

/// Receive the accumulated stdout blob, bounded by `timeout`.
fn drain_stdout(rx: &Receiver<String>, timeout: Duration) -> Option<String> {
    match rx.recv_timeout(timeout) {
        Ok(blob) => Some(blob),
        Err(RecvTimeoutError::Disconnected) => None,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!("Timed out while collecting the tool's stdout");
            None
        }
    }
}
