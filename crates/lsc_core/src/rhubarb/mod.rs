//! Driving the external lipsync executable.
//!
//! The tool is invoked as an opaque subprocess. This module owns the whole
//! exchange:
//!
//! - **Command**: build arguments, launch, poll without blocking, cancel
//! - **Parser**: the stdout/stderr JSON protocol
//! - **Types**: errors, session state, recognizer selection
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use lsc_core::rhubarb::RhubarbCommand;
//!
//! let mut cmd = RhubarbCommand::new("/opt/rhubarb/rhubarb");
//! if let Some(problem) = cmd.errors() {
//!     eprintln!("{problem}");
//!     return;
//! }
//! cmd.launch(Path::new("speech.wav"), None).unwrap();
//! // From the host's tick loop:
//! while !cmd.has_finished() {
//!     if let Some(progress) = cmd.check_progress().unwrap() {
//!         println!("{progress}%");
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! let cues = cmd.output_cues().unwrap();
//! println!("{} cues captured", cues.len());
//! ```

pub mod parser;

mod command;
mod types;

pub use command::{executable_default_filename, RhubarbCommand};
pub use parser::{LogEntry, StatusEvent, StatusKind};
pub use types::{CaptureError, CaptureResult, Recognizer, SessionState};
