//! Command line front-end for Lip Sync Capture.
//!
//! Owns the tick loop the core is designed around: launch a capture, poll
//! the driver a few times per second, then optimize and print the cues.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use lsc_core::config::ConfigManager;
use lsc_core::cues::{CueProcessor, FrameConfig};
use lsc_core::logging;
use lsc_core::rhubarb::RhubarbCommand;

/// How often the tick loop polls the driver.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "lipsync-capture", version, about = "Capture lip sync cues from speech audio")]
struct Cli {
    /// Config file path.
    #[arg(long, default_value = ".config/lipsync.toml")]
    config: PathBuf,

    /// Override the configured lipsync executable path.
    #[arg(long)]
    executable: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Print the external tool's version.
    Version,
    /// Run lipsync analysis on an audio file and print the cues as JSON.
    Capture {
        /// Input audio file (wav or ogg).
        input: PathBuf,

        /// Dialog transcript to improve recognition.
        #[arg(long)]
        dialog: Option<PathBuf>,

        /// Frame rate numerator of the target timeline.
        #[arg(long, default_value_t = 30.0)]
        fps: f64,

        /// Frame rate divisor (29.97 fps is 2997/100).
        #[arg(long, default_value_t = 1.0)]
        fps_base: f64,

        /// Frame number the timeline starts at.
        #[arg(long, default_value_t = 0.0)]
        offset: f64,

        /// Print the raw cues without optimization.
        #[arg(long)]
        raw: bool,
    },
}

/// One optimized cue as printed to stdout.
#[derive(Serialize)]
struct CueRecord {
    value: char,
    start: f64,
    end: f64,
    blend_in: f64,
    start_frame: i64,
    end_frame: i64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigManager::new(&cli.config);
    config
        .load_or_create()
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    logging::init_tracing(config.settings().logging.level);

    let mut cmd = RhubarbCommand::from_settings(&config.settings().rhubarb);
    if let Some(executable) = &cli.executable {
        cmd.set_executable(executable);
    }
    if let Some(problem) = cmd.errors() {
        bail!(problem);
    }

    match cli.command {
        CliCommand::Version => {
            println!("{}", cmd.get_version()?);
        }
        CliCommand::Capture {
            input,
            dialog,
            fps,
            fps_base,
            offset,
            raw,
        } => {
            if fps <= 0.0 || fps_base <= 0.0 {
                bail!("frame rate must be positive, got {fps}/{fps_base}");
            }
            cmd.launch(&input, dialog.as_deref())
                .with_context(|| format!("launching capture for {}", input.display()))?;

            while !cmd.has_finished() {
                if let Some(progress) = cmd.check_progress()? {
                    eprintln!("capture: {progress}%");
                }
                thread::sleep(POLL_INTERVAL);
            }

            let cues = cmd.output_cues()?;
            if cues.is_empty() {
                bail!("the tool produced no cues; the capture likely failed");
            }
            if let Ok(Some(metadata)) = cmd.output_metadata() {
                eprintln!(
                    "captured '{}' ({:.2}s, {} cues)",
                    metadata.sound_file,
                    metadata.duration,
                    cues.len()
                );
            }

            let frame_cfg = FrameConfig::new(fps, fps_base, offset);
            let mut processor = CueProcessor::new(frame_cfg, cues);
            if !raw {
                let stats = processor.optimize(&config.settings().optimize.to_params());
                eprintln!("optimized: {}", stats.summary());
            }

            let records: Vec<CueRecord> = processor
                .cue_frames
                .iter()
                .map(|cf| CueRecord {
                    value: cf.cue.key.as_char(),
                    start: cf.cue.start,
                    end: cf.cue.end,
                    blend_in: cf.blend_in,
                    start_frame: cf.start_frame(&frame_cfg),
                    end_frame: cf.end_frame(&frame_cfg),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}
