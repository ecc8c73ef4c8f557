//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use std::path::PathBuf;

pub use defaults::{DEFAULT_WRITE_RATE, MAX_WRITE_RATE, MIN_WRITE_RATE};

/// CLI options for recwav. Validated values are safe to hand to the capture worker.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "recwav",
    about = "Record the default microphone to a WAV file",
    author,
    version
)]
pub struct AppConfig {
    /// Destination WAV file (".wav" is appended when no extension is given)
    #[arg(short = 'p', long = "path", value_name = "FILE")]
    pub path: Option<PathBuf>,

    /// Do not play the captured audio back through the output device
    #[arg(long = "no-monitor", default_value_t = false)]
    pub no_monitor: bool,

    /// Sample rate written to the file (Hz); audio is resampled when it differs from capture
    #[arg(long = "write-rate", default_value_t = DEFAULT_WRITE_RATE)]
    pub write_rate: u32,

    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Preferred audio output device name (monitoring only)
    #[arg(long)]
    pub output_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Print detected audio output devices and exit
    #[arg(long = "list-output-devices", default_value_t = false)]
    pub list_output_devices: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "RECWAV_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "RECWAV_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}
