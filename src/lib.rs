pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod input;
mod lock;
pub mod session;
mod telemetry;

pub use app::{crash_log_path, init_logging, log_debug, log_file_path, log_panic};
pub use error::RecordError;
pub(crate) use lock::lock_or_recover;
pub use session::{
    start_capture, CaptureJob, CaptureOutcome, CompletionNotice, InputEvent, SessionController,
    SessionEnd, SessionSummary, StopSignal,
};
pub use telemetry::{init_tracing, tracing_log_path};
