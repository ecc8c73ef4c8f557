//! Capture, monitoring, conversion and persistence of one recording session.
//!
//! Audio is captured via CPAL at a fixed 48 kHz, optionally echoed to the
//! default output device, buffered in memory as interleaved f32 and written
//! once as 16-bit PCM when the session ends.

/// Rate the input (and monitor output) streams are opened at.
pub const CAPTURE_RATE: u32 = 48_000;

/// Linear gain applied to every sample before integer conversion.
pub const RECORD_GAIN: f32 = 2.0;

/// Bit depth of the persisted wave data.
pub const PCM_BITS: u16 = 16;

mod backend;
mod capture;
mod convert;
mod device;
mod dispatch;
mod resample;
mod wav;

pub use backend::{AudioBackend, AudioSink, AudioSource, Pull};
pub use capture::{
    CapturePlan, CaptureReport, CaptureTimings, CaptureWorker, Clock, MonotonicClock, SessionLimits,
    SessionPhase, StopPolicy, StopReason, MAX_SESSION, MIN_SESSION,
};
pub use convert::{float_to_i16, float_to_pcm, SampleKind, Samples};
pub use device::{list_input_devices, list_output_devices, CpalBackend};
pub use resample::resample_interleaved;
pub use wav::write_pcm16;
