//! Recording loop and the stop policy that decides when it may end.
//!
//! The worker pulls whatever the source has buffered, echoes it to the monitor
//! sink, appends it to the session buffer and then asks [`StopPolicy`] whether
//! to stop. The ceiling always wins; a user stop only takes effect once the
//! floor has been reached.

use super::backend::{AudioBackend, AudioSink, AudioSource, Pull};
use super::convert::float_to_i16;
use super::resample::resample_interleaved;
use super::wav::write_pcm16;
use super::{CAPTURE_RATE, RECORD_GAIN};
use crate::error::RecordError;
use crate::log_debug;
use crate::session::{CompletionNotice, StopSignal};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Hard ceiling on a session.
pub const MAX_SESSION: Duration = Duration::from_secs(60);

/// Floor a stop request is held to.
pub const MIN_SESSION: Duration = Duration::from_secs(5);

/// Explains why capture stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The session ceiling elapsed.
    Ceiling,
    /// The user asked to stop and the floor had been reached.
    UserStop,
    /// The input device stopped delivering frames for good.
    SourceLost,
}

impl StopReason {
    pub fn label(self) -> &'static str {
        match self {
            StopReason::Ceiling => "ceiling",
            StopReason::UserStop => "user_stop",
            StopReason::SourceLost => "source_lost",
        }
    }
}

/// Lifecycle of one capture session. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    Recording,
    Stopping,
    Finalizing,
    Done,
}

/// Session length bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub floor: Duration,
    pub ceiling: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            floor: MIN_SESSION,
            ceiling: MAX_SESSION,
        }
    }
}

/// Stop/threshold state machine evaluated once per loop iteration.
#[derive(Debug, Clone, Copy)]
pub struct StopPolicy {
    limits: SessionLimits,
}

impl StopPolicy {
    pub fn new(limits: SessionLimits) -> Self {
        Self { limits }
    }

    /// Returns a stop reason if recording should end at `elapsed`.
    ///
    /// 1. `elapsed >= ceiling` stops unconditionally.
    /// 2. a pending stop request stops once `elapsed >= floor`.
    pub fn evaluate(&self, elapsed: Duration, stop_requested: bool) -> Option<StopReason> {
        if elapsed >= self.limits.ceiling {
            return Some(StopReason::Ceiling);
        }
        if stop_requested && elapsed >= self.limits.floor {
            return Some(StopReason::UserStop);
        }
        None
    }
}

/// Monotonic time source for a session. `start` is called once when the
/// capture loop begins; `elapsed` is measured from that point.
pub trait Clock: Send + 'static {
    fn start(&mut self);
    fn elapsed(&self) -> Duration;
}

/// Wall-clock [`Clock`] backed by [`Instant`].
#[derive(Debug, Default)]
pub struct MonotonicClock {
    started: Option<Instant>,
}

impl Clock for MonotonicClock {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn elapsed(&self) -> Duration {
        self.started.map(|at| at.elapsed()).unwrap_or_default()
    }
}

/// Everything fixed about a session before it starts.
#[derive(Debug, Clone)]
pub struct CapturePlan {
    pub path: PathBuf,
    pub capture_rate: u32,
    pub write_rate: u32,
    pub monitor: bool,
    pub limits: SessionLimits,
    /// Collect loop and persist timings and write them to the debug log.
    pub log_timings: bool,
}

impl CapturePlan {
    /// Capture and persist at 48 kHz with the default limits.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            capture_rate: CAPTURE_RATE,
            write_rate: CAPTURE_RATE,
            monitor: true,
            limits: SessionLimits::default(),
            log_timings: false,
        }
    }
}

/// What a finished session produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    pub path: PathBuf,
    /// Elapsed time at the moment recording stopped.
    pub duration: Duration,
    pub stop_reason: StopReason,
    /// Frames captured (per channel) at the capture rate.
    pub frames: usize,
    pub channels: u16,
    /// Rate the file was written at.
    pub sample_rate: u32,
    pub dropped_chunks: usize,
    /// Present only when the plan asked for timings.
    pub timings: Option<CaptureTimings>,
}

/// Where a session spent its time, for `--log-timings`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureTimings {
    /// Loop iterations, including idle pulls.
    pub pulls: usize,
    /// Longest single blocking `pull()`.
    pub max_pull: Duration,
    /// Frames captured before the clock started and thrown away.
    pub discarded_frames: usize,
    pub convert: Duration,
    pub write: Duration,
}

impl CaptureTimings {
    fn log_line(&self) -> String {
        format!(
            "timing|phase=capture|pulls={}|max_pull_ms={:.3}|discarded_frames={}|convert_ms={:.3}|write_ms={:.3}",
            self.pulls,
            self.max_pull.as_secs_f64() * 1000.0,
            self.discarded_frames,
            self.convert.as_secs_f64() * 1000.0,
            self.write.as_secs_f64() * 1000.0
        )
    }
}

/// Recorded audio handed from the loop to the persist step.
struct Recorded {
    buffer: Vec<f32>,
    channels: u16,
    duration: Duration,
    stop_reason: StopReason,
    dropped_chunks: usize,
}

/// Background half of a session: records, converts, writes, then notifies.
pub struct CaptureWorker<B: AudioBackend, C: Clock> {
    backend: B,
    clock: C,
    plan: CapturePlan,
    stop: StopSignal,
    notice: CompletionNotice,
    phase: SessionPhase,
}

impl<B: AudioBackend, C: Clock> CaptureWorker<B, C> {
    pub fn new(
        backend: B,
        clock: C,
        plan: CapturePlan,
        stop: StopSignal,
        notice: CompletionNotice,
    ) -> Self {
        Self {
            backend,
            clock,
            plan,
            stop,
            notice,
            phase: SessionPhase::Recording,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Run the session to completion and deliver the outcome through the
    /// completion notice. The same outcome is returned for callers that run
    /// the worker inline.
    pub fn run(mut self) -> Result<CaptureReport, RecordError> {
        let result = self.record_and_persist();
        match &result {
            Ok(report) => tracing::info!(
                target: "recwav::capture",
                stop_reason = report.stop_reason.label(),
                duration_ms = report.duration.as_millis() as u64,
                frames = report.frames,
                channels = report.channels,
                sample_rate = report.sample_rate,
                dropped_chunks = report.dropped_chunks,
                "capture finished"
            ),
            Err(err) => tracing::warn!(
                target: "recwav::capture",
                error = err.label(),
                "capture failed: {err}"
            ),
        }
        self.advance(SessionPhase::Done);
        self.notice.notify(result.clone());
        result
    }

    fn record_and_persist(&mut self) -> Result<CaptureReport, RecordError> {
        let mut timings = CaptureTimings::default();
        let recorded = self.record(&mut timings)?;
        self.advance(SessionPhase::Finalizing);
        let mut report = self.persist(recorded, &mut timings)?;
        if self.plan.log_timings {
            log_debug(&timings.log_line());
            report.timings = Some(timings);
        }
        Ok(report)
    }

    /// The recording loop. Source and sink live only inside this call, so
    /// they are released on every exit path.
    fn record(&mut self, timings: &mut CaptureTimings) -> Result<Recorded, RecordError> {
        let mut source = self.backend.open_source(self.plan.capture_rate)?;
        let channels = source.channels().max(1);
        let mut sink = if self.plan.monitor {
            Some(self.backend.open_sink(self.plan.capture_rate, channels)?)
        } else {
            None
        };

        let policy = StopPolicy::new(self.plan.limits);
        let expected = (self.plan.limits.ceiling.as_secs_f64()
            * f64::from(self.plan.capture_rate)
            * f64::from(channels))
        .ceil() as usize;
        let mut buffer: Vec<f32> = Vec::with_capacity(expected);

        log_debug(&format!(
            "capture started: {} ch @ {} Hz, monitor={}",
            channels, self.plan.capture_rate, self.plan.monitor
        ));
        // Whatever arrived while the sink was opening predates the clock.
        timings.discarded_frames = source.discard_pending() / usize::from(channels);
        self.clock.start();

        let (duration, stop_reason) = loop {
            let pulled_at = Instant::now();
            let pulled = source.pull();
            timings.pulls += 1;
            timings.max_pull = timings.max_pull.max(pulled_at.elapsed());
            match pulled {
                Pull::Frames(frames) => {
                    if let Some(sink) = sink.as_mut() {
                        sink.push(&frames);
                    }
                    buffer.extend_from_slice(&frames);
                }
                Pull::Idle => {}
                Pull::Closed => {
                    let elapsed = self.clock.elapsed();
                    log_debug("input source closed; finalizing what was captured");
                    break (elapsed, StopReason::SourceLost);
                }
            }
            let elapsed = self.clock.elapsed();
            if let Some(reason) = policy.evaluate(elapsed, self.stop.is_requested()) {
                break (elapsed.min(self.plan.limits.ceiling), reason);
            }
        };
        self.advance(SessionPhase::Stopping);

        let dropped_chunks = source.dropped_chunks();
        drop(sink);
        drop(source);
        log_debug(&format!(
            "capture stopped: reason={} elapsed_ms={} samples={}",
            stop_reason.label(),
            duration.as_millis(),
            buffer.len()
        ));
        Ok(Recorded {
            buffer,
            channels,
            duration,
            stop_reason,
            dropped_chunks,
        })
    }

    /// Convert and write the buffer. Consumes it, so nothing can be appended
    /// after the single terminal write.
    fn persist(
        &mut self,
        recorded: Recorded,
        timings: &mut CaptureTimings,
    ) -> Result<CaptureReport, RecordError> {
        let Recorded {
            buffer,
            channels,
            duration,
            stop_reason,
            dropped_chunks,
        } = recorded;
        let frames = buffer.len() / usize::from(channels);
        let whole = &buffer[..frames * usize::from(channels)];

        let started = Instant::now();
        let converted = if self.plan.write_rate == self.plan.capture_rate {
            float_to_i16(whole, RECORD_GAIN)
        } else {
            let resampled = resample_interleaved(
                whole,
                channels,
                self.plan.capture_rate,
                self.plan.write_rate,
            );
            float_to_i16(&resampled, RECORD_GAIN)
        };
        let samples = checked_conversion(converted)?;
        timings.convert = started.elapsed();
        drop(buffer);

        let started = Instant::now();
        write_pcm16(&self.plan.path, &samples, self.plan.write_rate, channels)?;
        timings.write = started.elapsed();

        Ok(CaptureReport {
            path: self.plan.path.clone(),
            duration,
            stop_reason,
            frames,
            channels,
            sample_rate: self.plan.write_rate,
            dropped_chunks,
            timings: None,
        })
    }

    fn advance(&mut self, next: SessionPhase) {
        debug_assert!(next >= self.phase, "phase moved backwards");
        log_debug(&format!("capture phase {:?} -> {next:?}", self.phase));
        self.phase = next;
    }
}

/// The capture buffer is always f32 and the target always 16-bit, so a
/// rejected kind here is a programming error.
pub(super) fn checked_conversion<T>(result: Result<T, RecordError>) -> Result<T, RecordError> {
    debug_assert!(
        !matches!(result, Err(RecordError::InvalidInputKind(_))),
        "converter rejected the capture buffer: {:?}",
        result.as_ref().err()
    );
    result
}
