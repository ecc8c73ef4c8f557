//! Foreground session control: prompts, the stop signal, and the completion
//! notice that releases a blocked prompt when the worker finishes on its own.

use crate::audio::{AudioBackend, CapturePlan, CaptureReport, CaptureWorker, Clock, StopReason};
use crate::error::RecordError;
use crate::log_debug;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Write-once stop request shared between controller and worker.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the worker to stop. Repeated requests are harmless.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Worker outcome as delivered to the controller.
pub type CaptureOutcome = Result<CaptureReport, RecordError>;

/// One-shot completion notice fired by the worker when it reaches `Done`.
///
/// Only the first [`notify`](Self::notify) delivers anything; later calls
/// return `false` and change nothing.
#[derive(Debug, Clone)]
pub struct CompletionNotice {
    sender: Sender<CaptureOutcome>,
    fired: Arc<AtomicBool>,
}

impl CompletionNotice {
    /// Create a notice and the receiver the controller waits on.
    pub fn channel() -> (Self, Receiver<CaptureOutcome>) {
        let (sender, receiver) = bounded(1);
        (
            Self {
                sender,
                fired: Arc::new(AtomicBool::new(false)),
            },
            receiver,
        )
    }

    pub fn notify(&self, outcome: CaptureOutcome) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        // The controller may already be gone; that is not the worker's problem.
        let _ = self.sender.try_send(outcome);
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Handle the controller keeps for a running capture worker.
pub struct CaptureJob {
    pub receiver: Receiver<CaptureOutcome>,
    pub handle: Option<thread::JoinHandle<()>>,
    pub stop: StopSignal,
}

impl CaptureJob {
    pub fn request_stop(&self) {
        self.stop.request();
    }

    /// Block until the worker reports, then reap its thread.
    pub fn wait(&mut self) -> Result<CaptureReport> {
        let outcome = self
            .receiver
            .recv()
            .map_err(|_| anyhow!("capture worker exited without reporting"))?;
        self.join();
        outcome.map_err(anyhow::Error::from)
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log_debug("capture worker panicked after reporting");
            }
        }
    }
}

/// Spawn the background worker for one session.
pub fn start_capture<B: AudioBackend, C: Clock>(
    backend: B,
    clock: C,
    plan: CapturePlan,
) -> CaptureJob {
    let stop = StopSignal::new();
    let (notice, receiver) = CompletionNotice::channel();
    let worker = CaptureWorker::new(backend, clock, plan, stop.clone(), notice);
    let handle = thread::spawn(move || {
        // The outcome travels through the completion notice.
        let _ = worker.run();
    });
    CaptureJob {
        receiver,
        handle: Some(handle),
        stop,
    }
}

/// One line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Enter was pressed.
    Line,
    /// Standard input reached end of file.
    Closed,
}

/// How the stop prompt was released.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptOutcome {
    /// The operator pressed Enter (or closed stdin) first.
    Entered,
    /// The worker finished first and interrupted the prompt.
    Interrupted(CaptureOutcome),
}

/// Who ended the session, from the controller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The stop prompt was answered; the worker honoured the request.
    Requested,
    /// The worker finished before anyone answered the stop prompt.
    Interrupted,
}

/// Result of a complete session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub report: CaptureReport,
    pub ended: SessionEnd,
}

/// Drives the start/stop prompts around one capture worker.
pub struct SessionController<'a, W: Write> {
    input: &'a Receiver<InputEvent>,
    out: W,
}

impl<'a, W: Write> SessionController<'a, W> {
    pub fn new(input: &'a Receiver<InputEvent>, out: W) -> Self {
        Self { input, out }
    }

    /// Run one session: wait to start, record, wait to stop, report.
    pub fn run<B: AudioBackend, C: Clock>(
        &mut self,
        backend: B,
        clock: C,
        plan: CapturePlan,
    ) -> Result<SessionSummary> {
        writeln!(self.out, "file: {}", plan.path.display())?;
        self.prompt("Press Enter to start recording")?;
        match self.input.recv() {
            Ok(InputEvent::Line) => {}
            Ok(InputEvent::Closed) | Err(_) => {
                return Err(anyhow!("standard input closed before recording started"));
            }
        }

        tracing::info!(
            target: "recwav::session",
            path = %plan.path.display(),
            capture_rate = plan.capture_rate,
            write_rate = plan.write_rate,
            monitor = plan.monitor,
            "session started"
        );
        let mut job = start_capture(backend, clock, plan);

        self.prompt("Press Enter to stop recording")?;
        let summary = match self.wait_for_stop(&job) {
            PromptOutcome::Entered => {
                job.request_stop();
                writeln!(self.out, "Stopping record...")?;
                let report = job.wait().context("recording failed")?;
                writeln!(
                    self.out,
                    "Recorded time {:.2} sec",
                    report.duration.as_secs_f64()
                )?;
                SessionSummary {
                    report,
                    ended: SessionEnd::Requested,
                }
            }
            PromptOutcome::Interrupted(outcome) => {
                job.join();
                let report = outcome.map_err(anyhow::Error::from).context("recording failed")?;
                let cause = match report.stop_reason {
                    StopReason::SourceLost => "input device lost",
                    StopReason::Ceiling | StopReason::UserStop => "timeout",
                };
                writeln!(
                    self.out,
                    "\nStopped by {cause}. Recorded time {:.2} sec",
                    report.duration.as_secs_f64()
                )?;
                SessionSummary {
                    report,
                    ended: SessionEnd::Interrupted,
                }
            }
        };

        tracing::info!(
            target: "recwav::session",
            ended = ?summary.ended,
            duration_ms = summary.report.duration.as_millis() as u64,
            "session finished"
        );
        Ok(summary)
    }

    /// Race the operator's Enter against the worker's completion notice.
    fn wait_for_stop(&self, job: &CaptureJob) -> PromptOutcome {
        select! {
            recv(self.input) -> event => {
                if !matches!(event, Ok(InputEvent::Line)) {
                    log_debug("stdin closed during recording; treating as a stop request");
                }
                PromptOutcome::Entered
            }
            recv(job.receiver) -> outcome => PromptOutcome::Interrupted(
                outcome.unwrap_or_else(|_| {
                    Err(RecordError::Setup("capture worker exited without reporting".into()))
                }),
            ),
        }
    }

    fn prompt(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioSink, AudioSource, Pull, MAX_SESSION, MIN_SESSION};
    use crossbeam_channel::unbounded;
    use std::env;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    const RATE: u32 = 8_000;

    /// Simulated microseconds shared by the fake source and clock.
    #[derive(Clone, Default)]
    struct SimTime(Arc<AtomicU64>);

    struct SimClock {
        time: SimTime,
        started_at: u64,
    }

    impl Clock for SimClock {
        fn start(&mut self) {
            self.started_at = self.time.0.load(Ordering::SeqCst);
        }

        fn elapsed(&self) -> Duration {
            Duration::from_micros(self.time.0.load(Ordering::SeqCst) - self.started_at)
        }
    }

    /// Yields 10 ms of silence per pull. Time stops at `hold_at` until the
    /// gate opens, which lets a test answer the stop prompt mid-recording.
    /// The source reports itself closed from `close_at` on.
    struct GatedBackend {
        time: SimTime,
        hold_at: Option<Duration>,
        close_at: Option<Duration>,
        gate: Arc<AtomicBool>,
        fail: bool,
    }

    struct GatedSource {
        time: SimTime,
        hold_at: Option<Duration>,
        close_at: Option<Duration>,
        gate: Arc<AtomicBool>,
    }

    struct NullSink;

    impl AudioSink for NullSink {
        fn push(&mut self, _frames: &[f32]) {}
    }

    impl AudioSource for GatedSource {
        fn channels(&self) -> u16 {
            1
        }

        fn pull(&mut self) -> Pull {
            let now = Duration::from_micros(self.time.0.load(Ordering::SeqCst));
            if self.close_at.is_some_and(|at| now >= at) {
                return Pull::Closed;
            }
            let held = self.hold_at.is_some_and(|at| now >= at);
            if held && !self.gate.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
                return Pull::Idle;
            }
            self.time.0.fetch_add(10_000, Ordering::SeqCst);
            Pull::Frames(vec![0.0; RATE as usize / 100])
        }
    }

    impl AudioBackend for GatedBackend {
        type Source = GatedSource;
        type Sink = NullSink;

        fn open_source(&self, _sample_rate: u32) -> Result<GatedSource, RecordError> {
            if self.fail {
                return Err(RecordError::Setup("no default input device".into()));
            }
            Ok(GatedSource {
                time: self.time.clone(),
                hold_at: self.hold_at,
                close_at: self.close_at,
                gate: Arc::clone(&self.gate),
            })
        }

        fn open_sink(&self, _sample_rate: u32, _channels: u16) -> Result<NullSink, RecordError> {
            Ok(NullSink)
        }
    }

    /// Captures prompt output and opens the gate once the stop is acknowledged.
    #[derive(Clone)]
    struct PromptLog {
        buf: Arc<Mutex<Vec<u8>>>,
        gate: Arc<AtomicBool>,
    }

    impl PromptLog {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.buf.lock().expect("prompt log")).into_owned()
        }
    }

    impl Write for PromptLog {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            let mut buf = self.buf.lock().expect("prompt log");
            buf.extend_from_slice(data);
            if String::from_utf8_lossy(&buf).contains("Stopping record...") {
                self.gate.store(true, Ordering::SeqCst);
            }
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn fixture(hold_at: Option<Duration>) -> (GatedBackend, SimClock, PromptLog) {
        let time = SimTime::default();
        let gate = Arc::new(AtomicBool::new(false));
        let backend = GatedBackend {
            time: time.clone(),
            hold_at,
            close_at: None,
            gate: Arc::clone(&gate),
            fail: false,
        };
        let clock = SimClock {
            time,
            started_at: 0,
        };
        let log = PromptLog {
            buf: Arc::new(Mutex::new(Vec::new())),
            gate,
        };
        (backend, clock, log)
    }

    fn plan(name: &str) -> CapturePlan {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path: PathBuf = env::temp_dir().join(format!(
            "recwav_session_{name}_{}_{nanos}.wav",
            std::process::id()
        ));
        let mut plan = CapturePlan::new(path);
        plan.capture_rate = RATE;
        plan.write_rate = RATE;
        plan.monitor = false;
        plan
    }

    #[test]
    fn stop_signal_is_idempotent() {
        let stop = StopSignal::new();
        assert!(!stop.is_requested());
        stop.request();
        stop.request();
        assert!(stop.is_requested());
        assert!(stop.clone().is_requested());
    }

    #[test]
    fn completion_notice_delivers_only_once() {
        let (notice, receiver) = CompletionNotice::channel();
        assert!(!notice.has_fired());
        let first = Err(RecordError::Setup("first".into()));
        assert!(notice.notify(first.clone()));
        assert!(!notice.clone().notify(Err(RecordError::Setup("second".into()))));
        assert!(notice.has_fired());
        assert_eq!(receiver.try_recv().expect("first outcome"), first);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn completion_notice_survives_missing_controller() {
        let (notice, receiver) = CompletionNotice::channel();
        drop(receiver);
        assert!(notice.notify(Err(RecordError::Setup("gone".into()))));
    }

    #[test]
    fn early_enter_is_held_to_the_floor() {
        let (backend, clock, log) = fixture(Some(Duration::from_secs(2)));
        let plan = plan("early");
        let path = plan.path.clone();
        let (tx, rx) = unbounded();
        tx.send(InputEvent::Line).expect("start");
        tx.send(InputEvent::Line).expect("stop");

        let summary = SessionController::new(&rx, log.clone())
            .run(backend, clock, plan)
            .expect("session");

        assert_eq!(summary.ended, SessionEnd::Requested);
        assert_eq!(summary.report.stop_reason, StopReason::UserStop);
        assert_eq!(summary.report.duration, MIN_SESSION);
        let text = log.text();
        assert!(text.contains("Press Enter to start recording"));
        assert!(text.contains("Press Enter to stop recording"));
        assert!(text.contains("Stopping record..."));
        assert!(text.contains("Recorded time 5.00 sec"));
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn ceiling_interrupts_the_stop_prompt() {
        let (backend, clock, log) = fixture(None);
        let plan = plan("ceiling");
        let path = plan.path.clone();
        let (tx, rx) = unbounded();
        tx.send(InputEvent::Line).expect("start");

        let summary = SessionController::new(&rx, log.clone())
            .run(backend, clock, plan)
            .expect("session");

        assert_eq!(summary.ended, SessionEnd::Interrupted);
        assert_eq!(summary.report.stop_reason, StopReason::Ceiling);
        assert_eq!(summary.report.duration, MAX_SESSION);
        let text = log.text();
        assert!(text.contains("\nStopped by timeout. Recorded time 60.00 sec"));
        assert!(!text.contains("Stopping record..."));
        drop(tx);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn lost_input_device_interrupts_the_stop_prompt() {
        let (mut backend, clock, log) = fixture(None);
        backend.close_at = Some(Duration::from_secs(3));
        let plan = plan("lost");
        let path = plan.path.clone();
        let (tx, rx) = unbounded();
        tx.send(InputEvent::Line).expect("start");

        let summary = SessionController::new(&rx, log.clone())
            .run(backend, clock, plan)
            .expect("session");

        assert_eq!(summary.ended, SessionEnd::Interrupted);
        assert_eq!(summary.report.stop_reason, StopReason::SourceLost);
        assert_eq!(summary.report.duration, Duration::from_secs(3));
        let text = log.text();
        assert!(text.contains("\nStopped by input device lost. Recorded time 3.00 sec"));
        assert!(!text.contains("Stopping record..."));
        assert!(path.exists());
        drop(tx);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn closed_stdin_before_start_records_nothing() {
        let (backend, clock, log) = fixture(None);
        let plan = plan("nostart");
        let path = plan.path.clone();
        let (tx, rx) = unbounded::<InputEvent>();
        drop(tx);

        let err = SessionController::new(&rx, log)
            .run(backend, clock, plan)
            .expect_err("no start");
        assert!(err.to_string().contains("before recording started"));
        assert!(!path.exists());
    }

    #[test]
    fn setup_failure_surfaces_through_the_prompt() {
        let (mut backend, clock, log) = fixture(None);
        backend.fail = true;
        let plan = plan("setup");
        let path = plan.path.clone();
        let (tx, rx) = unbounded();
        tx.send(InputEvent::Line).expect("start");

        let err = SessionController::new(&rx, log)
            .run(backend, clock, plan)
            .expect_err("setup failure");
        let root = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<RecordError>())
            .expect("record error");
        assert_eq!(root.label(), "setup_failure");
        assert!(!path.exists());
        drop(tx);
    }

    #[test]
    fn start_capture_honours_an_immediate_stop() {
        let (backend, clock, _log) = fixture(None);
        let plan = plan("job");
        let path = plan.path.clone();
        let mut job = start_capture(backend, clock, plan);
        job.request_stop();
        let report = job.wait().expect("report");
        assert_eq!(report.duration, MIN_SESSION);
        assert!(job.handle.is_none());
        let _ = std::fs::remove_file(&path);
    }
}
