//! Default-device capture and monitoring via CPAL.
//!
//! Device lookup happens once in [`CpalBackend::new`]; streams are built per
//! session inside the capture worker and dropped when its loop exits.

use super::backend::{AudioBackend, AudioSink, AudioSource, Pull};
use super::dispatch::{ChunkDispatcher, MonitorQueue};
use crate::error::RecordError;
use crate::log_debug;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig, SupportedStreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Callback chunks buffered between the input stream and the capture loop.
const INPUT_CHANNEL_CAPACITY: usize = 1024;

/// Longest a pull waits when the device delivers nothing.
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Monitor backlog ceiling, in milliseconds of output audio.
const MONITOR_BACKLOG_MS: u64 = 200;

/// List microphone names so the CLI can expose a human-friendly selector.
pub fn list_input_devices() -> Result<Vec<String>, RecordError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|err| RecordError::Setup(format!("no input devices available: {err}")))?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

/// List playback device names for `--output-device`.
pub fn list_output_devices() -> Result<Vec<String>, RecordError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|err| RecordError::Setup(format!("no output devices available: {err}")))?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

/// Resolved input (and optional monitor output) devices.
pub struct CpalBackend {
    input: cpal::Device,
    output: Option<cpal::Device>,
}

impl CpalBackend {
    /// Resolve devices, preferring the named ones when given. Pass
    /// `monitor = false` to skip output resolution entirely.
    pub fn new(
        input_name: Option<&str>,
        output_name: Option<&str>,
        monitor: bool,
    ) -> Result<Self, RecordError> {
        let host = cpal::default_host();
        let input = match input_name {
            Some(name) => {
                let mut devices = host.input_devices().map_err(|err| {
                    RecordError::Setup(format!("no input devices available: {err}"))
                })?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| RecordError::Setup(format!("input device '{name}' not found")))?
            }
            None => host.default_input_device().ok_or_else(|| {
                RecordError::Setup(format!(
                    "no default input device available. {}",
                    mic_permission_hint()
                ))
            })?,
        };

        let output = if !monitor {
            None
        } else {
            Some(match output_name {
                Some(name) => {
                    let mut devices = host.output_devices().map_err(|err| {
                        RecordError::Setup(format!("no output devices available: {err}"))
                    })?;
                    devices
                        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                        .ok_or_else(|| {
                            RecordError::Setup(format!("output device '{name}' not found"))
                        })?
                }
                None => host.default_output_device().ok_or_else(|| {
                    RecordError::Setup("no default output device available".to_string())
                })?,
            })
        };

        Ok(Self { input, output })
    }

    pub fn input_name(&self) -> String {
        self.input
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    pub fn output_name(&self) -> Option<String> {
        self.output.as_ref().map(|device| {
            device
                .name()
                .unwrap_or_else(|_| "Unknown Device".to_string())
        })
    }
}

/// Live input stream plus the receiving end of its callback channel.
pub struct CpalSource {
    stream: cpal::Stream,
    receiver: Receiver<Vec<f32>>,
    channels: u16,
    dropped: Arc<AtomicUsize>,
}

impl AudioSource for CpalSource {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn pull(&mut self) -> Pull {
        let mut frames = match self.receiver.recv_timeout(IDLE_WAIT) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => return Pull::Idle,
            Err(RecvTimeoutError::Disconnected) => return Pull::Closed,
        };
        // Take everything else that is already waiting.
        for chunk in self.receiver.try_iter() {
            frames.extend_from_slice(&chunk);
        }
        Pull::Frames(frames)
    }

    fn discard_pending(&mut self) -> usize {
        self.receiver.try_iter().map(|chunk| chunk.len()).sum()
    }

    fn dropped_chunks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        if let Err(err) = self.stream.pause() {
            log_debug(&format!("failed to pause input stream: {err}"));
        }
    }
}

/// Live output stream fed from a [`MonitorQueue`].
pub struct CpalSink {
    _stream: cpal::Stream,
    queue: MonitorQueue,
}

impl AudioSink for CpalSink {
    fn push(&mut self, frames: &[f32]) {
        self.queue.push(frames);
    }
}

impl AudioBackend for CpalBackend {
    type Source = CpalSource;
    type Sink = CpalSink;

    fn open_source(&self, sample_rate: u32) -> Result<CpalSource, RecordError> {
        let supported = input_config_for_rate(&self.input, sample_rate)?;
        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let channels = config.channels.max(1);

        log_debug(&format!(
            "Input config: device={} format={format:?} sample_rate={}Hz channels={channels}",
            self.input_name(),
            config.sample_rate.0
        ));

        let (sender, receiver) = bounded::<Vec<f32>>(INPUT_CHANNEL_CAPACITY);
        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = ChunkDispatcher::new(sender, dropped.clone());
        let err_fn = |err| log_debug(&format!("input_stream_error: {err}"));

        let stream = match format {
            SampleFormat::F32 => self.input.build_input_stream(
                &config,
                move |data: &[f32], _| dispatcher.push(data, |sample| sample),
                err_fn,
                None,
            ),
            SampleFormat::I16 => self.input.build_input_stream(
                &config,
                move |data: &[i16], _| dispatcher.push(data, |sample| sample as f32 / 32_768.0),
                err_fn,
                None,
            ),
            SampleFormat::U16 => self.input.build_input_stream(
                &config,
                move |data: &[u16], _| {
                    dispatcher.push(data, |sample| (sample as f32 - 32_768.0) / 32_768.0)
                },
                err_fn,
                None,
            ),
            other => {
                return Err(RecordError::Setup(format!(
                    "unsupported input sample format: {other:?}"
                )))
            }
        }
        .map_err(|err| RecordError::Setup(format!("failed to build input stream: {err}")))?;

        stream
            .play()
            .map_err(|err| RecordError::Setup(format!("failed to start input stream: {err}")))?;

        Ok(CpalSource {
            stream,
            receiver,
            channels,
            dropped,
        })
    }

    fn open_sink(&self, sample_rate: u32, channels: u16) -> Result<CpalSink, RecordError> {
        let device = self
            .output
            .as_ref()
            .ok_or_else(|| RecordError::Setup("monitoring disabled for this backend".into()))?;
        let supported = output_config_for_rate(device, sample_rate, channels)?;
        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let out_channels = config.channels.max(1);
        let max_samples =
            (sample_rate as u64 * MONITOR_BACKLOG_MS / 1000) as usize * usize::from(out_channels);
        let queue = MonitorQueue::new(max_samples, channels, out_channels);

        log_debug(&format!(
            "Monitor config: format={format:?} sample_rate={}Hz channels={out_channels} (input channels={channels})",
            config.sample_rate.0
        ));

        let err_fn = |err| log_debug(&format!("output_stream_error: {err}"));
        let playback = queue.clone();
        let stream = match format {
            SampleFormat::F32 => device.build_output_stream(
                &config,
                move |out: &mut [f32], _| playback.fill(out, |sample| sample),
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_output_stream(
                &config,
                move |out: &mut [i16], _| {
                    playback.fill(out, |sample| (sample.clamp(-1.0, 1.0) * 32_767.0) as i16)
                },
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_output_stream(
                &config,
                move |out: &mut [u16], _| {
                    playback.fill(out, |sample| {
                        ((sample.clamp(-1.0, 1.0) + 1.0) * 32_767.5) as u16
                    })
                },
                err_fn,
                None,
            ),
            other => {
                return Err(RecordError::Setup(format!(
                    "unsupported output sample format: {other:?}"
                )))
            }
        }
        .map_err(|err| RecordError::Setup(format!("failed to build output stream: {err}")))?;

        stream
            .play()
            .map_err(|err| RecordError::Setup(format!("failed to start output stream: {err}")))?;

        Ok(CpalSink {
            _stream: stream,
            queue,
        })
    }
}

/// Pick an input format that runs at exactly `sample_rate`, preferring f32.
fn input_config_for_rate(
    device: &cpal::Device,
    sample_rate: u32,
) -> Result<SupportedStreamConfig, RecordError> {
    let ranges = device
        .supported_input_configs()
        .map_err(|err| RecordError::Setup(format!("failed to query input formats: {err}")))?;
    let rate = SampleRate(sample_rate);
    let mut candidates: Vec<_> = ranges
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .filter(|range| format_rank(range.sample_format()).is_some())
        .collect();
    candidates.sort_by_key(|range| format_rank(range.sample_format()));
    candidates
        .into_iter()
        .next()
        .map(|range| range.with_sample_rate(rate))
        .ok_or_else(|| {
            RecordError::Setup(format!(
                "input device does not support {sample_rate} Hz capture"
            ))
        })
}

/// Pick an output format at `sample_rate`, preferring the input's channel count.
fn output_config_for_rate(
    device: &cpal::Device,
    sample_rate: u32,
    channels: u16,
) -> Result<SupportedStreamConfig, RecordError> {
    let ranges = device
        .supported_output_configs()
        .map_err(|err| RecordError::Setup(format!("failed to query output formats: {err}")))?;
    let rate = SampleRate(sample_rate);
    let mut candidates: Vec<_> = ranges
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .filter(|range| format_rank(range.sample_format()).is_some())
        .collect();
    candidates.sort_by_key(|range| {
        (
            range.channels() != channels,
            format_rank(range.sample_format()),
        )
    });
    candidates
        .into_iter()
        .next()
        .map(|range| range.with_sample_rate(rate))
        .ok_or_else(|| {
            RecordError::Setup(format!(
                "output device does not support {sample_rate} Hz playback"
            ))
        })
}

/// Formats the stream callbacks can normalize, best first.
fn format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::F32 => Some(0),
        SampleFormat::I16 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    }
}

fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_rank_prefers_float_and_rejects_unknown() {
        assert!(format_rank(SampleFormat::F32) < format_rank(SampleFormat::I16));
        assert!(format_rank(SampleFormat::I16) < format_rank(SampleFormat::U16));
        assert_eq!(format_rank(SampleFormat::F64), None);
        assert_eq!(format_rank(SampleFormat::I8), None);
    }

    #[test]
    fn permission_hint_is_never_empty() {
        assert!(!mic_permission_hint().is_empty());
    }
}
