use crate::lock_or_recover;
use crossbeam_channel::{Sender, TrySendError};
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

/// Forwards each input callback's samples to the capture loop as one chunk.
///
/// Chunks keep whatever size the driver delivered; nothing is re-blocked here,
/// so the loop sees frames as soon as the device hands them over.
pub(super) struct ChunkDispatcher {
    sender: Sender<Vec<f32>>,
    dropped: Arc<AtomicUsize>,
}

impl ChunkDispatcher {
    pub(super) fn new(sender: Sender<Vec<f32>>, dropped: Arc<AtomicUsize>) -> Self {
        Self { sender, dropped }
    }

    pub(super) fn push<T, F>(&self, data: &[T], convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        if data.is_empty() {
            return;
        }
        let chunk: Vec<f32> = data.iter().copied().map(convert).collect();
        if let Err(TrySendError::Full(_)) = self.sender.try_send(chunk) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Frames waiting to be played by the monitor output stream.
///
/// The capture loop pushes, the output callback pops. The queue is capped so
/// a stalled output device cannot push monitoring latency past `max_samples`.
#[derive(Clone)]
pub(super) struct MonitorQueue {
    inner: Arc<Mutex<VecDeque<f32>>>,
    max_samples: usize,
    in_channels: usize,
    out_channels: usize,
}

impl MonitorQueue {
    pub(super) fn new(max_samples: usize, in_channels: u16, out_channels: u16) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(max_samples))),
            max_samples: max_samples.max(1),
            in_channels: usize::from(in_channels.max(1)),
            out_channels: usize::from(out_channels.max(1)),
        }
    }

    /// Queue interleaved input frames, mapping them onto the output layout.
    pub(super) fn push(&self, frames: &[f32]) {
        let mut queue = lock_or_recover(&self.inner, "monitor queue push");
        if self.in_channels == self.out_channels {
            queue.extend(frames.iter().copied());
        } else {
            for frame in frames.chunks(self.in_channels) {
                for ch in 0..self.out_channels {
                    let sample = frame.get(ch % self.in_channels).copied().unwrap_or(0.0);
                    queue.push_back(sample);
                }
            }
        }
        // Drop the oldest whole frames so channels stay aligned.
        while queue.len() > self.max_samples {
            for _ in 0..self.out_channels {
                queue.pop_front();
            }
        }
    }

    /// Fill `out` from the queue, padding with silence on underrun or when the
    /// lock is contended (the output callback must never block).
    pub(super) fn fill<T, F>(&self, out: &mut [T], mut convert: F)
    where
        F: FnMut(f32) -> T,
    {
        let mut guard = self.inner.try_lock().ok();
        for slot in out.iter_mut() {
            let sample = guard
                .as_mut()
                .and_then(|queue| queue.pop_front())
                .unwrap_or(0.0);
            *slot = convert(sample);
        }
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        lock_or_recover(&self.inner, "monitor queue len").len()
    }
}
