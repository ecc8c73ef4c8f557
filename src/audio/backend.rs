use crate::error::RecordError;

/// Result of one pull from an [`AudioSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum Pull {
    /// Interleaved frames that arrived since the previous pull.
    Frames(Vec<f32>),
    /// Nothing arrived within the source's idle window.
    Idle,
    /// The device went away; no more frames will arrive.
    Closed,
}

/// Input side of a session. Opened per session and dropped when the loop exits.
pub trait AudioSource {
    /// Interleaved channel count of every frame this source yields.
    fn channels(&self) -> u16;

    /// Block until at least one frame is buffered (or the idle window passes),
    /// then hand back everything currently available.
    fn pull(&mut self) -> Pull;

    /// Throw away everything buffered so far without blocking and return the
    /// number of interleaved samples dropped. Called right before the
    /// session clock starts.
    fn discard_pending(&mut self) -> usize {
        0
    }

    /// Callback chunks the device produced but the session never saw.
    fn dropped_chunks(&self) -> usize {
        0
    }
}

/// Live monitor output. Frames pushed here are played, never persisted.
pub trait AudioSink {
    fn push(&mut self, frames: &[f32]);
}

/// Opens sources and sinks for a session. Device resolution happens when the
/// backend is built; stream setup happens in these calls.
pub trait AudioBackend: Send + 'static {
    type Source: AudioSource;
    type Sink: AudioSink;

    fn open_source(&self, sample_rate: u32) -> Result<Self::Source, RecordError>;

    fn open_sink(&self, sample_rate: u32, channels: u16) -> Result<Self::Sink, RecordError>;
}
