use crate::audio::CAPTURE_RATE;

pub const DEFAULT_WRITE_RATE: u32 = CAPTURE_RATE;
pub const MIN_WRITE_RATE: u32 = 8_000;
pub const MAX_WRITE_RATE: u32 = 192_000;

pub(super) const WAV_EXTENSION: &str = "wav";
pub(super) const MAX_DEVICE_NAME_LEN: usize = 256;
