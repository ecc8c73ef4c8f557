//! Float to integer PCM conversion with gain.
//!
//! Samples are scaled by `2^(bits-1)`, shifted so that 0.0 lands on the
//! integer domain's midpoint, clipped to the representable range and
//! truncated toward zero. Overdriven input clips; it never wraps.

use crate::error::RecordError;

/// Numeric kind of a sample sequence or of a conversion target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Float { bits: u16 },
    Int { bits: u16 },
    UInt { bits: u16 },
}

impl SampleKind {
    pub fn bits(self) -> u16 {
        match self {
            SampleKind::Float { bits } | SampleKind::Int { bits } | SampleKind::UInt { bits } => {
                bits
            }
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, SampleKind::Float { .. })
    }

    /// `(min, max)` of an integer kind, or `None` for floats and unsupported widths.
    pub(super) fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            SampleKind::Int { bits } if matches!(bits, 8 | 16 | 24 | 32) => {
                let half = 1i64 << (bits - 1);
                Some((-half, half - 1))
            }
            SampleKind::UInt { bits } if matches!(bits, 8 | 16 | 24) => {
                Some((0, (1i64 << bits) - 1))
            }
            _ => None,
        }
    }
}

/// Borrowed sample sequence of any kind the pipeline might be handed.
#[derive(Debug, Clone, Copy)]
pub enum Samples<'a> {
    F32(&'a [f32]),
    F64(&'a [f64]),
    I16(&'a [i16]),
    I32(&'a [i32]),
}

impl Samples<'_> {
    pub fn kind(&self) -> SampleKind {
        match self {
            Samples::F32(_) => SampleKind::Float { bits: 32 },
            Samples::F64(_) => SampleKind::Float { bits: 64 },
            Samples::I16(_) => SampleKind::Int { bits: 16 },
            Samples::I32(_) => SampleKind::Int { bits: 32 },
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Samples::F32(data) => data.len(),
            Samples::F64(data) => data.len(),
            Samples::I16(data) => data.len(),
            Samples::I32(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Convert float samples to integer PCM of the `target` kind after applying `gain`.
///
/// Fails before touching any sample when `samples` is not floating point or
/// `target` is not a supported integer kind.
pub fn float_to_pcm(
    samples: Samples<'_>,
    gain: f32,
    target: SampleKind,
) -> Result<Vec<i32>, RecordError> {
    if !samples.kind().is_float() {
        return Err(not_float(samples.kind()));
    }
    let Some((min, max)) = target.integer_range() else {
        return Err(RecordError::InvalidInputKind(format!(
            "target must be an 8/16/24/32-bit integer kind, got {target:?}"
        )));
    };

    let abs_max = (1i64 << (target.bits() - 1)) as f64;
    let offset = (min as f64) + abs_max;
    let bounds = Bounds {
        min: min as f64,
        max: max as f64,
        offset,
    };
    let gain = f64::from(gain);

    let out = match samples {
        Samples::F32(data) => data
            .iter()
            .map(|&s| bounds.apply(f64::from(s) * gain * abs_max))
            .collect(),
        Samples::F64(data) => data
            .iter()
            .map(|&s| bounds.apply(s * gain * abs_max))
            .collect(),
        other => return Err(not_float(other.kind())),
    };
    Ok(out)
}

/// 16-bit signed conversion the capture worker persists with.
pub fn float_to_i16(samples: &[f32], gain: f32) -> Result<Vec<i16>, RecordError> {
    let wide = float_to_pcm(Samples::F32(samples), gain, SampleKind::Int { bits: 16 })?;
    // Every value is already clipped into i16 range.
    Ok(wide.into_iter().map(|v| v as i16).collect())
}

fn not_float(kind: SampleKind) -> RecordError {
    RecordError::InvalidInputKind(format!("input must be floating point, got {kind:?}"))
}

struct Bounds {
    min: f64,
    max: f64,
    offset: f64,
}

impl Bounds {
    fn apply(&self, scaled: f64) -> i32 {
        let shifted = scaled + self.offset;
        if shifted.is_nan() {
            return self.offset as i32;
        }
        shifted.clamp(self.min, self.max).trunc() as i32
    }
}
