//! Rate conversion between the capture rate and the persisted rate.
//!
//! Only used when `--write-rate` differs from the capture rate; the header of
//! the written file always declares the rate of the samples actually in it.

use crate::log_debug;
#[cfg(feature = "high-quality-audio")]
use anyhow::{anyhow, Result};
#[cfg(feature = "high-quality-audio")]
use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};
use std::cmp::Ordering as CmpOrdering;
use std::f32::consts::PI;
#[cfg(feature = "high-quality-audio")]
use std::sync::atomic::{AtomicBool, Ordering};

pub(super) const MIN_RATE: u32 = 2_000;
pub(super) const MAX_RATE: u32 = 384_000;
const MAX_DOWNSAMPLING_TAPS: usize = 129;

#[cfg(feature = "high-quality-audio")]
pub(super) static RESAMPLER_WARNING_SHOWN: AtomicBool = AtomicBool::new(false);
#[cfg(all(test, feature = "high-quality-audio"))]
pub(super) static FORCE_RUBATO_ERROR: AtomicBool = AtomicBool::new(false);

/// Resample interleaved `input` from `from_rate` to `to_rate`, channel by channel.
///
/// Out-of-range rates leave the input untouched; callers validate rates first.
pub fn resample_interleaved(input: &[f32], channels: u16, from_rate: u32, to_rate: u32) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    if input.is_empty() || from_rate == to_rate {
        return input.to_vec();
    }
    if !(MIN_RATE..=MAX_RATE).contains(&from_rate) || !(MIN_RATE..=MAX_RATE).contains(&to_rate) {
        log_debug(&format!(
            "resample skipped: unsupported rates {from_rate}Hz -> {to_rate}Hz"
        ));
        return input.to_vec();
    }

    let planes = deinterleave(input, channels);

    #[cfg(feature = "high-quality-audio")]
    let resampled = match resample_with_rubato(&planes, from_rate, to_rate) {
        Ok(planes) => planes,
        Err(err) => {
            if !RESAMPLER_WARNING_SHOWN.swap(true, Ordering::AcqRel) {
                log_debug(&format!(
                    "high-quality resampler failed ({err}); falling back to basic path"
                ));
            }
            planes
                .iter()
                .map(|plane| basic_resample(plane, from_rate, to_rate))
                .collect()
        }
    };

    #[cfg(not(feature = "high-quality-audio"))]
    let resampled: Vec<Vec<f32>> = planes
        .iter()
        .map(|plane| basic_resample(plane, from_rate, to_rate))
        .collect();

    interleave(&resampled)
}

pub(super) fn deinterleave(input: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = input.len() / channels;
    let mut planes = vec![Vec::with_capacity(frames); channels];
    for frame in input.chunks_exact(channels) {
        for (plane, &sample) in planes.iter_mut().zip(frame) {
            plane.push(sample);
        }
    }
    planes
}

pub(super) fn interleave(planes: &[Vec<f32>]) -> Vec<f32> {
    let frames = planes.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * planes.len());
    for idx in 0..frames {
        for plane in planes {
            out.push(plane[idx]);
        }
    }
    out
}

fn expected_len(input_len: usize, from_rate: u32, to_rate: u32) -> usize {
    ((input_len as f64) * f64::from(to_rate) / f64::from(from_rate)).round() as usize
}

#[cfg(feature = "high-quality-audio")]
pub(super) fn resample_with_rubato(
    planes: &[Vec<f32>],
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<Vec<f32>>> {
    let channels = planes.len();
    let input_len = planes.first().map(Vec::len).unwrap_or(0);
    if channels == 0 || input_len == 0 {
        return Ok(planes.to_vec());
    }

    #[cfg(test)]
    if FORCE_RUBATO_ERROR.swap(false, Ordering::Relaxed) {
        return Err(anyhow!("forced rubato error"));
    }

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let chunk = 1024usize;
    let params = InterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: InterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    //           ratio,  drift, params, chunk_size, channels
    let mut rs = SincFixedIn::<f32>::new(ratio, 1.0, params, chunk, channels)
        .map_err(|e| anyhow!("failed to construct sinc resampler: {e:?}"))?;

    let expect = expected_len(input_len, from_rate, to_rate);
    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expect + 8); channels];
    let mut segs = vec![vec![0.0f32; chunk]; channels];

    let mut idx = 0usize;
    while idx < input_len {
        let end = (idx + chunk).min(input_len);
        if end == idx {
            return Err(anyhow!("resampler made no progress"));
        }
        let len = end - idx;
        for (seg, plane) in segs.iter_mut().zip(planes) {
            let pad = plane.get(end - 1).copied().unwrap_or(0.0);
            seg.fill(pad);
            seg[..len].copy_from_slice(&plane[idx..end]);
        }
        let produced = rs
            .process(segs.as_slice(), None)
            .map_err(|e| anyhow!("resampler process failed: {e:?}"))?;
        for (dst, src) in out.iter_mut().zip(produced) {
            dst.extend_from_slice(&src);
        }
        idx = end;
    }

    for plane in out.iter_mut() {
        fit_length(plane, expect);
    }
    Ok(out)
}

/// FIR low-pass (when decimating) followed by linear interpolation.
pub(super) fn basic_resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == 0 || from_rate == to_rate {
        return input.to_vec();
    }
    let filtered = if from_rate > to_rate {
        // Tame content above the target Nyquist before dropping samples.
        let taps = downsampling_tap_count(from_rate, to_rate);
        low_pass_fir(input, from_rate, to_rate, taps)
    } else {
        input.to_vec()
    };
    let mut out = resample_linear(&filtered, to_rate as f32 / from_rate as f32);
    fit_length(&mut out, expected_len(input.len(), from_rate, to_rate));
    out
}

pub(super) fn resample_linear(input: &[f32], ratio: f32) -> Vec<f32> {
    let input_len = input.len();
    let output_len = (input_len as f32 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f32 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx - idx as f32;

        if idx + 1 < input_len {
            output.push(input[idx] * (1.0 - frac) + input[idx + 1] * frac);
        } else {
            output.push(input.last().copied().unwrap_or(0.0));
        }
    }

    output
}

/// Short FIR for near-equal rates, longer as the decimation ratio grows.
pub(super) fn downsampling_tap_count(from_rate: u32, to_rate: u32) -> usize {
    let decimation_ratio = from_rate as f32 / to_rate.max(1) as f32;
    let mut taps = (decimation_ratio * 4.0).ceil().max(11.0) as usize;
    if taps % 2 == 0 {
        taps += 1;
    }
    taps.min(MAX_DOWNSAMPLING_TAPS)
}

pub(super) fn low_pass_fir(input: &[f32], from_rate: u32, to_rate: u32, taps: usize) -> Vec<f32> {
    if input.is_empty() || taps <= 1 {
        return input.to_vec();
    }

    let normalized_cutoff = (to_rate as f32 * 0.5 / from_rate as f32).min(0.499);
    let coeffs = design_low_pass(normalized_cutoff, taps);
    let half = taps / 2;
    let mut output = Vec::with_capacity(input.len());

    for n in 0..input.len() {
        let mut acc = 0.0;
        for (k, coeff) in coeffs.iter().enumerate() {
            if let Some(idx) = n.checked_add(k).and_then(|sum| sum.checked_sub(half)) {
                if let Some(sample) = input.get(idx) {
                    acc += *sample * coeff;
                }
            }
        }
        output.push(acc);
    }

    output
}

/// Normalized Hamming-windowed sinc taps.
pub(super) fn design_low_pass(normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let mut coeffs = Vec::with_capacity(taps);
    let m = (taps.max(2) - 1) as f32;

    for n in 0..taps {
        let centered = n as f32 - m / 2.0;
        let x = 2.0 * PI * normalized_cutoff * centered;
        let sinc = if centered == 0.0 {
            2.0 * normalized_cutoff
        } else {
            x.sin() / (PI * centered)
        };
        let window = 0.54 - 0.46 * ((2.0 * PI * n as f32) / m).cos();
        coeffs.push(sinc * window);
    }

    let sum: f32 = coeffs.iter().sum();
    if sum != 0.0 {
        for coeff in coeffs.iter_mut() {
            *coeff /= sum;
        }
    }

    coeffs
}

fn fit_length(data: &mut Vec<f32>, desired: usize) {
    match data.len().cmp(&desired) {
        CmpOrdering::Greater => data.truncate(desired),
        CmpOrdering::Less => {
            let pad = data.last().copied().unwrap_or(0.0);
            data.resize(desired, pad);
        }
        CmpOrdering::Equal => {}
    }
}
