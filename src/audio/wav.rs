use super::PCM_BITS;
use crate::error::RecordError;
use crate::log_debug;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Persist interleaved 16-bit samples as an uncompressed wave file.
///
/// The header declares exactly the rate and channel count of `samples`. Data
/// is staged next to `path` and renamed into place once the writer finalizes,
/// so a failed write never leaves a truncated file under the final name.
pub fn write_pcm16(
    path: &Path,
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
) -> Result<(), RecordError> {
    if channels == 0 {
        return Err(RecordError::Write("channel count must be non-zero".into()));
    }
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: PCM_BITS,
        sample_format: SampleFormat::Int,
    };
    let staging = staging_path(path);

    let result = write_staged(&staging, spec, samples).and_then(|()| {
        fs::rename(&staging, path).map_err(|err| {
            RecordError::Write(format!(
                "failed to move '{}' into place: {err}",
                staging.display()
            ))
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    } else {
        log_debug(&format!(
            "wrote {} samples ({channels} ch @ {sample_rate} Hz) to {}",
            samples.len(),
            path.display()
        ));
    }
    result
}

fn write_staged(staging: &Path, spec: WavSpec, samples: &[i16]) -> Result<(), RecordError> {
    let mut writer = WavWriter::create(staging, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("recording.wav"));
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_wav(name: &str) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        env::temp_dir().join(format!("recwav_{name}_{}_{stamp}.wav", std::process::id()))
    }

    #[test]
    fn header_matches_written_data() {
        let path = temp_wav("header");
        let samples: Vec<i16> = (0..96).map(|i| i as i16 * 100).collect();
        write_pcm16(&path, &samples, 48_000, 2).expect("write wav");

        let mut reader = hound::WavReader::open(&path).expect("open wav");
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
        assert_eq!(reader.duration(), 48);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.expect("sample")).collect();
        assert_eq!(read, samples);
        assert!(!staging_path(&path).exists());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn empty_recording_still_writes_valid_header() {
        let path = temp_wav("empty");
        write_pcm16(&path, &[], 48_000, 1).expect("write wav");
        let reader = hound::WavReader::open(&path).expect("open wav");
        assert_eq!(reader.duration(), 0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_directory_is_a_write_error() {
        let path = env::temp_dir()
            .join("recwav_missing_dir_for_tests")
            .join("nested")
            .join("out.wav");
        let err = write_pcm16(&path, &[0, 1], 48_000, 1).expect_err("should fail");
        assert!(matches!(err, RecordError::Write(_)));
        assert!(!path.exists());
    }

    #[test]
    fn zero_channels_rejected() {
        let path = temp_wav("zero_channels");
        assert!(write_pcm16(&path, &[0], 48_000, 0).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn staging_path_appends_suffix() {
        let staged = staging_path(Path::new("/tmp/take1.wav"));
        assert_eq!(staged, PathBuf::from("/tmp/take1.wav.part"));
    }
}
