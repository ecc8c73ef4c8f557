use super::defaults::{MAX_DEVICE_NAME_LEN, MAX_WRITE_RATE, MIN_WRITE_RATE, WAV_EXTENSION};
use super::AppConfig;
use crate::audio::{CapturePlan, CAPTURE_RATE};
use anyhow::{anyhow, bail, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the destination path.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_WRITE_RATE..=MAX_WRITE_RATE).contains(&self.write_rate) {
            bail!(
                "--write-rate must be between {MIN_WRITE_RATE} and {MAX_WRITE_RATE} Hz, got {}",
                self.write_rate
            );
        }

        for (flag, name) in [
            ("--input-device", &self.input_device),
            ("--output-device", &self.output_device),
        ] {
            if let Some(name) = name {
                validate_device_name(flag, name)?;
            }
        }

        if let Some(path) = self.path.take() {
            self.path = Some(normalize_destination(&path)?);
        }
        Ok(())
    }

    /// Whether `--logs`/`--log-timings` asked for file logging and `--no-logs` did not veto it.
    pub fn logging_enabled(&self) -> bool {
        (self.logs || self.log_timings) && !self.no_logs
    }

    /// Build the session plan. `None` when no destination was given.
    pub fn capture_plan(&self) -> Option<CapturePlan> {
        let path = self.path.clone()?;
        let mut plan = CapturePlan::new(path);
        plan.capture_rate = CAPTURE_RATE;
        plan.write_rate = self.write_rate;
        plan.monitor = !self.no_monitor;
        plan.log_timings = self.log_timings;
        Some(plan)
    }
}

fn validate_device_name(flag: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("{flag} must not be empty");
    }
    if name.len() > MAX_DEVICE_NAME_LEN || name.chars().any(char::is_control) {
        bail!("{flag} must be <={MAX_DEVICE_NAME_LEN} characters with no control characters");
    }
    Ok(())
}

/// Append ".wav" when the name has no extension and make sure the parent exists.
pub(super) fn normalize_destination(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("--path must name a file, got {}", path.display()))?;
    let mut normalized = path.to_path_buf();
    if Path::new(file_name).extension().is_none() {
        normalized.set_extension(WAV_EXTENSION);
    }
    if normalized.is_dir() {
        bail!("--path points at a directory: {}", normalized.display());
    }
    match normalized.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            bail!(
                "--path directory does not exist: {}",
                parent.display()
            );
        }
        _ => {}
    }
    Ok(normalized)
}
