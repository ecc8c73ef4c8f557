//! recwav entrypoint: parse flags, resolve devices, then run one recording
//! session between the start and stop prompts.

mod cli_utils;

use anyhow::{anyhow, Result};
use clap::CommandFactory;
use crossbeam_channel::bounded;
use recwav::audio::{CpalBackend, MonotonicClock};
use recwav::config::AppConfig;
use recwav::input::spawn_input_thread;
use recwav::{init_logging, init_tracing, log_debug, log_file_path, log_panic, SessionController};
use std::io;
use std::panic;
use std::process::ExitCode;

use crate::cli_utils::{list_devices, DeviceKind};

/// Max pending stdin lines before the reader blocks.
const INPUT_CHANNEL_CAPACITY: usize = 16;

/// Exit status when no destination was given.
const USAGE_EXIT: u8 = 2;

fn main() -> ExitCode {
    match AppConfig::parse_args().and_then(run) {
        Ok(code) => code,
        Err(err) => {
            log_debug(&format!("recwav failed: {err:#}"));
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: AppConfig) -> Result<ExitCode> {
    if config.list_input_devices {
        list_devices(DeviceKind::Input)?;
        return Ok(ExitCode::SUCCESS);
    }
    if config.list_output_devices {
        list_devices(DeviceKind::Output)?;
        return Ok(ExitCode::SUCCESS);
    }
    if config.path.is_none() {
        AppConfig::command().print_help()?;
        println!();
        return Ok(ExitCode::from(USAGE_EXIT));
    }

    init_logging(&config);
    init_tracing(&config);
    install_panic_hook();
    log_debug("=== recwav started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let plan = config
        .capture_plan()
        .ok_or_else(|| anyhow!("no destination path given"))?;
    let backend = CpalBackend::new(
        config.input_device.as_deref(),
        config.output_device.as_deref(),
        plan.monitor,
    )?;
    log_debug(&format!(
        "devices: input={} output={}",
        backend.input_name(),
        backend.output_name().as_deref().unwrap_or("none")
    ));

    let (input_tx, input_rx) = bounded(INPUT_CHANNEL_CAPACITY);
    // Blocked on stdin until exit; never joined.
    let _input_thread = spawn_input_thread(input_tx);

    let stdout = io::stdout();
    let summary = SessionController::new(&input_rx, stdout.lock()).run(
        backend,
        MonotonicClock::default(),
        plan,
    )?;
    log_debug(&format!(
        "session complete: {:?} after {:.2}s, {} frames, {} dropped chunks",
        summary.ended,
        summary.report.duration.as_secs_f64(),
        summary.report.frames,
        summary.report.dropped_chunks
    ));
    Ok(ExitCode::SUCCESS)
}

fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        log_panic(info);
        default_hook(info);
    }));
}
