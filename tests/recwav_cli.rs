use std::process::{Command, Stdio};

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn recwav_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_recwav").expect("recwav test binary not built")
}

#[test]
fn recwav_help_mentions_name_and_path_flag() {
    let output = Command::new(recwav_bin())
        .arg("--help")
        .output()
        .expect("run recwav --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("recwav"));
    assert!(combined.contains("--path"));
}

#[test]
fn recwav_without_path_prints_usage_and_exits_2() {
    let output = Command::new(recwav_bin())
        .stdin(Stdio::null())
        .output()
        .expect("run recwav without args");
    assert_eq!(output.status.code(), Some(2));
    let combined = combined_output(&output);
    assert!(combined.contains("Usage"));
    assert!(combined.contains("--path"));
}

#[test]
fn recwav_list_input_devices_uses_override() {
    let output = Command::new(recwav_bin())
        .arg("--list-input-devices")
        .env("RECWAV_TEST_DEVICES", "Studio Mic, Laptop Mic")
        .output()
        .expect("run recwav --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Available audio input devices:"));
    assert!(combined.contains("  - Studio Mic"));
    assert!(combined.contains("  - Laptop Mic"));
}

#[test]
fn recwav_list_output_devices_reports_empty_override() {
    let output = Command::new(recwav_bin())
        .arg("--list-output-devices")
        .env("RECWAV_TEST_DEVICES", "")
        .output()
        .expect("run recwav --list-output-devices");
    assert!(output.status.success());
    assert!(combined_output(&output).contains("No audio output devices detected."));
}

#[test]
fn recwav_rejects_out_of_range_write_rate() {
    let output = Command::new(recwav_bin())
        .args(["--path", "take.wav", "--write-rate", "1000"])
        .stdin(Stdio::null())
        .output()
        .expect("run recwav --write-rate 1000");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--write-rate"));
}

#[test]
fn recwav_validates_flags_before_printing_usage() {
    let output = Command::new(recwav_bin())
        .args(["--write-rate", "1000"])
        .stdin(Stdio::null())
        .output()
        .expect("run recwav --write-rate 1000 without a path");
    assert_eq!(output.status.code(), Some(1));
    let combined = combined_output(&output);
    assert!(combined.contains("--write-rate must be between"));
    assert!(!combined.contains("Usage"));
}
