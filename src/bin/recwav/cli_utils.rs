use anyhow::Result;
use recwav::audio;

/// Which side of the host to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeviceKind {
    Input,
    Output,
}

impl DeviceKind {
    fn label(self) -> &'static str {
        match self {
            DeviceKind::Input => "input",
            DeviceKind::Output => "output",
        }
    }
}

pub(crate) fn list_devices(kind: DeviceKind) -> Result<()> {
    // RECWAV_TEST_DEVICES stands in for the host so tests need no sound card.
    let devices = if let Ok(raw) = std::env::var("RECWAV_TEST_DEVICES") {
        parse_device_list(&raw)
    } else {
        let listed = match kind {
            DeviceKind::Input => audio::list_input_devices(),
            DeviceKind::Output => audio::list_output_devices(),
        };
        listed.unwrap_or_else(|err| {
            eprintln!("Failed to list audio {} devices: {err}", kind.label());
            Vec::new()
        })
    };

    for line in render_device_list(kind, &devices) {
        println!("{line}");
    }
    Ok(())
}

fn parse_device_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn render_device_list(kind: DeviceKind, devices: &[String]) -> Vec<String> {
    if devices.is_empty() {
        return vec![format!("No audio {} devices detected.", kind.label())];
    }
    let mut lines = Vec::with_capacity(devices.len() + 1);
    lines.push(format!("Available audio {} devices:", kind.label()));
    lines.extend(devices.iter().map(|name| format!("  - {name}")));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_device_list_trims_and_skips_blanks() {
        assert_eq!(
            parse_device_list(" Built-in Mic , ,USB Mic "),
            vec!["Built-in Mic".to_string(), "USB Mic".to_string()]
        );
        assert!(parse_device_list("   ").is_empty());
    }

    #[test]
    fn render_device_list_reports_empty_hosts() {
        assert_eq!(
            render_device_list(DeviceKind::Output, &[]),
            vec!["No audio output devices detected.".to_string()]
        );
    }

    #[test]
    fn render_device_list_bullets_each_device() {
        let lines = render_device_list(DeviceKind::Input, &["Mic".to_string()]);
        assert_eq!(lines, vec!["Available audio input devices:", "  - Mic"]);
    }
}
