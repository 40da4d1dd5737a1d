use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the named input device, or the host default when no name is given.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    let Some(target) = device_name else {
        return host.default_input_device().context("No default input device");
    };
    host.input_devices()
        .context("Failed to enumerate input devices")?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .with_context(|| format!("No input device named {target}"))
}

/// Finds the named output device, or the host default when no name is given.
pub fn get_or_default_output(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    let Some(target) = device_name else {
        return host.default_output_device().context("No default output device");
    };
    host.output_devices()
        .context("Failed to enumerate output devices")?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .with_context(|| format!("No output device named {target}"))
}

fn describe(name: &str, channels: u16, sample_rate: u32, is_default: bool) -> String {
    let mut d = format!(" * {}({}ch, {}hz)", name, channels, sample_rate);
    if is_default {
        d.push_str(" [default]");
    }
    d
}

pub fn get_available_inputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut device_names: Vec<String> = Vec::new();
    for device in host.input_devices().context("No input devices found")? {
        let Ok(name) = device.name() else {
            continue;
        };
        let Ok(config) = device.default_input_config() else {
            tracing::debug!("Skipping input device without default config: {}", name);
            continue;
        };
        let is_default = default_name.as_deref() == Some(name.as_str());
        device_names.push(describe(&name, config.channels(), config.sample_rate().0, is_default));
    }
    Ok(device_names.join("\n"))
}

pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut device_names: Vec<String> = Vec::new();
    for device in host.output_devices().context("No output devices found")? {
        let Ok(name) = device.name() else {
            continue;
        };
        let Ok(config) = device.default_output_config() else {
            tracing::debug!("Skipping output device without default config: {}", name);
            continue;
        };
        let is_default = default_name.as_deref() == Some(name.as_str());
        device_names.push(describe(&name, config.channels(), config.sample_rate().0, is_default));
    }
    Ok(device_names.join("\n"))
}

#[cfg(test)]
mod tests {
    #[test]
    fn default_device_is_marked() {
        assert_eq!(super::describe("Mic", 1, 48000, true), " * Mic(1ch, 48000hz) [default]");
        assert_eq!(super::describe("Line", 2, 44100, false), " * Line(2ch, 44100hz)");
    }
}
