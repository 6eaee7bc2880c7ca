use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

/// Audio device information
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub channels: usize,
    pub sample_rate: u32,
}

/// Get the default audio host
pub fn get_host() -> Host {
    cpal::default_host()
}

fn device_name(device: &Device) -> Option<String> {
    device.description().ok().map(|desc| desc.name().to_string())
}

fn describe_devices(
    devices: impl Iterator<Item = Device>,
    default_name: Option<String>,
    input: bool,
) -> Vec<AudioDeviceInfo> {
    let mut infos = Vec::new();

    for device in devices {
        let name = match device_name(&device) {
            Some(name) => name,
            None => continue,
        };
        let is_default = Some(&name) == default_name.as_ref();

        let config = if input {
            device.default_input_config().ok()
        } else {
            device.default_output_config().ok()
        };
        let (channels, sample_rate) = match config {
            Some(cfg) => (cfg.channels() as usize, cfg.sample_rate()),
            None => (0, 0),
        };

        infos.push(AudioDeviceInfo {
            name,
            is_default,
            channels,
            sample_rate,
        });
    }

    infos
}

/// List all available input devices
pub fn list_input_devices() -> Result<Vec<AudioDeviceInfo>> {
    let host = get_host();
    let default_name = host.default_input_device().as_ref().and_then(device_name);
    Ok(describe_devices(host.input_devices()?, default_name, true))
}

/// List all available output devices
pub fn list_output_devices() -> Result<Vec<AudioDeviceInfo>> {
    let host = get_host();
    let default_name = host.default_output_device().as_ref().and_then(device_name);
    Ok(describe_devices(host.output_devices()?, default_name, false))
}

fn find_device(devices: impl Iterator<Item = Device>, selector: &str) -> Result<Device> {
    let devices: Vec<Device> = devices.collect();

    // Try an index first
    if let Ok(index) = selector.parse::<usize>() {
        return devices
            .into_iter()
            .nth(index)
            .with_context(|| format!("Device index {index} out of range"));
    }

    // Otherwise a case-insensitive substring match on the name
    let selector_lower = selector.to_lowercase();
    for device in devices {
        if let Some(name) = device_name(&device) {
            if name.to_lowercase().contains(&selector_lower) {
                return Ok(device);
            }
        }
    }

    anyhow::bail!("Device '{}' not found", selector)
}

/// Resolve the input device from a name-or-index selector, falling back
/// to the system default.
pub fn find_input_device(selector: Option<&str>) -> Result<Device> {
    let host = get_host();
    match selector {
        Some(selector) => find_device(host.input_devices()?, selector),
        None => host
            .default_input_device()
            .context("No default input device available"),
    }
}

/// Resolve the output device from a name-or-index selector, falling back
/// to the system default.
pub fn find_output_device(selector: Option<&str>) -> Result<Device> {
    let host = get_host();
    match selector {
        Some(selector) => find_device(host.output_devices()?, selector),
        None => host
            .default_output_device()
            .context("No default output device available"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // This test may fail on systems without audio devices
        if let Ok(devices) = list_input_devices() {
            println!("Found {} input devices", devices.len());
            for device in devices {
                println!(
                    "  - {} ({}ch @ {}Hz) {}",
                    device.name,
                    device.channels,
                    device.sample_rate,
                    if device.is_default { "[DEFAULT]" } else { "" }
                );
            }
        }
    }
}
