use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no audio input device available")]
    NoInputDevice,
    #[error("no audio output device available")]
    NoOutputDevice,
    #[error("audio device '{0}' not found")]
    NotFound(String),
    #[error("failed to enumerate audio devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),
}

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the named input device, or the host default when no name is given.
pub fn get_or_default_input(device_name: Option<&str>) -> Result<Device, DeviceError> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    match device_name {
        None => host.default_input_device().ok_or(DeviceError::NoInputDevice),
        Some(target) => host
            .input_devices()?
            .find(|d| d.name().is_ok_and(|name| name == target))
            .ok_or_else(|| DeviceError::NotFound(target.to_string())),
    }
}

pub fn get_or_default_output(device_name: Option<&str>) -> Result<Device, DeviceError> {
    let host = get_host();
    match device_name {
        None => host.default_output_device().ok_or(DeviceError::NoOutputDevice),
        Some(target) => host
            .output_devices()?
            .find(|d| d.name().is_ok_and(|name| name == target))
            .ok_or_else(|| DeviceError::NotFound(target.to_string())),
    }
}

fn describe(device: &Device, config: Option<cpal::SupportedStreamConfig>, default: &str) -> String {
    let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
    let mut d = match config {
        Some(cfg) => format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0),
        None => format!(" * {}(no default config)", name),
    };
    if name == default {
        d.push_str(" [default]");
    }
    d
}

pub fn get_available_inputs() -> Result<String, DeviceError> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }
    let host = get_host();
    let default_device = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();
    let device_names: Vec<String> = host
        .input_devices()?
        .map(|d| {
            let cfg = d.default_input_config().ok();
            describe(&d, cfg, &default_device)
        })
        .collect();
    Ok(device_names.join("\n"))
}

pub fn get_available_outputs() -> Result<String, DeviceError> {
    let host = get_host();
    let default_device = host
        .default_output_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();
    let device_names: Vec<String> = host
        .output_devices()?
        .map(|d| {
            let cfg = d.default_output_config().ok();
            describe(&d, cfg, &default_device)
        })
        .collect();
    Ok(device_names.join("\n"))
}
