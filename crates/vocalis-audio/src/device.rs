use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, SampleFormat, SampleRate, StreamConfig};

use vocalis_foundation::AudioError;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// Host and device selection for both ends of the pipeline.
pub struct DeviceManager {
    host: Host,
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn input_device(&self, preferred: Option<&str>) -> Result<Device, AudioError> {
        if let Some(name) = preferred {
            for device in self.host.input_devices()? {
                if device.name().map(|n| n == name).unwrap_or(false) {
                    return Ok(device);
                }
            }
            return Err(AudioError::DeviceNotFound {
                name: Some(name.to_string()),
            });
        }

        self.host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None })
    }

    pub fn output_device(&self, preferred: Option<&str>) -> Result<Device, AudioError> {
        if let Some(name) = preferred {
            for device in self.host.output_devices()? {
                if device.name().map(|n| n == name).unwrap_or(false) {
                    return Ok(device);
                }
            }
            return Err(AudioError::DeviceNotFound {
                name: Some(name.to_string()),
            });
        }

        self.host
            .default_output_device()
            .ok_or(AudioError::DeviceNotFound { name: None })
    }

    pub fn enumerate_inputs(&self) -> Vec<DeviceInfo> {
        let default_name = self
            .host
            .default_input_device()
            .and_then(|d| d.name().ok());

        let mut infos = Vec::new();
        if let Ok(devices) = self.host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name() {
                    let is_default = Some(&name) == default_name.as_ref();
                    infos.push(DeviceInfo { name, is_default });
                }
            }
        }
        infos
    }
}

/// Negotiate an input stream config for the exact sample rate and channel
/// count the pipeline requires. The capture path performs no channel or rate
/// conversion, so a device that cannot do 16-bit-compatible mono at the
/// requested rate is an error, not a silent degradation.
pub fn negotiate_input_config(
    device: &Device,
    sample_rate_hz: u32,
    channels: u16,
) -> Result<(StreamConfig, SampleFormat), AudioError> {
    let rate = SampleRate(sample_rate_hz);
    let candidate = device
        .supported_input_configs()?
        .filter(|c| c.channels() == channels)
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .find(|c| matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32));

    match candidate {
        Some(range) => {
            let format = range.sample_format();
            let config = range.with_sample_rate(rate).config();
            Ok((config, format))
        }
        None => Err(AudioError::FormatNotSupported {
            format: format!("{}ch {}Hz input", channels, sample_rate_hz),
        }),
    }
}

/// Negotiate an output stream config at the playback sample rate, preferring
/// the requested channel count and falling back to stereo fan-out (the sink
/// duplicates the mono signal across device channels).
pub fn negotiate_output_config(
    device: &Device,
    sample_rate_hz: u32,
    preferred_channels: u16,
) -> Result<(StreamConfig, SampleFormat), AudioError> {
    let rate = SampleRate(sample_rate_hz);

    let pick = |channels: u16| -> Result<Option<(StreamConfig, SampleFormat)>, AudioError> {
        let found = device
            .supported_output_configs()?
            .filter(|c| c.channels() == channels)
            .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .find(|c| matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32));
        Ok(found.map(|range| {
            let format = range.sample_format();
            (range.with_sample_rate(rate).config(), format)
        }))
    };

    if let Some(found) = pick(preferred_channels)? {
        return Ok(found);
    }
    if preferred_channels != 2 {
        if let Some(found) = pick(2)? {
            return Ok(found);
        }
    }

    Err(AudioError::FormatNotSupported {
        format: format!("{}Hz output", sample_rate_hz),
    })
}
