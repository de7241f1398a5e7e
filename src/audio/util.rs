//! Shared audio utilities for capture and playback.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, SampleFormat, SupportedStreamConfig, SupportedStreamConfigRange};

use crate::error::DeviceError;

use super::DeviceClockInfo;

/// Get a human-readable device name.
///
/// # Arguments
/// * `device` - The audio device
///
/// # Returns
/// Device name string, or "Unknown" if the name cannot be retrieved.
pub fn get_device_name(device: &Device) -> String {
    device.description().ok().map(|desc| desc.name().to_string()).unwrap_or_else(|| "Unknown".to_string())
}

/// Find the best matching audio configuration.
///
/// Searches for a configuration that:
/// 1. Supports mono or stereo (max 2 channels)
/// 2. Uses F32 sample format (universally supported on modern hardware)
/// 3. Matches the target sample rate, or uses the closest available rate
///
/// # Arguments
/// * `configs` - Iterator of supported stream configurations
/// * `target_sample_rate` - Desired sample rate (usually the device's default rate)
///
/// # Returns
/// The best matching `SupportedStreamConfig`, or an error if no suitable config found.
pub fn find_best_config(
    configs: impl Iterator<Item = SupportedStreamConfigRange>,
    target_sample_rate: u32,
) -> Result<SupportedStreamConfig, DeviceError> {
    let f32_configs: Vec<SupportedStreamConfigRange> =
        configs.filter(|config| config.channels() <= 2 && config.sample_format() == SampleFormat::F32).collect();

    let Some(first) = f32_configs.first() else {
        return Err(DeviceError::UnsupportedConfig("no mono/stereo F32 configuration offered".into()));
    };

    // Find config that supports target sample rate, or use first available
    for config in &f32_configs {
        if target_sample_rate >= config.min_sample_rate() && target_sample_rate <= config.max_sample_rate() {
            return Ok(config.clone().with_sample_rate(target_sample_rate));
        }
    }

    let rate = if target_sample_rate < first.min_sample_rate() { first.min_sample_rate() } else { first.max_sample_rate() };
    Ok(first.clone().with_sample_rate(rate))
}

/// Pick the native F32 configuration of an input device.
///
/// The device's default rate is treated as its native clock; the channel count
/// comes from the matching F32 configuration.
pub fn native_input_config(device: &Device) -> Result<SupportedStreamConfig, DeviceError> {
    let native_rate = device.default_input_config()?.sample_rate();
    find_best_config(device.supported_input_configs()?, native_rate)
}

/// Describe an input device by its native configuration.
pub fn clock_info(device: &Device) -> Result<DeviceClockInfo, DeviceError> {
    let config = native_input_config(device)?;
    Ok(DeviceClockInfo { name: get_device_name(device), native_rate: config.sample_rate(), channels: config.channels() })
}

/// Copy one interleaved frame into another with a possibly different channel count.
///
/// Output channel `c` takes input channel `c % input.len()`, so mono input is
/// duplicated to every output channel and extra input channels are dropped.
pub fn spread_frame(input: &[f32], output: &mut [f32]) {
    if input.is_empty() {
        output.fill(0.0);
        return;
    }
    for (channel, sample) in output.iter_mut().enumerate() {
        *sample = input[channel % input.len()];
    }
}

/// Print every recording device with its native clock.
pub fn print_input_devices() -> Result<()> {
    let host = cpal::default_host();
    let devices: Vec<Device> = host.input_devices().context("Failed to enumerate input devices")?.collect();

    println!("═══════════════════════════════════════════════════════════════════");
    println!("  Recording devices ({} host, {} found)", host.id().name(), devices.len());
    println!("═══════════════════════════════════════════════════════════════════");
    println!("{:<6} {:<10} {:<9} NAME", "INDEX", "RATE", "CHANNELS");
    println!("{}", "─".repeat(67));

    for (index, device) in devices.iter().enumerate() {
        match clock_info(device) {
            Ok(info) => println!("{:<6} {:<10} {:<9} {}", index, info.native_rate, info.channels, info.name),
            Err(e) => println!("{:<6} {:<10} {:<9} {} ({})", index, "-", "-", get_device_name(device), e),
        }
    }

    println!();
    println!("Usage:");
    println!("  ./record-loopback --device <INDEX>");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_mono_to_stereo() {
        let mut out = [0.0f32; 2];
        spread_frame(&[0.5], &mut out);
        assert_eq!(out, [0.5, 0.5]);
    }

    #[test]
    fn test_spread_stereo_to_mono_keeps_first_channel() {
        let mut out = [0.0f32; 1];
        spread_frame(&[0.25, -1.0], &mut out);
        assert_eq!(out, [0.25]);
    }

    #[test]
    fn test_spread_empty_input_is_silence() {
        let mut out = [1.0f32; 2];
        spread_frame(&[], &mut out);
        assert_eq!(out, [0.0, 0.0]);
    }
}
