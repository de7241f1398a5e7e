//! cpal-backed implementation of the device subsystem.

use std::collections::HashMap;

use cpal::traits::HostTrait;
use cpal::{Device, Host};
use tracing::{debug, info};

use crate::error::DeviceError;

use super::capture::Recorder;
use super::playback::Channel;
use super::util::clock_info;
use super::{AudioSystem, DeviceClockInfo, RingBufferSound};

/// Audio system on the platform's default cpal host.
pub struct CpalSystem {
    host: Host,
    inputs: Vec<Device>,                 // Recording drivers, enumerated once
    recorders: HashMap<usize, Recorder>, // Active recordings by driver index
}

impl CpalSystem {
    /// Open the default host and enumerate its recording drivers.
    pub fn new() -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let inputs: Vec<Device> = host.input_devices()?.collect();

        info!("Audio host: {} ({} recording devices)", host.id().name(), inputs.len());

        Ok(Self { host, inputs, recorders: HashMap::new() })
    }

    fn input(&self, index: usize) -> Result<&Device, DeviceError> {
        self.inputs.get(index).ok_or(DeviceError::NotFound { index, count: self.inputs.len() })
    }

    fn recorder(&self, index: usize) -> Result<&Recorder, DeviceError> {
        self.recorders.get(&index).ok_or(DeviceError::NotRecording(index))
    }
}

impl AudioSystem for CpalSystem {
    type Channel = Channel;

    fn record_driver_count(&self) -> Result<usize, DeviceError> {
        Ok(self.inputs.len())
    }

    fn record_driver_info(&self, index: usize) -> Result<DeviceClockInfo, DeviceError> {
        clock_info(self.input(index)?)
    }

    fn record_start(&mut self, index: usize, sound: &RingBufferSound, looped: bool) -> Result<(), DeviceError> {
        let recorder = Recorder::start(self.input(index)?, sound.clone(), looped)?;
        self.recorders.insert(index, recorder);
        Ok(())
    }

    fn record_position(&self, index: usize) -> Result<usize, DeviceError> {
        self.recorder(index)?.position()
    }

    fn is_recording(&self, index: usize) -> Result<bool, DeviceError> {
        self.recorder(index)?.is_recording()
    }

    fn record_stop(&mut self, index: usize) -> Result<(), DeviceError> {
        if let Some(recorder) = self.recorders.remove(&index) {
            recorder.stop()?;
            debug!("Released recorder for device {}", index);
        }
        Ok(())
    }

    fn play_sound(&mut self, sound: &RingBufferSound, paused: bool) -> Result<Channel, DeviceError> {
        Channel::start(&self.host, sound.clone(), paused)
    }
}
