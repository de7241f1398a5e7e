//! One-second circular sample store shared by the recorder and the playback channel.
//!
//! The input callback writes frames at the record cursor and the output callback
//! reads them back at the play cursor. Samples are stored as `f32` bits in atomics,
//! so both device threads can touch the buffer without locking; cursor positions
//! observed by the session are snapshots that may be slightly stale.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::DeviceError;

use super::DeviceClockInfo;

/// Looping PCM buffer sized for one second of audio at the device's native rate.
#[derive(Clone)]
pub struct RingBufferSound {
    samples: Arc<[AtomicU32]>, // Interleaved f32 bit patterns
    frames: usize,             // Length in PCM frames (fixed)
    channels: usize,           // Interleaved channel count
    sample_rate: u32,          // Native rate the buffer was sized for
}

impl RingBufferSound {
    /// Allocate a one-second buffer for the given input device.
    ///
    /// # Errors
    /// Returns [`DeviceError::Allocation`] when the layout is empty or the
    /// allocation itself fails.
    pub fn new(info: &DeviceClockInfo) -> Result<Self, DeviceError> {
        let frames = info.native_rate as usize;
        let channels = info.channels as usize;
        let alloc_err = || DeviceError::Allocation { frames, channels };

        let len = frames.checked_mul(channels).filter(|len| *len > 0).ok_or_else(alloc_err)?;

        let mut samples = Vec::new();
        samples.try_reserve_exact(len).map_err(|_| alloc_err())?;
        samples.resize_with(len, || AtomicU32::new(0));

        Ok(Self { samples: samples.into(), frames, channels, sample_rate: info.native_rate })
    }

    /// Length in PCM frames. Never changes after creation.
    pub fn length(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Store one sample. `frame` is taken modulo the buffer length.
    pub(super) fn store(&self, frame: usize, channel: usize, value: f32) {
        let index = (frame % self.frames) * self.channels + channel;
        self.samples[index].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Load one sample. `frame` is taken modulo the buffer length.
    pub(super) fn load(&self, frame: usize, channel: usize) -> f32 {
        let index = (frame % self.frames) * self.channels + channel;
        f32::from_bits(self.samples[index].load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(rate: u32, channels: u16) -> DeviceClockInfo {
        DeviceClockInfo { name: "test".into(), native_rate: rate, channels }
    }

    #[test]
    fn test_length_is_one_second() {
        let sound = RingBufferSound::new(&info(48000, 2)).unwrap();
        assert_eq!(sound.length(), 48000);
        assert_eq!(sound.channels(), 2);
        assert_eq!(sound.sample_rate(), 48000);
    }

    #[test]
    fn test_empty_layout_is_allocation_error() {
        assert!(matches!(RingBufferSound::new(&info(0, 2)), Err(DeviceError::Allocation { .. })));
        assert!(matches!(RingBufferSound::new(&info(48000, 0)), Err(DeviceError::Allocation { .. })));
    }

    #[test]
    fn test_clones_share_storage_and_wrap() {
        let sound = RingBufferSound::new(&info(100, 1)).unwrap();
        let reader = sound.clone();
        sound.store(105, 0, 0.25);
        assert_eq!(reader.load(5, 0), 0.25);
        assert_eq!(reader.length(), 100);
    }
}
