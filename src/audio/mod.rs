//! Audio device subsystem.
//!
//! The session only talks to devices through [`AudioSystem`] and [`PlaybackChannel`].
//! [`CpalSystem`] implements them with cpal: an input stream records into a looping
//! [`RingBufferSound`] and an output stream plays the same buffer back at a
//! variable rate with an effect chain applied.

mod capture;
#[cfg(test)]
pub mod mock;
mod playback;
mod sound;
mod system;
pub mod util;

pub use sound::RingBufferSound;
pub use system::CpalSystem;

use crate::effects::Effect;
use crate::error::DeviceError;

/// Clock and layout of a recording device, read once at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceClockInfo {
    pub name: String,     // Human-readable device name
    pub native_rate: u32, // Native sample rate (Hz)
    pub channels: u16,    // Native channel count
}

/// Opaque id of an effect attached to a playback channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle(pub(crate) u64);

/// Recording side of the device subsystem.
///
/// All calls are non-blocking and report the current device state.
pub trait AudioSystem {
    type Channel: PlaybackChannel;

    /// Number of recording drivers available.
    fn record_driver_count(&self) -> Result<usize, DeviceError>;

    /// Native rate and channel count of a recording driver.
    fn record_driver_info(&self, index: usize) -> Result<DeviceClockInfo, DeviceError>;

    /// Start recording into `sound`, wrapping around forever when `looped`.
    fn record_start(&mut self, index: usize, sound: &RingBufferSound, looped: bool) -> Result<(), DeviceError>;

    /// Current write cursor in PCM frames, `0..sound.length()`.
    fn record_position(&self, index: usize) -> Result<usize, DeviceError>;

    /// Whether the driver is still delivering data.
    fn is_recording(&self, index: usize) -> Result<bool, DeviceError>;

    /// Stop recording and release the input stream.
    fn record_stop(&mut self, index: usize) -> Result<(), DeviceError>;

    /// Start looping playback of `sound` on the output device.
    fn play_sound(&mut self, sound: &RingBufferSound, paused: bool) -> Result<Self::Channel, DeviceError>;
}

/// A playing output channel.
pub trait PlaybackChannel {
    /// Current read cursor in PCM frames, `0..sound.length()`.
    fn position(&self) -> Result<usize, DeviceError>;

    /// Playback frequency in Hz (frames of the sound consumed per second).
    fn frequency(&self) -> Result<f32, DeviceError>;

    fn set_frequency(&mut self, hz: f32) -> Result<(), DeviceError>;

    fn set_paused(&mut self, paused: bool) -> Result<(), DeviceError>;

    /// Sample rate effects attached to this channel run at.
    fn output_rate(&self) -> u32;

    /// Attach an effect at the head of the channel's effect chain.
    fn add_effect(&mut self, effect: Box<dyn Effect>) -> Result<EffectHandle, DeviceError>;

    /// Detach and release a previously attached effect.
    fn remove_effect(&mut self, handle: EffectHandle) -> Result<(), DeviceError>;
}
