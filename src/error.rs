//! Device error taxonomy.
//!
//! Every device call returns a [`DeviceError`]. Only [`DeviceError::Disconnected`]
//! is transient: the session swallows it where it occurs and keeps polling.
//! Anything else aborts the session.

use thiserror::Error;

/// Errors reported by the audio device subsystem.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The recording driver went away (unplugged, suspended).
    #[error("recording device disconnected")]
    Disconnected,

    #[error("no recording devices found/plugged in")]
    NoInputDevices,

    #[error("no output device available")]
    NoOutputDevice,

    #[error("recording device index {index} out of range ({count} devices)")]
    NotFound { index: usize, count: usize },

    #[error("recording device {0} has not been started")]
    NotRecording(usize),

    #[error("unsupported stream configuration: {0}")]
    UnsupportedConfig(String),

    #[error("failed to allocate a {frames} frame x {channels} channel sound buffer")]
    Allocation { frames: usize, channels: usize },

    #[error("audio stream failed: {0}")]
    Stream(String),

    #[error("playback channel command queue is full")]
    QueueFull,

    #[error(transparent)]
    Devices(#[from] cpal::DevicesError),

    #[error(transparent)]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error(transparent)]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error(transparent)]
    PauseStream(#[from] cpal::PauseStreamError),
}

impl DeviceError {
    /// Whether the loop may keep running after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::Disconnected)
    }
}
