//! Drift-compensating playback rate control.
//!
//! Playback starts once enough audio has been recorded to cover the adjusted
//! latency. From then on every tick measures how far playback trails recording,
//! smooths that gap with a first-order low-pass filter and nudges the playback
//! rate by 2% whenever the smoothed gap leaves the dead zone around the target.

use tracing::{debug, info, warn};

use crate::audio::{AudioSystem, PlaybackChannel, RingBufferSound};
use crate::error::DeviceError;

use super::tracker::CursorCounter;

/// Default low-pass coefficient for the measured latency.
pub const DEFAULT_SMOOTHING: f64 = 0.97;

/// Fixed latency parameters, in samples of the native rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySettings {
    pub native_rate: u32,     // Input device clock (Hz)
    pub desired_latency: u32, // Target gap between record and play cursors
    pub drift_threshold: u32, // Half-width of the dead zone
    pub smoothing: f64,       // Weight of the previous estimate
}

impl LatencySettings {
    /// Convert millisecond settings to samples of `native_rate`.
    pub fn from_millis(native_rate: u32, latency_ms: u32, drift_ms: u32, smoothing: f64) -> Self {
        let to_samples = |ms: u32| (native_rate as u64 * ms as u64 / 1000) as u32;
        Self { native_rate, desired_latency: to_samples(latency_ms), drift_threshold: to_samples(drift_ms), smoothing }
    }

    /// Convert a sample count at the native rate to milliseconds.
    pub fn to_millis(&self, samples: i64) -> i64 {
        if self.native_rate == 0 { 0 } else { samples * 1000 / self.native_rate as i64 }
    }
}

/// Output channel lifecycle. There is no way back to `Waiting`.
pub enum PlaybackState<C> {
    Waiting,
    Playing(C),
}

/// Which way the playback rate is being pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateCorrection {
    /// Playback is catching up with recording
    SlowDown,
    #[default]
    Hold,
    /// Playback is falling behind recording
    SpeedUp,
}

impl RateCorrection {
    /// Playback rate for this correction around `base` Hz (±2%).
    pub fn apply(self, base: u32) -> u32 {
        match self {
            RateCorrection::SlowDown => base - base / 50,
            RateCorrection::Hold => base,
            RateCorrection::SpeedUp => base + base / 50,
        }
    }
}

/// One low-pass step: `smoothing * actual + (1 - smoothing) * latency`.
pub fn smooth(actual: f64, latency: i64, smoothing: f64) -> f64 {
    smoothing * actual + (1.0 - smoothing) * latency as f64
}

/// Pick the correction for a smoothed latency.
///
/// The dead zone is `adjusted ± threshold` with both edges inside it; the lower
/// edge clamps at zero.
pub fn correction(actual: f64, adjusted: u32, threshold: u32) -> RateCorrection {
    let lower = adjusted.saturating_sub(threshold) as f64;
    let upper = adjusted as f64 + threshold as f64;
    if actual < lower {
        RateCorrection::SlowDown
    } else if actual > upper {
        RateCorrection::SpeedUp
    } else {
        RateCorrection::Hold
    }
}

/// Starts playback and keeps it at the adjusted latency behind recording.
pub struct LatencyController<C> {
    settings: LatencySettings,
    state: PlaybackState<C>,
    played: CursorCounter,
    actual_latency: f64,        // Smoothed record-minus-play gap
    base_rate: u32,             // Rate corrections are relative to this
    playback_rate: u32,         // Last rate applied to the channel
    correction: RateCorrection, // Last correction branch taken
    paused: bool,               // Channel paused because recording stopped
}

impl<C> LatencyController<C> {
    pub fn new(settings: LatencySettings) -> Self {
        Self {
            settings,
            state: PlaybackState::Waiting,
            played: CursorCounter::default(),
            actual_latency: settings.desired_latency as f64,
            base_rate: settings.native_rate,
            playback_rate: settings.native_rate,
            correction: RateCorrection::Hold,
            paused: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing(_))
    }

    pub fn channel_mut(&mut self) -> Option<&mut C> {
        match &mut self.state {
            PlaybackState::Playing(channel) => Some(channel),
            PlaybackState::Waiting => None,
        }
    }

    /// Whether this tick should start playback.
    pub fn should_start(&self, samples_recorded: u64, adjusted_latency: u32) -> bool {
        !self.is_playing() && samples_recorded >= adjusted_latency as u64
    }

    pub fn samples_played(&self) -> u64 {
        self.played.total()
    }

    pub fn actual_latency(&self) -> i64 {
        self.actual_latency.round() as i64
    }

    pub fn playback_rate(&self) -> u32 {
        self.playback_rate
    }

    pub fn correction(&self) -> RateCorrection {
        self.correction
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn into_channel(self) -> Option<C> {
        match self.state {
            PlaybackState::Playing(channel) => Some(channel),
            PlaybackState::Waiting => None,
        }
    }
}

impl<C: PlaybackChannel> LatencyController<C> {
    /// Start playback the first time enough audio has been recorded.
    ///
    /// # Returns
    /// `true` on the tick playback starts, `false` otherwise.
    pub fn maybe_start<S>(&mut self, system: &mut S, sound: &RingBufferSound, samples_recorded: u64, adjusted_latency: u32) -> Result<bool, DeviceError>
    where
        S: AudioSystem<Channel = C>,
    {
        if !self.should_start(samples_recorded, adjusted_latency) {
            return Ok(false);
        }

        let mut channel = system.play_sound(sound, false)?;
        debug!("Playback channel opened at {} Hz", channel.frequency()?);
        channel.set_frequency(self.base_rate as f32)?;
        self.playback_rate = self.base_rate;
        self.state = PlaybackState::Playing(channel);

        info!(
            "▶️  Playback started after {} recorded samples (adjusted latency {} = {}ms)",
            samples_recorded,
            adjusted_latency,
            self.settings.to_millis(adjusted_latency as i64)
        );
        Ok(true)
    }

    /// Change the rate corrections are applied around.
    ///
    /// Takes effect on the channel immediately when playing.
    pub fn set_base_rate(&mut self, hz: u32) -> Result<(), DeviceError> {
        if hz == self.base_rate {
            return Ok(());
        }
        debug!("Base playback rate {} -> {} Hz", self.base_rate, hz);
        self.base_rate = hz;
        self.playback_rate = self.correction.apply(hz);
        if let PlaybackState::Playing(channel) = &mut self.state {
            channel.set_frequency(self.playback_rate as f32)?;
        }
        Ok(())
    }

    /// One control step while playing; does nothing while waiting.
    ///
    /// # Arguments
    /// * `system` - Device subsystem, queried for the recording state
    /// * `device` - Recording driver index
    /// * `samples_recorded` - Total frames recorded so far
    /// * `adjusted_latency` - Target gap in frames
    /// * `length` - Ring buffer length in frames
    ///
    /// # Errors
    /// Any device error except a recording disconnect.
    pub fn step<S>(&mut self, system: &S, device: usize, samples_recorded: u64, adjusted_latency: u32, length: usize) -> Result<(), DeviceError>
    where
        S: AudioSystem<Channel = C>,
    {
        let PlaybackState::Playing(channel) = &mut self.state else {
            return Ok(());
        };

        let recording = match system.is_recording(device) {
            Ok(recording) => recording,
            Err(e) if e.is_transient() => false,
            Err(e) => return Err(e),
        };

        if !recording && !self.paused {
            channel.set_paused(true)?;
            self.paused = true;
            warn!("⏸️  Recording stopped, playback paused");
        }

        let position = channel.position()?;
        self.played.advance(position, length);

        let latency = samples_recorded as i64 - self.played.total() as i64;
        self.actual_latency = smooth(self.actual_latency, latency, self.settings.smoothing);
        self.correction = correction(self.actual_latency, adjusted_latency, self.settings.drift_threshold);
        self.playback_rate = self.correction.apply(self.base_rate);

        channel.set_frequency(self.playback_rate as f32)
    }
}
