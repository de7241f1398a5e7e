//! Record/playback session loop.
//!
//! A [`Session`] owns every piece of loop state: the ring buffer, the record
//! tracker, the latency controller and the effect chain. Each tick polls the
//! record cursor, starts playback once enough audio is buffered, applies at most
//! one effect selection, corrects drift and renders status.

mod effect_chain;
pub mod latency;
mod tracker;

pub use effect_chain::EffectChainManager;
pub use latency::{LatencyController, LatencySettings, RateCorrection};
pub use tracker::RecordTracker;

use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::{AudioSystem, DeviceClockInfo, RingBufferSound};
use crate::effects::EffectKind;
use crate::error::DeviceError;
use crate::ui::{Button, ControlSurface};

/// Parameters fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub device_index: usize, // Recording driver to loop back
    pub latency_ms: u32,     // Desired record-to-play latency
    pub drift_ms: u32,       // Dead zone half-width
    pub smoothing: f64,      // Latency low-pass coefficient
}

/// Snapshot of the loop state for the control surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub device: DeviceClockInfo,
    pub latency_ms: u32,
    pub desired_latency: u32,
    pub adjusted_latency: u32,
    pub actual_latency: i64,
    pub samples_recorded: u64,
    pub samples_played: u64,
    pub playing: bool,
    pub paused: bool,
    pub disconnected: bool,
    pub playback_rate: u32,
    pub correction: RateCorrection,
    pub effect: EffectKind,
    pub record_granularity: Option<usize>, // Smallest nonzero record delta seen
}

impl SessionStatus {
    /// Convert a sample count at the device's native rate to milliseconds.
    pub fn millis(&self, samples: i64) -> i64 {
        if self.device.native_rate == 0 { 0 } else { samples * 1000 / self.device.native_rate as i64 }
    }
}

/// A running loopback session over an [`AudioSystem`].
pub struct Session<S: AudioSystem> {
    system: S,
    config: SessionConfig,
    device: DeviceClockInfo,
    sound: RingBufferSound,
    tracker: RecordTracker,
    latency: LatencyController<S::Channel>,
    effects: EffectChainManager,
    disconnected: bool, // Recording driver reported a disconnect
    ticks: u64,
}

impl<S: AudioSystem> Session<S> {
    /// Pick the recording driver, allocate the ring buffer and start recording.
    ///
    /// # Errors
    /// Returns an error if no recording driver exists, the index is out of
    /// range, the buffer cannot be allocated or recording fails to start.
    pub fn start(mut system: S, config: SessionConfig) -> Result<Self, DeviceError> {
        let count = system.record_driver_count()?;
        if count == 0 {
            return Err(DeviceError::NoInputDevices);
        }

        let device = system.record_driver_info(config.device_index)?;
        info!("Using input device {}: {} ({} Hz, {} channels)", config.device_index, device.name, device.native_rate, device.channels);

        let settings = LatencySettings::from_millis(device.native_rate, config.latency_ms, config.drift_ms, config.smoothing);
        debug!("Desired latency {} samples, drift threshold {} samples", settings.desired_latency, settings.drift_threshold);

        let sound = RingBufferSound::new(&device)?;
        system.record_start(config.device_index, &sound, true)?;

        Ok(Self {
            system,
            config,
            device,
            sound,
            tracker: RecordTracker::new(settings.desired_latency),
            latency: LatencyController::new(settings),
            effects: EffectChainManager::new(),
            disconnected: false,
            ticks: 0,
        })
    }

    /// Run one tick of the loop.
    ///
    /// # Arguments
    /// * `selection` - Effect selected on this tick, if any
    ///
    /// # Errors
    /// Any fatal device error. Recording disconnects are absorbed.
    pub fn tick(&mut self, selection: Option<EffectKind>) -> Result<(), DeviceError> {
        self.ticks += 1;
        let length = self.sound.length();

        let position = match self.system.record_position(self.config.device_index) {
            Ok(position) => {
                if self.disconnected {
                    info!("🔌 Recording device reporting again");
                    self.disconnected = false;
                }
                position
            }
            Err(e) if e.is_transient() => {
                if !self.disconnected {
                    warn!("🔌 Recording device disconnected, holding the last record position");
                    self.disconnected = true;
                }
                self.tracker.last_pos()
            }
            Err(e) => return Err(e),
        };
        self.tracker.poll(position, length);

        let recorded = self.tracker.samples_recorded();
        let adjusted = self.tracker.adjusted_latency();

        if self.latency.maybe_start(&mut self.system, &self.sound, recorded, adjusted)?
            && self.effects.selected() != EffectKind::None
            && let Some(channel) = self.latency.channel_mut()
        {
            self.effects.apply(channel)?;
        }

        if let Some(kind) = selection {
            self.effects.select(kind, self.latency.channel_mut())?;
            self.latency.set_base_rate(self.device.native_rate * kind.rate_scale())?;
        }

        self.latency.step(&self.system, self.config.device_index, recorded, adjusted, length)
    }

    /// Drive the loop until Quit is pressed or `shutdown` is cancelled.
    ///
    /// # Arguments
    /// * `surface` - Source of button presses and sink for status
    /// * `tick` - Sleep between ticks
    /// * `shutdown` - Cancelled from outside (signals) to stop at the next tick boundary
    pub fn run<U: ControlSurface>(&mut self, surface: &mut U, tick: Duration, shutdown: &CancellationToken) -> Result<()> {
        info!("🔁 Loopback running (tick {}ms)", tick.as_millis());

        loop {
            let button = surface.poll()?;
            self.tick(button.and_then(Button::effect))?;
            surface.render(&self.status())?;

            if button == Some(Button::Quit) || shutdown.is_cancelled() {
                break;
            }
            std::thread::sleep(tick);
        }

        info!("Loopback stopped after {} ticks", self.ticks);
        Ok(())
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            device: self.device.clone(),
            latency_ms: self.config.latency_ms,
            desired_latency: self.tracker.desired_latency(),
            adjusted_latency: self.tracker.adjusted_latency(),
            actual_latency: self.latency.actual_latency(),
            samples_recorded: self.tracker.samples_recorded(),
            samples_played: self.latency.samples_played(),
            playing: self.latency.is_playing(),
            paused: self.latency.is_paused(),
            disconnected: self.disconnected,
            playback_rate: self.latency.playback_rate(),
            correction: self.latency.correction(),
            effect: self.effects.selected(),
            record_granularity: self.tracker.min_record_delta(),
        }
    }

    /// Stop recording and release the channel and the buffer.
    pub fn shutdown(mut self) -> Result<(), DeviceError> {
        self.system.record_stop(self.config.device_index)?;
        if let Some(mut channel) = self.latency.into_channel() {
            self.effects.detach(&mut channel)?;
        }
        info!("Released {} frame sound buffer", self.sound.length());
        Ok(())
    }
}
