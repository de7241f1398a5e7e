//! Headless surface: no buttons, periodic status through tracing.
//!
//! Quitting is left to Ctrl+C / SIGTERM, which cancel the session's shutdown token.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::info;

use super::{Button, ControlSurface};
use crate::session::SessionStatus;

pub struct LogSurface {
    interval: Duration,           // Minimum time between status lines
    last_report: Option<Instant>, // When the last status line was logged
    last_playing: bool,
}

impl LogSurface {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_report: None, last_playing: false }
    }

    fn due(&self, now: Instant) -> bool {
        self.last_report.is_none_or(|last| now.duration_since(last) >= self.interval)
    }
}

impl ControlSurface for LogSurface {
    fn poll(&mut self) -> Result<Option<Button>> {
        Ok(None)
    }

    fn render(&mut self, status: &SessionStatus) -> Result<()> {
        let now = Instant::now();
        // Always report the tick playback starts
        if !self.due(now) && status.playing == self.last_playing {
            return Ok(());
        }
        self.last_report = Some(now);
        self.last_playing = status.playing;

        info!(
            "📊 adjusted {} ({}ms) | actual {} ({}ms) | recorded {} | played {} | rate {} Hz | effect {}{}",
            status.adjusted_latency,
            status.millis(status.adjusted_latency as i64),
            status.actual_latency,
            status.millis(status.actual_latency),
            status.samples_recorded,
            status.samples_played,
            status.playback_rate,
            status.effect.label(),
            if status.paused { " | paused" } else { "" }
        );
        Ok(())
    }
}
