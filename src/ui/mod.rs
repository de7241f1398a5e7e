//! Control surfaces: where button presses come from and status goes to.

mod headless;
mod terminal;

pub use headless::LogSurface;
pub use terminal::TerminalSurface;

use anyhow::Result;

use crate::effects::EffectKind;
use crate::session::{RateCorrection, SessionStatus};

/// A discrete button press, polled once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Action buttons 1-8 select an effect preset
    Action(u8),
    Quit,
}

impl Button {
    /// Effect preset selected by this press, if any.
    pub fn effect(self) -> Option<EffectKind> {
        match self {
            Button::Action(n) => EffectKind::from_button(n),
            Button::Quit => None,
        }
    }
}

/// Input/UI collaborator of the session loop.
pub trait ControlSurface {
    /// Next pending button press, without blocking.
    fn poll(&mut self) -> Result<Option<Button>>;

    /// Redraw the full status.
    fn render(&mut self, status: &SessionStatus) -> Result<()>;
}

/// Full status screen, one line per entry.
pub fn status_lines(status: &SessionStatus) -> Vec<String> {
    let mut lines = vec![
        "==================================================".to_string(),
        "Record loopback".to_string(),
        "==================================================".to_string(),
        String::new(),
        format!("Input: {} ({} Hz, {} ch)", status.device.name, status.device.native_rate, status.device.channels),
        format!("Target latency is {}ms (--latency-ms), raise it if playback stutters", status.latency_ms),
        String::new(),
    ];

    for button in 1..=8u8 {
        if let Some(kind) = EffectKind::from_button(button) {
            let marker = if kind == status.effect { '*' } else { ' ' };
            lines.push(format!("{}{} {:-<22} {}", marker, button, "", kind.label()));
        }
    }

    lines.push("Press q or Esc to quit".to_string());
    lines.push(String::new());
    lines.push(format!("Desired latency:  {:5} ({}ms)", status.desired_latency, status.millis(status.desired_latency as i64)));
    lines.push(format!("Adjusted latency: {:5} ({}ms)", status.adjusted_latency, status.millis(status.adjusted_latency as i64)));
    lines.push(format!("Actual latency:   {:5} ({}ms)", status.actual_latency, status.millis(status.actual_latency)));
    lines.push(String::new());
    lines.push(format!("Recorded: {:7} ({}s)", status.samples_recorded, status.millis(status.samples_recorded as i64) / 1000));
    lines.push(format!("Played:   {:7} ({}s)", status.samples_played, status.millis(status.samples_played as i64) / 1000));
    lines.push(format!("Rate:     {:7} Hz {}", status.playback_rate, correction_label(status.correction)));
    lines.push(format!("State:    {}", state_label(status)));
    lines.push(format!("Effect:   {}", status.effect.label()));
    if let Some(granularity) = status.record_granularity {
        lines.push(format!("Record granularity: {} samples", granularity));
    }
    lines
}

fn correction_label(correction: RateCorrection) -> &'static str {
    match correction {
        RateCorrection::SlowDown => "(slowing down)",
        RateCorrection::Hold => "",
        RateCorrection::SpeedUp => "(speeding up)",
    }
}

fn state_label(status: &SessionStatus) -> &'static str {
    if status.disconnected {
        "recording device disconnected"
    } else if status.paused {
        "paused (recording stopped)"
    } else if status.playing {
        "playing"
    } else {
        "buffering"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DeviceClockInfo;

    fn status() -> SessionStatus {
        SessionStatus {
            device: DeviceClockInfo { name: "mic".into(), native_rate: 48000, channels: 1 },
            latency_ms: 50,
            desired_latency: 2400,
            adjusted_latency: 2400,
            actual_latency: 2410,
            samples_recorded: 96000,
            samples_played: 93600,
            playing: true,
            paused: false,
            disconnected: false,
            playback_rate: 48000,
            correction: RateCorrection::Hold,
            effect: EffectKind::Flange,
            record_granularity: Some(480),
        }
    }

    #[test]
    fn test_buttons_map_to_effects() {
        assert_eq!(Button::Action(4).effect(), Some(EffectKind::Flange));
        assert_eq!(Button::Action(9).effect(), None);
        assert_eq!(Button::Quit.effect(), None);
    }

    #[test]
    fn test_status_lines_show_latency_and_selection() {
        let lines = status_lines(&status());
        assert!(lines.iter().any(|l| l == "Adjusted latency:  2400 (50ms)"));
        assert!(lines.iter().any(|l| l.starts_with("Recorded:") && l.ends_with("(2s)")));
        assert!(lines.iter().any(|l| l.starts_with("*4") && l.ends_with("thriller")));
        assert!(lines.iter().any(|l| l == "State:    playing"));
        assert!(lines.iter().any(|l| l == "Record granularity: 480 samples"));
    }
}
