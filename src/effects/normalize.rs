//! Peak-following gain that lifts quiet input towards full scale.

use super::Effect;

/// Time for the tracked peak to fall to zero, in milliseconds (0 - 20000).
pub const FADE_TIME: usize = 0;
/// Peaks below this level are not amplified further (0 - 1).
pub const THRESHOLD: usize = 1;
/// Maximum amplification (1 - 100000).
pub const MAX_AMP: usize = 2;

pub struct Normalize {
    sample_rate: f32,
    fade_ms: f32,
    threshold: f32,
    max_amp: f32,
    peak: f32,
}

impl Normalize {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate: sample_rate as f32, fade_ms: 5000.0, threshold: 0.1, max_amp: 20.0, peak: 0.0 }
    }

    /// Amount the tracked peak falls per frame.
    fn decay(&self) -> f32 {
        let fade_frames = self.fade_ms / 1000.0 * self.sample_rate;
        if fade_frames <= 0.0 { 1.0 } else { 1.0 / fade_frames }
    }

    fn gain(&self) -> f32 {
        (1.0 / self.peak.max(self.threshold)).min(self.max_amp)
    }
}

impl Effect for Normalize {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let decay = self.decay();
        for frame in buffer.chunks_exact_mut(channels) {
            let frame_peak = frame.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            self.peak = frame_peak.max(self.peak - decay);
            let gain = self.gain();
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            FADE_TIME => self.fade_ms = value.clamp(0.0, 20000.0),
            THRESHOLD => self.threshold = value.clamp(0.0, 1.0),
            MAX_AMP => self.max_amp = value.clamp(1.0, 100000.0),
            _ => {}
        }
    }

    fn param_name(&self, index: usize) -> &str {
        match index {
            FADE_TIME => "fade_time",
            THRESHOLD => "threshold",
            MAX_AMP => "max_amp",
            _ => "",
        }
    }

    fn name(&self) -> &str {
        "normalize"
    }
}
