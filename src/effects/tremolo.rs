//! Amplitude modulation with a skewable LFO.

use std::f32::consts::TAU;

use super::Effect;

/// LFO frequency in Hz (0.1 - 20).
pub const FREQUENCY: usize = 0;
/// Modulation depth (0 - 1).
pub const DEPTH: usize = 1;
/// Time skew of the LFO peak (-1 - 1).
pub const SKEW: usize = 2;

pub struct Tremolo {
    sample_rate: f32,
    frequency: f32,
    depth: f32,
    skew: f32,
    phase: f32, // 0..1
}

impl Tremolo {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate: sample_rate as f32, frequency: 5.0, depth: 1.0, skew: 0.0, phase: 0.0 }
    }

    /// Gain for the current phase, between `1 - depth` and 1.
    fn gain(&self) -> f32 {
        // Move the peak of the cycle away from the middle by the skew
        let peak = (0.5 + self.skew * 0.5).clamp(0.01, 0.99);
        let warped = if self.phase < peak { self.phase / peak * 0.5 } else { 0.5 + (self.phase - peak) / (1.0 - peak) * 0.5 };
        let lfo = 0.5 - 0.5 * (warped * TAU).cos();
        1.0 - self.depth * (1.0 - lfo)
    }
}

impl Effect for Tremolo {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let increment = self.frequency / self.sample_rate;
        for frame in buffer.chunks_exact_mut(channels) {
            let gain = self.gain();
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
            self.phase = (self.phase + increment).fract();
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            FREQUENCY => self.frequency = value.clamp(0.1, 20.0),
            DEPTH => self.depth = value.clamp(0.0, 1.0),
            SKEW => self.skew = value.clamp(-1.0, 1.0),
            _ => {}
        }
    }

    fn param_name(&self, index: usize) -> &str {
        match index {
            FREQUENCY => "frequency",
            DEPTH => "depth",
            SKEW => "skew",
            _ => "",
        }
    }

    fn name(&self) -> &str {
        "tremolo"
    }
}
