//! LFO-swept short delay mixed with the dry signal.

use std::f64::consts::TAU;

use super::Effect;

/// Sweep rate in Hz (0 - 20).
pub const RATE: usize = 0;
/// Wet mix in percent (0 - 100).
pub const MIX: usize = 1;
/// Sweep depth as a fraction of the maximum delay (0.01 - 1.0).
pub const DEPTH: usize = 2;

/// Longest delay the sweep reaches at full depth.
const MAX_DELAY_MS: f64 = 10.0;

pub struct Flange {
    sample_rate: f64,
    rate: f32,
    mix: f32, // 0.0 - 1.0
    depth: f32,
    buffer: Vec<f32>,
    channels: usize,
    write_pos: usize,
    lfo_phase: f64,
}

impl Flange {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate: sample_rate as f64, rate: 0.1, mix: 0.5, depth: 1.0, buffer: Vec::new(), channels: 0, write_pos: 0, lfo_phase: 0.0 }
    }

    fn line_frames(&self) -> usize {
        (self.sample_rate * MAX_DELAY_MS / 1000.0) as usize + 2
    }
}

impl Effect for Flange {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        if self.channels != channels {
            self.channels = channels;
            self.buffer = vec![0.0; self.line_frames() * channels];
            self.write_pos = 0;
        }

        let frames = self.buffer.len() / channels;
        let max_delay = self.sample_rate * MAX_DELAY_MS / 1000.0;

        for frame in buffer.chunks_exact_mut(channels) {
            let base = self.write_pos * channels;
            for (channel, sample) in frame.iter().enumerate() {
                self.buffer[base + channel] = *sample;
            }

            // LFO modulates delay time
            let lfo = (self.lfo_phase * TAU).sin();
            let delay = (max_delay * self.depth as f64 * (1.0 + lfo) * 0.5).max(1.0);
            let whole = delay as usize;
            let frac = (delay - whole as f64) as f32;
            let a = (self.write_pos + frames - whole) % frames;
            let b = (self.write_pos + frames - whole - 1) % frames;

            for (channel, sample) in frame.iter_mut().enumerate() {
                let near = self.buffer[a * channels + channel];
                let far = self.buffer[b * channels + channel];
                let wet = near + (far - near) * frac;
                *sample = *sample * (1.0 - self.mix) + wet * self.mix;
            }

            self.write_pos = (self.write_pos + 1) % frames;
            self.lfo_phase += self.rate as f64 / self.sample_rate;
            if self.lfo_phase >= 1.0 {
                self.lfo_phase -= 1.0;
            }
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            RATE => self.rate = value.clamp(0.0, 20.0),
            MIX => self.mix = value.clamp(0.0, 100.0) / 100.0,
            DEPTH => self.depth = value.clamp(0.01, 1.0),
            _ => {}
        }
    }

    fn param_name(&self, index: usize) -> &str {
        match index {
            RATE => "rate",
            MIX => "mix",
            DEPTH => "depth",
            _ => "",
        }
    }

    fn name(&self) -> &str {
        "flange"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_when_mix_is_zero() {
        let mut flange = Flange::new(48000);
        flange.set_param(MIX, 0.0);
        let mut block: Vec<f32> = (0..256).map(|i| (i as f32 * 0.1).sin()).collect();
        let expected = block.clone();
        flange.process(&mut block, 1);
        assert_eq!(block, expected);
    }

    #[test]
    fn test_output_stays_bounded() {
        let mut flange = Flange::new(48000);
        flange.set_param(RATE, 10.0);
        flange.set_param(MIX, 70.0);
        flange.set_param(DEPTH, 0.4);
        let mut block = vec![1.0f32; 4096];
        flange.process(&mut block, 2);
        assert!(block.iter().all(|s| s.abs() <= 1.0 + f32::EPSILON));
    }
}
