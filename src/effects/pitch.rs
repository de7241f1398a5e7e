//! Delay-line pitch shifter.
//!
//! Two read taps sweep through a short delay line at `1 - pitch` frames per frame,
//! half a window apart, with triangular crossfades so each tap is silent when it
//! jumps back.

use super::Effect;

/// Pitch ratio (0.5 - 2.0, one octave either way).
pub const PITCH: usize = 0;

/// Window length in frames.
const WINDOW: usize = 1024;

pub struct PitchShift {
    pitch: f32,
    buffer: Vec<f32>, // Interleaved delay line, WINDOW + 2 frames
    channels: usize,
    write_pos: usize,
    phase: f32, // Delay of the first tap in frames, 0..WINDOW
}

impl PitchShift {
    pub fn new(_sample_rate: u32) -> Self {
        Self { pitch: 1.0, buffer: Vec::new(), channels: 0, write_pos: 0, phase: 0.0 }
    }

    fn frames(&self) -> usize {
        WINDOW + 2
    }

    /// Read `delay` frames behind the write cursor with linear interpolation.
    fn tap(&self, channel: usize, delay: f32) -> f32 {
        let frames = self.frames();
        let whole = delay as usize;
        let frac = delay - whole as f32;
        let a = (self.write_pos + frames - whole) % frames;
        let b = (self.write_pos + frames - whole - 1) % frames;
        let near = self.buffer[a * self.channels + channel];
        let far = self.buffer[b * self.channels + channel];
        near + (far - near) * frac
    }
}

/// Triangular crossfade gain: 0 at both window edges, 1 in the middle.
fn window_gain(delay: f32) -> f32 {
    1.0 - (2.0 * delay / WINDOW as f32 - 1.0).abs()
}

impl Effect for PitchShift {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        if self.channels != channels {
            self.channels = channels;
            self.buffer = vec![0.0; self.frames() * channels];
            self.write_pos = 0;
        }

        let window = WINDOW as f32;
        for frame in buffer.chunks_exact_mut(channels) {
            let base = self.write_pos * channels;
            for (channel, sample) in frame.iter().enumerate() {
                self.buffer[base + channel] = *sample;
            }

            let first = self.phase;
            let second = (self.phase + window / 2.0) % window;
            let (g1, g2) = (window_gain(first), window_gain(second));
            for (channel, sample) in frame.iter_mut().enumerate() {
                *sample = self.tap(channel, first) * g1 + self.tap(channel, second) * g2;
            }

            self.phase = (self.phase + 1.0 - self.pitch).rem_euclid(window);
            self.write_pos = (self.write_pos + 1) % self.frames();
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if index == PITCH {
            self.pitch = value.clamp(0.5, 2.0);
        }
    }

    fn param_name(&self, index: usize) -> &str {
        if index == PITCH { "pitch" } else { "" }
    }

    fn name(&self) -> &str {
        "pitch shift"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_is_clamped_to_an_octave() {
        let mut shift = PitchShift::new(48000);
        shift.set_param(PITCH, 8.0);
        assert_eq!(shift.pitch, 2.0);
        shift.set_param(PITCH, 0.1);
        assert_eq!(shift.pitch, 0.5);
    }

    #[test]
    fn test_crossfade_gains_sum_to_one() {
        for delay in [0.0f32, 100.0, 256.0, 511.5, 700.0] {
            let other = (delay + WINDOW as f32 / 2.0) % WINDOW as f32;
            assert!((window_gain(delay) + window_gain(other) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_unity_pitch_passes_constant_signal() {
        let mut shift = PitchShift::new(48000);
        shift.set_param(PITCH, 1.0);
        let mut block = vec![0.5f32; 4 * WINDOW];
        shift.process(&mut block, 1);
        // Once the delay line is full both taps read the same constant
        assert!(block[2 * WINDOW..].iter().all(|s| (s - 0.5).abs() < 1e-5));
    }
}
