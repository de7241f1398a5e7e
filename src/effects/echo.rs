//! Feedback echo.

use super::Effect;

/// Delay in milliseconds (10 - 5000).
pub const DELAY: usize = 0;
/// Feedback in percent (0 - 100).
pub const FEEDBACK: usize = 1;

pub struct Echo {
    sample_rate: u32,
    delay_ms: f32,
    feedback: f32,    // 0.0 - 1.0
    buffer: Vec<f32>, // Interleaved delay line
    channels: usize,
    write_pos: usize, // In frames
}

impl Echo {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, delay_ms: 500.0, feedback: 0.5, buffer: Vec::new(), channels: 0, write_pos: 0 }
    }

    fn delay_frames(&self) -> usize {
        ((self.delay_ms / 1000.0) * self.sample_rate as f32).round().max(1.0) as usize
    }

    fn reset(&mut self, channels: usize) {
        self.channels = channels;
        self.buffer = vec![0.0; self.delay_frames() * channels];
        self.write_pos = 0;
    }
}

impl Effect for Echo {
    fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        if self.channels != channels || self.buffer.len() != self.delay_frames() * channels {
            self.reset(channels);
        }

        let frames = self.buffer.len() / channels;
        for frame in buffer.chunks_exact_mut(channels) {
            let base = self.write_pos * channels;
            for (channel, sample) in frame.iter_mut().enumerate() {
                let delayed = self.buffer[base + channel];
                self.buffer[base + channel] = *sample + delayed * self.feedback;
                *sample += delayed;
            }
            self.write_pos = (self.write_pos + 1) % frames;
        }
    }

    fn set_param(&mut self, index: usize, value: f32) {
        match index {
            DELAY => self.delay_ms = value.clamp(10.0, 5000.0),
            FEEDBACK => self.feedback = value.clamp(0.0, 100.0) / 100.0,
            _ => {}
        }
    }

    fn param_name(&self, index: usize) -> &str {
        match index {
            DELAY => "delay",
            FEEDBACK => "feedback",
            _ => "",
        }
    }

    fn name(&self) -> &str {
        "echo"
    }
}
