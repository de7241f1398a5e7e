//! Audio playback module using cpal.
//!
//! Plays a [`RingBufferSound`] in a loop through the default output device.
//! The read cursor advances by `frequency / device_rate` frames per output frame
//! with linear interpolation, which is how the session nudges the playback rate
//! to follow the recorder's clock. Frequency and pause state cross to the audio
//! callback through atomics; effects cross through lock-free ring buffers so the
//! callback never waits on the session thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Host, Stream, StreamConfig, StreamError};
use parking_lot::Mutex;
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Producer, Split};
use tracing::{debug, error, info, warn};

use crate::effects::Effect;
use crate::error::DeviceError;

use super::util::{find_best_config, get_device_name, spread_frame};
use super::{EffectHandle, PlaybackChannel, RingBufferSound};

/// Capacity of the session -> callback command queue.
const COMMAND_QUEUE_SIZE: usize = 16;

/// Changes to the effect chain, applied by the callback at the start of a block.
enum ChannelCommand {
    Attach(EffectHandle, Box<dyn Effect>),
    Detach(EffectHandle),
}

/// State shared between the output callback and the channel handle.
struct ChannelShared {
    frequency: AtomicU32,          // f32 bits, frames of the sound per second
    paused: AtomicBool,
    position: AtomicUsize,         // Read cursor in frames
    retired_overflow: AtomicUsize, // Detached effects dropped on the audio thread
    failure: Mutex<Option<String>>,
}

impl ChannelShared {
    fn new(frequency: f32, paused: bool) -> Self {
        Self {
            frequency: AtomicU32::new(frequency.to_bits()),
            paused: AtomicBool::new(paused),
            position: AtomicUsize::new(0),
            retired_overflow: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }
}

/// Everything the output callback owns.
struct Renderer {
    sound: RingBufferSound,
    shared: Arc<ChannelShared>,
    cursor: f64,                                   // Fractional read cursor
    device_rate: f64,                              // Output device sample rate
    out_channels: usize,                           // Output device channel count
    scratch: Vec<f32>,                             // Interleaved block at the sound's channel count
    effects: Vec<(EffectHandle, Box<dyn Effect>)>, // Head of the chain first
    commands: ringbuf::HeapCons<ChannelCommand>,
    retired: ringbuf::HeapProd<Box<dyn Effect>>,
}

impl Renderer {
    fn new(
        sound: RingBufferSound,
        shared: Arc<ChannelShared>,
        device_rate: u32,
        out_channels: usize,
        commands: ringbuf::HeapCons<ChannelCommand>,
        retired: ringbuf::HeapProd<Box<dyn Effect>>,
    ) -> Self {
        Self {
            sound,
            shared,
            cursor: 0.0,
            device_rate: device_rate as f64,
            out_channels,
            scratch: Vec::new(),
            effects: Vec::new(),
            commands,
            retired,
        }
    }

    fn apply_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                ChannelCommand::Attach(handle, effect) => self.effects.insert(0, (handle, effect)),
                ChannelCommand::Detach(handle) => {
                    if let Some(index) = self.effects.iter().position(|(h, _)| *h == handle) {
                        let (_, effect) = self.effects.remove(index);
                        // Hand the effect back so it is dropped off the audio thread
                        if self.retired.try_push(effect).is_err() {
                            self.shared.retired_overflow.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
        }
    }

    fn render(&mut self, data: &mut [f32]) {
        self.apply_commands();

        if self.shared.paused.load(Ordering::Relaxed) {
            data.fill(0.0);
            return;
        }

        let channels = self.sound.channels();
        let length = self.sound.length();
        let frames = data.len() / self.out_channels;
        let step = f32::from_bits(self.shared.frequency.load(Ordering::Relaxed)).max(0.0) as f64 / self.device_rate;

        self.scratch.clear();
        self.scratch.resize(frames * channels, 0.0);

        for frame in self.scratch.chunks_exact_mut(channels) {
            let index = self.cursor as usize;
            let frac = (self.cursor - index as f64) as f32;
            for (channel, sample) in frame.iter_mut().enumerate() {
                let a = self.sound.load(index, channel);
                let b = self.sound.load(index + 1, channel);
                *sample = a + (b - a) * frac;
            }
            self.cursor = (self.cursor + step) % length as f64;
        }

        self.shared.position.store(self.cursor as usize % length, Ordering::Release);

        for (_, effect) in self.effects.iter_mut() {
            effect.process(&mut self.scratch, channels);
        }

        for (out, frame) in data.chunks_exact_mut(self.out_channels).zip(self.scratch.chunks_exact(channels)) {
            spread_frame(frame, out);
        }
    }
}

/// A looping output stream over a ring buffer sound.
pub struct Channel {
    _stream: Stream, // Kept alive to maintain the audio stream
    shared: Arc<ChannelShared>,
    commands: ringbuf::HeapProd<ChannelCommand>,
    retired: ringbuf::HeapCons<Box<dyn Effect>>,
    device_rate: u32,
    next_handle: u64,
}

impl Channel {
    /// Open the default output device and start playing `sound` from frame 0.
    ///
    /// # Arguments
    /// * `host` - cpal host to open the output device on
    /// * `sound` - Ring buffer to play
    /// * `paused` - Start silent until `set_paused(false)`
    ///
    /// # Errors
    /// Returns an error if no output device is available or the stream cannot
    /// be built or started.
    pub fn start(host: &Host, sound: RingBufferSound, paused: bool) -> Result<Self, DeviceError> {
        let device = host.default_output_device().ok_or(DeviceError::NoOutputDevice)?;

        info!("Using output device: {}", get_device_name(&device));

        // Prefer the sound's own rate so the step is 1.0 at native frequency
        let config = find_best_config(device.supported_output_configs()?, sound.sample_rate())?;
        let device_rate = config.sample_rate();
        let out_channels = config.channels() as usize;

        if device_rate != sound.sample_rate() {
            info!("Output device runs at {} Hz, recording at {} Hz - playback step absorbs the difference", device_rate, sound.sample_rate());
        }

        debug!("Audio playback config: {} Hz, {} channels, {:?}", device_rate, out_channels, config.sample_format());

        let shared = Arc::new(ChannelShared::new(sound.sample_rate() as f32, paused));

        let (commands, command_rx) = HeapRb::<ChannelCommand>::new(COMMAND_QUEUE_SIZE).split();
        let (retired_tx, retired) = HeapRb::<Box<dyn Effect>>::new(COMMAND_QUEUE_SIZE).split();

        let mut renderer = Renderer::new(sound, shared.clone(), device_rate, out_channels, command_rx, retired_tx);

        let err_shared = shared.clone();
        let err_fn = move |err: StreamError| {
            error!("Audio playback error: {}", err);
            err_shared.failure.lock().get_or_insert_with(|| err.to_string());
        };

        let stream_config: StreamConfig = config.config();
        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| renderer.render(data),
            err_fn,
            None,
        )?;

        stream.play()?;

        info!("🔊 Playback started ({} Hz device, paused: {})", device_rate, paused);

        Ok(Self { _stream: stream, shared, commands, retired, device_rate, next_handle: 0 })
    }

    fn check(&self) -> Result<(), DeviceError> {
        match self.shared.failure.lock().clone() {
            Some(message) => Err(DeviceError::Stream(message)),
            None => Ok(()),
        }
    }

    /// Drop effects the callback has handed back.
    fn collect_retired(&mut self) {
        while let Some(effect) = self.retired.try_pop() {
            debug!("Released effect {}", effect.name());
        }
        let overflow = self.shared.retired_overflow.swap(0, Ordering::Relaxed);
        if overflow > 0 {
            warn!("{} detached effect(s) were released on the audio thread", overflow);
        }
    }
}

impl PlaybackChannel for Channel {
    fn position(&self) -> Result<usize, DeviceError> {
        self.check()?;
        Ok(self.shared.position.load(Ordering::Acquire))
    }

    fn frequency(&self) -> Result<f32, DeviceError> {
        Ok(f32::from_bits(self.shared.frequency.load(Ordering::Relaxed)))
    }

    fn set_frequency(&mut self, hz: f32) -> Result<(), DeviceError> {
        self.check()?;
        self.collect_retired();
        self.shared.frequency.store(hz.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), DeviceError> {
        self.check()?;
        self.shared.paused.store(paused, Ordering::SeqCst);
        Ok(())
    }

    fn output_rate(&self) -> u32 {
        self.device_rate
    }

    fn add_effect(&mut self, effect: Box<dyn Effect>) -> Result<EffectHandle, DeviceError> {
        let handle = EffectHandle(self.next_handle);
        self.commands.try_push(ChannelCommand::Attach(handle, effect)).map_err(|_| DeviceError::QueueFull)?;
        self.next_handle += 1;
        Ok(handle)
    }

    fn remove_effect(&mut self, handle: EffectHandle) -> Result<(), DeviceError> {
        self.collect_retired();
        self.commands.try_push(ChannelCommand::Detach(handle)).map_err(|_| DeviceError::QueueFull)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DeviceClockInfo;
    use crate::effects::EffectKind;

    struct Harness {
        renderer: Renderer,
        shared: Arc<ChannelShared>,
        commands: ringbuf::HeapProd<ChannelCommand>,
        retired: ringbuf::HeapCons<Box<dyn Effect>>,
    }

    /// Mono 1000 frame ramp played on a 1000 Hz mono device.
    fn harness(frequency: f32, paused: bool, retired_capacity: usize) -> Harness {
        let sound = RingBufferSound::new(&DeviceClockInfo { name: "test".into(), native_rate: 1000, channels: 1 }).unwrap();
        for frame in 0..sound.length() {
            sound.store(frame, 0, frame as f32 / 1000.0);
        }
        let shared = Arc::new(ChannelShared::new(frequency, paused));
        let (commands, command_rx) = HeapRb::<ChannelCommand>::new(COMMAND_QUEUE_SIZE).split();
        let (retired_tx, retired) = HeapRb::<Box<dyn Effect>>::new(retired_capacity).split();
        let renderer = Renderer::new(sound, shared.clone(), 1000, 1, command_rx, retired_tx);
        Harness { renderer, shared, commands, retired }
    }

    fn tremolo() -> Box<dyn Effect> {
        EffectKind::Tremolo.build(1000).unwrap()
    }

    #[test]
    fn test_cursor_advances_at_frequency_over_device_rate() {
        let mut h = harness(1250.0, false, COMMAND_QUEUE_SIZE);
        let mut data = vec![0.0f32; 100];
        h.renderer.render(&mut data);

        assert_eq!(h.shared.position.load(Ordering::Acquire), 125);
        // Frame 1 sits a quarter of the way between samples 1 and 2
        assert!((data[1] - 0.00125).abs() < 1e-6);
    }

    #[test]
    fn test_cursor_wraps_at_sound_length() {
        let mut h = harness(1250.0, false, COMMAND_QUEUE_SIZE);
        let mut data = vec![0.0f32; 900];
        h.renderer.render(&mut data);
        assert_eq!(h.shared.position.load(Ordering::Acquire), 125);
    }

    #[test]
    fn test_commands_apply_in_order_and_retire_detached_effects() {
        let mut h = harness(1000.0, false, COMMAND_QUEUE_SIZE);
        assert!(h.commands.try_push(ChannelCommand::Attach(EffectHandle(0), tremolo())).is_ok());
        assert!(h.commands.try_push(ChannelCommand::Detach(EffectHandle(0))).is_ok());
        assert!(h.commands.try_push(ChannelCommand::Attach(EffectHandle(1), tremolo())).is_ok());

        let mut data = vec![0.0f32; 16];
        h.renderer.render(&mut data);

        assert_eq!(h.renderer.effects.len(), 1);
        assert_eq!(h.renderer.effects[0].0, EffectHandle(1));
        assert!(h.retired.try_pop().is_some());
        assert!(h.retired.try_pop().is_none());
    }

    #[test]
    fn test_detach_unknown_handle_is_ignored() {
        let mut h = harness(1000.0, false, COMMAND_QUEUE_SIZE);
        assert!(h.commands.try_push(ChannelCommand::Detach(EffectHandle(7))).is_ok());
        h.renderer.render(&mut [0.0f32; 4]);
        assert!(h.renderer.effects.is_empty());
        assert!(h.retired.try_pop().is_none());
    }

    #[test]
    fn test_full_retired_queue_is_counted() {
        let mut h = harness(1000.0, false, 1);
        for id in 0..2 {
            assert!(h.commands.try_push(ChannelCommand::Attach(EffectHandle(id), tremolo())).is_ok());
            assert!(h.commands.try_push(ChannelCommand::Detach(EffectHandle(id))).is_ok());
        }
        h.renderer.render(&mut [0.0f32; 4]);

        assert!(h.renderer.effects.is_empty());
        assert_eq!(h.shared.retired_overflow.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_paused_render_is_silent_and_holds_cursor() {
        let mut h = harness(1000.0, false, COMMAND_QUEUE_SIZE);
        h.renderer.render(&mut [0.0f32; 10]);
        assert_eq!(h.shared.position.load(Ordering::Acquire), 10);

        h.shared.paused.store(true, Ordering::SeqCst);
        let mut data = vec![1.0f32; 50];
        h.renderer.render(&mut data);

        assert!(data.iter().all(|s| *s == 0.0));
        assert_eq!(h.shared.position.load(Ordering::Acquire), 10);
        assert_eq!(h.renderer.cursor, 10.0);
    }
}
