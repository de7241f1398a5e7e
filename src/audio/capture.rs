//! Audio capture module using cpal.
//!
//! Records from an input device straight into a looping [`RingBufferSound`].
//! The callback publishes its write cursor through an atomic, so the session
//! can poll the position without ever blocking the audio thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig, StreamError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::DeviceError;

use super::RingBufferSound;
use super::util::{get_device_name, native_input_config};

/// State shared between the input callback, the error callback and the session.
struct RecordShared {
    position: AtomicUsize,          // Write cursor in frames
    recording: AtomicBool,          // Cleared on disconnect or when a one-shot pass ends
    disconnected: AtomicBool,       // Set by the error callback
    failure: Mutex<Option<String>>, // First non-disconnect stream error
}

impl RecordShared {
    fn new() -> Self {
        Self { position: AtomicUsize::new(0), recording: AtomicBool::new(true), disconnected: AtomicBool::new(false), failure: Mutex::new(None) }
    }
}

/// Write one interleaved input block at the record cursor.
///
/// The cursor wraps at the end of the buffer. Without `looped`, recording
/// stops there and the rest of the block is discarded.
fn write_block(sound: &RingBufferSound, shared: &RecordShared, data: &[f32], channels: usize, looped: bool) {
    if channels == 0 || !shared.recording.load(Ordering::Relaxed) {
        return;
    }

    let length = sound.length();
    let mut position = shared.position.load(Ordering::Relaxed);
    for frame in data.chunks_exact(channels) {
        for (channel, sample) in frame.iter().enumerate() {
            sound.store(position, channel, *sample);
        }
        position += 1;
        if position == length {
            position = 0;
            if !looped {
                shared.recording.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
    shared.position.store(position, Ordering::Release);
}

/// An input stream recording into a shared ring buffer.
pub struct Recorder {
    stream: Stream, // cpal audio stream (kept alive)
    shared: Arc<RecordShared>,
}

impl Recorder {
    /// Open the device at its native configuration and start recording.
    ///
    /// # Arguments
    /// * `device` - Input device to record from
    /// * `sound` - Ring buffer to record into
    /// * `looped` - Keep wrapping around the buffer instead of stopping at its end
    ///
    /// # Errors
    /// Returns an error if the native configuration does not match the buffer
    /// layout or the stream cannot be built or started.
    pub fn start(device: &Device, sound: RingBufferSound, looped: bool) -> Result<Self, DeviceError> {
        let config = native_input_config(device)?;
        let channels = config.channels() as usize;

        if channels != sound.channels() || config.sample_rate() != sound.sample_rate() {
            return Err(DeviceError::UnsupportedConfig(format!(
                "device records {} Hz x {} but the buffer is {} Hz x {}",
                config.sample_rate(),
                channels,
                sound.sample_rate(),
                sound.channels()
            )));
        }

        debug!("Audio capture config: {} Hz, {} channels, {:?}", config.sample_rate(), channels, config.sample_format());

        let shared = Arc::new(RecordShared::new());

        let stream_config: StreamConfig = config.config();
        let data_shared = shared.clone();
        let err_shared = shared.clone();

        let err_fn = move |err: StreamError| match err {
            StreamError::DeviceNotAvailable => {
                warn!("🔌 Recording device disconnected");
                err_shared.disconnected.store(true, Ordering::SeqCst);
                err_shared.recording.store(false, Ordering::SeqCst);
            }
            other => {
                error!("Audio capture error: {}", other);
                err_shared.failure.lock().get_or_insert_with(|| other.to_string());
            }
        };

        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| write_block(&sound, &data_shared, data, channels, looped),
            err_fn,
            None,
        )?;

        stream.play()?;

        info!("🎙️  Recording from {} ({} Hz, {} channels, looped: {})", get_device_name(device), config.sample_rate(), channels, looped);

        Ok(Self { stream, shared })
    }

    /// Surface a disconnect or a stored stream failure.
    fn check(&self) -> Result<(), DeviceError> {
        if self.shared.disconnected.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected);
        }
        if let Some(message) = self.shared.failure.lock().clone() {
            return Err(DeviceError::Stream(message));
        }
        Ok(())
    }

    /// Current write cursor in frames.
    pub fn position(&self) -> Result<usize, DeviceError> {
        self.check()?;
        Ok(self.shared.position.load(Ordering::Acquire))
    }

    pub fn is_recording(&self) -> Result<bool, DeviceError> {
        self.check()?;
        Ok(self.shared.recording.load(Ordering::SeqCst))
    }

    /// Stop the input stream.
    pub fn stop(&self) -> Result<(), DeviceError> {
        self.shared.recording.store(false, Ordering::SeqCst);
        self.stream.pause()?;
        debug!("Audio capture stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DeviceClockInfo;

    fn sound(frames: u32, channels: u16) -> RingBufferSound {
        RingBufferSound::new(&DeviceClockInfo { name: "test".into(), native_rate: frames, channels }).unwrap()
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    #[test]
    fn test_looped_recording_wraps_around() {
        let sound = sound(100, 1);
        let shared = RecordShared::new();
        write_block(&sound, &shared, &ramp(150), 1, true);

        assert_eq!(shared.position.load(Ordering::Acquire), 50);
        assert!(shared.recording.load(Ordering::SeqCst));
        // Frames 0..50 were overwritten on the second pass
        assert_eq!(sound.load(10, 0), 110.0);
        assert_eq!(sound.load(60, 0), 60.0);
    }

    #[test]
    fn test_one_shot_recording_stops_at_length() {
        let sound = sound(100, 1);
        let shared = RecordShared::new();
        write_block(&sound, &shared, &ramp(150), 1, false);

        assert_eq!(shared.position.load(Ordering::Acquire), 0);
        assert!(!shared.recording.load(Ordering::SeqCst));
        assert_eq!(sound.load(10, 0), 10.0);

        // Later blocks are ignored
        write_block(&sound, &shared, &[-1.0; 20], 1, false);
        assert_eq!(sound.load(10, 0), 10.0);
        assert_eq!(shared.position.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_stereo_blocks_advance_by_frame() {
        let sound = sound(100, 2);
        let shared = RecordShared::new();
        write_block(&sound, &shared, &[0.1, 0.2, 0.3, 0.4], 2, true);

        assert_eq!(shared.position.load(Ordering::Acquire), 2);
        assert_eq!(sound.load(1, 0), 0.3);
        assert_eq!(sound.load(1, 1), 0.4);
    }
}
