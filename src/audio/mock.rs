//! Scripted audio system for tests.
//!
//! Tests move the record and play cursors by hand through the shared
//! [`MockState`] and inspect what the session did to the channel.

use std::cell::RefCell;
use std::rc::Rc;

use crate::effects::Effect;
use crate::error::DeviceError;

use super::{AudioSystem, DeviceClockInfo, EffectHandle, PlaybackChannel, RingBufferSound};

#[derive(Debug)]
pub struct MockState {
    pub info: DeviceClockInfo,
    pub driver_count: usize,
    pub record_pos: usize,
    pub recording: bool,
    pub disconnected: bool,                    // Record position / is_recording report Disconnected
    pub record_failure: Option<String>,        // Record position reports a fatal stream error
    pub record_started: bool,
    pub record_stopped: bool,
    pub channels_started: usize,
    pub play_pos: usize,
    pub frequency: f32,
    pub frequencies: Vec<f32>,                 // Every set_frequency call, in order
    pub paused: bool,
    pub pause_calls: usize,
    pub attached: Vec<(EffectHandle, String)>, // Head of the chain first
    pub attach_calls: usize,
    next_handle: u64,
}

pub struct MockSystem {
    state: Rc<RefCell<MockState>>,
}

pub struct MockChannel {
    state: Rc<RefCell<MockState>>,
}

impl MockSystem {
    pub fn new(native_rate: u32, channels: u16) -> (Self, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(MockState {
            info: DeviceClockInfo { name: "mock input".into(), native_rate, channels },
            driver_count: 1,
            record_pos: 0,
            recording: false,
            disconnected: false,
            record_failure: None,
            record_started: false,
            record_stopped: false,
            channels_started: 0,
            play_pos: 0,
            frequency: 0.0,
            frequencies: Vec::new(),
            paused: false,
            pause_calls: 0,
            attached: Vec::new(),
            attach_calls: 0,
            next_handle: 0,
        }));
        (Self { state: state.clone() }, state)
    }

    /// A detached channel over the same state, for driving components directly.
    pub fn channel(state: &Rc<RefCell<MockState>>) -> MockChannel {
        MockChannel { state: state.clone() }
    }
}

impl AudioSystem for MockSystem {
    type Channel = MockChannel;

    fn record_driver_count(&self) -> Result<usize, DeviceError> {
        Ok(self.state.borrow().driver_count)
    }

    fn record_driver_info(&self, index: usize) -> Result<DeviceClockInfo, DeviceError> {
        let state = self.state.borrow();
        if index >= state.driver_count {
            return Err(DeviceError::NotFound { index, count: state.driver_count });
        }
        Ok(state.info.clone())
    }

    fn record_start(&mut self, _index: usize, _sound: &RingBufferSound, _looped: bool) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        state.record_started = true;
        state.recording = true;
        Ok(())
    }

    fn record_position(&self, _index: usize) -> Result<usize, DeviceError> {
        let state = self.state.borrow();
        if state.disconnected {
            return Err(DeviceError::Disconnected);
        }
        if let Some(message) = &state.record_failure {
            return Err(DeviceError::Stream(message.clone()));
        }
        Ok(state.record_pos)
    }

    fn is_recording(&self, _index: usize) -> Result<bool, DeviceError> {
        let state = self.state.borrow();
        if state.disconnected {
            return Err(DeviceError::Disconnected);
        }
        Ok(state.recording)
    }

    fn record_stop(&mut self, _index: usize) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        state.record_stopped = true;
        state.recording = false;
        Ok(())
    }

    fn play_sound(&mut self, sound: &RingBufferSound, paused: bool) -> Result<MockChannel, DeviceError> {
        let mut state = self.state.borrow_mut();
        state.channels_started += 1;
        state.play_pos = 0;
        state.paused = paused;
        state.frequency = sound.sample_rate() as f32;
        Ok(MockChannel { state: self.state.clone() })
    }
}

impl PlaybackChannel for MockChannel {
    fn position(&self) -> Result<usize, DeviceError> {
        Ok(self.state.borrow().play_pos)
    }

    fn frequency(&self) -> Result<f32, DeviceError> {
        Ok(self.state.borrow().frequency)
    }

    fn set_frequency(&mut self, hz: f32) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        state.frequency = hz;
        state.frequencies.push(hz);
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        state.paused = paused;
        state.pause_calls += 1;
        Ok(())
    }

    fn output_rate(&self) -> u32 {
        self.state.borrow().info.native_rate
    }

    fn add_effect(&mut self, effect: Box<dyn Effect>) -> Result<EffectHandle, DeviceError> {
        let mut state = self.state.borrow_mut();
        let handle = EffectHandle(state.next_handle);
        state.next_handle += 1;
        state.attach_calls += 1;
        state.attached.insert(0, (handle, effect.name().to_string()));
        Ok(handle)
    }

    fn remove_effect(&mut self, handle: EffectHandle) -> Result<(), DeviceError> {
        self.state.borrow_mut().attached.retain(|(h, _)| *h != handle);
        Ok(())
    }
}
