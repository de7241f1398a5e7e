//! Keeps at most one effect attached to the output channel.

use tracing::{debug, info};

use crate::audio::{EffectHandle, PlaybackChannel};
use crate::effects::EffectKind;
use crate::error::DeviceError;

/// Tracks the selected effect preset and the handle of the attached effect.
#[derive(Debug, Default)]
pub struct EffectChainManager {
    selected: EffectKind,
    attached: Option<EffectHandle>,
}

impl EffectChainManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> EffectKind {
        self.selected
    }

    /// Handle an effect-selection event.
    ///
    /// Without a channel the selection is only recorded; [`apply`](Self::apply)
    /// attaches it once playback starts.
    pub fn select<C: PlaybackChannel>(&mut self, kind: EffectKind, channel: Option<&mut C>) -> Result<(), DeviceError> {
        self.selected = kind;
        match channel {
            Some(channel) => self.apply(channel),
            None => {
                debug!("Effect {} selected before playback, attaching later", kind.label());
                Ok(())
            }
        }
    }

    /// Replace whatever is attached with the selected preset.
    pub fn apply<C: PlaybackChannel>(&mut self, channel: &mut C) -> Result<(), DeviceError> {
        self.detach(channel)?;

        if let Some(effect) = self.selected.build(channel.output_rate()) {
            let name = effect.name().to_string();
            self.attached = Some(channel.add_effect(effect)?);
            info!("🎛️  Effect '{}' ({}) attached", self.selected.label(), name);
        } else {
            info!("🎛️  Effects cleared");
        }
        Ok(())
    }

    /// Detach the attached effect, if any.
    pub fn detach<C: PlaybackChannel>(&mut self, channel: &mut C) -> Result<(), DeviceError> {
        if let Some(handle) = self.attached.take() {
            channel.remove_effect(handle)?;
        }
        Ok(())
    }
}
