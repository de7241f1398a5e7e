//! Channel effects and the fixed preset table behind the eight effect buttons.

mod echo;
mod flange;
mod normalize;
mod pitch;
mod tremolo;

pub use echo::Echo;
pub use flange::Flange;
pub use normalize::Normalize;
pub use pitch::PitchShift;
pub use tremolo::Tremolo;

/// An effect processing interleaved blocks on the output channel.
pub trait Effect: Send {
    /// Process one interleaved block in place.
    fn process(&mut self, buffer: &mut [f32], channels: usize);
    fn set_param(&mut self, index: usize, value: f32);
    fn param_name(&self, index: usize) -> &str;
    fn name(&self) -> &str;
}

/// Which preset is selected on the output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectKind {
    /// Nothing selected yet
    #[default]
    None,
    Normal,
    PitchUp,
    PitchDown,
    Flange,
    /// Normalize, and play at twice the base rate
    NormalizeDouble,
    EchoLong,
    EchoShort,
    Tremolo,
}

/// Static description of one effect button.
#[derive(Debug, Clone, Copy)]
pub struct EffectPreset {
    pub button: u8,
    pub kind: EffectKind,
    pub label: &'static str,
    pub params: &'static [(usize, f32)], // (parameter index, value)
}

/// One preset per action button, in button order.
const PRESETS: &[EffectPreset] = &[
    EffectPreset { button: 1, kind: EffectKind::Normal, label: "normal", params: &[] },
    EffectPreset { button: 2, kind: EffectKind::PitchUp, label: "lolita", params: &[(pitch::PITCH, 8.0)] },
    EffectPreset { button: 3, kind: EffectKind::PitchDown, label: "uncle", params: &[(pitch::PITCH, 0.8)] },
    EffectPreset {
        button: 4,
        kind: EffectKind::Flange,
        label: "thriller",
        params: &[(flange::RATE, 10.0), (flange::MIX, 70.0), (flange::DEPTH, 0.4)],
    },
    EffectPreset { button: 5, kind: EffectKind::NormalizeDouble, label: "funny", params: &[] },
    EffectPreset { button: 6, kind: EffectKind::EchoLong, label: "ethereal", params: &[(echo::DELAY, 300.0), (echo::FEEDBACK, 20.0)] },
    EffectPreset { button: 7, kind: EffectKind::EchoShort, label: "chorus", params: &[(echo::DELAY, 100.0), (echo::FEEDBACK, 50.0)] },
    EffectPreset { button: 8, kind: EffectKind::Tremolo, label: "tremolo", params: &[(tremolo::SKEW, 0.8)] },
];

impl EffectKind {
    /// Map an action button (1-8) to its preset kind.
    pub fn from_button(button: u8) -> Option<Self> {
        PRESETS.iter().find(|preset| preset.button == button).map(|preset| preset.kind)
    }

    pub fn preset(self) -> Option<&'static EffectPreset> {
        PRESETS.iter().find(|preset| preset.kind == self)
    }

    pub fn label(self) -> &'static str {
        self.preset().map_or("none", |preset| preset.label)
    }

    /// Multiplier this selection applies to the channel's base playback rate.
    pub fn rate_scale(self) -> u32 {
        match self {
            EffectKind::NormalizeDouble => 2,
            _ => 1,
        }
    }

    /// Build the DSP for this kind with its preset parameters.
    ///
    /// Returns `None` for kinds that attach nothing.
    pub fn build(self, sample_rate: u32) -> Option<Box<dyn Effect>> {
        let mut effect: Box<dyn Effect> = match self {
            EffectKind::None | EffectKind::Normal => return None,
            EffectKind::PitchUp | EffectKind::PitchDown => Box::new(PitchShift::new(sample_rate)),
            EffectKind::Flange => Box::new(Flange::new(sample_rate)),
            EffectKind::NormalizeDouble => Box::new(Normalize::new(sample_rate)),
            EffectKind::EchoLong | EffectKind::EchoShort => Box::new(Echo::new(sample_rate)),
            EffectKind::Tremolo => Box::new(Tremolo::new(sample_rate)),
        };

        for &(index, value) in self.preset().map_or(&[][..], |preset| preset.params) {
            effect.set_param(index, value);
        }
        Some(effect)
    }
}

/// Print the effect buttons and their parameters.
pub fn print_effects() {
    println!("═══════════════════════════════════════════════════════════════════");
    println!("  Effect buttons (one active at a time)");
    println!("═══════════════════════════════════════════════════════════════════");
    println!("{:<7} {:<10} PARAMETERS", "BUTTON", "EFFECT");
    println!("{}", "─".repeat(67));

    for preset in PRESETS {
        let params = match preset.kind.build(48000) {
            Some(effect) => {
                let values: Vec<String> =
                    preset.params.iter().map(|&(index, value)| format!("{}={}", effect.param_name(index), value)).collect();
                format!("{} {}", effect.name(), values.join(" "))
            }
            None => "dry signal".to_string(),
        };
        let extra = if preset.kind.rate_scale() != 1 { format!(" (rate x{})", preset.kind.rate_scale()) } else { String::new() };
        println!("{:<7} {:<10} {}{}", preset.button, preset.label, params.trim_end(), extra);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_button_maps_to_a_preset() {
        for button in 1..=8 {
            let kind = EffectKind::from_button(button).unwrap();
            assert_eq!(kind.preset().unwrap().button, button);
        }
        assert_eq!(EffectKind::from_button(0), None);
        assert_eq!(EffectKind::from_button(9), None);
    }

    #[test]
    fn test_normal_and_none_build_nothing() {
        assert!(EffectKind::Normal.build(48000).is_none());
        assert!(EffectKind::None.build(48000).is_none());
        assert_eq!(EffectKind::None.label(), "none");
    }

    #[test]
    fn test_only_normalize_scales_rate() {
        assert_eq!(EffectKind::NormalizeDouble.rate_scale(), 2);
        assert_eq!(EffectKind::EchoLong.rate_scale(), 1);
        assert_eq!(EffectKind::Normal.rate_scale(), 1);
    }

    #[test]
    fn test_presets_build_named_effects() {
        assert_eq!(EffectKind::PitchUp.build(48000).unwrap().name(), "pitch shift");
        assert_eq!(EffectKind::Flange.build(48000).unwrap().name(), "flange");
        assert_eq!(EffectKind::EchoShort.build(48000).unwrap().name(), "echo");
        assert_eq!(EffectKind::Tremolo.build(48000).unwrap().name(), "tremolo");
        assert_eq!(EffectKind::NormalizeDouble.build(48000).unwrap().name(), "normalize");
    }

    #[test]
    fn test_built_effects_keep_silence_finite() {
        for button in 2..=8 {
            let mut effect = EffectKind::from_button(button).unwrap().build(48000).unwrap();
            let mut block = vec![0.0f32; 512];
            effect.process(&mut block, 2);
            assert!(block.iter().all(|s| s.is_finite()), "{} produced non-finite output", effect.name());
        }
    }
}
