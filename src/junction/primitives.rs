// src/junction/primitives.rs
//
// Single-primitive junction variants.
//
// Each variant caches the parameter values of its primitive, so an offline
// mirror can be built without reading anything back from the live context.

use std::collections::BTreeMap;

use super::{JunctionArena, JunctionId, JunctionKind};
use crate::config::{DEFAULT_ANALYSER_FFT_SIZE, DEFAULT_ANALYSER_SMOOTHING};
use crate::context::{FilterType, Param, PrimitiveId, PrimitiveKind, PrimitiveSpec, RenderContext};
use crate::state::{EffectDef, EffectParam};

/// Convert decibels to linear gain.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

// ═══════════════════════════════════════════════════════════════════════════
// Variants
// ═══════════════════════════════════════════════════════════════════════════

/// Linear gain stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainJunction {
    pub gain: f32,
}

/// Stereo position, -1.0 (left) to 1.0 (right).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanJunction {
    pub pan: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterJunction {
    pub filter: FilterType,
    pub frequency: f32,
    pub q: f32,
    /// Shelf or peak gain, in dB.
    pub gain_db: f32,
}

/// Convolution reverb. The impulse response is generated by the primitive
/// from these values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbJunction {
    pub duration_ms: f32,
    pub decay_ms: f32,
    pub reversed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorJunction {
    pub attack: f32,
    pub knee: f32,
    pub ratio: f32,
    pub release: f32,
    pub threshold: f32,
}

/// Analysis tap read by meters and visualizers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserJunction {
    pub fft_size: u32,
    pub smoothing: f32,
}

impl Default for AnalyserJunction {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_ANALYSER_FFT_SIZE,
            smoothing: DEFAULT_ANALYSER_SMOOTHING,
        }
    }
}

/// Splits a signal into one output per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSplitterJunction {
    /// channel -> (junction, live primitive it feeds)
    pub(crate) outputs: BTreeMap<usize, (JunctionId, PrimitiveId)>,
}

impl ChannelSplitterJunction {
    /// Junction fed by `channel`, if mapped.
    pub fn output(&self, channel: usize) -> Option<JunctionId> {
        self.outputs.get(&channel).map(|&(junction, _)| junction)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Effect construction and parameters
// ═══════════════════════════════════════════════════════════════════════════

impl FilterJunction {
    pub fn from_effect(filter: FilterType, effect: &EffectDef) -> Self {
        Self {
            filter,
            frequency: effect.param(EffectParam::Frequency),
            q: effect.param(EffectParam::Q),
            gain_db: effect.param(EffectParam::Gain),
        }
    }
}

impl ReverbJunction {
    pub fn from_effect(effect: &EffectDef) -> Self {
        Self {
            duration_ms: effect.param(EffectParam::Duration),
            decay_ms: effect.param(EffectParam::Decay),
            reversed: effect.param(EffectParam::Reversed) >= 0.5,
        }
    }
}

impl CompressorJunction {
    pub fn from_effect(effect: &EffectDef) -> Self {
        Self {
            attack: effect.param(EffectParam::Attack),
            knee: effect.param(EffectParam::Knee),
            ratio: effect.param(EffectParam::Ratio),
            release: effect.param(EffectParam::Release),
            threshold: effect.param(EffectParam::Threshold),
        }
    }
}

impl JunctionKind {
    /// The primitive this kind presents, with its current parameters.
    pub fn primitive_spec(&self, channels: usize) -> Option<PrimitiveSpec> {
        let spec = match self {
            JunctionKind::Gain(g) => {
                PrimitiveSpec::new(PrimitiveKind::Gain, channels).with(Param::Gain, g.gain)
            }
            JunctionKind::Pan(p) => {
                PrimitiveSpec::new(PrimitiveKind::Panner, channels).with(Param::Pan, p.pan)
            }
            JunctionKind::Filter(f) => {
                PrimitiveSpec::new(PrimitiveKind::BiquadFilter(f.filter), channels)
                    .with(Param::Frequency, f.frequency)
                    .with(Param::Q, f.q)
                    .with(Param::FilterGain, f.gain_db)
            }
            JunctionKind::Reverb(r) => PrimitiveSpec::new(PrimitiveKind::Convolver, channels)
                .with(Param::ReverbDuration, r.duration_ms)
                .with(Param::ReverbDecay, r.decay_ms)
                .with(Param::ReverbReversed, if r.reversed { 1.0 } else { 0.0 }),
            JunctionKind::DynamicCompressor(c) => {
                PrimitiveSpec::new(PrimitiveKind::DynamicsCompressor, channels)
                    .with(Param::Attack, c.attack)
                    .with(Param::Knee, c.knee)
                    .with(Param::Ratio, c.ratio)
                    .with(Param::Release, c.release)
                    .with(Param::Threshold, c.threshold)
            }
            JunctionKind::Analyser(a) => PrimitiveSpec::new(PrimitiveKind::Analyser, channels)
                .with(Param::FftSize, a.fft_size as f32)
                .with(Param::Smoothing, a.smoothing),
            JunctionKind::ChannelSplitter(_) => {
                PrimitiveSpec::new(PrimitiveKind::ChannelSplitter, channels)
            }
            JunctionKind::Destination => PrimitiveSpec::new(PrimitiveKind::Destination, channels),
            // Gain values come from the planned ramps.
            JunctionKind::VolumeEnvelope(_) => PrimitiveSpec::new(PrimitiveKind::Gain, channels),
            JunctionKind::EffectChain(_) | JunctionKind::Section(_) => return None,
        };
        Some(spec)
    }

    /// Store an effect parameter and return the primitive parameter to push.
    ///
    /// `None` when this kind has no such parameter.
    pub fn apply_effect_param(&mut self, param: EffectParam, value: f32) -> Option<(Param, f32)> {
        match (self, param) {
            (JunctionKind::Gain(g), EffectParam::Gain) => {
                g.gain = db_to_linear(value);
                Some((Param::Gain, g.gain))
            }
            (JunctionKind::Pan(p), EffectParam::Pan) => {
                p.pan = value;
                Some((Param::Pan, value))
            }
            (JunctionKind::Filter(f), EffectParam::Frequency) => {
                f.frequency = value;
                Some((Param::Frequency, value))
            }
            (JunctionKind::Filter(f), EffectParam::Q) => {
                f.q = value;
                Some((Param::Q, value))
            }
            (JunctionKind::Filter(f), EffectParam::Gain) => {
                f.gain_db = value;
                Some((Param::FilterGain, value))
            }
            (JunctionKind::Reverb(r), EffectParam::Duration) => {
                r.duration_ms = value;
                Some((Param::ReverbDuration, value))
            }
            (JunctionKind::Reverb(r), EffectParam::Decay) => {
                r.decay_ms = value;
                Some((Param::ReverbDecay, value))
            }
            (JunctionKind::Reverb(r), EffectParam::Reversed) => {
                r.reversed = value >= 0.5;
                Some((Param::ReverbReversed, if r.reversed { 1.0 } else { 0.0 }))
            }
            (JunctionKind::DynamicCompressor(c), EffectParam::Attack) => {
                c.attack = value;
                Some((Param::Attack, value))
            }
            (JunctionKind::DynamicCompressor(c), EffectParam::Knee) => {
                c.knee = value;
                Some((Param::Knee, value))
            }
            (JunctionKind::DynamicCompressor(c), EffectParam::Ratio) => {
                c.ratio = value;
                Some((Param::Ratio, value))
            }
            (JunctionKind::DynamicCompressor(c), EffectParam::Release) => {
                c.release = value;
                Some((Param::Release, value))
            }
            (JunctionKind::DynamicCompressor(c), EffectParam::Threshold) => {
                c.threshold = value;
                Some((Param::Threshold, value))
            }
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Live parameter updates
// ═══════════════════════════════════════════════════════════════════════════

impl JunctionArena {
    /// Set the linear gain of a gain junction.
    pub fn set_gain(&mut self, id: JunctionId, gain: f32, ctx: &mut dyn RenderContext) {
        let node = self.node_mut(id);
        let JunctionKind::Gain(g) = &mut node.kind else {
            panic!("junction {id:?} is not a gain junction");
        };
        g.gain = gain;
        if let Some(primitive) = node.primitive {
            ctx.set_param(primitive, Param::Gain, gain);
        }
    }

    /// Current linear gain of a gain junction.
    pub fn gain(&self, id: JunctionId) -> Option<f32> {
        match self.get(id).map(|n| &n.kind) {
            Some(JunctionKind::Gain(g)) => Some(g.gain),
            _ => None,
        }
    }

    pub fn set_pan(&mut self, id: JunctionId, pan: f32, ctx: &mut dyn RenderContext) {
        let node = self.node_mut(id);
        let JunctionKind::Pan(p) = &mut node.kind else {
            panic!("junction {id:?} is not a pan junction");
        };
        p.pan = pan;
        if let Some(primitive) = node.primitive {
            ctx.set_param(primitive, Param::Pan, pan);
        }
    }

    /// Push an effect parameter change into a live effect junction.
    ///
    /// Returns whether the junction knew the parameter.
    pub fn set_effect_param(
        &mut self,
        id: JunctionId,
        param: EffectParam,
        value: f32,
        ctx: &mut dyn RenderContext,
    ) -> bool {
        let node = self.node_mut(id);
        match node.kind.apply_effect_param(param, value) {
            Some((param, value)) => {
                if let Some(primitive) = node.primitive {
                    ctx.set_param(primitive, param, value);
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessContext;
    use crate::state::EffectKind;

    #[test]
    fn test_db_to_linear() {
        assert_eq!(db_to_linear(0.0), 1.0);
        assert!((db_to_linear(-6.0) - 0.501).abs() < 1e-3);
        assert!((db_to_linear(20.0) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_filter_from_effect_defaults() {
        let effect = EffectDef::new(1, EffectKind::Highshelf);
        let filter = FilterJunction::from_effect(FilterType::Highshelf, &effect);
        assert_eq!(filter.frequency, 1300.0);
        assert_eq!(filter.q, 8.6);
        assert_eq!(filter.gain_db, 3.12);
    }

    #[test]
    fn test_effect_param_reaches_live_primitive() {
        let ctx = HeadlessContext::default();
        let mut live = ctx.clone();
        let mut arena = JunctionArena::new();
        let id = arena
            .insert(JunctionKind::Gain(GainJunction { gain: 1.0 }), 2, &mut live)
            .unwrap();
        let primitive = arena.get(id).unwrap().primitive().unwrap();

        assert!(arena.set_effect_param(id, EffectParam::Gain, 20.0, &mut live));
        assert!((ctx.param(primitive, Param::Gain).unwrap() - 10.0).abs() < 1e-4);
        assert!(!arena.set_effect_param(id, EffectParam::Q, 1.0, &mut live));
    }

    #[test]
    fn test_reverb_spec_encodes_reversed() {
        let kind = JunctionKind::Reverb(ReverbJunction {
            duration_ms: 1500.0,
            decay_ms: 800.0,
            reversed: true,
        });
        let spec = kind.primitive_spec(2).unwrap();
        assert_eq!(spec.kind, PrimitiveKind::Convolver);
        assert!(spec.params.contains(&(Param::ReverbReversed, 1.0)));
    }
}
