// src/state/effect.rs
//
// Effect definitions and ordered effect lists.

use std::collections::BTreeMap;

use super::param_info::{
    COMPRESSOR_PARAMS, EffectParam, FILTER_PARAMS, GAIN_PARAMS, PAN_PARAMS, ParamInfo,
    REVERB_PARAMS,
};
use crate::context::FilterType;
use crate::error::{EngineError, EngineResult};

/// Unique identifier for an effect.
pub type EffectId = u32;

/// Every effect kind the engine can realize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    Lowpass,
    Highpass,
    Bandpass,
    Lowshelf,
    Highshelf,
    Peaking,
    Notch,
    Allpass,
    Gain,
    DynamicCompressor,
    Pan,
    Reverb,
}

impl EffectKind {
    pub const ALL: [EffectKind; 12] = [
        EffectKind::Lowpass,
        EffectKind::Highpass,
        EffectKind::Bandpass,
        EffectKind::Lowshelf,
        EffectKind::Highshelf,
        EffectKind::Peaking,
        EffectKind::Notch,
        EffectKind::Allpass,
        EffectKind::Gain,
        EffectKind::DynamicCompressor,
        EffectKind::Pan,
        EffectKind::Reverb,
    ];

    /// Stable numeric id, as stored in project files and passed over FFI.
    pub fn id(self) -> u32 {
        match self {
            EffectKind::Lowpass => 1,
            EffectKind::Highpass => 2,
            EffectKind::Bandpass => 3,
            EffectKind::Lowshelf => 4,
            EffectKind::Highshelf => 5,
            EffectKind::Peaking => 6,
            EffectKind::Notch => 7,
            EffectKind::Allpass => 8,
            EffectKind::Gain => 10,
            EffectKind::DynamicCompressor => 11,
            EffectKind::Pan => 12,
            EffectKind::Reverb => 13,
        }
    }

    pub fn from_id(id: u32) -> EngineResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == id)
            .ok_or(EngineError::UnknownEffectKind(id))
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Lowpass => "Lowpass Filter",
            EffectKind::Highpass => "Highpass Filter",
            EffectKind::Bandpass => "Bandpass Filter",
            EffectKind::Lowshelf => "Lowshelf Filter",
            EffectKind::Highshelf => "Highshelf Filter",
            EffectKind::Peaking => "Peaking Filter",
            EffectKind::Notch => "Notch Filter",
            EffectKind::Allpass => "Allpass Filter",
            EffectKind::Gain => "Gain",
            EffectKind::DynamicCompressor => "Dynamic Compressor",
            EffectKind::Pan => "Pan",
            EffectKind::Reverb => "Reverb",
        }
    }

    /// Biquad type for the filter kinds.
    pub fn filter_type(self) -> Option<FilterType> {
        Some(match self {
            EffectKind::Lowpass => FilterType::Lowpass,
            EffectKind::Highpass => FilterType::Highpass,
            EffectKind::Bandpass => FilterType::Bandpass,
            EffectKind::Lowshelf => FilterType::Lowshelf,
            EffectKind::Highshelf => FilterType::Highshelf,
            EffectKind::Peaking => FilterType::Peaking,
            EffectKind::Notch => FilterType::Notch,
            EffectKind::Allpass => FilterType::Allpass,
            _ => return None,
        })
    }

    /// Parameters this kind exposes.
    pub fn params(self) -> &'static [ParamInfo] {
        match self {
            EffectKind::Gain => GAIN_PARAMS,
            EffectKind::Pan => PAN_PARAMS,
            EffectKind::Reverb => REVERB_PARAMS,
            EffectKind::DynamicCompressor => COMPRESSOR_PARAMS,
            _ => FILTER_PARAMS,
        }
    }

    pub fn param_info(self, param: EffectParam) -> Option<&'static ParamInfo> {
        self.params().iter().find(|info| info.param == param)
    }
}

/// An effect instance in a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDef {
    pub id: EffectId,
    pub kind: EffectKind,
    values: BTreeMap<EffectParam, f32>,
}

impl EffectDef {
    /// Create an effect with every parameter at its default.
    pub fn new(id: EffectId, kind: EffectKind) -> Self {
        let values = kind
            .params()
            .iter()
            .map(|info| (info.param, info.default))
            .collect();
        Self { id, kind, values }
    }

    /// Current value of a parameter. Zero for parameters this kind lacks.
    #[inline]
    pub fn param(&self, param: EffectParam) -> f32 {
        self.values.get(&param).copied().unwrap_or(0.0)
    }

    /// Set a parameter, clamped to its range. Returns the stored value.
    pub fn set_param(&mut self, param: EffectParam, value: f32) -> EngineResult<f32> {
        let info = self
            .kind
            .param_info(param)
            .ok_or(EngineError::InvalidParameter {
                kind: self.kind,
                param,
            })?;
        let value = info.clamp(value);
        self.values.insert(param, value);
        Ok(value)
    }

    pub fn values(&self) -> impl Iterator<Item = (EffectParam, f32)> + '_ {
        self.values.iter().map(|(&p, &v)| (p, v))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Effect lists
// ═══════════════════════════════════════════════════════════════════════════

/// Ordered effects of a track or of the master bus.
///
/// List order is processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectList {
    effects: Vec<EffectDef>,
}

impl EffectList {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&EffectDef> {
        self.effects.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectDef> {
        self.effects.iter()
    }

    pub fn insert(&mut self, index: usize, effect: EffectDef) -> EngineResult<()> {
        if index > self.effects.len() {
            return Err(EngineError::EffectIndexOutOfRange {
                index,
                len: self.effects.len(),
            });
        }
        self.effects.insert(index, effect);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> EngineResult<EffectDef> {
        self.check(index)?;
        Ok(self.effects.remove(index))
    }

    /// Move the effect at `from` so that it ends up at `to`.
    pub fn move_effect(&mut self, from: usize, to: usize) -> EngineResult<()> {
        self.check(from)?;
        self.check(to)?;
        let effect = self.effects.remove(from);
        self.effects.insert(to, effect);
        Ok(())
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut EffectDef> {
        self.effects.get_mut(index)
    }

    fn check(&self, index: usize) -> EngineResult<()> {
        if index < self.effects.len() {
            Ok(())
        } else {
            Err(EngineError::EffectIndexOutOfRange {
                index,
                len: self.effects.len(),
            })
        }
    }
}
