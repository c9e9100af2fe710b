// src/state/param_info.rs
//
// Effect parameter metadata for UI display and validation.

use std::fmt;

/// Parameters an effect can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectParam {
    Frequency,
    Q,
    /// Filter gain or gain-effect level, in dB.
    Gain,
    Pan,
    Duration,
    Decay,
    Reversed,
    Attack,
    Knee,
    Ratio,
    Release,
    Threshold,
}

/// Unit type for parameter display.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ParamUnit {
    #[default]
    None,
    /// Hertz (frequency)
    Hz,
    /// Decibels (gain)
    Db,
    /// Milliseconds
    Ms,
    /// Seconds
    Seconds,
    /// Pan (-1 to +1)
    Pan,
}

impl fmt::Display for ParamUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamUnit::None | ParamUnit::Pan => Ok(()),
            ParamUnit::Hz => write!(f, "Hz"),
            ParamUnit::Db => write!(f, "dB"),
            ParamUnit::Ms => write!(f, "ms"),
            ParamUnit::Seconds => write!(f, "s"),
        }
    }
}

/// Metadata describing one effect parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamInfo {
    pub param: EffectParam,
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub unit: ParamUnit,
}

impl ParamInfo {
    pub const fn new(
        param: EffectParam,
        name: &'static str,
        min: f32,
        max: f32,
        default: f32,
        unit: ParamUnit,
    ) -> Self {
        Self {
            param,
            name,
            min,
            max,
            default,
            unit,
        }
    }

    /// Clamp a value to this parameter's range.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Format a value for display.
    pub fn format(&self, value: f32) -> String {
        match self.unit {
            ParamUnit::None => format!("{value:.2}"),
            ParamUnit::Hz if value >= 1000.0 => format!("{:.2} kHz", value / 1000.0),
            ParamUnit::Pan => {
                if value.abs() < 0.01 {
                    "C".to_string()
                } else if value < 0.0 {
                    format!("{:.0}L", -value * 100.0)
                } else {
                    format!("{:.0}R", value * 100.0)
                }
            }
            unit => format!("{value:.2} {unit}"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Parameter tables
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) const FILTER_PARAMS: &[ParamInfo] = &[
    ParamInfo::new(EffectParam::Frequency, "Frequency", 10.0, 22_050.0, 1300.0, ParamUnit::Hz),
    ParamInfo::new(EffectParam::Q, "Q", 0.0, 20.0, 8.6, ParamUnit::None),
    ParamInfo::new(EffectParam::Gain, "Gain", -36.0, 36.0, 3.12, ParamUnit::Db),
];

pub(crate) const GAIN_PARAMS: &[ParamInfo] = &[ParamInfo::new(
    EffectParam::Gain,
    "Gain",
    -60.0,
    24.0,
    0.0,
    ParamUnit::Db,
)];

pub(crate) const PAN_PARAMS: &[ParamInfo] = &[ParamInfo::new(
    EffectParam::Pan,
    "Pan",
    -1.0,
    1.0,
    0.0,
    ParamUnit::Pan,
)];

pub(crate) const REVERB_PARAMS: &[ParamInfo] = &[
    ParamInfo::new(EffectParam::Duration, "Duration", 100.0, 10_000.0, 2000.0, ParamUnit::Ms),
    ParamInfo::new(EffectParam::Decay, "Decay", 100.0, 10_000.0, 2000.0, ParamUnit::Ms),
    ParamInfo::new(EffectParam::Reversed, "Reversed", 0.0, 1.0, 0.0, ParamUnit::None),
];

pub(crate) const COMPRESSOR_PARAMS: &[ParamInfo] = &[
    ParamInfo::new(EffectParam::Attack, "Attack", 0.0, 1.0, 0.009, ParamUnit::Seconds),
    ParamInfo::new(EffectParam::Knee, "Knee", 0.0, 40.0, 30.0, ParamUnit::Db),
    ParamInfo::new(EffectParam::Ratio, "Ratio", 1.0, 20.0, 12.0, ParamUnit::None),
    ParamInfo::new(EffectParam::Release, "Release", 0.001, 1.0, 0.25, ParamUnit::Seconds),
    ParamInfo::new(EffectParam::Threshold, "Threshold", -100.0, 0.0, -24.0, ParamUnit::Db),
];
