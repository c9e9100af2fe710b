// src/lib.rs
//
// Routing graph and playback synchronization for a multi-track audio editor.
//
// The engine never renders audio itself. It drives a rendering context
// (a browser audio context over wasm, or the in-memory `HeadlessContext`)
// by creating primitives, wiring them and scheduling sources.

mod config;
mod context;
mod effect_factory;
mod error;
mod graph;
mod junction;
mod state;
mod track;
mod transport;

#[cfg(feature = "web")]
pub mod wasm;

// Re-export key types for Rust consumers
pub use config::{DEFAULT_ANALYSER_FFT_SIZE, DEFAULT_ANALYSER_SMOOTHING, DEFAULT_CHANNELS, GraphConfig};
pub use context::{
    ContextAccessor, FilterType, HeadlessContext, OfflineRender, Param, PrimitiveId, PrimitiveKind,
    PrimitiveRecord, PrimitiveSpec, Ramp, RenderContext, SourceSchedule,
};
pub use effect_factory::{EffectFactory, EffectRegistry, register_standard_effects};
pub use error::{EngineError, EngineResult};
pub use graph::AudioGraph;
pub use junction::{
    AnalyserJunction, ChainSignal, ChainWalk, ChannelSplitterJunction, CompressorJunction,
    EffectChainJunction, EnvelopePlan, FilterJunction, GainJunction, HOLD_RAMP_OFFSET,
    JunctionArena, JunctionId, JunctionKind, JunctionNode, PanJunction, ReverbJunction,
    SectionJunction, SectionSchedule, SectionStart, VolumeEnvelopeJunction, db_to_linear,
    plan_envelope, schedule_section,
};
pub use state::*;
pub use track::TrackJunction;
pub use transport::{PlaybackState, PlaybackTiming};
