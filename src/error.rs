// src/error.rs
//
// Error types for graph construction and model mutations.
//
// Programmer errors (invalid topology, an effect kind with no registered
// constructor) panic instead. Only environment conditions and bad model
// input come back as `EngineError`.

use thiserror::Error;

use crate::context::PrimitiveKind;
use crate::state::{EffectKind, EffectParam, SectionId, TrackId};

/// Errors surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The rendering context refused to create a primitive.
    #[error("rendering context could not create a {kind:?} primitive: {reason}")]
    PrimitiveCreation {
        /// Kind of primitive that was requested.
        kind: PrimitiveKind,
        /// Reason reported by the rendering context.
        reason: String,
    },

    /// A raw effect kind id that maps to no known kind.
    #[error("unknown effect kind id: {0}")]
    UnknownEffectKind(u32),

    /// A registry handed to the graph has no constructor for a kind.
    #[error("no junction constructor registered for {0:?} effects")]
    MissingEffectConstructor(EffectKind),

    #[error("track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("section not found: {0}")]
    SectionNotFound(SectionId),

    /// A chain operation addressed an index past the end of the chain.
    #[error("effect index {index} out of range for a chain of {len}")]
    EffectIndexOutOfRange { index: usize, len: usize },

    /// The parameter does not belong to the effect kind.
    #[error("parameter {param:?} does not apply to {kind:?} effects")]
    InvalidParameter { kind: EffectKind, param: EffectParam },

    #[error("invalid section: {0}")]
    InvalidSection(String),
}

/// Result alias used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;
