// src/state/mod.rs
//
// Project model the audio graph listens to.
//
// This module contains the editable description of a project: tracks,
// sections, effects and volume envelopes. The UI mutates it through
// Commands, and every mutation is reported as ChangeEvents the audio graph
// turns into graph surgery.
//
// Key principles:
// - Mutations happen through Commands
// - Commands are validated before anything changes
// - The graph only reads from these structures

mod command;
mod effect;
mod envelope;
mod event;
mod param_info;
mod project;
mod section;
mod track;

pub use command::*;
pub use effect::*;
pub use envelope::*;
pub use event::*;
pub use param_info::{EffectParam, ParamInfo, ParamUnit};
pub use project::*;
pub use section::*;
pub use track::*;
