// src/state/event.rs
//
// Change notifications emitted by the project model.

use super::{EffectParam, SectionId, TrackId};

/// Which effect chain an effect belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectOwner {
    Master,
    Track(TrackId),
}

/// Something in the project changed.
///
/// Events carry identities and indices. Listeners read current values back
/// from the project.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    TrackAdded { track_id: TrackId },
    TrackRemoved { track_id: TrackId },
    TrackMuteChanged { track_id: TrackId, muted: bool },
    TrackSoloChanged { track_id: TrackId, soloed: bool },
    /// The project-wide soloed track changed.
    SoloedTrackChanged {
        previous: Option<TrackId>,
        current: Option<TrackId>,
    },
    TrackGainChanged { track_id: TrackId, gain: f32 },
    TrackPanChanged { track_id: TrackId, pan: f32 },

    SectionAdded {
        track_id: TrackId,
        section_id: SectionId,
    },
    SectionRemoved {
        track_id: TrackId,
        section_id: SectionId,
    },
    /// Begin time or playback rate changed.
    SectionTimingChanged {
        track_id: TrackId,
        section_id: SectionId,
    },

    EffectAdded { owner: EffectOwner, index: usize },
    EffectRemoved { owner: EffectOwner, index: usize },
    EffectMoved {
        owner: EffectOwner,
        from: usize,
        to: usize,
    },
    EffectParamChanged {
        owner: EffectOwner,
        index: usize,
        param: EffectParam,
        value: f32,
    },

    ControlPointsChanged { track_id: TrackId },
}

impl ChangeEvent {
    /// The track the event is about, if any.
    pub fn track_id(&self) -> Option<TrackId> {
        match *self {
            ChangeEvent::TrackAdded { track_id }
            | ChangeEvent::TrackRemoved { track_id }
            | ChangeEvent::TrackMuteChanged { track_id, .. }
            | ChangeEvent::TrackSoloChanged { track_id, .. }
            | ChangeEvent::TrackGainChanged { track_id, .. }
            | ChangeEvent::TrackPanChanged { track_id, .. }
            | ChangeEvent::SectionAdded { track_id, .. }
            | ChangeEvent::SectionRemoved { track_id, .. }
            | ChangeEvent::SectionTimingChanged { track_id, .. }
            | ChangeEvent::ControlPointsChanged { track_id } => Some(track_id),
            ChangeEvent::EffectAdded { owner, .. }
            | ChangeEvent::EffectRemoved { owner, .. }
            | ChangeEvent::EffectMoved { owner, .. }
            | ChangeEvent::EffectParamChanged { owner, .. } => match owner {
                EffectOwner::Track(track_id) => Some(track_id),
                EffectOwner::Master => None,
            },
            ChangeEvent::SoloedTrackChanged { .. } => None,
        }
    }
}
