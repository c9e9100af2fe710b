// Commands from UI to the project model.
//
// Commands are the ONLY way the UI mutates the project. Each applied
// command yields the change events the audio graph reacts to.

use super::{ControlPoint, EffectKind, EffectOwner, EffectParam, SectionDef, SectionId, TrackId};

/// A mutation requested by the UI.
///
/// Commands are:
/// - Immutable once created
/// - Applied synchronously by [`Project::apply`](super::Project::apply)
/// - Applied atomically (validated before anything changes)
#[derive(Debug, Clone)]
pub enum Command {
    // ═══════════════════════════════════════════
    // Tracks
    // ═══════════════════════════════════════════
    /// Append a new track.
    AddTrack { name: String },

    RemoveTrack { track_id: TrackId },

    /// Mute or unmute. Muting clears solo.
    SetTrackMute { track_id: TrackId, muted: bool },

    /// Solo or unsolo. Soloing clears mute and unsolos any other track.
    SetTrackSolo { track_id: TrackId, soloed: bool },

    SetTrackGain { track_id: TrackId, gain: f32 },

    SetTrackPan { track_id: TrackId, pan: f32 },

    // ═══════════════════════════════════════════
    // Sections
    // ═══════════════════════════════════════════
    /// Place a section on a track. The section id must be unused.
    AddSection { track_id: TrackId, section: SectionDef },

    RemoveSection {
        track_id: TrackId,
        section_id: SectionId,
    },

    /// Move a section to another track, keeping its timeline position.
    MoveSection {
        section_id: SectionId,
        from_track: TrackId,
        to_track: TrackId,
    },

    SetSectionBeginTime {
        track_id: TrackId,
        section_id: SectionId,
        begin_time: f64,
    },

    SetSectionPlaybackRate {
        track_id: TrackId,
        section_id: SectionId,
        playback_rate: f64,
    },

    // ═══════════════════════════════════════════
    // Effects
    // ═══════════════════════════════════════════
    /// Insert a new effect with default parameters at `index`.
    AddEffect {
        owner: EffectOwner,
        index: usize,
        kind: EffectKind,
    },

    RemoveEffect { owner: EffectOwner, index: usize },

    MoveEffect {
        owner: EffectOwner,
        from: usize,
        to: usize,
    },

    SetEffectParam {
        owner: EffectOwner,
        index: usize,
        param: EffectParam,
        value: f32,
    },

    // ═══════════════════════════════════════════
    // Volume envelope
    // ═══════════════════════════════════════════
    AddControlPoint {
        track_id: TrackId,
        point: ControlPoint,
    },

    RemoveControlPoint { track_id: TrackId, index: usize },

    /// Replace every control point of the track's envelope.
    SetControlPoints {
        track_id: TrackId,
        points: Vec<ControlPoint>,
    },
}
