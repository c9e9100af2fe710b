// src/state/track.rs
//
// Tracks: the user-facing audio lanes of a project.

use super::effect::EffectList;
use super::envelope::Envelope;
use super::section::{SectionDef, SectionId};

/// Unique identifier for a track.
pub type TrackId = u32;

/// A track in the project.
///
/// Tracks hold:
/// - mixer state (gain, pan, mute, solo)
/// - an ordered effect chain
/// - a volume envelope
/// - sections placed on the timeline
#[derive(Debug, Clone)]
pub struct TrackDef {
    /// Unique track ID.
    pub id: TrackId,

    /// Display name.
    pub name: String,

    /// Linear gain (1.0 = 0dB).
    pub gain: f32,

    /// Pan (-1.0 = left, 0.0 = center, 1.0 = right).
    pub pan: f32,

    pub(crate) muted: bool,
    pub(crate) soloed: bool,

    pub effects: EffectList,
    pub envelope: Envelope,
    pub sections: Vec<SectionDef>,
}

impl TrackDef {
    pub fn new(id: TrackId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            gain: 1.0,
            pan: 0.0,
            muted: false,
            soloed: false,
            effects: EffectList::new(),
            envelope: Envelope::new(),
            sections: Vec::new(),
        }
    }

    #[inline]
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    #[inline]
    pub fn is_soloed(&self) -> bool {
        self.soloed
    }

    /// Set mute. Muting clears solo. Returns whether solo was cleared.
    pub(crate) fn set_muted(&mut self, muted: bool) -> bool {
        self.muted = muted;
        let cleared = muted && self.soloed;
        if cleared {
            self.soloed = false;
        }
        cleared
    }

    /// Set solo. Soloing clears mute. Returns whether mute was cleared.
    pub(crate) fn set_soloed(&mut self, soloed: bool) -> bool {
        self.soloed = soloed;
        let cleared = soloed && self.muted;
        if cleared {
            self.muted = false;
        }
        cleared
    }

    pub fn section(&self, id: SectionId) -> Option<&SectionDef> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub(crate) fn section_mut(&mut self, id: SectionId) -> Option<&mut SectionDef> {
        self.sections.iter_mut().find(|s| s.id == id)
    }

    /// Timeline position where the last section ends.
    pub fn end_time(&self) -> f64 {
        self.sections
            .iter()
            .map(SectionDef::end_time)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mute_clears_solo() {
        let mut track = TrackDef::new(1, "Drums");
        track.set_soloed(true);
        assert!(track.set_muted(true));
        assert!(track.is_muted());
        assert!(!track.is_soloed());
    }

    #[test]
    fn test_solo_clears_mute() {
        let mut track = TrackDef::new(1, "Drums");
        assert!(!track.set_muted(true));
        assert!(track.set_soloed(true));
        assert!(track.is_soloed());
        assert!(!track.is_muted());
    }

    #[test]
    fn test_end_time() {
        let mut track = TrackDef::new(1, "Vox");
        assert_eq!(track.end_time(), 0.0);
        track.sections.push(SectionDef::new(1, 1, 1000.0, 0, 2000, 1.0));
        track.sections.push(SectionDef::new(2, 1, 1000.0, 0, 1000, 5.0));
        assert_eq!(track.end_time(), 6.0);
    }
}
