// src/state/project.rs
//
// Project state: tracks, master effects and solo arbitration.
//
// The Project is the model the audio graph listens to. It is mutated only
// through `Command`s and reports every change as `ChangeEvent`s.

use super::{
    ChangeEvent, Command, ControlPoint, EffectDef, EffectId, EffectList, EffectOwner, Envelope,
    SectionDef, SectionId, TrackDef, TrackId,
};
use crate::error::{EngineError, EngineResult};

/// Complete editable state of one project.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project name.
    pub name: String,

    tracks: Vec<TrackDef>,
    master_effects: EffectList,
    soloed: Option<TrackId>,

    next_track_id: TrackId,
    next_effect_id: EffectId,
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
            master_effects: EffectList::new(),
            soloed: None,
            next_track_id: 1,
            next_effect_id: 1,
        }
    }

    // ───────────────────────────────────────────────────────────────────
    // Queries
    // ───────────────────────────────────────────────────────────────────

    #[inline]
    pub fn tracks(&self) -> &[TrackDef] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> EngineResult<&TrackDef> {
        self.tracks
            .iter()
            .find(|t| t.id == id)
            .ok_or(EngineError::TrackNotFound(id))
    }

    #[inline]
    pub fn master_effects(&self) -> &EffectList {
        &self.master_effects
    }

    pub fn effects(&self, owner: EffectOwner) -> EngineResult<&EffectList> {
        match owner {
            EffectOwner::Master => Ok(&self.master_effects),
            EffectOwner::Track(id) => self.track(id).map(|t| &t.effects),
        }
    }

    /// The one soloed track, if any.
    #[inline]
    pub fn soloed_track(&self) -> Option<TrackId> {
        self.soloed
    }

    /// Timeline position where the last section of any track ends.
    pub fn end_time(&self) -> f64 {
        self.tracks.iter().map(TrackDef::end_time).fold(0.0, f64::max)
    }

    // ───────────────────────────────────────────────────────────────────
    // Mutation
    // ───────────────────────────────────────────────────────────────────

    /// Apply one command and return the resulting change events, in the
    /// order listeners must observe them.
    pub fn apply(&mut self, command: Command) -> EngineResult<Vec<ChangeEvent>> {
        match command {
            Command::AddTrack { name } => Ok(self.add_track(name).1),

            Command::RemoveTrack { track_id } => {
                let index = self.track_index(track_id)?;
                let mut events = Vec::new();
                if self.tracks[index].soloed {
                    self.tracks[index].soloed = false;
                    events.extend(self.set_soloed_track(None));
                }
                self.tracks.remove(index);
                events.push(ChangeEvent::TrackRemoved { track_id });
                Ok(events)
            }

            Command::SetTrackMute { track_id, muted } => self.set_mute(track_id, muted),

            Command::SetTrackSolo { track_id, soloed } => self.set_solo(track_id, soloed),

            Command::SetTrackGain { track_id, gain } => {
                let gain = gain.max(0.0);
                self.track_mut(track_id)?.gain = gain;
                Ok(vec![ChangeEvent::TrackGainChanged { track_id, gain }])
            }

            Command::SetTrackPan { track_id, pan } => {
                let pan = pan.clamp(-1.0, 1.0);
                self.track_mut(track_id)?.pan = pan;
                Ok(vec![ChangeEvent::TrackPanChanged { track_id, pan }])
            }

            Command::AddSection { track_id, section } => {
                section.validate()?;
                if self.owner_of_section(section.id).is_some() {
                    return Err(EngineError::InvalidSection(format!(
                        "section id {} is already in use",
                        section.id
                    )));
                }
                let section_id = section.id;
                self.track_mut(track_id)?.sections.push(section);
                Ok(vec![ChangeEvent::SectionAdded {
                    track_id,
                    section_id,
                }])
            }

            Command::RemoveSection {
                track_id,
                section_id,
            } => {
                self.take_section(track_id, section_id)?;
                Ok(vec![ChangeEvent::SectionRemoved {
                    track_id,
                    section_id,
                }])
            }

            Command::MoveSection {
                section_id,
                from_track,
                to_track,
            } => {
                self.track(to_track)?;
                let section = self.take_section(from_track, section_id)?;
                self.track_mut(to_track)?.sections.push(section);
                Ok(vec![
                    ChangeEvent::SectionRemoved {
                        track_id: from_track,
                        section_id,
                    },
                    ChangeEvent::SectionAdded {
                        track_id: to_track,
                        section_id,
                    },
                ])
            }

            Command::SetSectionBeginTime {
                track_id,
                section_id,
                begin_time,
            } => {
                self.section_mut(track_id, section_id)?.begin_time = begin_time.max(0.0);
                Ok(vec![ChangeEvent::SectionTimingChanged {
                    track_id,
                    section_id,
                }])
            }

            Command::SetSectionPlaybackRate {
                track_id,
                section_id,
                playback_rate,
            } => {
                if !(playback_rate > 0.0) {
                    return Err(EngineError::InvalidSection(format!(
                        "playback rate {playback_rate} for section {section_id}"
                    )));
                }
                self.section_mut(track_id, section_id)?.playback_rate = playback_rate;
                Ok(vec![ChangeEvent::SectionTimingChanged {
                    track_id,
                    section_id,
                }])
            }

            Command::AddEffect { owner, index, kind } => {
                let effect = EffectDef::new(self.next_effect_id, kind);
                self.effects_mut(owner)?.insert(index, effect)?;
                self.next_effect_id += 1;
                Ok(vec![ChangeEvent::EffectAdded { owner, index }])
            }

            Command::RemoveEffect { owner, index } => {
                self.effects_mut(owner)?.remove(index)?;
                Ok(vec![ChangeEvent::EffectRemoved { owner, index }])
            }

            Command::MoveEffect { owner, from, to } => {
                self.effects_mut(owner)?.move_effect(from, to)?;
                Ok(vec![ChangeEvent::EffectMoved { owner, from, to }])
            }

            Command::SetEffectParam {
                owner,
                index,
                param,
                value,
            } => {
                let effects = self.effects_mut(owner)?;
                let len = effects.len();
                let effect = effects
                    .get_mut(index)
                    .ok_or(EngineError::EffectIndexOutOfRange { index, len })?;
                let value = effect.set_param(param, value)?;
                Ok(vec![ChangeEvent::EffectParamChanged {
                    owner,
                    index,
                    param,
                    value,
                }])
            }

            Command::AddControlPoint { track_id, point } => {
                self.track_mut(track_id)?.envelope.add(point);
                Ok(vec![ChangeEvent::ControlPointsChanged { track_id }])
            }

            Command::RemoveControlPoint { track_id, index } => {
                // Nothing to report when the index is stale.
                match self.track_mut(track_id)?.envelope.remove(index) {
                    Some(_) => Ok(vec![ChangeEvent::ControlPointsChanged { track_id }]),
                    None => Ok(Vec::new()),
                }
            }

            Command::SetControlPoints { track_id, points } => {
                self.track_mut(track_id)?.envelope = Envelope::from_points(points);
                Ok(vec![ChangeEvent::ControlPointsChanged { track_id }])
            }
        }
    }

    /// Convenience: append a track and return its id with the events.
    pub fn add_track(&mut self, name: impl Into<String>) -> (TrackId, Vec<ChangeEvent>) {
        let track_id = self.next_track_id;
        self.next_track_id += 1;
        self.tracks.push(TrackDef::new(track_id, name));
        (track_id, vec![ChangeEvent::TrackAdded { track_id }])
    }

    pub fn control_points(&self, track_id: TrackId) -> EngineResult<&[ControlPoint]> {
        self.track(track_id).map(|t| t.envelope.points())
    }

    pub fn section(&self, track_id: TrackId, section_id: SectionId) -> EngineResult<&SectionDef> {
        self.track(track_id)?
            .section(section_id)
            .ok_or(EngineError::SectionNotFound(section_id))
    }

    // ───────────────────────────────────────────────────────────────────
    // Mute / solo
    // ───────────────────────────────────────────────────────────────────

    fn set_mute(&mut self, track_id: TrackId, muted: bool) -> EngineResult<Vec<ChangeEvent>> {
        let solo_cleared = self.track_mut(track_id)?.set_muted(muted);
        let mut events = vec![ChangeEvent::TrackMuteChanged { track_id, muted }];
        if solo_cleared {
            events.push(ChangeEvent::TrackSoloChanged {
                track_id,
                soloed: false,
            });
            events.extend(self.set_soloed_track(None));
        }
        Ok(events)
    }

    fn set_solo(&mut self, track_id: TrackId, soloed: bool) -> EngineResult<Vec<ChangeEvent>> {
        let mute_cleared = self.track_mut(track_id)?.set_soloed(soloed);
        let mut events = Vec::new();
        if mute_cleared {
            events.push(ChangeEvent::TrackMuteChanged {
                track_id,
                muted: false,
            });
        }
        events.push(ChangeEvent::TrackSoloChanged { track_id, soloed });

        if soloed {
            // At most one soloed track.
            if let Some(previous) = self.soloed.filter(|&p| p != track_id) {
                if let Ok(track) = self.track_mut(previous) {
                    track.soloed = false;
                }
                events.push(ChangeEvent::TrackSoloChanged {
                    track_id: previous,
                    soloed: false,
                });
            }
            events.extend(self.set_soloed_track(Some(track_id)));
        } else if self.soloed == Some(track_id) {
            events.extend(self.set_soloed_track(None));
        }
        Ok(events)
    }

    fn set_soloed_track(&mut self, current: Option<TrackId>) -> Option<ChangeEvent> {
        let previous = self.soloed;
        if previous == current {
            return None;
        }
        self.soloed = current;
        Some(ChangeEvent::SoloedTrackChanged { previous, current })
    }

    // ───────────────────────────────────────────────────────────────────
    // Lookup helpers
    // ───────────────────────────────────────────────────────────────────

    fn track_index(&self, id: TrackId) -> EngineResult<usize> {
        self.tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(EngineError::TrackNotFound(id))
    }

    fn track_mut(&mut self, id: TrackId) -> EngineResult<&mut TrackDef> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(EngineError::TrackNotFound(id))
    }

    fn effects_mut(&mut self, owner: EffectOwner) -> EngineResult<&mut EffectList> {
        match owner {
            EffectOwner::Master => Ok(&mut self.master_effects),
            EffectOwner::Track(id) => self.track_mut(id).map(|t| &mut t.effects),
        }
    }

    fn section_mut(
        &mut self,
        track_id: TrackId,
        section_id: SectionId,
    ) -> EngineResult<&mut SectionDef> {
        self.track_mut(track_id)?
            .section_mut(section_id)
            .ok_or(EngineError::SectionNotFound(section_id))
    }

    fn take_section(&mut self, track_id: TrackId, section_id: SectionId) -> EngineResult<SectionDef> {
        let track = self.track_mut(track_id)?;
        let index = track
            .sections
            .iter()
            .position(|s| s.id == section_id)
            .ok_or(EngineError::SectionNotFound(section_id))?;
        Ok(track.sections.remove(index))
    }

    fn owner_of_section(&self, section_id: SectionId) -> Option<TrackId> {
        self.tracks
            .iter()
            .find(|t| t.section(section_id).is_some())
            .map(|t| t.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EffectKind, EffectParam};

    fn project_with_tracks(n: usize) -> (Project, Vec<TrackId>) {
        let mut project = Project::new("Test");
        let ids = (0..n)
            .map(|i| project.add_track(format!("Track {i}")).0)
            .collect();
        (project, ids)
    }

    #[test]
    fn test_single_soloed_track() {
        let (mut project, ids) = project_with_tracks(2);

        project
            .apply(Command::SetTrackSolo {
                track_id: ids[0],
                soloed: true,
            })
            .unwrap();
        let events = project
            .apply(Command::SetTrackSolo {
                track_id: ids[1],
                soloed: true,
            })
            .unwrap();

        assert_eq!(project.soloed_track(), Some(ids[1]));
        assert!(!project.track(ids[0]).unwrap().is_soloed());
        assert!(events.contains(&ChangeEvent::TrackSoloChanged {
            track_id: ids[0],
            soloed: false
        }));
        assert_eq!(
            events.last(),
            Some(&ChangeEvent::SoloedTrackChanged {
                previous: Some(ids[0]),
                current: Some(ids[1]),
            })
        );
    }

    #[test]
    fn test_muting_soloed_track_clears_solo() {
        let (mut project, ids) = project_with_tracks(1);
        let track_id = ids[0];
        project
            .apply(Command::SetTrackSolo {
                track_id,
                soloed: true,
            })
            .unwrap();

        let events = project
            .apply(Command::SetTrackMute {
                track_id,
                muted: true,
            })
            .unwrap();

        let track = project.track(track_id).unwrap();
        assert!(track.is_muted());
        assert!(!track.is_soloed());
        assert_eq!(project.soloed_track(), None);
        // Mute is reported before the solo fallout.
        assert_eq!(
            events[0],
            ChangeEvent::TrackMuteChanged {
                track_id,
                muted: true
            }
        );
    }

    #[test]
    fn test_soloing_muted_track_clears_mute() {
        let (mut project, ids) = project_with_tracks(1);
        let track_id = ids[0];
        project
            .apply(Command::SetTrackMute {
                track_id,
                muted: true,
            })
            .unwrap();
        let events = project
            .apply(Command::SetTrackSolo {
                track_id,
                soloed: true,
            })
            .unwrap();

        assert!(!project.track(track_id).unwrap().is_muted());
        assert_eq!(project.soloed_track(), Some(track_id));
        assert_eq!(
            events[0],
            ChangeEvent::TrackMuteChanged {
                track_id,
                muted: false
            }
        );
    }

    #[test]
    fn test_remove_soloed_track_clears_solo() {
        let (mut project, ids) = project_with_tracks(2);
        project
            .apply(Command::SetTrackSolo {
                track_id: ids[1],
                soloed: true,
            })
            .unwrap();
        project.apply(Command::RemoveTrack { track_id: ids[1] }).unwrap();
        assert_eq!(project.soloed_track(), None);
        assert_eq!(project.tracks().len(), 1);
    }

    #[test]
    fn test_move_section_between_tracks() {
        let (mut project, ids) = project_with_tracks(2);
        let section = SectionDef::new(7, 1, 1000.0, 0, 1000, 0.0);
        project
            .apply(Command::AddSection {
                track_id: ids[0],
                section: section.clone(),
            })
            .unwrap();

        // Duplicate ids are rejected.
        assert!(
            project
                .apply(Command::AddSection {
                    track_id: ids[1],
                    section,
                })
                .is_err()
        );

        let events = project
            .apply(Command::MoveSection {
                section_id: 7,
                from_track: ids[0],
                to_track: ids[1],
            })
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(project.section(ids[1], 7).is_ok());
        assert!(project.section(ids[0], 7).is_err());
    }

    #[test]
    fn test_effect_commands() {
        let (mut project, ids) = project_with_tracks(1);
        let owner = EffectOwner::Track(ids[0]);
        for kind in [EffectKind::Lowpass, EffectKind::Gain] {
            project
                .apply(Command::AddEffect {
                    owner,
                    index: 0,
                    kind,
                })
                .unwrap();
        }
        let kinds: Vec<_> = project.effects(owner).unwrap().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EffectKind::Gain, EffectKind::Lowpass]);

        let events = project
            .apply(Command::SetEffectParam {
                owner,
                index: 1,
                param: EffectParam::Frequency,
                value: 50_000.0,
            })
            .unwrap();
        assert_eq!(
            events,
            vec![ChangeEvent::EffectParamChanged {
                owner,
                index: 1,
                param: EffectParam::Frequency,
                value: 22_050.0,
            }]
        );

        assert!(
            project
                .apply(Command::RemoveEffect {
                    owner: EffectOwner::Master,
                    index: 0,
                })
                .is_err()
        );
    }
}
