//! The audio graph: master bus plus one track junction per track.
//!
//! ```text
//! tracks -> master gain -> master effects -> analyser -> destination
//!                                                \-> splitter -> channel analysers -> muted sink -> destination
//! ```
//!
//! The graph owns the junction arena, the live rendering context and the
//! playback timing of the whole project. It reacts to the project's change
//! events and coordinates starts so solo exclusivity holds.

use std::collections::BTreeMap;

use crate::config::GraphConfig;
use crate::context::{ContextAccessor, OfflineRender, RenderContext};
use crate::effect_factory::EffectRegistry;
use crate::error::{EngineError, EngineResult};
use crate::junction::{
    AnalyserJunction, ChainSignal, ChannelSplitterJunction, EffectChainJunction, GainJunction,
    JunctionArena, JunctionId, JunctionKind,
};
use crate::state::{ChangeEvent, EffectOwner, Project, TrackId};
use crate::track::TrackJunction;
use crate::transport::PlaybackTiming;

/// Master gain changes smaller than this are ignored.
const GAIN_EPSILON: f32 = 1e-6;

pub struct AudioGraph {
    config: GraphConfig,
    arena: JunctionArena,
    live: Box<dyn RenderContext>,
    registry: EffectRegistry,

    destination: JunctionId,
    /// Zero gain into the destination; keeps analysers pulled.
    muted_sink: JunctionId,
    master_gain: JunctionId,
    master_chain: JunctionId,
    analyser: JunctionId,
    splitter: JunctionId,
    channel_analysers: Vec<JunctionId>,

    tracks: BTreeMap<TrackId, TrackJunction>,
    soloed: Option<TrackId>,
    timing: PlaybackTiming,
    cleaned_up: bool,
}

impl AudioGraph {
    /// Build the graph for `project` with the standard effect constructors.
    pub fn new(
        project: &Project,
        live: impl RenderContext + 'static,
        config: GraphConfig,
    ) -> EngineResult<Self> {
        Self::with_registry(project, live, config, EffectRegistry::standard())
    }

    /// Build the graph with a custom effect registry. Fails if the registry
    /// cannot realize every effect kind.
    pub fn with_registry(
        project: &Project,
        live: impl RenderContext + 'static,
        config: GraphConfig,
        registry: EffectRegistry,
    ) -> EngineResult<Self> {
        registry.validate()?;

        let mut live: Box<dyn RenderContext> = Box::new(live);
        let ctx = live.as_mut();
        let mut arena = JunctionArena::new();
        let channels = config.channels;
        let analyser_kind = || {
            JunctionKind::Analyser(AnalyserJunction {
                fft_size: config.analyser_fft_size,
                smoothing: config.analyser_smoothing,
            })
        };

        let destination = arena.insert(JunctionKind::Destination, channels, ctx)?;
        let muted_sink = arena.insert(JunctionKind::Gain(GainJunction { gain: 0.0 }), channels, ctx)?;
        arena.connect(muted_sink, destination, ctx);

        let master_gain = arena.insert(JunctionKind::Gain(GainJunction { gain: 1.0 }), channels, ctx)?;
        let master_chain = arena.insert(
            JunctionKind::EffectChain(EffectChainJunction::default()),
            channels,
            ctx,
        )?;
        let analyser = arena.insert(analyser_kind(), channels, ctx)?;

        // The chain must have its downstream before anything connects into it.
        arena.connect(master_chain, analyser, ctx);
        arena.populate_chain(master_chain, project.master_effects(), &registry, ctx)?;
        arena.connect(master_gain, master_chain, ctx);

        let splitter = arena.insert(
            JunctionKind::ChannelSplitter(ChannelSplitterJunction::default()),
            channels,
            ctx,
        )?;
        arena.tap(analyser, splitter, ctx);
        let mut channel_analysers = Vec::with_capacity(channels);
        for channel in 0..channels {
            let meter = arena.insert(analyser_kind(), channels, ctx)?;
            arena.connect_channel(splitter, channel, meter, ctx);
            arena.connect(meter, muted_sink, ctx);
            channel_analysers.push(meter);
        }
        arena.connect(analyser, destination, ctx);

        let mut graph = Self {
            config,
            arena,
            live,
            registry,
            destination,
            muted_sink,
            master_gain,
            master_chain,
            analyser,
            splitter,
            channel_analysers,
            tracks: BTreeMap::new(),
            soloed: project.soloed_track(),
            timing: PlaybackTiming::new(),
            cleaned_up: false,
        };
        for track in project.tracks() {
            graph.add_track_junction(project, track.id)?;
        }
        log::debug!(
            "audio graph: {} channels, {} tracks, {} junctions",
            channels,
            graph.tracks.len(),
            graph.arena.len()
        );
        Ok(graph)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Transport
    // ═══════════════════════════════════════════════════════════════════

    /// Start every eligible track at timeline position `time`.
    ///
    /// With `offline`, everything is mirrored and scheduled into that render
    /// and the live transport state is left alone.
    pub fn start(&mut self, time: f64, offline: Option<&mut OfflineRender>) -> EngineResult<()> {
        let is_offline = offline.is_some();
        if !is_offline {
            let now = self.live.current_time();
            self.timing.start(time, now);
            log::info!("audio graph: start at {time:.3}s");
        } else {
            log::info!("audio graph: offline render from {time:.3}s");
        }

        // Master chain surgery may have left its exit stale.
        self.arena
            .connect(self.master_chain, self.analyser, self.live.as_mut());

        let started = self.start_tracks(time, offline);
        if started.is_err() && !is_offline {
            self.stop_all_start_nodes();
        }
        started
    }

    fn start_tracks(&mut self, time: f64, offline: Option<&mut OfflineRender>) -> EngineResult<()> {
        let mut access = ContextAccessor::new(self.live.as_mut(), offline);
        for track in self.tracks.values_mut() {
            Self::maybe_start_track(
                track,
                &mut self.arena,
                self.soloed,
                self.timing.is_playing(),
                time,
                &mut access,
            )?;
        }
        Ok(())
    }

    /// Render the whole project into `offline` from the beginning.
    pub fn start_for_offline_rendering(&mut self, offline: &mut OfflineRender) -> EngineResult<()> {
        self.start(0.0, Some(offline))
    }

    /// Stop every track.
    pub fn stop_all_start_nodes(&mut self) {
        for track in self.tracks.values_mut() {
            track.stop(&mut self.arena, self.live.as_mut());
        }
        if self.timing.is_playing() {
            log::info!("audio graph: stop at {:.3}s", self.current_position());
        }
        self.timing.stop();
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.timing.is_playing()
    }

    /// Timeline position of the live transport.
    pub fn current_position(&self) -> f64 {
        self.timing.position_at(self.live.current_time())
    }

    fn maybe_start_track(
        track: &mut TrackJunction,
        arena: &mut JunctionArena,
        soloed: Option<TrackId>,
        playing: bool,
        time: f64,
        access: &mut ContextAccessor<'_>,
    ) -> EngineResult<()> {
        if !playing && !access.is_offline() {
            return Ok(());
        }
        if soloed.is_some_and(|id| id != track.track_id()) {
            return Ok(());
        }
        // Muted tracks start too: they may be unmuted during playback.
        track.start(arena, time, access).map(|_| ())
    }

    /// Stop and start again at the current position, if playing.
    fn restart_at_current_time(&mut self) -> EngineResult<()> {
        if !self.timing.is_playing() {
            return Ok(());
        }
        let resume = self.current_position();
        self.stop_all_start_nodes();
        log::info!("audio graph: restart at {resume:.3}s");
        self.start(resume, None)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Project changes
    // ═══════════════════════════════════════════════════════════════════

    /// React to one change event. `project` must already reflect it.
    pub fn apply(&mut self, event: &ChangeEvent, project: &Project) -> EngineResult<()> {
        self.dispatch(event, project).inspect_err(|err| {
            log::error!("audio graph: failed to apply {event:?}: {err}");
        })
    }

    /// React to events in order, stopping at the first failure.
    pub fn apply_all(&mut self, events: &[ChangeEvent], project: &Project) -> EngineResult<()> {
        events.iter().try_for_each(|event| self.apply(event, project))
    }

    fn dispatch(&mut self, event: &ChangeEvent, project: &Project) -> EngineResult<()> {
        let ctx = self.live.as_mut();
        let arena = &mut self.arena;
        match *event {
            ChangeEvent::TrackAdded { track_id } => {
                self.add_track_junction(project, track_id)?;
                let position = self.current_position();
                let mut access = ContextAccessor::live_only(self.live.as_mut());
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    Self::maybe_start_track(
                        track,
                        &mut self.arena,
                        self.soloed,
                        self.timing.is_playing(),
                        position,
                        &mut access,
                    )?;
                }
            }
            ChangeEvent::TrackRemoved { track_id } => match self.tracks.remove(&track_id) {
                Some(mut track) => track.clean_up(arena, ctx),
                None => log::warn!("audio graph: no junction for removed track {track_id}"),
            },
            ChangeEvent::TrackMuteChanged { track_id, muted } => {
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    track.set_muted(muted, arena, ctx)?;
                }
            }
            // Solo arbitration arrives as SoloedTrackChanged.
            ChangeEvent::TrackSoloChanged { .. } => {}
            ChangeEvent::SoloedTrackChanged { current, .. } => {
                self.soloed = current;
                self.restart_at_current_time()?;
            }
            ChangeEvent::TrackGainChanged { track_id, gain } => {
                if let Some(track) = self.tracks.get(&track_id) {
                    track.set_gain(gain, arena, ctx);
                }
            }
            ChangeEvent::TrackPanChanged { track_id, pan } => {
                if let Some(track) = self.tracks.get(&track_id) {
                    track.set_pan(pan, arena, ctx);
                }
            }
            ChangeEvent::SectionAdded {
                track_id,
                section_id,
            } => {
                let section = project.section(track_id, section_id)?.clone();
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    track.add_section(section, arena, ctx)?;
                }
            }
            ChangeEvent::SectionRemoved {
                track_id,
                section_id,
            } => {
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    track.remove_section(section_id, arena, ctx);
                }
            }
            ChangeEvent::SectionTimingChanged {
                track_id,
                section_id,
            } => {
                let section = project.section(track_id, section_id)?.clone();
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    track.update_section(section, arena, ctx)?;
                }
            }
            ChangeEvent::EffectAdded { owner, index } => {
                let effects = project.effects(owner)?;
                let len = effects.len();
                let effect = effects
                    .get(index)
                    .ok_or(EngineError::EffectIndexOutOfRange { index, len })?;
                match owner {
                    EffectOwner::Master => {
                        let signal = arena.insert_effect(
                            self.master_chain,
                            effect,
                            index,
                            &self.registry,
                            ctx,
                        )?;
                        self.follow_master(signal)?;
                    }
                    EffectOwner::Track(track_id) => {
                        if let Some(track) = self.tracks.get_mut(&track_id) {
                            track.insert_effect(effect, index, &self.registry, arena, ctx)?;
                        }
                    }
                }
            }
            ChangeEvent::EffectRemoved { owner, index } => match owner {
                EffectOwner::Master => {
                    let signal = arena.remove_effect(self.master_chain, index, ctx)?;
                    self.follow_master(signal)?;
                }
                EffectOwner::Track(track_id) => {
                    if let Some(track) = self.tracks.get_mut(&track_id) {
                        track.remove_effect(index, arena, ctx)?;
                    }
                }
            },
            ChangeEvent::EffectMoved { owner, from, to } => match owner {
                EffectOwner::Master => {
                    let signal = arena.move_effect(self.master_chain, from, to, ctx)?;
                    self.follow_master(signal)?;
                }
                EffectOwner::Track(track_id) => {
                    if let Some(track) = self.tracks.get_mut(&track_id) {
                        track.move_effect(from, to, arena, ctx)?;
                    }
                }
            },
            ChangeEvent::EffectParamChanged {
                owner,
                index,
                param,
                value,
            } => match owner {
                EffectOwner::Master => {
                    arena.set_chain_effect_param(self.master_chain, index, param, value, ctx)?;
                }
                EffectOwner::Track(track_id) => {
                    if let Some(track) = self.tracks.get(&track_id) {
                        track.set_effect_param(index, param, value, arena, ctx)?;
                    }
                }
            },
            ChangeEvent::ControlPointsChanged { track_id } => {
                let points = project.control_points(track_id)?;
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    track.set_control_points(points, arena, ctx)?;
                }
            }
        }
        Ok(())
    }

    fn add_track_junction(&mut self, project: &Project, track_id: TrackId) -> EngineResult<()> {
        let def = project.track(track_id)?;
        let ctx = self.live.as_mut();
        let track = TrackJunction::new(
            def,
            &mut self.arena,
            &self.registry,
            &self.config,
            self.muted_sink,
            ctx,
        )?;
        track.connect(self.master_gain, &mut self.arena, ctx);
        if let Some(mut stale) = self.tracks.insert(track_id, track) {
            log::warn!("audio graph: track {track_id} replaced");
            stale.clean_up(&mut self.arena, ctx);
        }
        Ok(())
    }

    /// Relink the master gain into a rebuilt master chain.
    fn follow_master(&mut self, signal: ChainSignal) -> EngineResult<()> {
        match signal {
            ChainSignal::ReconnectRequested => {
                self.arena
                    .connect(self.master_gain, self.master_chain, self.live.as_mut());
                self.restart_at_current_time()
            }
            ChainSignal::Unchanged => Ok(()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Master bus and accessors
    // ═══════════════════════════════════════════════════════════════════

    /// Set the master gain. Returns whether it changed.
    pub fn set_master_gain(&mut self, gain: f32) -> bool {
        if (gain - self.master_gain()).abs() < GAIN_EPSILON {
            return false;
        }
        self.arena
            .set_gain(self.master_gain, gain, self.live.as_mut());
        true
    }

    pub fn master_gain(&self) -> f32 {
        self.arena.gain(self.master_gain).unwrap_or(1.0)
    }

    /// Analyser over the master output.
    #[inline]
    pub fn master_analyser(&self) -> JunctionId {
        self.analyser
    }

    /// One master analyser per output channel.
    #[inline]
    pub fn channel_analysers(&self) -> &[JunctionId] {
        &self.channel_analysers
    }

    #[inline]
    pub fn destination(&self) -> JunctionId {
        self.destination
    }

    #[inline]
    pub fn master_chain(&self) -> JunctionId {
        self.master_chain
    }

    pub fn frequency_bin_count(&self, analyser: JunctionId) -> usize {
        self.arena.frequency_bin_count(analyser, self.live.as_ref())
    }

    pub fn read_frequency_data(&self, analyser: JunctionId, out: &mut [u8]) -> bool {
        self.arena
            .read_frequency_data(analyser, self.live.as_ref(), out)
    }

    pub fn read_time_domain_data(&self, analyser: JunctionId, out: &mut [u8]) -> bool {
        self.arena
            .read_time_domain_data(analyser, self.live.as_ref(), out)
    }

    pub fn sample_rate(&self) -> f64 {
        self.live.sample_rate()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn track(&self, track_id: TrackId) -> Option<&TrackJunction> {
        self.tracks.get(&track_id)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackJunction> {
        self.tracks.values()
    }

    pub fn junctions(&self) -> &JunctionArena {
        &self.arena
    }

    pub fn context(&self) -> &dyn RenderContext {
        self.live.as_ref()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Teardown
    // ═══════════════════════════════════════════════════════════════════

    /// Stop playback and release every junction. Idempotent.
    pub fn clean_up(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.stop_all_start_nodes();
        let ctx = self.live.as_mut();
        for (_, mut track) in std::mem::take(&mut self.tracks) {
            track.clean_up(&mut self.arena, ctx);
        }
        let master = [
            self.master_gain,
            self.master_chain,
            self.analyser,
            self.splitter,
            self.muted_sink,
            self.destination,
        ];
        for junction in master.into_iter().chain(self.channel_analysers.drain(..)) {
            self.arena.remove(junction, ctx);
        }
        self.cleaned_up = true;
        log::debug!("audio graph: cleaned up");
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        self.clean_up();
    }
}

impl std::fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGraph")
            .field("config", &self.config)
            .field("tracks", &self.tracks.keys().collect::<Vec<_>>())
            .field("soloed", &self.soloed)
            .field("timing", &self.timing)
            .field("junctions", &self.arena.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FilterType, HeadlessContext, PrimitiveKind};
    use crate::state::{Command, EffectKind, SectionDef};

    struct Session {
        ctx: HeadlessContext,
        project: Project,
        graph: AudioGraph,
    }

    impl Session {
        fn new(tracks: usize) -> Self {
            let mut project = Project::new("Mix");
            for i in 0..tracks {
                let (track_id, _) = project.add_track(format!("Track {i}"));
                let section_id = track_id * 100;
                // Buffer id mirrors the track id so sources can be told apart.
                let section = SectionDef::new(section_id, track_id, 1000.0, 0, 10_000, 0.0);
                project
                    .apply(Command::AddSection { track_id, section })
                    .unwrap();
            }
            let ctx = HeadlessContext::default();
            let graph = AudioGraph::new(&project, ctx.clone(), GraphConfig::default()).unwrap();
            Session {
                ctx,
                project,
                graph,
            }
        }

        fn run(&mut self, command: Command) {
            let events = self.project.apply(command).unwrap();
            self.graph.apply_all(&events, &self.project).unwrap();
        }

        fn playing_buffers(&self) -> Vec<u32> {
            let mut buffers: Vec<_> = self
                .ctx
                .scheduled_sources()
                .into_iter()
                .map(|(_, buffer, _)| buffer)
                .collect();
            buffers.sort();
            buffers
        }
    }

    #[test]
    fn test_sources_reach_destination() {
        let mut s = Session::new(2);
        s.graph.start(0.0, None).unwrap();

        let dest = s.graph.junctions().live_entry(s.graph.destination());
        let sources = s.ctx.scheduled_sources();
        assert_eq!(sources.len(), 2);
        for (source, _, _) in sources {
            assert!(s.ctx.reaches(source, dest));
        }
    }

    #[test]
    fn test_master_analysers_are_tapped() {
        let s = Session::new(0);
        let arena = s.graph.junctions();
        let analyser = arena.live_entry(s.graph.master_analyser());
        for &meter in s.graph.channel_analysers() {
            assert!(s.ctx.reaches(analyser, arena.live_entry(meter)));
        }
        assert_eq!(s.graph.channel_analysers().len(), 2);
        assert_eq!(s.graph.frequency_bin_count(s.graph.master_analyser()), 256);
    }

    #[test]
    fn test_solo_exclusivity() {
        let mut s = Session::new(3);
        s.run(Command::SetTrackSolo {
            track_id: 2,
            soloed: true,
        });
        s.graph.start(0.0, None).unwrap();
        assert_eq!(s.playing_buffers(), vec![2]);

        // Soloing another track while playing restarts with only that one.
        s.ctx.advance(1.0);
        s.run(Command::SetTrackSolo {
            track_id: 3,
            soloed: true,
        });
        assert_eq!(s.playing_buffers(), vec![3]);
        assert!(s.graph.is_playing());

        s.run(Command::SetTrackSolo {
            track_id: 3,
            soloed: false,
        });
        assert_eq!(s.playing_buffers(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unsolo_skips_muted_tracks() {
        let mut s = Session::new(2);
        s.run(Command::SetTrackMute {
            track_id: 1,
            muted: true,
        });
        s.run(Command::SetTrackSolo {
            track_id: 2,
            soloed: true,
        });
        s.graph.start(0.0, None).unwrap();
        s.run(Command::SetTrackSolo {
            track_id: 2,
            soloed: false,
        });
        assert_eq!(s.playing_buffers(), vec![2]);
    }

    #[test]
    fn test_stop_and_position() {
        let mut s = Session::new(1);
        s.graph.start(2.0, None).unwrap();
        s.ctx.advance(1.5);
        assert_eq!(s.graph.current_position(), 3.5);

        s.graph.stop_all_start_nodes();
        assert!(!s.graph.is_playing());
        assert!(s.playing_buffers().is_empty());
        assert_eq!(s.graph.current_position(), 2.0);
    }

    #[test]
    fn test_offline_render_respects_mute_and_solo() {
        let mut s = Session::new(3);
        s.run(Command::SetTrackMute {
            track_id: 1,
            muted: true,
        });

        let offline_ctx = HeadlessContext::default();
        let mut offline = OfflineRender::new(offline_ctx.clone());
        s.graph.start_for_offline_rendering(&mut offline).unwrap();

        let mut rendered: Vec<_> = offline_ctx
            .scheduled_sources()
            .into_iter()
            .map(|(_, buffer, _)| buffer)
            .collect();
        rendered.sort();
        assert_eq!(rendered, vec![2, 3]);
        assert!(!s.graph.is_playing());
        assert!(s.playing_buffers().is_empty());

        // Offline chains mirror the live topology into the offline context.
        let dest = offline.mirror_of(s.graph.destination()).unwrap();
        assert_eq!(offline_ctx.primitive(dest).unwrap().kind, PrimitiveKind::Destination);
        for (source, _, _) in offline_ctx.scheduled_sources() {
            assert!(offline_ctx.reaches(source, dest));
        }

        s.run(Command::SetTrackSolo {
            track_id: 3,
            soloed: true,
        });
        let solo_ctx = HeadlessContext::default();
        let mut solo_render = OfflineRender::new(solo_ctx.clone());
        s.graph.start_for_offline_rendering(&mut solo_render).unwrap();
        let buffers: Vec<_> = solo_ctx
            .scheduled_sources()
            .into_iter()
            .map(|(_, buffer, _)| buffer)
            .collect();
        assert_eq!(buffers, vec![3]);
    }

    #[test]
    fn test_master_gain_threshold() {
        let mut s = Session::new(0);
        assert_eq!(s.graph.master_gain(), 1.0);
        assert!(!s.graph.set_master_gain(1.0 + 1e-7));
        assert!(s.graph.set_master_gain(0.5));
        assert_eq!(s.graph.master_gain(), 0.5);
    }

    #[test]
    fn test_master_effect_relinks_master_gain() {
        let mut s = Session::new(1);
        s.graph.start(0.0, None).unwrap();
        s.run(Command::AddEffect {
            owner: EffectOwner::Master,
            index: 0,
            kind: EffectKind::DynamicCompressor,
        });

        let arena = s.graph.junctions();
        let compressor = arena.chain_effects(s.graph.master_chain())[0];
        let gain = arena.get(s.graph.master_gain).unwrap().primitive().unwrap();
        assert_eq!(s.ctx.outputs(gain), vec![arena.live_entry(compressor)]);
        assert_eq!(s.playing_buffers(), vec![1]);

        let dest = arena.live_entry(s.graph.destination());
        for (source, _, _) in s.ctx.scheduled_sources() {
            assert!(s.ctx.reaches(source, dest));
        }
    }

    #[test]
    fn test_track_added_while_playing_starts() {
        let mut s = Session::new(1);
        s.graph.start(0.0, None).unwrap();
        s.ctx.advance(1.0);

        s.run(Command::AddTrack {
            name: "Late".into(),
        });
        let section = SectionDef::new(900, 9, 1000.0, 0, 10_000, 0.0);
        s.run(Command::AddSection {
            track_id: 2,
            section,
        });
        assert_eq!(s.playing_buffers(), vec![1, 9]);
        assert!(s.graph.track(2).unwrap().is_playing());
    }

    #[test]
    fn test_track_removed_releases_junctions() {
        let mut s = Session::new(2);
        s.graph.start(0.0, None).unwrap();
        let before = s.graph.junctions().len();

        s.run(Command::RemoveTrack { track_id: 1 });
        assert!(s.graph.track(1).is_none());
        assert_eq!(s.playing_buffers(), vec![2]);
        assert!(s.graph.junctions().len() < before);
    }

    #[test]
    fn test_incomplete_registry_is_rejected() {
        let project = Project::new("Empty");
        let result = AudioGraph::with_registry(
            &project,
            HeadlessContext::default(),
            GraphConfig::default(),
            EffectRegistry::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_drop_releases_live_primitives() {
        let s = Session::new(2);
        let ctx = s.ctx.clone();
        assert!(!ctx.live_primitives().is_empty());
        drop(s);
        assert!(ctx.live_primitives().is_empty());
    }

    #[test]
    fn test_new_surfaces_denied_primitive() {
        let ctx = HeadlessContext::default();
        ctx.deny(PrimitiveKind::Analyser);
        let result = AudioGraph::new(&Project::new("Denied"), ctx, GraphConfig::default());
        assert!(matches!(
            result,
            Err(EngineError::PrimitiveCreation {
                kind: PrimitiveKind::Analyser,
                ..
            })
        ));
    }

    #[test]
    fn test_failed_start_rolls_back() {
        let mut s = Session::new(2);
        // Track 1 schedules its source before track 2 fails.
        s.ctx.deny(PrimitiveKind::BufferSource(2));

        assert!(s.graph.start(0.0, None).is_err());
        assert!(!s.graph.is_playing());
        assert!(s.playing_buffers().is_empty());
        assert!(s.graph.tracks().all(|track| !track.is_playing()));

        // Nothing restarts off a transport that never started.
        s.run(Command::SetTrackSolo {
            track_id: 1,
            soloed: true,
        });
        assert!(s.playing_buffers().is_empty());
    }

    #[test]
    fn test_failed_offline_render_leaves_live_playback() {
        let mut s = Session::new(1);
        s.graph.start(0.0, None).unwrap();

        let offline_ctx = HeadlessContext::default();
        offline_ctx.deny(PrimitiveKind::Gain);
        let mut offline = OfflineRender::new(offline_ctx.clone());
        assert!(s.graph.start_for_offline_rendering(&mut offline).is_err());

        assert!(offline_ctx.scheduled_sources().is_empty());
        assert!(s.graph.is_playing());
        assert_eq!(s.playing_buffers(), vec![1]);
    }

    #[test]
    fn test_failed_effect_insert_keeps_playing() {
        let mut s = Session::new(1);
        s.graph.start(0.0, None).unwrap();
        s.ctx.deny(PrimitiveKind::BiquadFilter(FilterType::Lowpass));

        let events = s
            .project
            .apply(Command::AddEffect {
                owner: EffectOwner::Track(1),
                index: 0,
                kind: EffectKind::Lowpass,
            })
            .unwrap();
        let result = s.graph.apply_all(&events, &s.project);

        assert!(matches!(result, Err(EngineError::PrimitiveCreation { .. })));
        let chain = s.graph.track(1).unwrap().effect_chain();
        assert!(s.graph.junctions().chain_effects(chain).is_empty());
        assert!(s.graph.is_playing());
        assert_eq!(s.playing_buffers(), vec![1]);
    }

    #[test]
    fn test_offline_render_skips_meters() {
        let mut s = Session::new(1);
        let offline_ctx = HeadlessContext::default();
        let mut offline = OfflineRender::new(offline_ctx.clone());
        s.graph.start_for_offline_rendering(&mut offline).unwrap();

        assert!(offline.mirror_of(s.graph.master_analyser()).is_some());
        let track = s.graph.track(1).unwrap();
        for &meter in s.graph.channel_analysers().iter().chain(track.channel_analysers()) {
            assert!(offline.mirror_of(meter).is_none());
        }
        assert!(offline_ctx
            .live_primitives()
            .iter()
            .all(|&id| offline_ctx.primitive(id).unwrap().kind != PrimitiveKind::ChannelSplitter));
    }
}
