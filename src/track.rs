// src/track.rs
//
// Per-track subgraph.
//
// sections -> effect chain -> volume envelope -> gain -> pan -> analyser -> (master)
//                                                          \-> splitter -> channel analysers -> muted sink
//
// The track junction owns these junctions (by id) and gates its sections on
// the track's mute state. Solo is arbitrated by the audio graph, which simply
// never starts non-soloed tracks.

use std::collections::BTreeMap;

use crate::config::GraphConfig;
use crate::context::{ContextAccessor, RenderContext};
use crate::effect_factory::EffectRegistry;
use crate::error::EngineResult;
use crate::junction::{
    AnalyserJunction, ChainSignal, ChannelSplitterJunction, EffectChainJunction, GainJunction,
    JunctionArena, JunctionId, JunctionKind, PanJunction, SectionJunction, SectionStart,
    VolumeEnvelopeJunction,
};
use crate::state::{ControlPoint, EffectDef, EffectParam, SectionDef, SectionId, TrackDef, TrackId};
use crate::transport::PlaybackTiming;

/// The junctions realizing one track.
#[derive(Debug)]
pub struct TrackJunction {
    track_id: TrackId,

    effect_chain: JunctionId,
    envelope: JunctionId,
    gain: JunctionId,
    pan: JunctionId,
    splitter: JunctionId,
    channel_analysers: Vec<JunctionId>,
    analyser: JunctionId,

    /// Exactly one junction per section of the track.
    sections: BTreeMap<SectionId, JunctionId>,

    /// Live playback bookkeeping; offline renders never touch it.
    timing: PlaybackTiming,
    muted: bool,
    render_muted: bool,
    cleaned_up: bool,
}

impl TrackJunction {
    /// Build and wire the subgraph for `track`. Channel analysers drain into
    /// `muted_sink`.
    pub fn new(
        track: &TrackDef,
        arena: &mut JunctionArena,
        registry: &EffectRegistry,
        config: &GraphConfig,
        muted_sink: JunctionId,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<Self> {
        let channels = config.channels;
        let analyser_kind = || {
            JunctionKind::Analyser(AnalyserJunction {
                fft_size: config.analyser_fft_size,
                smoothing: config.analyser_smoothing,
            })
        };

        let effect_chain = arena.insert(
            JunctionKind::EffectChain(EffectChainJunction::default()),
            channels,
            ctx,
        )?;
        let envelope = arena.insert(
            JunctionKind::VolumeEnvelope(VolumeEnvelopeJunction::new(track.envelope.points())),
            channels,
            ctx,
        )?;
        let gain = arena.insert(JunctionKind::Gain(GainJunction { gain: track.gain }), channels, ctx)?;
        let pan = arena.insert(JunctionKind::Pan(PanJunction { pan: track.pan }), channels, ctx)?;
        let splitter = arena.insert(
            JunctionKind::ChannelSplitter(ChannelSplitterJunction::default()),
            channels,
            ctx,
        )?;
        let mut channel_analysers = Vec::with_capacity(channels);
        for _ in 0..channels {
            channel_analysers.push(arena.insert(analyser_kind(), channels, ctx)?);
        }
        let analyser = arena.insert(analyser_kind(), channels, ctx)?;

        // The chain needs its downstream neighbour before effects go in.
        arena.connect(effect_chain, envelope, ctx);
        arena.populate_chain(effect_chain, &track.effects, registry, ctx)?;
        arena.connect(envelope, gain, ctx);
        arena.connect(gain, pan, ctx);
        arena.tap(pan, splitter, ctx);
        for (channel, &meter) in channel_analysers.iter().enumerate() {
            arena.connect_channel(splitter, channel, meter, ctx);
            arena.connect(meter, muted_sink, ctx);
        }
        arena.connect(pan, analyser, ctx);

        let mut junction = Self {
            track_id: track.id,
            effect_chain,
            envelope,
            gain,
            pan,
            splitter,
            channel_analysers,
            analyser,
            sections: BTreeMap::new(),
            timing: PlaybackTiming::new(),
            muted: track.is_muted(),
            render_muted: config.render_muted_tracks,
            cleaned_up: false,
        };
        for section in &track.sections {
            junction.insert_section_junction(section.clone(), arena, ctx)?;
        }
        log::debug!(
            "track {}: built with {} effects and {} sections",
            track.id,
            track.effects.len(),
            track.sections.len()
        );
        Ok(junction)
    }

    // ───────────────────────────────────────────────────────────────────
    // Accessors
    // ───────────────────────────────────────────────────────────────────

    #[inline]
    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    #[inline]
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Whether the track was started live and not stopped since.
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.timing.is_playing()
    }

    #[inline]
    pub fn timing(&self) -> &PlaybackTiming {
        &self.timing
    }

    #[inline]
    pub fn effect_chain(&self) -> JunctionId {
        self.effect_chain
    }

    #[inline]
    pub fn envelope(&self) -> JunctionId {
        self.envelope
    }

    #[inline]
    pub fn gain(&self) -> JunctionId {
        self.gain
    }

    #[inline]
    pub fn pan(&self) -> JunctionId {
        self.pan
    }

    /// Analyser over the track's mixed output.
    #[inline]
    pub fn analyser(&self) -> JunctionId {
        self.analyser
    }

    /// One analyser per output channel.
    #[inline]
    pub fn channel_analysers(&self) -> &[JunctionId] {
        &self.channel_analysers
    }

    pub fn section_junction(&self, section_id: SectionId) -> Option<JunctionId> {
        self.sections.get(&section_id).copied()
    }

    #[inline]
    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }

    // ───────────────────────────────────────────────────────────────────
    // Wiring
    // ───────────────────────────────────────────────────────────────────

    /// Forward the track's output into `to`.
    pub fn connect(&self, to: JunctionId, arena: &mut JunctionArena, ctx: &mut dyn RenderContext) {
        arena.connect(self.analyser, to, ctx);
    }

    pub fn disconnect(&self, arena: &mut JunctionArena, ctx: &mut dyn RenderContext) {
        arena.disconnect(self.analyser, ctx);
    }

    // ───────────────────────────────────────────────────────────────────
    // Transport
    // ───────────────────────────────────────────────────────────────────

    /// Start the track at timeline position `time`.
    ///
    /// Live starts record timing and rebuild the envelope's automation even
    /// when muted, so unmuting later can resume. Sections are only scheduled
    /// when the track may sound. Returns each section's outcome.
    pub fn start(
        &mut self,
        arena: &mut JunctionArena,
        time: f64,
        access: &mut ContextAccessor<'_>,
    ) -> EngineResult<Vec<(SectionId, SectionStart)>> {
        let offline = access.is_offline();
        if !offline {
            let now = access.now();
            if let Err(err) = arena.restart_envelope(self.envelope, time, access.live()) {
                self.stop(arena, access.live());
                return Err(err);
            }
            // The envelope's primitive is new; relink the chain into it.
            arena.connect(self.effect_chain, self.envelope, access.live());
            self.timing.start(time, now);
        }

        let audible = !self.muted || (offline && self.render_muted);
        if !audible {
            log::debug!("track {}: muted, no sections scheduled", self.track_id);
            return Ok(Vec::new());
        }

        let sections: Vec<_> = self.sections.iter().map(|(&s, &j)| (s, j)).collect();
        let mut outcomes = Vec::with_capacity(sections.len());
        for (section_id, junction) in sections {
            match arena.start_section(junction, time, access) {
                Ok(outcome) => outcomes.push((section_id, outcome)),
                Err(err) => {
                    // A failed live start leaves nothing half-scheduled.
                    if !offline {
                        self.stop(arena, access.live());
                    }
                    return Err(err);
                }
            }
        }
        Ok(outcomes)
    }

    /// Stop every section and mark the track as not playing. The elapsed
    /// offset of the last start is kept.
    pub fn stop(&mut self, arena: &mut JunctionArena, ctx: &mut dyn RenderContext) {
        self.stop_sections(arena, ctx);
        self.timing.stop();
    }

    fn stop_sections(&self, arena: &mut JunctionArena, ctx: &mut dyn RenderContext) {
        for &junction in self.sections.values() {
            arena.stop_section(junction, ctx);
        }
    }

    /// Stop and start again at the recomputed position, if playing.
    ///
    /// Applies changes running primitives cannot absorb in place. Returns the
    /// resume position.
    pub fn soft_restart(
        &mut self,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<Option<f64>> {
        if !self.timing.is_playing() {
            return Ok(None);
        }
        let resume = self.timing.position_at(ctx.current_time());
        self.stop_sections(arena, ctx);
        let mut access = ContextAccessor::live_only(ctx);
        self.start(arena, resume, &mut access)?;
        log::debug!("track {}: restarted at {resume:.3}s", self.track_id);
        Ok(Some(resume))
    }

    fn follow(
        &mut self,
        signal: ChainSignal,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<()> {
        match signal {
            ChainSignal::ReconnectRequested => self.soft_restart(arena, ctx).map(|_| ()),
            ChainSignal::Unchanged => Ok(()),
        }
    }

    // ───────────────────────────────────────────────────────────────────
    // Mixer state
    // ───────────────────────────────────────────────────────────────────

    /// Muting stops the sections at once; unmuting while playing resumes.
    pub fn set_muted(
        &mut self,
        muted: bool,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<()> {
        if self.muted == muted {
            return Ok(());
        }
        self.muted = muted;
        if muted {
            self.stop_sections(arena, ctx);
            Ok(())
        } else {
            self.soft_restart(arena, ctx).map(|_| ())
        }
    }

    pub fn set_gain(&self, gain: f32, arena: &mut JunctionArena, ctx: &mut dyn RenderContext) {
        arena.set_gain(self.gain, gain, ctx);
    }

    pub fn set_pan(&self, pan: f32, arena: &mut JunctionArena, ctx: &mut dyn RenderContext) {
        arena.set_pan(self.pan, pan, ctx);
    }

    pub fn set_control_points(
        &mut self,
        points: &[ControlPoint],
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<()> {
        arena.set_envelope_points(self.envelope, points);
        self.soft_restart(arena, ctx).map(|_| ())
    }

    // ───────────────────────────────────────────────────────────────────
    // Sections
    // ───────────────────────────────────────────────────────────────────

    fn insert_section_junction(
        &mut self,
        section: SectionDef,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<JunctionId> {
        let section_id = section.id;
        let channels = arena.node(self.effect_chain).channels;
        let junction = arena.insert(JunctionKind::Section(SectionJunction::new(section)), channels, ctx)?;
        arena.connect(junction, self.effect_chain, ctx);
        if let Some(stale) = self.sections.insert(section_id, junction) {
            log::warn!("track {}: section {section_id} replaced", self.track_id);
            arena.remove(stale, ctx);
        }
        Ok(junction)
    }

    /// Add a junction for a new section. A playing, audible track starts it
    /// at the current position.
    pub fn add_section(
        &mut self,
        section: SectionDef,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<Option<SectionStart>> {
        let junction = self.insert_section_junction(section, arena, ctx)?;
        if !self.timing.is_playing() || self.muted {
            return Ok(None);
        }
        let position = self.timing.position_at(ctx.current_time());
        let mut access = ContextAccessor::live_only(ctx);
        arena.start_section(junction, position, &mut access).map(Some)
    }

    /// Stop and drop a section's junction. Returns whether it existed.
    pub fn remove_section(
        &mut self,
        section_id: SectionId,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> bool {
        match self.sections.remove(&section_id) {
            Some(junction) => {
                arena.stop_section(junction, ctx);
                arena.remove(junction, ctx);
                true
            }
            None => {
                log::warn!("track {}: no junction for section {section_id}", self.track_id);
                false
            }
        }
    }

    /// New begin time or playback rate for a section.
    pub fn update_section(
        &mut self,
        section: SectionDef,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<Option<SectionStart>> {
        match self.sections.get(&section.id) {
            Some(&junction) => arena.update_section(junction, section, ctx),
            None => {
                log::warn!("track {}: no junction for section {}", self.track_id, section.id);
                Ok(None)
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────
    // Effects
    // ───────────────────────────────────────────────────────────────────

    pub fn insert_effect(
        &mut self,
        effect: &EffectDef,
        index: usize,
        registry: &EffectRegistry,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<()> {
        let signal = arena.insert_effect(self.effect_chain, effect, index, registry, ctx)?;
        self.follow(signal, arena, ctx)
    }

    pub fn remove_effect(
        &mut self,
        index: usize,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<()> {
        let signal = arena.remove_effect(self.effect_chain, index, ctx)?;
        self.follow(signal, arena, ctx)
    }

    pub fn move_effect(
        &mut self,
        from: usize,
        to: usize,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<()> {
        let signal = arena.move_effect(self.effect_chain, from, to, ctx)?;
        self.follow(signal, arena, ctx)
    }

    pub fn set_effect_param(
        &self,
        index: usize,
        param: EffectParam,
        value: f32,
        arena: &mut JunctionArena,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<()> {
        arena.set_chain_effect_param(self.effect_chain, index, param, value, ctx)
    }

    // ───────────────────────────────────────────────────────────────────
    // Teardown
    // ───────────────────────────────────────────────────────────────────

    /// Stop, detach and drop every junction of the track. Idempotent.
    pub fn clean_up(&mut self, arena: &mut JunctionArena, ctx: &mut dyn RenderContext) {
        if self.cleaned_up {
            return;
        }
        self.stop(arena, ctx);
        for (_, junction) in std::mem::take(&mut self.sections) {
            arena.remove(junction, ctx);
        }
        let owned = [
            self.effect_chain,
            self.envelope,
            self.gain,
            self.pan,
            self.splitter,
            self.analyser,
        ];
        for junction in owned.into_iter().chain(self.channel_analysers.drain(..)) {
            arena.remove(junction, ctx);
        }
        self.cleaned_up = true;
        log::debug!("track {}: cleaned up", self.track_id);
    }
}
