// src/junction/section.rs
//
// Section junctions: one schedulable buffer source per placed region.

use super::{JunctionArena, JunctionId, JunctionKind};
use crate::context::{ContextAccessor, Param, PrimitiveId, PrimitiveKind, PrimitiveSpec, RenderContext};
use crate::error::EngineResult;
use crate::state::SectionDef;
use crate::transport::PlaybackTiming;

/// A placed region of audio. Owns at most one live source at a time.
#[derive(Debug, Clone)]
pub struct SectionJunction {
    pub(crate) section: SectionDef,
    pub(crate) source: Option<PrimitiveId>,
    pub(crate) timing: PlaybackTiming,
}

impl SectionJunction {
    pub fn new(section: SectionDef) -> Self {
        Self {
            section,
            source: None,
            timing: PlaybackTiming::new(),
        }
    }

    #[inline]
    pub fn section(&self) -> &SectionDef {
        &self.section
    }
}

/// When and what part of the buffer a source plays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionSchedule {
    /// Seconds from now until the source starts.
    pub delay: f64,
    /// Buffer offset, in buffer seconds.
    pub offset: f64,
    /// Length of the window to play, in buffer seconds.
    pub duration: f64,
}

/// Where a section stands relative to timeline position `time`, or `None`
/// once the region has ended.
pub fn schedule_section(section: &SectionDef, time: f64) -> Option<SectionSchedule> {
    if time >= section.end_time() {
        return None;
    }
    let base = section.begin_sample as f64 / section.sample_rate;
    let window = section.window_duration();

    if time < section.begin_time {
        return Some(SectionSchedule {
            delay: section.begin_time - time,
            offset: base,
            duration: window,
        });
    }

    let skipped = (time - section.begin_time) * section.playback_rate;
    Some(SectionSchedule {
        delay: 0.0,
        offset: base + skipped,
        duration: window - skipped,
    })
}

/// Outcome of starting a section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SectionStart {
    /// Playing from `offset` buffer seconds right away.
    Immediate { offset: f64 },
    /// Scheduled to begin `delay` seconds from now.
    Deferred { delay: f64 },
    /// The region ended before the start position.
    Elapsed,
    /// No downstream junction to play into.
    Unconnected,
}

impl SectionStart {
    /// Whether the region covers the start position.
    #[inline]
    pub fn is_started(&self) -> bool {
        matches!(self, SectionStart::Immediate { .. })
    }

    /// Whether a source was scheduled at all.
    #[inline]
    pub fn is_scheduled(&self) -> bool {
        matches!(self, SectionStart::Immediate { .. } | SectionStart::Deferred { .. })
    }
}

impl JunctionArena {
    fn section(&self, id: JunctionId) -> &SectionJunction {
        match &self.node(id).kind {
            JunctionKind::Section(section) => section,
            other => panic!("junction {id:?} is a {}, not a section", other.name()),
        }
    }

    fn section_mut(&mut self, id: JunctionId) -> &mut SectionJunction {
        match &mut self.node_mut(id).kind {
            JunctionKind::Section(section) => section,
            other => panic!("junction {id:?} is a {}, not a section", other.name()),
        }
    }

    pub fn section_def(&self, id: JunctionId) -> &SectionDef {
        &self.section(id).section
    }

    /// Whether the section was started live and not stopped since.
    pub fn section_is_playing(&self, id: JunctionId) -> bool {
        self.section(id).timing.is_playing()
    }

    /// Schedule the section for timeline position `time`.
    ///
    /// Live starts record timing and keep the source so it can be stopped.
    /// Offline starts leave the junction untouched and schedule into the
    /// offline context.
    pub fn start_section(
        &mut self,
        id: JunctionId,
        time: f64,
        access: &mut ContextAccessor<'_>,
    ) -> EngineResult<SectionStart> {
        let live = !access.is_offline();
        let now = access.now();
        if live {
            if let Some(old) = self.section_mut(id).source.take() {
                access.live().stop_source(old);
                access.live().release(old);
            }
            self.section_mut(id).timing.start(time, now);
        }

        let node = self.node(id);
        let (channels, next) = (node.channels, node.next);
        let section = &self.section(id).section;
        let Some(schedule) = schedule_section(section, time) else {
            log::trace!("section {id:?}: ended before {time:.3}s");
            return Ok(SectionStart::Elapsed);
        };
        let Some(next) = next else {
            log::warn!("section {id:?} has no downstream junction; not scheduled");
            return Ok(SectionStart::Unconnected);
        };
        let spec = PrimitiveSpec::new(PrimitiveKind::BufferSource(section.buffer), channels)
            .with(Param::PlaybackRate, section.playback_rate as f32);

        let entry = self.obtain_entry(next, access)?;
        let ctx = access.context();
        let source = ctx.build(&spec)?;
        ctx.connect(source, entry);
        ctx.start_source(source, now + schedule.delay, schedule.offset, schedule.duration);
        if live {
            self.section_mut(id).source = Some(source);
        }

        let outcome = if schedule.delay > 0.0 {
            SectionStart::Deferred {
                delay: schedule.delay,
            }
        } else {
            SectionStart::Immediate {
                offset: schedule.offset,
            }
        };
        log::debug!("section {id:?}: {outcome:?} at {time:.3}s");
        Ok(outcome)
    }

    /// Stop and release the live source. No-op when not playing.
    pub fn stop_section(&mut self, id: JunctionId, ctx: &mut dyn RenderContext) {
        let section = self.section_mut(id);
        section.timing.stop();
        if let Some(source) = section.source.take() {
            ctx.stop_source(source);
            ctx.release(source);
        }
    }

    /// Replace the section's placement. A playing section restarts at its
    /// recomputed position; the outcome of that restart is returned.
    pub fn update_section(
        &mut self,
        id: JunctionId,
        section: SectionDef,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<Option<SectionStart>> {
        let timing = self.section(id).timing;
        self.section_mut(id).section = section;
        if !timing.is_playing() {
            return Ok(None);
        }

        let resume = timing.position_at(ctx.current_time());
        self.stop_section(id, ctx);
        let mut access = ContextAccessor::live_only(ctx);
        self.start_section(id, resume, &mut access).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HeadlessContext, OfflineRender};
    use crate::junction::GainJunction;

    // 1 kHz buffer so sample counts read as milliseconds.
    fn section(begin_time: f64, seconds: u64) -> SectionDef {
        SectionDef::new(1, 7, 1000.0, 0, seconds * 1000, begin_time)
    }

    fn setup(def: SectionDef) -> (HeadlessContext, JunctionArena, JunctionId, JunctionId) {
        let ctx = HeadlessContext::default();
        let mut live = ctx.clone();
        let mut arena = JunctionArena::new();
        let id = arena
            .insert(JunctionKind::Section(SectionJunction::new(def)), 2, &mut live)
            .unwrap();
        let sink = arena
            .insert(JunctionKind::Gain(GainJunction { gain: 1.0 }), 2, &mut live)
            .unwrap();
        arena.connect(id, sink, &mut live);
        (ctx, arena, id, sink)
    }

    #[test]
    fn test_schedule_inside_region() {
        let mut def = section(2.0, 4);
        def.begin_sample = 500;
        def.end_sample = 4500;
        let schedule = schedule_section(&def, 3.0).unwrap();
        assert_eq!(schedule.delay, 0.0);
        assert_eq!(schedule.offset, 1.5);
        assert_eq!(schedule.duration, 3.0);
    }

    #[test]
    fn test_schedule_respects_playback_rate() {
        let mut def = section(0.0, 4);
        def.playback_rate = 2.0;
        // Timeline region is [0, 2).
        let schedule = schedule_section(&def, 1.0).unwrap();
        assert_eq!(schedule.offset, 2.0);
        assert_eq!(schedule.duration, 2.0);
        assert!(schedule_section(&def, 2.0).is_none());
    }

    #[test]
    fn test_schedule_before_region_is_deferred() {
        let schedule = schedule_section(&section(5.0, 5), 3.0).unwrap();
        assert_eq!(schedule.delay, 2.0);
        assert_eq!(schedule.offset, 0.0);
        assert_eq!(schedule.duration, 5.0);
    }

    #[test]
    fn test_start_connects_source_to_downstream() {
        let (ctx, mut arena, id, sink) = setup(section(0.0, 5));
        ctx.set_time(10.0);
        let mut live = ctx.clone();

        let outcome = {
            let mut access = ContextAccessor::live_only(&mut live);
            arena.start_section(id, 3.0, &mut access).unwrap()
        };
        assert_eq!(outcome, SectionStart::Immediate { offset: 3.0 });
        assert!(outcome.is_started());
        assert!(arena.section_is_playing(id));

        let sources = ctx.scheduled_sources();
        assert_eq!(sources.len(), 1);
        let (source, buffer, schedule) = sources[0];
        assert_eq!(buffer, 7);
        assert_eq!(schedule.when, 10.0);
        assert_eq!(schedule.duration, 2.0);
        assert_eq!(ctx.outputs(source), vec![arena.live_entry(sink)]);
    }

    #[test]
    fn test_start_after_end_is_elapsed() {
        let (ctx, mut arena, id, _) = setup(section(0.0, 5));
        let mut live = ctx.clone();
        let mut access = ContextAccessor::live_only(&mut live);

        let outcome = arena.start_section(id, 5.0, &mut access).unwrap();
        assert_eq!(outcome, SectionStart::Elapsed);
        assert!(!outcome.is_scheduled());
        assert!(ctx.scheduled_sources().is_empty());
    }

    #[test]
    fn test_unconnected_section_schedules_nothing() {
        let ctx = HeadlessContext::default();
        let mut live = ctx.clone();
        let mut arena = JunctionArena::new();
        let id = arena
            .insert(JunctionKind::Section(SectionJunction::new(section(0.0, 5))), 2, &mut live)
            .unwrap();
        let mut access = ContextAccessor::live_only(&mut live);

        let outcome = arena.start_section(id, 1.0, &mut access).unwrap();
        assert_eq!(outcome, SectionStart::Unconnected);
        assert!(ctx.scheduled_sources().is_empty());
    }

    #[test]
    fn test_stop_releases_source() {
        let (ctx, mut arena, id, _) = setup(section(0.0, 5));
        let mut live = ctx.clone();
        {
            let mut access = ContextAccessor::live_only(&mut live);
            let _ = arena.start_section(id, 0.0, &mut access).unwrap();
        }

        arena.stop_section(id, &mut live);
        arena.stop_section(id, &mut live);
        assert!(!arena.section_is_playing(id));
        assert!(ctx.scheduled_sources().is_empty());
    }

    #[test]
    fn test_begin_time_change_restarts_playing_section() {
        let (ctx, mut arena, id, _) = setup(section(0.0, 10));
        let mut live = ctx.clone();
        {
            let mut access = ContextAccessor::live_only(&mut live);
            let _ = arena.start_section(id, 1.0, &mut access).unwrap();
        }
        ctx.advance(2.0);

        let outcome = arena
            .update_section(id, section(1.0, 10), &mut live)
            .unwrap();
        // Resume at 3.0, two seconds into the moved region.
        assert_eq!(outcome, Some(SectionStart::Immediate { offset: 2.0 }));
        assert_eq!(ctx.scheduled_sources().len(), 1);
    }

    #[test]
    fn test_update_while_stopped_only_stores() {
        let (ctx, mut arena, id, _) = setup(section(0.0, 10));
        let mut live = ctx.clone();
        let outcome = arena.update_section(id, section(4.0, 10), &mut live).unwrap();
        assert_eq!(outcome, None);
        assert_eq!(arena.section_def(id).begin_time, 4.0);
    }

    #[test]
    fn test_offline_start_leaves_live_state_alone() {
        let (ctx, mut arena, id, sink) = setup(section(0.0, 5));
        let offline_ctx = HeadlessContext::default();
        let mut offline = OfflineRender::new(offline_ctx.clone());
        let mut live = ctx.clone();
        {
            let mut access = ContextAccessor::new(&mut live, Some(&mut offline));
            let _ = arena.start_section(id, 0.0, &mut access).unwrap();
        }

        assert!(!arena.section_is_playing(id));
        assert!(ctx.scheduled_sources().is_empty());
        let sources = offline_ctx.scheduled_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(offline_ctx.outputs(sources[0].0), vec![offline.mirror_of(sink).unwrap()]);
    }
}
