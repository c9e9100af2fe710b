//! End-to-end playback scenarios: commands flow through the project model
//! into the audio graph, and the headless context records what a browser
//! audio context would have been asked to play.

use mixgraph::{
    AudioGraph, Command, ControlPoint, EffectKind, EffectOwner, GraphConfig, HeadlessContext,
    OfflineRender, Param, Project, SectionDef,
};

const RATE: f64 = 1000.0;

struct Editor {
    ctx: HeadlessContext,
    project: Project,
    graph: AudioGraph,
}

impl Editor {
    fn new(config: GraphConfig) -> Self {
        let project = Project::new("Playback");
        let ctx = HeadlessContext::new(48_000.0);
        let graph = AudioGraph::new(&project, ctx.clone(), config).unwrap();
        Editor {
            ctx,
            project,
            graph,
        }
    }

    fn run(&mut self, command: Command) {
        let events = self.project.apply(command).unwrap();
        self.graph.apply_all(&events, &self.project).unwrap();
    }

    fn add_track(&mut self, name: &str) -> u32 {
        let (track_id, events) = self.project.add_track(name);
        self.graph.apply_all(&events, &self.project).unwrap();
        track_id
    }

    /// Place buffer `buffer` on the timeline over `[begin, end)` seconds.
    fn add_section(&mut self, track_id: u32, id: u32, buffer: u32, begin: f64, end: f64) {
        let samples = ((end - begin) * RATE) as u64;
        let section = SectionDef::new(id, buffer, RATE, 0, samples, begin);
        self.run(Command::AddSection { track_id, section });
    }

    /// `(buffer, when, offset, duration)` of every live source, by buffer.
    fn sources(&self) -> Vec<(u32, f64, f64, f64)> {
        let mut sources: Vec<_> = self
            .ctx
            .scheduled_sources()
            .into_iter()
            .map(|(_, buffer, s)| (buffer, s.when, s.offset, s.duration))
            .collect();
        sources.sort_by_key(|&(buffer, ..)| buffer);
        sources
    }
}

fn editor() -> Editor {
    Editor::new(GraphConfig::default())
}

#[test]
fn sections_are_scheduled_against_the_context_clock() {
    let mut e = editor();
    let track = e.add_track("Vocals");
    e.add_section(track, 1, 1, 0.0, 5.0);
    e.add_section(track, 2, 2, 5.0, 10.0);

    e.ctx.set_time(10.0);
    e.graph.start(3.0, None).unwrap();

    // The first region resumes mid-buffer, the second waits its turn.
    assert_eq!(e.sources(), vec![(1, 10.0, 3.0, 2.0), (2, 12.0, 0.0, 5.0)]);
    assert!(e.graph.is_playing());
}

#[test]
fn effect_insert_while_playing_resumes_at_current_position() {
    let mut e = editor();
    let track = e.add_track("Vocals");
    e.add_section(track, 1, 1, 0.0, 5.0);
    e.add_section(track, 2, 2, 5.0, 10.0);

    e.ctx.set_time(10.0);
    e.graph.start(3.0, None).unwrap();
    e.ctx.advance(2.0);
    assert_eq!(e.graph.current_position(), 5.0);

    e.run(Command::AddEffect {
        owner: EffectOwner::Track(track),
        index: 0,
        kind: EffectKind::Highpass,
    });

    // The first region is over; the second starts now from its beginning.
    assert_eq!(e.sources(), vec![(2, 12.0, 0.0, 5.0)]);

    // Audio now passes through the new filter on its way out.
    let arena = e.graph.junctions();
    let chain = e.graph.track(track).unwrap().effect_chain();
    let filter = arena.live_entry(arena.chain_effects(chain)[0]);
    let dest = arena.live_entry(e.graph.destination());
    for (source, _, _) in e.ctx.scheduled_sources() {
        assert!(e.ctx.reaches(source, filter));
    }
    assert!(e.ctx.reaches(filter, dest));
}

#[test]
fn section_edits_follow_the_playhead() {
    let mut e = editor();
    let track = e.add_track("Keys");
    e.add_section(track, 1, 1, 4.0, 8.0);

    e.graph.start(0.0, None).unwrap();
    assert_eq!(e.sources(), vec![(1, 4.0, 0.0, 4.0)]);

    e.ctx.advance(1.0);
    e.run(Command::SetSectionBeginTime {
        track_id: track,
        section_id: 1,
        begin_time: 0.0,
    });
    assert_eq!(e.sources(), vec![(1, 1.0, 1.0, 3.0)]);

    e.run(Command::RemoveSection {
        track_id: track,
        section_id: 1,
    });
    assert!(e.sources().is_empty());
}

#[test]
fn moved_section_plays_through_its_new_track() {
    let mut e = editor();
    let drums = e.add_track("Drums");
    let bass = e.add_track("Bass");
    e.add_section(drums, 7, 7, 0.0, 10.0);

    e.graph.start(0.0, None).unwrap();
    e.ctx.advance(2.0);
    e.run(Command::MoveSection {
        section_id: 7,
        from_track: drums,
        to_track: bass,
    });

    let sources = e.ctx.scheduled_sources();
    assert_eq!(sources.len(), 1);
    let (source, buffer, schedule) = sources[0];
    assert_eq!(buffer, 7);
    assert_eq!(schedule.offset, 2.0);

    let arena = e.graph.junctions();
    let bass_meter = arena.live_entry(e.graph.track(bass).unwrap().analyser());
    let drums_meter = arena.live_entry(e.graph.track(drums).unwrap().analyser());
    assert!(e.ctx.reaches(source, bass_meter));
    assert!(!e.ctx.reaches(source, drums_meter));
}

#[test]
fn mute_and_solo_decide_what_sounds() {
    let mut e = editor();
    let tracks: Vec<_> = ["A", "B", "C"].iter().map(|name| e.add_track(name)).collect();
    for &track in &tracks {
        e.add_section(track, track, track, 0.0, 10.0);
    }
    let buffers = |e: &Editor| e.sources().into_iter().map(|(b, ..)| b).collect::<Vec<_>>();

    e.run(Command::SetTrackMute {
        track_id: tracks[0],
        muted: true,
    });
    e.graph.start(0.0, None).unwrap();
    assert_eq!(buffers(&e), vec![tracks[1], tracks[2]]);

    e.ctx.advance(1.0);
    e.run(Command::SetTrackSolo {
        track_id: tracks[2],
        soloed: true,
    });
    assert_eq!(buffers(&e), vec![tracks[2]]);

    // Soloing a muted track unmutes it and takes over the solo.
    e.run(Command::SetTrackSolo {
        track_id: tracks[0],
        soloed: true,
    });
    assert_eq!(buffers(&e), vec![tracks[0]]);
    assert_eq!(e.project.soloed_track(), Some(tracks[0]));

    e.run(Command::SetTrackSolo {
        track_id: tracks[0],
        soloed: false,
    });
    assert_eq!(buffers(&e), tracks);
    assert_eq!(e.sources()[0].2, 1.0);
}

#[test]
fn envelope_is_rescheduled_from_the_start_position() {
    let mut e = editor();
    let track = e.add_track("Pad");
    e.add_section(track, 1, 1, 0.0, 20.0);
    e.run(Command::SetControlPoints {
        track_id: track,
        points: vec![ControlPoint::new(0.0, 0.0), ControlPoint::new(10.0, 1.0)],
    });

    e.ctx.set_time(2.0);
    e.graph.start(4.0, None).unwrap();

    let arena = e.graph.junctions();
    let envelope = arena
        .get(e.graph.track(track).unwrap().envelope())
        .unwrap()
        .primitive()
        .unwrap();
    let gain = e.ctx.param(envelope, Param::Gain).unwrap();
    assert!((gain - 0.4).abs() < 1e-6, "initial gain {gain}");

    let ramps = e.ctx.primitive(envelope).unwrap().ramps;
    let targets: Vec<_> = ramps.iter().map(|r| (r.value, r.at)).collect();
    assert_eq!(targets.len(), 3);
    assert_eq!(targets[0].1, 2.0);
    assert_eq!(targets[1], (1.0, 8.0));
    assert!(targets[2].1 > 8.0);
}

#[test]
fn offline_render_leaves_live_playback_alone() {
    let mut e = editor();
    let a = e.add_track("A");
    let b = e.add_track("B");
    e.add_section(a, 1, 1, 0.0, 4.0);
    e.add_section(b, 2, 2, 2.0, 6.0);
    e.run(Command::AddEffect {
        owner: EffectOwner::Master,
        index: 0,
        kind: EffectKind::Reverb,
    });

    let offline_ctx = HeadlessContext::new(48_000.0);
    let mut offline = OfflineRender::new(offline_ctx.clone());
    e.graph.start_for_offline_rendering(&mut offline).unwrap();

    let mut rendered: Vec<_> = offline_ctx
        .scheduled_sources()
        .into_iter()
        .map(|(_, buffer, s)| (buffer, s.when, s.offset))
        .collect();
    rendered.sort_by_key(|&(buffer, ..)| buffer);
    assert_eq!(rendered, vec![(1, 0.0, 0.0), (2, 2.0, 0.0)]);

    // Nothing was scheduled on the live context.
    assert!(e.sources().is_empty());
    assert!(!e.graph.is_playing());

    let dest = offline.mirror_of(e.graph.destination()).unwrap();
    for (source, _, _) in offline_ctx.scheduled_sources() {
        assert!(offline_ctx.reaches(source, dest));
    }
}

#[test]
fn muted_tracks_can_be_bounced_on_request() {
    let mut e = Editor::new(GraphConfig {
        render_muted_tracks: true,
        ..GraphConfig::default()
    });
    let a = e.add_track("A");
    let b = e.add_track("B");
    e.add_section(a, 1, 1, 0.0, 4.0);
    e.add_section(b, 2, 2, 0.0, 4.0);
    e.run(Command::SetTrackMute {
        track_id: a,
        muted: true,
    });

    let offline_ctx = HeadlessContext::new(48_000.0);
    let mut offline = OfflineRender::new(offline_ctx.clone());
    e.graph.start_for_offline_rendering(&mut offline).unwrap();
    let mut buffers: Vec<_> = offline_ctx
        .scheduled_sources()
        .into_iter()
        .map(|(_, buffer, _)| buffer)
        .collect();
    buffers.sort();
    assert_eq!(buffers, vec![1, 2]);

    // Live playback still honours the mute.
    e.graph.start(0.0, None).unwrap();
    let live: Vec<_> = e.sources().into_iter().map(|(b, ..)| b).collect();
    assert_eq!(live, vec![2]);
}
