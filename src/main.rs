// src/main.rs
//
// Headless walk through a small session: build a project, play it, change
// things while playing, and render it offline.

use mixgraph::{
    AudioGraph, Command, EffectKind, EffectOwner, EngineResult, GraphConfig, HeadlessContext,
    OfflineRender, Project, SectionDef,
};

/// ===============================
/// Helpers
/// ===============================

fn report(label: &str, ctx: &HeadlessContext) {
    println!("--- {label} @ {:.2}s ---", ctx.time());
    for (source, buffer, schedule) in ctx.scheduled_sources() {
        println!(
            "  source {:?}: buffer {} at {:.2}s, offset {:.2}s, {:.2}s long",
            source, buffer, schedule.when, schedule.offset, schedule.duration
        );
    }
}

fn run(project: &mut Project, graph: &mut AudioGraph, command: Command) -> EngineResult<()> {
    let events = project.apply(command)?;
    graph.apply_all(&events, project)
}

/// ===============================
/// Main
/// ===============================

fn main() -> EngineResult<()> {
    env_logger::init();

    let sample_rate = 48_000.0;

    // --------------------------------
    // Project
    // --------------------------------

    let mut project = Project::new("Demo");
    let (drums, _) = project.add_track("Drums");
    let (keys, _) = project.add_track("Keys");
    project.apply(Command::AddSection {
        track_id: drums,
        section: SectionDef::new(1, 1, sample_rate, 0, 8 * 48_000, 0.0),
    })?;
    project.apply(Command::AddSection {
        track_id: keys,
        section: SectionDef::new(2, 2, sample_rate, 0, 4 * 48_000, 4.0),
    })?;

    // --------------------------------
    // Graph
    // --------------------------------

    let ctx = HeadlessContext::new(sample_rate);
    let mut graph = AudioGraph::new(&project, ctx.clone(), GraphConfig::default())?;
    println!("Built {graph:?}");

    graph.start(2.0, None)?;
    report("start at 2s", &ctx);

    ctx.advance(1.0);
    run(
        &mut project,
        &mut graph,
        Command::AddEffect {
            owner: EffectOwner::Track(drums),
            index: 0,
            kind: EffectKind::Lowpass,
        },
    )?;
    report("lowpass on drums", &ctx);
    for effect in project.effects(EffectOwner::Track(drums))?.iter() {
        for info in effect.kind.params() {
            let value = info.format(effect.param(info.param));
            println!("  {} {}: {value}", effect.kind.name(), info.name);
        }
    }

    ctx.advance(1.5);
    run(
        &mut project,
        &mut graph,
        Command::SetTrackSolo {
            track_id: keys,
            soloed: true,
        },
    )?;
    report("keys soloed", &ctx);

    graph.stop_all_start_nodes();
    println!("Stopped at {:.2}s", graph.current_position());

    // --------------------------------
    // Offline render
    // --------------------------------

    let offline_ctx = HeadlessContext::new(sample_rate);
    let mut offline = OfflineRender::new(offline_ctx.clone());
    graph.start_for_offline_rendering(&mut offline)?;
    report("offline render", &offline_ctx);
    println!("Offline mirrors: {}", offline.mirror_count());

    Ok(())
}
