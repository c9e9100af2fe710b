//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! The page hands the engine a small factory object wrapping its
//! `AudioContext`. The engine calls back into it to create and wire nodes.
//!
//! ```javascript
//! import init, { mixgraph_init, EditorSession, MixgraphConfig } from './mixgraph.js';
//!
//! await init();
//! mixgraph_init();
//!
//! const session = new EditorSession("Demo", new NodeFactory(audioContext), new MixgraphConfig());
//! const drums = session.add_track("Drums");
//! session.add_section(drums, 1, bufferId, 48000, 0, 48000 * 8, 0.0);
//! session.play(0.0);
//!
//! // Bounce
//! const offline = new OfflineAudioContext(2, length, 48000);
//! session.render_offline(new NodeFactory(offline));
//! const rendered = await offline.startRendering();
//! ```

use wasm_bindgen::prelude::*;

use crate::config::{
    DEFAULT_ANALYSER_FFT_SIZE, DEFAULT_ANALYSER_SMOOTHING, DEFAULT_CHANNELS, GraphConfig,
};
use crate::context::{
    FilterType, OfflineRender, Param, PrimitiveId, PrimitiveKind, RenderContext,
};
use crate::error::{EngineError, EngineResult};
use crate::graph::AudioGraph;
use crate::state::{
    Command, ControlPoint, EffectKind, EffectOwner, EffectParam, Project, SectionDef,
};

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn mixgraph_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration for building an editor session.
#[wasm_bindgen]
#[derive(Clone, Copy)]
pub struct MixgraphConfig {
    /// Output channel count (e.g., 2 for stereo).
    pub channels: u32,
    /// FFT size of the level meters.
    pub fft_size: u32,
    /// Smoothing time constant of the level meters (0.0 - 1.0).
    pub smoothing: f32,
    /// Include muted tracks when bouncing.
    pub render_muted_tracks: bool,
}

#[wasm_bindgen]
impl MixgraphConfig {
    /// Create a new configuration with default values.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with custom values.
    pub fn with_values(channels: u32, fft_size: u32, smoothing: f32, render_muted_tracks: bool) -> Self {
        Self {
            channels,
            fft_size,
            smoothing,
            render_muted_tracks,
        }
    }
}

impl Default for MixgraphConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS as u32,
            fft_size: DEFAULT_ANALYSER_FFT_SIZE,
            smoothing: DEFAULT_ANALYSER_SMOOTHING,
            render_muted_tracks: false,
        }
    }
}

impl From<MixgraphConfig> for GraphConfig {
    fn from(config: MixgraphConfig) -> Self {
        Self {
            channels: config.channels as usize,
            analyser_fft_size: config.fft_size,
            analyser_smoothing: config.smoothing,
            render_muted_tracks: config.render_muted_tracks,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Node Factory (JS side)
// ═══════════════════════════════════════════════════════════════════════════

#[wasm_bindgen]
extern "C" {
    /// JS object owning an `AudioContext` (or `OfflineAudioContext`) and
    /// the nodes created on it, addressed by numeric handle.
    pub type NodeFactory;

    #[wasm_bindgen(method, catch, js_name = createPrimitive)]
    fn create_primitive(this: &NodeFactory, kind: &str, detail: u32, channels: u32) -> Result<u32, JsValue>;

    #[wasm_bindgen(method)]
    fn connect(this: &NodeFactory, from: u32, output: u32, to: u32);

    #[wasm_bindgen(method)]
    fn disconnect(this: &NodeFactory, from: u32, to: u32);

    #[wasm_bindgen(method, js_name = disconnectOutput)]
    fn disconnect_output(this: &NodeFactory, from: u32, output: u32);

    #[wasm_bindgen(method, js_name = setParam)]
    fn set_param(this: &NodeFactory, id: u32, name: &str, value: f32);

    #[wasm_bindgen(method, js_name = linearRamp)]
    fn linear_ramp(this: &NodeFactory, id: u32, name: &str, value: f32, at: f64);

    #[wasm_bindgen(method, js_name = startSource)]
    fn start_source(this: &NodeFactory, id: u32, when: f64, offset: f64, duration: f64);

    #[wasm_bindgen(method, js_name = stopSource)]
    fn stop_source(this: &NodeFactory, id: u32);

    #[wasm_bindgen(method)]
    fn release(this: &NodeFactory, id: u32);

    #[wasm_bindgen(method, getter, js_name = currentTime)]
    fn current_time(this: &NodeFactory) -> f64;

    #[wasm_bindgen(method, getter, js_name = sampleRate)]
    fn sample_rate(this: &NodeFactory) -> f64;

    #[wasm_bindgen(method, js_name = frequencyBinCount)]
    fn frequency_bin_count(this: &NodeFactory, analyser: u32) -> u32;

    #[wasm_bindgen(method, js_name = getByteFrequencyData)]
    fn read_frequency_data(this: &NodeFactory, analyser: u32, out: &mut [u8]);

    #[wasm_bindgen(method, js_name = getByteTimeDomainData)]
    fn read_time_domain_data(this: &NodeFactory, analyser: u32, out: &mut [u8]);
}

/// Web Audio node type name and a kind-specific detail (filter type index
/// or buffer id) for a primitive kind.
fn node_type(kind: PrimitiveKind) -> (&'static str, u32) {
    match kind {
        PrimitiveKind::Gain => ("gain", 0),
        PrimitiveKind::Panner => ("stereoPanner", 0),
        PrimitiveKind::BiquadFilter(filter) => ("biquadFilter", filter_index(filter)),
        PrimitiveKind::Convolver => ("convolver", 0),
        PrimitiveKind::DynamicsCompressor => ("dynamicsCompressor", 0),
        PrimitiveKind::Analyser => ("analyser", 0),
        PrimitiveKind::ChannelSplitter => ("channelSplitter", 0),
        PrimitiveKind::Destination => ("destination", 0),
        PrimitiveKind::BufferSource(buffer) => ("bufferSource", buffer),
    }
}

fn filter_index(filter: FilterType) -> u32 {
    match filter {
        FilterType::Lowpass => 0,
        FilterType::Highpass => 1,
        FilterType::Bandpass => 2,
        FilterType::Lowshelf => 3,
        FilterType::Highshelf => 4,
        FilterType::Peaking => 5,
        FilterType::Notch => 6,
        FilterType::Allpass => 7,
    }
}

/// Attribute or `AudioParam` name on the Web Audio node.
fn param_name(param: Param) -> &'static str {
    match param {
        Param::Gain | Param::FilterGain => "gain",
        Param::Pan => "pan",
        Param::Frequency => "frequency",
        Param::Q => "Q",
        Param::Attack => "attack",
        Param::Knee => "knee",
        Param::Ratio => "ratio",
        Param::Release => "release",
        Param::Threshold => "threshold",
        Param::ReverbDuration => "duration",
        Param::ReverbDecay => "decay",
        Param::ReverbReversed => "reversed",
        Param::FftSize => "fftSize",
        Param::Smoothing => "smoothingTimeConstant",
        Param::PlaybackRate => "playbackRate",
    }
}

/// [`RenderContext`] forwarding every call to a JS [`NodeFactory`].
struct JsRenderContext {
    factory: NodeFactory,
}

impl RenderContext for JsRenderContext {
    fn create_primitive(&mut self, kind: PrimitiveKind, channels: usize) -> EngineResult<PrimitiveId> {
        let (name, detail) = node_type(kind);
        self.factory
            .create_primitive(name, detail, channels as u32)
            .map(PrimitiveId)
            .map_err(|err| EngineError::PrimitiveCreation {
                kind,
                reason: err.as_string().unwrap_or_else(|| format!("{err:?}")),
            })
    }

    fn connect_output(&mut self, from: PrimitiveId, output: usize, to: PrimitiveId) {
        self.factory.connect(from.0, output as u32, to.0);
    }

    fn disconnect(&mut self, from: PrimitiveId, to: PrimitiveId) {
        self.factory.disconnect(from.0, to.0);
    }

    fn disconnect_output(&mut self, from: PrimitiveId, output: usize) {
        self.factory.disconnect_output(from.0, output as u32);
    }

    fn set_param(&mut self, id: PrimitiveId, param: Param, value: f32) {
        self.factory.set_param(id.0, param_name(param), value);
    }

    fn linear_ramp(&mut self, id: PrimitiveId, param: Param, value: f32, at: f64) {
        self.factory.linear_ramp(id.0, param_name(param), value, at);
    }

    fn start_source(&mut self, id: PrimitiveId, when: f64, offset: f64, duration: f64) {
        self.factory.start_source(id.0, when, offset, duration);
    }

    fn stop_source(&mut self, id: PrimitiveId) {
        self.factory.stop_source(id.0);
    }

    fn release(&mut self, id: PrimitiveId) {
        self.factory.release(id.0);
    }

    fn current_time(&self) -> f64 {
        self.factory.current_time()
    }

    fn sample_rate(&self) -> f64 {
        self.factory.sample_rate()
    }

    fn frequency_bin_count(&self, analyser: PrimitiveId) -> usize {
        self.factory.frequency_bin_count(analyser.0) as usize
    }

    fn read_frequency_data(&self, analyser: PrimitiveId, out: &mut [u8]) {
        self.factory.read_frequency_data(analyser.0, out);
    }

    fn read_time_domain_data(&self, analyser: PrimitiveId, out: &mut [u8]) {
        self.factory.read_time_domain_data(analyser.0, out);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Editor Session
// ═══════════════════════════════════════════════════════════════════════════

/// Project model plus the live audio graph that follows it.
///
/// Track ids are `u32`. Effect methods take an optional track id; leaving
/// it `undefined` addresses the master chain.
#[wasm_bindgen]
pub struct EditorSession {
    project: Project,
    graph: AudioGraph,
}

#[wasm_bindgen]
impl EditorSession {
    /// Create a session with an empty project, rendering into `factory`.
    #[wasm_bindgen(constructor)]
    pub fn new(name: &str, factory: NodeFactory, config: &MixgraphConfig) -> Result<EditorSession, JsError> {
        let project = Project::new(name);
        let graph = AudioGraph::new(&project, JsRenderContext { factory }, (*config).into())?;
        Ok(EditorSession { project, graph })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tracks
    // ─────────────────────────────────────────────────────────────────────

    /// Append a track. Returns its id.
    pub fn add_track(&mut self, name: &str) -> Result<u32, JsError> {
        let (track_id, events) = self.project.add_track(name);
        self.graph.apply_all(&events, &self.project)?;
        Ok(track_id)
    }

    pub fn remove_track(&mut self, track_id: u32) -> Result<(), JsError> {
        self.run(Command::RemoveTrack { track_id })
    }

    pub fn set_track_mute(&mut self, track_id: u32, muted: bool) -> Result<(), JsError> {
        self.run(Command::SetTrackMute { track_id, muted })
    }

    pub fn set_track_solo(&mut self, track_id: u32, soloed: bool) -> Result<(), JsError> {
        self.run(Command::SetTrackSolo { track_id, soloed })
    }

    pub fn set_track_gain(&mut self, track_id: u32, gain: f32) -> Result<(), JsError> {
        self.run(Command::SetTrackGain { track_id, gain })
    }

    pub fn set_track_pan(&mut self, track_id: u32, pan: f32) -> Result<(), JsError> {
        self.run(Command::SetTrackPan { track_id, pan })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sections
    // ─────────────────────────────────────────────────────────────────────

    /// Place a window `[begin_sample, end_sample)` of a decoded buffer on a
    /// track, starting at `begin_time` seconds on the timeline.
    #[allow(clippy::too_many_arguments)]
    pub fn add_section(
        &mut self,
        track_id: u32,
        section_id: u32,
        buffer: u32,
        sample_rate: f64,
        begin_sample: u64,
        end_sample: u64,
        begin_time: f64,
    ) -> Result<(), JsError> {
        let section = SectionDef::new(section_id, buffer, sample_rate, begin_sample, end_sample, begin_time);
        self.run(Command::AddSection { track_id, section })
    }

    pub fn remove_section(&mut self, track_id: u32, section_id: u32) -> Result<(), JsError> {
        self.run(Command::RemoveSection {
            track_id,
            section_id,
        })
    }

    pub fn move_section(&mut self, section_id: u32, from_track: u32, to_track: u32) -> Result<(), JsError> {
        self.run(Command::MoveSection {
            section_id,
            from_track,
            to_track,
        })
    }

    pub fn set_section_begin_time(&mut self, track_id: u32, section_id: u32, begin_time: f64) -> Result<(), JsError> {
        self.run(Command::SetSectionBeginTime {
            track_id,
            section_id,
            begin_time,
        })
    }

    pub fn set_section_playback_rate(
        &mut self,
        track_id: u32,
        section_id: u32,
        playback_rate: f64,
    ) -> Result<(), JsError> {
        self.run(Command::SetSectionPlaybackRate {
            track_id,
            section_id,
            playback_rate,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Effects
    // ─────────────────────────────────────────────────────────────────────

    /// Insert an effect of kind `kind_id` at `index`.
    pub fn add_effect(&mut self, track_id: Option<u32>, index: usize, kind_id: u32) -> Result<(), JsError> {
        let kind = EffectKind::from_id(kind_id)?;
        self.run(Command::AddEffect {
            owner: owner(track_id),
            index,
            kind,
        })
    }

    pub fn remove_effect(&mut self, track_id: Option<u32>, index: usize) -> Result<(), JsError> {
        self.run(Command::RemoveEffect {
            owner: owner(track_id),
            index,
        })
    }

    pub fn move_effect(&mut self, track_id: Option<u32>, from: usize, to: usize) -> Result<(), JsError> {
        self.run(Command::MoveEffect {
            owner: owner(track_id),
            from,
            to,
        })
    }

    /// Set a parameter by its display name (e.g. "Frequency", "Threshold").
    pub fn set_effect_param(
        &mut self,
        track_id: Option<u32>,
        index: usize,
        name: &str,
        value: f32,
    ) -> Result<(), JsError> {
        let owner = owner(track_id);
        let param = self.effect_param(owner, index, name)?;
        self.run(Command::SetEffectParam {
            owner,
            index,
            param,
            value,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Volume envelope
    // ─────────────────────────────────────────────────────────────────────

    pub fn add_control_point(&mut self, track_id: u32, time: f64, value: f32) -> Result<(), JsError> {
        self.run(Command::AddControlPoint {
            track_id,
            point: ControlPoint::new(time, value),
        })
    }

    pub fn remove_control_point(&mut self, track_id: u32, index: usize) -> Result<(), JsError> {
        self.run(Command::RemoveControlPoint { track_id, index })
    }

    /// Replace the envelope with interleaved `[time, value, time, value, ...]` pairs.
    pub fn set_control_points(&mut self, track_id: u32, pairs: &[f64]) -> Result<(), JsError> {
        let points = pairs
            .chunks_exact(2)
            .map(|pair| ControlPoint::new(pair[0], pair[1] as f32))
            .collect();
        self.run(Command::SetControlPoints { track_id, points })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────

    /// Start playback from `time` seconds on the timeline.
    pub fn play(&mut self, time: f64) -> Result<(), JsError> {
        self.graph.start(time, None)?;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.graph.stop_all_start_nodes();
    }

    pub fn is_playing(&self) -> bool {
        self.graph.is_playing()
    }

    /// Current timeline position in seconds.
    pub fn position(&self) -> f64 {
        self.graph.current_position()
    }

    /// Project length in seconds.
    pub fn duration(&self) -> f64 {
        self.project.end_time()
    }

    /// Schedule the whole project into an offline context. Call
    /// `startRendering()` on that context afterwards.
    pub fn render_offline(&mut self, factory: NodeFactory) -> Result<(), JsError> {
        let mut offline = OfflineRender::new(JsRenderContext { factory });
        self.graph.start_for_offline_rendering(&mut offline)?;
        log::debug!("offline render scheduled with {} mirrored junctions", offline.mirror_count());
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Master & Meters
    // ─────────────────────────────────────────────────────────────────────

    /// Returns false when the change was below the update threshold.
    pub fn set_master_gain(&mut self, gain: f32) -> bool {
        self.graph.set_master_gain(gain)
    }

    pub fn master_gain(&self) -> f32 {
        self.graph.master_gain()
    }

    pub fn frequency_bin_count(&self) -> u32 {
        self.graph.frequency_bin_count(self.graph.master_analyser()) as u32
    }

    pub fn read_master_frequency_data(&self, out: &mut [u8]) -> bool {
        self.graph.read_frequency_data(self.graph.master_analyser(), out)
    }

    pub fn read_master_time_domain_data(&self, out: &mut [u8]) -> bool {
        self.graph.read_time_domain_data(self.graph.master_analyser(), out)
    }

    /// Time-domain data of one master output channel.
    pub fn read_channel_time_domain_data(&self, channel: usize, out: &mut [u8]) -> bool {
        match self.graph.channel_analysers().get(channel) {
            Some(&analyser) => self.graph.read_time_domain_data(analyser, out),
            None => false,
        }
    }

    pub fn read_track_time_domain_data(&self, track_id: u32, out: &mut [u8]) -> bool {
        match self.graph.track(track_id) {
            Some(track) => self.graph.read_time_domain_data(track.analyser(), out),
            None => false,
        }
    }
}

impl EditorSession {
    fn run(&mut self, command: Command) -> Result<(), JsError> {
        let events = self.project.apply(command)?;
        self.graph.apply_all(&events, &self.project)?;
        Ok(())
    }

    fn effect_param(&self, owner: EffectOwner, index: usize, name: &str) -> Result<EffectParam, JsError> {
        let effects = self.project.effects(owner)?;
        let effect = effects.get(index).ok_or(EngineError::EffectIndexOutOfRange {
            index,
            len: effects.len(),
        })?;
        effect
            .kind
            .params()
            .iter()
            .find(|info| info.name.eq_ignore_ascii_case(name))
            .map(|info| info.param)
            .ok_or_else(|| JsError::new(&format!("{} has no parameter named {name}", effect.kind.name())))
    }
}

fn owner(track_id: Option<u32>) -> EffectOwner {
    match track_id {
        Some(track_id) => EffectOwner::Track(track_id),
        None => EffectOwner::Master,
    }
}
