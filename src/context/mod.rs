//! Processing primitive factory.
//!
//! The graph never touches audio samples. Everything that produces or shapes
//! sound is an opaque *primitive* owned by a rendering context: the live,
//! wall-clock-paced context of the session, or an offline context that
//! renders an export as fast as it can. Junctions ask the [`RenderContext`]
//! to create, wire, parameterize and schedule primitives and keep only the
//! returned [`PrimitiveId`] handles.

mod headless;

use std::collections::HashMap;

use crate::error::EngineResult;
use crate::junction::JunctionId;
use crate::state::BufferId;

pub use headless::{HeadlessContext, PrimitiveRecord, Ramp, SourceSchedule};

/// Opaque handle to a primitive, assigned by the context that created it.
///
/// Handles are only meaningful to the context that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub u32);

/// Biquad response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Lowshelf,
    Highshelf,
    Peaking,
    Notch,
    Allpass,
}

/// The primitive kinds a context must be able to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Gain,
    Panner,
    BiquadFilter(FilterType),
    Convolver,
    DynamicsCompressor,
    Analyser,
    ChannelSplitter,
    Destination,
    /// A one-shot source playing a window of the given buffer.
    BufferSource(BufferId),
}

/// Parameter contract shared by all primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Linear gain.
    Gain,
    /// Stereo position, -1.0 (left) to 1.0 (right).
    Pan,
    Frequency,
    Q,
    /// Shelf or peak gain in dB.
    FilterGain,
    Attack,
    Knee,
    Ratio,
    Release,
    Threshold,
    /// Impulse response length in milliseconds.
    ReverbDuration,
    /// Impulse response decay in milliseconds.
    ReverbDecay,
    /// 1.0 plays the impulse response backwards.
    ReverbReversed,
    FftSize,
    Smoothing,
    PlaybackRate,
}

/// Everything needed to create one primitive with its initial parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSpec {
    pub kind: PrimitiveKind,
    pub channels: usize,
    pub params: Vec<(Param, f32)>,
}

impl PrimitiveSpec {
    pub fn new(kind: PrimitiveKind, channels: usize) -> Self {
        Self {
            kind,
            channels,
            params: Vec::new(),
        }
    }

    pub fn with(mut self, param: Param, value: f32) -> Self {
        self.params.push((param, value));
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Rendering context
// ═══════════════════════════════════════════════════════════════════════════

/// A rendering engine the graph can build primitives in.
///
/// All calls are non-blocking. Scheduling calls take absolute times on this
/// context's own clock ([`current_time`](RenderContext::current_time)).
pub trait RenderContext {
    /// Create a primitive. Fails when the engine denies the request.
    fn create_primitive(&mut self, kind: PrimitiveKind, channels: usize) -> EngineResult<PrimitiveId>;

    /// Connect output `output` of `from` into `to`.
    fn connect_output(&mut self, from: PrimitiveId, output: usize, to: PrimitiveId);

    /// Sever every link from `from` into `to`.
    fn disconnect(&mut self, from: PrimitiveId, to: PrimitiveId);

    /// Sever everything connected to output `output` of `from`.
    fn disconnect_output(&mut self, from: PrimitiveId, output: usize);

    fn set_param(&mut self, id: PrimitiveId, param: Param, value: f32);

    /// Schedule a linear ramp of `param` reaching `value` at absolute time `at`.
    fn linear_ramp(&mut self, id: PrimitiveId, param: Param, value: f32, at: f64);

    /// Schedule a buffer source to play `duration` seconds of its buffer from
    /// `offset`, beginning at absolute time `when`.
    fn start_source(&mut self, id: PrimitiveId, when: f64, offset: f64, duration: f64);

    fn stop_source(&mut self, id: PrimitiveId);

    /// Disconnect and drop a primitive. The handle is dead afterwards.
    fn release(&mut self, id: PrimitiveId);

    /// Current time of this context's clock, in seconds.
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> f64;

    fn frequency_bin_count(&self, analyser: PrimitiveId) -> usize;

    /// Copy the current frequency-domain bytes of an analyser into `out`.
    fn read_frequency_data(&self, analyser: PrimitiveId, out: &mut [u8]);

    /// Copy the current time-domain bytes of an analyser into `out`.
    fn read_time_domain_data(&self, analyser: PrimitiveId, out: &mut [u8]);

    #[inline]
    fn connect(&mut self, from: PrimitiveId, to: PrimitiveId) {
        self.connect_output(from, 0, to);
    }

    /// Create a primitive and apply the initial parameters of `spec`.
    fn build(&mut self, spec: &PrimitiveSpec) -> EngineResult<PrimitiveId> {
        let id = self.create_primitive(spec.kind, spec.channels)?;
        for &(param, value) in &spec.params {
            self.set_param(id, param, value);
        }
        Ok(id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Offline renders
// ═══════════════════════════════════════════════════════════════════════════

/// An offline rendering context plus the mirrors built in it so far.
///
/// Each junction is mirrored at most once per render, so every section of a
/// track feeds the same offline chain.
pub struct OfflineRender {
    context: Box<dyn RenderContext>,
    mirrors: HashMap<JunctionId, PrimitiveId>,
}

impl OfflineRender {
    pub fn new(context: impl RenderContext + 'static) -> Self {
        Self {
            context: Box::new(context),
            mirrors: HashMap::new(),
        }
    }

    #[inline]
    pub fn context(&self) -> &dyn RenderContext {
        self.context.as_ref()
    }

    /// Offline primitive mirroring `junction`, if one was built.
    #[inline]
    pub fn mirror_of(&self, junction: JunctionId) -> Option<PrimitiveId> {
        self.mirrors.get(&junction).copied()
    }

    #[inline]
    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }
}

/// Picks the context primitives are created in: the offline render when one
/// is supplied, the live context otherwise.
pub struct ContextAccessor<'a> {
    live: &'a mut dyn RenderContext,
    offline: Option<&'a mut OfflineRender>,
}

impl<'a> ContextAccessor<'a> {
    pub fn new(live: &'a mut dyn RenderContext, offline: Option<&'a mut OfflineRender>) -> Self {
        Self { live, offline }
    }

    pub fn live_only(live: &'a mut dyn RenderContext) -> Self {
        Self { live, offline: None }
    }

    #[inline]
    pub fn is_offline(&self) -> bool {
        self.offline.is_some()
    }

    /// The offline context if provided, else the live one.
    pub fn context(&mut self) -> &mut dyn RenderContext {
        match self.offline.as_deref_mut() {
            Some(offline) => offline.context.as_mut(),
            None => &mut *self.live,
        }
    }

    /// The live context, regardless of mode.
    pub fn live(&mut self) -> &mut dyn RenderContext {
        &mut *self.live
    }

    /// Current time on the clock of [`context`](Self::context).
    pub fn now(&self) -> f64 {
        match self.offline.as_deref() {
            Some(offline) => offline.context.current_time(),
            None => self.live.current_time(),
        }
    }

    pub(crate) fn mirror(&self, junction: JunctionId) -> Option<PrimitiveId> {
        self.offline
            .as_deref()
            .and_then(|offline| offline.mirror_of(junction))
    }

    pub(crate) fn remember_mirror(&mut self, junction: JunctionId, primitive: PrimitiveId) {
        if let Some(offline) = self.offline.as_deref_mut() {
            offline.mirrors.insert(junction, primitive);
        }
    }
}
