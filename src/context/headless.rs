// src/context/headless.rs
//
// In-memory rendering context.
//
// Records what a real rendering engine would be asked to do: which
// primitives exist, how they are wired, their parameter values, ramps and
// source schedules. The clock only moves when told to. Clones share state,
// so a caller can hand one clone to the graph and inspect through another.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::{Param, PrimitiveId, PrimitiveKind, RenderContext};
use crate::config::DEFAULT_ANALYSER_FFT_SIZE;
use crate::error::{EngineError, EngineResult};
use crate::state::BufferId;

/// A scheduled linear ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    pub param: Param,
    pub value: f32,
    pub at: f64,
}

/// How a buffer source was scheduled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceSchedule {
    pub when: f64,
    pub offset: f64,
    pub duration: f64,
    pub stopped: bool,
}

/// Snapshot of one primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveRecord {
    pub kind: PrimitiveKind,
    pub channels: usize,
    pub params: HashMap<Param, f32>,
    pub ramps: Vec<Ramp>,
    /// `(output, target)` pairs, in connection order.
    pub outputs: Vec<(usize, PrimitiveId)>,
    pub schedule: Option<SourceSchedule>,
    pub released: bool,
}

impl PrimitiveRecord {
    fn new(kind: PrimitiveKind, channels: usize) -> Self {
        Self {
            kind,
            channels,
            params: HashMap::new(),
            ramps: Vec::new(),
            outputs: Vec::new(),
            schedule: None,
            released: false,
        }
    }
}

#[derive(Debug)]
struct HeadlessState {
    time: f64,
    sample_rate: f64,
    next_id: u32,
    primitives: BTreeMap<PrimitiveId, PrimitiveRecord>,
    denied: Vec<PrimitiveKind>,
}

/// Rendering context that keeps everything in memory.
#[derive(Debug, Clone)]
pub struct HeadlessContext {
    state: Rc<RefCell<HeadlessState>>,
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new(44_100.0)
    }
}

impl HeadlessContext {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState {
                time: 0.0,
                sample_rate,
                next_id: 1,
                primitives: BTreeMap::new(),
                denied: Vec::new(),
            })),
        }
    }

    // ───────────────────────────────────────────────────────────────────
    // Clock
    // ───────────────────────────────────────────────────────────────────

    #[inline]
    pub fn time(&self) -> f64 {
        self.state.borrow().time
    }

    pub fn set_time(&self, time: f64) {
        self.state.borrow_mut().time = time;
    }

    pub fn advance(&self, seconds: f64) {
        self.state.borrow_mut().time += seconds;
    }

    /// Make every later request for `kind` fail.
    pub fn deny(&self, kind: PrimitiveKind) {
        self.state.borrow_mut().denied.push(kind);
    }

    // ───────────────────────────────────────────────────────────────────
    // Inspection
    // ───────────────────────────────────────────────────────────────────

    pub fn primitive(&self, id: PrimitiveId) -> Option<PrimitiveRecord> {
        self.state.borrow().primitives.get(&id).cloned()
    }

    pub fn param(&self, id: PrimitiveId, param: Param) -> Option<f32> {
        self.state
            .borrow()
            .primitives
            .get(&id)
            .and_then(|p| p.params.get(&param).copied())
    }

    /// Targets of every output of `id`.
    pub fn outputs(&self, id: PrimitiveId) -> Vec<PrimitiveId> {
        self.state
            .borrow()
            .primitives
            .get(&id)
            .map(|p| p.outputs.iter().map(|&(_, to)| to).collect())
            .unwrap_or_default()
    }

    /// Primitives that have not been released.
    pub fn live_primitives(&self) -> Vec<PrimitiveId> {
        self.state
            .borrow()
            .primitives
            .iter()
            .filter(|(_, p)| !p.released)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Live, unstopped buffer sources with their schedules.
    pub fn scheduled_sources(&self) -> Vec<(PrimitiveId, BufferId, SourceSchedule)> {
        self.state
            .borrow()
            .primitives
            .iter()
            .filter_map(|(&id, p)| match (p.kind, p.schedule) {
                (PrimitiveKind::BufferSource(buffer), Some(schedule))
                    if !p.released && !schedule.stopped =>
                {
                    Some((id, buffer, schedule))
                }
                _ => None,
            })
            .collect()
    }

    /// Whether a path of connections leads from `from` to `to`.
    pub fn reaches(&self, from: PrimitiveId, to: PrimitiveId) -> bool {
        let state = self.state.borrow();
        let mut stack = vec![from];
        let mut seen = Vec::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            if let Some(p) = state.primitives.get(&id) {
                stack.extend(p.outputs.iter().map(|&(_, next)| next));
            }
        }
        false
    }

    fn with_primitive(&self, id: PrimitiveId, f: impl FnOnce(&mut PrimitiveRecord)) {
        let mut state = self.state.borrow_mut();
        match state.primitives.get_mut(&id) {
            Some(p) if !p.released => f(p),
            Some(_) => log::debug!("ignoring call on released primitive {id:?}"),
            None => log::debug!("ignoring call on unknown primitive {id:?}"),
        }
    }
}

impl RenderContext for HeadlessContext {
    fn create_primitive(&mut self, kind: PrimitiveKind, channels: usize) -> EngineResult<PrimitiveId> {
        let mut state = self.state.borrow_mut();
        if state.denied.contains(&kind) {
            return Err(EngineError::PrimitiveCreation {
                kind,
                reason: "denied by headless context".into(),
            });
        }
        let id = PrimitiveId(state.next_id);
        state.next_id += 1;
        state.primitives.insert(id, PrimitiveRecord::new(kind, channels));
        Ok(id)
    }

    fn connect_output(&mut self, from: PrimitiveId, output: usize, to: PrimitiveId) {
        self.with_primitive(from, |p| {
            if !p.outputs.contains(&(output, to)) {
                p.outputs.push((output, to));
            }
        });
    }

    fn disconnect(&mut self, from: PrimitiveId, to: PrimitiveId) {
        self.with_primitive(from, |p| p.outputs.retain(|&(_, target)| target != to));
    }

    fn disconnect_output(&mut self, from: PrimitiveId, output: usize) {
        self.with_primitive(from, |p| p.outputs.retain(|&(o, _)| o != output));
    }

    fn set_param(&mut self, id: PrimitiveId, param: Param, value: f32) {
        self.with_primitive(id, |p| {
            p.params.insert(param, value);
        });
    }

    fn linear_ramp(&mut self, id: PrimitiveId, param: Param, value: f32, at: f64) {
        self.with_primitive(id, |p| p.ramps.push(Ramp { param, value, at }));
    }

    fn start_source(&mut self, id: PrimitiveId, when: f64, offset: f64, duration: f64) {
        self.with_primitive(id, |p| {
            p.schedule = Some(SourceSchedule {
                when,
                offset,
                duration,
                stopped: false,
            });
        });
    }

    fn stop_source(&mut self, id: PrimitiveId) {
        self.with_primitive(id, |p| {
            if let Some(schedule) = p.schedule.as_mut() {
                schedule.stopped = true;
            }
        });
    }

    fn release(&mut self, id: PrimitiveId) {
        self.with_primitive(id, |p| {
            p.outputs.clear();
            if let Some(schedule) = p.schedule.as_mut() {
                schedule.stopped = true;
            }
            p.released = true;
        });
    }

    fn current_time(&self) -> f64 {
        self.time()
    }

    fn sample_rate(&self) -> f64 {
        self.state.borrow().sample_rate
    }

    fn frequency_bin_count(&self, analyser: PrimitiveId) -> usize {
        let fft = self
            .param(analyser, Param::FftSize)
            .unwrap_or(DEFAULT_ANALYSER_FFT_SIZE as f32);
        fft as usize / 2
    }

    fn read_frequency_data(&self, _analyser: PrimitiveId, out: &mut [u8]) {
        out.fill(0);
    }

    fn read_time_domain_data(&self, _analyser: PrimitiveId, out: &mut [u8]) {
        // 128 is the zero line of byte time-domain data.
        out.fill(128);
    }
}
