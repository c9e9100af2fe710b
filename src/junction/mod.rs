//! Routing graph of junctions.
//!
//! A junction wraps one primitive (or none, for composites) plus a single
//! downstream neighbour. Junctions live in a [`JunctionArena`] and refer to
//! each other through [`JunctionId`] handles; a handle never keeps its
//! pointee alive, and a removed junction simply stops resolving.
//!
//! Wiring is always done against the *live* context. Offline renders never
//! touch live primitives: asking for an entry primitive through an offline
//! [`ContextAccessor`] mirrors the downstream path into the offline context.

mod analysis;
mod effect_chain;
mod envelope;
mod primitives;
mod section;

use crate::context::{ContextAccessor, PrimitiveId, RenderContext};
use crate::error::EngineResult;

pub use effect_chain::{ChainWalk, EffectChainJunction};
pub use envelope::{EnvelopePlan, HOLD_RAMP_OFFSET, VolumeEnvelopeJunction, plan_envelope};
pub use primitives::{
    AnalyserJunction, ChannelSplitterJunction, CompressorJunction, FilterJunction, GainJunction,
    PanJunction, ReverbJunction, db_to_linear,
};
pub use section::{SectionJunction, SectionSchedule, SectionStart, schedule_section};

/// Handle to a junction in a [`JunctionArena`].
///
/// Ids are assigned sequentially and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JunctionId(pub u32);

/// Signal returned by chain surgery.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainSignal {
    /// The chain's internal topology was rebuilt; upstream links into it
    /// may be stale and running sources must be restarted.
    ReconnectRequested,
    Unchanged,
}

/// Concrete junction variants.
#[derive(Debug, Clone)]
pub enum JunctionKind {
    Gain(GainJunction),
    Pan(PanJunction),
    Filter(FilterJunction),
    Reverb(ReverbJunction),
    DynamicCompressor(CompressorJunction),
    Analyser(AnalyserJunction),
    ChannelSplitter(ChannelSplitterJunction),
    Destination,
    EffectChain(EffectChainJunction),
    VolumeEnvelope(VolumeEnvelopeJunction),
    Section(SectionJunction),
}

impl JunctionKind {
    pub fn name(&self) -> &'static str {
        match self {
            JunctionKind::Gain(_) => "gain",
            JunctionKind::Pan(_) => "pan",
            JunctionKind::Filter(_) => "filter",
            JunctionKind::Reverb(_) => "reverb",
            JunctionKind::DynamicCompressor(_) => "compressor",
            JunctionKind::Analyser(_) => "analyser",
            JunctionKind::ChannelSplitter(_) => "channel splitter",
            JunctionKind::Destination => "destination",
            JunctionKind::EffectChain(_) => "effect chain",
            JunctionKind::VolumeEnvelope(_) => "volume envelope",
            JunctionKind::Section(_) => "section",
        }
    }
}

/// One junction in the arena.
#[derive(Debug)]
pub struct JunctionNode {
    pub(crate) kind: JunctionKind,
    pub(crate) channels: usize,
    /// Live primitive: both entry and terminal for single-primitive kinds.
    pub(crate) primitive: Option<PrimitiveId>,
    pub(crate) next: Option<JunctionId>,
    /// Live primitive our terminal actually feeds on behalf of `next`.
    pub(crate) linked: Option<PrimitiveId>,
    /// Side outputs that are not the downstream neighbour.
    pub(crate) taps: Vec<(JunctionId, PrimitiveId)>,
    pub(crate) upstream: Vec<JunctionId>,
    pub(crate) cleaned_up: bool,
}

impl JunctionNode {
    #[inline]
    pub fn kind(&self) -> &JunctionKind {
        &self.kind
    }

    #[inline]
    pub fn next(&self) -> Option<JunctionId> {
        self.next
    }

    #[inline]
    pub fn primitive(&self) -> Option<PrimitiveId> {
        self.primitive
    }

    /// The live primitive this junction's terminal is connected into.
    #[inline]
    pub fn linked_primitive(&self) -> Option<PrimitiveId> {
        self.linked
    }

    #[inline]
    pub fn upstream(&self) -> &[JunctionId] {
        &self.upstream
    }

    #[inline]
    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }
}

/// How a junction's terminal gets wired to its downstream neighbour.
enum Wiring {
    Primitive(PrimitiveId),
    /// Delegated to the last effect of a chain, if any.
    Chain(Option<JunctionId>),
    /// Only recorded; wired when the junction starts.
    Deferred,
}

/// Owner of every junction of a graph.
#[derive(Debug, Default)]
pub struct JunctionArena {
    nodes: Vec<Option<JunctionNode>>,
}

impl JunctionArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a junction, creating its live primitive.
    pub fn insert(
        &mut self,
        kind: JunctionKind,
        channels: usize,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<JunctionId> {
        let primitive = match kind.primitive_spec(channels) {
            Some(spec) => Some(ctx.build(&spec)?),
            None => None,
        };
        let id = JunctionId(self.nodes.len() as u32);
        log::debug!("junction {id:?}: new {}", kind.name());
        self.nodes.push(Some(JunctionNode {
            kind,
            channels,
            primitive,
            next: None,
            linked: None,
            taps: Vec::new(),
            upstream: Vec::new(),
            cleaned_up: false,
        }));
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: JunctionId) -> Option<&JunctionNode> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: JunctionId) -> Option<&mut JunctionNode> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    #[inline]
    pub fn contains(&self, id: JunctionId) -> bool {
        self.get(id).is_some()
    }

    /// Number of junctions currently in the arena.
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn next_of(&self, id: JunctionId) -> Option<JunctionId> {
        self.get(id).and_then(|n| n.next)
    }

    pub(crate) fn node(&self, id: JunctionId) -> &JunctionNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("junction {id:?} is not in the arena"),
        }
    }

    pub(crate) fn node_mut(&mut self, id: JunctionId) -> &mut JunctionNode {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("junction {id:?} is not in the arena"),
        }
    }

    // ───────────────────────────────────────────────────────────────────
    // Connect / disconnect
    // ───────────────────────────────────────────────────────────────────

    /// Make `to` the downstream neighbour of `from`.
    ///
    /// An existing downstream link of `from` is severed first, so a junction
    /// never feeds two neighbours.
    pub fn connect(&mut self, from: JunctionId, to: JunctionId, ctx: &mut dyn RenderContext) {
        self.disconnect(from, ctx);

        let node = self.node(from);
        let wiring = match &node.kind {
            JunctionKind::ChannelSplitter(_) => {
                panic!("channel splitter {from:?} connects per channel")
            }
            JunctionKind::Destination => panic!("destination {from:?} has no downstream"),
            JunctionKind::EffectChain(chain) => Wiring::Chain(chain.effects.last().copied()),
            JunctionKind::Section(_) => Wiring::Deferred,
            _ => match node.primitive {
                Some(primitive) => Wiring::Primitive(primitive),
                None => panic!("junction {from:?} has no live primitive to connect"),
            },
        };

        let linked = match wiring {
            Wiring::Primitive(primitive) => {
                let entry = self.live_entry(to);
                ctx.connect(primitive, entry);
                Some(entry)
            }
            Wiring::Chain(Some(last)) => {
                self.connect(last, to, ctx);
                None
            }
            Wiring::Chain(None) | Wiring::Deferred => None,
        };

        log::debug!("junction {from:?} -> {to:?}");
        let node = self.node_mut(from);
        node.next = Some(to);
        node.linked = linked;
        if let Some(target) = self.get_mut(to) {
            target.upstream.push(from);
        }
    }

    /// Sever the link to the downstream neighbour. No-op when there is none.
    pub fn disconnect(&mut self, from: JunctionId, ctx: &mut dyn RenderContext) {
        let Some(node) = self.get_mut(from) else {
            return;
        };
        let Some(next) = node.next.take() else {
            return;
        };
        let linked = node.linked.take();
        let primitive = node.primitive;
        let last_effect = match &node.kind {
            JunctionKind::EffectChain(chain) => chain.effects.last().copied(),
            _ => None,
        };

        match (last_effect, primitive, linked) {
            (Some(last), _, _) => self.disconnect(last, ctx),
            (None, Some(primitive), Some(linked)) => ctx.disconnect(primitive, linked),
            _ => {}
        }

        if let Some(target) = self.get_mut(next) {
            target.upstream.retain(|&u| u != from);
        }
        log::debug!("junction {from:?} -/-> {next:?}");
    }

    /// Feed `to` from `from` as a side output, leaving the downstream
    /// neighbour alone. Taps exist only in the live graph.
    pub fn tap(&mut self, from: JunctionId, to: JunctionId, ctx: &mut dyn RenderContext) {
        let entry = self.live_entry(to);
        let node = self.node_mut(from);
        let Some(primitive) = node.primitive else {
            panic!("junction {from:?} has no live primitive to tap");
        };
        ctx.connect(primitive, entry);
        node.taps.push((to, entry));
    }

    // ───────────────────────────────────────────────────────────────────
    // Entry primitives
    // ───────────────────────────────────────────────────────────────────

    /// Primitive upstream junctions connect into, in the context chosen by
    /// `access`.
    pub fn obtain_entry(
        &self,
        id: JunctionId,
        access: &mut ContextAccessor<'_>,
    ) -> EngineResult<PrimitiveId> {
        if access.is_offline() {
            self.offline_entry(id, access)
        } else {
            Ok(self.live_entry(id))
        }
    }

    /// Live entry primitive.
    ///
    /// # Panics
    ///
    /// On invalid topology: an empty chain with no downstream neighbour, a
    /// section, or a junction that was cleaned up.
    pub fn live_entry(&self, id: JunctionId) -> PrimitiveId {
        let node = self.node(id);
        match &node.kind {
            JunctionKind::EffectChain(chain) => self.live_entry(chain_entry_target(id, chain, node.next)),
            JunctionKind::Section(_) => panic!("section {id:?} cannot be connected into"),
            _ => match node.primitive {
                Some(primitive) => primitive,
                None => panic!("junction {id:?} has no live primitive"),
            },
        }
    }

    /// Mirror `id` and everything downstream of it into the offline context.
    fn offline_entry(
        &self,
        id: JunctionId,
        access: &mut ContextAccessor<'_>,
    ) -> EngineResult<PrimitiveId> {
        if let Some(mirror) = access.mirror(id) {
            return Ok(mirror);
        }
        let node = self.node(id);

        let spec = match &node.kind {
            JunctionKind::EffectChain(chain) => {
                return self.offline_entry(chain_entry_target(id, chain, node.next), access);
            }
            JunctionKind::Section(_) => panic!("section {id:?} cannot be connected into"),
            kind => match kind.primitive_spec(node.channels) {
                Some(spec) => spec,
                None => panic!("junction {id:?} has no primitive to mirror"),
            },
        };

        let mirror = access.context().build(&spec)?;
        access.remember_mirror(id, mirror);

        // Taps are not mirrored; meters only watch live playback.
        if let JunctionKind::VolumeEnvelope(envelope) = &node.kind {
            let now = access.now();
            plan_envelope(&envelope.points, 0.0, now).apply(access.context(), mirror);
        }

        if let Some(next) = node.next {
            let entry = self.offline_entry(next, access)?;
            access.context().connect(mirror, entry);
        }
        Ok(mirror)
    }

    // ───────────────────────────────────────────────────────────────────
    // Teardown
    // ───────────────────────────────────────────────────────────────────

    /// Detach a junction and release what it owns. Idempotent.
    ///
    /// An effect chain owns its effects and cleans them up too. The junction
    /// stays addressable, so stale handles still see `is_cleaned_up()`.
    pub fn clean_up(&mut self, id: JunctionId, ctx: &mut dyn RenderContext) {
        match self.get(id) {
            Some(node) if !node.cleaned_up => {}
            _ => return,
        }
        self.disconnect(id, ctx);

        let node = self.node_mut(id);
        node.cleaned_up = true;
        let primitive = node.primitive.take();
        let taps = std::mem::take(&mut node.taps);
        let owned = match &mut node.kind {
            JunctionKind::EffectChain(chain) => std::mem::take(&mut chain.effects),
            JunctionKind::Section(section) => {
                if let Some(source) = section.source.take() {
                    ctx.stop_source(source);
                    ctx.release(source);
                }
                section.timing.stop();
                Vec::new()
            }
            JunctionKind::ChannelSplitter(splitter) => {
                splitter.outputs.clear();
                Vec::new()
            }
            _ => Vec::new(),
        };

        if let Some(primitive) = primitive {
            ctx.release(primitive);
        }
        for (target, _) in taps {
            if let Some(node) = self.get_mut(target) {
                node.upstream.retain(|&u| u != id);
            }
        }
        for effect in owned {
            self.remove(effect, ctx);
        }
        log::debug!("junction {id:?}: cleaned up");
    }

    /// Clean up a junction and drop it from the arena.
    pub fn remove(&mut self, id: JunctionId, ctx: &mut dyn RenderContext) {
        self.clean_up(id, ctx);
        if let Some(slot) = self.nodes.get_mut(id.0 as usize) {
            *slot = None;
        }
    }
}

/// Where an effect chain's entry resolves to.
fn chain_entry_target(
    id: JunctionId,
    chain: &EffectChainJunction,
    next: Option<JunctionId>,
) -> JunctionId {
    match (chain.effects.first(), next) {
        (Some(&first), _) => first,
        (None, Some(next)) => next,
        (None, None) => {
            panic!("effect chain {id:?} is empty and has no downstream junction")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HeadlessContext, OfflineRender, Param, PrimitiveKind};

    fn gain(value: f32) -> JunctionKind {
        JunctionKind::Gain(GainJunction { gain: value })
    }

    fn empty_chain() -> JunctionKind {
        JunctionKind::EffectChain(EffectChainJunction::default())
    }

    #[test]
    fn test_connect_links_primitives() {
        let ctx = HeadlessContext::default();
        let mut live = ctx.clone();
        let mut arena = JunctionArena::new();
        let a = arena.insert(gain(0.5), 2, &mut live).unwrap();
        let dest = arena.insert(JunctionKind::Destination, 2, &mut live).unwrap();

        arena.connect(a, dest, &mut live);

        let pa = arena.get(a).unwrap().primitive().unwrap();
        let pd = arena.get(dest).unwrap().primitive().unwrap();
        assert_eq!(ctx.outputs(pa), vec![pd]);
        assert_eq!(arena.next_of(a), Some(dest));
        assert_eq!(arena.get(dest).unwrap().upstream(), &[a]);
        assert_eq!(ctx.param(pa, Param::Gain), Some(0.5));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let ctx = HeadlessContext::default();
        let mut live = ctx.clone();
        let mut arena = JunctionArena::new();
        let a = arena.insert(gain(1.0), 2, &mut live).unwrap();
        let dest = arena.insert(JunctionKind::Destination, 2, &mut live).unwrap();
        arena.connect(a, dest, &mut live);

        arena.disconnect(a, &mut live);
        arena.disconnect(a, &mut live);

        let pa = arena.get(a).unwrap().primitive().unwrap();
        assert!(ctx.outputs(pa).is_empty());
        assert_eq!(arena.next_of(a), None);
        assert!(arena.get(dest).unwrap().upstream().is_empty());
    }

    #[test]
    fn test_reconnect_replaces_previous_neighbour() {
        let ctx = HeadlessContext::default();
        let mut live = ctx.clone();
        let mut arena = JunctionArena::new();
        let a = arena.insert(gain(1.0), 2, &mut live).unwrap();
        let b = arena.insert(gain(1.0), 2, &mut live).unwrap();
        let c = arena.insert(gain(1.0), 2, &mut live).unwrap();

        arena.connect(a, b, &mut live);
        arena.connect(a, c, &mut live);

        let pa = arena.get(a).unwrap().primitive().unwrap();
        let pc = arena.get(c).unwrap().primitive().unwrap();
        assert_eq!(ctx.outputs(pa), vec![pc]);
    }

    #[test]
    fn test_tap_is_not_the_neighbour() {
        let ctx = HeadlessContext::default();
        let mut live = ctx.clone();
        let mut arena = JunctionArena::new();
        let a = arena.insert(gain(1.0), 2, &mut live).unwrap();
        let meter = arena
            .insert(JunctionKind::Analyser(AnalyserJunction::default()), 2, &mut live)
            .unwrap();
        let dest = arena.insert(JunctionKind::Destination, 2, &mut live).unwrap();

        arena.tap(a, meter, &mut live);
        arena.connect(a, dest, &mut live);
        arena.disconnect(a, &mut live);

        let pa = arena.get(a).unwrap().primitive().unwrap();
        let pm = arena.get(meter).unwrap().primitive().unwrap();
        assert_eq!(ctx.outputs(pa), vec![pm]);
    }

    #[test]
    fn test_empty_chain_is_pass_through() {
        let ctx = HeadlessContext::default();
        let mut live = ctx.clone();
        let mut arena = JunctionArena::new();
        let chain = arena.insert(empty_chain(), 2, &mut live).unwrap();
        let dest = arena.insert(JunctionKind::Destination, 2, &mut live).unwrap();
        arena.connect(chain, dest, &mut live);

        assert_eq!(arena.live_entry(chain), arena.live_entry(dest));
    }

    #[test]
    #[should_panic(expected = "no downstream junction")]
    fn test_empty_unconnected_chain_has_no_entry() {
        let mut live = HeadlessContext::default();
        let mut arena = JunctionArena::new();
        let chain = arena.insert(empty_chain(), 2, &mut live).unwrap();
        arena.live_entry(chain);
    }

    #[test]
    #[should_panic(expected = "connects per channel")]
    fn test_splitter_rejects_plain_connect() {
        let mut live = HeadlessContext::default();
        let mut arena = JunctionArena::new();
        let splitter = arena
            .insert(
                JunctionKind::ChannelSplitter(ChannelSplitterJunction::default()),
                2,
                &mut live,
            )
            .unwrap();
        let dest = arena.insert(JunctionKind::Destination, 2, &mut live).unwrap();
        arena.connect(splitter, dest, &mut live);
    }

    #[test]
    fn test_clean_up_is_idempotent() {
        let ctx = HeadlessContext::default();
        let mut live = ctx.clone();
        let mut arena = JunctionArena::new();
        let a = arena.insert(gain(1.0), 2, &mut live).unwrap();
        let dest = arena.insert(JunctionKind::Destination, 2, &mut live).unwrap();
        arena.connect(a, dest, &mut live);
        let pa = arena.get(a).unwrap().primitive().unwrap();

        arena.clean_up(a, &mut live);
        arena.clean_up(a, &mut live);
        arena.remove(a, &mut live);
        arena.remove(a, &mut live);

        assert!(ctx.primitive(pa).unwrap().released);
        assert!(!arena.contains(a));
        assert!(arena.get(dest).unwrap().upstream().is_empty());
    }

    #[test]
    fn test_offline_entry_mirrors_downstream_once() {
        let live_ctx = HeadlessContext::default();
        let mut live = live_ctx.clone();
        let offline_ctx = HeadlessContext::default();
        let mut arena = JunctionArena::new();

        let a = arena.insert(gain(0.25), 2, &mut live).unwrap();
        let chain = arena.insert(empty_chain(), 2, &mut live).unwrap();
        let dest = arena.insert(JunctionKind::Destination, 2, &mut live).unwrap();
        arena.connect(chain, dest, &mut live);
        arena.connect(a, chain, &mut live);

        let mut offline = OfflineRender::new(offline_ctx.clone());
        let live_before = live_ctx.live_primitives().len();
        {
            let mut access = ContextAccessor::new(&mut live, Some(&mut offline));
            let first = arena.obtain_entry(a, &mut access).unwrap();
            let again = arena.obtain_entry(a, &mut access).unwrap();
            assert_eq!(first, again);

            let record = offline_ctx.primitive(first).unwrap();
            assert_eq!(record.kind, PrimitiveKind::Gain);
            assert_eq!(record.params.get(&Param::Gain), Some(&0.25));
        }

        // Gain and destination only: the empty chain has no primitive.
        assert_eq!(offline.mirror_count(), 2);
        assert_eq!(live_ctx.live_primitives().len(), live_before);
        let mirror_a = offline.mirror_of(a).unwrap();
        let mirror_dest = offline.mirror_of(dest).unwrap();
        assert_eq!(offline_ctx.outputs(mirror_a), vec![mirror_dest]);
    }
}
