// src/junction/effect_chain.rs
//
// Ordered, mutable chains of effect junctions.
//
// A non-empty chain wires effect i into effect i+1 and the last effect into
// the chain's downstream neighbour. An empty chain forwards straight to its
// neighbour. Every structural change returns `ChainSignal::ReconnectRequested`
// because whatever feeds the chain may still be linked into a stale entry.

use super::{ChainSignal, JunctionArena, JunctionId, JunctionKind};
use crate::context::RenderContext;
use crate::effect_factory::EffectRegistry;
use crate::error::{EngineError, EngineResult};
use crate::state::{EffectDef, EffectList, EffectParam};

/// Effect junctions in processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectChainJunction {
    pub(crate) effects: Vec<JunctionId>,
}

impl EffectChainJunction {
    #[inline]
    pub fn effects(&self) -> &[JunctionId] {
        &self.effects
    }
}

/// Result of walking a chain from its entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainWalk {
    /// Effects visited before leaving the chain.
    pub visited: Vec<JunctionId>,
    /// First junction outside the chain, if the walk left it.
    pub exit: Option<JunctionId>,
}

impl JunctionArena {
    fn chain(&self, chain: JunctionId) -> &EffectChainJunction {
        match &self.node(chain).kind {
            JunctionKind::EffectChain(c) => c,
            other => panic!("junction {chain:?} is a {}, not an effect chain", other.name()),
        }
    }

    fn chain_mut(&mut self, chain: JunctionId) -> &mut EffectChainJunction {
        match &mut self.node_mut(chain).kind {
            JunctionKind::EffectChain(c) => c,
            other => panic!("junction {chain:?} is a {}, not an effect chain", other.name()),
        }
    }

    /// Effect junctions of a chain, in processing order.
    pub fn chain_effects(&self, chain: JunctionId) -> &[JunctionId] {
        &self.chain(chain).effects
    }

    /// Build the effects of `list` into an empty chain.
    pub fn populate_chain(
        &mut self,
        chain: JunctionId,
        list: &EffectList,
        registry: &EffectRegistry,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<()> {
        for (index, effect) in list.iter().enumerate() {
            let _ = self.insert_effect(chain, effect, index, registry, ctx)?;
        }
        Ok(())
    }

    /// Build a junction for `effect` and splice it in at `index`.
    pub fn insert_effect(
        &mut self,
        chain: JunctionId,
        effect: &EffectDef,
        index: usize,
        registry: &EffectRegistry,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<ChainSignal> {
        let (len, channels, chain_next) = {
            let node = self.node(chain);
            (self.chain(chain).effects.len(), node.channels, node.next)
        };
        if index > len {
            return Err(EngineError::EffectIndexOutOfRange { index, len });
        }

        let junction = self.insert(registry.build(effect), channels, ctx)?;
        let following = self.chain(chain).effects.get(index).copied();
        match following.or(chain_next) {
            Some(target) => self.connect(junction, target, ctx),
            None => log::debug!("chain {chain:?} has no downstream yet; {junction:?} left open"),
        }
        if index > 0 {
            let before = self.chain(chain).effects[index - 1];
            self.connect(before, junction, ctx);
        }
        self.chain_mut(chain).effects.insert(index, junction);

        log::debug!("chain {chain:?}: inserted {:?} at {index}", effect.kind);
        Ok(ChainSignal::ReconnectRequested)
    }

    /// Detach and clean up the effect at `index`.
    pub fn remove_effect(
        &mut self,
        chain: JunctionId,
        index: usize,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<ChainSignal> {
        let effects = &self.chain(chain).effects;
        let len = effects.len();
        let Some(&removed) = effects.get(index) else {
            return Err(EngineError::EffectIndexOutOfRange { index, len });
        };
        let removed_next = self.next_of(removed);

        self.chain_mut(chain).effects.remove(index);
        if index > 0 {
            let before = self.chain(chain).effects[index - 1];
            match removed_next {
                Some(target) => self.connect(before, target, ctx),
                None => self.disconnect(before, ctx),
            }
        }
        self.remove(removed, ctx);

        log::debug!("chain {chain:?}: removed effect at {index}");
        Ok(ChainSignal::ReconnectRequested)
    }

    /// Move the effect at `from` so it ends up at index `to`.
    ///
    /// Old-side stitching happens before the effect is reinserted.
    pub fn move_effect(
        &mut self,
        chain: JunctionId,
        from: usize,
        to: usize,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<ChainSignal> {
        let len = self.chain(chain).effects.len();
        for index in [from, to] {
            if index >= len {
                return Err(EngineError::EffectIndexOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(ChainSignal::Unchanged);
        }

        let moved = self.chain(chain).effects[from];
        let old_next = self.next_of(moved);
        self.disconnect(moved, ctx);

        // Stitch the old predecessor to the old successor.
        if from > 0 {
            let before = self.chain(chain).effects[from - 1];
            match old_next {
                Some(target) => self.connect(before, target, ctx),
                None => self.disconnect(before, ctx),
            }
        }
        self.chain_mut(chain).effects.remove(from);

        // Stitch the new neighbours around the moved effect.
        if to > 0 {
            let before = self.chain(chain).effects[to - 1];
            self.connect(before, moved, ctx);
        }
        let after = self
            .chain(chain)
            .effects
            .get(to)
            .copied()
            .or(self.next_of(chain));
        if let Some(target) = after {
            self.connect(moved, target, ctx);
        }
        self.chain_mut(chain).effects.insert(to, moved);

        log::debug!("chain {chain:?}: moved effect {from} -> {to}");
        Ok(ChainSignal::ReconnectRequested)
    }

    /// Update one parameter of the effect at `index` in place.
    pub fn set_chain_effect_param(
        &mut self,
        chain: JunctionId,
        index: usize,
        param: EffectParam,
        value: f32,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<()> {
        let effects = &self.chain(chain).effects;
        let len = effects.len();
        let Some(&effect) = effects.get(index) else {
            return Err(EngineError::EffectIndexOutOfRange { index, len });
        };
        if !self.set_effect_param(effect, param, value, ctx) {
            log::warn!("effect {effect:?} ignored parameter {param:?}");
        }
        Ok(())
    }

    /// Follow downstream links from the chain's first effect until leaving
    /// the chain.
    pub fn walk_chain(&self, chain: JunctionId) -> ChainWalk {
        let members = &self.chain(chain).effects;
        let mut visited = Vec::new();
        let mut cursor = match members.first() {
            Some(&first) => Some(first),
            None => self.next_of(chain),
        };
        while let Some(id) = cursor {
            // A repeat means a cycle; stop with the repeat as the exit.
            if !members.contains(&id) || visited.contains(&id) {
                break;
            }
            visited.push(id);
            cursor = self.next_of(id);
        }
        ChainWalk {
            visited,
            exit: cursor,
        }
    }
}
