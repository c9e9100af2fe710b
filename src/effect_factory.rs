// src/effect_factory.rs

use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::junction::{
    CompressorJunction, FilterJunction, GainJunction, JunctionKind, PanJunction, ReverbJunction,
    db_to_linear,
};
use crate::state::{EffectDef, EffectKind, EffectParam};

/// Builds the junction variant realizing one effect kind.
///
/// Only used when an effect is added to a chain.
pub trait EffectFactory {
    fn create(&self, effect: &EffectDef) -> JunctionKind;
}

impl<F> EffectFactory for F
where
    F: Fn(&EffectDef) -> JunctionKind,
{
    fn create(&self, effect: &EffectDef) -> JunctionKind {
        self(effect)
    }
}

/// Lookup table from effect kind to junction constructor.
#[derive(Default)]
pub struct EffectRegistry {
    factories: HashMap<EffectKind, Box<dyn EffectFactory>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every standard effect kind registered.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        register_standard_effects(&mut registry);
        registry
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register(&mut self, kind: EffectKind, factory: impl EffectFactory + 'static) {
        self.factories.insert(kind, Box::new(factory));
    }

    pub fn is_registered(&self, kind: EffectKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = EffectKind> + '_ {
        self.factories.keys().copied()
    }

    /// Fails on the first effect kind without a constructor.
    pub fn validate(&self) -> EngineResult<()> {
        match EffectKind::ALL.into_iter().find(|&kind| !self.is_registered(kind)) {
            Some(kind) => Err(EngineError::MissingEffectConstructor(kind)),
            None => Ok(()),
        }
    }

    /// Junction variant for `effect`.
    ///
    /// # Panics
    ///
    /// If no constructor is registered for the kind. Registries are checked
    /// with [`validate`](Self::validate) before a graph accepts them.
    pub fn build(&self, effect: &EffectDef) -> JunctionKind {
        match self.factories.get(&effect.kind) {
            Some(factory) => factory.create(effect),
            None => panic!("no constructor registered for {:?}", effect.kind),
        }
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.iter().collect();
        kinds.sort();
        f.debug_struct("EffectRegistry").field("kinds", &kinds).finish()
    }
}

/// Register the constructors for every built-in effect kind.
pub fn register_standard_effects(registry: &mut EffectRegistry) {
    for kind in EffectKind::ALL {
        if let Some(filter) = kind.filter_type() {
            registry.register(kind, move |effect: &EffectDef| {
                JunctionKind::Filter(FilterJunction::from_effect(filter, effect))
            });
        }
    }
    registry.register(EffectKind::Gain, |effect: &EffectDef| {
        JunctionKind::Gain(GainJunction {
            gain: db_to_linear(effect.param(EffectParam::Gain)),
        })
    });
    registry.register(EffectKind::Pan, |effect: &EffectDef| {
        JunctionKind::Pan(PanJunction {
            pan: effect.param(EffectParam::Pan),
        })
    });
    registry.register(EffectKind::DynamicCompressor, |effect: &EffectDef| {
        JunctionKind::DynamicCompressor(CompressorJunction::from_effect(effect))
    });
    registry.register(EffectKind::Reverb, |effect: &EffectDef| {
        JunctionKind::Reverb(ReverbJunction::from_effect(effect))
    });
}
