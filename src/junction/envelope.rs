// src/junction/envelope.rs
//
// Volume automation as scheduled gain ramps.
//
// Ramps already scheduled on a gain primitive cannot be cancelled reliably,
// so every restart swaps in a fresh primitive and plans it from scratch.

use super::{JunctionArena, JunctionId, JunctionKind};
use crate::context::{Param, PrimitiveId, PrimitiveKind, PrimitiveSpec, RenderContext};
use crate::error::EngineResult;
use crate::state::ControlPoint;

/// Seconds past the last point at which a holding ramp repeats its value.
///
/// Keeps the final ramp in effect even when it was scheduled before the
/// sources feeding the envelope start.
pub const HOLD_RAMP_OFFSET: f64 = 1e5;

/// Gain automation of one track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeEnvelopeJunction {
    /// Sorted by time.
    pub(crate) points: Vec<ControlPoint>,
}

impl VolumeEnvelopeJunction {
    pub fn new(points: &[ControlPoint]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }

    #[inline]
    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }
}

/// Initial gain plus linear ramps, as absolute `(value, context time)` pairs
/// in time order.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopePlan {
    pub initial: f32,
    pub ramps: Vec<(f32, f64)>,
}

impl EnvelopePlan {
    /// Write the plan onto a gain primitive.
    pub fn apply(&self, ctx: &mut dyn RenderContext, primitive: PrimitiveId) {
        ctx.set_param(primitive, Param::Gain, self.initial);
        for &(value, at) in &self.ramps {
            ctx.linear_ramp(primitive, Param::Gain, value, at);
        }
    }
}

/// Plan the gain of an envelope started at timeline position `start` when
/// the context clock reads `now`.
///
/// Without points the gain is a flat 1.0. Otherwise the initial value is the
/// first point's value before the first point, the last point's value after
/// the last one, and the linear interpolation in between.
pub fn plan_envelope(points: &[ControlPoint], start: f64, now: f64) -> EnvelopePlan {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return EnvelopePlan {
            initial: 1.0,
            ramps: Vec::new(),
        };
    };

    let after = points.partition_point(|p| p.time < start);
    let initial = if after == 0 {
        first.value
    } else if after == points.len() {
        last.value
    } else {
        let (a, b) = (points[after - 1], points[after]);
        let span = b.time - a.time;
        let ratio = if span > 0.0 { (start - a.time) / span } else { 1.0 };
        a.value + ratio as f32 * (b.value - a.value)
    };

    let upcoming = &points[after..];
    let mut ramps = Vec::with_capacity(upcoming.len() + 2);
    // Anchor the automation at the current value.
    ramps.push((initial, now));
    ramps.extend(upcoming.iter().map(|p| (p.value, now + p.time - start)));
    if !upcoming.is_empty() {
        ramps.push((last.value, now + HOLD_RAMP_OFFSET + last.time - start));
    }

    EnvelopePlan { initial, ramps }
}

impl JunctionArena {
    fn envelope_mut(&mut self, id: JunctionId) -> &mut VolumeEnvelopeJunction {
        match &mut self.node_mut(id).kind {
            JunctionKind::VolumeEnvelope(envelope) => envelope,
            other => panic!("junction {id:?} is a {}, not a volume envelope", other.name()),
        }
    }

    /// Replace the control points. Takes effect at the next restart.
    pub fn set_envelope_points(&mut self, id: JunctionId, points: &[ControlPoint]) {
        let envelope = self.envelope_mut(id);
        envelope.points.clear();
        envelope.points.extend_from_slice(points);
    }

    /// Swap in a fresh gain primitive planned for timeline position
    /// `start_time`, linked to the downstream neighbour.
    ///
    /// Whatever fed the old primitive must be reconnected by the caller.
    pub fn restart_envelope(
        &mut self,
        id: JunctionId,
        start_time: f64,
        ctx: &mut dyn RenderContext,
    ) -> EngineResult<()> {
        let channels = self.node(id).channels;
        let fresh = ctx.build(&PrimitiveSpec::new(PrimitiveKind::Gain, channels))?;
        let now = ctx.current_time();
        plan_envelope(&self.envelope_mut(id).points, start_time, now).apply(ctx, fresh);

        let linked = self.next_of(id).map(|next| self.live_entry(next));
        if let Some(entry) = linked {
            ctx.connect(fresh, entry);
        }

        let node = self.node_mut(id);
        let old = node.primitive.replace(fresh);
        node.linked = linked;
        if let Some(old) = old {
            ctx.release(old);
        }
        log::trace!("envelope {id:?}: restarted at {start_time:.3}s");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessContext;
    use crate::junction::GainJunction;

    fn points() -> Vec<ControlPoint> {
        vec![
            ControlPoint::new(2.0, 0.0),
            ControlPoint::new(4.0, 1.0),
            ControlPoint::new(6.0, 0.5),
        ]
    }

    #[test]
    fn test_no_points_is_unity() {
        let plan = plan_envelope(&[], 3.0, 10.0);
        assert_eq!(plan.initial, 1.0);
        assert!(plan.ramps.is_empty());
    }

    #[test]
    fn test_start_before_first_point() {
        let plan = plan_envelope(&points(), 0.0, 10.0);
        assert_eq!(plan.initial, 0.0);
        assert_eq!(
            plan.ramps,
            vec![
                (0.0, 10.0),
                (0.0, 12.0),
                (1.0, 14.0),
                (0.5, 16.0),
                (0.5, 16.0 + HOLD_RAMP_OFFSET),
            ]
        );
    }

    #[test]
    fn test_start_between_points_interpolates() {
        let plan = plan_envelope(&points(), 3.0, 100.0);
        assert_eq!(plan.initial, 0.5);
        assert_eq!(plan.ramps[0], (0.5, 100.0));
        assert_eq!(plan.ramps[1], (1.0, 101.0));
        assert_eq!(plan.ramps[2], (0.5, 103.0));
        assert_eq!(plan.ramps.len(), 4);
    }

    #[test]
    fn test_start_after_last_point_holds() {
        let plan = plan_envelope(&points(), 9.0, 1.0);
        assert_eq!(plan.initial, 0.5);
        assert_eq!(plan.ramps, vec![(0.5, 1.0)]);
    }

    #[test]
    fn test_restart_swaps_primitive() {
        let ctx = HeadlessContext::default();
        let mut live = ctx.clone();
        let mut arena = JunctionArena::new();
        let envelope = arena
            .insert(
                JunctionKind::VolumeEnvelope(VolumeEnvelopeJunction::new(&points())),
                2,
                &mut live,
            )
            .unwrap();
        let gain = arena
            .insert(JunctionKind::Gain(GainJunction { gain: 1.0 }), 2, &mut live)
            .unwrap();
        arena.connect(envelope, gain, &mut live);
        let old = arena.get(envelope).unwrap().primitive().unwrap();

        ctx.set_time(50.0);
        arena.restart_envelope(envelope, 3.0, &mut live).unwrap();

        let fresh = arena.get(envelope).unwrap().primitive().unwrap();
        assert_ne!(old, fresh);
        assert!(ctx.primitive(old).unwrap().released);
        assert_eq!(ctx.param(fresh, Param::Gain), Some(0.5));
        assert_eq!(ctx.outputs(fresh), vec![arena.live_entry(gain)]);

        let ramps = ctx.primitive(fresh).unwrap().ramps;
        assert_eq!(ramps.len(), 4);
        assert_eq!(ramps[1].at, 51.0);
    }
}
