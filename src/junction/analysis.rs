// src/junction/analysis.rs
//
// Channel splitting and analyser reads for meters and visualizers.

use super::{JunctionArena, JunctionId, JunctionKind};
use crate::context::{PrimitiveId, RenderContext};

impl JunctionArena {
    /// Feed `to` from output `channel` of a channel splitter, replacing any
    /// junction previously mapped to that channel.
    pub fn connect_channel(
        &mut self,
        splitter: JunctionId,
        channel: usize,
        to: JunctionId,
        ctx: &mut dyn RenderContext,
    ) {
        let entry = self.live_entry(to);
        let node = self.node_mut(splitter);
        let Some(primitive) = node.primitive else {
            panic!("channel splitter {splitter:?} has no live primitive");
        };
        let JunctionKind::ChannelSplitter(split) = &mut node.kind else {
            panic!("junction {splitter:?} is not a channel splitter");
        };
        assert!(
            channel < node.channels,
            "channel {channel} out of range for a {}-channel splitter",
            node.channels
        );

        let previous = split.outputs.insert(channel, (to, entry));
        if previous.is_some() {
            ctx.disconnect_output(primitive, channel);
        }
        ctx.connect_output(primitive, channel, entry);

        if let Some(old) = previous.and_then(|(old, _)| self.get_mut(old)) {
            old.upstream.retain(|&u| u != splitter);
        }
        if let Some(target) = self.get_mut(to) {
            target.upstream.push(splitter);
        }
        log::debug!("splitter {splitter:?}: channel {channel} -> {to:?}");
    }

    fn analyser_primitive(&self, id: JunctionId) -> Option<PrimitiveId> {
        let node = self.get(id)?;
        match node.kind {
            JunctionKind::Analyser(_) if !node.cleaned_up => node.primitive,
            _ => None,
        }
    }

    /// Number of frequency bins an analyser reports, or 0 once cleaned up.
    pub fn frequency_bin_count(&self, id: JunctionId, ctx: &dyn RenderContext) -> usize {
        self.analyser_primitive(id)
            .map_or(0, |primitive| ctx.frequency_bin_count(primitive))
    }

    /// Copy the analyser's current frequency magnitudes into `out`.
    ///
    /// Returns `false`, leaving `out` untouched, when the analyser is gone.
    pub fn read_frequency_data(&self, id: JunctionId, ctx: &dyn RenderContext, out: &mut [u8]) -> bool {
        match self.analyser_primitive(id) {
            Some(primitive) => {
                ctx.read_frequency_data(primitive, out);
                true
            }
            None => false,
        }
    }

    /// Copy the analyser's current waveform into `out`.
    pub fn read_time_domain_data(&self, id: JunctionId, ctx: &dyn RenderContext, out: &mut [u8]) -> bool {
        match self.analyser_primitive(id) {
            Some(primitive) => {
                ctx.read_time_domain_data(primitive, out);
                true
            }
            None => false,
        }
    }
}
