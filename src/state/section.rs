// src/state/section.rs
//
// Placed regions of audio on a track's timeline.

use crate::error::{EngineError, EngineResult};

/// Unique identifier for a section.
pub type SectionId = u32;

/// Unique identifier for an audio buffer known to the rendering context.
pub type BufferId = u32;

/// A playable window of an audio buffer placed at `begin_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionDef {
    pub id: SectionId,
    pub name: String,
    pub buffer: BufferId,
    /// Sample rate the buffer was recorded at.
    pub sample_rate: f64,
    /// First sample of the window.
    pub begin_sample: u64,
    /// One past the last sample of the window.
    pub end_sample: u64,
    /// Timeline position of the first sample, in seconds.
    pub begin_time: f64,
    pub playback_rate: f64,
}

impl SectionDef {
    pub fn new(
        id: SectionId,
        buffer: BufferId,
        sample_rate: f64,
        begin_sample: u64,
        end_sample: u64,
        begin_time: f64,
    ) -> Self {
        Self {
            id,
            name: format!("Section {id}"),
            buffer,
            sample_rate,
            begin_sample,
            end_sample,
            begin_time,
            playback_rate: 1.0,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.end_sample <= self.begin_sample {
            return Err(EngineError::InvalidSection(format!(
                "section {} has an empty sample window ({}..{})",
                self.id, self.begin_sample, self.end_sample
            )));
        }
        if !(self.sample_rate > 0.0) {
            return Err(EngineError::InvalidSection(format!(
                "section {} has sample rate {}",
                self.id, self.sample_rate
            )));
        }
        if !(self.playback_rate > 0.0) {
            return Err(EngineError::InvalidSection(format!(
                "section {} has playback rate {}",
                self.id, self.playback_rate
            )));
        }
        Ok(())
    }

    /// Length of the buffer window in buffer seconds.
    #[inline]
    pub fn window_duration(&self) -> f64 {
        (self.end_sample - self.begin_sample) as f64 / self.sample_rate
    }

    /// Length on the timeline, accounting for playback rate.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.window_duration() / self.playback_rate
    }

    #[inline]
    pub fn end_time(&self) -> f64 {
        self.begin_time + self.duration()
    }

    /// Whether the timeline position lies in `[begin_time, end_time)`.
    #[inline]
    pub fn covers(&self, time: f64) -> bool {
        time >= self.begin_time && time < self.end_time()
    }
}
