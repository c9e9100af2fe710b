// src/config.rs
//
// Graph-wide configuration.

/// Output channel count of the master bus and every track.
pub const DEFAULT_CHANNELS: usize = 2;

/// Analyser FFT size. Gives a frequency bin count of 256.
pub const DEFAULT_ANALYSER_FFT_SIZE: u32 = 512;

/// Analyser smoothing time constant. Meters want raw frames.
pub const DEFAULT_ANALYSER_SMOOTHING: f32 = 0.0;

/// Configuration for an [`AudioGraph`](crate::AudioGraph).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphConfig {
    /// Output channel count. One channel analyser is built per channel.
    pub channels: usize,
    /// FFT size of every analyser junction.
    pub analyser_fft_size: u32,
    /// Smoothing time constant of every analyser junction.
    pub analyser_smoothing: f32,
    /// Schedule the sections of muted tracks during offline renders.
    pub render_muted_tracks: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            analyser_fft_size: DEFAULT_ANALYSER_FFT_SIZE,
            analyser_smoothing: DEFAULT_ANALYSER_SMOOTHING,
            render_muted_tracks: false,
        }
    }
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    pub fn with_analyser(mut self, fft_size: u32, smoothing: f32) -> Self {
        self.analyser_fft_size = fft_size;
        self.analyser_smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    pub fn with_render_muted_tracks(mut self, render: bool) -> Self {
        self.render_muted_tracks = render;
        self
    }
}
