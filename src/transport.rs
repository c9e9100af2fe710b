//
// ===============================
// MARK: Playback timing
// ===============================
//

/// Whether an owner of timing state is currently playing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

/// Elapsed-time bookkeeping of one playback owner (the graph, a track, a
/// section).
///
/// This struct:
/// - is copyable
/// - is private to its owner
/// - never reads a clock itself; callers pass the rendering context's `now`
///
/// While playing, the timeline position at context time `t` is
/// `elapsed_into_audio + (t - anchor_wall_clock)`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct PlaybackTiming {
    /// Context clock value at the most recent start.
    anchor_wall_clock: f64,

    /// Timeline position corresponding to the anchor.
    elapsed_into_audio: f64,

    state: PlaybackState,
}

impl PlaybackTiming {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------
    // MARK: Transitions
    // -------------------------------

    /// Idle → Playing (or re-anchor while playing).
    pub fn start(&mut self, elapsed: f64, now: f64) {
        self.elapsed_into_audio = elapsed;
        self.anchor_wall_clock = now;
        self.state = PlaybackState::Playing;
    }

    /// Playing → Idle. The elapsed offset is left as it was at the last start.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Idle;
    }

    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    /// Timeline position at context time `now`.
    ///
    /// While idle this is the elapsed offset recorded at the last start.
    #[inline]
    pub fn position_at(&self, now: f64) -> f64 {
        match self.state {
            PlaybackState::Playing => self.elapsed_into_audio + (now - self.anchor_wall_clock),
            PlaybackState::Idle => self.elapsed_into_audio,
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn elapsed_into_audio(&self) -> f64 {
        self.elapsed_into_audio
    }

    #[inline]
    pub fn anchor_wall_clock(&self) -> f64 {
        self.anchor_wall_clock
    }
}
