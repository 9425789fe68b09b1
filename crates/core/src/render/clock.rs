/// Longest step the clock accepts in one tick, in seconds. Longer gaps (a
/// backgrounded window, a debugger pause) advance by this much instead.
pub const MAX_FRAME_DELTA: f32 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct FrameClock {
    pub time_seconds: f32,
    pub frame: u64,
    max_delta: f32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(MAX_FRAME_DELTA)
    }
}

impl FrameClock {
    pub fn new(max_delta: f32) -> Self {
        Self {
            time_seconds: 0.0,
            frame: 0,
            max_delta: max_delta.max(0.0),
        }
    }

    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
        self.frame = 0;
    }

    /// Advances by `delta` seconds and returns the new elapsed time. Negative
    /// and non-finite deltas leave the time unchanged.
    pub fn advance(&mut self, delta: f32) -> f32 {
        if delta.is_finite() && delta > 0.0 {
            self.time_seconds += delta.min(self.max_delta);
        }
        self.frame += 1;
        self.time_seconds
    }
}
