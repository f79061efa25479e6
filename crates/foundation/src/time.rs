/// Session time in seconds.
///
/// Hosts feed this from their own clock (frame callbacks, `Instant`), so all
/// time-dependent policy stays deterministic and replayable in tests.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64);

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn from_millis(ms: f64) -> Self {
        Time(ms / 1000.0)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    pub fn millis(self) -> f64 {
        self.0 * 1000.0
    }

    pub fn add_seconds(self, s: f64) -> Self {
        Time(self.0 + s)
    }

    /// Seconds elapsed since `earlier`, clamped at zero for out-of-order clocks.
    pub fn since(self, earlier: Time) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}
