use foundation::time::Time;

// Frame timestamps carry jitter; allow a hair under the nominal interval.
const INTERVAL_SLACK_S: f64 = 1e-4;

/// Turns per-frame timestamps into one FPS sample per elapsed second.
#[derive(Debug, Clone, Default)]
pub struct FpsMeter {
    window_start: Option<Time>,
    frames: u32,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at `now` and returns a sample once a second has passed.
    pub fn on_frame(&mut self, now: Time) -> Option<f64> {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            self.frames = 0;
            return None;
        };

        self.frames += 1;
        let elapsed = now.since(start);
        if elapsed < 1.0 {
            return None;
        }

        let fps = self.frames as f64 / elapsed;
        self.window_start = Some(now);
        self.frames = 0;
        Some(fps)
    }
}

/// Per-frame gate for decorative background animation.
///
/// Skips ticks to stay under the device's background FPS cap and renders
/// nothing at all while the governor reports background work as paused.
#[derive(Debug, Clone)]
pub struct BackgroundPacer {
    interval_s: f64,
    last_tick: Option<Time>,
}

impl BackgroundPacer {
    pub fn new(fps_cap: u32) -> Self {
        Self {
            interval_s: 1.0 / fps_cap.max(1) as f64,
            last_tick: None,
        }
    }

    pub fn interval_s(&self) -> f64 {
        self.interval_s
    }

    pub fn should_render(&mut self, now: Time, background_paused: bool) -> bool {
        if background_paused {
            return false;
        }
        if let Some(last) = self.last_tick {
            if now.since(last) + INTERVAL_SLACK_S < self.interval_s {
                return false;
            }
        }
        self.last_tick = Some(now);
        true
    }
}
