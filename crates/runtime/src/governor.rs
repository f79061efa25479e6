use std::collections::VecDeque;

use foundation::time::Time;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::device::DeviceProfile;

/// Where the page is in its 3D loading lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LoadingPhase {
    #[default]
    Idle,
    Loading3d,
    Loaded,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GovernorConfig {
    /// Smoothed FPS below this counts as low performance.
    pub low_fps_threshold: f64,
    /// How long low performance must hold before background work pauses.
    pub sustain_s: f64,
    /// Number of samples in the rolling window.
    pub window: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            low_fps_threshold: 15.0,
            sustain_s: 5.0,
            window: 10,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct GovernorState {
    pub loading_phase: LoadingPhase,
    pub background_paused: bool,
    pub low_fps_since: Option<Time>,
}

/// Bounded rolling window of FPS samples.
#[derive(Debug, Clone)]
pub struct FpsWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl FpsWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, fps: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(fps);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }
}

/// Frame-rate driven controller for decorative background rendering.
///
/// Driven entirely by the caller: phase changes and one FPS sample per
/// report, each stamped with the caller's clock. Nothing here schedules
/// timers of its own.
///
/// Pausing because of sustained low FPS is one-directional. Only
/// [`PerformanceGovernor::resume_background`], called by the rendering
/// consumer, clears the flag again.
#[derive(Debug, Clone)]
pub struct PerformanceGovernor {
    config: GovernorConfig,
    state: GovernorState,
    window: FpsWindow,
    background_fps_cap: Option<u32>,
}

impl Default for PerformanceGovernor {
    fn default() -> Self {
        Self::new(GovernorConfig::default())
    }
}

impl PerformanceGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            state: GovernorState::default(),
            window: FpsWindow::new(config.window),
            background_fps_cap: None,
        }
    }

    pub fn with_profile(mut self, profile: &DeviceProfile) -> Self {
        self.background_fps_cap = Some(profile.background_fps_cap);
        self
    }

    pub fn config(&self) -> GovernorConfig {
        self.config
    }

    pub fn state(&self) -> GovernorState {
        self.state
    }

    pub fn loading_phase(&self) -> LoadingPhase {
        self.state.loading_phase
    }

    pub fn background_paused(&self) -> bool {
        self.state.background_paused
    }

    pub fn background_fps_cap(&self) -> Option<u32> {
        self.background_fps_cap
    }

    pub fn smoothed_fps(&self) -> Option<f64> {
        self.window.mean()
    }

    pub fn set_loading_phase(&mut self, phase: LoadingPhase) {
        let previous = self.state.loading_phase;
        self.state.loading_phase = phase;

        if phase == LoadingPhase::Loading3d {
            if !self.state.background_paused {
                debug!("background paused for 3d load");
            }
            self.state.background_paused = true;
        } else if previous == LoadingPhase::Loading3d {
            self.state.low_fps_since = None;
        }
    }

    pub fn report_fps(&mut self, fps: f64, now: Time) {
        self.window.push(fps);
        let Some(avg) = self.window.mean() else {
            return;
        };

        let low = avg < self.config.low_fps_threshold;
        if !low || self.state.loading_phase != LoadingPhase::Loaded {
            self.state.low_fps_since = None;
            return;
        }

        let since = *self.state.low_fps_since.get_or_insert(now);
        if !self.state.background_paused && now.since(since) >= self.config.sustain_s {
            info!(
                smoothed_fps = avg,
                held_s = now.since(since),
                "sustained low frame rate, pausing background rendering"
            );
            self.state.background_paused = true;
        }
    }

    /// Consumer-initiated resume of background work.
    pub fn resume_background(&mut self) {
        self.state.background_paused = false;
        self.state.low_fps_since = None;
    }
}

static GOVERNOR: Lazy<Mutex<PerformanceGovernor>> =
    Lazy::new(|| Mutex::new(PerformanceGovernor::default()));
static GOVERNOR_PROFILED: OnceCell<()> = OnceCell::new();

/// The process-wide governor shared by every rendering consumer.
pub fn governor() -> &'static Mutex<PerformanceGovernor> {
    &GOVERNOR
}

/// Seeds the shared governor from the device profile once; later calls are no-ops.
pub fn init_governor(profile: &DeviceProfile) -> &'static Mutex<PerformanceGovernor> {
    GOVERNOR_PROFILED.get_or_init(|| {
        GOVERNOR.lock().background_fps_cap = Some(profile.background_fps_cap);
    });
    &GOVERNOR
}

#[cfg(test)]
mod tests {
    use super::{FpsWindow, LoadingPhase, PerformanceGovernor, governor, init_governor};
    use crate::device::{DeviceProfile, DeviceTier};
    use foundation::time::Time;

    fn loaded() -> PerformanceGovernor {
        let mut g = PerformanceGovernor::default();
        g.set_loading_phase(LoadingPhase::Loaded);
        g
    }

    #[test]
    fn window_keeps_last_ten() {
        let mut w = FpsWindow::new(10);
        for _ in 0..10 {
            w.push(60.0);
        }
        w.push(10.0);
        assert_eq!(w.len(), 10);
        assert_eq!(w.mean(), Some(55.0));
    }

    #[test]
    fn sustained_low_fps_pauses_background() {
        let mut g = loaded();
        for i in 0..10 {
            g.report_fps(10.0, Time(i as f64 * 0.5));
        }
        // 4.5 s of evidence is not enough yet.
        assert!(!g.background_paused());
        g.report_fps(10.0, Time(5.0));
        assert!(g.background_paused());
    }

    #[test]
    fn single_dip_does_not_pause() {
        let mut g = loaded();
        g.report_fps(10.0, Time(0.0));
        for i in 1..40 {
            g.report_fps(60.0, Time(i as f64 * 0.5));
        }
        assert!(!g.background_paused());
        assert_eq!(g.state().low_fps_since, None);
    }

    #[test]
    fn recovery_resets_the_timer() {
        let mut g = loaded();
        for i in 0..8 {
            g.report_fps(10.0, Time(i as f64 * 0.5));
        }
        assert_eq!(g.state().low_fps_since, Some(Time(0.0)));
        for i in 8..20 {
            g.report_fps(60.0, Time(i as f64 * 0.5));
        }
        assert_eq!(g.state().low_fps_since, None);
        assert!(!g.background_paused());
    }

    #[test]
    fn low_fps_outside_loaded_phase_is_ignored() {
        let mut g = PerformanceGovernor::default();
        for i in 0..30 {
            g.report_fps(5.0, Time(i as f64));
        }
        assert!(!g.background_paused());
        assert_eq!(g.state().low_fps_since, None);
    }

    #[test]
    fn entering_3d_load_always_pauses() {
        let mut g = loaded();
        for i in 0..10 {
            g.report_fps(60.0, Time(i as f64));
        }
        g.set_loading_phase(LoadingPhase::Loading3d);
        assert!(g.background_paused());
    }

    #[test]
    fn leaving_3d_load_clears_timer_but_not_pause() {
        let mut g = loaded();
        for i in 0..4 {
            g.report_fps(5.0, Time(i as f64));
        }
        assert!(g.state().low_fps_since.is_some());
        g.set_loading_phase(LoadingPhase::Loading3d);
        g.set_loading_phase(LoadingPhase::Loaded);
        assert_eq!(g.state().low_fps_since, None);
        assert!(g.background_paused());

        g.resume_background();
        assert!(!g.background_paused());
    }

    #[test]
    fn pause_is_not_undone_by_recovery() {
        let mut g = loaded();
        for i in 0..=10 {
            g.report_fps(5.0, Time(i as f64));
        }
        assert!(g.background_paused());
        for i in 11..40 {
            g.report_fps(60.0, Time(i as f64));
        }
        assert!(g.background_paused());
    }

    #[test]
    fn shared_governor_takes_profile_once() {
        let low = DeviceProfile::for_tier(DeviceTier::Low);
        let high = DeviceProfile::for_tier(DeviceTier::High);
        init_governor(&low);
        init_governor(&high);
        assert_eq!(governor().lock().background_fps_cap(), Some(low.background_fps_cap));
    }
}
