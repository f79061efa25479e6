use foundation::bounds::Rect;
use tracing::debug;

/// How far outside the viewport a container may be and still start loading.
pub const LOOKAHEAD_MARGIN_PX: f64 = 200.0;

/// Host viewport watch for one container (an intersection observer).
pub trait VisibilityWatch {
    fn disconnect(&mut self);
}

/// One-shot latch deferring 3D work until its container nears the viewport.
///
/// Contract:
/// - Starts not visible.
/// - Flips to visible at most once, on the first intersection report that
///   overlaps the viewport grown by the look-ahead margin.
/// - The watch is disconnected on that flip, on [`LazyGate::detach`], or when
///   the gate is dropped, whichever comes first.
#[derive(Debug)]
pub struct LazyGate<W: VisibilityWatch> {
    margin: f64,
    watch: Option<W>,
    visible: bool,
}

impl<W: VisibilityWatch> Default for LazyGate<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: VisibilityWatch> LazyGate<W> {
    pub fn new() -> Self {
        Self::with_margin(LOOKAHEAD_MARGIN_PX)
    }

    pub fn with_margin(margin: f64) -> Self {
        Self {
            margin,
            watch: None,
            visible: false,
        }
    }

    /// Attaches the container's watch and reports whether loading may begin.
    pub fn attach(&mut self, mut watch: W) -> bool {
        if self.visible {
            watch.disconnect();
            return true;
        }
        self.detach();
        self.watch = Some(watch);
        false
    }

    pub fn should_load(&self) -> bool {
        self.visible
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Feeds one intersection report. Returns `true` only on the transition.
    pub fn on_intersection(&mut self, container: Rect, viewport: Rect) -> bool {
        if self.visible || !viewport.expand(self.margin).intersects(&container) {
            return false;
        }
        debug!(margin = self.margin, "container near viewport, starting 3d load");
        self.visible = true;
        self.detach();
        true
    }

    pub fn detach(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.disconnect();
        }
    }
}

impl<W: VisibilityWatch> Drop for LazyGate<W> {
    fn drop(&mut self) {
        self.detach();
    }
}
