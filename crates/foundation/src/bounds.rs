/// Axis-aligned screen-space rectangle (CSS pixels, y grows downward).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Rect {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Rect { min, max }
    }

    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            min: [x, y],
            max: [x + width, y + height],
        }
    }

    pub fn width(&self) -> f64 {
        (self.max[0] - self.min[0]).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max[1] - self.min[1]).max(0.0)
    }

    /// Grows the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Rect {
            min: [self.min[0] - margin, self.min[1] - margin],
            max: [self.max[0] + margin, self.max[1] + margin],
        }
    }

    /// Touching edges count as intersecting, matching how browsers report
    /// zero-area intersections for elements sitting on the viewport edge.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min[0] <= other.max[0]
            && self.max[0] >= other.min[0]
            && self.min[1] <= other.max[1]
            && self.max[1] >= other.min[1]
    }
}

#[cfg(test)]
mod tests {
    use super::Rect;

    #[test]
    fn expand_then_intersect() {
        let viewport = Rect::from_origin_size(0.0, 0.0, 800.0, 600.0);
        let below = Rect::from_origin_size(0.0, 700.0, 100.0, 100.0);
        assert!(!viewport.intersects(&below));
        assert!(viewport.expand(100.0).intersects(&below));
    }

    #[test]
    fn degenerate_sizes_clamp_to_zero() {
        let r = Rect::new([10.0, 10.0], [5.0, 20.0]);
        assert_eq!(r.width(), 0.0);
        assert_eq!(r.height(), 10.0);
    }
}
