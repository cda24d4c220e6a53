use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Tightest box around `points`, or `None` if there are none.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bb = Self { min: first, max: first };
        for p in iter {
            bb.include(p);
        }
        Some(bb)
    }

    pub fn include(&mut self, p: [f64; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut bb = *self;
        bb.include(other.min);
        bb.include(other.max);
        bb
    }

    /// Inclusive overlap test in 3D; touching boxes intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && self.max[i] >= other.min[i])
    }

    /// Inclusive overlap test ignoring z.
    pub fn intersects_xy(&self, other: &Self) -> bool {
        (0..2).all(|i| self.min[i] <= other.max[i] && self.max[i] >= other.min[i])
    }

    /// Overlap region, if any.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for i in 0..3 {
            min[i] = self.min[i].max(other.min[i]);
            max[i] = self.max[i].min(other.max[i]);
        }
        Some(Self { min, max })
    }

    pub fn contains_point(&self, p: [f64; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    pub fn center(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn depth(&self) -> f64 {
        self.max[2] - self.min[2]
    }

    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min: [self.min[0] - margin, self.min[1] - margin, self.min[2] - margin],
            max: [self.max[0] + margin, self.max[1] + margin, self.max[2] + margin],
        }
    }

    /// The eight corners, for re-boxing after a rotation.
    pub fn corners(&self) -> [[f64; 3]; 8] {
        let (a, b) = (self.min, self.max);
        [
            [a[0], a[1], a[2]],
            [b[0], a[1], a[2]],
            [a[0], b[1], a[2]],
            [b[0], b[1], a[2]],
            [a[0], a[1], b[2]],
            [b[0], a[1], b[2]],
            [a[0], b[1], b[2]],
            [b[0], b[1], b[2]],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let bb = BoundingBox::from_points([[1.0, 5.0, 0.0], [-2.0, 3.0, 1.0], [0.0, 7.0, -1.0]])
            .unwrap();
        assert_eq!(bb.min, [-2.0, 3.0, -1.0]);
        assert_eq!(bb.max, [1.0, 7.0, 1.0]);
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_touching_boxes_intersect() {
        let a = BoundingBox::new([0.0; 3], [10.0, 10.0, 0.0]);
        let b = BoundingBox::new([10.0, 0.0, 0.0], [20.0, 10.0, 0.0]);
        assert!(a.intersects(&b));
        let overlap = a.intersection(&b).unwrap();
        assert_eq!(overlap.width(), 0.0);
        assert_eq!(overlap.height(), 10.0);

        let c = BoundingBox::new([10.5, 0.0, 0.0], [20.0, 10.0, 0.0]);
        assert!(!a.intersects(&c));
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn test_center_and_union() {
        let a = BoundingBox::new([0.0; 3], [2.0, 2.0, 2.0]);
        let b = BoundingBox::new([4.0, 4.0, 4.0], [6.0, 6.0, 6.0]);
        assert_eq!(a.union(&b).center(), [3.0, 3.0, 3.0]);
    }
}
