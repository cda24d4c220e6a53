//! Planar shapes derived from element geometry.
//!
//! Everything here works in the XY plane. Circles are sampled into polygons,
//! lines and arcs become open paths, and points stay points.

use bim_kernel::{BoundingBox, GeometricEntity};
use serde::{Deserialize, Serialize};

pub type Point2 = [f64; 2];

/// Where a point lies relative to a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Inside,
    Boundary,
    Outside,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "points", rename_all = "snake_case")]
pub enum PlanarShape {
    Point(Point2),
    /// Open polyline.
    Path(Vec<Point2>),
    /// Closed ring; the closing edge is implicit.
    Polygon(Vec<Point2>),
}

impl PlanarShape {
    /// Project an entity onto the XY plane. `segments` controls circle and
    /// arc sampling.
    pub fn from_entity(entity: &GeometricEntity, segments: usize) -> Self {
        let pts: Vec<Point2> = entity.outline(segments).into_iter().map(|[x, y, _]| [x, y]).collect();
        match entity {
            GeometricEntity::Point { .. } => Self::Point(pts.first().copied().unwrap_or([0.0, 0.0])),
            GeometricEntity::Line { .. } | GeometricEntity::Arc { .. } => Self::Path(pts),
            _ if pts.len() >= 3 => Self::Polygon(pts),
            _ => Self::Path(pts),
        }
    }

    pub fn vertices(&self) -> &[Point2] {
        match self {
            Self::Point(p) => std::slice::from_ref(p),
            Self::Path(pts) | Self::Polygon(pts) => pts,
        }
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, Self::Polygon(_))
    }

    /// Edges in order. A point yields one degenerate edge so distance and
    /// intersection tests need no special case.
    pub fn edges(&self) -> Vec<(Point2, Point2)> {
        match self {
            Self::Point(p) => vec![(*p, *p)],
            Self::Path(pts) => pts.windows(2).map(|w| (w[0], w[1])).collect(),
            Self::Polygon(pts) => (0..pts.len()).map(|i| (pts[i], pts[(i + 1) % pts.len()])).collect(),
        }
    }

    /// Unsigned area; zero for points and paths.
    pub fn area(&self) -> f64 {
        match self {
            Self::Polygon(pts) => signed_area(pts).abs(),
            _ => 0.0,
        }
    }

    pub fn perimeter(&self) -> f64 {
        self.edges().iter().map(|(a, b)| dist(*a, *b)).sum()
    }

    /// Area centroid for polygons, vertex mean otherwise.
    pub fn centroid(&self) -> Point2 {
        let pts = self.vertices();
        if let Self::Polygon(_) = self {
            let a = signed_area(pts);
            if a.abs() > 1e-12 {
                let (mut cx, mut cy) = (0.0, 0.0);
                for (p, q) in self.edges() {
                    let c = p[0] * q[1] - q[0] * p[1];
                    cx += (p[0] + q[0]) * c;
                    cy += (p[1] + q[1]) * c;
                }
                return [cx / (6.0 * a), cy / (6.0 * a)];
            }
        }
        let n = pts.len().max(1) as f64;
        let (sx, sy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        [sx / n, sy / n]
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices().iter().map(|p| [p[0], p[1], 0.0]))
            .unwrap_or_else(|| BoundingBox::new([0.0; 3], [0.0; 3]))
    }

    /// Locate `p` against this shape. Only polygons with at least three
    /// vertices have an inside.
    pub fn locate(&self, p: Point2, eps: f64) -> Location {
        if self.edges().iter().any(|(a, b)| point_segment_distance(p, *a, *b) <= eps) {
            return Location::Boundary;
        }
        let Self::Polygon(pts) = self else {
            return Location::Outside;
        };
        if pts.len() < 3 {
            return Location::Outside;
        }
        let mut inside = false;
        let mut j = pts.len() - 1;
        for i in 0..pts.len() {
            let (a, b) = (pts[i], pts[j]);
            if (a[1] > p[1]) != (b[1] > p[1]) {
                let x = a[0] + (p[1] - a[1]) * (b[0] - a[0]) / (b[1] - a[1]);
                if p[0] < x {
                    inside = !inside;
                }
            }
            j = i;
        }
        if inside {
            Location::Inside
        } else {
            Location::Outside
        }
    }

    /// `other` lies within this polygon (boundary contact allowed) and
    /// reaches its interior somewhere.
    pub fn contains(&self, other: &Self, eps: f64) -> bool {
        if !self.is_polygon() {
            return false;
        }
        let mut reaches_inside = false;
        for p in other.sample_points() {
            match self.locate(p, eps) {
                Location::Outside => return false,
                Location::Inside => reaches_inside = true,
                Location::Boundary => {}
            }
        }
        reaches_inside && !self.crosses(other, eps)
    }

    /// Some pair of edges cross at a point interior to both.
    pub fn crosses(&self, other: &Self, eps: f64) -> bool {
        let theirs = other.edges();
        self.edges()
            .iter()
            .any(|(a, b)| theirs.iter().any(|(c, d)| segments_cross(*a, *b, *c, *d, eps)))
    }

    /// Smallest gap between the two shapes; zero when they touch, overlap or
    /// one contains a vertex of the other.
    pub fn distance(&self, other: &Self, eps: f64) -> f64 {
        let inside = |outer: &Self, inner: &Self| {
            outer.is_polygon() && inner.vertices().iter().any(|p| outer.locate(*p, eps) != Location::Outside)
        };
        if inside(self, other) || inside(other, self) {
            return 0.0;
        }
        let theirs = other.edges();
        let mut best = f64::INFINITY;
        for (a, b) in self.edges() {
            for (c, d) in &theirs {
                best = best.min(segment_distance(a, b, *c, *d, eps));
            }
        }
        best
    }

    /// Overlap area of two polygons. Exact when either polygon is convex;
    /// otherwise the bounding-box overlap stands in.
    pub fn intersection_area(&self, other: &Self) -> f64 {
        let (Self::Polygon(a), Self::Polygon(b)) = (self, other) else {
            return 0.0;
        };
        if a.len() < 3 || b.len() < 3 {
            return 0.0;
        }
        let (subject, clip) = if is_convex(b) {
            (a, b)
        } else if is_convex(a) {
            (b, a)
        } else {
            return self
                .bbox()
                .intersection(&other.bbox())
                .map_or(0.0, |bb| bb.width() * bb.height());
        };
        signed_area(&clip_polygon(subject, clip)).abs()
    }

    fn sample_points(&self) -> Vec<Point2> {
        let mut samples = self.vertices().to_vec();
        if !matches!(self, Self::Point(_)) {
            samples.extend(self.edges().iter().map(|(a, b)| [(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5]));
        }
        samples
    }
}

fn dist(a: Point2, b: Point2) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

fn cross(o: Point2, a: Point2, b: Point2) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn signed_area(pts: &[Point2]) -> f64 {
    let n = pts.len();
    if n < 3 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let (p, q) = (pts[i], pts[(i + 1) % n]);
            p[0] * q[1] - q[0] * p[1]
        })
        .sum::<f64>()
        * 0.5
}

fn is_convex(pts: &[Point2]) -> bool {
    let n = pts.len();
    let mut sign = 0.0;
    for i in 0..n {
        let c = cross(pts[i], pts[(i + 1) % n], pts[(i + 2) % n]);
        if c.abs() < 1e-12 {
            continue;
        }
        if sign == 0.0 {
            sign = c.signum();
        } else if c.signum() != sign {
            return false;
        }
    }
    true
}

pub(crate) fn point_segment_distance(p: Point2, a: Point2, b: Point2) -> f64 {
    let d = [b[0] - a[0], b[1] - a[1]];
    let len2 = d[0] * d[0] + d[1] * d[1];
    if len2 < 1e-24 {
        return dist(p, a);
    }
    let t = (((p[0] - a[0]) * d[0] + (p[1] - a[1]) * d[1]) / len2).clamp(0.0, 1.0);
    dist(p, [a[0] + t * d[0], a[1] + t * d[1]])
}

/// Proper crossing: each segment strictly separates the other's endpoints.
fn segments_cross(a: Point2, b: Point2, c: Point2, d: Point2, eps: f64) -> bool {
    let side = |v: f64| if v > eps { 1 } else if v < -eps { -1 } else { 0 };
    let (d1, d2) = (side(cross(a, b, c)), side(cross(a, b, d)));
    let (d3, d4) = (side(cross(c, d, a)), side(cross(c, d, b)));
    d1 * d2 < 0 && d3 * d4 < 0
}

fn segment_distance(a: Point2, b: Point2, c: Point2, d: Point2, eps: f64) -> f64 {
    if segments_cross(a, b, c, d, eps) {
        return 0.0;
    }
    point_segment_distance(a, c, d)
        .min(point_segment_distance(b, c, d))
        .min(point_segment_distance(c, a, b))
        .min(point_segment_distance(d, a, b))
}

/// Sutherland–Hodgman clip of `subject` against the convex `clip`.
fn clip_polygon(subject: &[Point2], clip: &[Point2]) -> Vec<Point2> {
    let mut clip = clip.to_vec();
    if signed_area(&clip) < 0.0 {
        clip.reverse();
    }
    let mut output = subject.to_vec();
    for i in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let (e0, e1) = (clip[i], clip[(i + 1) % clip.len()]);
        let input = std::mem::take(&mut output);
        let inside = |p: Point2| cross(e0, e1, p) >= 0.0;
        for j in 0..input.len() {
            let (cur, prev) = (input[j], input[(j + input.len() - 1) % input.len()]);
            match (inside(prev), inside(cur)) {
                (true, true) => output.push(cur),
                (true, false) => output.push(line_hit(prev, cur, e0, e1)),
                (false, true) => {
                    output.push(line_hit(prev, cur, e0, e1));
                    output.push(cur);
                }
                (false, false) => {}
            }
        }
    }
    output
}

fn line_hit(p: Point2, q: Point2, a: Point2, b: Point2) -> Point2 {
    let (cp, cq) = (cross(a, b, p), cross(a, b, q));
    let t = cp / (cp - cq);
    [p[0] + t * (q[0] - p[0]), p[1] + t * (q[1] - p[1])]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square(x: f64, y: f64, s: f64) -> PlanarShape {
        PlanarShape::Polygon(vec![[x, y], [x + s, y], [x + s, y + s], [x, y + s]])
    }

    const EPS: f64 = 1e-6;

    #[test]
    fn test_area_perimeter_centroid() {
        let sq = square(0.0, 0.0, 4.0);
        assert_abs_diff_eq!(sq.area(), 16.0);
        assert_abs_diff_eq!(sq.perimeter(), 16.0);
        assert_eq!(sq.centroid(), [2.0, 2.0]);

        let mut cw = sq.vertices().to_vec();
        cw.reverse();
        assert_abs_diff_eq!(PlanarShape::Polygon(cw).area(), 16.0);
    }

    #[test]
    fn test_locate() {
        let sq = square(0.0, 0.0, 4.0);
        assert_eq!(sq.locate([1.0, 1.0], EPS), Location::Inside);
        assert_eq!(sq.locate([4.0, 2.0], EPS), Location::Boundary);
        assert_eq!(sq.locate([5.0, 2.0], EPS), Location::Outside);
    }

    #[test]
    fn test_degenerate_polygons_have_no_inside() {
        let empty: PlanarShape = serde_json::from_str(r#"{"kind": "polygon", "points": []}"#).unwrap();
        assert_eq!(empty.locate([0.0, 0.0], EPS), Location::Outside);
        assert!(!empty.contains(&PlanarShape::Point([0.0, 0.0]), EPS));
        assert_eq!(empty.intersection_area(&square(0.0, 0.0, 4.0)), 0.0);
        assert_eq!(square(0.0, 0.0, 4.0).intersection_area(&empty), 0.0);

        let sliver = PlanarShape::Polygon(vec![[0.0, 0.0], [4.0, 0.0]]);
        assert_eq!(sliver.locate([2.0, 0.0], EPS), Location::Boundary);
        assert_eq!(sliver.locate([2.0, 1.0], EPS), Location::Outside);
    }

    #[test]
    fn test_contains() {
        let outer = square(0.0, 0.0, 10.0);
        assert!(outer.contains(&square(0.0, 0.0, 5.0), EPS));
        assert!(outer.contains(&PlanarShape::Point([3.0, 3.0]), EPS));
        assert!(!outer.contains(&PlanarShape::Point([10.0, 3.0]), EPS));
        assert!(!outer.contains(&outer.clone(), EPS));
        assert!(!outer.contains(&square(8.0, 8.0, 5.0), EPS));
        assert!(!square(0.0, 0.0, 5.0).contains(&outer, EPS));
    }

    #[test]
    fn test_distance() {
        let a = square(0.0, 0.0, 1.0);
        assert_abs_diff_eq!(a.distance(&square(3.0, 0.0, 1.0), EPS), 2.0);
        assert_abs_diff_eq!(a.distance(&square(1.0, 0.0, 1.0), EPS), 0.0);
        assert_abs_diff_eq!(a.distance(&PlanarShape::Point([0.5, 0.5]), EPS), 0.0);
        let line = PlanarShape::Path(vec![[0.0, 3.0], [1.0, 3.0]]);
        assert_abs_diff_eq!(a.distance(&line, EPS), 2.0);
    }

    #[test]
    fn test_intersection_area() {
        let a = square(0.0, 0.0, 2.0);
        assert_abs_diff_eq!(a.intersection_area(&square(1.0, 1.0, 2.0)), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(a.intersection_area(&square(5.0, 5.0, 2.0)), 0.0);
        assert_abs_diff_eq!(a.intersection_area(&square(1.0, 0.0, 2.0)), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_crossing_excludes_collinear_contact() {
        let a = square(0.0, 0.0, 2.0);
        assert!(a.crosses(&square(1.0, 1.0, 2.0), EPS));
        assert!(!a.crosses(&square(2.0, 0.0, 2.0), EPS));
    }

    #[test]
    fn test_from_entity() {
        use bim_kernel::Coordinate;
        let c = GeometricEntity::circle(Coordinate::ORIGIN, 1.0).unwrap();
        let shape = PlanarShape::from_entity(&c, 32);
        assert!(shape.is_polygon());
        assert_eq!(shape.vertices().len(), 32);
        assert!((shape.area() - std::f64::consts::PI).abs() < 0.03);

        let p = GeometricEntity::point(Coordinate::xy(2.0, 3.0).unwrap());
        assert_eq!(PlanarShape::from_entity(&p, 32), PlanarShape::Point([2.0, 3.0]));
    }
}
