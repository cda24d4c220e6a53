use std::collections::{HashMap, HashSet};
use std::f64::consts::{FRAC_PI_2, PI};

use bim_kernel::{Coordinate, EntityKind, GeometricEntity, PrecisionMath, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::SolverError;

/// Entities the solver reads and moves, keyed by id. Owned by the caller.
pub type EntityMap = HashMap<String, GeometricEntity>;

/// Tolerance given to constraints that do not set their own.
pub const DEFAULT_TOLERANCE: f64 = 0.001;

/// A geometric relation between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Anchors of two entities are `value` apart.
    Distance,
    /// Second line is `value` radians counter-clockwise from the first.
    Angle,
    Parallel,
    Perpendicular,
    /// All anchors coincide with the first.
    Coincident,
    /// Circles touch externally, or a circle touches a line.
    Tangent,
    /// Pairs mirrored across the last entity, which must be a line.
    Symmetric,
    Horizontal,
    Vertical,
    /// Equal line length or radius.
    Equal,
    /// Entity stays where it was when the constraint was registered.
    Fixed,
}

/// How many entity ids a kind takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == *k,
            Arity::AtLeast(k) => n >= *k,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exactly(k) => write!(f, "exactly {k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
        }
    }
}

impl ConstraintKind {
    pub fn arity(&self) -> Arity {
        match self {
            Self::Distance
            | Self::Angle
            | Self::Parallel
            | Self::Perpendicular
            | Self::Tangent
            | Self::Equal => Arity::Exactly(2),
            Self::Coincident => Arity::AtLeast(2),
            Self::Symmetric => Arity::AtLeast(3),
            Self::Horizontal | Self::Vertical | Self::Fixed => Arity::Exactly(1),
        }
    }

    /// Kinds whose error is an angle in radians.
    pub fn is_angular(&self) -> bool {
        matches!(self, Self::Angle | Self::Parallel | Self::Perpendicular)
    }

    /// Kinds whose entities must all be lines.
    fn needs_lines(&self) -> bool {
        matches!(
            self,
            Self::Angle | Self::Parallel | Self::Perpendicular | Self::Horizontal | Self::Vertical
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintStatus {
    Pending,
    Satisfied,
    Violated,
    OverConstrained,
    UnderConstrained,
}

/// A constraint registered with a solver session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    pub kind: ConstraintKind,
    pub entity_ids: Vec<String>,
    /// Target distance or angle, for the kinds that take one.
    pub value: Option<f64>,
    /// Target position for `Fixed`; captured on registration when absent.
    pub position: Option<[f64; 3]>,
    pub tolerance: f64,
    pub status: ConstraintStatus,
    /// Error measured on the last evaluation.
    pub last_error: Option<f64>,
}

impl Constraint {
    pub fn new<I, S>(id: impl Into<String>, kind: ConstraintKind, entity_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            kind,
            entity_ids: entity_ids.into_iter().map(Into::into).collect(),
            value: None,
            position: None,
            tolerance: DEFAULT_TOLERANCE,
            status: ConstraintStatus::Pending,
            last_error: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_position(mut self, position: [f64; 3]) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn invalid(&self, message: impl Into<String>) -> SolverError {
        SolverError::InvalidParameter { id: self.id.clone(), message: message.into() }
    }

    /// Checks that need no entity data: arity, distinctness, parameters.
    pub fn validate_shape(&self) -> Result<(), SolverError> {
        if self.id.trim().is_empty() {
            return Err(self.invalid("constraint id is empty"));
        }
        let arity = self.kind.arity();
        if !arity.accepts(self.entity_ids.len()) {
            return Err(SolverError::Arity {
                id: self.id.clone(),
                kind: self.kind,
                expected: arity.to_string(),
                got: self.entity_ids.len(),
            });
        }
        let mut seen = HashSet::new();
        for e in &self.entity_ids {
            if e.trim().is_empty() {
                return Err(self.invalid("entity id is empty"));
            }
            if !seen.insert(e.as_str()) {
                return Err(SolverError::DuplicateEntity { id: self.id.clone(), entity: e.clone() });
            }
        }
        if self.kind == ConstraintKind::Symmetric && (self.entity_ids.len() - 1) % 2 != 0 {
            return Err(self.invalid("symmetric needs entity pairs followed by an axis"));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(self.invalid(format!("tolerance must be positive, got {}", self.tolerance)));
        }

        match (self.kind, self.value) {
            (ConstraintKind::Distance, None) => Err(self.invalid("distance needs a target value")),
            (ConstraintKind::Distance, Some(v)) if !v.is_finite() || v < 0.0 => {
                Err(self.invalid(format!("distance must be non-negative, got {v}")))
            }
            (ConstraintKind::Angle, None) => Err(self.invalid("angle needs a target value")),
            (ConstraintKind::Angle, Some(v)) if !(0.0..=2.0 * PI).contains(&v) => {
                Err(self.invalid(format!("angle must be within [0, 2π], got {v}")))
            }
            _ => Ok(()),
        }
    }

    /// Full validation against the current entities.
    pub fn validate(&self, entities: &EntityMap) -> Result<(), SolverError> {
        self.validate_shape()?;
        for id in &self.entity_ids {
            let entity = self.entity(entities, id)?;
            let is_axis = self.kind == ConstraintKind::Symmetric
                && Some(id) == self.entity_ids.last();
            let wrong = ((self.kind.needs_lines() || is_axis) && entity.kind() != EntityKind::Line)
                || (self.kind == ConstraintKind::Equal && entity.measure().is_none());
            if wrong {
                return Err(SolverError::UnsupportedEntity {
                    id: self.id.clone(),
                    kind: self.kind,
                    entity: id.clone(),
                    entity_kind: entity.kind(),
                });
            }
        }
        Ok(())
    }

    fn entity<'a>(&self, entities: &'a EntityMap, id: &str) -> Result<&'a GeometricEntity, SolverError> {
        entities.get(id).ok_or_else(|| SolverError::UnknownEntity {
            id: self.id.clone(),
            entity: id.to_string(),
        })
    }

    fn heading(&self, entities: &EntityMap, id: &str) -> Result<f64, SolverError> {
        let entity = self.entity(entities, id)?;
        entity.direction().map(|d| d.heading()).ok_or_else(|| SolverError::UnsupportedEntity {
            id: self.id.clone(),
            kind: self.kind,
            entity: id.to_string(),
            entity_kind: entity.kind(),
        })
    }

    fn anchor(&self, entities: &EntityMap, id: &str) -> Result<[f64; 3], SolverError> {
        Ok(self.entity(entities, id)?.anchor())
    }

    /// The mirror pairs and axis id of a symmetric constraint.
    fn symmetric_parts(&self) -> (Vec<(&str, &str)>, &str) {
        let (axis, rest) = self.entity_ids.split_last().map_or(("", &[][..]), |(a, r)| (a.as_str(), r));
        let pairs = rest.chunks(2).filter(|c| c.len() == 2).map(|c| (c[0].as_str(), c[1].as_str())).collect();
        (pairs, axis)
    }

    /// Current deviation from the target, in distance units or radians.
    pub fn error(&self, entities: &EntityMap, math: &PrecisionMath) -> Result<f64, SolverError> {
        let ids = &self.entity_ids;
        match self.kind {
            ConstraintKind::Distance => {
                let a = self.anchor(entities, &ids[0])?;
                let b = self.anchor(entities, &ids[1])?;
                Ok((math.distance(a, b) - self.value.unwrap_or(0.0)).abs())
            }
            ConstraintKind::Angle => {
                let ha = self.heading(entities, &ids[0])?;
                let hb = self.heading(entities, &ids[1])?;
                let between = math.normalize_angle(hb - ha);
                Ok(math.angle_difference(between, self.value.unwrap_or(0.0)))
            }
            ConstraintKind::Parallel => {
                let d = math.angle_difference(
                    self.heading(entities, &ids[0])?,
                    self.heading(entities, &ids[1])?,
                );
                Ok(d.min(PI - d))
            }
            ConstraintKind::Perpendicular => {
                let d = math.angle_difference(
                    self.heading(entities, &ids[0])?,
                    self.heading(entities, &ids[1])?,
                );
                Ok((d - FRAC_PI_2).abs())
            }
            ConstraintKind::Coincident => {
                let first = self.anchor(entities, &ids[0])?;
                let mut total = 0.0;
                for id in &ids[1..] {
                    total += math.distance(first, self.anchor(entities, id)?);
                }
                Ok(total)
            }
            ConstraintKind::Tangent => {
                let a = self.entity(entities, &ids[0])?;
                let b = self.entity(entities, &ids[1])?;
                Ok(tangent_error(a, b, math))
            }
            ConstraintKind::Symmetric => {
                let (pairs, axis) = self.symmetric_parts();
                let axis = self.entity(entities, axis)?;
                let mut total = 0.0;
                for (a, b) in pairs {
                    let mirrored = mirror(self.anchor(entities, a)?, axis);
                    total += math.distance(mirrored, self.anchor(entities, b)?);
                }
                Ok(total)
            }
            ConstraintKind::Horizontal | ConstraintKind::Vertical => {
                let entity = self.entity(entities, &ids[0])?;
                let Some((s, e)) = entity.endpoints() else {
                    return Err(self.invalid("horizontal/vertical needs a line"));
                };
                Ok(if self.kind == ConstraintKind::Horizontal {
                    (e.y() - s.y()).abs()
                } else {
                    (e.x() - s.x()).abs()
                })
            }
            ConstraintKind::Equal => {
                let ma = self.entity(entities, &ids[0])?.measure();
                let mb = self.entity(entities, &ids[1])?.measure();
                match (ma, mb) {
                    (Some(a), Some(b)) => Ok((a - b).abs()),
                    _ => Err(self.invalid("equal needs lines, circles or arcs")),
                }
            }
            ConstraintKind::Fixed => {
                let at = self.anchor(entities, &ids[0])?;
                Ok(self.position.map_or(0.0, |p| math.distance(at, p)))
            }
        }
    }

    /// Move the later entities so this constraint holds on its own.
    pub fn adjust(&self, entities: &mut EntityMap, math: &PrecisionMath) -> Result<(), SolverError> {
        let ids = &self.entity_ids;
        match self.kind {
            ConstraintKind::Distance => {
                let a = self.anchor(entities, &ids[0])?;
                let b = self.anchor(entities, &ids[1])?;
                let v = Vec3::new(b[0] - a[0], b[1] - a[1], b[2] - a[2]);
                let dir = v.normalized().unwrap_or(Vec3::X);
                let target = dir * self.value.unwrap_or(0.0);
                self.translate(entities, &ids[1], target - v, math)
            }
            ConstraintKind::Angle => {
                let ha = self.heading(entities, &ids[0])?;
                let hb = self.heading(entities, &ids[1])?;
                self.turn_line(entities, &ids[1], ha + self.value.unwrap_or(0.0) - hb, math)
            }
            ConstraintKind::Parallel | ConstraintKind::Perpendicular => {
                let ha = self.heading(entities, &ids[0])?;
                let hb = self.heading(entities, &ids[1])?;
                let offset = if self.kind == ConstraintKind::Parallel { 0.0 } else { FRAC_PI_2 };
                let candidates = [ha + offset, ha + offset + PI];
                let delta = candidates
                    .iter()
                    .map(|t| signed_turn(*t - hb))
                    .min_by(|x, y| x.abs().total_cmp(&y.abs()))
                    .unwrap_or(0.0);
                self.turn_line(entities, &ids[1], delta, math)
            }
            ConstraintKind::Coincident => {
                let first = self.anchor(entities, &ids[0])?;
                for id in &ids[1..] {
                    let at = self.anchor(entities, id)?;
                    let delta = Vec3::new(first[0] - at[0], first[1] - at[1], first[2] - at[2]);
                    self.translate(entities, id, delta, math)?;
                }
                Ok(())
            }
            ConstraintKind::Tangent => self.adjust_tangent(entities, math),
            ConstraintKind::Symmetric => {
                let (pairs, axis) = self.symmetric_parts();
                let axis = self.entity(entities, axis)?.clone();
                for (a, b) in pairs {
                    let target = mirror(self.anchor(entities, a)?, &axis);
                    let at = self.anchor(entities, b)?;
                    let delta = Vec3::new(target[0] - at[0], target[1] - at[1], target[2] - at[2]);
                    self.translate(entities, b, delta, math)?;
                }
                Ok(())
            }
            ConstraintKind::Horizontal | ConstraintKind::Vertical => {
                let entity = self.entity(entities, &ids[0])?;
                let Some((s, e)) = entity.endpoints() else {
                    return Err(self.invalid("horizontal/vertical needs a line"));
                };
                let end = if self.kind == ConstraintKind::Horizontal {
                    math.coordinate(e.x(), s.y(), e.z())?
                } else {
                    math.coordinate(s.x(), e.y(), e.z())?
                };
                entities.insert(ids[0].clone(), GeometricEntity::line(s, end));
                Ok(())
            }
            ConstraintKind::Equal => {
                let Some(target) = self.entity(entities, &ids[0])?.measure() else {
                    return Err(self.invalid("equal needs lines, circles or arcs"));
                };
                let b = self.entity(entities, &ids[1])?;
                let resized = match b.endpoints() {
                    Some((s, e)) => {
                        let dir = (e - s).normalized().unwrap_or(Vec3::X);
                        GeometricEntity::line(s, s.offset(dir * target, math)?)
                    }
                    None if target > 0.0 => b.with_radius(target)?,
                    None => return Err(self.invalid("cannot copy a zero length onto a radius")),
                };
                entities.insert(ids[1].clone(), resized);
                Ok(())
            }
            ConstraintKind::Fixed => {
                let Some(p) = self.position else {
                    return Ok(());
                };
                let at = self.anchor(entities, &ids[0])?;
                let delta = Vec3::new(p[0] - at[0], p[1] - at[1], p[2] - at[2]);
                self.translate(entities, &ids[0], delta, math)
            }
        }
    }

    fn adjust_tangent(&self, entities: &mut EntityMap, math: &PrecisionMath) -> Result<(), SolverError> {
        let a = self.entity(entities, &self.entity_ids[0])?.clone();
        let b = self.entity(entities, &self.entity_ids[1])?.clone();
        let target_id = &self.entity_ids[1];

        let delta = match (a.radius(), b.radius(), a.endpoints(), b.endpoints()) {
            // Circle to circle: centers r1 + r2 apart along the current direction.
            (Some(ra), Some(rb), _, _) => {
                let (ca, cb) = (a.anchor(), b.anchor());
                let v = Vec3::new(cb[0] - ca[0], cb[1] - ca[1], cb[2] - ca[2]);
                let dir = v.normalized().unwrap_or(Vec3::X);
                dir * (ra + rb) - v
            }
            // Line then circle: slide the circle along the line normal.
            (None, Some(r), Some(_), None) => line_offset(&a, b.anchor(), r),
            // Circle then line: slide the line the other way.
            (Some(r), None, None, Some(_)) => -line_offset(&b, a.anchor(), r),
            _ => {
                let (pa, pb) = (a.anchor(), b.anchor());
                Vec3::new(pa[0] - pb[0], pa[1] - pb[1], pa[2] - pb[2])
            }
        };
        self.translate(entities, target_id, delta, math)
    }

    fn translate(
        &self,
        entities: &mut EntityMap,
        id: &str,
        delta: Vec3,
        math: &PrecisionMath,
    ) -> Result<(), SolverError> {
        let moved = self.entity(entities, id)?.translated(delta, math)?;
        entities.insert(id.to_string(), moved);
        Ok(())
    }

    /// Rotate a line about its start point.
    fn turn_line(
        &self,
        entities: &mut EntityMap,
        id: &str,
        angle: f64,
        math: &PrecisionMath,
    ) -> Result<(), SolverError> {
        let line = self.entity(entities, id)?;
        let Some((start, _)) = line.endpoints() else {
            return Err(self.invalid(format!("{id} is not a line")));
        };
        let turned = line.rotated(angle, &start, math)?;
        entities.insert(id.to_string(), turned);
        Ok(())
    }
}

/// Wrap an angle into `(-π, π]`.
fn signed_turn(angle: f64) -> f64 {
    let a = angle.rem_euclid(2.0 * PI);
    if a > PI { a - 2.0 * PI } else { a }
}

/// Reflect `p` across the infinite line through a line entity.
fn mirror(p: [f64; 3], axis: &GeometricEntity) -> [f64; 3] {
    let Some((s, e)) = axis.endpoints() else {
        return p;
    };
    let Some(d) = (e - s).normalized() else {
        return p;
    };
    let rel = Vec3::new(p[0] - s.x(), p[1] - s.y(), 0.0);
    let t = rel.dot(&d);
    let foot = [s.x() + d.x * t, s.y() + d.y * t];
    [2.0 * foot[0] - p[0], 2.0 * foot[1] - p[1], p[2]]
}

/// Displacement that puts `center` at distance `r` from `line`, on its current side.
fn line_offset(line: &GeometricEntity, center: [f64; 3], r: f64) -> Vec3 {
    let Some((s, e)) = line.endpoints() else {
        return Vec3::ZERO;
    };
    let Some(n) = (e - s).normalized().map(|d| d.perp()) else {
        return Vec3::ZERO;
    };
    let rel = Vec3::new(center[0] - s.x(), center[1] - s.y(), 0.0);
    let signed = rel.dot(&n);
    let target = if signed < 0.0 { -r } else { r };
    n * (target - signed)
}

fn tangent_error(a: &GeometricEntity, b: &GeometricEntity, math: &PrecisionMath) -> f64 {
    match (a.radius(), b.radius()) {
        (Some(ra), Some(rb)) => (math.distance(a.anchor(), b.anchor()) - (ra + rb)).abs(),
        (None, Some(r)) => a.line_distance(b.anchor()).map_or_else(
            || math.distance(a.anchor(), b.anchor()),
            |d| (d - r).abs(),
        ),
        (Some(r), None) => b.line_distance(a.anchor()).map_or_else(
            || math.distance(a.anchor(), b.anchor()),
            |d| (d - r).abs(),
        ),
        (None, None) => math.distance(a.anchor(), b.anchor()),
    }
}

/// Capture the anchor of an entity as a fixed position.
pub(crate) fn anchor_of(entities: &EntityMap, id: &str) -> Option<[f64; 3]> {
    entities.get(id).map(GeometricEntity::anchor)
}

/// Build a planar point entity; handy for callers assembling entity maps.
pub fn point_entity(x: f64, y: f64) -> Result<GeometricEntity, SolverError> {
    Ok(GeometricEntity::point(Coordinate::xy(x, y)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(items: Vec<(&str, GeometricEntity)>) -> EntityMap {
        items.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> GeometricEntity {
        GeometricEntity::line(Coordinate::xy(x0, y0).unwrap(), Coordinate::xy(x1, y1).unwrap())
    }

    fn circle(x: f64, y: f64, r: f64) -> GeometricEntity {
        GeometricEntity::circle(Coordinate::xy(x, y).unwrap(), r).unwrap()
    }

    #[test]
    fn test_arity_rules() {
        let c = Constraint::new("c", ConstraintKind::Distance, ["a"]).with_value(1.0);
        assert!(matches!(c.validate_shape(), Err(SolverError::Arity { got: 1, .. })));

        let c = Constraint::new("c", ConstraintKind::Coincident, ["a", "b", "c"]);
        assert!(c.validate_shape().is_ok());

        let c = Constraint::new("c", ConstraintKind::Symmetric, ["a", "b", "axis"]);
        assert!(c.validate_shape().is_ok());
        let c = Constraint::new("c", ConstraintKind::Symmetric, ["a", "b", "c", "axis"]);
        assert!(matches!(c.validate_shape(), Err(SolverError::InvalidParameter { .. })));
    }

    #[test]
    fn test_distinctness() {
        let c = Constraint::new("c", ConstraintKind::Parallel, ["l1", "l1"]);
        assert!(matches!(c.validate_shape(), Err(SolverError::DuplicateEntity { .. })));
    }

    #[test]
    fn test_parameter_ranges() {
        let c = Constraint::new("c", ConstraintKind::Distance, ["a", "b"]).with_value(-1.0);
        assert!(c.validate_shape().is_err());
        let c = Constraint::new("c", ConstraintKind::Angle, ["a", "b"]).with_value(7.0);
        assert!(c.validate_shape().is_err());
        let c = Constraint::new("c", ConstraintKind::Distance, ["a", "b"]);
        assert!(c.validate_shape().is_err());
    }

    #[test]
    fn test_entity_kind_checks() {
        let entities = map(vec![("p", point_entity(0.0, 0.0).unwrap()), ("l", line(0.0, 0.0, 1.0, 0.0))]);
        let c = Constraint::new("c", ConstraintKind::Parallel, ["p", "l"]);
        assert!(matches!(c.validate(&entities), Err(SolverError::UnsupportedEntity { .. })));
        let c = Constraint::new("c", ConstraintKind::Horizontal, ["missing"]);
        assert!(matches!(c.validate(&entities), Err(SolverError::UnknownEntity { .. })));
    }

    #[test]
    fn test_parallel_error_ignores_direction() {
        let m = PrecisionMath::default();
        let entities = map(vec![("a", line(0.0, 0.0, 1.0, 0.0)), ("b", line(5.0, 1.0, 0.0, 1.0))]);
        let c = Constraint::new("c", ConstraintKind::Parallel, ["a", "b"]);
        assert!(c.error(&entities, &m).unwrap() < 1e-12);
        let c = Constraint::new("c", ConstraintKind::Perpendicular, ["a", "b"]);
        assert!((c.error(&entities, &m).unwrap() - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_tangent_adjust_circles() {
        let m = PrecisionMath::default();
        let mut entities = map(vec![("a", circle(0.0, 0.0, 1.0)), ("b", circle(5.0, 0.0, 2.0))]);
        let c = Constraint::new("c", ConstraintKind::Tangent, ["a", "b"]);
        assert!((c.error(&entities, &m).unwrap() - 2.0).abs() < 1e-12);
        c.adjust(&mut entities, &m).unwrap();
        assert!(c.error(&entities, &m).unwrap() < 1e-9);
        assert_eq!(entities["b"].anchor(), [3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_tangent_line_circle() {
        let m = PrecisionMath::default();
        let mut entities = map(vec![("l", line(0.0, 0.0, 10.0, 0.0)), ("c", circle(4.0, 5.0, 2.0))]);
        let c = Constraint::new("t", ConstraintKind::Tangent, ["l", "c"]);
        assert!((c.error(&entities, &m).unwrap() - 3.0).abs() < 1e-12);
        c.adjust(&mut entities, &m).unwrap();
        assert_eq!(entities["c"].anchor(), [4.0, 2.0, 0.0]);
    }

    #[test]
    fn test_symmetric_mirror() {
        let m = PrecisionMath::default();
        let mut entities = map(vec![
            ("a", point_entity(-3.0, 1.0).unwrap()),
            ("b", point_entity(2.0, 5.0).unwrap()),
            ("axis", line(0.0, -10.0, 0.0, 10.0)),
        ]);
        let c = Constraint::new("s", ConstraintKind::Symmetric, ["a", "b", "axis"]);
        c.adjust(&mut entities, &m).unwrap();
        assert_eq!(entities["b"].anchor(), [3.0, 1.0, 0.0]);
        assert!(c.error(&entities, &m).unwrap() < 1e-12);
    }

    #[test]
    fn test_equal_resizes_second() {
        let m = PrecisionMath::default();
        let mut entities = map(vec![("a", line(0.0, 0.0, 3.0, 4.0)), ("b", circle(0.0, 0.0, 1.0))]);
        let c = Constraint::new("e", ConstraintKind::Equal, ["a", "b"]);
        c.adjust(&mut entities, &m).unwrap();
        assert!((entities["b"].radius().unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_signed_turn() {
        assert!((signed_turn(3.0 * PI / 2.0) + FRAC_PI_2).abs() < 1e-12);
        assert!((signed_turn(-0.25) + 0.25).abs() < 1e-12);
    }
}
