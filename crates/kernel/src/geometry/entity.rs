//! Drawing entities: a closed set of shapes built from validated coordinates.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::error::PrecisionError;

use super::bbox::BoundingBox;
use super::coordinate::Coordinate;
use super::math::PrecisionMath;
use super::vector::Vec3;

/// What every entity can report about its geometry.
pub trait Shape {
    /// The coordinates that define the shape.
    fn geometry(&self) -> Vec<Coordinate>;
    fn bounding_box(&self) -> BoundingBox;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Point,
    Line,
    Circle,
    Arc,
    Rectangle,
    Polygon,
}

/// A variant-tagged planar shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeometricEntity {
    Point {
        position: Coordinate,
    },
    Line {
        start: Coordinate,
        end: Coordinate,
    },
    Circle {
        center: Coordinate,
        radius: f64,
    },
    /// Counter-clockwise from `start_angle` to `end_angle` (radians).
    Arc {
        center: Coordinate,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
    /// Axis-aligned, `origin` is the minimum corner.
    Rectangle {
        origin: Coordinate,
        width: f64,
        height: f64,
    },
    Polygon {
        vertices: Vec<Coordinate>,
    },
}

impl GeometricEntity {
    pub fn point(position: Coordinate) -> Self {
        Self::Point { position }
    }

    pub fn line(start: Coordinate, end: Coordinate) -> Self {
        Self::Line { start, end }
    }

    pub fn circle(center: Coordinate, radius: f64) -> Result<Self, PrecisionError> {
        let entity = Self::Circle { center, radius };
        entity.validate()?;
        Ok(entity)
    }

    pub fn arc(
        center: Coordinate,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    ) -> Result<Self, PrecisionError> {
        let entity = Self::Arc { center, radius, start_angle, end_angle };
        entity.validate()?;
        Ok(entity)
    }

    pub fn rectangle(origin: Coordinate, width: f64, height: f64) -> Result<Self, PrecisionError> {
        let entity = Self::Rectangle { origin, width, height };
        entity.validate()?;
        Ok(entity)
    }

    pub fn polygon(vertices: Vec<Coordinate>) -> Result<Self, PrecisionError> {
        let entity = Self::Polygon { vertices };
        entity.validate()?;
        Ok(entity)
    }

    /// Check the shape scalars. Coordinates are valid by construction.
    pub fn validate(&self) -> Result<(), PrecisionError> {
        let fail = |msg: String| Err(PrecisionError::geometric("entity", msg));
        match self {
            Self::Point { .. } | Self::Line { .. } => Ok(()),
            Self::Circle { radius, .. } | Self::Arc { radius, .. }
                if !radius.is_finite() || *radius <= 0.0 =>
            {
                fail(format!("radius must be positive, got {radius}"))
            }
            Self::Arc { start_angle, end_angle, .. }
                if !start_angle.is_finite() || !end_angle.is_finite() =>
            {
                fail("arc angles must be finite".into())
            }
            Self::Circle { .. } | Self::Arc { .. } => Ok(()),
            Self::Rectangle { width, height, .. } => {
                if width.is_finite() && height.is_finite() && *width > 0.0 && *height > 0.0 {
                    Ok(())
                } else {
                    fail(format!("rectangle needs positive size, got {width}x{height}"))
                }
            }
            Self::Polygon { vertices } if vertices.len() < 3 => {
                fail(format!("polygon needs at least 3 vertices, got {}", vertices.len()))
            }
            Self::Polygon { .. } => Ok(()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Point { .. } => EntityKind::Point,
            Self::Line { .. } => EntityKind::Line,
            Self::Circle { .. } => EntityKind::Circle,
            Self::Arc { .. } => EntityKind::Arc,
            Self::Rectangle { .. } => EntityKind::Rectangle,
            Self::Polygon { .. } => EntityKind::Polygon,
        }
    }

    /// Representative location: the point itself, a line's midpoint, a
    /// circle's center, or the vertex mean of an area shape.
    pub fn anchor(&self) -> [f64; 3] {
        match self {
            Self::Point { position } => position.to_array(),
            Self::Line { start, end } => [
                (start.x() + end.x()) * 0.5,
                (start.y() + end.y()) * 0.5,
                (start.z() + end.z()) * 0.5,
            ],
            Self::Circle { center, .. } | Self::Arc { center, .. } => center.to_array(),
            Self::Rectangle { origin, width, height } => [
                origin.x() + width * 0.5,
                origin.y() + height * 0.5,
                origin.z(),
            ],
            Self::Polygon { vertices } => {
                let n = vertices.len().max(1) as f64;
                let mut sum = [0.0; 3];
                for v in vertices {
                    sum[0] += v.x();
                    sum[1] += v.y();
                    sum[2] += v.z();
                }
                [sum[0] / n, sum[1] / n, sum[2] / n]
            }
        }
    }

    pub fn radius(&self) -> Option<f64> {
        match self {
            Self::Circle { radius, .. } | Self::Arc { radius, .. } => Some(*radius),
            _ => None,
        }
    }

    pub fn is_circular(&self) -> bool {
        self.radius().is_some()
    }

    pub fn endpoints(&self) -> Option<(Coordinate, Coordinate)> {
        match self {
            Self::Line { start, end } => Some((*start, *end)),
            _ => None,
        }
    }

    /// `end - start` for lines.
    pub fn direction(&self) -> Option<Vec3> {
        self.endpoints().map(|(s, e)| e - s)
    }

    /// The scalar compared by "equal" relations: line length or radius.
    pub fn measure(&self) -> Option<f64> {
        match self {
            Self::Line { start, end } => Some(start.distance_to(end)),
            Self::Circle { radius, .. } | Self::Arc { radius, .. } => Some(*radius),
            _ => None,
        }
    }

    /// Perpendicular distance from `p` to the infinite line through a line entity.
    pub fn line_distance(&self, p: [f64; 3]) -> Option<f64> {
        let (s, e) = self.endpoints()?;
        let d = e - s;
        let len = d.length();
        if len < 1e-12 {
            return Some((p[0] - s.x()).hypot(p[1] - s.y()));
        }
        let rel = Vec3::new(p[0] - s.x(), p[1] - s.y(), 0.0);
        Some(d.cross_z(&rel).abs() / len)
    }

    /// Move every defining coordinate by `delta`.
    pub fn translated(&self, delta: Vec3, math: &PrecisionMath) -> Result<Self, PrecisionError> {
        let mv = |c: &Coordinate| c.offset(delta, math);
        Ok(match self {
            Self::Point { position } => Self::Point { position: mv(position)? },
            Self::Line { start, end } => Self::Line { start: mv(start)?, end: mv(end)? },
            Self::Circle { center, radius } => Self::Circle { center: mv(center)?, radius: *radius },
            Self::Arc { center, radius, start_angle, end_angle } => Self::Arc {
                center: mv(center)?,
                radius: *radius,
                start_angle: *start_angle,
                end_angle: *end_angle,
            },
            Self::Rectangle { origin, width, height } => Self::Rectangle {
                origin: mv(origin)?,
                width: *width,
                height: *height,
            },
            Self::Polygon { vertices } => Self::Polygon {
                vertices: vertices.iter().map(mv).collect::<Result<_, _>>()?,
            },
        })
    }

    /// Rotate about Z through `center`. Rectangles become polygons unless the
    /// rotation is a whole number of turns.
    pub fn rotated(
        &self,
        angle: f64,
        center: &Coordinate,
        math: &PrecisionMath,
    ) -> Result<Self, PrecisionError> {
        let rot = |c: &Coordinate| c.rotate(angle, center, math);
        Ok(match self {
            Self::Point { position } => Self::Point { position: rot(position)? },
            Self::Line { start, end } => Self::Line { start: rot(start)?, end: rot(end)? },
            Self::Circle { center: c, radius } => Self::Circle { center: rot(c)?, radius: *radius },
            Self::Arc { center: c, radius, start_angle, end_angle } => Self::Arc {
                center: rot(c)?,
                radius: *radius,
                start_angle: math.normalize_angle(start_angle + angle),
                end_angle: math.normalize_angle(end_angle + angle),
            },
            Self::Rectangle { .. } if math.normalize_angle(angle).abs() < 1e-12 => self.clone(),
            Self::Rectangle { .. } => {
                let corners = self
                    .outline(4)
                    .into_iter()
                    .map(|[x, y, z]| math.coordinate(x, y, z).and_then(|c| rot(&c)))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::Polygon { vertices: corners }
            }
            Self::Polygon { vertices } => Self::Polygon {
                vertices: vertices.iter().map(rot).collect::<Result<_, _>>()?,
            },
        })
    }

    /// Same shape with a new radius (circles and arcs only).
    pub fn with_radius(&self, radius: f64) -> Result<Self, PrecisionError> {
        let entity = match self {
            Self::Circle { center, .. } => Self::Circle { center: *center, radius },
            Self::Arc { center, start_angle, end_angle, .. } => Self::Arc {
                center: *center,
                radius,
                start_angle: *start_angle,
                end_angle: *end_angle,
            },
            other => {
                return Err(PrecisionError::geometric(
                    "with_radius",
                    format!("{:?} has no radius", other.kind()),
                ));
            }
        };
        entity.validate()?;
        Ok(entity)
    }

    /// Planar outline: closed for area shapes, open for lines and arcs.
    /// `segments` controls how finely circles and arcs are sampled.
    pub fn outline(&self, segments: usize) -> Vec<[f64; 3]> {
        let segments = segments.max(4);
        match self {
            Self::Point { position } => vec![position.to_array()],
            Self::Line { start, end } => vec![start.to_array(), end.to_array()],
            Self::Circle { center, radius } => (0..segments)
                .map(|i| {
                    let t = TAU * i as f64 / segments as f64;
                    [center.x() + radius * t.cos(), center.y() + radius * t.sin(), center.z()]
                })
                .collect(),
            Self::Arc { center, radius, start_angle, end_angle } => {
                let mut sweep = (end_angle - start_angle).rem_euclid(TAU);
                if sweep == 0.0 {
                    sweep = TAU;
                }
                (0..=segments)
                    .map(|i| {
                        let t = start_angle + sweep * i as f64 / segments as f64;
                        [center.x() + radius * t.cos(), center.y() + radius * t.sin(), center.z()]
                    })
                    .collect()
            }
            Self::Rectangle { origin, width, height } => {
                let (x, y, z) = (origin.x(), origin.y(), origin.z());
                vec![
                    [x, y, z],
                    [x + width, y, z],
                    [x + width, y + height, z],
                    [x, y + height, z],
                ]
            }
            Self::Polygon { vertices } => vertices.iter().map(Coordinate::to_array).collect(),
        }
    }
}

impl Shape for GeometricEntity {
    fn geometry(&self) -> Vec<Coordinate> {
        match self {
            Self::Point { position } => vec![*position],
            Self::Line { start, end } => vec![*start, *end],
            Self::Circle { center, .. } | Self::Arc { center, .. } => vec![*center],
            Self::Rectangle { origin, .. } => vec![*origin],
            Self::Polygon { vertices } => vertices.clone(),
        }
    }

    /// Arcs are boxed by their full circle.
    fn bounding_box(&self) -> BoundingBox {
        match self {
            Self::Circle { center, radius } | Self::Arc { center, radius, .. } => BoundingBox::new(
                [center.x() - radius, center.y() - radius, center.z()],
                [center.x() + radius, center.y() + radius, center.z()],
            ),
            other => {
                let pts = other.outline(4);
                BoundingBox::from_points(pts.iter().copied())
                    .unwrap_or_else(|| BoundingBox::new([0.0; 3], [0.0; 3]))
            }
        }
    }
}
