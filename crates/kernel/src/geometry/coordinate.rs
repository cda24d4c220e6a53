use std::cmp::Ordering;
use std::fmt;
use std::ops::Sub;

use serde::{Deserialize, Serialize};

use crate::error::PrecisionError;

use super::math::PrecisionMath;
use super::transform::CoordinateTransform;
use super::vector::Vec3;

/// Size of the fixed binary encoding: three little-endian `f64`s.
pub const COORDINATE_BYTES: usize = 24;

/// A validated point in 3D space.
///
/// Every component is finite, within the configured range and snapped to the
/// precision grid. Values are immutable; operations return new coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    x: f64,
    y: f64,
    z: f64,
}

/// Unvalidated wire form of a coordinate.
///
/// `Deserialize` for [`Coordinate`] validates through the default
/// configuration. Data written under a wider range or a custom grid should be
/// read as `RawCoordinate` and passed to [`Coordinate::from_raw_with`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCoordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = PrecisionError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.x, raw.y, raw.z)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(c: Coordinate) -> Self {
        RawCoordinate { x: c.x, y: c.y, z: c.z }
    }
}

impl Coordinate {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Validate under the default configuration.
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, PrecisionError> {
        PrecisionMath::default().coordinate(x, y, z)
    }

    /// Planar convenience constructor.
    pub fn xy(x: f64, y: f64) -> Result<Self, PrecisionError> {
        Self::new(x, y, 0.0)
    }

    /// Caller guarantees the values already passed `PrecisionMath` checks.
    pub(crate) fn from_normalized(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance ignoring z.
    pub fn planar_distance_to(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_close_to(&self, other: &Self, tolerance: f64) -> bool {
        self.distance_to(other) <= tolerance
    }

    pub fn midpoint(&self, other: &Self, math: &PrecisionMath) -> Result<Self, PrecisionError> {
        math.coordinate(
            (self.x + other.x) * 0.5,
            (self.y + other.y) * 0.5,
            (self.z + other.z) * 0.5,
        )
    }

    pub fn translate(
        &self,
        dx: f64,
        dy: f64,
        dz: f64,
        math: &PrecisionMath,
    ) -> Result<Self, PrecisionError> {
        math.coordinate(
            math.add(self.x, dx),
            math.add(self.y, dy),
            math.add(self.z, dz),
        )
    }

    pub fn offset(&self, v: Vec3, math: &PrecisionMath) -> Result<Self, PrecisionError> {
        self.translate(v.x, v.y, v.z, math)
    }

    /// Uniform scale about `center`.
    pub fn scale(
        &self,
        factor: f64,
        center: &Coordinate,
        math: &PrecisionMath,
    ) -> Result<Self, PrecisionError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(PrecisionError::transformation(
                "scale",
                format!("scale factor must be positive, got {factor}"),
            ));
        }
        math.coordinate(
            center.x + math.mul(self.x - center.x, factor),
            center.y + math.mul(self.y - center.y, factor),
            center.z + math.mul(self.z - center.z, factor),
        )
    }

    /// Rotate about the Z axis through `center` by `angle` radians.
    pub fn rotate(
        &self,
        angle: f64,
        center: &Coordinate,
        math: &PrecisionMath,
    ) -> Result<Self, PrecisionError> {
        if !angle.is_finite() {
            return Err(PrecisionError::transformation("rotate", "rotation angle is not finite"));
        }
        let (s, c) = (math.sin(angle), math.cos(angle));
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        math.coordinate(center.x + dx * c - dy * s, center.y + dx * s + dy * c, self.z)
    }

    pub fn transform(
        &self,
        transform: &CoordinateTransform,
        math: &PrecisionMath,
    ) -> Result<Self, PrecisionError> {
        transform.apply(self, math)
    }

    pub fn to_bytes(&self) -> [u8; COORDINATE_BYTES] {
        let mut out = [0u8; COORDINATE_BYTES];
        out[0..8].copy_from_slice(&self.x.to_le_bytes());
        out[8..16].copy_from_slice(&self.y.to_le_bytes());
        out[16..24].copy_from_slice(&self.z.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8], math: &PrecisionMath) -> Result<Self, PrecisionError> {
        if bytes.len() != COORDINATE_BYTES {
            return Err(PrecisionError::validation(
                "from_bytes",
                format!("expected {COORDINATE_BYTES} bytes, got {}", bytes.len()),
            ));
        }
        let read = |i: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            f64::from_le_bytes(buf)
        };
        math.coordinate(read(0), read(1), read(2))
    }

    pub fn to_json(&self) -> Result<String, PrecisionError> {
        serde_json::to_string(self).map_err(|e| PrecisionError::validation("to_json", e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, PrecisionError> {
        serde_json::from_str(json).map_err(|e| PrecisionError::validation("from_json", e.to_string()))
    }

    /// Validate a wire value under `math`'s configuration.
    pub fn from_raw_with(raw: RawCoordinate, math: &PrecisionMath) -> Result<Self, PrecisionError> {
        math.coordinate(raw.x, raw.y, raw.z)
    }

    pub fn from_json_with(json: &str, math: &PrecisionMath) -> Result<Self, PrecisionError> {
        let raw: RawCoordinate = serde_json::from_str(json)
            .map_err(|e| PrecisionError::validation("from_json", e.to_string()))?;
        Self::from_raw_with(raw, math)
    }
}

// Components are always finite, so the total order is well defined.
impl Eq for Coordinate {}

impl PartialOrd for Coordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then(self.y.total_cmp(&other.y))
            .then(self.z.total_cmp(&other.z))
    }
}

impl Sub for Coordinate {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}
