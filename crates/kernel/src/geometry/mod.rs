pub mod bbox;
pub mod coordinate;
pub mod entity;
pub mod math;
pub mod transform;
pub mod vector;

pub use bbox::BoundingBox;
pub use coordinate::{Coordinate, RawCoordinate, COORDINATE_BYTES};
pub use entity::{EntityKind, GeometricEntity, Shape};
pub use math::PrecisionMath;
pub use transform::CoordinateTransform;
pub use vector::Vec3;
