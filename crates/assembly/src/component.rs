//! Assembly members and their placement.

use std::f64::consts::TAU;

use bim_kernel::{BoundingBox, Coordinate, GeometricEntity, Shape};
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    #[default]
    Unplaced,
    Placed,
    Constrained,
    /// Placed but free to move; needs constraints.
    Floating,
    Fixed,
}

/// A rigid part placed by position, rotation about Z and uniform scale.
/// `geometry` is in the component's local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub geometry: GeometricEntity,
    pub position: Coordinate,
    /// Radians about Z, expected in `[0, 2π]`.
    pub rotation: f64,
    pub scale: f64,
    pub status: ComponentStatus,
    /// Set when the component is added to an assembly.
    pub parent_assembly: Option<String>,
    /// Child component ids, in the order they were attached.
    pub children: Vec<String>,
}

impl Component {
    pub fn new(id: impl Into<String>, name: impl Into<String>, geometry: GeometricEntity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            geometry,
            position: Coordinate::ORIGIN,
            rotation: 0.0,
            scale: 1.0,
            status: ComponentStatus::Unplaced,
            parent_assembly: None,
            children: Vec::new(),
        }
    }

    /// Place at `position`; an unplaced component becomes placed.
    pub fn at(mut self, position: Coordinate) -> Self {
        self.position = position;
        if self.status == ComponentStatus::Unplaced {
            self.status = ComponentStatus::Placed;
        }
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_status(mut self, status: ComponentStatus) -> Self {
        self.status = status;
        self
    }

    /// Transform problems, one message each. Empty when the placement is usable.
    pub fn transform_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.position.to_array().iter().all(|v| v.is_finite()) {
            errors.push(format!("position {} is not finite", self.position));
        }
        if !self.rotation.is_finite() || !(0.0..=TAU).contains(&self.rotation) {
            errors.push(format!("rotation {} is outside [0, 2π]", self.rotation));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            errors.push(format!("scale {} must be positive", self.scale));
        }
        errors
    }

    /// Bounding box after scale, rotation about the local origin, then
    /// translation to `position`.
    pub fn world_bbox(&self) -> BoundingBox {
        let local = self.geometry.bounding_box();
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), self.rotation);
        let offset = Vector3::from(self.position.to_array());
        let corners = local.corners().map(|c| {
            let p = rotation * (Vector3::from(c) * self.scale) + offset;
            [p.x, p.y, p.z]
        });
        BoundingBox::from_points(corners).unwrap_or(local)
    }

    pub fn world_center(&self) -> [f64; 3] {
        self.world_bbox().center()
    }
}
