use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SpatialConfig;
use crate::shape::PlanarShape;

/// Qualitative relation of shape `a` to shape `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialRelation {
    /// `a` holds `b`.
    Contains,
    /// `a` lies within `b`.
    Inside,
    Intersects,
    /// Shared boundary, or a gap below the adjacency tolerance.
    Adjacent,
    /// Contact at a single point.
    Touches,
    Near,
    Disjoint,
}

impl SpatialRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Inside => "inside",
            Self::Intersects => "intersects",
            Self::Adjacent => "adjacent",
            Self::Touches => "touches",
            Self::Near => "near",
            Self::Disjoint => "disjoint",
        }
    }

    pub fn is_contact(&self) -> bool {
        !matches!(self, Self::Near | Self::Disjoint)
    }
}

impl fmt::Display for SpatialRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(a: &PlanarShape, b: &PlanarShape, config: &SpatialConfig) -> SpatialRelation {
    let eps = config.contact_epsilon;
    if a.contains(b, eps) {
        return SpatialRelation::Contains;
    }
    if b.contains(a, eps) {
        return SpatialRelation::Inside;
    }
    if a.intersection_area(b) > eps || a.crosses(b, eps) {
        return SpatialRelation::Intersects;
    }

    let gap = a.distance(b, eps);
    if gap <= eps {
        let single_point = a
            .bbox()
            .expanded(eps)
            .intersection(&b.bbox().expanded(eps))
            .is_none_or(|bb| bb.width() <= 4.0 * eps && bb.height() <= 4.0 * eps);
        return if single_point { SpatialRelation::Touches } else { SpatialRelation::Adjacent };
    }
    if gap < config.adjacency_tolerance {
        SpatialRelation::Adjacent
    } else if gap < config.near_distance {
        SpatialRelation::Near
    } else {
        SpatialRelation::Disjoint
    }
}
