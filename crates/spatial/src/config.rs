use bim_kernel::PrecisionConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Gaps below this count as adjacency.
    pub adjacency_tolerance: f64,
    /// Gaps below this count as proximity.
    pub near_distance: f64,
    /// Distances at or below this are contact.
    pub contact_epsilon: f64,
    /// Extra clearance added to the collision broad phase.
    pub collision_clearance: f64,
    /// Overlap area above which a collision is high severity.
    pub high_severity_area: f64,
    /// Cap on elements examined by O(n²) analyses. `None` means unbounded.
    pub max_elements: Option<usize>,
    pub circle_segments: usize,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            adjacency_tolerance: 0.1,
            near_distance: 5.0,
            contact_epsilon: 0.0005,
            collision_clearance: 0.0,
            high_severity_area: 1.0,
            max_elements: None,
            circle_segments: 32,
        }
    }
}

impl SpatialConfig {
    /// Snapped coordinates are exact to the step, so half a step is contact.
    pub fn from_precision(config: &PrecisionConfig) -> Self {
        Self { contact_epsilon: config.precision_step * 0.5, ..Self::default() }
    }
}
