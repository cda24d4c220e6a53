//! Pairwise interference between placed components.
//!
//! The broad phase is a sweep-and-prune over world bounding boxes along X.
//! Pairs whose boxes overlap go to the narrow phase, which flags them when
//! their centres are closer than the minimum clearance. The narrow phase is a
//! centre-distance heuristic, not a solid intersection test.

use bim_kernel::{BoundingBox, PrecisionConfig, PrecisionMath};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::Component;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterferenceConfig {
    /// Centre distance below which two overlapping components interfere.
    pub min_clearance: f64,
}

impl Default for InterferenceConfig {
    fn default() -> Self {
        Self { min_clearance: 1.0 }
    }
}

impl InterferenceConfig {
    pub fn from_precision(config: &PrecisionConfig) -> Self {
        Self { min_clearance: config.min_assembly_clearance }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interference {
    pub component_a: String,
    pub component_b: String,
    pub center_distance: f64,
    pub overlap: BoundingBox,
}

/// All interfering pairs, ordered by `(component_a, component_b)` with
/// `component_a < component_b`.
pub fn find_interferences<'a, I>(components: I, config: &InterferenceConfig, math: &PrecisionMath) -> Vec<Interference>
where
    I: IntoIterator<Item = &'a Component>,
{
    let mut boxes: Vec<(&Component, BoundingBox)> = components.into_iter().map(|c| (c, c.world_bbox())).collect();
    boxes.sort_by(|a, b| a.1.min[0].total_cmp(&b.1.min[0]).then_with(|| a.0.id.cmp(&b.0.id)));

    let mut found = Vec::new();
    let mut broad = 0usize;
    for (i, (a, box_a)) in boxes.iter().enumerate() {
        for (b, box_b) in &boxes[i + 1..] {
            if box_b.min[0] > box_a.max[0] {
                break;
            }
            let Some(overlap) = box_a.intersection(box_b) else {
                continue;
            };
            broad += 1;
            let center_distance = math.distance(box_a.center(), box_b.center());
            if center_distance < config.min_clearance {
                let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
                found.push(Interference {
                    component_a: first.id.clone(),
                    component_b: second.id.clone(),
                    center_distance,
                    overlap,
                });
            }
        }
    }

    found.sort_by(|x, y| (&x.component_a, &x.component_b).cmp(&(&y.component_a, &y.component_b)));
    debug!(candidates = broad, interferences = found.len(), "interference scan");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use bim_kernel::{Coordinate, GeometricEntity};

    fn block(id: &str, x: f64, y: f64) -> Component {
        let geometry = GeometricEntity::rectangle(Coordinate::ORIGIN, 1.0, 1.0).unwrap();
        Component::new(id, id, geometry).at(Coordinate::xy(x, y).unwrap())
    }

    fn scan(components: &[Component]) -> Vec<Interference> {
        find_interferences(components, &InterferenceConfig::default(), &PrecisionMath::default())
    }

    #[test]
    fn test_close_overlapping_pair() {
        let hits = scan(&[block("b", 0.5, 0.0), block("a", 0.0, 0.0)]);
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].component_a.as_str(), hits[0].component_b.as_str()), ("a", "b"));
        assert!((hits[0].center_distance - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_separated_boxes_skip_narrow_phase() {
        assert!(scan(&[block("a", 0.0, 0.0), block("b", 3.0, 0.0)]).is_empty());
    }

    #[test]
    fn test_overlap_with_enough_clearance() {
        // Boxes touch but the centres are exactly one unit apart.
        assert!(scan(&[block("a", 0.0, 0.0), block("b", 1.0, 0.0)]).is_empty());
        let tight = InterferenceConfig { min_clearance: 1.5 };
        let hits = find_interferences(
            &[block("a", 0.0, 0.0), block("b", 1.0, 0.0)],
            &tight,
            &PrecisionMath::default(),
        );
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_from_precision() {
        let p = PrecisionConfig { min_assembly_clearance: 2.5, ..Default::default() };
        assert_eq!(InterferenceConfig::from_precision(&p).min_clearance, 2.5);
    }
}
