//! The spatial reasoning engine: cached planar shapes, relation queries,
//! collision detection and room metrics.

use std::collections::HashMap;
use std::f64::consts::PI;

use bim_kernel::{BimModel, BoundingBox, Coordinate, Element, ElementKind, PrecisionMath};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::accessibility::AccessibilityKind;
use crate::config::SpatialConfig;
use crate::error::SpatialError;
use crate::index::{FootprintEntry, FootprintIndex};
use crate::relation::{classify, SpatialRelation};
use crate::shape::{Location, PlanarShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionType {
    Intersection,
    Containment,
    /// Separate, but closer than the configured clearance.
    Clearance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionSeverity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    pub collision_with: String,
    #[serde(rename = "type")]
    pub collision_type: CollisionType,
    pub intersection_area: f64,
    pub severity: CollisionSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMetrics {
    pub room_id: String,
    pub area: f64,
    pub perimeter: f64,
    pub centroid: Coordinate,
    pub bounding_box: BoundingBox,
    /// 4πA/P², 1.0 for a circle.
    pub compactness: f64,
    pub device_count: usize,
    /// Devices per unit area.
    pub device_density: f64,
    pub accessibility_score: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialStats {
    pub analyses_performed: usize,
    pub spatial_queries: usize,
    pub collision_detections: usize,
    pub accessibility_checks: usize,
}

/// Derives spatial facts from a [`BimModel`].
///
/// Shapes are cached per element id on first use and kept until
/// [`clear_cache`](Self::clear_cache); callers that mutate the model must
/// clear the cache themselves. Queries may populate the cache, so they all
/// take `&mut self`.
#[derive(Debug, Default)]
pub struct SpatialEngine {
    pub(crate) config: SpatialConfig,
    pub(crate) math: PrecisionMath,
    cache: HashMap<String, PlanarShape>,
    index: Option<FootprintIndex>,
    pub(crate) stats: SpatialStats,
}

impl SpatialEngine {
    pub fn new(config: SpatialConfig) -> Self {
        Self::with_precision(config, PrecisionMath::default())
    }

    pub fn with_precision(config: SpatialConfig, math: PrecisionMath) -> Self {
        Self { config, math, cache: HashMap::new(), index: None, stats: SpatialStats::default() }
    }

    pub fn config(&self) -> &SpatialConfig {
        &self.config
    }

    pub fn stats(&self) -> SpatialStats {
        self.stats
    }

    pub fn cached_shapes(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        debug!(shapes = self.cache.len(), "spatial cache cleared");
        self.cache.clear();
        self.index = None;
    }

    /// The planar shape of `id`, computed on first access.
    pub fn shape(&mut self, model: &BimModel, id: &str) -> Result<&PlanarShape, SpatialError> {
        let element = model.get(id).ok_or_else(|| SpatialError::UnknownElement(id.to_string()))?;
        self.cache_element(element);
        self.cache.get(id).ok_or_else(|| SpatialError::UnknownElement(id.to_string()))
    }

    pub(crate) fn cache_element(&mut self, element: &Element) {
        if !self.cache.contains_key(&element.id) {
            let shape = PlanarShape::from_entity(&element.geometry, self.config.circle_segments);
            debug!(element = %element.id, "shape cached");
            self.cache.insert(element.id.clone(), shape);
        }
    }

    /// Shape of an element already passed through `cache_element`.
    pub(crate) fn cached(&self, id: &str) -> Result<&PlanarShape, SpatialError> {
        self.cache.get(id).ok_or_else(|| SpatialError::UnknownElement(id.to_string()))
    }

    /// Model elements in order, capped at `max_elements`. Every returned
    /// element is cached.
    pub(crate) fn budgeted<'m>(&mut self, model: &'m BimModel, operation: &str) -> (Vec<&'m Element>, bool) {
        let cap = self.config.max_elements.unwrap_or(usize::MAX);
        let elements: Vec<&Element> = model.iter().take(cap).collect();
        let truncated = model.len() > elements.len();
        if truncated {
            warn!(operation, limit = cap, total = model.len(), "element budget reached; analysis truncated");
        }
        for e in &elements {
            self.cache_element(e);
        }
        (elements, truncated)
    }

    pub(crate) fn budgeted_rooms<'m>(&mut self, model: &'m BimModel, operation: &str) -> (Vec<&'m Element>, bool) {
        let (elements, truncated) = self.budgeted(model, operation);
        (elements.into_iter().filter(|e| e.kind == ElementKind::Room).collect(), truncated)
    }

    fn ensure_index(&mut self, elements: &[&Element]) {
        if self.index.as_ref().is_some_and(|i| i.len() == elements.len()) {
            return;
        }
        let entries = elements
            .iter()
            .enumerate()
            .filter_map(|(order, e)| {
                let shape = self.cache.get(&e.id)?;
                Some(FootprintEntry { id: e.id.clone(), order, bbox: shape.bbox() })
            })
            .collect();
        self.index = Some(FootprintIndex::build(entries));
    }

    /// Ids whose footprint comes within `margin` of `bbox`, in model order.
    /// `elements` is always the full budgeted element list.
    pub(crate) fn nearby(&mut self, elements: &[&Element], bbox: &BoundingBox, margin: f64) -> Vec<String> {
        self.ensure_index(elements);
        self.index
            .as_ref()
            .map(|i| i.candidates(bbox, margin).into_iter().map(|e| e.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn determine_relation(&mut self, model: &BimModel, a: &str, b: &str) -> Result<SpatialRelation, SpatialError> {
        self.shape(model, a)?;
        self.shape(model, b)?;
        let relation = classify(self.cached(a)?, self.cached(b)?, &self.config);
        self.stats.spatial_queries += 1;
        Ok(relation)
    }

    /// Everything `id` overlaps, contains, sits inside of, or comes closer
    /// to than the collision clearance.
    pub fn detect_collisions(&mut self, model: &BimModel, id: &str) -> Result<Vec<Collision>, SpatialError> {
        let target = self.shape(model, id)?.clone();
        let (elements, _) = self.budgeted(model, "detect_collisions");
        let margin = self.config.collision_clearance + self.config.contact_epsilon;
        let candidates = self.nearby(&elements, &target.bbox(), margin);

        let mut collisions = Vec::new();
        for other_id in candidates.iter().filter(|c| c.as_str() != id) {
            let other = self.cached(other_id)?;
            let (collision_type, area) = match classify(&target, other, &self.config) {
                SpatialRelation::Contains => (CollisionType::Containment, other.area()),
                SpatialRelation::Inside => (CollisionType::Containment, target.area()),
                SpatialRelation::Intersects => (CollisionType::Intersection, target.intersection_area(other)),
                _ if target.distance(other, self.config.contact_epsilon) < self.config.collision_clearance => {
                    (CollisionType::Clearance, 0.0)
                }
                _ => continue,
            };
            let severity = if area > self.config.high_severity_area {
                CollisionSeverity::High
            } else {
                CollisionSeverity::Medium
            };
            collisions.push(Collision {
                collision_with: other_id.clone(),
                collision_type,
                intersection_area: area,
                severity,
            });
        }

        self.stats.collision_detections += 1;
        debug!(element = id, collisions = collisions.len(), "collisions detected");
        Ok(collisions)
    }

    pub(crate) fn room<'m>(&self, model: &'m BimModel, id: &str) -> Result<&'m Element, SpatialError> {
        let element = model.get(id).ok_or_else(|| SpatialError::UnknownElement(id.to_string()))?;
        if element.kind != ElementKind::Room {
            return Err(SpatialError::NotARoom { id: id.to_string(), kind: element.kind });
        }
        Ok(element)
    }

    pub fn room_metrics(&mut self, model: &BimModel, id: &str) -> Result<RoomMetrics, SpatialError> {
        let room = self.room(model, id)?;
        let shape = self.shape(model, id)?.clone();

        let area = shape.area();
        let perimeter = shape.perimeter();
        let [cx, cy] = shape.centroid();
        let centroid = self.math.coordinate(cx, cy, room.geometry.anchor()[2])?;
        let compactness = if perimeter > 0.0 {
            (4.0 * PI * area / (perimeter * perimeter)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let (elements, _) = self.budgeted(model, "room_metrics");
        let mut device_count = 0;
        for device in elements.iter().filter(|e| e.kind.is_device()) {
            let at = self.cached(&device.id)?.centroid();
            if shape.locate(at, self.config.contact_epsilon) != Location::Outside {
                device_count += 1;
            }
        }
        let device_density = if area > 0.0 { device_count as f64 / area } else { 0.0 };

        let mut score = 0.0;
        for kind in AccessibilityKind::ALL {
            score += self.accessibility_check(model, id, kind)?.score;
        }

        self.stats.analyses_performed += 1;
        Ok(RoomMetrics {
            room_id: id.to_string(),
            area,
            perimeter,
            centroid,
            bounding_box: shape.bbox(),
            compactness,
            device_count,
            device_density,
            accessibility_score: score / AccessibilityKind::ALL.len() as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bim_kernel::GeometricEntity;

    fn room(id: &str, x: f64, y: f64, w: f64, h: f64) -> Element {
        let origin = Coordinate::xy(x, y).unwrap();
        Element::new(id, ElementKind::Room, GeometricEntity::rectangle(origin, w, h).unwrap())
    }

    fn device(id: &str, x: f64, y: f64) -> Element {
        Element::new(id, ElementKind::Device, GeometricEntity::point(Coordinate::xy(x, y).unwrap()))
    }

    #[test]
    fn test_shape_cache_lifecycle() {
        let model: BimModel = [room("R1", 0.0, 0.0, 4.0, 4.0)].into_iter().collect();
        let mut engine = SpatialEngine::default();
        assert_eq!(engine.cached_shapes(), 0);
        engine.shape(&model, "R1").unwrap();
        engine.shape(&model, "R1").unwrap();
        assert_eq!(engine.cached_shapes(), 1);
        engine.clear_cache();
        assert_eq!(engine.cached_shapes(), 0);
        assert!(matches!(engine.shape(&model, "nope"), Err(SpatialError::UnknownElement(_))));
    }

    #[test]
    fn test_collision_types() {
        let model: BimModel = [
            room("R1", 0.0, 0.0, 10.0, 10.0),
            room("R2", 8.0, 0.0, 10.0, 10.0),
            room("R3", 0.0, 10.0, 10.0, 10.0),
            device("D1", 5.0, 5.0),
        ]
        .into_iter()
        .collect();
        let mut engine = SpatialEngine::default();
        let hits = engine.detect_collisions(&model, "R1").unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].collision_with, "R2");
        assert_eq!(hits[0].collision_type, CollisionType::Intersection);
        assert_abs_diff_eq!(hits[0].intersection_area, 20.0, epsilon = 1e-9);
        assert_eq!(hits[0].severity, CollisionSeverity::High);
        assert_eq!(hits[1].collision_with, "D1");
        assert_eq!(hits[1].collision_type, CollisionType::Containment);
        assert_eq!(hits[1].severity, CollisionSeverity::Medium);
        assert_eq!(engine.stats().collision_detections, 1);
    }

    #[test]
    fn test_clearance_collisions() {
        let model: BimModel = [device("A", 0.0, 0.0), device("B", 0.5, 0.0)].into_iter().collect();
        let mut engine = SpatialEngine::default();
        assert!(engine.detect_collisions(&model, "A").unwrap().is_empty());

        let config = SpatialConfig { collision_clearance: 1.0, ..Default::default() };
        let mut strict = SpatialEngine::new(config);
        let hits = strict.detect_collisions(&model, "A").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].collision_type, CollisionType::Clearance);
    }

    #[test]
    fn test_room_metrics() {
        let model: BimModel = [room("R1", 0.0, 0.0, 4.0, 4.0), device("D1", 1.0, 1.0), device("D2", 9.0, 9.0)]
            .into_iter()
            .collect();
        let mut engine = SpatialEngine::default();
        let m = engine.room_metrics(&model, "R1").unwrap();
        assert_abs_diff_eq!(m.area, 16.0);
        assert_abs_diff_eq!(m.perimeter, 16.0);
        assert_eq!((m.centroid.x(), m.centroid.y()), (2.0, 2.0));
        assert_abs_diff_eq!(m.compactness, PI / 4.0, epsilon = 1e-9);
        assert_eq!(m.device_count, 1);
        assert_abs_diff_eq!(m.device_density, 1.0 / 16.0);
        assert!((0.0..=100.0).contains(&m.accessibility_score));
    }

    #[test]
    fn test_room_metrics_rejects_non_rooms() {
        let model: BimModel = [device("D1", 1.0, 1.0)].into_iter().collect();
        let mut engine = SpatialEngine::default();
        assert!(matches!(
            engine.room_metrics(&model, "D1"),
            Err(SpatialError::NotARoom { kind: ElementKind::Device, .. })
        ));
    }

    #[test]
    fn test_budget_truncates() {
        let model: BimModel = (0..5).map(|i| device(&format!("d{i}"), i as f64 * 0.1, 0.0)).collect();
        let config = SpatialConfig { max_elements: Some(2), collision_clearance: 1.0, ..Default::default() };
        let mut engine = SpatialEngine::new(config);
        let hits = engine.detect_collisions(&model, "d0").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].collision_with, "d1");
    }
}
