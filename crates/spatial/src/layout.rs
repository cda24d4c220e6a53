//! Whole-building layout analysis, layout suggestions and pairwise
//! relationship analysis.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bim_kernel::{BimModel, BoundingBox, Element, ElementKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::accessibility::AccessibilityKind;
use crate::engine::SpatialEngine;
use crate::error::SpatialError;
use crate::relation::{classify, SpatialRelation};

pub const CIRCULATION_TYPES: [&str; 4] = ["lobby", "circulation", "corridor", "hallway"];

/// Functional zone a room type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Work,
    Support,
    Technical,
    Circulation,
    General,
}

impl Zone {
    pub fn of_room_type(room_type: Option<&str>) -> Self {
        match room_type {
            Some("office" | "conference") => Self::Work,
            Some("bathroom" | "break_room") => Self::Support,
            Some("mechanical" | "electrical") => Self::Technical,
            Some(t) if CIRCULATION_TYPES.contains(&t) => Self::Circulation,
            _ => Self::General,
        }
    }
}

fn is_circulation(room: &Element) -> bool {
    room.room_type.as_deref().is_some_and(|t| CIRCULATION_TYPES.contains(&t))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CirculationAnalysis {
    pub circulation_rooms: Vec<String>,
    /// Circulation room → rooms it opens onto.
    pub main_paths: BTreeMap<String, Vec<String>>,
    /// Circulation rooms reaching at most one other room.
    pub dead_ends: Vec<String>,
    pub circulation_area: f64,
    /// Share of floor area not spent on circulation.
    pub efficiency_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    /// Room area over building footprint, at most 1.
    pub space_utilization: f64,
    pub circulation_ratio: f64,
    pub average_compactness: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialHierarchy {
    /// Floor level (or "unassigned") → room ids.
    pub floors: BTreeMap<String, Vec<String>>,
    pub zones: BTreeMap<Zone, Vec<String>>,
    /// Parent container id (or "ungrouped") → room ids.
    pub functional_groups: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildingLayout {
    pub total_rooms: usize,
    pub total_area: f64,
    /// Room type (or "unspecified") → count.
    pub room_distribution: BTreeMap<String, usize>,
    pub circulation: CirculationAnalysis,
    pub efficiency: EfficiencyMetrics,
    pub hierarchy: SpatialHierarchy,
    /// The element budget cut the analysis short.
    pub truncated: bool,
}

impl fmt::Display for BuildingLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Building: {} rooms, {:.2} total area", self.total_rooms, self.total_area)?;
        writeln!(
            f,
            "  circulation: {} rooms, {} dead ends, efficiency {:.2}",
            self.circulation.circulation_rooms.len(),
            self.circulation.dead_ends.len(),
            self.circulation.efficiency_ratio
        )?;
        write!(
            f,
            "  utilization {:.2}, compactness {:.2}",
            self.efficiency.space_utilization, self.efficiency.average_compactness
        )?;
        if self.truncated {
            write!(f, " (truncated)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutConstraints {
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub accessibility: Vec<AccessibilityKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSuggestion {
    pub room_id: String,
    pub priority: Priority,
    pub issue: String,
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutOptimization {
    pub violations: usize,
    /// max(0, 100 − 10 × violations).
    pub optimization_score: f64,
    /// Highest priority first; equal priorities keep room order.
    pub suggestions: Vec<LayoutSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRelation {
    pub a: String,
    pub b: String,
    pub relation: SpatialRelation,
    pub distance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipAnalysis {
    pub pairs: Vec<PairRelation>,
    /// Connected groups of elements closer than the near distance.
    pub proximity_groups: Vec<Vec<String>>,
    pub collisions: Vec<(String, String)>,
}

impl SpatialEngine {
    #[instrument(skip(self, model))]
    pub fn building_layout(&mut self, model: &BimModel) -> Result<BuildingLayout, SpatialError> {
        let (elements, truncated) = self.budgeted(model, "building_layout");
        let rooms: Vec<&Element> = elements.iter().copied().filter(|e| e.kind == ElementKind::Room).collect();

        let mut layout = BuildingLayout { total_rooms: rooms.len(), truncated, ..Default::default() };
        let mut compactness = 0.0;
        for room in &rooms {
            let shape = self.cached(&room.id)?;
            let (area, perimeter) = (shape.area(), shape.perimeter());
            layout.total_area += area;
            if perimeter > 0.0 {
                compactness += (4.0 * std::f64::consts::PI * area / (perimeter * perimeter)).min(1.0);
            }

            let room_type = room.room_type.clone().unwrap_or_else(|| "unspecified".into());
            *layout.room_distribution.entry(room_type).or_default() += 1;

            let floor = room.floor_level.map_or_else(|| "unassigned".to_string(), |l| l.to_string());
            layout.hierarchy.floors.entry(floor).or_default().push(room.id.clone());
            layout
                .hierarchy
                .zones
                .entry(Zone::of_room_type(room.room_type.as_deref()))
                .or_default()
                .push(room.id.clone());
            let group = room.parent_id.clone().unwrap_or_else(|| "ungrouped".into());
            layout.hierarchy.functional_groups.entry(group).or_default().push(room.id.clone());

            if is_circulation(room) {
                layout.circulation.circulation_rooms.push(room.id.clone());
                layout.circulation.circulation_area += area;
            }
        }

        let reach = self.config.adjacency_tolerance;
        for room in rooms.iter().filter(|r| is_circulation(r)) {
            let bbox = self.cached(&room.id)?.bbox();
            let candidates = self.nearby(&elements, &bbox, reach);
            let mut reached = Vec::new();
            for other in rooms.iter().filter(|o| o.id != room.id && candidates.contains(&o.id)) {
                let relation = classify(self.cached(&room.id)?, self.cached(&other.id)?, &self.config);
                if matches!(relation, SpatialRelation::Adjacent | SpatialRelation::Intersects) {
                    reached.push(other.id.clone());
                }
            }
            if reached.len() <= 1 {
                layout.circulation.dead_ends.push(room.id.clone());
            }
            layout.circulation.main_paths.insert(room.id.clone(), reached);
        }

        if layout.total_area > 0.0 {
            let ratio = layout.circulation.circulation_area / layout.total_area;
            layout.circulation.efficiency_ratio = 1.0 - ratio;
            layout.efficiency.circulation_ratio = ratio;
            layout.efficiency.space_utilization = (layout.total_area / self.footprint(&elements, &rooms)?).min(1.0);
        }
        if !rooms.is_empty() {
            layout.efficiency.average_compactness = compactness / rooms.len() as f64;
        }

        self.stats.analyses_performed += 1;
        info!(rooms = layout.total_rooms, area = layout.total_area, truncated, "building layout analysed");
        Ok(layout)
    }

    /// Area of the building outlines if the model has any, otherwise of the
    /// box around all rooms.
    fn footprint(&self, elements: &[&Element], rooms: &[&Element]) -> Result<f64, SpatialError> {
        let mut outline = 0.0;
        for b in elements.iter().filter(|e| e.kind == ElementKind::Building) {
            outline += self.cached(&b.id)?.area();
        }
        if outline > 0.0 {
            return Ok(outline);
        }
        let mut bbox: Option<BoundingBox> = None;
        for r in rooms {
            let bb = self.cached(&r.id)?.bbox();
            bbox = Some(bbox.map_or(bb, |acc| acc.union(&bb)));
        }
        Ok(bbox.map_or(0.0, |bb| bb.width() * bb.height()))
    }

    /// Check every room against `constraints`. Never touches the model.
    pub fn optimize_layout(
        &mut self,
        model: &BimModel,
        constraints: &LayoutConstraints,
    ) -> Result<LayoutOptimization, SpatialError> {
        let (rooms, _) = self.budgeted_rooms(model, "optimize_layout");
        let mut suggestions = Vec::new();

        for room in rooms {
            let area = self.cached(&room.id)?.area();
            if let Some(min) = constraints.min_area.filter(|min| area < *min) {
                suggestions.push(LayoutSuggestion {
                    room_id: room.id.clone(),
                    priority: Priority::High,
                    issue: format!("area {area:.2} is below the minimum {min}"),
                    action: "expand the room or merge it with a neighbour".into(),
                });
            }
            if let Some(max) = constraints.max_area.filter(|max| area > *max) {
                suggestions.push(LayoutSuggestion {
                    room_id: room.id.clone(),
                    priority: Priority::Medium,
                    issue: format!("area {area:.2} exceeds the maximum {max}"),
                    action: "subdivide the room".into(),
                });
            }
            for kind in &constraints.accessibility {
                let check = self.accessibility_check(model, &room.id, *kind)?;
                if check.accessible {
                    continue;
                }
                let priority = match kind {
                    AccessibilityKind::Wheelchair => Priority::Medium,
                    AccessibilityKind::EmergencyExit | AccessibilityKind::FireEscape => Priority::High,
                };
                suggestions.push(LayoutSuggestion {
                    room_id: room.id.clone(),
                    priority,
                    issue: format!("{kind} check failed: {}", check.issues.join("; ")),
                    action: check.recommendations.join("; "),
                });
            }
        }

        suggestions.sort_by(|a, b| b.priority.cmp(&a.priority));
        let violations = suggestions.len();
        self.stats.analyses_performed += 1;
        debug!(violations, "layout checked");
        Ok(LayoutOptimization {
            violations,
            optimization_score: (100.0 - 10.0 * violations as f64).max(0.0),
            suggestions,
        })
    }

    /// Relations between every pair of `ids`, in the order given.
    pub fn analyze_relationships(&mut self, model: &BimModel, ids: &[&str]) -> Result<RelationshipAnalysis, SpatialError> {
        for id in ids {
            self.shape(model, id)?;
        }

        let mut analysis = RelationshipAnalysis::default();
        let mut parent: Vec<usize> = (0..ids.len()).collect();
        for i in 0..ids.len() {
            for j in i + 1..ids.len() {
                let (a, b) = (self.cached(ids[i])?, self.cached(ids[j])?);
                let relation = classify(a, b, &self.config);
                let distance = a.distance(b, self.config.contact_epsilon);
                if distance < self.config.near_distance {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    parent[ri.max(rj)] = ri.min(rj);
                }
                if matches!(relation, SpatialRelation::Contains | SpatialRelation::Inside | SpatialRelation::Intersects) {
                    analysis.collisions.push((ids[i].to_string(), ids[j].to_string()));
                }
                analysis.pairs.push(PairRelation { a: ids[i].to_string(), b: ids[j].to_string(), relation, distance });
                self.stats.spatial_queries += 1;
            }
        }

        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut slot: HashMap<usize, usize> = HashMap::new();
        for i in 0..ids.len() {
            let root = find(&mut parent, i);
            let g = *slot.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push(ids[i].to_string());
        }
        analysis.proximity_groups = groups.into_iter().filter(|g| g.len() > 1).collect();

        self.stats.analyses_performed += 1;
        Ok(analysis)
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}
