//! Rule-based accessibility scoring for rooms.

use std::fmt;

use bim_kernel::{BimModel, Element, ElementKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::SpatialEngine;
use crate::error::SpatialError;
use crate::shape::Location;

pub const MIN_WHEELCHAIR_AREA: f64 = 15.0;
pub const MIN_CLEAR_FLOOR_WIDTH: f64 = 1.5;
pub const MIN_DOOR_WIDTH: f64 = 0.8;
pub const MIN_EGRESS_WINDOW_WIDTH: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessibilityKind {
    Wheelchair,
    EmergencyExit,
    FireEscape,
}

impl AccessibilityKind {
    pub const ALL: [AccessibilityKind; 3] = [Self::Wheelchair, Self::EmergencyExit, Self::FireEscape];
}

impl fmt::Display for AccessibilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wheelchair => "wheelchair",
            Self::EmergencyExit => "emergency_exit",
            Self::FireEscape => "fire_escape",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityResult {
    pub room_id: String,
    pub kind: AccessibilityKind,
    /// True when no rule fired.
    pub accessible: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    /// 0–100.
    pub score: f64,
}

struct Findings {
    score: f64,
    issues: Vec<String>,
    recommendations: Vec<String>,
}

impl Findings {
    fn new() -> Self {
        Self { score: 100.0, issues: Vec::new(), recommendations: Vec::new() }
    }

    fn penalise(&mut self, points: f64, issue: String, recommendation: impl Into<String>) {
        self.score -= points;
        self.issues.push(issue);
        self.recommendations.push(recommendation.into());
    }
}

impl SpatialEngine {
    pub fn accessibility_check(
        &mut self,
        model: &BimModel,
        room_id: &str,
        kind: AccessibilityKind,
    ) -> Result<AccessibilityResult, SpatialError> {
        self.room(model, room_id)?;
        let shape = self.shape(model, room_id)?.clone();
        let mut f = Findings::new();

        match kind {
            AccessibilityKind::Wheelchair => {
                let area = shape.area();
                if area < MIN_WHEELCHAIR_AREA {
                    f.penalise(
                        30.0,
                        format!("floor area {area:.2} is below {MIN_WHEELCHAIR_AREA}"),
                        "enlarge the room to allow a full turning circle",
                    );
                }
                let bb = shape.bbox();
                let clear = bb.width().min(bb.height());
                if clear < MIN_CLEAR_FLOOR_WIDTH {
                    f.penalise(
                        20.0,
                        format!("clear floor width {clear:.2} is below {MIN_CLEAR_FLOOR_WIDTH}"),
                        format!("widen the room to at least {MIN_CLEAR_FLOOR_WIDTH}"),
                    );
                }
                let doors = self.openings(model, room_id, ElementKind::Door)?;
                if doors.is_empty() {
                    f.penalise(50.0, "room has no door".into(), "add an accessible door");
                }
                for door in doors {
                    if let Some(w) = door.opening_width().filter(|w| *w < MIN_DOOR_WIDTH) {
                        f.penalise(
                            20.0,
                            format!("door {} is {w:.2} wide, below {MIN_DOOR_WIDTH}", door.id),
                            format!("widen door {} to at least {MIN_DOOR_WIDTH}", door.id),
                        );
                    }
                }
            }
            AccessibilityKind::EmergencyExit => {
                let doors = self.openings(model, room_id, ElementKind::Door)?;
                if !doors.iter().any(|d| d.property_bool("emergency_exit") == Some(true)) {
                    f.penalise(60.0, "room has no emergency exit".into(), "designate or add an emergency exit door");
                }
            }
            AccessibilityKind::FireEscape => {
                let windows = self.openings(model, room_id, ElementKind::Window)?;
                if windows.is_empty() {
                    f.penalise(40.0, "room has no escape window".into(), "add an openable window");
                }
                for window in windows {
                    if let Some(w) = window.opening_width().filter(|w| *w < MIN_EGRESS_WINDOW_WIDTH) {
                        f.penalise(
                            20.0,
                            format!("window {} is {w:.2} wide, below {MIN_EGRESS_WINDOW_WIDTH}", window.id),
                            format!("widen window {} to at least {MIN_EGRESS_WINDOW_WIDTH}", window.id),
                        );
                    }
                }
            }
        }

        self.stats.accessibility_checks += 1;
        debug!(room = room_id, %kind, score = f.score, "accessibility checked");
        Ok(AccessibilityResult {
            room_id: room_id.to_string(),
            kind,
            accessible: f.issues.is_empty(),
            issues: f.issues,
            recommendations: f.recommendations,
            score: f.score.clamp(0.0, 100.0),
        })
    }

    /// Doors or windows of a room: children by `parent_id`, or elements whose
    /// centre lies on the room boundary.
    fn openings<'m>(
        &mut self,
        model: &'m BimModel,
        room_id: &str,
        kind: ElementKind,
    ) -> Result<Vec<&'m Element>, SpatialError> {
        let room = self.shape(model, room_id)?.clone();
        let tolerance = self.config.adjacency_tolerance;
        let mut found = Vec::new();
        for e in model.of_kind(kind) {
            if e.parent_id.as_deref() == Some(room_id) {
                found.push(e);
                continue;
            }
            let centre = self.shape(model, &e.id)?.centroid();
            if room.locate(centre, tolerance) == Location::Boundary {
                found.push(e);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bim_kernel::{Coordinate, GeometricEntity};

    fn room(id: &str, w: f64, h: f64) -> Element {
        Element::new(id, ElementKind::Room, GeometricEntity::rectangle(Coordinate::ORIGIN, w, h).unwrap())
    }

    fn opening(id: &str, kind: ElementKind, from: (f64, f64), to: (f64, f64)) -> Element {
        let a = Coordinate::xy(from.0, from.1).unwrap();
        let b = Coordinate::xy(to.0, to.1).unwrap();
        Element::new(id, kind, GeometricEntity::line(a, b))
    }

    #[test]
    fn test_wheelchair_all_clear() {
        let model: BimModel =
            [room("R1", 5.0, 4.0), opening("D1", ElementKind::Door, (1.0, 0.0), (2.0, 0.0))].into_iter().collect();
        let mut engine = SpatialEngine::default();
        let r = engine.accessibility_check(&model, "R1", AccessibilityKind::Wheelchair).unwrap();
        assert!(r.accessible, "{:?}", r.issues);
        assert_eq!(r.score, 100.0);
    }

    #[test]
    fn test_wheelchair_penalties_clamp() {
        // Area 1.0 (-30), width 1.0 (-20), no door (-50).
        let model: BimModel = [room("R1", 1.0, 1.0)].into_iter().collect();
        let mut engine = SpatialEngine::default();
        let r = engine.accessibility_check(&model, "R1", AccessibilityKind::Wheelchair).unwrap();
        assert!(!r.accessible);
        assert_eq!(r.issues.len(), 3);
        assert_eq!(r.recommendations.len(), 3);
        assert_eq!(r.score, 0.0);
    }

    #[test]
    fn test_narrow_door_by_parent() {
        let model: BimModel = [
            room("R1", 5.0, 4.0),
            opening("D1", ElementKind::Door, (20.0, 0.0), (20.5, 0.0)).with_parent("R1"),
        ]
        .into_iter()
        .collect();
        let mut engine = SpatialEngine::default();
        let r = engine.accessibility_check(&model, "R1", AccessibilityKind::Wheelchair).unwrap();
        assert_eq!(r.score, 80.0);
        assert!(r.issues[0].contains("D1"));
    }

    #[test]
    fn test_emergency_exit() {
        let plain = opening("D1", ElementKind::Door, (1.0, 0.0), (2.0, 0.0));
        let model: BimModel = [room("R1", 5.0, 4.0), plain.clone()].into_iter().collect();
        let mut engine = SpatialEngine::default();
        assert_eq!(engine.accessibility_check(&model, "R1", AccessibilityKind::EmergencyExit).unwrap().score, 40.0);

        let exit = plain.with_property("emergency_exit", true);
        let model: BimModel = [room("R1", 5.0, 4.0), exit].into_iter().collect();
        let mut engine = SpatialEngine::default();
        assert!(engine.accessibility_check(&model, "R1", AccessibilityKind::EmergencyExit).unwrap().accessible);
    }

    #[test]
    fn test_fire_escape() {
        let model: BimModel = [
            room("R1", 5.0, 4.0),
            opening("W1", ElementKind::Window, (5.0, 1.0), (5.0, 1.4)),
            opening("W2", ElementKind::Window, (0.0, 1.0), (0.0, 2.0)),
        ]
        .into_iter()
        .collect();
        let mut engine = SpatialEngine::default();
        let r = engine.accessibility_check(&model, "R1", AccessibilityKind::FireEscape).unwrap();
        assert_eq!(r.score, 80.0);
        assert_eq!(r.issues.len(), 1);
        assert_eq!(engine.stats().accessibility_checks, 1);
    }
}
