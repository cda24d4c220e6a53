//! The aggregate spatial report.

use std::collections::BTreeMap;
use std::fmt;

use bim_kernel::{BimModel, ElementKind};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accessibility::{AccessibilityKind, AccessibilityResult};
use crate::engine::{Collision, RoomMetrics, SpatialEngine, SpatialStats};
use crate::error::SpatialError;
use crate::layout::{BuildingLayout, LayoutConstraints, LayoutOptimization};

/// Room area below which the report flags a room.
pub const REPORT_MIN_ROOM_AREA: f64 = 10.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollisionReport {
    pub total_collisions: usize,
    /// Element id → its collisions. Elements without any are omitted.
    pub collisions: BTreeMap<String, Vec<Collision>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityReport {
    pub rooms_checked: usize,
    pub accessible_rooms: usize,
    pub results: BTreeMap<String, Vec<AccessibilityResult>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReport {
    pub building_overview: BuildingLayout,
    pub room_analyses: BTreeMap<String, RoomMetrics>,
    pub collision_report: CollisionReport,
    pub accessibility_report: AccessibilityReport,
    pub optimization_recommendations: LayoutOptimization,
    pub statistics: SpatialStats,
}

impl fmt::Display for SpatialReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.building_overview)?;
        writeln!(f, "Collisions: {}", self.collision_report.total_collisions)?;
        writeln!(
            f,
            "Accessibility: {}/{} rooms pass",
            self.accessibility_report.accessible_rooms, self.accessibility_report.rooms_checked
        )?;
        write!(
            f,
            "Optimization score: {:.0} ({} suggestions)",
            self.optimization_recommendations.optimization_score,
            self.optimization_recommendations.suggestions.len()
        )
    }
}

impl SpatialEngine {
    /// Run every analysis over the model: layout, per-room metrics,
    /// collisions for every element, wheelchair and emergency-exit checks,
    /// and layout suggestions against a minimum room area.
    pub fn generate_report(&mut self, model: &BimModel) -> Result<SpatialReport, SpatialError> {
        let building_overview = self.building_layout(model)?;
        let (elements, _) = self.budgeted(model, "generate_report");
        let room_ids: Vec<String> =
            elements.iter().filter(|e| e.kind == ElementKind::Room).map(|e| e.id.clone()).collect();
        let all_ids: Vec<String> = elements.iter().map(|e| e.id.clone()).collect();

        let mut room_analyses = BTreeMap::new();
        for id in &room_ids {
            room_analyses.insert(id.clone(), self.room_metrics(model, id)?);
        }

        let mut collision_report = CollisionReport::default();
        for id in &all_ids {
            let hits = self.detect_collisions(model, id)?;
            if !hits.is_empty() {
                collision_report.total_collisions += hits.len();
                collision_report.collisions.insert(id.clone(), hits);
            }
        }

        let checks = [AccessibilityKind::Wheelchair, AccessibilityKind::EmergencyExit];
        let mut accessibility_report = AccessibilityReport::default();
        for id in &room_ids {
            let mut results = Vec::with_capacity(checks.len());
            for kind in checks {
                results.push(self.accessibility_check(model, id, kind)?);
            }
            accessibility_report.rooms_checked += 1;
            if results.iter().all(|r| r.accessible) {
                accessibility_report.accessible_rooms += 1;
            }
            accessibility_report.results.insert(id.clone(), results);
        }

        let constraints =
            LayoutConstraints { min_area: Some(REPORT_MIN_ROOM_AREA), max_area: None, accessibility: checks.to_vec() };
        let optimization_recommendations = self.optimize_layout(model, &constraints)?;

        self.stats.analyses_performed += 1;
        info!(
            rooms = room_ids.len(),
            collisions = collision_report.total_collisions,
            score = optimization_recommendations.optimization_score,
            "spatial report generated"
        );
        Ok(SpatialReport {
            building_overview,
            room_analyses,
            collision_report,
            accessibility_report,
            optimization_recommendations,
            statistics: self.stats,
        })
    }
}
