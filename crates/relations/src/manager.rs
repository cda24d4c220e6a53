use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use bim_kernel::BimModel;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RelationError;
use crate::types::{Relationship, RelationshipType};

/// Counters kept by a manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_relationships: usize,
    pub valid_relationships: usize,
    /// Stored edges marked invalid plus every rejected insertion.
    pub invalid_relationships: usize,
    pub bidirectional_relationships: usize,
    pub reference_errors_fixed: usize,
}

/// Selects edges in `RelationshipManager::get`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipFilter {
    pub source_id: Option<String>,
    pub target_id: Option<String>,
    pub relationship_type: Option<RelationshipType>,
    /// Matches edges where either endpoint belongs to this building system.
    pub system: Option<String>,
}

impl RelationshipFilter {
    pub fn source(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    pub fn target(mut self, id: impl Into<String>) -> Self {
        self.target_id = Some(id.into());
        self
    }

    pub fn of_type(mut self, t: RelationshipType) -> Self {
        self.relationship_type = Some(t);
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// One hop of a path, oriented in the direction of travel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub relationship_id: String,
    pub relationship_type: RelationshipType,
    pub from: String,
    pub to: String,
    /// The edge was walked target → source (only possible when bidirectional).
    pub reversed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub total_relationships: usize,
    pub valid_references: usize,
    pub invalid_references: usize,
    pub missing_elements: BTreeSet<String>,
    pub orphaned_relationships: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    pub relationships_removed: usize,
    pub relationships_marked: usize,
    pub errors_fixed: usize,
    pub actions: Vec<String>,
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Integrity repair: {} removed, {} marked invalid, {} errors fixed",
            self.relationships_removed, self.relationships_marked, self.errors_fixed
        )
    }
}

/// Owns the relationship edges of one model session. Edges keep their
/// insertion order, which every query and conflict resolution relies on.
#[derive(Debug, Clone, Default)]
pub struct RelationshipManager {
    relationships: Vec<Relationship>,
    index: HashMap<String, usize>,
    rejected: usize,
    reference_errors_fixed: usize,
}

impl RelationshipManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate against the model and store. A rejected edge leaves the
    /// graph untouched and bumps the invalid counter.
    pub fn try_add(
        &mut self,
        mut relationship: Relationship,
        model: &BimModel,
    ) -> Result<&Relationship, RelationError> {
        if self.index.contains_key(&relationship.id) {
            self.rejected += 1;
            return Err(RelationError::DuplicateId(relationship.id));
        }
        if !relationship.validate_against(model) {
            self.rejected += 1;
            return Err(RelationError::Invalid {
                id: relationship.id,
                errors: relationship.validation_errors,
            });
        }

        debug!(
            id = %relationship.id,
            kind = %relationship.relationship_type,
            source = %relationship.source_id,
            target = %relationship.target_id,
            "relationship added"
        );
        let pos = self.relationships.len();
        self.index.insert(relationship.id.clone(), pos);
        self.relationships.push(relationship);
        Ok(&self.relationships[pos])
    }

    /// Boolean form of [`try_add`](Self::try_add).
    pub fn add(&mut self, relationship: Relationship, model: &BimModel) -> bool {
        match self.try_add(relationship, model) {
            Ok(_) => true,
            Err(e) => {
                warn!("relationship rejected: {e}");
                false
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.index.remove(id)?;
        let removed = self.relationships.remove(pos);
        for (i, r) in self.relationships.iter().enumerate().skip(pos) {
            self.index.insert(r.id.clone(), i);
        }
        debug!(id, "relationship removed");
        Some(removed)
    }

    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.index.get(id).map(|&i| &self.relationships[i])
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// Position of an edge in insertion order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn stats(&self) -> GraphStats {
        let valid = self.relationships.iter().filter(|r| r.is_valid).count();
        GraphStats {
            total_relationships: self.relationships.len(),
            valid_relationships: valid,
            invalid_relationships: self.relationships.len() - valid + self.rejected,
            bidirectional_relationships: self
                .relationships
                .iter()
                .filter(|r| r.is_bidirectional())
                .count(),
            reference_errors_fixed: self.reference_errors_fixed,
        }
    }

    /// Edges matching every set field of the filter, in insertion order.
    pub fn get(&self, filter: &RelationshipFilter, model: &BimModel) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| filter.source_id.as_ref().map_or(true, |s| &r.source_id == s))
            .filter(|r| filter.target_id.as_ref().map_or(true, |t| &r.target_id == t))
            .filter(|r| filter.relationship_type.map_or(true, |t| r.relationship_type == t))
            .filter(|r| {
                filter.system.as_ref().map_or(true, |system| {
                    [&r.source_id, &r.target_id].iter().any(|id| {
                        model.get(id).and_then(|e| e.system.as_ref()) == Some(system)
                    })
                })
            })
            .collect()
    }

    /// Distinct neighbours of `id` over edges touching it in either role.
    pub fn connected(&self, id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.relationships
            .iter()
            .filter_map(|r| r.other_end(id))
            .filter(|other| seen.insert(*other))
            .collect()
    }

    /// Shortest edge chain from `a` to `b`. Unidirectional edges are only
    /// walked source → target. Empty when `a == b` or `b` is unreachable.
    pub fn find_path(&self, a: &str, b: &str) -> Vec<PathStep> {
        self.path_where(a, b, |_| true)
    }

    /// Like [`find_path`](Self::find_path), restricted to the given types.
    pub fn find_path_over(&self, a: &str, b: &str, types: &[RelationshipType]) -> Vec<PathStep> {
        self.path_where(a, b, |r| types.contains(&r.relationship_type))
    }

    pub(crate) fn path_where<F>(&self, a: &str, b: &str, usable: F) -> Vec<PathStep>
    where
        F: Fn(&Relationship) -> bool,
    {
        if a == b {
            return Vec::new();
        }
        let mut came_from: HashMap<&str, (usize, bool)> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::from([a]);
        let mut queue = VecDeque::from([a]);

        while let Some(current) = queue.pop_front() {
            for (i, r) in self.relationships.iter().enumerate() {
                if !usable(r) {
                    continue;
                }
                let (next, reversed) = if r.source_id == current {
                    (r.target_id.as_str(), false)
                } else if r.target_id == current && r.is_bidirectional() {
                    (r.source_id.as_str(), true)
                } else {
                    continue;
                };
                if !visited.insert(next) {
                    continue;
                }
                came_from.insert(next, (i, reversed));
                if next == b {
                    return self.unwind(&came_from, a, b);
                }
                queue.push_back(next);
            }
        }
        Vec::new()
    }

    fn unwind(&self, came_from: &HashMap<&str, (usize, bool)>, a: &str, b: &str) -> Vec<PathStep> {
        let mut steps = Vec::new();
        let mut at = b;
        while at != a {
            let Some(&(i, reversed)) = came_from.get(at) else {
                break;
            };
            let r = &self.relationships[i];
            let (from, to) = if reversed {
                (&r.target_id, &r.source_id)
            } else {
                (&r.source_id, &r.target_id)
            };
            steps.push(PathStep {
                relationship_id: r.id.clone(),
                relationship_type: r.relationship_type,
                from: from.clone(),
                to: to.clone(),
                reversed,
            });
            at = from.as_str();
        }
        steps.reverse();
        steps
    }

    /// Re-check every edge against the current model.
    pub fn validate_all(&mut self, model: &BimModel) -> ValidationSummary {
        let mut summary = ValidationSummary { total: self.relationships.len(), ..Default::default() };
        for r in &mut self.relationships {
            if r.validate_against(model) {
                summary.valid += 1;
            } else {
                summary.invalid += 1;
                summary.errors.extend(r.validation_errors.iter().map(|e| format!("{}: {e}", r.id)));
            }
        }
        info!(total = summary.total, valid = summary.valid, invalid = summary.invalid, "relationships validated");
        summary
    }

    /// Report edges whose endpoints no longer exist.
    pub fn validate_reference_integrity(&self, model: &BimModel) -> IntegrityReport {
        let mut report =
            IntegrityReport { total_relationships: self.relationships.len(), ..Default::default() };
        for r in &self.relationships {
            let mut intact = true;
            for (role, id) in [("source", &r.source_id), ("target", &r.target_id)] {
                if !model.contains(id) {
                    intact = false;
                    report.invalid_references += 1;
                    report.missing_elements.insert(id.clone());
                    report.errors.push(format!("{}: {role} element {id} not found", r.id));
                }
            }
            if intact {
                report.valid_references += 1;
            } else {
                report.orphaned_relationships.push(r.id.clone());
            }
        }
        report
    }

    /// Remove dangling edges, or with `auto_repair` off mark them invalid.
    pub fn repair_reference_integrity(&mut self, model: &BimModel, auto_repair: bool) -> RepairReport {
        let integrity = self.validate_reference_integrity(model);
        let mut report = RepairReport::default();

        for id in &integrity.orphaned_relationships {
            if auto_repair {
                if self.remove(id).is_some() {
                    report.relationships_removed += 1;
                    report.actions.push(format!("removed orphaned relationship {id}"));
                }
            } else if let Some(&i) = self.index.get(id) {
                let r = &mut self.relationships[i];
                r.is_valid = false;
                r.validation_errors.push("orphaned relationship: endpoint elements not found".into());
                report.relationships_marked += 1;
                report.actions.push(format!("marked relationship {id} invalid"));
            }
        }
        report.errors_fixed = integrity.orphaned_relationships.len();
        self.reference_errors_fixed += report.errors_fixed;

        if report.errors_fixed > 0 {
            info!(
                removed = report.relationships_removed,
                marked = report.relationships_marked,
                "reference integrity repaired"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Strength};
    use bim_kernel::{Coordinate, Element, ElementKind, GeometricEntity};

    fn model(ids: &[&str]) -> BimModel {
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                let at = Coordinate::xy(i as f64, 0.0).unwrap();
                Element::new(*id, ElementKind::Device, GeometricEntity::point(at))
            })
            .collect()
    }

    fn edge(t: RelationshipType, a: &str, b: &str) -> Relationship {
        Relationship::new(t, a, b).unwrap()
    }

    #[test]
    fn test_add_rejects_without_mutation() {
        let m = model(&["a", "b"]);
        let mut g = RelationshipManager::new();
        assert!(!g.add(edge(RelationshipType::Serves, "a", "ghost"), &m));
        assert!(g.is_empty());
        assert_eq!(g.stats().invalid_relationships, 1);

        let r = edge(RelationshipType::Serves, "a", "b");
        assert!(g.add(r.clone(), &m));
        assert!(matches!(g.try_add(r, &m), Err(RelationError::DuplicateId(_))));
        assert_eq!(g.len(), 1);
        assert_eq!(g.stats().invalid_relationships, 2);
    }

    #[test]
    fn test_get_filters_in_insertion_order() {
        let m: BimModel = model(&["a", "b", "c"])
            .iter()
            .cloned()
            .map(|e| if e.id == "c" { e.with_system("hvac") } else { e })
            .collect();
        let mut g = RelationshipManager::new();
        g.add(edge(RelationshipType::Serves, "a", "b"), &m);
        g.add(edge(RelationshipType::Supplies, "a", "c"), &m);
        g.add(edge(RelationshipType::Serves, "b", "c"), &m);

        let from_a = g.get(&RelationshipFilter::default().source("a"), &m);
        assert_eq!(from_a.len(), 2);
        assert_eq!(from_a[0].target_id, "b");

        let serves = g.get(&RelationshipFilter::default().of_type(RelationshipType::Serves), &m);
        assert_eq!(serves.len(), 2);

        let hvac = g.get(&RelationshipFilter::default().system("hvac"), &m);
        assert_eq!(hvac.len(), 2);
    }

    #[test]
    fn test_connected_distinct() {
        let m = model(&["a", "b", "c"]);
        let mut g = RelationshipManager::new();
        g.add(edge(RelationshipType::Serves, "a", "b"), &m);
        g.add(edge(RelationshipType::Controls, "b", "a"), &m);
        g.add(edge(RelationshipType::Serves, "c", "a"), &m);
        assert_eq!(g.connected("a"), vec!["b", "c"]);
    }

    #[test]
    fn test_path_respects_direction() {
        let m = model(&["a", "b", "c"]);
        let mut g = RelationshipManager::new();
        g.add(edge(RelationshipType::Supplies, "a", "b").with_direction(Direction::Unidirectional), &m);
        g.add(edge(RelationshipType::Serves, "b", "c"), &m);

        let path = g.find_path("a", "c");
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].from, "a");
        assert_eq!(path[1].to, "c");

        let back = g.find_path("c", "a");
        assert!(back.is_empty());
        let back = g.find_path("c", "b");
        assert_eq!(back.len(), 1);
        assert!(back[0].reversed);
    }

    #[test]
    fn test_path_edge_cases() {
        let m = model(&["a", "b"]);
        let mut g = RelationshipManager::new();
        g.add(edge(RelationshipType::Serves, "a", "b"), &m);
        assert!(g.find_path("a", "a").is_empty());
        assert!(g.find_path("a", "nowhere").is_empty());
    }

    #[test]
    fn test_remove_reindexes() {
        let m = model(&["a", "b", "c"]);
        let mut g = RelationshipManager::new();
        let first = edge(RelationshipType::Serves, "a", "b");
        let second = edge(RelationshipType::Serves, "b", "c").with_strength(Strength::Critical);
        let (id1, id2) = (first.id.clone(), second.id.clone());
        g.add(first, &m);
        g.add(second, &m);

        assert!(g.remove(&id1).is_some());
        assert_eq!(g.position(&id2), Some(0));
        assert_eq!(g.relationship(&id2).unwrap().strength, Strength::Critical);
        assert!(g.remove(&id1).is_none());
    }

    #[test]
    fn test_reference_integrity() {
        let mut m = model(&["a", "b", "c"]);
        let mut g = RelationshipManager::new();
        g.add(edge(RelationshipType::Serves, "a", "b"), &m);
        g.add(edge(RelationshipType::Serves, "b", "c"), &m);
        m.remove("c");

        let report = g.validate_reference_integrity(&m);
        assert_eq!(report.valid_references, 1);
        assert_eq!(report.orphaned_relationships.len(), 1);
        assert!(report.missing_elements.contains("c"));

        let repair = g.repair_reference_integrity(&m, false);
        assert_eq!(repair.relationships_marked, 1);
        assert_eq!(g.len(), 2);
        assert_eq!(g.stats().valid_relationships, 1);

        let repair = g.repair_reference_integrity(&m, true);
        assert_eq!(repair.relationships_removed, 1);
        assert_eq!(g.len(), 1);
        assert_eq!(g.stats().reference_errors_fixed, 2);
    }

    #[test]
    fn test_validate_all() {
        let mut m = model(&["a", "b"]);
        let mut g = RelationshipManager::new();
        g.add(edge(RelationshipType::Serves, "a", "b"), &m);
        assert_eq!(g.validate_all(&m).valid, 1);
        m.remove("b");
        let summary = g.validate_all(&m);
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.errors.len(), 1);
    }
}
