//! Conflict detection and strength-based resolution.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::manager::RelationshipManager;
use crate::types::{Relationship, RelationshipType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Moderate,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    /// Edges between the same unordered pair disagree on their type.
    ConflictingRelationships {
        pair: (String, String),
        /// Every edge of the pair, in insertion order.
        relationship_ids: Vec<String>,
    },
    /// A cycle over `depends_on`/`requires` edges, in traversal order.
    CircularDependency { relationship_ids: Vec<String> },
}

impl Conflict {
    pub fn severity(&self) -> ConflictSeverity {
        match self {
            Self::ConflictingRelationships { .. } => ConflictSeverity::Moderate,
            Self::CircularDependency { .. } => ConflictSeverity::Critical,
        }
    }

    pub fn relationship_ids(&self) -> &[String] {
        match self {
            Self::ConflictingRelationships { relationship_ids, .. }
            | Self::CircularDependency { relationship_ids } => relationship_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResolutionAction {
    RemovedWeakerRelationship { removed_id: String, kept_id: String },
    RemovedCircularDependency { relationship_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub resolved: usize,
    pub failed: usize,
    pub removed_ids: Vec<String>,
    pub actions: Vec<ResolutionAction>,
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Conflicts: {} resolved, {} failed, {} relationships removed",
            self.resolved,
            self.failed,
            self.removed_ids.len()
        )
    }
}

impl RelationshipManager {
    /// Conflicting pairs first (ordered by the pair's first edge), then
    /// dependency cycles, each reported once.
    pub fn detect_conflicts(&self) -> Vec<Conflict> {
        let mut conflicts = self.pair_conflicts();
        conflicts.extend(self.dependency_cycles());
        conflicts
    }

    fn pair_conflicts(&self) -> Vec<Conflict> {
        let mut groups: Vec<((&str, &str), Vec<&Relationship>)> = Vec::new();
        let mut slot: HashMap<(&str, &str), usize> = HashMap::new();
        for r in self.relationships() {
            let key = r.pair_key();
            let i = *slot.entry(key).or_insert_with(|| {
                groups.push((key, Vec::new()));
                groups.len() - 1
            });
            groups[i].1.push(r);
        }

        groups
            .into_iter()
            .filter(|(_, edges)| {
                let types: HashSet<RelationshipType> = edges.iter().map(|r| r.relationship_type).collect();
                types.len() > 1
            })
            .map(|((a, b), edges)| Conflict::ConflictingRelationships {
                pair: (a.to_string(), b.to_string()),
                relationship_ids: edges.iter().map(|r| r.id.clone()).collect(),
            })
            .collect()
    }

    fn dependency_cycles(&self) -> Vec<Conflict> {
        let mut seen: HashSet<BTreeSet<String>> = HashSet::new();
        let mut cycles = Vec::new();
        for r in self.relationships().iter().filter(|r| r.relationship_type.is_dependency()) {
            let back = self.path_where(&r.target_id, &r.source_id, |e| {
                e.relationship_type.is_dependency() && e.id != r.id
            });
            if back.is_empty() {
                continue;
            }
            let mut ids = vec![r.id.clone()];
            ids.extend(back.into_iter().map(|step| step.relationship_id));
            if seen.insert(ids.iter().cloned().collect()) {
                cycles.push(Conflict::CircularDependency { relationship_ids: ids });
            }
        }
        cycles
    }

    /// Resolve in order. A pair keeps its strongest edge (earliest on ties);
    /// a cycle loses its weakest edge (latest on ties). Conflicts already
    /// broken by an earlier step count as resolved; ones whose edges are
    /// all gone count as failed.
    pub fn resolve_conflicts(&mut self, conflicts: &[Conflict]) -> ResolutionReport {
        let mut report = ResolutionReport::default();

        for conflict in conflicts {
            let present: Vec<(usize, String, _)> = conflict
                .relationship_ids()
                .iter()
                .filter_map(|id| {
                    let pos = self.position(id)?;
                    let strength = self.relationship(id)?.strength;
                    Some((pos, id.clone(), strength))
                })
                .collect();
            if present.is_empty() {
                report.failed += 1;
                continue;
            }

            match conflict {
                Conflict::ConflictingRelationships { .. } => {
                    let Some(kept) = present
                        .iter()
                        .max_by(|a, b| a.2.cmp(&b.2).then(b.0.cmp(&a.0)))
                        .map(|(_, id, _)| id.clone())
                    else {
                        continue;
                    };
                    for (_, id, _) in &present {
                        if *id != kept && self.remove(id).is_some() {
                            debug!(removed = %id, kept = %kept, "weaker relationship removed");
                            report.removed_ids.push(id.clone());
                            report.actions.push(ResolutionAction::RemovedWeakerRelationship {
                                removed_id: id.clone(),
                                kept_id: kept.clone(),
                            });
                        }
                    }
                }
                Conflict::CircularDependency { relationship_ids } => {
                    if present.len() == relationship_ids.len() {
                        let weakest = present
                            .iter()
                            .min_by(|a, b| a.2.cmp(&b.2).then(b.0.cmp(&a.0)))
                            .map(|(_, id, _)| id.clone());
                        if let Some(id) = weakest {
                            self.remove(&id);
                            debug!(removed = %id, "cycle broken");
                            report.removed_ids.push(id.clone());
                            report
                                .actions
                                .push(ResolutionAction::RemovedCircularDependency { relationship_id: id });
                        }
                    }
                }
            }
            report.resolved += 1;
        }

        info!(
            resolved = report.resolved,
            failed = report.failed,
            removed = report.removed_ids.len(),
            "conflicts resolved"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Strength};
    use bim_kernel::{BimModel, Coordinate, Element, ElementKind, GeometricEntity};

    fn model(ids: &[&str]) -> BimModel {
        ids.iter()
            .map(|id| Element::new(*id, ElementKind::Equipment, GeometricEntity::point(Coordinate::ORIGIN)))
            .collect()
    }

    fn add(g: &mut RelationshipManager, m: &BimModel, t: RelationshipType, a: &str, b: &str, s: Strength) -> String {
        let r = Relationship::new(t, a, b).unwrap().with_strength(s).with_direction(Direction::Unidirectional);
        let id = r.id.clone();
        assert!(g.add(r, m));
        id
    }

    #[test]
    fn test_pair_conflict_keeps_strongest() {
        let m = model(&["a", "b"]);
        let mut g = RelationshipManager::new();
        let weak = add(&mut g, &m, RelationshipType::Serves, "a", "b", Strength::Minor);
        let strong = add(&mut g, &m, RelationshipType::Controls, "b", "a", Strength::Important);
        let same = add(&mut g, &m, RelationshipType::Serves, "a", "b", Strength::Important);

        let conflicts = g.detect_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity(), ConflictSeverity::Moderate);
        assert_eq!(conflicts[0].relationship_ids(), &[weak.clone(), strong.clone(), same.clone()]);

        let report = g.resolve_conflicts(&conflicts);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.removed_ids, vec![weak, same]);
        assert_eq!(g.len(), 1);
        assert!(g.relationship(&strong).is_some());
    }

    #[test]
    fn test_same_type_is_not_a_conflict() {
        let m = model(&["a", "b"]);
        let mut g = RelationshipManager::new();
        add(&mut g, &m, RelationshipType::Serves, "a", "b", Strength::Minor);
        add(&mut g, &m, RelationshipType::Serves, "b", "a", Strength::Minor);
        assert!(g.detect_conflicts().is_empty());
    }

    #[test]
    fn test_dependency_cycle() {
        let m = model(&["a", "b", "c"]);
        let mut g = RelationshipManager::new();
        add(&mut g, &m, RelationshipType::DependsOn, "a", "b", Strength::Critical);
        let weak = add(&mut g, &m, RelationshipType::Requires, "b", "c", Strength::Minor);
        add(&mut g, &m, RelationshipType::DependsOn, "c", "a", Strength::Important);

        let conflicts = g.detect_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity(), ConflictSeverity::Critical);
        assert_eq!(conflicts[0].relationship_ids().len(), 3);

        let report = g.resolve_conflicts(&conflicts);
        assert_eq!(report.removed_ids, vec![weak]);
        assert!(g.detect_conflicts().is_empty());
    }

    #[test]
    fn test_stale_conflict_fails() {
        let m = model(&["a", "b"]);
        let mut g = RelationshipManager::new();
        let x = add(&mut g, &m, RelationshipType::Serves, "a", "b", Strength::Minor);
        let y = add(&mut g, &m, RelationshipType::Supplies, "a", "b", Strength::Minor);
        let conflicts = g.detect_conflicts();
        g.remove(&x);
        g.remove(&y);
        let report = g.resolve_conflicts(&conflicts);
        assert_eq!(report.failed, 1);
        assert_eq!(report.resolved, 0);
    }
}
