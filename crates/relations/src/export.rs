//! JSON export and import of the edge set.

use std::collections::BTreeMap;

use bim_kernel::BimModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::RelationError;
use crate::manager::RelationshipManager;
use crate::types::{Direction, Relationship, RelationshipConstraints, RelationshipType, Strength};

/// One edge in an export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub strength: Strength,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<RelationshipConstraints>,
}

impl From<&Relationship> for RelationshipRecord {
    fn from(r: &Relationship) -> Self {
        Self {
            id: r.id.clone(),
            relationship_type: r.relationship_type,
            source_id: r.source_id.clone(),
            target_id: r.target_id.clone(),
            direction: r.direction,
            strength: r.strength,
            properties: r.properties.clone(),
            metadata: r.metadata.clone(),
            constraints: r.constraints.clone(),
        }
    }
}

impl TryFrom<RelationshipRecord> for Relationship {
    type Error = RelationError;

    fn try_from(rec: RelationshipRecord) -> Result<Self, Self::Error> {
        let mut r = Relationship::with_id(rec.id, rec.relationship_type, rec.source_id, rec.target_id)?
            .with_direction(rec.direction)
            .with_strength(rec.strength);
        r.properties = rec.properties;
        r.metadata = rec.metadata;
        r.constraints = rec.constraints;
        Ok(r)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    pub total_relationships: usize,
    pub valid_relationships: usize,
    pub invalid_relationships: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub relationships: Vec<RelationshipRecord>,
    pub stats: ExportStats,
    pub exported_at: DateTime<Utc>,
}

/// Import reads records loosely so one bad record cannot sink the batch.
#[derive(Debug, Deserialize)]
struct ImportDocument {
    #[serde(default)]
    relationships: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl RelationshipManager {
    pub fn export(&self) -> ExportDocument {
        let stats = self.stats();
        ExportDocument {
            relationships: self.relationships().iter().map(RelationshipRecord::from).collect(),
            stats: ExportStats {
                total_relationships: stats.total_relationships,
                valid_relationships: stats.valid_relationships,
                invalid_relationships: stats.invalid_relationships,
            },
            exported_at: Utc::now(),
        }
    }

    pub fn export_json(&self) -> Result<String, RelationError> {
        serde_json::to_string_pretty(&self.export()).map_err(|e| RelationError::Export(e.to_string()))
    }

    /// Re-validate and add every record. Only a document that is not a
    /// relationship export at all is an error; bad records are counted.
    #[instrument(skip(self, json, model))]
    pub fn import(&mut self, json: &str, model: &BimModel) -> Result<ImportReport, RelationError> {
        let doc: ImportDocument =
            serde_json::from_str(json).map_err(|e| RelationError::MalformedImport(e.to_string()))?;

        let mut report = ImportReport::default();
        for (i, value) in doc.relationships.into_iter().enumerate() {
            let outcome = serde_json::from_value::<RelationshipRecord>(value)
                .map_err(|e| RelationError::MalformedImport(format!("record {i}: {e}")))
                .and_then(Relationship::try_from)
                .and_then(|r| self.try_add(r, model).map(|_| ()));
            match outcome {
                Ok(()) => report.imported += 1,
                Err(e) => {
                    warn!(record = i, "import failed: {e}");
                    report.failed += 1;
                    report.errors.push(e.to_string());
                }
            }
        }

        info!(imported = report.imported, failed = report.failed, "relationships imported");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bim_kernel::{Coordinate, Element, ElementKind, GeometricEntity};

    fn model() -> BimModel {
        ["a", "b", "c"]
            .into_iter()
            .map(|id| Element::new(id, ElementKind::Device, GeometricEntity::point(Coordinate::ORIGIN)))
            .collect()
    }

    #[test]
    fn test_export_shape() {
        let m = model();
        let mut g = RelationshipManager::new();
        g.add(
            Relationship::new(RelationshipType::ConnectsTo, "a", "b").unwrap().with_property("cable", "cat6"),
            &m,
        );

        let v: Value = serde_json::from_str(&g.export_json().unwrap()).unwrap();
        let rec = &v["relationships"][0];
        assert_eq!(rec["type"], "connects_to");
        assert_eq!(rec["direction"], "bidirectional");
        assert_eq!(rec["strength"], "moderate");
        assert_eq!(rec["properties"]["cable"], "cat6");
        assert_eq!(v["stats"]["total_relationships"], 1);
        assert!(v["exported_at"].is_string());
    }

    #[test]
    fn test_round_trip_into_fresh_manager() {
        let m = model();
        let mut g = RelationshipManager::new();
        g.add(Relationship::new(RelationshipType::Serves, "a", "b").unwrap(), &m);
        g.add(Relationship::new(RelationshipType::Controls, "b", "c").unwrap(), &m);
        let json = g.export_json().unwrap();

        let mut fresh = RelationshipManager::new();
        let report = fresh.import(&json, &m).unwrap();
        assert_eq!(report, ImportReport { imported: 2, failed: 0, errors: vec![] });
        assert_eq!(fresh.relationships(), g.relationships());

        // Importing again collides on every id.
        let again = fresh.import(&json, &m).unwrap();
        assert_eq!((again.imported, again.failed), (0, 2));
    }

    #[test]
    fn test_export_errors_are_not_import_errors() {
        let e = RelationError::Export("key must be a string".into());
        assert_eq!(e.to_string(), "relationship export failed: key must be a string");
        assert_ne!(e, RelationError::MalformedImport("key must be a string".into()));
    }

    #[test]
    fn test_malformed_document() {
        let mut g = RelationshipManager::new();
        assert!(matches!(g.import("not json", &model()), Err(RelationError::MalformedImport(_))));
    }
}
