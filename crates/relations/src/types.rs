use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bim_kernel::{BimModel, Element};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RelationError;

/// Closed set of relationship types between model elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    // Spatial
    Contains,
    Adjacent,
    Above,
    Below,
    Inside,
    Outside,
    // System
    ConnectsTo,
    Supplies,
    Controls,
    Monitors,
    MonitoredBy,
    BacksUp,
    DependsOn,
    // Functional
    Serves,
    Requires,
    Supports,
    Protects,
    // Network
    NetworkConnection,
    DataFlow,
    SignalPath,
    // Maintenance
    Maintains,
    Replaces,
    Upgrades,
    // Integration
    Flow,
    Control,
    Adjacency,
    Connectivity,
    Interface,
    Integration,
    Coordination,
    Synchronization,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 31] = [
        Self::Contains,
        Self::Adjacent,
        Self::Above,
        Self::Below,
        Self::Inside,
        Self::Outside,
        Self::ConnectsTo,
        Self::Supplies,
        Self::Controls,
        Self::Monitors,
        Self::MonitoredBy,
        Self::BacksUp,
        Self::DependsOn,
        Self::Serves,
        Self::Requires,
        Self::Supports,
        Self::Protects,
        Self::NetworkConnection,
        Self::DataFlow,
        Self::SignalPath,
        Self::Maintains,
        Self::Replaces,
        Self::Upgrades,
        Self::Flow,
        Self::Control,
        Self::Adjacency,
        Self::Connectivity,
        Self::Interface,
        Self::Integration,
        Self::Coordination,
        Self::Synchronization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Adjacent => "adjacent",
            Self::Above => "above",
            Self::Below => "below",
            Self::Inside => "inside",
            Self::Outside => "outside",
            Self::ConnectsTo => "connects_to",
            Self::Supplies => "supplies",
            Self::Controls => "controls",
            Self::Monitors => "monitors",
            Self::MonitoredBy => "monitored_by",
            Self::BacksUp => "backs_up",
            Self::DependsOn => "depends_on",
            Self::Serves => "serves",
            Self::Requires => "requires",
            Self::Supports => "supports",
            Self::Protects => "protects",
            Self::NetworkConnection => "network_connection",
            Self::DataFlow => "data_flow",
            Self::SignalPath => "signal_path",
            Self::Maintains => "maintains",
            Self::Replaces => "replaces",
            Self::Upgrades => "upgrades",
            Self::Flow => "flow",
            Self::Control => "control",
            Self::Adjacency => "adjacency",
            Self::Connectivity => "connectivity",
            Self::Interface => "interface",
            Self::Integration => "integration",
            Self::Coordination => "coordination",
            Self::Synchronization => "synchronization",
        }
    }

    pub fn is_spatial(&self) -> bool {
        matches!(
            self,
            Self::Contains | Self::Adjacent | Self::Above | Self::Below | Self::Inside | Self::Outside
        )
    }

    /// Types whose cycles are conflicts.
    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::DependsOn | Self::Requires)
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = RelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RelationError::UnknownType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Unidirectional,
    #[default]
    Bidirectional,
}

impl FromStr for Direction {
    type Err = RelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unidirectional" => Ok(Self::Unidirectional),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(RelationError::UnknownDirection(other.to_string())),
        }
    }
}

/// Importance rank used to break conflicts. Ordered weakest first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Minor,
    #[default]
    Moderate,
    Important,
    Critical,
}

impl FromStr for Strength {
    type Err = RelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minor" => Ok(Self::Minor),
            "moderate" => Ok(Self::Moderate),
            "important" => Ok(Self::Important),
            "critical" => Ok(Self::Critical),
            other => Err(RelationError::UnknownStrength(other.to_string())),
        }
    }
}

/// Extra conditions checked against the live model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipConstraints {
    pub min_distance: Option<f64>,
    pub max_distance: Option<f64>,
    /// Properties both endpoints must carry.
    pub required_properties: Vec<String>,
    /// Properties neither endpoint may carry.
    pub forbidden_properties: Vec<String>,
    /// Allowed building systems; endpoints without a system pass.
    pub compatible_systems: Vec<String>,
}

/// A typed edge between two model elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub relationship_type: RelationshipType,
    pub source_id: String,
    pub target_id: String,
    pub direction: Direction,
    pub strength: Strength,
    pub constraints: Option<RelationshipConstraints>,
    pub properties: BTreeMap<String, Value>,
    pub metadata: BTreeMap<String, Value>,
    pub is_valid: bool,
    pub validation_errors: Vec<String>,
}

impl Relationship {
    /// A bidirectional, moderate-strength edge with a fresh id.
    pub fn new(
        relationship_type: RelationshipType,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Result<Self, RelationError> {
        Self::with_id(Uuid::new_v4().to_string(), relationship_type, source_id, target_id)
    }

    pub fn with_id(
        id: impl Into<String>,
        relationship_type: RelationshipType,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Result<Self, RelationError> {
        let (id, source_id, target_id) = (id.into(), source_id.into(), target_id.into());
        if let Some(e) = endpoint_error(&id, &source_id, &target_id) {
            return Err(e);
        }
        Ok(Self {
            id,
            relationship_type,
            source_id,
            target_id,
            direction: Direction::default(),
            strength: Strength::default(),
            constraints: None,
            properties: BTreeMap::new(),
            metadata: BTreeMap::new(),
            is_valid: true,
            validation_errors: Vec::new(),
        })
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_constraints(mut self, constraints: RelationshipConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_bidirectional(&self) -> bool {
        self.direction == Direction::Bidirectional
    }

    pub fn touches(&self, element_id: &str) -> bool {
        self.source_id == element_id || self.target_id == element_id
    }

    /// The other endpoint, if `element_id` is one of them.
    pub fn other_end(&self, element_id: &str) -> Option<&str> {
        if self.source_id == element_id {
            Some(&self.target_id)
        } else if self.target_id == element_id {
            Some(&self.source_id)
        } else {
            None
        }
    }

    /// Unordered endpoint pair, smaller id first.
    pub fn pair_key(&self) -> (&str, &str) {
        if self.source_id <= self.target_id {
            (&self.source_id, &self.target_id)
        } else {
            (&self.target_id, &self.source_id)
        }
    }

    /// Re-check the edge against the model, refreshing `is_valid` and `validation_errors`.
    pub fn validate_against(&mut self, model: &BimModel) -> bool {
        self.validation_errors.clear();
        if let Some(e) = endpoint_error(&self.id, &self.source_id, &self.target_id) {
            self.validation_errors.push(e.to_string());
            self.is_valid = false;
            return false;
        }
        let source = model.get(&self.source_id);
        let target = model.get(&self.target_id);

        for (element, id) in [(source, &self.source_id), (target, &self.target_id)] {
            if element.is_none() {
                let missing = RelationError::MissingEndpoint { id: self.id.clone(), element: id.clone() };
                self.validation_errors.push(missing.to_string());
            }
        }
        if let (Some(source), Some(target)) = (source, target) {
            let mut errors = self.type_errors(source, target);
            if let Some(constraints) = &self.constraints {
                errors.extend(constraint_errors(constraints, source, target));
            }
            self.validation_errors = errors;
        }

        self.is_valid = self.validation_errors.is_empty();
        self.is_valid
    }

    fn type_errors(&self, source: &Element, target: &Element) -> Vec<String> {
        let mut errors = Vec::new();
        match self.relationship_type {
            RelationshipType::Contains if !source.kind.is_container() => errors.push(format!(
                "source {} ({:?}) cannot contain other elements",
                source.id, source.kind
            )),
            RelationshipType::Inside if !target.kind.is_container() => errors.push(format!(
                "target {} ({:?}) cannot contain other elements",
                target.id, target.kind
            )),
            _ => {}
        }
        errors
    }
}

/// Endpoint shape rules. Fields are public, so these are checked again on
/// every validation and not only at construction.
fn endpoint_error(id: &str, source_id: &str, target_id: &str) -> Option<RelationError> {
    if source_id.trim().is_empty() || target_id.trim().is_empty() {
        Some(RelationError::EmptyEndpoint { id: id.to_string() })
    } else if source_id == target_id {
        Some(RelationError::SelfLoop { id: id.to_string() })
    } else {
        None
    }
}

fn constraint_errors(c: &RelationshipConstraints, source: &Element, target: &Element) -> Vec<String> {
    let mut errors = Vec::new();

    if c.min_distance.is_some() || c.max_distance.is_some() {
        let (a, b) = (source.geometry.anchor(), target.geometry.anchor());
        let distance = (a[0] - b[0]).hypot(a[1] - b[1]);
        if let Some(max) = c.max_distance.filter(|max| distance > *max) {
            errors.push(format!("distance {distance:.3} exceeds maximum {max}"));
        }
        if let Some(min) = c.min_distance.filter(|min| distance < *min) {
            errors.push(format!("distance {distance:.3} below minimum {min}"));
        }
    }

    for element in [source, target] {
        for key in &c.required_properties {
            if !element.has_property(key) {
                errors.push(format!("{} is missing required property {key}", element.id));
            }
        }
        for key in &c.forbidden_properties {
            if element.has_property(key) {
                errors.push(format!("{} carries forbidden property {key}", element.id));
            }
        }
        if let Some(system) = &element.system {
            if !c.compatible_systems.is_empty() && !c.compatible_systems.contains(system) {
                errors.push(format!("{} system {system} is not compatible", element.id));
            }
        }
    }
    errors
}
