//! The assembly aggregate: components by id, constraints between them, and
//! the validation pass that derives the assembly status.

use std::collections::BTreeMap;
use std::fmt;

use bim_kernel::{Coordinate, PrecisionMath};
use bim_solver::ConstraintKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::component::{Component, ComponentStatus};
use crate::error::AssemblyError;
use crate::interference::{find_interferences, Interference, InterferenceConfig};

/// Constraint kinds that make sense between two rigid components.
pub const ASSEMBLY_CONSTRAINT_KINDS: [ConstraintKind; 6] = [
    ConstraintKind::Distance,
    ConstraintKind::Angle,
    ConstraintKind::Parallel,
    ConstraintKind::Perpendicular,
    ConstraintKind::Coincident,
    ConstraintKind::Fixed,
];

/// More than this many constraints per component over-constrains an assembly.
pub const OVER_CONSTRAINT_FACTOR: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStatus {
    #[default]
    Pending,
    Valid,
    Invalid,
    OverConstrained,
    UnderConstrained,
    Interference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyConstraint {
    pub id: String,
    pub kind: ConstraintKind,
    pub component_a: String,
    pub component_b: String,
    pub value: Option<f64>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: AssemblyStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub interferences: Vec<Interference>,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Assembly {:?}: {} errors, {} warnings, {} interferences",
            self.status,
            self.errors.len(),
            self.warnings.len(),
            self.interferences.len()
        )?;
        for e in &self.errors {
            write!(f, "\n  error: {e}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPlacement {
    pub position: Coordinate,
    pub rotation: f64,
    pub scale: f64,
    pub status: ComponentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyInfo {
    pub assembly_id: String,
    pub name: String,
    pub component_count: usize,
    pub constraint_count: usize,
    pub status: AssemblyStatus,
    pub components: Vec<String>,
    pub positions: BTreeMap<String, ComponentPlacement>,
}

/// Owns its components by id. Hierarchy links are ids, never references.
#[derive(Debug, Clone)]
pub struct Assembly {
    id: String,
    name: String,
    components: BTreeMap<String, Component>,
    constraints: Vec<AssemblyConstraint>,
    status: AssemblyStatus,
    config: InterferenceConfig,
    math: PrecisionMath,
    next_constraint: usize,
}

impl Assembly {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_config(id, name, InterferenceConfig::default(), PrecisionMath::default())
    }

    pub fn with_config(
        id: impl Into<String>,
        name: impl Into<String>,
        config: InterferenceConfig,
        math: PrecisionMath,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            components: BTreeMap::new(),
            constraints: Vec::new(),
            status: AssemblyStatus::Pending,
            config,
            math,
            next_constraint: 1,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Status from the last validation; `Pending` until then.
    pub fn status(&self) -> AssemblyStatus {
        self.status
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn constraints(&self) -> &[AssemblyConstraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn add_component(&mut self, mut component: Component) -> Result<(), AssemblyError> {
        if self.components.contains_key(&component.id) {
            return Err(AssemblyError::DuplicateComponent(component.id));
        }
        component.parent_assembly = Some(self.id.clone());
        debug!(assembly = %self.id, component = %component.id, "component added");
        self.components.insert(component.id.clone(), component);
        self.status = AssemblyStatus::Pending;
        Ok(())
    }

    /// Attach `child` under `parent`. A child has at most one parent.
    pub fn add_child(&mut self, parent: &str, child: &str) -> Result<(), AssemblyError> {
        for id in [parent, child] {
            if !self.components.contains_key(id) {
                return Err(AssemblyError::UnknownComponent(id.to_string()));
            }
        }
        if parent == child {
            return Err(AssemblyError::InvalidHierarchy(format!("{child} cannot be its own child")));
        }
        for c in self.components.values_mut() {
            c.children.retain(|id| id != child);
        }
        if let Some(p) = self.components.get_mut(parent) {
            p.children.push(child.to_string());
        }
        Ok(())
    }

    /// Parent of `child`, if it has been attached to one.
    pub fn parent_of(&self, child: &str) -> Option<&str> {
        self.components
            .values()
            .find(|c| c.children.iter().any(|id| id == child))
            .map(|c| c.id.as_str())
    }

    /// Remove a component with every constraint on it. Its children become
    /// top-level components.
    pub fn remove_component(&mut self, id: &str) -> Result<Component, AssemblyError> {
        let mut removed =
            self.components.remove(id).ok_or_else(|| AssemblyError::UnknownComponent(id.to_string()))?;
        for c in self.components.values_mut() {
            c.children.retain(|child| child != id);
        }
        let before = self.constraints.len();
        self.constraints.retain(|c| c.component_a != id && c.component_b != id);
        debug!(component = id, constraints_dropped = before - self.constraints.len(), "component removed");
        removed.parent_assembly = None;
        self.status = AssemblyStatus::Pending;
        Ok(removed)
    }

    /// Move a component. Position components are snapped through the
    /// precision layer; rotation must lie in `[0, 2π]` and scale be positive.
    pub fn set_placement(
        &mut self,
        id: &str,
        position: [f64; 3],
        rotation: f64,
        scale: f64,
    ) -> Result<(), AssemblyError> {
        let position = self.math.coordinate(position[0], position[1], position[2])?;
        let component = self.components.get_mut(id).ok_or_else(|| AssemblyError::UnknownComponent(id.to_string()))?;

        let mut candidate = component.clone();
        candidate.position = position;
        candidate.rotation = rotation;
        candidate.scale = scale;
        let errors = candidate.transform_errors();
        if !errors.is_empty() {
            return Err(AssemblyError::InvalidTransform { id: id.to_string(), message: errors.join("; ") });
        }
        if candidate.status == ComponentStatus::Unplaced {
            candidate.status = ComponentStatus::Placed;
        }
        *component = candidate;
        self.status = AssemblyStatus::Pending;
        Ok(())
    }

    /// Record a constraint. Checks happen in [`validate_assembly`](Self::validate_assembly).
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        component_a: impl Into<String>,
        component_b: impl Into<String>,
        value: Option<f64>,
    ) -> String {
        let id = format!("assembly-constraint-{}", self.next_constraint);
        self.next_constraint += 1;
        self.constraints.push(AssemblyConstraint {
            id: id.clone(),
            kind,
            component_a: component_a.into(),
            component_b: component_b.into(),
            value,
            active: true,
        });
        self.status = AssemblyStatus::Pending;
        id
    }

    pub fn set_constraint_active(&mut self, id: &str, active: bool) -> Result<(), AssemblyError> {
        let constraint = self.constraints.iter_mut().find(|c| c.id == id).ok_or_else(|| {
            AssemblyError::InvalidConstraint { id: id.to_string(), message: "no such constraint".into() }
        })?;
        constraint.active = active;
        self.status = AssemblyStatus::Pending;
        Ok(())
    }

    pub fn remove_constraint(&mut self, id: &str) -> Option<AssemblyConstraint> {
        let i = self.constraints.iter().position(|c| c.id == id)?;
        self.status = AssemblyStatus::Pending;
        Some(self.constraints.remove(i))
    }

    fn constraint_errors(&self, c: &AssemblyConstraint) -> Vec<String> {
        let mut errors = Vec::new();
        for id in [&c.component_a, &c.component_b] {
            if !self.components.contains_key(id) {
                errors.push(format!("constraint {}: unknown component {id}", c.id));
            }
        }
        if !ASSEMBLY_CONSTRAINT_KINDS.contains(&c.kind) {
            errors.push(format!("constraint {}: {:?} is not an assembly constraint", c.id, c.kind));
        }
        if c.component_a == c.component_b {
            errors.push(format!("constraint {}: both ends are {}", c.id, c.component_a));
        }
        errors
    }

    pub fn check_interference(&self) -> Vec<Interference> {
        find_interferences(self.components.values(), &self.config, &self.math)
    }

    /// Check every component and constraint, scan for interference, and
    /// set the status. Precedence: invalid, interference, over-constrained,
    /// under-constrained, valid.
    #[instrument(skip(self), fields(assembly = %self.id))]
    pub fn validate_assembly(&mut self) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.components.is_empty() {
            errors.push("assembly has no components".to_string());
        }
        for c in self.components.values() {
            errors.extend(c.transform_errors().into_iter().map(|e| format!("component {}: {e}", c.id)));
        }

        let mut active = 0;
        for c in &self.constraints {
            if !c.active {
                warnings.push(format!("constraint {} is inactive", c.id));
                continue;
            }
            active += 1;
            errors.extend(self.constraint_errors(c));
        }

        let interferences = if errors.is_empty() { self.check_interference() } else { Vec::new() };

        let unconstrained_floating = self.components.values().any(|comp| {
            comp.status == ComponentStatus::Floating
                && !self
                    .constraints
                    .iter()
                    .any(|c| c.active && (c.component_a == comp.id || c.component_b == comp.id))
        });

        let status = if !errors.is_empty() {
            AssemblyStatus::Invalid
        } else if !interferences.is_empty() {
            AssemblyStatus::Interference
        } else if active > self.components.len() * OVER_CONSTRAINT_FACTOR {
            AssemblyStatus::OverConstrained
        } else if unconstrained_floating {
            AssemblyStatus::UnderConstrained
        } else {
            AssemblyStatus::Valid
        };
        self.status = status;

        if !errors.is_empty() {
            warn!(errors = errors.len(), "assembly invalid");
        }
        info!(
            status = ?status,
            components = self.components.len(),
            constraints = self.constraints.len(),
            interferences = interferences.len(),
            "assembly validated"
        );
        ValidationReport { status, errors, warnings, interferences }
    }

    pub fn assembly_info(&self) -> AssemblyInfo {
        AssemblyInfo {
            assembly_id: self.id.clone(),
            name: self.name.clone(),
            component_count: self.components.len(),
            constraint_count: self.constraints.len(),
            status: self.status,
            components: self.components.keys().cloned().collect(),
            positions: self
                .components
                .values()
                .map(|c| {
                    let placement = ComponentPlacement {
                        position: c.position,
                        rotation: c.rotation,
                        scale: c.scale,
                        status: c.status,
                    };
                    (c.id.clone(), placement)
                })
                .collect(),
        }
    }
}
