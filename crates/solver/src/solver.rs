use std::collections::{BTreeSet, HashSet};
use std::fmt;

use bim_kernel::hooks::GeometricCheck;
use bim_kernel::{Diagnostic, HookRegistry, PrecisionConfig, PrecisionMath};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::constraint::{anchor_of, Constraint, ConstraintKind, ConstraintStatus, EntityMap};
use crate::error::SolverError;

/// Configuration for the fixed-point constraint solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub max_iterations: usize,
    pub convergence_tolerance: f64,
    /// A system with more than `factor × entities` constraints is over-constrained.
    pub over_constraint_factor: usize,
    /// Re-validate constraints against the entity map before each solve.
    pub geometric_validation: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_tolerance: 0.001,
            over_constraint_factor: 2,
            geometric_validation: true,
        }
    }
}

impl SolverConfig {
    pub fn from_precision(config: &PrecisionConfig) -> Self {
        Self {
            max_iterations: config.max_solver_iterations,
            convergence_tolerance: config.convergence_tolerance,
            geometric_validation: config.geometric_validation,
            ..Self::default()
        }
    }
}

/// Aggregate state of the whole constraint system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    WellConstrained,
    OverConstrained,
    UnderConstrained,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub satisfied: usize,
    pub violated: usize,
    pub over_constrained: usize,
    pub under_constrained: usize,
}

impl StatusCounts {
    fn bump(&mut self, status: ConstraintStatus) {
        match status {
            ConstraintStatus::Pending => self.pending += 1,
            ConstraintStatus::Satisfied => self.satisfied += 1,
            ConstraintStatus::Violated => self.violated += 1,
            ConstraintStatus::OverConstrained => self.over_constrained += 1,
            ConstraintStatus::UnderConstrained => self.under_constrained += 1,
        }
    }
}

/// Outcome of a solve. Non-convergence is reported here, not returned as an error.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub converged: bool,
    pub cancelled: bool,
    /// Corrective passes performed. Zero when the system was already satisfied.
    pub iterations: usize,
    pub total_error: f64,
    pub satisfied: usize,
    /// Constraints not satisfied at the end, whatever their final status.
    pub violated: usize,
    pub system_status: SystemStatus,
    /// Constraints that could not be evaluated and were left out of the
    /// passes. Each has a diagnostic; the rest of the system still solves.
    pub failed_constraints: Vec<String>,
    /// Set only for conditions of the whole system, such as running out of iterations.
    pub failure: Option<SolverError>,
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for SolveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.converged {
            "converged"
        } else if self.cancelled {
            "cancelled"
        } else if self.failure.is_none() {
            "partial"
        } else {
            "failed"
        };
        writeln!(
            f,
            "Solve {state}: {} iterations, total error {:.6}",
            self.iterations, self.total_error
        )?;
        writeln!(f, "  satisfied: {}, violated: {}", self.satisfied, self.violated)?;
        write!(f, "  system: {:?}", self.system_status)?;
        if !self.failed_constraints.is_empty() {
            write!(f, "\n  failed constraints: {}", self.failed_constraints.join(", "))?;
        }
        if let Some(e) = &self.failure {
            write!(f, "\n  failure: {e}")?;
        }
        Ok(())
    }
}

/// A constraint-solving session. Constraints are kept in insertion order and
/// solved in that order on every pass.
#[derive(Debug)]
pub struct ConstraintSolver {
    config: SolverConfig,
    math: PrecisionMath,
    hooks: Option<HookRegistry>,
    constraints: Vec<Constraint>,
    next_id: usize,
}

impl Default for ConstraintSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl ConstraintSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self::with_precision(config, PrecisionMath::default())
    }

    pub fn with_precision(config: SolverConfig, math: PrecisionMath) -> Self {
        Self { config, math, hooks: None, constraints: Vec::new(), next_id: 1 }
    }

    /// Report constraints still violated after a solve through these hooks.
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Build, validate and register a constraint with a generated id.
    pub fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        entity_ids: &[&str],
        value: Option<f64>,
        entities: &EntityMap,
    ) -> Result<String, SolverError> {
        let mut id = format!("constraint-{}", self.next_id);
        while self.constraint(&id).is_some() {
            self.next_id += 1;
            id = format!("constraint-{}", self.next_id);
        }
        let mut constraint = Constraint::new(id.clone(), kind, entity_ids.iter().copied());
        constraint.value = value;
        self.add_constraint(constraint, entities)?;
        Ok(id)
    }

    /// Validate and register. Nothing is stored when validation fails.
    pub fn add_constraint(
        &mut self,
        mut constraint: Constraint,
        entities: &EntityMap,
    ) -> Result<(), SolverError> {
        if self.constraint(&constraint.id).is_some() {
            return Err(SolverError::DuplicateId(constraint.id));
        }
        constraint.validate(entities)?;
        if constraint.kind == ConstraintKind::Fixed && constraint.position.is_none() {
            constraint.position = anchor_of(entities, &constraint.entity_ids[0]);
        }
        constraint.status = ConstraintStatus::Pending;
        constraint.last_error = None;

        debug!(id = %constraint.id, kind = ?constraint.kind, "constraint added");
        self.next_id += 1;
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn remove_constraint(&mut self, id: &str) -> Option<Constraint> {
        let pos = self.constraints.iter().position(|c| c.id == id)?;
        Some(self.constraints.remove(pos))
    }

    pub fn constraint(&self, id: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for c in &self.constraints {
            counts.bump(c.status);
        }
        counts
    }

    /// Compare the constraint count with the number of distinct entities referenced.
    pub fn system_status(&self) -> SystemStatus {
        let entities: HashSet<&str> = self
            .constraints
            .iter()
            .flat_map(|c| c.entity_ids.iter().map(String::as_str))
            .collect();
        let (n_constraints, n_entities) = (self.constraints.len(), entities.len());
        if n_constraints > self.config.over_constraint_factor * n_entities {
            SystemStatus::OverConstrained
        } else if n_constraints + 1 < n_entities {
            SystemStatus::UnderConstrained
        } else {
            SystemStatus::WellConstrained
        }
    }

    pub fn solve(&mut self, entities: &mut EntityMap) -> SolveReport {
        self.solve_with_cancel(entities, &|| false)
    }

    /// Iterate until every constraint holds or the total error drops below the
    /// convergence tolerance. `cancel` is polled once per pass.
    #[instrument(skip(self, entities, cancel), fields(constraints = self.constraints.len()))]
    pub fn solve_with_cancel(
        &mut self,
        entities: &mut EntityMap,
        cancel: &dyn Fn() -> bool,
    ) -> SolveReport {
        let mut report = SolveReport {
            converged: false,
            cancelled: false,
            iterations: 0,
            total_error: 0.0,
            satisfied: 0,
            violated: 0,
            system_status: self.system_status(),
            failed_constraints: Vec::new(),
            failure: None,
            diagnostics: Vec::new(),
        };

        let mut broken = vec![false; self.constraints.len()];
        if self.config.geometric_validation {
            for (i, c) in self.constraints.iter_mut().enumerate() {
                if let Err(e) = c.validate(entities) {
                    mark_broken(c, e, &mut report.diagnostics);
                    broken[i] = true;
                }
            }
        }

        let settled = loop {
            let total = self.evaluate(entities, &mut broken, &mut report.diagnostics);
            report.total_error = total;

            let all_satisfied = self
                .constraints
                .iter()
                .zip(&broken)
                .all(|(c, &b)| b || c.status == ConstraintStatus::Satisfied);
            if all_satisfied || total < self.config.convergence_tolerance {
                break true;
            }
            if report.iterations >= self.config.max_iterations {
                report.failure = Some(SolverError::DidNotConverge {
                    iterations: report.iterations,
                    total_error: total,
                });
                self.classify_unsolved(&broken, report.system_status);
                break false;
            }
            if cancel() {
                report.cancelled = true;
                break false;
            }

            report.iterations += 1;
            let pending = self
                .constraints
                .iter()
                .zip(&broken)
                .filter(|(c, b)| !**b && c.status == ConstraintStatus::Violated);
            for (c, _) in pending {
                match c.adjust(entities, &self.math) {
                    Ok(()) => debug!(id = %c.id, kind = ?c.kind, "constraint adjusted"),
                    Err(e) => {
                        debug!(id = %c.id, "adjustment failed: {e}");
                        report.diagnostics.push(e.to_diagnostic("constraint_adjustment"));
                    }
                }
            }
        };

        report.failed_constraints = self
            .constraints
            .iter()
            .zip(&broken)
            .filter(|(_, b)| **b)
            .map(|(c, _)| c.id.clone())
            .collect();
        report.converged = settled && report.failed_constraints.is_empty();

        let counts = self.status_counts();
        report.satisfied = counts.satisfied;
        report.violated = counts.violated + counts.over_constrained + counts.under_constrained;
        self.report_violations(entities, &mut report.diagnostics);

        if report.converged {
            info!(
                iterations = report.iterations,
                total_error = report.total_error,
                satisfied = report.satisfied,
                "constraints solved"
            );
        } else {
            warn!(
                iterations = report.iterations,
                total_error = report.total_error,
                violated = report.violated,
                failed = report.failed_constraints.len(),
                cancelled = report.cancelled,
                "constraints not solved"
            );
        }
        report
    }

    /// Measure every healthy constraint and update its status. A constraint
    /// whose error cannot be computed is marked broken. Returns the summed error.
    fn evaluate(&mut self, entities: &EntityMap, broken: &mut [bool], diagnostics: &mut Vec<Diagnostic>) -> f64 {
        let mut total = 0.0;
        for (c, b) in self.constraints.iter_mut().zip(broken.iter_mut()) {
            if *b {
                continue;
            }
            let err = match c.error(entities, &self.math) {
                Ok(err) => err,
                Err(e) => {
                    mark_broken(c, e, diagnostics);
                    *b = true;
                    continue;
                }
            };
            c.last_error = Some(err);
            c.status = if err <= c.tolerance {
                ConstraintStatus::Satisfied
            } else {
                ConstraintStatus::Violated
            };
            total += err.abs();
        }
        total
    }

    /// Constraints still violated when the iteration budget runs out take the
    /// system's aggregate state, when it has one.
    fn classify_unsolved(&mut self, broken: &[bool], system: SystemStatus) {
        let status = match system {
            SystemStatus::OverConstrained => ConstraintStatus::OverConstrained,
            SystemStatus::UnderConstrained => ConstraintStatus::UnderConstrained,
            SystemStatus::WellConstrained => return,
        };
        for (c, _) in self.constraints.iter_mut().zip(broken).filter(|(_, b)| !**b) {
            if c.status == ConstraintStatus::Violated {
                c.status = status;
            }
        }
    }

    fn report_violations(&self, entities: &EntityMap, diagnostics: &mut Vec<Diagnostic>) {
        let Some(hooks) = &self.hooks else {
            return;
        };
        let unsolved = |c: &&Constraint| !matches!(c.status, ConstraintStatus::Satisfied | ConstraintStatus::Pending);
        for c in self.constraints.iter().filter(unsolved) {
            let Some((check, points)) = hook_check(c, entities) else {
                continue;
            };
            let ctx = hooks.check_constraint(&c.id, points, check, c.tolerance);
            diagnostics.extend(ctx.errors);
            diagnostics.extend(ctx.warnings);
        }
    }

    /// Entity ids referenced by at least one constraint, sorted.
    pub fn referenced_entities(&self) -> BTreeSet<&str> {
        self.constraints
            .iter()
            .flat_map(|c| c.entity_ids.iter().map(String::as_str))
            .collect()
    }
}

fn mark_broken(c: &mut Constraint, e: SolverError, diagnostics: &mut Vec<Diagnostic>) {
    warn!(id = %c.id, "constraint skipped: {e}");
    c.status = ConstraintStatus::Violated;
    c.last_error = None;
    diagnostics.push(e.to_diagnostic("constraint_solving"));
}

/// Map a constraint onto the pipeline's built-in geometric checks.
fn hook_check(c: &Constraint, entities: &EntityMap) -> Option<(GeometricCheck, Vec<[f64; 3]>)> {
    let a = entities.get(c.entity_ids.first()?)?;
    let b = entities.get(c.entity_ids.get(1)?)?;
    match c.kind {
        ConstraintKind::Distance => Some((
            GeometricCheck::Distance { target: c.value.unwrap_or(0.0) },
            vec![a.anchor(), b.anchor()],
        )),
        ConstraintKind::Parallel | ConstraintKind::Perpendicular => {
            let (a0, a1) = a.endpoints()?;
            let (b0, b1) = b.endpoints()?;
            let check = if c.kind == ConstraintKind::Parallel {
                GeometricCheck::Parallel
            } else {
                GeometricCheck::Perpendicular
            };
            Some((check, vec![a0.to_array(), a1.to_array(), b0.to_array(), b1.to_array()]))
        }
        _ => None,
    }
}
