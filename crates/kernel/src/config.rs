//! Configuration for the precision layer and everything built on it.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What to do with a coordinate component that is non-finite or out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Reject the value with a typed error.
    #[default]
    FailFast,
    /// Substitute NaN with zero and clamp to the range, then snap.
    AutoCorrect,
}

/// Workspace-wide numeric policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecisionConfig {
    /// Minimum distinguishable distance; coordinates snap to multiples of this.
    pub precision_step: f64,
    /// Largest allowed absolute value of any coordinate component.
    pub max_range: f64,
    pub mode: ValidationMode,
    pub max_solver_iterations: usize,
    pub convergence_tolerance: f64,
    /// Center distance below which two assembly components interfere.
    pub min_assembly_clearance: f64,
    /// Run geometric-constraint hooks during solving.
    pub geometric_validation: bool,
    /// Let hook failures trigger their recovery strategy.
    pub recovery_enabled: bool,
    /// Tolerance for comparing two already-snapped values.
    pub equality_tolerance: f64,
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            precision_step: 0.001,
            max_range: 1e6,
            mode: ValidationMode::FailFast,
            max_solver_iterations: 100,
            convergence_tolerance: 0.001,
            min_assembly_clearance: 1.0,
            geometric_validation: true,
            recovery_enabled: true,
            equality_tolerance: 1e-6,
        }
    }
}

impl PrecisionConfig {
    /// Fail fast everywhere, never correct data in place.
    pub fn strict() -> Self {
        Self {
            mode: ValidationMode::FailFast,
            recovery_enabled: false,
            ..Self::default()
        }
    }

    /// Correct out-of-range and non-finite input instead of rejecting it.
    pub fn auto_correct() -> Self {
        Self {
            mode: ValidationMode::AutoCorrect,
            recovery_enabled: true,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `BIM_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `BIM_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("BIM_PRECISION_STEP") {
            config.precision_step = parse_value("BIM_PRECISION_STEP", &v)?;
        }
        if let Some(v) = lookup("BIM_MAX_RANGE") {
            config.max_range = parse_value("BIM_MAX_RANGE", &v)?;
        }
        if let Some(v) = lookup("BIM_VALIDATION_MODE") {
            config.mode = match v.trim().to_ascii_lowercase().as_str() {
                "fail_fast" | "fail-fast" => ValidationMode::FailFast,
                "auto_correct" | "auto-correct" => ValidationMode::AutoCorrect,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "BIM_VALIDATION_MODE".into(),
                        value: v,
                    });
                }
            };
        }
        if let Some(v) = lookup("BIM_MAX_SOLVER_ITERATIONS") {
            config.max_solver_iterations = parse_value("BIM_MAX_SOLVER_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("BIM_CONVERGENCE_TOLERANCE") {
            config.convergence_tolerance = parse_value("BIM_CONVERGENCE_TOLERANCE", &v)?;
        }
        if let Some(v) = lookup("BIM_MIN_ASSEMBLY_CLEARANCE") {
            config.min_assembly_clearance = parse_value("BIM_MIN_ASSEMBLY_CLEARANCE", &v)?;
        }
        if let Some(v) = lookup("BIM_GEOMETRIC_VALIDATION") {
            config.geometric_validation = parse_value("BIM_GEOMETRIC_VALIDATION", &v)?;
        }
        if let Some(v) = lookup("BIM_RECOVERY_ENABLED") {
            config.recovery_enabled = parse_value("BIM_RECOVERY_ENABLED", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("precision_step", self.precision_step)?;
        positive("max_range", self.max_range)?;
        positive("convergence_tolerance", self.convergence_tolerance)?;
        positive("equality_tolerance", self.equality_tolerance)?;
        if !(self.min_assembly_clearance.is_finite() && self.min_assembly_clearance >= 0.0) {
            return Err(ConfigError::NotPositive {
                field: "min_assembly_clearance",
                value: self.min_assembly_clearance,
            });
        }
        if self.max_solver_iterations == 0 {
            return Err(ConfigError::NotPositive { field: "max_solver_iterations", value: 0.0 });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let c = PrecisionConfig::default();
        assert!((c.precision_step - 0.001).abs() < 1e-15);
        assert!((c.max_range - 1e6).abs() < 1e-9);
        assert_eq!(c.max_solver_iterations, 100);
        assert_eq!(c.mode, ValidationMode::FailFast);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BIM_PRECISION_STEP", "0.01"),
            ("BIM_VALIDATION_MODE", "auto-correct"),
            ("BIM_MAX_SOLVER_ITERATIONS", "250"),
            ("BIM_RECOVERY_ENABLED", "false"),
        ]
        .into_iter()
        .collect();
        let c = PrecisionConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert!((c.precision_step - 0.01).abs() < 1e-15);
        assert_eq!(c.mode, ValidationMode::AutoCorrect);
        assert_eq!(c.max_solver_iterations, 250);
        assert!(!c.recovery_enabled);
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = PrecisionConfig::from_lookup(|k| {
            (k == "BIM_MAX_RANGE").then(|| "wide".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = PrecisionConfig::from_lookup(|k| {
            (k == "BIM_PRECISION_STEP").then(|| "-1".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::NotPositive { field: "precision_step", .. }));
    }

    #[test]
    fn test_from_json_partial() {
        let c = PrecisionConfig::from_json(r#"{"mode": "auto_correct", "min_assembly_clearance": 2.5}"#)
            .unwrap();
        assert_eq!(c.mode, ValidationMode::AutoCorrect);
        assert!((c.min_assembly_clearance - 2.5).abs() < 1e-12);
        assert_eq!(c.max_solver_iterations, 100);
    }

    #[test]
    fn test_presets() {
        assert!(!PrecisionConfig::strict().recovery_enabled);
        assert_eq!(PrecisionConfig::auto_correct().mode, ValidationMode::AutoCorrect);
    }
}
