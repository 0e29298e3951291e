//! Problem configuration.
//!
//! Everything needed to shape the NLP besides the robot and terrain models:
//! the gait (per-leg phase durations), discretization steps, which
//! constraints and costs are active, and numeric tolerances.

use crate::optimizer::SolverOptions;
use crate::types::{ConfigError, DURATION_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─────────────────────────────────────────────────────────────
//  Constraint / cost identifiers
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintName {
    RangeOfMotion,
    Convexity,
    Terrain,
    Force,
    TotalDuration,
}

impl FromStr for ConstraintName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RangeOfMotion" => Ok(Self::RangeOfMotion),
            "Convexity" => Ok(Self::Convexity),
            "Terrain" => Ok(Self::Terrain),
            "Force" => Ok(Self::Force),
            "TotalDuration" => Ok(Self::TotalDuration),
            other => Err(ConfigError::UnknownConstraint(other.to_string())),
        }
    }
}

impl fmt::Display for ConstraintName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CostName {
    BaseLinearAcceleration,
    BaseAngularAcceleration,
    EeForce,
}

impl FromStr for CostName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BaseLinearAcceleration" => Ok(Self::BaseLinearAcceleration),
            "BaseAngularAcceleration" => Ok(Self::BaseAngularAcceleration),
            "EeForce" => Ok(Self::EeForce),
            other => Err(ConfigError::UnknownCost(other.to_string())),
        }
    }
}

impl fmt::Display for CostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A cost term together with its weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostWeight {
    pub name: CostName,
    pub weight: f64,
}

// ─────────────────────────────────────────────────────────────
//  Serde default functions
// ─────────────────────────────────────────────────────────────

const fn default_dt_base_polynomial() -> f64 {
    0.1
}
const fn default_dt_constraint_range_of_motion() -> f64 {
    0.08
}
const fn default_dt_constraint_convexity() -> f64 {
    0.1
}
const fn default_polys_per_swing() -> usize {
    2
}
const fn default_polys_per_stance() -> usize {
    3
}
const fn default_force_limit() -> f64 {
    1000.0
}
const fn default_max_swing_height() -> f64 {
    0.25
}
const fn default_bound_phase_duration() -> [f64; 2] {
    [0.2, 1.0]
}
const fn default_euler_singularity_tol() -> f64 {
    1e-3
}
const fn default_trajectory_end_slack() -> f64 {
    1e-5
}
fn default_constraints() -> Vec<ConstraintName> {
    vec![ConstraintName::RangeOfMotion, ConstraintName::Terrain, ConstraintName::Force]
}

// ─────────────────────────────────────────────────────────────
//  Parameters
// ─────────────────────────────────────────────────────────────

/// Shape of the optimization problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Duration of the whole motion in seconds.
    pub total_duration: f64,

    /// Alternating phase durations per leg; they must sum to `total_duration`.
    pub ee_phase_durations: Vec<Vec<f64>>,

    /// Whether each leg starts in contact.
    pub ee_in_contact_at_start: Vec<bool>,

    #[serde(default = "default_constraints")]
    pub constraints: Vec<ConstraintName>,

    /// Treat the phase durations as optimization variables.
    #[serde(default)]
    pub optimize_phase_durations: bool,

    /// Duration of each base polynomial; the last one absorbs the remainder.
    #[serde(default = "default_dt_base_polynomial")]
    pub dt_base_polynomial: f64,

    #[serde(default = "default_dt_constraint_range_of_motion")]
    pub dt_constraint_range_of_motion: f64,

    #[serde(default = "default_dt_constraint_convexity")]
    pub dt_constraint_convexity: f64,

    /// Polynomials describing each swing phase of a foot.
    #[serde(default = "default_polys_per_swing")]
    pub ee_polynomials_per_swing_phase: usize,

    /// Polynomials describing each stance phase of a contact force.
    #[serde(default = "default_polys_per_stance")]
    pub force_polynomials_per_stance_phase: usize,

    /// Upper limit of the normal contact force in N.
    #[serde(default = "default_force_limit")]
    pub force_limit_in_normal_direction: f64,

    /// Highest a swinging foot may rise above the terrain.
    #[serde(default = "default_max_swing_height")]
    pub max_swing_height: f64,

    /// [min, max] of every optimized phase duration.
    #[serde(default = "default_bound_phase_duration")]
    pub bound_phase_duration: [f64; 2],

    /// Pitch band around ±π/2 treated as gimbal lock.
    #[serde(default = "default_euler_singularity_tol")]
    pub euler_singularity_tol: f64,

    /// Slack past `total_duration` still sampled during extraction.
    #[serde(default = "default_trajectory_end_slack")]
    pub trajectory_end_slack: f64,

    /// Weighted cost terms.
    #[serde(default)]
    pub costs: Vec<CostWeight>,

    /// Options passed through to the solver.
    #[serde(default)]
    pub solver: SolverOptions,
}

impl Parameters {
    /// Gait with every leg standing for the whole motion.
    pub fn standing(total_duration: f64, n_legs: usize) -> Self {
        Self {
            total_duration,
            ee_phase_durations: vec![vec![total_duration]; n_legs],
            ee_in_contact_at_start: vec![true; n_legs],
            constraints: default_constraints(),
            costs: Vec::new(),
            optimize_phase_durations: false,
            dt_base_polynomial: default_dt_base_polynomial(),
            dt_constraint_range_of_motion: default_dt_constraint_range_of_motion(),
            dt_constraint_convexity: default_dt_constraint_convexity(),
            ee_polynomials_per_swing_phase: default_polys_per_swing(),
            force_polynomials_per_stance_phase: default_polys_per_stance(),
            force_limit_in_normal_direction: default_force_limit(),
            max_swing_height: default_max_swing_height(),
            bound_phase_duration: default_bound_phase_duration(),
            euler_singularity_tol: default_euler_singularity_tol(),
            trajectory_end_slack: default_trajectory_end_slack(),
            solver: SolverOptions::default(),
        }
    }

    /// Gait built from explicit per-leg phase durations.
    pub fn with_gait(phase_durations: Vec<Vec<f64>>, in_contact_at_start: Vec<bool>) -> Self {
        let total: f64 = phase_durations.first().map(|p| p.iter().sum()).unwrap_or(0.0);
        let n_legs = phase_durations.len();
        Self {
            ee_phase_durations: phase_durations,
            ee_in_contact_at_start: in_contact_at_start,
            ..Self::standing(total, n_legs)
        }
    }

    pub fn leg_count(&self) -> usize {
        self.ee_phase_durations.len()
    }

    /// Constraint list with `TotalDuration` appended when durations are optimized.
    pub fn used_constraints(&self) -> Vec<ConstraintName> {
        let mut used = self.constraints.clone();
        if self.optimize_phase_durations && !used.contains(&ConstraintName::TotalDuration) {
            used.push(ConstraintName::TotalDuration);
        }
        used
    }

    /// Enable constraints by name, rejecting unknown ones.
    pub fn set_constraints_by_name<S: AsRef<str>>(
        &mut self,
        names: &[S],
    ) -> Result<(), ConfigError> {
        self.constraints = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// Enable costs by name, rejecting unknown ones.
    pub fn set_costs_by_name<S: AsRef<str>>(
        &mut self,
        costs: &[(S, f64)],
    ) -> Result<(), ConfigError> {
        self.costs = costs
            .iter()
            .map(|(n, w)| Ok(CostWeight { name: n.as_ref().parse()?, weight: *w }))
            .collect::<Result<_, ConfigError>>()?;
        Ok(())
    }

    /// Validate configuration.  Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.total_duration > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "total_duration",
                message: format!("{} (must be > 0)", self.total_duration),
            });
        }
        if self.ee_in_contact_at_start.len() != self.ee_phase_durations.len() {
            return Err(ConfigError::LegCount {
                field: "ee_in_contact_at_start",
                robot: self.ee_phase_durations.len(),
                got: self.ee_in_contact_at_start.len(),
            });
        }
        for (field, dt) in [
            ("dt_base_polynomial", self.dt_base_polynomial),
            ("dt_constraint_range_of_motion", self.dt_constraint_range_of_motion),
            ("dt_constraint_convexity", self.dt_constraint_convexity),
        ] {
            if !(dt > 0.0) {
                let message = format!("{dt} (must be > 0)");
                return Err(ConfigError::InvalidValue { field, message });
            }
        }
        if self.ee_polynomials_per_swing_phase == 0
            || self.force_polynomials_per_stance_phase == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "polynomials_per_phase",
                message: "at least one polynomial per phase is required".into(),
            });
        }
        let [lo, hi] = self.bound_phase_duration;
        if !(lo > 0.0 && lo <= hi) {
            return Err(ConfigError::InvalidValue {
                field: "bound_phase_duration",
                message: format!("[{lo}, {hi}]"),
            });
        }
        for (leg, durations) in self.ee_phase_durations.iter().enumerate() {
            if durations.is_empty() || durations.iter().any(|&d| !(d > 0.0)) {
                return Err(ConfigError::InvalidValue {
                    field: "ee_phase_durations",
                    message: format!("leg {leg} needs at least one positive duration"),
                });
            }
            let sum: f64 = durations.iter().sum();
            let tol = DURATION_TOLERANCE * self.total_duration.max(1.0);
            if (sum - self.total_duration).abs() > tol {
                return Err(ConfigError::DurationMismatch { leg, sum, total: self.total_duration });
            }
        }
        Ok(())
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let params: Self = toml::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
