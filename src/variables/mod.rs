//! Optimization variables and the aggregate that owns them.
//!
//! Every variable set is addressed by a [`VariableId`].  The
//! [`SplineHolder`](spline_holder::SplineHolder) is the only owner; constraint
//! and cost blocks keep ids and leg indices and read the current values
//! through the holder at evaluation time.

pub mod contact_load;
pub mod nodes;
pub mod phase_durations;
pub mod spline;
pub mod spline_holder;

use crate::types::Bound;
use std::fmt;

/// Handle to one variable set of the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableId {
    BaseLinear,
    BaseAngular,
    EeMotion(usize),
    EeForce(usize),
    EeSchedule(usize),
    ContactLoad,
}

impl VariableId {
    pub fn name(&self) -> String {
        match self {
            VariableId::BaseLinear => "base-lin".to_string(),
            VariableId::BaseAngular => "base-ang".to_string(),
            VariableId::EeMotion(leg) => format!("ee-motion_{leg}"),
            VariableId::EeForce(leg) => format!("ee-force_{leg}"),
            VariableId::EeSchedule(leg) => format!("ee-schedule_{leg}"),
            VariableId::ContactLoad => "contact-load".to_string(),
        }
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A contiguous group of scalar optimization variables.
pub trait VariableSet: fmt::Debug {
    fn rows(&self) -> usize;

    fn values(&self) -> Vec<f64>;

    /// Overwrite all values.  `x.len()` equals `rows()`.
    fn set_values(&mut self, x: &[f64]);

    fn bounds(&self) -> Vec<Bound>;
}
