//! Optimized phase durations of a leg must still add up to the motion time.

use crate::composite::ConstraintSet;
use crate::types::{Bound, Jacobian};
use crate::variables::spline_holder::SplineHolder;
use crate::variables::VariableId;
use sprs::TriMat;

#[derive(Debug, Clone)]
pub struct TotalDurationConstraint {
    name: String,
    leg: usize,
    total_duration: f64,
}

impl TotalDurationConstraint {
    pub fn new(leg: usize, total_duration: f64) -> Self {
        Self { name: format!("totalduration-{leg}"), leg, total_duration }
    }
}

impl ConstraintSet for TotalDurationConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> usize {
        1
    }

    fn values(&self, sol: &SplineHolder) -> Vec<f64> {
        vec![sol.phase_durations(self.leg).durations().iter().sum()]
    }

    fn bounds(&self) -> Vec<Bound> {
        vec![Bound::equality(self.total_duration)]
    }

    fn jacobian(&self, sol: &SplineHolder, var: VariableId) -> Option<Jacobian> {
        if var != VariableId::EeSchedule(self.leg) {
            return None;
        }
        let n = sol.phase_durations(self.leg).phase_count();
        let mut tri = TriMat::new((1, n));
        for phase in 0..n {
            tri.add_triplet(0, phase, 1.0);
        }
        Some(tri.to_csr())
    }
}
