//! Load fractions of all legs sum to one at every sample.

use super::SampledConstraint;
use crate::types::{Bound, Jacobian};
use crate::variables::spline_holder::SplineHolder;
use crate::variables::{VariableId, VariableSet};
use sprs::TriMat;

#[derive(Debug, Clone)]
pub struct ConvexityConstraint {
    n_legs: usize,
}

impl ConvexityConstraint {
    pub fn new(n_legs: usize) -> Self {
        Self { n_legs }
    }
}

impl SampledConstraint for ConvexityConstraint {
    fn name(&self) -> &str {
        "convexity"
    }

    fn dims_per_sample(&self) -> usize {
        1
    }

    fn value_at(&self, sol: &SplineHolder, k: usize, _t: f64) -> Vec<f64> {
        let sum = sol
            .contact_load()
            .map_or(0.0, |load| (0..self.n_legs).map(|leg| load.load(k, leg)).sum());
        vec![sum]
    }

    fn bounds_at(&self, _k: usize, _t: f64) -> Vec<Bound> {
        vec![Bound::equality(1.0)]
    }

    fn jacobian_at(
        &self,
        sol: &SplineHolder,
        k: usize,
        _t: f64,
        var: VariableId,
    ) -> Option<Jacobian> {
        if var != VariableId::ContactLoad {
            return None;
        }
        let load = sol.contact_load()?;
        let mut tri = TriMat::new((1, load.rows()));
        for leg in 0..self.n_legs {
            tri.add_triplet(0, load.index(k, leg), 1.0);
        }
        Some(tri.to_csr())
    }
}
