//! Constraint blocks.
//!
//! Time-sampled constraints implement [`SampledConstraint`] and are wrapped
//! in [`Discretized`], which evaluates them at fixed sample times and stacks
//! the results.  Node-based constraints implement
//! [`ConstraintSet`](crate::composite::ConstraintSet) directly.

pub mod convexity;
pub mod force;
pub mod range_of_motion;
pub mod terrain;
pub mod total_duration;

use crate::composite::ConstraintSet;
use crate::types::{Bound, Jacobian, DURATION_TOLERANCE};
use crate::variables::spline_holder::SplineHolder;
use crate::variables::VariableId;
use sprs::TriMat;
use std::fmt::Debug;

pub use convexity::ConvexityConstraint;
pub use force::ForceConstraint;
pub use range_of_motion::RangeOfMotionConstraint;
pub use terrain::TerrainConstraint;
pub use total_duration::TotalDurationConstraint;

/// Sample times 0, dt, 2dt, … strictly before `total`, then `total` itself.
pub fn sample_times(total: f64, dt: f64) -> Vec<f64> {
    let mut times = Vec::new();
    let mut k = 0usize;
    loop {
        let t = k as f64 * dt;
        if t >= total - DURATION_TOLERANCE {
            break;
        }
        times.push(t);
        k += 1;
    }
    times.push(total);
    times
}

/// A constraint evaluated independently at each sample time.
pub trait SampledConstraint: Debug {
    fn name(&self) -> &str;

    fn dims_per_sample(&self) -> usize;

    /// `dims_per_sample` values for sample `k` at time `t`.
    fn value_at(&self, sol: &SplineHolder, k: usize, t: f64) -> Vec<f64>;

    fn bounds_at(&self, k: usize, t: f64) -> Vec<Bound>;

    /// dims_per_sample × n_var(var) derivative at sample `k`.
    fn jacobian_at(
        &self,
        sol: &SplineHolder,
        k: usize,
        t: f64,
        var: VariableId,
    ) -> Option<Jacobian>;
}

/// Stacks a [`SampledConstraint`] over its sample times; row `k·dims + d`
/// holds dimension `d` of sample `k`.
#[derive(Debug)]
pub struct Discretized<C> {
    inner: C,
    times: Vec<f64>,
}

impl<C: SampledConstraint> Discretized<C> {
    pub fn new(inner: C, times: Vec<f64>) -> Self {
        Self { inner, times }
    }

    pub fn sample_times(&self) -> &[f64] {
        &self.times
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: SampledConstraint> ConstraintSet for Discretized<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn rows(&self) -> usize {
        self.times.len() * self.inner.dims_per_sample()
    }

    fn values(&self, sol: &SplineHolder) -> Vec<f64> {
        let mut g = Vec::with_capacity(self.rows());
        for (k, &t) in self.times.iter().enumerate() {
            g.extend(self.inner.value_at(sol, k, t));
        }
        g
    }

    fn bounds(&self) -> Vec<Bound> {
        let mut b = Vec::with_capacity(self.rows());
        for (k, &t) in self.times.iter().enumerate() {
            b.extend(self.inner.bounds_at(k, t));
        }
        b
    }

    fn jacobian(&self, sol: &SplineHolder, var: VariableId) -> Option<Jacobian> {
        let cols = sol.variables(var)?.rows();
        let dims = self.inner.dims_per_sample();
        let mut tri = TriMat::new((self.rows(), cols));
        let mut any = false;
        for (k, &t) in self.times.iter().enumerate() {
            if let Some(jac) = self.inner.jacobian_at(sol, k, t, var) {
                any = true;
                for (&value, (r, c)) in jac.iter() {
                    tri.add_triplet(k * dims + r, c, value);
                }
            }
        }
        any.then(|| tri.to_csr())
    }
}
