//! Per-leg load fractions λ at the convexity sample times.

use super::VariableSet;
use crate::types::Bound;

/// λ for every (sample, leg) pair, stored sample-major.
///
/// A leg scheduled in swing at a sample gets upper bound 0.  When no leg is
/// in contact (flight) every λ of that sample keeps [0, 1].
#[derive(Debug, Clone)]
pub struct ContactLoad {
    n_legs: usize,
    sample_times: Vec<f64>,
    values: Vec<f64>,
    bounds: Vec<Bound>,
}

impl ContactLoad {
    pub fn new<F>(n_legs: usize, sample_times: Vec<f64>, in_contact: F) -> Self
    where
        F: Fn(usize, f64) -> bool,
    {
        let mut values = Vec::with_capacity(sample_times.len() * n_legs);
        let mut bounds = Vec::with_capacity(sample_times.len() * n_legs);
        for &t in &sample_times {
            let contact: Vec<bool> = (0..n_legs).map(|leg| in_contact(leg, t)).collect();
            let n_contact = contact.iter().filter(|&&c| c).count();
            for &c in &contact {
                if n_contact == 0 {
                    values.push(1.0 / n_legs as f64);
                    bounds.push(Bound::new(0.0, 1.0));
                } else if c {
                    values.push(1.0 / n_contact as f64);
                    bounds.push(Bound::new(0.0, 1.0));
                } else {
                    values.push(0.0);
                    bounds.push(Bound::ZERO);
                }
            }
        }
        Self { n_legs, sample_times, values, bounds }
    }

    pub fn sample_times(&self) -> &[f64] {
        &self.sample_times
    }

    pub fn index(&self, sample: usize, leg: usize) -> usize {
        sample * self.n_legs + leg
    }

    pub fn load(&self, sample: usize, leg: usize) -> f64 {
        self.values[self.index(sample, leg)]
    }

    pub fn leg_count(&self) -> usize {
        self.n_legs
    }
}

impl VariableSet for ContactLoad {
    fn rows(&self) -> usize {
        self.values.len()
    }

    fn values(&self) -> Vec<f64> {
        self.values.clone()
    }

    fn set_values(&mut self, x: &[f64]) {
        self.values.copy_from_slice(x);
    }

    fn bounds(&self) -> Vec<Bound> {
        self.bounds.clone()
    }
}
