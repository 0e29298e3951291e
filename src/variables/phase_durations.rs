//! Contact schedule of one leg.

use super::VariableSet;
use crate::types::Bound;

/// Alternating contact/swing phases of a leg.  Phase 0 is in contact iff
/// `initial_contact`; every following phase flips.
#[derive(Debug, Clone)]
pub struct PhaseDurations {
    durations: Vec<f64>,
    initial_contact: bool,
    total_duration: f64,
    bound: Bound,
}

impl PhaseDurations {
    pub fn new(
        durations: Vec<f64>,
        initial_contact: bool,
        total_duration: f64,
        bound: Bound,
    ) -> Self {
        Self { durations, initial_contact, total_duration, bound }
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn phase_count(&self) -> usize {
        self.durations.len()
    }

    pub fn initial_contact(&self) -> bool {
        self.initial_contact
    }

    /// Fixed motion duration T; the phases sum to it at a feasible point.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn is_contact(&self, phase: usize) -> bool {
        self.initial_contact == (phase % 2 == 0)
    }

    /// Index of the phase containing `t`.  A phase boundary belongs to the
    /// earlier phase; times past the end map to the last phase.
    pub fn phase_index(&self, t: f64) -> usize {
        let mut t_end = 0.0;
        for (phase, &d) in self.durations.iter().enumerate() {
            t_end += d;
            if t <= t_end {
                return phase;
            }
        }
        self.durations.len().saturating_sub(1)
    }

    pub fn is_contact_phase(&self, t: f64) -> bool {
        self.is_contact(self.phase_index(t))
    }
}

impl VariableSet for PhaseDurations {
    fn rows(&self) -> usize {
        self.durations.len()
    }

    fn values(&self) -> Vec<f64> {
        self.durations.clone()
    }

    fn set_values(&mut self, x: &[f64]) {
        self.durations.copy_from_slice(x);
    }

    fn bounds(&self) -> Vec<Bound> {
        vec![self.bound; self.durations.len()]
    }
}
