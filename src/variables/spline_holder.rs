//! Single owner of every variable set of a problem.

use super::contact_load::ContactLoad;
use super::phase_durations::PhaseDurations;
use super::spline::NodeSpline;
use super::{VariableId, VariableSet};

/// Base and per-leg splines plus the contact schedule they follow.
///
/// Base angular values are Euler angles (roll, pitch, yaw) about x, y, z.
#[derive(Debug, Clone)]
pub struct SplineHolder {
    base_linear: NodeSpline,
    base_angular: NodeSpline,
    ee_motion: Vec<NodeSpline>,
    ee_force: Vec<NodeSpline>,
    phase_durations: Vec<PhaseDurations>,
    contact_load: Option<ContactLoad>,
}

impl SplineHolder {
    pub fn new(
        base_linear: NodeSpline,
        base_angular: NodeSpline,
        ee_motion: Vec<NodeSpline>,
        ee_force: Vec<NodeSpline>,
        phase_durations: Vec<PhaseDurations>,
        contact_load: Option<ContactLoad>,
    ) -> Self {
        Self { base_linear, base_angular, ee_motion, ee_force, phase_durations, contact_load }
    }

    pub fn base_linear(&self) -> &NodeSpline {
        &self.base_linear
    }

    pub fn base_angular(&self) -> &NodeSpline {
        &self.base_angular
    }

    pub fn ee_motion(&self, leg: usize) -> &NodeSpline {
        &self.ee_motion[leg]
    }

    pub fn ee_force(&self, leg: usize) -> &NodeSpline {
        &self.ee_force[leg]
    }

    pub fn phase_durations(&self, leg: usize) -> &PhaseDurations {
        &self.phase_durations[leg]
    }

    pub fn contact_load(&self) -> Option<&ContactLoad> {
        self.contact_load.as_ref()
    }

    pub fn leg_count(&self) -> usize {
        self.ee_motion.len()
    }

    /// Fixed duration of the motion.
    pub fn total_duration(&self) -> f64 {
        self.base_linear.total_duration()
    }

    /// The spline a variable id refers to, if it is spline-backed.
    pub fn spline(&self, id: VariableId) -> Option<&NodeSpline> {
        match id {
            VariableId::BaseLinear => Some(&self.base_linear),
            VariableId::BaseAngular => Some(&self.base_angular),
            VariableId::EeMotion(leg) => self.ee_motion.get(leg),
            VariableId::EeForce(leg) => self.ee_force.get(leg),
            VariableId::EeSchedule(_) | VariableId::ContactLoad => None,
        }
    }

    pub fn variables(&self, id: VariableId) -> Option<&dyn VariableSet> {
        match id {
            VariableId::EeSchedule(leg) => {
                self.phase_durations.get(leg).map(|p| p as &dyn VariableSet)
            }
            VariableId::ContactLoad => self.contact_load.as_ref().map(|c| c as &dyn VariableSet),
            _ => self.spline(id).map(|s| s.nodes() as &dyn VariableSet),
        }
    }

    fn variables_mut(&mut self, id: VariableId) -> Option<&mut dyn VariableSet> {
        match id {
            VariableId::BaseLinear => Some(self.base_linear.nodes_mut() as &mut dyn VariableSet),
            VariableId::BaseAngular => Some(self.base_angular.nodes_mut() as &mut dyn VariableSet),
            VariableId::EeMotion(leg) => {
                self.ee_motion.get_mut(leg).map(|s| s.nodes_mut() as &mut dyn VariableSet)
            }
            VariableId::EeForce(leg) => {
                self.ee_force.get_mut(leg).map(|s| s.nodes_mut() as &mut dyn VariableSet)
            }
            VariableId::EeSchedule(leg) => {
                self.phase_durations.get_mut(leg).map(|p| p as &mut dyn VariableSet)
            }
            VariableId::ContactLoad => {
                self.contact_load.as_mut().map(|c| c as &mut dyn VariableSet)
            }
        }
    }

    pub fn contains(&self, id: VariableId) -> bool {
        self.variables(id).is_some()
    }

    /// Overwrite the values of one variable set.  New phase durations
    /// re-time the leg's motion and force splines immediately.
    /// Returns false if `id` is not held.
    pub fn set_values(&mut self, id: VariableId, x: &[f64]) -> bool {
        let Some(vars) = self.variables_mut(id) else {
            return false;
        };
        vars.set_values(x);

        if let VariableId::EeSchedule(leg) = id {
            let durations = self.phase_durations[leg].durations().to_vec();
            self.ee_motion[leg].update_phase_durations(&durations);
            self.ee_force[leg].update_phase_durations(&durations);
        }
        true
    }
}
