//! Keeps each foot inside a box around its nominal stance, expressed in the
//! base frame.
//!
//!   g(t) = R(θ(t))ᵀ (p_ee(t) − p_base(t)),   nominal − dev ≤ g ≤ nominal + dev

use super::SampledConstraint;
use crate::euler::{derivative_of_rotated_vector, rotation_base_to_world};
use crate::types::{mat3_times, Bound, Dx, Jacobian};
use crate::variables::spline_holder::SplineHolder;
use crate::variables::VariableId;
use nalgebra::Vector3;

#[derive(Debug, Clone)]
pub struct RangeOfMotionConstraint {
    name: String,
    leg: usize,
    nominal_b: Vector3<f64>,
    max_deviation: Vector3<f64>,
    durations_optimized: bool,
}

impl RangeOfMotionConstraint {
    pub fn new(
        leg: usize,
        nominal_b: Vector3<f64>,
        max_deviation: Vector3<f64>,
        durations_optimized: bool,
    ) -> Self {
        Self {
            name: format!("rangeofmotion-{leg}"),
            leg,
            nominal_b,
            max_deviation,
            durations_optimized,
        }
    }
}

impl SampledConstraint for RangeOfMotionConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn dims_per_sample(&self) -> usize {
        3
    }

    fn value_at(&self, sol: &SplineHolder, _k: usize, t: f64) -> Vec<f64> {
        let base = sol.base_linear().point(t).p;
        let euler = sol.base_angular().point(t).p;
        let foot = sol.ee_motion(self.leg).point(t).p;
        let g = rotation_base_to_world(&euler).transpose() * (foot - base);
        g.iter().copied().collect()
    }

    fn bounds_at(&self, _k: usize, _t: f64) -> Vec<Bound> {
        (0..3)
            .map(|d| {
                Bound::new(
                    self.nominal_b[d] - self.max_deviation[d],
                    self.nominal_b[d] + self.max_deviation[d],
                )
            })
            .collect()
    }

    fn jacobian_at(
        &self,
        sol: &SplineHolder,
        _k: usize,
        t: f64,
        var: VariableId,
    ) -> Option<Jacobian> {
        let euler = sol.base_angular().point(t).p;
        let r_t = rotation_base_to_world(&euler).transpose();

        match var {
            VariableId::BaseLinear => {
                let jac = sol.base_linear().jacobian_wrt_nodes(t, Dx::Pos);
                Some(mat3_times(&(-r_t), &jac))
            }
            VariableId::BaseAngular => {
                let rel = sol.ee_motion(self.leg).point(t).p - sol.base_linear().point(t).p;
                let jac = sol.base_angular().jacobian_wrt_nodes(t, Dx::Pos);
                Some(mat3_times(&derivative_of_rotated_vector(&euler, &rel), &jac))
            }
            VariableId::EeMotion(leg) if leg == self.leg => {
                let jac = sol.ee_motion(self.leg).jacobian_wrt_nodes(t, Dx::Pos);
                Some(mat3_times(&r_t, &jac))
            }
            VariableId::EeSchedule(leg) if leg == self.leg && self.durations_optimized => {
                let jac = sol.ee_motion(self.leg).jacobian_wrt_durations(t);
                Some(mat3_times(&r_t, &jac))
            }
            _ => None,
        }
    }
}
