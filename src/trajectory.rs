//! Sampling a solution into a time series of robot states.

use crate::composite::Problem;
use crate::euler::{
    angular_acceleration_in_world, angular_velocity_in_world, normalize_euler_zyx,
    quaternion_base_to_world, rotation_base_to_world, xyz_to_zyx,
};
use crate::models::{InverseKinematics, JointAngles};
use crate::types::{ConfigError, KinematicsError, NlpError, State};
use crate::variables::spline_holder::SplineHolder;
use nalgebra::{UnitQuaternion, Vector3};

/// Base orientation at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseAngular {
    /// Raw spline state: Euler angles (roll, pitch, yaw) and their rates.
    pub euler: State,
    /// Canonical (yaw, pitch, roll).
    pub euler_zyx: Vector3<f64>,
    pub quaternion: UnitQuaternion<f64>,
    /// Angular velocity in world frame.
    pub omega: Vector3<f64>,
    /// Angular acceleration in world frame.
    pub omega_dot: Vector3<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegState {
    pub contact: bool,
    /// Foot position, velocity and acceleration in world frame.
    pub foot: State,
    pub force: Vector3<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    pub time: f64,
    pub base_linear: State,
    pub base_angular: BaseAngular,
    pub legs: Vec<LegState>,
}

impl RobotState {
    /// Foot of `leg` relative to the base, in base frame.
    pub fn foot_in_base(&self, leg: usize) -> Vector3<f64> {
        let r = rotation_base_to_world(&self.base_angular.euler.p);
        r.transpose() * (self.legs[leg].foot.p - self.base_linear.p)
    }

    /// Joint angles of every leg.  An unreachable foot fails only its own leg.
    pub fn joint_angles(
        &self,
        ik: &dyn InverseKinematics,
    ) -> Vec<Result<JointAngles, KinematicsError>> {
        (0..self.legs.len())
            .map(|leg| ik.joint_angles(&self.foot_in_base(leg), leg))
            .collect()
    }
}

/// Sample the solution at t = k·dt for every t ≤ T + `end_slack`.
/// `dt` must be positive and finite.
pub fn extract(
    sol: &SplineHolder,
    dt: f64,
    end_slack: f64,
    euler_tol: f64,
) -> Result<Vec<RobotState>, NlpError> {
    check_sample_dt(dt)?;
    let total = sol.total_duration();
    let mut states = Vec::new();
    let mut k = 0usize;
    loop {
        let t = k as f64 * dt;
        if t > total + end_slack {
            break;
        }
        states.push(state_at(sol, t, euler_tol));
        k += 1;
    }
    Ok(states)
}

fn check_sample_dt(dt: f64) -> Result<(), NlpError> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        let message = format!("{dt} (must be > 0)");
        Err(ConfigError::InvalidValue { field: "dt", message }.into())
    }
}

pub fn state_at(sol: &SplineHolder, t: f64, euler_tol: f64) -> RobotState {
    let euler = sol.base_angular().point(t);
    let base_angular = BaseAngular {
        euler_zyx: normalize_euler_zyx(xyz_to_zyx(&euler.p), euler_tol),
        quaternion: quaternion_base_to_world(&euler.p),
        omega: angular_velocity_in_world(&euler.p, &euler.v),
        omega_dot: angular_acceleration_in_world(&euler.p, &euler.v, &euler.a),
        euler,
    };

    let legs = (0..sol.leg_count())
        .map(|leg| LegState {
            contact: sol.phase_durations(leg).is_contact_phase(t),
            foot: sol.ee_motion(leg).point(t),
            force: sol.ee_force(leg).point(t).p,
        })
        .collect();

    RobotState { time: t, base_linear: sol.base_linear().point(t), base_angular, legs }
}

impl Problem {
    /// Trajectory of the current variable values.
    pub fn trajectory(
        &self,
        dt: f64,
        end_slack: f64,
        euler_tol: f64,
    ) -> Result<Vec<RobotState>, NlpError> {
        extract(self.solution(), dt, end_slack, euler_tol)
    }

    /// Trajectory of every recorded iterate, oldest first.  The problem is
    /// left holding its last iterate.
    pub fn iterate_trajectories(
        &mut self,
        dt: f64,
        end_slack: f64,
        euler_tol: f64,
    ) -> Result<Vec<Vec<RobotState>>, NlpError> {
        check_sample_dt(dt)?;
        let count = self.iteration_count();
        let mut all = Vec::with_capacity(count);
        for i in 0..count {
            self.set_iterate(i)?;
            all.push(self.trajectory(dt, end_slack, euler_tol)?);
        }
        Ok(all)
    }
}
