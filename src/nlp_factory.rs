//! Builds a [`Problem`] from configuration, robot and terrain.

use crate::composite::Problem;
use crate::constraints::{
    sample_times, ConvexityConstraint, Discretized, ForceConstraint, RangeOfMotionConstraint,
    TerrainConstraint, TotalDurationConstraint,
};
use crate::costs::{acceleration_cost, node_cost};
use crate::models::{HeightMap, RobotModel};
use crate::params::{ConstraintName, CostName, Parameters};
use crate::types::{BaseState, Bound, ConfigError, Dx, NlpError, State, GRAVITY};
use crate::variables::contact_load::ContactLoad;
use crate::variables::nodes::PhaseNature;
use crate::variables::phase_durations::PhaseDurations;
use crate::variables::spline::NodeSpline;
use crate::variables::spline_holder::SplineHolder;
use crate::variables::VariableId;
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::{debug, info, warn};

const XYZ: [usize; 3] = [0, 1, 2];
const XY: [usize; 2] = [0, 1];

/// Everything needed to formulate one motion-planning NLP.
#[derive(Debug, Clone)]
pub struct NlpFactory {
    pub params: Parameters,
    pub model: RobotModel,
    pub terrain: Arc<dyn HeightMap>,
    pub initial_base: BaseState,
    /// Initial foot positions in world frame, one per leg.
    pub initial_ee_w: Vec<Vector3<f64>>,
    pub final_base: BaseState,
}

impl NlpFactory {
    pub fn new(
        params: Parameters,
        model: RobotModel,
        terrain: Arc<dyn HeightMap>,
        initial_base: BaseState,
        initial_ee_w: Vec<Vector3<f64>>,
        final_base: BaseState,
    ) -> Self {
        Self { params, model, terrain, initial_base, initial_ee_w, final_base }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.params.validate()?;
        let n_legs = self.model.leg_count();
        for (field, got) in [
            ("ee_phase_durations", self.params.leg_count()),
            ("initial_ee_w", self.initial_ee_w.len()),
            ("max_deviation", self.model.kinematics.max_deviation.len()),
        ] {
            if got != n_legs {
                return Err(ConfigError::LegCount { field, robot: n_legs, got });
            }
        }
        Ok(())
    }

    /// Validate the inputs and assemble variables, constraints and costs.
    pub fn build(&self) -> Result<Problem, NlpError> {
        self.validate()?;
        let p = &self.params;
        let n_legs = self.model.leg_count();

        let holder = SplineHolder::new(
            self.base_linear_spline(),
            self.base_angular_spline(),
            (0..n_legs).map(|leg| self.ee_motion_spline(leg)).collect(),
            (0..n_legs).map(|leg| self.ee_force_spline(leg)).collect(),
            (0..n_legs).map(|leg| self.phase_durations(leg)).collect(),
            self.contact_load(),
        );
        let mut problem = Problem::new(holder);

        problem.add_variable_set(VariableId::BaseLinear)?;
        problem.add_variable_set(VariableId::BaseAngular)?;
        for leg in 0..n_legs {
            problem.add_variable_set(VariableId::EeMotion(leg))?;
            problem.add_variable_set(VariableId::EeForce(leg))?;
            if p.optimize_phase_durations {
                problem.add_variable_set(VariableId::EeSchedule(leg))?;
            }
        }
        if problem.solution().contact_load().is_some() {
            problem.add_variable_set(VariableId::ContactLoad)?;
        }

        for name in p.used_constraints() {
            self.add_constraint(&mut problem, name)?;
        }
        for cost in &p.costs {
            self.add_cost(&mut problem, cost.name, cost.weight)?;
        }

        info!(
            "built NLP: {} variables, {} constraint rows, {} cost terms, {} legs",
            problem.variable_count(),
            problem.constraint_count(),
            problem.cost_partition().blocks().len(),
            n_legs,
        );
        for block in problem.constraint_partition().blocks() {
            debug!(
                name = %block.name,
                rows = block.rows,
                offset = block.offset,
                "constraint block"
            );
        }
        Ok(problem)
    }

    // ── variables ────────────────────────────────────────────

    fn base_poly_durations(&self) -> Vec<f64> {
        let total = self.params.total_duration;
        let dt = self.params.dt_base_polynomial;
        let n = ((total / dt) - 1e-9).ceil().max(1.0) as usize;
        let mut durations = vec![dt; n - 1];
        durations.push(total - dt * (n - 1) as f64);
        durations
    }

    /// Base spline linearly interpolated from `start` to `goal`, with
    /// equality bounds on the start state and on the goal `final_dims`.
    fn base_spline(&self, start: &State, goal: &State, final_pos_dims: &[usize]) -> NodeSpline {
        let mut spline = NodeSpline::with_durations(self.base_poly_durations());
        let total = self.params.total_duration;
        let n_nodes = spline.nodes().node_count();
        let (p0, p1) = (start.p, goal.p);
        let nodes = spline.nodes_mut();
        nodes.init_values(|node, deriv| match deriv {
            Dx::Pos => p0 + (p1 - p0) * (node as f64 / (n_nodes - 1) as f64),
            _ => (p1 - p0) / total,
        });
        nodes.add_start_bound(Dx::Pos, &XYZ, &start.p);
        nodes.add_start_bound(Dx::Vel, &XYZ, &start.v);
        nodes.add_final_bound(Dx::Pos, final_pos_dims, &goal.p);
        nodes.add_final_bound(Dx::Vel, &XYZ, &goal.v);
        spline
    }

    fn base_linear_spline(&self) -> NodeSpline {
        self.base_spline(&self.initial_base.lin, &self.final_base.lin, &XY)
    }

    fn base_angular_spline(&self) -> NodeSpline {
        self.base_spline(&self.initial_base.ang, &self.final_base.ang, &XYZ)
    }

    fn ee_motion_spline(&self, leg: usize) -> NodeSpline {
        let p = &self.params;
        let mut spline = NodeSpline::phase_based(
            PhaseNature::Motion,
            &p.ee_phase_durations[leg],
            p.ee_in_contact_at_start[leg],
            p.ee_polynomials_per_swing_phase,
        );
        let start = self.initial_ee_w[leg];
        let nodes = spline.nodes_mut();
        nodes.init_values(|_, deriv| match deriv {
            Dx::Pos => start,
            _ => Vector3::zeros(),
        });
        nodes.add_start_bound(Dx::Pos, &XYZ, &start);
        spline
    }

    fn ee_force_spline(&self, leg: usize) -> NodeSpline {
        let p = &self.params;
        let mut spline = NodeSpline::phase_based(
            PhaseNature::Force,
            &p.ee_phase_durations[leg],
            !p.ee_in_contact_at_start[leg],
            p.force_polynomials_per_stance_phase,
        );
        let weight_share =
            Vector3::new(0.0, 0.0, self.model.mass * GRAVITY / self.model.leg_count() as f64);
        spline.nodes_mut().init_values(|_, deriv| match deriv {
            Dx::Pos => weight_share,
            _ => Vector3::zeros(),
        });
        spline
    }

    fn phase_durations(&self, leg: usize) -> PhaseDurations {
        let p = &self.params;
        let [lo, hi] = p.bound_phase_duration;
        PhaseDurations::new(
            p.ee_phase_durations[leg].clone(),
            p.ee_in_contact_at_start[leg],
            p.total_duration,
            Bound::new(lo, hi),
        )
    }

    fn contact_load(&self) -> Option<ContactLoad> {
        let p = &self.params;
        if !p.used_constraints().contains(&ConstraintName::Convexity) {
            return None;
        }
        let schedules: Vec<PhaseDurations> =
            (0..self.model.leg_count()).map(|leg| self.phase_durations(leg)).collect();
        Some(ContactLoad::new(
            schedules.len(),
            sample_times(p.total_duration, p.dt_constraint_convexity),
            |leg, t| schedules[leg].is_contact_phase(t),
        ))
    }

    // ── constraints and costs ────────────────────────────────

    fn add_constraint(&self, problem: &mut Problem, name: ConstraintName) -> Result<(), NlpError> {
        let p = &self.params;
        let n_legs = self.model.leg_count();
        let total = p.total_duration;
        match name {
            ConstraintName::RangeOfMotion => {
                let kin = &self.model.kinematics;
                for leg in 0..n_legs {
                    let rom = RangeOfMotionConstraint::new(
                        leg,
                        kin.nominal_stance_b[leg],
                        kin.max_deviation[leg],
                        p.optimize_phase_durations,
                    );
                    let times = sample_times(total, p.dt_constraint_range_of_motion);
                    problem.add_constraint_set(Box::new(Discretized::new(rom, times)))?;
                }
            }
            ConstraintName::Convexity => {
                let times = sample_times(total, p.dt_constraint_convexity);
                let convexity = Discretized::new(ConvexityConstraint::new(n_legs), times);
                problem.add_constraint_set(Box::new(convexity))?;
            }
            ConstraintName::Terrain => {
                for leg in 0..n_legs {
                    let motion = problem.solution().ee_motion(leg).nodes();
                    let terrain = Arc::clone(&self.terrain);
                    let c = TerrainConstraint::new(leg, terrain, motion, p.max_swing_height);
                    problem.add_constraint_set(Box::new(c))?;
                }
            }
            ConstraintName::Force => {
                for leg in 0..n_legs {
                    let sol = problem.solution();
                    let c = ForceConstraint::new(
                        leg,
                        Arc::clone(&self.terrain),
                        sol.ee_force(leg),
                        sol.ee_motion(leg),
                        p.force_limit_in_normal_direction,
                    );
                    problem.add_constraint_set(Box::new(c))?;
                }
            }
            ConstraintName::TotalDuration => {
                if !p.optimize_phase_durations {
                    warn!("TotalDuration requested but phase durations are fixed; skipped");
                    return Ok(());
                }
                for leg in 0..n_legs {
                    problem.add_constraint_set(Box::new(TotalDurationConstraint::new(leg, total)))?;
                }
            }
        }
        Ok(())
    }

    fn add_cost(&self, problem: &mut Problem, name: CostName, weight: f64) -> Result<(), NlpError> {
        match name {
            CostName::BaseLinearAcceleration => {
                let c = acceleration_cost(
                    "cost-base-lin-acc",
                    VariableId::BaseLinear,
                    problem.solution().base_linear(),
                    weight,
                );
                problem.add_cost_set(Box::new(c))?;
            }
            CostName::BaseAngularAcceleration => {
                let c = acceleration_cost(
                    "cost-base-ang-acc",
                    VariableId::BaseAngular,
                    problem.solution().base_angular(),
                    weight,
                );
                problem.add_cost_set(Box::new(c))?;
            }
            CostName::EeForce => {
                for leg in 0..self.model.leg_count() {
                    let nodes = problem.solution().ee_force(leg).nodes();
                    let block_name = format!("cost-ee-force-{leg}");
                    let var = VariableId::EeForce(leg);
                    let c = node_cost(&block_name, var, nodes, Dx::Pos, &XYZ, weight);
                    problem.add_cost_set(Box::new(c))?;
                }
            }
        }
        Ok(())
    }
}
