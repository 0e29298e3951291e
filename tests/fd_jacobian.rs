//! Finite-difference checks of every analytic derivative.
//!
//! A biped walking up a constant slope is built with all constraints and
//! costs enabled.  The variables are moved away from the initial guess to a
//! generic point, then every column of the stacked constraint Jacobian and
//! every component of the cost gradient is compared against a central
//! difference:
//!
//!     ∂g/∂x_i  ≈  [ g(x + h eᵢ) − g(x − h eᵢ) ] / 2h
//!
//! Both legs end in stance, where the foot is at rest, so the clamp at the
//! end of the motion does not break differentiability in the durations.

use legged_nlp::constraints::sample_times;
use legged_nlp::models::{HeightMap, RobotModel, Slope};
use legged_nlp::params::{ConstraintName, CostName, CostWeight, Parameters};
use legged_nlp::types::{BaseState, Dx, State};
use legged_nlp::variables::spline::NodeSpline;
use legged_nlp::variables::{VariableId, VariableSet};
use legged_nlp::{NlpError, NlpFactory, Problem};
use nalgebra::Vector3;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────

fn slope() -> Slope {
    Slope { x_start: -10.0, slope: 0.2, friction: 0.6 }
}

/// Biped on a slope: stance, swing, stance on both legs, out of phase.
fn biped_factory(optimize_durations: bool) -> NlpFactory {
    let mut params = Parameters::with_gait(
        vec![vec![0.3, 0.3, 0.4], vec![0.4, 0.3, 0.3]],
        vec![true, true],
    );
    params.constraints = vec![
        ConstraintName::RangeOfMotion,
        ConstraintName::Convexity,
        ConstraintName::Terrain,
        ConstraintName::Force,
    ];
    params.costs = vec![
        CostWeight { name: CostName::BaseLinearAcceleration, weight: 1.0 },
        CostWeight { name: CostName::BaseAngularAcceleration, weight: 0.5 },
        CostWeight { name: CostName::EeForce, weight: 1e-3 },
    ];
    params.optimize_phase_durations = optimize_durations;
    params.dt_base_polynomial = 0.2;
    // keeps every sample time away from a phase junction
    params.dt_constraint_range_of_motion = 0.085;

    let terrain = slope();
    let model = RobotModel::biped();
    let feet: Vec<Vector3<f64>> = model
        .kinematics
        .nominal_stance_b
        .iter()
        .map(|p| Vector3::new(p.x, p.y, terrain.height(p.x, p.y)))
        .collect();
    let ground = terrain.height(0.0, 0.0);

    let mut initial_base = BaseState::default();
    initial_base.lin.p = Vector3::new(0.0, 0.0, ground + 0.65);
    let mut final_base = BaseState::default();
    final_base.lin.p = Vector3::new(0.3, 0.0, ground + 0.71);
    final_base.ang.p = Vector3::new(0.0, -0.1, 0.2);

    NlpFactory::new(params, model, Arc::new(terrain), initial_base, feet, final_base)
}

/// Deterministic, non-symmetric perturbation of the initial guess.
/// Phase durations are left untouched so they keep summing to T.
fn generic_point(problem: &Problem) -> Vec<f64> {
    let mut x = problem.variable_values();
    for (id, block) in problem.variable_ids().iter().zip(problem.variable_partition().blocks()) {
        if matches!(id, VariableId::EeSchedule(_)) {
            continue;
        }
        for i in block.offset..block.offset + block.rows {
            x[i] += 0.03 * ((i as f64) * 0.7 + 0.3).sin();
        }
    }
    x
}

fn dense(jac: &sprs::CsMat<f64>) -> Vec<Vec<f64>> {
    let mut d = vec![vec![0.0; jac.cols()]; jac.rows()];
    for (&v, (r, c)) in jac.iter() {
        d[r][c] += v;
    }
    d
}

fn assert_close(analytic: f64, fd: f64, tol_abs: f64, tol_rel: f64, what: &str) {
    let abs_err = (analytic - fd).abs();
    let denom = fd.abs().max(analytic.abs()).max(1e-14);
    let rel_err = abs_err / denom;
    assert!(
        abs_err < tol_abs || rel_err < tol_rel,
        "{what}: analytic={analytic:.8e}, fd={fd:.8e}, abs_err={abs_err:.3e}, rel_err={rel_err:.3e}",
    );
}

/// Central-difference check of the stacked constraint Jacobian.
fn fd_constraint_check(problem: &mut Problem, x: &[f64], h: f64, tol_abs: f64, tol_rel: f64) {
    problem.set_variables(x).unwrap();
    let analytic = dense(&problem.constraint_jacobian());
    let n_rows = problem.constraint_count();

    let mut max_abs = 0.0_f64;
    let mut xp = x.to_vec();
    for i in 0..x.len() {
        xp[i] = x[i] + h;
        problem.set_variables(&xp).unwrap();
        let g_plus = problem.constraint_values();
        xp[i] = x[i] - h;
        problem.set_variables(&xp).unwrap();
        let g_minus = problem.constraint_values();
        xp[i] = x[i];

        for r in 0..n_rows {
            let fd = (g_plus[r] - g_minus[r]) / (2.0 * h);
            max_abs = max_abs.max((analytic[r][i] - fd).abs());
            assert_close(analytic[r][i], fd, tol_abs, tol_rel, &format!("dg[{r}]/dx[{i}]"));
        }
    }
    problem.set_variables(x).unwrap();
    eprintln!("FD constraint Jacobian check (h = {h:.1e}): {n_rows} × {} , max abs err {max_abs:.3e}", x.len());
}

// ─────────────────────────────────────────────────────────────
//  Tests: constraint Jacobians
// ─────────────────────────────────────────────────────────────

#[test]
fn fd_constraint_jacobian_fixed_durations() {
    let mut problem = biped_factory(false).build().unwrap();
    assert!(problem.constraint_count() > 0);
    let x = generic_point(&problem);
    fd_constraint_check(&mut problem, &x, 1e-6, 1e-5, 1e-4);
}

#[test]
fn fd_constraint_jacobian_optimized_durations() {
    let mut problem = biped_factory(true).build().unwrap();
    assert!(problem.variable_ids().contains(&VariableId::EeSchedule(0)));
    assert!(problem.constraint_partition().find("totalduration-1").is_some());
    let x = generic_point(&problem);
    fd_constraint_check(&mut problem, &x, 1e-6, 1e-5, 1e-4);
}

/// Phase durations outside their bounds, as a solver may try, still give a
/// finite evaluation of every block.
#[test]
fn out_of_bound_durations_still_evaluate() {
    let mut problem = biped_factory(true).build().unwrap();
    let mut x = generic_point(&problem);
    let partition = problem.variable_partition().clone();
    let leg0 = partition.find("ee-schedule_0").unwrap();
    x[leg0.offset..leg0.offset + leg0.rows].fill(-0.1);
    let leg1 = partition.find("ee-schedule_1").unwrap();
    x[leg1.offset..leg1.offset + leg1.rows].copy_from_slice(&[0.0, 0.0, 0.0]);
    problem.set_variables(&x).unwrap();

    let g = problem.constraint_values();
    assert_eq!(g.len(), problem.constraint_count());
    assert!(g.iter().all(|v| v.is_finite()));
    assert!(problem.constraint_jacobian().iter().all(|(v, _)| v.is_finite()));
    assert!(problem.cost_value().is_finite());
    assert!(problem.cost_gradient().iter().all(|v| v.is_finite()));
    assert!(problem.max_violation() > 0.0);

    x[leg0.offset] = f64::NAN;
    problem.set_variables(&x).unwrap();
    assert_eq!(problem.constraint_values().len(), problem.constraint_count());
}

/// The block-local derivative must match the corresponding slice of the
/// global Jacobian.
#[test]
fn fill_derivative_matches_global_jacobian() {
    let mut problem = biped_factory(true).build().unwrap();
    let x = generic_point(&problem);
    problem.set_variables(&x).unwrap();
    let global = dense(&problem.constraint_jacobian());

    let row_blocks = problem.constraint_partition().blocks().to_vec();
    let col_blocks = problem.variable_partition().blocks().to_vec();
    let ids = problem.variable_ids().to_vec();

    for rb in &row_blocks {
        for (id, cb) in ids.iter().zip(&col_blocks) {
            let local = dense(&problem.fill_derivative(&rb.name, *id).unwrap());
            assert_eq!(local.len(), rb.rows);
            for r in 0..rb.rows {
                assert_eq!(local[r].len(), cb.rows);
                for c in 0..cb.rows {
                    assert_eq!(local[r][c], global[rb.offset + r][cb.offset + c], "{} / {}", rb.name, id);
                }
            }
        }
    }
}

#[test]
fn fill_derivative_rejects_unknown_names() {
    let problem = biped_factory(false).build().unwrap();
    assert!(matches!(
        problem.fill_derivative("no-such-block", VariableId::BaseLinear),
        Err(NlpError::UnknownBlock(_))
    ));
    assert!(matches!(
        problem.fill_derivative("rangeofmotion-0", VariableId::EeMotion(7)),
        Err(NlpError::UnknownVariableSet(_))
    ));
}

// ─────────────────────────────────────────────────────────────
//  Tests: cost gradient
// ─────────────────────────────────────────────────────────────

#[test]
fn fd_cost_gradient() {
    let mut problem = biped_factory(false).build().unwrap();
    let x = generic_point(&problem);
    problem.set_variables(&x).unwrap();
    let analytic = problem.cost_gradient();

    let h = 1e-6;
    let mut xp = x.clone();
    for i in 0..x.len() {
        xp[i] = x[i] + h;
        problem.set_variables(&xp).unwrap();
        let f_plus = problem.cost_value();
        xp[i] = x[i] - h;
        problem.set_variables(&xp).unwrap();
        let f_minus = problem.cost_value();
        xp[i] = x[i];

        let fd = (f_plus - f_minus) / (2.0 * h);
        assert_close(analytic[i], fd, 1e-5, 1e-5, &format!("dJ/dx[{i}]"));
    }
}

/// The acceleration cost is the exact integral of ‖a‖²; compare against
/// a fine midpoint rule.
#[test]
fn acceleration_cost_matches_quadrature() {
    let mut spline = NodeSpline::with_durations(vec![0.3, 0.5, 0.2]);
    let n = spline.nodes().rows();
    let x: Vec<f64> = (0..n).map(|i| ((i as f64) * 1.3).cos()).collect();
    spline.nodes_mut().set_values(&x);

    let cost = legged_nlp::costs::acceleration_cost("acc", VariableId::BaseLinear, &spline, 1.0);
    let exact = cost.cost_at(&x);

    let steps = 20_000;
    let total = spline.total_duration();
    let dt = total / steps as f64;
    let quad: f64 = (0..steps)
        .map(|k| spline.point((k as f64 + 0.5) * dt).a.norm_squared() * dt)
        .sum();

    assert_close(exact, quad, 1e-6, 1e-5, "∫‖a‖²");
}

// ─────────────────────────────────────────────────────────────
//  Tests: spline derivatives
// ─────────────────────────────────────────────────────────────

#[test]
fn fd_spline_node_jacobian_all_orders() {
    let mut spline = NodeSpline::with_durations(vec![0.25, 0.4, 0.35]);
    let n = spline.nodes().rows();
    let x: Vec<f64> = (0..n).map(|i| ((i as f64) * 0.9 + 0.1).sin()).collect();
    spline.nodes_mut().set_values(&x);

    let h = 1e-6;
    for &t in &sample_times(1.0, 0.15) {
        for dx in [Dx::Pos, Dx::Vel, Dx::Acc] {
            let analytic = dense(&spline.jacobian_wrt_nodes(t, dx));
            let mut xp = x.clone();
            for i in 0..n {
                xp[i] = x[i] + h;
                spline.nodes_mut().set_values(&xp);
                let plus = *spline.point(t).at(dx);
                xp[i] = x[i] - h;
                spline.nodes_mut().set_values(&xp);
                let minus = *spline.point(t).at(dx);
                xp[i] = x[i];
                spline.nodes_mut().set_values(&x);

                for d in 0..3 {
                    let fd = (plus[d] - minus[d]) / (2.0 * h);
                    assert_close(analytic[d][i], fd, 1e-6, 1e-5, &format!("t={t} {dx:?} d={d} i={i}"));
                }
            }
        }
    }
}

#[test]
fn fd_spline_duration_jacobian() {
    use legged_nlp::variables::nodes::PhaseNature;

    let durations = vec![0.3, 0.45, 0.25];
    let mut spline = NodeSpline::phase_based(PhaseNature::Motion, &durations, true, 2);
    let n = spline.nodes().rows();
    let x: Vec<f64> = (0..n).map(|i| ((i as f64) * 0.6 + 0.2).cos()).collect();
    spline.nodes_mut().set_values(&x);

    let h = 1e-7;
    for &t in &[0.05, 0.31, 0.41, 0.52, 0.7, 0.9] {
        let analytic = dense(&spline.jacobian_wrt_durations(t));
        for phase in 0..durations.len() {
            let mut dp = durations.clone();
            dp[phase] += h;
            spline.update_phase_durations(&dp);
            let plus = spline.point(t).p;
            dp[phase] -= 2.0 * h;
            spline.update_phase_durations(&dp);
            let minus = spline.point(t).p;
            spline.update_phase_durations(&durations);

            for d in 0..3 {
                let fd = (plus[d] - minus[d]) / (2.0 * h);
                assert_close(analytic[d][phase], fd, 1e-5, 1e-4, &format!("t={t} phase={phase} d={d}"));
            }
        }
    }
}

/// ω from the Euler-rate map must match vee(Ṙ Rᵀ) along a smooth attitude
/// trajectory, and ω̇ must match the time derivative of ω.
#[test]
fn fd_angular_velocity_and_acceleration() {
    use legged_nlp::euler::{angular_acceleration_in_world, angular_velocity_in_world, rotation_base_to_world};

    let mut spline = NodeSpline::with_durations(vec![0.4, 0.6]);
    let n = spline.nodes().rows();
    let x: Vec<f64> = (0..n).map(|i| 0.8 * ((i as f64) * 1.1 + 0.4).sin()).collect();
    spline.nodes_mut().set_values(&x);

    let h = 1e-6;
    for &t in &[0.1, 0.25, 0.55, 0.8] {
        let s = spline.point(t);
        let omega = angular_velocity_in_world(&s.p, &s.v);
        let omega_dot = angular_acceleration_in_world(&s.p, &s.v, &s.a);

        let r = rotation_base_to_world(&s.p);
        let r_plus = rotation_base_to_world(&spline.point(t + h).p);
        let r_minus = rotation_base_to_world(&spline.point(t - h).p);
        let w = (r_plus - r_minus) / (2.0 * h) * r.transpose();
        let omega_fd = Vector3::new(w[(2, 1)], w[(0, 2)], w[(1, 0)]);

        let sp = spline.point(t + h);
        let sm = spline.point(t - h);
        let omega_dot_fd = (angular_velocity_in_world(&sp.p, &sp.v) - angular_velocity_in_world(&sm.p, &sm.v)) / (2.0 * h);

        for d in 0..3 {
            assert_close(omega[d], omega_fd[d], 1e-6, 1e-6, &format!("ω[{d}] at t={t}"));
            assert_close(omega_dot[d], omega_dot_fd[d], 1e-5, 1e-5, &format!("ω̇[{d}] at t={t}"));
        }
    }
}

#[test]
fn state_at_selects_requested_derivative() {
    let s = State {
        p: Vector3::new(1.0, 2.0, 3.0),
        v: Vector3::new(4.0, 5.0, 6.0),
        a: Vector3::new(7.0, 8.0, 9.0),
    };
    assert_eq!(s.at(Dx::Vel).y, 5.0);
    assert_eq!(s.at(Dx::Acc).z, 9.0);
}
