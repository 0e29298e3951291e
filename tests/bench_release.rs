//! Release-mode benchmarks for NLP assembly, evaluation and solving.
//!
//! Run with:   cargo test --release --test bench_release -- --nocapture
//!
//! These are not criterion benchmarks (to avoid an extra dependency);
//! instead they time key operations using `std::time::Instant` and print
//! the results.

use legged_nlp::models::{FlatGround, RobotModel};
use legged_nlp::params::{ConstraintName, CostName, CostWeight, Parameters};
use legged_nlp::types::BaseState;
use legged_nlp::{AugmentedLagrangianSolver, NlpFactory, Solver, SolverOptions};
use nalgebra::Vector3;
use std::sync::Arc;
use std::time::Instant;

// ─────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────

const STEP: f64 = 0.25;

/// Trot phases for one leg.  The second diagonal pair starts with a double
/// stance so the pairs alternate.
fn trot_phases(total: f64, second_pair: bool) -> Vec<f64> {
    let n = (total / STEP).round() as usize;
    if second_pair {
        let mut phases = vec![2.0 * STEP];
        phases.extend(std::iter::repeat(STEP).take(n - 2));
        phases
    } else {
        vec![STEP; n]
    }
}

/// Quadruped trotting forward for `total` seconds with every constraint and
/// cost enabled.
fn make_trot_factory(total: f64) -> NlpFactory {
    let model = RobotModel::quadruped();
    let mut params = Parameters::with_gait(
        vec![
            trot_phases(total, false),
            trot_phases(total, true),
            trot_phases(total, true),
            trot_phases(total, false),
        ],
        vec![true; 4],
    );
    params.constraints = vec![
        ConstraintName::RangeOfMotion,
        ConstraintName::Convexity,
        ConstraintName::Terrain,
        ConstraintName::Force,
    ];
    params.costs = vec![
        CostWeight { name: CostName::BaseLinearAcceleration, weight: 1.0 },
        CostWeight { name: CostName::BaseAngularAcceleration, weight: 1.0 },
        CostWeight { name: CostName::EeForce, weight: 1e-4 },
    ];

    let height = -model.kinematics.nominal_stance_b[0].z;
    let feet = model
        .kinematics
        .nominal_stance_b
        .iter()
        .map(|p| Vector3::new(p.x, p.y, 0.0))
        .collect();
    let mut initial_base = BaseState::default();
    initial_base.lin.p = Vector3::new(0.0, 0.0, height);
    let mut final_base = initial_base;
    final_base.lin.p.x = 0.3 * total;

    NlpFactory::new(params, model, Arc::new(FlatGround::default()), initial_base, feet, final_base)
}

const DURATIONS: &[(f64, &str)] = &[
    (1.0, "1 s"),
    (2.0, "2 s"),
    (4.0, "4 s"),
    (8.0, "8 s"),
];

fn fmt_count(n: usize) -> String {
    if n >= 1_000_000 { format!("{:.2}M", n as f64 / 1e6) }
    else if n >= 1_000 { format!("{:.1}k", n as f64 / 1e3) }
    else { format!("{}", n) }
}

fn fmt_time(us: f64) -> String {
    if us >= 1_000_000.0 { format!("{:.2} s",  us / 1e6) }
    else if us >= 1_000.0 { format!("{:.2} ms", us / 1e3) }
    else { format!("{:.1} μs", us) }
}

// ─────────────────────────────────────────────────────────────
//  Benchmarks
// ─────────────────────────────────────────────────────────────

#[test]
fn bench_build_scaling() {
    eprintln!("\n┌─────────────────────────────────────────────────────────────────┐");
    eprintln!("│                 NLP BUILD  (variables + constraints + costs)    │");
    eprintln!("├──────────┬──────────┬───────────┬───────────────────────────────┤");
    eprintln!("│  motion  │  vars    │  per-build│  total (iters)                │");
    eprintln!("├──────────┼──────────┼───────────┼───────────────────────────────┤");

    for &(total, label) in DURATIONS {
        let factory = make_trot_factory(total);
        let n_vars = factory.build().unwrap().variable_count();

        let iters: usize = if n_vars < 1_000 { 200 } else { 50 };

        let start = Instant::now();
        for _ in 0..iters {
            let problem = factory.build().unwrap();
            let _ = std::hint::black_box(problem);
        }
        let elapsed = start.elapsed();
        let per_us = elapsed.as_micros() as f64 / iters as f64;

        eprintln!(
            "│  {:<7} │ {:>8} │ {:>9} │  {:.2} ms  ({} iters){}│",
            label,
            fmt_count(n_vars),
            fmt_time(per_us),
            elapsed.as_secs_f64() * 1000.0,
            iters,
            " ".repeat(3usize.saturating_sub(format!("{}", iters).len())),
        );
    }
    eprintln!("└──────────┴──────────┴───────────┴───────────────────────────────┘\n");
}

#[test]
fn bench_values_and_jacobian_scaling() {
    eprintln!("\n┌─────────────────────────────────────────────────────────────────┐");
    eprintln!("│         VALUES + JACOBIAN + COST GRADIENT  (one evaluation)     │");
    eprintln!("├──────────┬──────────┬───────────┬───────────────────────────────┤");
    eprintln!("│  motion  │  rows    │  per-eval │  total (iters)                │");
    eprintln!("├──────────┼──────────┼───────────┼───────────────────────────────┤");

    for &(total, label) in DURATIONS {
        let mut problem = make_trot_factory(total).build().unwrap();
        let rows = problem.constraint_count();
        let x = problem.variable_values();

        let iters: usize = if rows < 1_000 { 1000 } else { 200 };

        let start = Instant::now();
        for _ in 0..iters {
            problem.set_variables(&x).unwrap();
            let g = problem.constraint_values();
            let jac = problem.constraint_jacobian();
            let grad = problem.cost_gradient();
            let _ = std::hint::black_box((g, jac, grad));
        }
        let elapsed = start.elapsed();
        let per_us = elapsed.as_micros() as f64 / iters as f64;

        eprintln!(
            "│  {:<7} │ {:>8} │ {:>9} │  {:.2} ms  ({} iters){}│",
            label,
            fmt_count(rows),
            fmt_time(per_us),
            elapsed.as_secs_f64() * 1000.0,
            iters,
            " ".repeat(4usize.saturating_sub(format!("{}", iters).len())),
        );
    }
    eprintln!("└──────────┴──────────┴───────────┴───────────────────────────────┘\n");
}

#[test]
fn bench_full_solve_scaling() {
    // A full solve is expensive for long motions, so cap at 2 s
    let solve_durations: &[(f64, &str)] = &[(1.0, "1 s"), (2.0, "2 s")];

    eprintln!("\n┌─────────────────────────────────────────────────────────────────┐");
    eprintln!("│          AUGMENTED LAGRANGIAN SOLVE  (≤5 outer × 50 L-BFGS)     │");
    eprintln!("├──────────┬──────────┬───────────┬───────────────────────────────┤");
    eprintln!("│  motion  │  vars    │  per-run  │  violation                    │");
    eprintln!("├──────────┼──────────┼───────────┼───────────────────────────────┤");

    let solver = AugmentedLagrangianSolver::new(SolverOptions {
        max_outer_iterations: 5,
        max_inner_iterations: 50,
        ..SolverOptions::default()
    });

    for &(total, label) in solve_durations {
        let factory = make_trot_factory(total);
        let runs = 2;

        let mut violation = f64::NAN;
        let mut n_vars = 0;
        let start = Instant::now();
        for _ in 0..runs {
            let mut problem = factory.build().unwrap();
            n_vars = problem.variable_count();
            let summary = solver.solve(&mut problem).unwrap();
            violation = summary.max_violation;
        }
        let elapsed = start.elapsed();
        let per_us = elapsed.as_micros() as f64 / runs as f64;

        assert!(violation.is_finite());
        eprintln!(
            "│  {:<7} │ {:>8} │ {:>9} │  {:<29.3e}│",
            label,
            fmt_count(n_vars),
            fmt_time(per_us),
            violation,
        );
    }
    eprintln!("└──────────┴──────────┴───────────┴───────────────────────────────┘\n");
}
