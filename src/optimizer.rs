//! Solver seam and the default augmented-Lagrangian solver.
//!
//! The inner minimizations run L-BFGS from `argmin` on the augmented
//! Lagrangian of the [`Problem`].  Uses `Vec<f64>` as the argmin parameter
//! type to avoid ndarray version conflicts with argmin-math.

use crate::composite::Problem;
use crate::types::{Bound, NlpError};
use argmin::core::{CostFunction, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Anything that can drive a [`Problem`] towards a solution.
///
/// Implementations call `Problem::set_variables` with every new point and
/// `Problem::save_current` once per accepted iterate.  Running out of
/// iterations or time is reported through the summary, not as an error.
pub trait Solver {
    fn solve(&self, problem: &mut Problem) -> Result<SolveSummary, NlpError>;
}

/// Outcome of a solve.  The problem holds the last iterate either way.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveSummary {
    pub iterations: usize,
    pub converged: bool,
    pub max_violation: f64,
    pub cost: f64,
}

// ─────────────────────────────────────────────────────────────
//  Options
// ─────────────────────────────────────────────────────────────

const fn default_mu_init() -> f64 {
    10.0
}
const fn default_mu_factor() -> f64 {
    5.0
}
const fn default_mu_max() -> f64 {
    1e8
}
const fn default_max_outer_iterations() -> usize {
    20
}
const fn default_max_inner_iterations() -> usize {
    200
}
const fn default_constraint_tol() -> f64 {
    1e-4
}
const fn default_gradient_tol() -> f64 {
    1e-8
}
const fn default_lbfgs_memory() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Initial penalty parameter μ.
    #[serde(default = "default_mu_init")]
    pub mu_init: f64,
    /// Multiplicative growth factor for μ each outer iteration.
    #[serde(default = "default_mu_factor")]
    pub mu_factor: f64,
    #[serde(default = "default_mu_max")]
    pub mu_max: f64,
    #[serde(default = "default_max_outer_iterations")]
    pub max_outer_iterations: usize,
    /// L-BFGS iterations per outer iteration.
    #[serde(default = "default_max_inner_iterations")]
    pub max_inner_iterations: usize,
    /// Stop once every row and bound is violated by less than this.
    #[serde(default = "default_constraint_tol")]
    pub constraint_tol: f64,
    #[serde(default = "default_gradient_tol")]
    pub gradient_tol: f64,
    #[serde(default = "default_lbfgs_memory")]
    pub lbfgs_memory: usize,
    /// Wall-clock budget in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cpu_time: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            mu_init: default_mu_init(),
            mu_factor: default_mu_factor(),
            mu_max: default_mu_max(),
            max_outer_iterations: default_max_outer_iterations(),
            max_inner_iterations: default_max_inner_iterations(),
            constraint_tol: default_constraint_tol(),
            gradient_tol: default_gradient_tol(),
            lbfgs_memory: default_lbfgs_memory(),
            max_cpu_time: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Augmented-Lagrangian rows
// ─────────────────────────────────────────────────────────────

/// Scalar quantity entering the augmented Lagrangian.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Source {
    Constraint(usize),
    Variable(usize),
}

/// c = target,  c ≤ bound  or  c ≥ bound.
#[derive(Debug, Clone, Copy, PartialEq)]
enum AlRow {
    Equality(Source, f64),
    Upper(Source, f64),
    Lower(Source, f64),
}

impl AlRow {
    fn source(&self) -> Source {
        match *self {
            AlRow::Equality(s, _) | AlRow::Upper(s, _) | AlRow::Lower(s, _) => s,
        }
    }

    /// Residual whose sign convention is "≤ 0 is feasible" for inequalities.
    fn residual(&self, c: f64) -> f64 {
        match *self {
            AlRow::Equality(_, target) => c - target,
            AlRow::Upper(_, bound) => c - bound,
            AlRow::Lower(_, bound) => bound - c,
        }
    }

    /// ∂residual/∂c.
    fn sign(&self) -> f64 {
        match self {
            AlRow::Lower(..) => -1.0,
            _ => 1.0,
        }
    }

    fn is_equality(&self) -> bool {
        matches!(self, AlRow::Equality(..))
    }
}

fn rows_from_bounds(bounds: &[Bound], source: fn(usize) -> Source, rows: &mut Vec<AlRow>) {
    for (i, b) in bounds.iter().enumerate() {
        if b.is_equality() {
            rows.push(AlRow::Equality(source(i), b.lower));
            continue;
        }
        if b.lower.is_finite() {
            rows.push(AlRow::Lower(source(i), b.lower));
        }
        if b.upper.is_finite() {
            rows.push(AlRow::Upper(source(i), b.upper));
        }
    }
}

/// Multipliers and penalty of the outer loop.
#[derive(Debug, Clone)]
struct AlState {
    lambdas: Vec<f64>,
    mu: f64,
}

impl AlState {
    /// One penalty term's value and its derivative with respect to the
    /// residual.
    ///
    /// Equality:    λh + (μ/2)h²
    /// Inequality:  (μ/2)[max(0, λ/μ + h)]²
    fn term(&self, k: usize, row: &AlRow, h: f64) -> (f64, f64) {
        let lambda = self.lambdas[k];
        if row.is_equality() {
            (lambda * h + 0.5 * self.mu * h * h, lambda + self.mu * h)
        } else {
            let shifted = (lambda / self.mu + h).max(0.0);
            (0.5 * self.mu * shifted * shifted, self.mu * shifted)
        }
    }

    /// λ_k ← λ_k + μh for equalities, max(0, λ_k + μh) otherwise.
    fn update(&mut self, rows: &[AlRow], residuals: &[f64]) {
        for (k, (row, &h)) in rows.iter().zip(residuals).enumerate() {
            let next = self.lambdas[k] + self.mu * h;
            self.lambdas[k] = if row.is_equality() { next } else { next.max(0.0) };
        }
    }
}

fn residuals(rows: &[AlRow], g: &[f64], x: &[f64]) -> Vec<f64> {
    rows.iter()
        .map(|row| {
            let c = match row.source() {
                Source::Constraint(i) => g[i],
                Source::Variable(i) => x[i],
            };
            row.residual(c)
        })
        .collect()
}

fn max_violation(rows: &[AlRow], residuals: &[f64]) -> f64 {
    rows.iter()
        .zip(residuals)
        .map(|(row, &h)| if row.is_equality() { h.abs() } else { h.max(0.0) })
        .fold(0.0_f64, f64::max)
}

// ─────────────────────────────────────────────────────────────
//  argmin problem wrapper
// ─────────────────────────────────────────────────────────────

/// Augmented Lagrangian of a [`Problem`] at fixed multipliers.
///
/// argmin's traits take `&self` while evaluating requires writing the point
/// into the problem, hence the `RefCell`.  argmin calls `cost(θ)` and
/// `gradient(θ)` at the same θ; the last `(θ, L, ∇L)` is cached.
struct AlProblem<'a> {
    problem: RefCell<&'a mut Problem>,
    rows: &'a [AlRow],
    state: &'a AlState,
    last_eval: RefCell<Option<(Vec<f64>, f64, Vec<f64>)>>,
}

impl<'a> AlProblem<'a> {
    fn ensure_evaluated(&self, theta: &[f64]) -> Result<(), argmin::core::Error> {
        {
            let cached = self.last_eval.borrow();
            if let Some((ref t, _, _)) = *cached {
                if t == theta {
                    return Ok(());
                }
            }
        }

        let mut problem = self.problem.borrow_mut();
        problem
            .set_variables(theta)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;

        let mut value = problem.cost_value();
        let mut grad = problem.cost_gradient();
        let g = problem.constraint_values();
        let h = residuals(self.rows, &g, theta);

        // dL/dg_i accumulated per constraint row, applied through Jᵀ once.
        let mut dl_dg = vec![0.0; g.len()];
        for (k, (row, &hk)) in self.rows.iter().zip(&h).enumerate() {
            let (term, dterm) = self.state.term(k, row, hk);
            value += term;
            match row.source() {
                Source::Constraint(i) => dl_dg[i] += dterm * row.sign(),
                Source::Variable(i) => grad[i] += dterm * row.sign(),
            }
        }
        if dl_dg.iter().any(|&d| d != 0.0) {
            let jac = problem.constraint_jacobian();
            for (&jv, (r, c)) in jac.iter() {
                grad[c] += dl_dg[r] * jv;
            }
        }

        *self.last_eval.borrow_mut() = Some((theta.to_vec(), value, grad));
        Ok(())
    }
}

impl<'a> CostFunction for AlProblem<'a> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        self.ensure_evaluated(theta)?;
        self.last_eval
            .borrow()
            .as_ref()
            .map(|(_, value, _)| *value)
            .ok_or_else(|| argmin::core::Error::msg("augmented Lagrangian not evaluated"))
    }
}

impl<'a> Gradient for AlProblem<'a> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        self.ensure_evaluated(theta)?;
        self.last_eval
            .borrow()
            .as_ref()
            .map(|(_, _, grad)| grad.clone())
            .ok_or_else(|| argmin::core::Error::msg("augmented Lagrangian not evaluated"))
    }
}

// ─────────────────────────────────────────────────────────────
//  Solver
// ─────────────────────────────────────────────────────────────

/// Augmented Lagrangian outer loop around L-BFGS.
///
/// Solves a sequence of unconstrained inner problems
///
///   min  f(x) + Σ_eq [λh + (μ/2)h²] + Σ_ineq (μ/2)[max(0, λ/μ + h)]²
///
/// where the rows are all constraint rows and all finite variable bounds.
/// After each inner solve
///
///   λ ← λ + μh  (equality),   λ ← max(0, λ + μh)  (inequality)
///   μ ← min(μ_max, α·μ)
///
/// Terminates when the largest violation drops below `constraint_tol`, or
/// when the outer iteration or time budget runs out.
#[derive(Debug, Clone, Default)]
pub struct AugmentedLagrangianSolver {
    pub options: SolverOptions,
}

impl AugmentedLagrangianSolver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    /// One L-BFGS run.  Returns `None` when the backend gives up without a
    /// usable point.
    fn inner_lbfgs(
        &self,
        problem: &mut Problem,
        init_param: Vec<f64>,
        rows: &[AlRow],
        state: &AlState,
    ) -> Result<Option<Vec<f64>>, NlpError> {
        let al_problem = AlProblem {
            problem: RefCell::new(problem),
            rows,
            state,
            last_eval: RefCell::new(None),
        };

        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, self.options.lbfgs_memory)
            .with_tolerance_grad(self.options.gradient_tol)?;

        let executor = Executor::new(al_problem, solver).configure(|config| {
            config
                .param(init_param)
                .max_iters(self.options.max_inner_iterations as u64)
                .target_cost(f64::NEG_INFINITY)
        });

        match executor.run() {
            Ok(result) => {
                debug!(
                    iterations = result.state().get_iter(),
                    reason = ?result.state().get_termination_reason(),
                    "inner L-BFGS finished"
                );
                Ok(result.state().get_best_param().cloned())
            }
            Err(e) => {
                warn!("inner L-BFGS stopped: {e}");
                Ok(None)
            }
        }
    }

    fn out_of_time(&self, start: &Instant) -> bool {
        self.options
            .max_cpu_time
            .is_some_and(|budget| start.elapsed().as_secs_f64() > budget)
    }
}

impl Solver for AugmentedLagrangianSolver {
    fn solve(&self, problem: &mut Problem) -> Result<SolveSummary, NlpError> {
        if problem.constraint_count() == 0 && !problem.has_costs() {
            info!("nothing to optimize: no constraint rows and no costs");
            return Ok(SolveSummary {
                iterations: 0,
                converged: true,
                max_violation: problem.max_violation(),
                cost: 0.0,
            });
        }

        let mut rows = Vec::new();
        rows_from_bounds(&problem.constraint_bounds(), Source::Constraint, &mut rows);
        rows_from_bounds(&problem.variable_bounds(), Source::Variable, &mut rows);

        let mut state = AlState { lambdas: vec![0.0; rows.len()], mu: self.options.mu_init };
        let mut x = problem.variable_values();
        let start = Instant::now();
        let mut iterations = 0usize;
        let mut violation = f64::INFINITY;

        for outer in 0..self.options.max_outer_iterations {
            if let Some(best) = self.inner_lbfgs(problem, x.clone(), &rows, &state)? {
                x = best;
            }
            problem.set_variables(&x)?;
            problem.save_current();
            iterations += 1;

            let h = residuals(&rows, &problem.constraint_values(), &x);
            violation = max_violation(&rows, &h);

            info!(
                "AL outer {}: μ={:.2e}, max_violation={:.4e}, |λ|_max={:.4e}",
                outer + 1,
                state.mu,
                violation,
                state.lambdas.iter().fold(0.0_f64, |m, &v| m.max(v.abs())),
            );

            if violation < self.options.constraint_tol {
                info!("AL converged: constraints satisfied to {:.2e}", violation);
                break;
            }
            if self.out_of_time(&start) {
                warn!("AL stopped: time budget exhausted after {} outer iterations", outer + 1);
                break;
            }

            state.update(&rows, &h);
            state.mu = (state.mu * self.options.mu_factor).min(self.options.mu_max);
        }

        Ok(SolveSummary {
            iterations,
            converged: violation < self.options.constraint_tol,
            max_violation: violation,
            cost: problem.cost_value(),
        })
    }
}
