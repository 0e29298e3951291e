//! Cubic Hermite splines over [`NodesVariables`].
//!
//! Polynomial i runs from node i to node i+1 over duration Tᵢ:
//!
//!   p(τ) = p₀ + v₀τ + cτ² + dτ³
//!   c = −(3(p₀ − p₁) + T(2v₀ + v₁)) / T²
//!   d =  (2(p₀ − p₁) + T(v₀ + v₁)) / T³
//!
//! Neighbouring polynomials read the same node, so position and velocity
//! are continuous at every junction.

use super::nodes::{NodesVariables, PhaseNature, DIM};
use super::VariableSet;
use crate::types::{zero_jacobian, Dx, Jacobian, State};
use nalgebra::Vector3;
use sprs::TriMat;

/// Lower bound on a polynomial's duration, so the Hermite coefficients stay
/// finite for any phase durations the optimizer tries.
const MIN_POLY_DURATION: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct NodeSpline {
    nodes: NodesVariables,
    poly_durations: Vec<f64>,
    constant_polys: Vec<bool>,
    /// Polynomials per phase; empty for splines not tied to a gait.
    polys_per_phase: Vec<usize>,
}

impl NodeSpline {
    /// Spline with fully free nodes and the given polynomial durations.
    pub fn with_durations(poly_durations: Vec<f64>) -> Self {
        let n_polys = poly_durations.len();
        Self {
            nodes: NodesVariables::all_free(n_polys + 1),
            constant_polys: vec![false; n_polys],
            poly_durations,
            polys_per_phase: Vec::new(),
        }
    }

    /// Spline following a gait.  Phases alternate between constant and free,
    /// starting with a constant phase if `first_phase_constant`.  Constant
    /// phases use one polynomial, free phases `polys_per_free_phase`.
    pub fn phase_based(
        nature: PhaseNature,
        phase_durations: &[f64],
        first_phase_constant: bool,
        polys_per_free_phase: usize,
    ) -> Self {
        let mut constant_polys = Vec::new();
        let mut polys_per_phase = Vec::with_capacity(phase_durations.len());
        for phase in 0..phase_durations.len() {
            let constant = first_phase_constant == (phase % 2 == 0);
            let n = if constant { 1 } else { polys_per_free_phase };
            polys_per_phase.push(n);
            constant_polys.extend(std::iter::repeat(constant).take(n));
        }
        let mut spline = Self {
            nodes: NodesVariables::phase_based(&constant_polys, nature),
            poly_durations: Vec::new(),
            constant_polys,
            polys_per_phase,
        };
        spline.update_phase_durations(phase_durations);
        spline
    }

    /// Re-time the polynomials after a change of phase durations.
    pub fn update_phase_durations(&mut self, phase_durations: &[f64]) {
        self.poly_durations.clear();
        for (&duration, &n) in phase_durations.iter().zip(&self.polys_per_phase) {
            let each = (duration / n as f64).max(MIN_POLY_DURATION);
            self.poly_durations.extend(std::iter::repeat(each).take(n));
        }
    }

    pub fn nodes(&self) -> &NodesVariables {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut NodesVariables {
        &mut self.nodes
    }

    pub fn poly_durations(&self) -> &[f64] {
        &self.poly_durations
    }

    pub fn polys_per_phase(&self) -> &[usize] {
        &self.polys_per_phase
    }

    pub fn total_duration(&self) -> f64 {
        self.poly_durations.iter().sum()
    }

    /// Phase containing polynomial `poly`.
    pub fn phase_of_poly(&self, poly: usize) -> usize {
        let mut first = 0;
        for (phase, &n) in self.polys_per_phase.iter().enumerate() {
            if poly < first + n {
                return phase;
            }
            first += n;
        }
        self.polys_per_phase.len().saturating_sub(1)
    }

    /// Phase a node belongs to; the final node belongs to the last phase.
    pub fn phase_of_node(&self, node: usize) -> usize {
        let last_poly = self.poly_durations.len().saturating_sub(1);
        self.phase_of_poly(node.min(last_poly))
    }

    /// First node of `phase`.
    pub fn first_node_of_phase(&self, phase: usize) -> usize {
        self.polys_per_phase.iter().take(phase).sum()
    }

    /// Polynomial containing `t` and the local time inside it.
    /// `t` is clamped to [0, T]; a junction belongs to the earlier polynomial.
    pub fn segment(&self, t: f64) -> (usize, f64) {
        let t = t.max(0.0).min(self.total_duration());
        let last = self.poly_durations.len() - 1;
        let mut t_start = 0.0;
        for (i, &d) in self.poly_durations.iter().enumerate() {
            if t <= t_start + d || i == last {
                return (i, (t - t_start).max(0.0).min(d));
            }
            t_start += d;
        }
        (last, self.poly_durations[last])
    }

    pub fn is_constant_phase(&self, t: f64) -> bool {
        self.constant_polys[self.segment(t).0]
    }

    /// Position, velocity and acceleration at global time `t`.
    pub fn point(&self, t: f64) -> State {
        let (poly, tau) = self.segment(t);
        let (p0, v0, p1, v1) = self.endpoints(poly);
        let (c, d) = hermite_coefficients(&p0, &v0, &p1, &v1, self.poly_durations[poly]);
        State {
            p: p0 + v0 * tau + c * tau.powi(2) + d * tau.powi(3),
            v: v0 + c * (2.0 * tau) + d * (3.0 * tau.powi(2)),
            a: c * 2.0 + d * (6.0 * tau),
        }
    }

    fn endpoints(&self, poly: usize) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let n = self.nodes.nodes();
        (n[poly].p, n[poly].v, n[poly + 1].p, n[poly + 1].v)
    }

    /// ∂(p, v or a)(t)/∂x, 3 × n_vars.
    pub fn jacobian_wrt_nodes(&self, t: f64, dx: Dx) -> Jacobian {
        let (poly, tau) = self.segment(t);
        let weights = hermite_node_weights(tau, self.poly_durations[poly], dx);
        let node_values = [
            (poly, Dx::Pos),
            (poly, Dx::Vel),
            (poly + 1, Dx::Pos),
            (poly + 1, Dx::Vel),
        ];

        let mut tri = TriMat::new((DIM, self.nodes.rows()));
        for ((node, deriv), w) in node_values.into_iter().zip(weights) {
            if w == 0.0 {
                continue;
            }
            for dim in 0..DIM {
                if let Some(idx) = self.nodes.index(node, deriv, dim) {
                    tri.add_triplet(dim, idx, w);
                }
            }
        }
        tri.to_csr()
    }

    /// ∂p(t)/∂(phase durations), 3 × n_phases.
    ///
    /// Stretching an earlier polynomial delays the current one, giving −v.
    /// Stretching the current one at fixed local time changes its shape.
    /// Each phase duration is split evenly over its polynomials.
    pub fn jacobian_wrt_durations(&self, t: f64) -> Jacobian {
        let n_phases = self.polys_per_phase.len();
        if n_phases == 0 {
            return zero_jacobian(DIM, 0);
        }
        let (poly, tau) = self.segment(t);
        let (p0, v0, p1, v1) = self.endpoints(poly);
        let big_t = self.poly_durations[poly];
        let (c, d) = hermite_coefficients(&p0, &v0, &p1, &v1, big_t);
        let vel = v0 + c * (2.0 * tau) + d * (3.0 * tau.powi(2));

        let dp = p0 - p1;
        let dc_dt = dp * (6.0 / big_t.powi(3)) + (v0 * 2.0 + v1) / big_t.powi(2);
        let dd_dt = dp * (-6.0 / big_t.powi(4)) - (v0 + v1) * (2.0 / big_t.powi(3));
        let d_current = dc_dt * tau.powi(2) + dd_dt * tau.powi(3);

        let mut per_phase = vec![Vector3::zeros(); n_phases];
        for j in 0..=poly {
            let phase = self.phase_of_poly(j);
            let share = 1.0 / self.polys_per_phase[phase] as f64;
            let dj = if j == poly { d_current } else { -vel };
            per_phase[phase] += dj * share;
        }

        let mut tri = TriMat::new((DIM, n_phases));
        for (phase, col) in per_phase.iter().enumerate() {
            for dim in 0..DIM {
                if col[dim] != 0.0 {
                    tri.add_triplet(dim, phase, col[dim]);
                }
            }
        }
        tri.to_csr()
    }
}

fn hermite_coefficients(
    p0: &Vector3<f64>,
    v0: &Vector3<f64>,
    p1: &Vector3<f64>,
    v1: &Vector3<f64>,
    big_t: f64,
) -> (Vector3<f64>, Vector3<f64>) {
    let dp = p0 - p1;
    let c = -(dp * 3.0 + (v0 * 2.0 + v1) * big_t) / big_t.powi(2);
    let d = (dp * 2.0 + (v0 + v1) * big_t) / big_t.powi(3);
    (c, d)
}

/// Weights of (p₀, v₀, p₁, v₁) in the derivative `dx` at local time τ.
pub(crate) fn hermite_node_weights(tau: f64, big_t: f64, dx: Dx) -> [f64; 4] {
    let (t, t2, t3) = (tau, tau * tau, tau * tau * tau);
    let (tt, tt2, tt3) = (big_t, big_t * big_t, big_t * big_t * big_t);
    match dx {
        Dx::Pos => [
            1.0 - 3.0 * t2 / tt2 + 2.0 * t3 / tt3,
            t - 2.0 * t2 / tt + t3 / tt2,
            3.0 * t2 / tt2 - 2.0 * t3 / tt3,
            -t2 / tt + t3 / tt2,
        ],
        Dx::Vel => [
            -6.0 * t / tt2 + 6.0 * t2 / tt3,
            1.0 - 4.0 * t / tt + 3.0 * t2 / tt2,
            6.0 * t / tt2 - 6.0 * t2 / tt3,
            -2.0 * t / tt + 3.0 * t2 / tt2,
        ],
        Dx::Acc => [
            -6.0 / tt2 + 12.0 * t / tt3,
            -4.0 / tt + 6.0 * t / tt2,
            6.0 / tt2 - 12.0 * t / tt3,
            -2.0 / tt + 6.0 * t / tt2,
        ],
    }
}
