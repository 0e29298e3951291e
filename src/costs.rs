//! Quadratic costs on a single variable set.
//!
//! Every cost has the form
//!
//!   J(x) = w (xᵀ M x + vᵀ x),     ∇J = w (2 M x + v)
//!
//! with M symmetric.  Costs plug into the problem as one-row blocks without
//! bounds; their Jacobian row is the gradient.

use crate::composite::ConstraintSet;
use crate::types::{Bound, Dx, Jacobian, NlpError};
use crate::variables::nodes::NodesVariables;
use crate::variables::spline::{hermite_node_weights, NodeSpline};
use crate::variables::spline_holder::SplineHolder;
use crate::variables::{VariableId, VariableSet};
use ndarray::{Array1, Array2, ArrayView1};
use sprs::TriMat;

// ─────────────────────────────────────────────────────────────
//  Quadratic cost block
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct QuadraticCost {
    name: String,
    var: VariableId,
    m: Array2<f64>,
    v: Array1<f64>,
    weight: f64,
}

impl QuadraticCost {
    /// A square M is symmetrized; the value of xᵀMx is unchanged by that.
    /// Shapes are checked against the variable set when the cost is
    /// registered with a problem.
    pub fn new(
        name: impl Into<String>,
        var: VariableId,
        m: Array2<f64>,
        v: Array1<f64>,
        weight: f64,
    ) -> Self {
        let m = if m.is_square() { (&m + &m.t()) * 0.5 } else { m };
        Self { name: name.into(), var, m, v, weight }
    }

    pub fn variable(&self) -> VariableId {
        self.var
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// J(x) for an explicit value vector.
    pub fn cost_at(&self, x: &[f64]) -> f64 {
        let x = ArrayView1::from(x);
        self.weight * (x.dot(&self.m.dot(&x)) + self.v.dot(&x))
    }

    /// ∇J(x) for an explicit value vector.
    pub fn gradient_at(&self, x: &[f64]) -> Vec<f64> {
        let x = ArrayView1::from(x);
        let grad = (self.m.dot(&x) * 2.0 + &self.v) * self.weight;
        grad.to_vec()
    }

    fn current(&self, sol: &SplineHolder) -> Option<Vec<f64>> {
        sol.variables(self.var).map(|vars| vars.values())
    }
}

impl ConstraintSet for QuadraticCost {
    fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> usize {
        1
    }

    fn values(&self, sol: &SplineHolder) -> Vec<f64> {
        vec![self.current(sol).map_or(0.0, |x| self.cost_at(&x))]
    }

    fn bounds(&self) -> Vec<Bound> {
        vec![Bound::NO_BOUND]
    }

    fn jacobian(&self, sol: &SplineHolder, var: VariableId) -> Option<Jacobian> {
        if var != self.var {
            return None;
        }
        let x = self.current(sol)?;
        let grad = self.gradient_at(&x);
        let mut tri = TriMat::new((1, grad.len()));
        for (i, &g) in grad.iter().enumerate() {
            if g != 0.0 {
                tri.add_triplet(0, i, g);
            }
        }
        Some(tri.to_csr())
    }

    fn check_dimensions(&self, sol: &SplineHolder) -> Result<(), NlpError> {
        let n = sol
            .variables(self.var)
            .ok_or_else(|| NlpError::UnknownVariableSet(self.var.name()))?
            .rows();
        let (rows, cols) = self.m.dim();
        let lengths = [
            ("cost matrix rows", rows),
            ("cost matrix columns", cols),
            ("cost vector", self.v.len()),
        ];
        for (what, got) in lengths {
            if got != n {
                return Err(NlpError::Dimension { what, expected: n, got });
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
//  Builders
// ─────────────────────────────────────────────────────────────

/// ∫₀ᵀ ‖a(t)‖² dt of a spline, exact for cubic Hermite segments.
///
/// On a segment a(τ) = α + βτ with α, β linear in the segment's node values
/// z = (p₀, v₀, p₁, v₁).  Writing α = aᵀz, β = bᵀz,
///
///   ∫₀ᵀ (α + βτ)² dτ = zᵀ (T aaᵀ + T²/2 (abᵀ + baᵀ) + T³/3 bbᵀ) z
///
/// Node values without a variable are zero in every layout and drop out.
pub fn acceleration_cost(
    name: &str,
    var: VariableId,
    spline: &NodeSpline,
    weight: f64,
) -> QuadraticCost {
    let nodes = spline.nodes();
    let n = nodes.rows();
    let mut m = Array2::<f64>::zeros((n, n));

    for (poly, &big_t) in spline.poly_durations().iter().enumerate() {
        let a = hermite_node_weights(0.0, big_t, Dx::Acc);
        let a_end = hermite_node_weights(big_t, big_t, Dx::Acc);
        let b: Vec<f64> = a.iter().zip(&a_end).map(|(s, e)| (e - s) / big_t).collect();

        let mut local = [[0.0; 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                local[i][j] = big_t * a[i] * a[j]
                    + big_t.powi(2) / 2.0 * (a[i] * b[j] + b[i] * a[j])
                    + big_t.powi(3) / 3.0 * b[i] * b[j];
            }
        }

        let slots = [(poly, Dx::Pos), (poly, Dx::Vel), (poly + 1, Dx::Pos), (poly + 1, Dx::Vel)];
        for dim in 0..3 {
            let idx: Vec<Option<usize>> =
                slots.iter().map(|&(node, d)| nodes.index(node, d, dim)).collect();
            for i in 0..4 {
                for j in 0..4 {
                    if let (Some(r), Some(c)) = (idx[i], idx[j]) {
                        m[[r, c]] += local[i][j];
                    }
                }
            }
        }
    }

    QuadraticCost::new(name, var, m, Array1::zeros(n), weight)
}

/// Σ of the squared node values of order `deriv` in the given dims.
pub fn node_cost(
    name: &str,
    var: VariableId,
    nodes: &NodesVariables,
    deriv: Dx,
    dims: &[usize],
    weight: f64,
) -> QuadraticCost {
    let n = nodes.rows();
    let mut m = Array2::<f64>::zeros((n, n));
    for idx in 0..n {
        let hit = nodes
            .node_values_of(idx)
            .iter()
            .any(|info| info.deriv == deriv && dims.contains(&info.dim));
        if hit {
            m[[idx, idx]] = 1.0;
        }
    }
    QuadraticCost::new(name, var, m, Array1::zeros(n), weight)
}
