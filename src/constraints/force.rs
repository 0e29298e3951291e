//! Unilateral contact force inside a linearized friction cone.
//!
//! For every stance force node with normal n and tangents t₁, t₂ of the
//! terrain under the foot:
//!
//!   0 ≤ f·n ≤ f_max
//!   f·tᵢ − μ f·n ≤ 0
//!   f·tᵢ + μ f·n ≥ 0          (i = 1, 2)
//!
//! The foot position used for the terrain basis is the stance position of
//! the phase the force node belongs to.

use crate::composite::ConstraintSet;
use crate::models::{HeightMap, TerrainBasis};
use crate::types::{Bound, Dx, Jacobian};
use crate::variables::spline::NodeSpline;
use crate::variables::spline_holder::SplineHolder;
use crate::variables::{VariableId, VariableSet};
use nalgebra::Vector3;
use sprs::TriMat;
use std::sync::Arc;

const ROWS_PER_NODE: usize = 5;

#[derive(Debug, Clone)]
pub struct ForceConstraint {
    name: String,
    leg: usize,
    terrain: Arc<dyn HeightMap>,
    force_limit: f64,
    /// (force node, motion node holding the stance foot position)
    nodes: Vec<(usize, usize)>,
}

impl ForceConstraint {
    pub fn new(
        leg: usize,
        terrain: Arc<dyn HeightMap>,
        force: &NodeSpline,
        motion: &NodeSpline,
        force_limit: f64,
    ) -> Self {
        let nodes = (0..force.nodes().node_count())
            .filter(|&n| !force.nodes().is_constant_node(n))
            .map(|n| (n, motion.first_node_of_phase(force.phase_of_node(n))))
            .collect();
        Self { name: format!("force-{leg}"), leg, terrain, force_limit, nodes }
    }

    /// The five row directions at foot position (x, y).
    fn row_directions(&self, x: f64, y: f64) -> [Vector3<f64>; ROWS_PER_NODE] {
        let mu = self.terrain.friction_coeff();
        let n = self.terrain.basis(TerrainBasis::Normal, x, y);
        let t1 = self.terrain.basis(TerrainBasis::Tangent1, x, y);
        let t2 = self.terrain.basis(TerrainBasis::Tangent2, x, y);
        [n, t1 - n * mu, t1 + n * mu, t2 - n * mu, t2 + n * mu]
    }

    fn row_direction_derivatives(
        &self,
        dim: usize,
        x: f64,
        y: f64,
    ) -> [Vector3<f64>; ROWS_PER_NODE] {
        let mu = self.terrain.friction_coeff();
        let n = self.terrain.basis_derivative(TerrainBasis::Normal, dim, x, y);
        let t1 = self.terrain.basis_derivative(TerrainBasis::Tangent1, dim, x, y);
        let t2 = self.terrain.basis_derivative(TerrainBasis::Tangent2, dim, x, y);
        [n, t1 - n * mu, t1 + n * mu, t2 - n * mu, t2 + n * mu]
    }
}

impl ConstraintSet for ForceConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> usize {
        self.nodes.len() * ROWS_PER_NODE
    }

    fn values(&self, sol: &SplineHolder) -> Vec<f64> {
        let forces = sol.ee_force(self.leg).nodes().nodes();
        let feet = sol.ee_motion(self.leg).nodes().nodes();
        let mut g = Vec::with_capacity(self.rows());
        for &(f_node, m_node) in &self.nodes {
            let f = forces[f_node].p;
            let p = feet[m_node].p;
            g.extend(self.row_directions(p.x, p.y).iter().map(|dir| f.dot(dir)));
        }
        g
    }

    fn bounds(&self) -> Vec<Bound> {
        let per_node = [
            Bound::new(0.0, self.force_limit),
            Bound::upper_only(0.0),
            Bound::lower_only(0.0),
            Bound::upper_only(0.0),
            Bound::lower_only(0.0),
        ];
        per_node.iter().copied().cycle().take(self.rows()).collect()
    }

    fn jacobian(&self, sol: &SplineHolder, var: VariableId) -> Option<Jacobian> {
        let force = sol.ee_force(self.leg).nodes();
        let motion = sol.ee_motion(self.leg).nodes();

        if var == VariableId::EeForce(self.leg) {
            let mut tri = TriMat::new((self.rows(), force.rows()));
            for (i, &(f_node, m_node)) in self.nodes.iter().enumerate() {
                let p = motion.nodes()[m_node].p;
                for (r, dir) in self.row_directions(p.x, p.y).iter().enumerate() {
                    for dim in 0..3 {
                        if let Some(idx) = force.index(f_node, Dx::Pos, dim) {
                            tri.add_triplet(i * ROWS_PER_NODE + r, idx, dir[dim]);
                        }
                    }
                }
            }
            return Some(tri.to_csr());
        }

        if var == VariableId::EeMotion(self.leg) {
            let mut tri = TriMat::new((self.rows(), motion.rows()));
            for (i, &(f_node, m_node)) in self.nodes.iter().enumerate() {
                let f = force.nodes()[f_node].p;
                let p = motion.nodes()[m_node].p;
                for dim in 0..2 {
                    let Some(idx) = motion.index(m_node, Dx::Pos, dim) else {
                        continue;
                    };
                    let d_dirs = self.row_direction_derivatives(dim, p.x, p.y);
                    for (r, d_dir) in d_dirs.iter().enumerate() {
                        let value = f.dot(d_dir);
                        if value != 0.0 {
                            tri.add_triplet(i * ROWS_PER_NODE + r, idx, value);
                        }
                    }
                }
            }
            return Some(tri.to_csr());
        }

        None
    }
}
