//! Foot height relative to the terrain at every foot-position node.
//!
//! Stance nodes sit exactly on the ground; swing nodes stay between the
//! ground and `max_swing_height` above it.

use crate::composite::ConstraintSet;
use crate::models::HeightMap;
use crate::types::{Bound, Dx, Jacobian};
use crate::variables::nodes::NodesVariables;
use crate::variables::spline_holder::SplineHolder;
use crate::variables::{VariableId, VariableSet};
use sprs::TriMat;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TerrainConstraint {
    name: String,
    leg: usize,
    terrain: Arc<dyn HeightMap>,
    max_swing_height: f64,
    node_ids: Vec<usize>,
    stance: Vec<bool>,
}

impl TerrainConstraint {
    /// One row per distinct foot-position variable of `motion`.
    pub fn new(
        leg: usize,
        terrain: Arc<dyn HeightMap>,
        motion: &NodesVariables,
        max_swing_height: f64,
    ) -> Self {
        let node_ids = motion.nodes_with_own_position();
        let stance = node_ids.iter().map(|&n| motion.is_constant_node(n)).collect();
        Self {
            name: format!("terrain-{leg}"),
            leg,
            terrain,
            max_swing_height,
            node_ids,
            stance,
        }
    }
}

impl ConstraintSet for TerrainConstraint {
    fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> usize {
        self.node_ids.len()
    }

    fn values(&self, sol: &SplineHolder) -> Vec<f64> {
        let nodes = sol.ee_motion(self.leg).nodes().nodes();
        self.node_ids
            .iter()
            .map(|&n| {
                let p = nodes[n].p;
                p.z - self.terrain.height(p.x, p.y)
            })
            .collect()
    }

    fn bounds(&self) -> Vec<Bound> {
        self.stance
            .iter()
            .map(|&stance| {
                if stance {
                    Bound::ZERO
                } else {
                    Bound::new(0.0, self.max_swing_height)
                }
            })
            .collect()
    }

    fn jacobian(&self, sol: &SplineHolder, var: VariableId) -> Option<Jacobian> {
        if var != VariableId::EeMotion(self.leg) {
            return None;
        }
        let motion = sol.ee_motion(self.leg).nodes();
        let mut tri = TriMat::new((self.rows(), motion.rows()));
        for (row, &n) in self.node_ids.iter().enumerate() {
            let p = motion.nodes()[n].p;
            let (hx, hy) = self.terrain.height_gradient(p.x, p.y);
            for (dim, coeff) in [(0, -hx), (1, -hy), (2, 1.0)] {
                if coeff == 0.0 {
                    continue;
                }
                if let Some(idx) = motion.index(n, Dx::Pos, dim) {
                    tri.add_triplet(row, idx, coeff);
                }
            }
        }
        Some(tri.to_csr())
    }
}
