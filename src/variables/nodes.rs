//! Spline knots and the map from optimization variables to knot values.
//!
//! A node holds a 3-D position and velocity.  Not every node value is free:
//!
//! * a motion spline keeps the foot fixed during stance, so the two nodes of
//!   a stance polynomial share one position variable and have zero velocity;
//! * a force spline is zero during swing, so those nodes carry no variables.
//!
//! `index_to_nodes[i]` lists every node value driven by variable `i`.
//! Node values that no variable drives stay at their constant value.

use super::VariableSet;
use crate::types::{Bound, Dx};
use nalgebra::Vector3;

/// Number of node values per derivative order (x, y, z).
pub const DIM: usize = 3;

/// Node value slots per node: position and velocity, three dims each.
const VALUES_PER_NODE: usize = 2 * DIM;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Node {
    pub p: Vector3<f64>,
    pub v: Vector3<f64>,
}

impl Node {
    fn value(&self, deriv: Dx) -> &Vector3<f64> {
        match deriv {
            Dx::Pos => &self.p,
            _ => &self.v,
        }
    }

    fn value_mut(&mut self, deriv: Dx) -> &mut Vector3<f64> {
        match deriv {
            Dx::Pos => &mut self.p,
            _ => &mut self.v,
        }
    }
}

/// One scalar node value: which node, which derivative, which dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeValueInfo {
    pub node: usize,
    pub deriv: Dx,
    pub dim: usize,
}

impl NodeValueInfo {
    pub const fn new(node: usize, deriv: Dx, dim: usize) -> Self {
        Self { node, deriv, dim }
    }

    fn slot(&self) -> usize {
        self.node * VALUES_PER_NODE + self.deriv.node_slot() * DIM + self.dim
    }
}

/// What a phase-based spline describes, which decides how its constant
/// phases are parameterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseNature {
    /// Foot position; constant phases are stance.
    Motion,
    /// Contact force; constant phases are swing.
    Force,
}

#[derive(Debug, Clone)]
pub struct NodesVariables {
    nodes: Vec<Node>,
    index_to_nodes: Vec<Vec<NodeValueInfo>>,
    node_to_index: Vec<Option<usize>>,
    bounds: Vec<Bound>,
    constant_nodes: Vec<bool>,
}

impl NodesVariables {
    /// Every position and velocity of every node is a variable.
    pub fn all_free(n_nodes: usize) -> Self {
        let mut index_to_nodes = Vec::with_capacity(n_nodes * VALUES_PER_NODE);
        for node in 0..n_nodes {
            for deriv in [Dx::Pos, Dx::Vel] {
                for dim in 0..DIM {
                    index_to_nodes.push(vec![NodeValueInfo::new(node, deriv, dim)]);
                }
            }
        }
        Self::from_index_map(n_nodes, index_to_nodes, vec![false; n_nodes])
    }

    /// Layout for a spline whose polynomials alternate between constant and
    /// free phases.  `constant_polys[i]` marks polynomial i as constant.
    pub fn phase_based(constant_polys: &[bool], nature: PhaseNature) -> Self {
        let n_polys = constant_polys.len();
        let n_nodes = n_polys + 1;
        let constant_nodes: Vec<bool> = (0..n_nodes)
            .map(|n| (n > 0 && constant_polys[n - 1]) || (n < n_polys && constant_polys[n]))
            .collect();

        let mut index_to_nodes = Vec::new();
        let mut node = 0;
        while node < n_nodes {
            if !constant_nodes[node] {
                for deriv in [Dx::Pos, Dx::Vel] {
                    for dim in 0..DIM {
                        index_to_nodes.push(vec![NodeValueInfo::new(node, deriv, dim)]);
                    }
                }
                node += 1;
                continue;
            }

            // Constant nodes come in pairs around a single constant polynomial.
            if nature == PhaseNature::Motion {
                for dim in 0..DIM {
                    let mut shared = vec![NodeValueInfo::new(node, Dx::Pos, dim)];
                    if node + 1 < n_nodes {
                        shared.push(NodeValueInfo::new(node + 1, Dx::Pos, dim));
                    }
                    index_to_nodes.push(shared);
                }
            }
            node += 2;
        }

        Self::from_index_map(n_nodes, index_to_nodes, constant_nodes)
    }

    fn from_index_map(
        n_nodes: usize,
        index_to_nodes: Vec<Vec<NodeValueInfo>>,
        constant_nodes: Vec<bool>,
    ) -> Self {
        let mut node_to_index = vec![None; n_nodes * VALUES_PER_NODE];
        for (idx, infos) in index_to_nodes.iter().enumerate() {
            for info in infos {
                node_to_index[info.slot()] = Some(idx);
            }
        }
        let bounds = vec![Bound::NO_BOUND; index_to_nodes.len()];
        Self {
            nodes: vec![Node::default(); n_nodes],
            index_to_nodes,
            node_to_index,
            bounds,
            constant_nodes,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Variable index driving the given node value, if any.
    pub fn index(&self, node: usize, deriv: Dx, dim: usize) -> Option<usize> {
        self.node_to_index
            .get(NodeValueInfo::new(node, deriv, dim).slot())
            .copied()
            .flatten()
    }

    pub fn node_values_of(&self, idx: usize) -> &[NodeValueInfo] {
        &self.index_to_nodes[idx]
    }

    /// True when the node touches a constant polynomial.
    pub fn is_constant_node(&self, node: usize) -> bool {
        self.constant_nodes[node]
    }

    /// Nodes whose position is a variable, one per distinct variable.
    pub fn nodes_with_own_position(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&n| {
                let own = self.index(n, Dx::Pos, 2);
                own.is_some() && (n == 0 || self.index(n - 1, Dx::Pos, 2) != own)
            })
            .collect()
    }

    /// Write initial values through the variable map so shared node values
    /// stay identical and constant values stay untouched.
    pub fn init_values<F>(&mut self, value: F)
    where
        F: Fn(usize, Dx) -> Vector3<f64>,
    {
        let x: Vec<f64> = self
            .index_to_nodes
            .iter()
            .map(|infos| {
                let first = infos[0];
                value(first.node, first.deriv)[first.dim]
            })
            .collect();
        self.set_values(&x);
    }

    /// Fix the given dims of node `node` at `value`.
    pub fn add_bound(&mut self, node: usize, deriv: Dx, dims: &[usize], value: &Vector3<f64>) {
        for &dim in dims {
            if let Some(idx) = self.index(node, deriv, dim) {
                self.bounds[idx] = Bound::equality(value[dim]);
            }
        }
    }

    pub fn add_start_bound(&mut self, deriv: Dx, dims: &[usize], value: &Vector3<f64>) {
        self.add_bound(0, deriv, dims, value);
    }

    pub fn add_final_bound(&mut self, deriv: Dx, dims: &[usize], value: &Vector3<f64>) {
        let last = self.nodes.len() - 1;
        self.add_bound(last, deriv, dims, value);
    }
}

impl VariableSet for NodesVariables {
    fn rows(&self) -> usize {
        self.index_to_nodes.len()
    }

    fn values(&self) -> Vec<f64> {
        self.index_to_nodes
            .iter()
            .map(|infos| {
                let first = infos[0];
                self.nodes[first.node].value(first.deriv)[first.dim]
            })
            .collect()
    }

    fn set_values(&mut self, x: &[f64]) {
        for (infos, &value) in self.index_to_nodes.iter().zip(x) {
            for info in infos {
                self.nodes[info.node].value_mut(info.deriv)[info.dim] = value;
            }
        }
    }

    fn bounds(&self) -> Vec<Bound> {
        self.bounds.clone()
    }
}
