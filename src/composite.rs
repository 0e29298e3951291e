//! The NLP as seen by a solver: flat variable vector, stacked constraint
//! rows with one global sparse Jacobian, and a summed scalar cost.
//!
//! Each group (variables, constraints, costs) is laid out by a
//! [`Partition`]: block sizes are collected first, offsets are computed
//! from them in a second pass.  Adding a block re-runs both passes, so the
//! layout only depends on the registration order.

use crate::types::{zero_jacobian, Bound, Jacobian, NlpError};
use crate::variables::spline_holder::SplineHolder;
use crate::variables::VariableId;
use sprs::TriMat;
use std::fmt::Debug;
use tracing::debug;

// ─────────────────────────────────────────────────────────────
//  Block capability
// ─────────────────────────────────────────────────────────────

/// A named group of constraint rows, or a cost (one row, no bounds).
///
/// Blocks read the solution only through the holder and report their
/// derivative with respect to one variable set at a time.
pub trait ConstraintSet: Debug {
    fn name(&self) -> &str;

    fn rows(&self) -> usize;

    fn values(&self, sol: &SplineHolder) -> Vec<f64>;

    fn bounds(&self) -> Vec<Bound>;

    /// rows × n_var(var) derivative, or `None` if the block does not
    /// depend on `var`.
    fn jacobian(&self, sol: &SplineHolder, var: VariableId) -> Option<Jacobian>;

    /// Dimension checks that must pass before the block is first evaluated.
    fn check_dimensions(&self, _sol: &SplineHolder) -> Result<(), NlpError> {
        Ok(())
    }
}

/// Evaluate `block` once and compare its value and Jacobian shapes against
/// its row count and the sizes of the variable sets `ids`.
fn check_block(
    block: &dyn ConstraintSet,
    holder: &SplineHolder,
    ids: &[VariableId],
) -> Result<(), NlpError> {
    block.check_dimensions(holder)?;
    let rows = block.rows();
    let lengths = [
        ("block values", block.values(holder).len()),
        ("block bounds", block.bounds().len()),
    ];
    for (what, got) in lengths {
        if got != rows {
            return Err(NlpError::Dimension { what, expected: rows, got });
        }
    }
    for &id in ids {
        let cols = holder.variables(id).map_or(0, |v| v.rows());
        let Some(jac) = block.jacobian(holder, id) else {
            continue;
        };
        for (what, expected, got) in [
            ("block jacobian rows", rows, jac.rows()),
            ("block jacobian columns", cols, jac.cols()),
        ] {
            if got != expected {
                return Err(NlpError::Dimension { what, expected, got });
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────
//  Partition
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub offset: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    blocks: Vec<Block>,
    total: usize,
}

impl Partition {
    pub fn from_sizes<I>(sizes: I) -> Self
    where
        I: IntoIterator<Item = (String, usize)>,
    {
        let sized: Vec<(String, usize)> = sizes.into_iter().collect();
        let mut blocks = Vec::with_capacity(sized.len());
        let mut offset = 0;
        for (name, rows) in sized {
            blocks.push(Block { name, offset, rows });
            offset += rows;
        }
        Self { blocks, total: offset }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn find(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

// ─────────────────────────────────────────────────────────────
//  Problem
// ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Problem {
    holder: SplineHolder,
    variables: Vec<VariableId>,
    constraints: Vec<Box<dyn ConstraintSet>>,
    costs: Vec<Box<dyn ConstraintSet>>,
    variable_partition: Partition,
    constraint_partition: Partition,
    cost_partition: Partition,
    iterates: Vec<Vec<f64>>,
}

impl Problem {
    pub fn new(holder: SplineHolder) -> Self {
        Self {
            holder,
            variables: Vec::new(),
            constraints: Vec::new(),
            costs: Vec::new(),
            variable_partition: Partition::default(),
            constraint_partition: Partition::default(),
            cost_partition: Partition::default(),
            iterates: Vec::new(),
        }
    }

    // ── registration ─────────────────────────────────────────

    /// Expose a held variable set to the solver.  Registering twice is a no-op.
    /// Blocks added earlier are checked against the new set's size.
    pub fn add_variable_set(&mut self, id: VariableId) -> Result<(), NlpError> {
        if !self.holder.contains(id) {
            return Err(NlpError::UnknownVariableSet(id.name()));
        }
        if self.variables.contains(&id) {
            return Ok(());
        }
        for block in self.constraints.iter().chain(&self.costs) {
            check_block(block.as_ref(), &self.holder, &[id])?;
        }
        self.variables.push(id);
        self.repartition_variables();
        Ok(())
    }

    /// Register a constraint block.  Its values, bounds and Jacobians must
    /// match its row count and the registered variable sets.
    pub fn add_constraint_set(&mut self, block: Box<dyn ConstraintSet>) -> Result<(), NlpError> {
        check_block(block.as_ref(), &self.holder, &self.variables)?;
        self.constraints.push(block);
        self.constraint_partition = partition_of(&self.constraints);
        Ok(())
    }

    /// Register a cost: a one-row block.
    pub fn add_cost_set(&mut self, block: Box<dyn ConstraintSet>) -> Result<(), NlpError> {
        if block.rows() != 1 {
            return Err(NlpError::Dimension { what: "cost rows", expected: 1, got: block.rows() });
        }
        check_block(block.as_ref(), &self.holder, &self.variables)?;
        self.costs.push(block);
        self.cost_partition = partition_of(&self.costs);
        Ok(())
    }

    fn repartition_variables(&mut self) {
        let holder = &self.holder;
        self.variable_partition = Partition::from_sizes(self.variables.iter().map(|&id| {
            let rows = holder.variables(id).map_or(0, |v| v.rows());
            (id.name(), rows)
        }));
    }

    // ── accessors ────────────────────────────────────────────

    pub fn solution(&self) -> &SplineHolder {
        &self.holder
    }

    pub fn variable_ids(&self) -> &[VariableId] {
        &self.variables
    }

    pub fn variable_partition(&self) -> &Partition {
        &self.variable_partition
    }

    pub fn constraint_partition(&self) -> &Partition {
        &self.constraint_partition
    }

    pub fn cost_partition(&self) -> &Partition {
        &self.cost_partition
    }

    pub fn variable_count(&self) -> usize {
        self.variable_partition.total()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraint_partition.total()
    }

    pub fn has_costs(&self) -> bool {
        !self.costs.is_empty()
    }

    // ── variables ────────────────────────────────────────────

    pub fn variable_values(&self) -> Vec<f64> {
        let mut x = Vec::with_capacity(self.variable_count());
        for &id in &self.variables {
            if let Some(vars) = self.holder.variables(id) {
                x.extend(vars.values());
            }
        }
        x
    }

    pub fn variable_bounds(&self) -> Vec<Bound> {
        let mut b = Vec::with_capacity(self.variable_count());
        for &id in &self.variables {
            if let Some(vars) = self.holder.variables(id) {
                b.extend(vars.bounds());
            }
        }
        b
    }

    /// Distribute `x` over the registered variable sets.
    pub fn set_variables(&mut self, x: &[f64]) -> Result<(), NlpError> {
        if x.len() != self.variable_count() {
            return Err(NlpError::Dimension {
                what: "variable vector",
                expected: self.variable_count(),
                got: x.len(),
            });
        }
        for (id, block) in self.variables.iter().zip(self.variable_partition.blocks()) {
            self.holder.set_values(*id, &x[block.offset..block.offset + block.rows]);
        }
        Ok(())
    }

    // ── constraints ──────────────────────────────────────────

    pub fn constraint_values(&self) -> Vec<f64> {
        let mut g = Vec::with_capacity(self.constraint_count());
        for c in &self.constraints {
            g.extend(c.values(&self.holder));
        }
        g
    }

    pub fn constraint_bounds(&self) -> Vec<Bound> {
        let mut b = Vec::with_capacity(self.constraint_count());
        for c in &self.constraints {
            b.extend(c.bounds());
        }
        b
    }

    /// Stacked n_constraints × n_variables Jacobian (CSR).
    pub fn constraint_jacobian(&self) -> Jacobian {
        let mut tri = TriMat::new((self.constraint_count(), self.variable_count()));
        for (c, row_block) in self.constraints.iter().zip(self.constraint_partition.blocks()) {
            for (&id, col_block) in self.variables.iter().zip(self.variable_partition.blocks()) {
                if let Some(jac) = c.jacobian(&self.holder, id) {
                    for (&value, (r, col)) in jac.iter() {
                        tri.add_triplet(row_block.offset + r, col_block.offset + col, value);
                    }
                }
            }
        }
        tri.to_csr()
    }

    /// Largest bound violation over all constraint rows and variables.
    pub fn max_violation(&self) -> f64 {
        let rows = self
            .constraint_values()
            .iter()
            .zip(self.constraint_bounds())
            .map(|(&g, b)| b.violation(g))
            .fold(0.0_f64, f64::max);
        self.variable_values()
            .iter()
            .zip(self.variable_bounds())
            .map(|(&x, b)| b.violation(x))
            .fold(rows, f64::max)
    }

    // ── costs ────────────────────────────────────────────────

    pub fn cost_value(&self) -> f64 {
        self.costs.iter().map(|c| c.values(&self.holder).first().copied().unwrap_or(0.0)).sum()
    }

    /// Dense gradient of the summed cost, one entry per variable.
    pub fn cost_gradient(&self) -> Vec<f64> {
        let mut grad = vec![0.0; self.variable_count()];
        for c in &self.costs {
            for (&id, block) in self.variables.iter().zip(self.variable_partition.blocks()) {
                if let Some(jac) = c.jacobian(&self.holder, id) {
                    for (&value, (_, col)) in jac.iter() {
                        grad[block.offset + col] += value;
                    }
                }
            }
        }
        grad
    }

    /// Block-local derivative of the constraint or cost `block_name` with
    /// respect to variable set `var`.
    pub fn fill_derivative(&self, block_name: &str, var: VariableId) -> Result<Jacobian, NlpError> {
        let block = self
            .constraints
            .iter()
            .chain(&self.costs)
            .find(|c| c.name() == block_name)
            .ok_or_else(|| NlpError::UnknownBlock(block_name.to_string()))?;
        let cols = self
            .holder
            .variables(var)
            .ok_or_else(|| NlpError::UnknownVariableSet(var.name()))?
            .rows();
        Ok(block
            .jacobian(&self.holder, var)
            .unwrap_or_else(|| zero_jacobian(block.rows(), cols)))
    }

    // ── iterates ─────────────────────────────────────────────

    /// Record the current variable vector as an iterate.
    pub fn save_current(&mut self) {
        self.iterates.push(self.variable_values());
        debug!(iteration = self.iterates.len(), "saved iterate");
    }

    pub fn iteration_count(&self) -> usize {
        self.iterates.len()
    }

    pub fn iterate(&self, index: usize) -> Option<&[f64]> {
        self.iterates.get(index).map(Vec::as_slice)
    }

    /// Restore a recorded iterate into the holder.
    pub fn set_iterate(&mut self, index: usize) -> Result<(), NlpError> {
        let x = self
            .iterates
            .get(index)
            .cloned()
            .ok_or(NlpError::NoSuchIterate { index, count: self.iterates.len() })?;
        self.set_variables(&x)
    }
}

fn partition_of(blocks: &[Box<dyn ConstraintSet>]) -> Partition {
    Partition::from_sizes(blocks.iter().map(|b| (b.name().to_string(), b.rows())))
}
