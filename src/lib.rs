//! **legged_nlp**: NLP formulation engine for legged-robot trajectory
//! optimization.
//!
//! A motion is described by splines for the base position and orientation,
//! per-leg foot motion and contact force splines shaped by a contact
//! schedule, and optionally the schedule's phase durations themselves.
//!
//! 1. **Variables** (`variables`): Hermite node splines, phase durations,
//!    contact loads, all owned by a `SplineHolder`.
//! 2. **Composite problem** (`composite`): flat variable / constraint / cost
//!    views with sparse Jacobians.
//! 3. **Constraints** (`constraints`) and **costs** (`costs`) with
//!    closed-form derivatives.
//! 4. **Assembly** (`nlp_factory`) from `Parameters`, robot and terrain.
//! 5. **Solver** (`optimizer`): augmented Lagrangian around L-BFGS via `argmin`.
//! 6. **Extraction** (`trajectory`, `euler`): sampled robot states with
//!    normalized attitude.

pub mod composite;
pub mod constraints;
pub mod costs;
pub mod euler;
pub mod models;
pub mod nlp_factory;
pub mod optimizer;
pub mod params;
pub mod trajectory;
pub mod types;
pub mod variables;

pub use composite::{ConstraintSet, Problem};
pub use nlp_factory::NlpFactory;
pub use optimizer::{AugmentedLagrangianSolver, SolveSummary, Solver, SolverOptions};
pub use params::Parameters;
pub use types::{ConfigError, KinematicsError, NlpError};
