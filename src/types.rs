use crate::euler::euler_xyz_from_quaternion;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use sprs::CsMat;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────
//  Error types
// ─────────────────────────────────────────────────────────────

/// Unified error type for all fallible operations in the crate.
///
/// Errors are produced while building a problem, registering blocks,
/// sampling a trajectory or driving a solver.  Once a
/// [`Problem`](crate::composite::Problem) exists, evaluating its values,
/// bounds and derivatives cannot fail.
#[derive(Debug, Error)]
pub enum NlpError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The solver backend returned an error it could not recover from.
    #[error("solver error: {0}")]
    Solver(String),

    /// A block asked for a variable set that is not part of the problem.
    #[error("unknown variable set: {0}")]
    UnknownVariableSet(String),

    #[error("no constraint or cost block named {0}")]
    UnknownBlock(String),

    #[error("iterate {index} requested, only {count} recorded")]
    NoSuchIterate { index: usize, count: usize },

    /// Shape mismatch in input data.
    #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
    Dimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

impl From<argmin::core::Error> for NlpError {
    fn from(e: argmin::core::Error) -> Self {
        Self::Solver(e.to_string())
    }
}

/// Problems detected while validating [`Parameters`](crate::params::Parameters).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("phase durations of leg {leg} sum to {sum}, expected total duration {total}")]
    DurationMismatch { leg: usize, sum: f64, total: f64 },

    #[error("unknown constraint: {0}")]
    UnknownConstraint(String),

    #[error("unknown cost: {0}")]
    UnknownCost(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("leg count mismatch: robot has {robot} legs, {field} describes {got}")]
    LegCount {
        field: &'static str,
        robot: usize,
        got: usize,
    },
}

/// Per-query inverse-kinematics failure.  Never aborts a build or a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KinematicsError {
    #[error("foot position unreachable for leg {leg}")]
    Infeasible { leg: usize },

    #[error("leg {leg} does not exist")]
    UnknownLeg { leg: usize },
}

// ─────────────────────────────────────────────────────────────
//  Constants
// ─────────────────────────────────────────────────────────────

/// Gravitational acceleration used for the initial force guess.
pub const GRAVITY: f64 = 9.80665;

/// Slack used when comparing accumulated durations against a total.
pub const DURATION_TOLERANCE: f64 = 1e-8;

// ─────────────────────────────────────────────────────────────
//  Bounds
// ─────────────────────────────────────────────────────────────

/// Lower/upper bound on a single scalar row.  ±∞ marks a missing side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub const NO_BOUND: Bound = Bound {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };
    pub const ZERO: Bound = Bound { lower: 0.0, upper: 0.0 };

    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub const fn equality(value: f64) -> Self {
        Self { lower: value, upper: value }
    }

    pub const fn lower_only(lower: f64) -> Self {
        Self { lower, upper: f64::INFINITY }
    }

    pub const fn upper_only(upper: f64) -> Self {
        Self { lower: f64::NEG_INFINITY, upper }
    }

    pub fn is_equality(&self) -> bool {
        self.lower == self.upper
    }

    /// Amount by which `value` lies outside the bound (0 when inside).
    pub fn violation(&self, value: f64) -> f64 {
        (self.lower - value).max(value - self.upper).max(0.0)
    }
}

// ─────────────────────────────────────────────────────────────
//  Derivative orders and evaluated states
// ─────────────────────────────────────────────────────────────

/// Derivative order of a spline quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dx {
    Pos,
    Vel,
    Acc,
}

impl Dx {
    /// Row offset of this order inside a node (nodes hold pos and vel only).
    pub const fn node_slot(self) -> usize {
        match self {
            Dx::Pos => 0,
            Dx::Vel => 1,
            Dx::Acc => 2,
        }
    }
}

/// Position and its first two time derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    pub p: Vector3<f64>,
    pub v: Vector3<f64>,
    pub a: Vector3<f64>,
}

impl State {
    pub fn at(&self, dx: Dx) -> &Vector3<f64> {
        match dx {
            Dx::Pos => &self.p,
            Dx::Vel => &self.v,
            Dx::Acc => &self.a,
        }
    }
}

/// Base pose used for the start and goal of a motion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseState {
    /// Linear position and velocity in world frame.
    pub lin: State,
    /// Euler angles (roll, pitch, yaw) about x, y, z and their rates.
    pub ang: State,
}

impl BaseState {
    /// Base at rest at `position` with `orientation`, the angles taken in
    /// canonical form so the spline starts from a unique triple.
    pub fn from_pose(position: Vector3<f64>, orientation: &UnitQuaternion<f64>, tol: f64) -> Self {
        let mut base = Self::default();
        base.lin.p = position;
        base.ang.p = euler_xyz_from_quaternion(orientation, tol);
        base
    }
}

// ─────────────────────────────────────────────────────────────
//  Sparse derivative blocks
// ─────────────────────────────────────────────────────────────

/// Sparse derivative of a block's rows with respect to one variable set.
/// Row-major (CSR).
pub type Jacobian = CsMat<f64>;

/// Empty `rows × cols` derivative.
pub fn zero_jacobian(rows: usize, cols: usize) -> Jacobian {
    CsMat::zero((rows, cols))
}

/// Dense 3×3 matrix times a sparse 3×n derivative, kept sparse.
pub fn mat3_times(m: &nalgebra::Matrix3<f64>, jac: &Jacobian) -> Jacobian {
    let mut tri = sprs::TriMat::new((3, jac.cols()));
    for (&value, (row, col)) in jac.iter() {
        for r in 0..3 {
            let coeff = m[(r, row)];
            if coeff != 0.0 {
                tri.add_triplet(r, col, coeff * value);
            }
        }
    }
    tri.to_csr()
}
