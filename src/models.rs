//! Read-only collaborators: robot kinematics/dynamics, terrain, inverse kinematics.

use crate::types::KinematicsError;
use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

// ─────────────────────────────────────────────────────────────
//  Robot model
// ─────────────────────────────────────────────────────────────

/// Cartesian reachability of each foot, expressed in the base frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicModel {
    /// Nominal foot position per leg in base frame.
    pub nominal_stance_b: Vec<Vector3<f64>>,
    /// Half-extent of the reachable box around the nominal stance, per leg.
    pub max_deviation: Vec<Vector3<f64>>,
}

impl KinematicModel {
    pub fn leg_count(&self) -> usize {
        self.nominal_stance_b.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotModel {
    pub kinematics: KinematicModel,
    /// Body mass in kg.
    pub mass: f64,
}

impl RobotModel {
    pub fn leg_count(&self) -> usize {
        self.kinematics.leg_count()
    }

    /// Single leg hopper.
    pub fn monoped() -> Self {
        Self {
            kinematics: KinematicModel {
                nominal_stance_b: vec![Vector3::new(0.0, 0.0, -0.58)],
                max_deviation: vec![Vector3::new(0.25, 0.15, 0.2)],
            },
            mass: 20.0,
        }
    }

    /// Two point-feet, left then right.
    pub fn biped() -> Self {
        let dev = Vector3::new(0.25, 0.15, 0.15);
        Self {
            kinematics: KinematicModel {
                nominal_stance_b: vec![
                    Vector3::new(0.0, 0.2, -0.65),
                    Vector3::new(0.0, -0.2, -0.65),
                ],
                max_deviation: vec![dev, dev],
            },
            mass: 20.0,
        }
    }

    /// HyQ-sized quadruped; legs ordered LF, RF, LH, RH.
    pub fn quadruped() -> Self {
        let (x, y, z) = (0.31, 0.29, -0.58);
        let dev = Vector3::new(0.25, 0.20, 0.10);
        Self {
            kinematics: KinematicModel {
                nominal_stance_b: vec![
                    Vector3::new(x, y, z),
                    Vector3::new(x, -y, z),
                    Vector3::new(-x, y, z),
                    Vector3::new(-x, -y, z),
                ],
                max_deviation: vec![dev; 4],
            },
            mass: 83.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Terrain
// ─────────────────────────────────────────────────────────────

/// Direction selector for the terrain's local basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainBasis {
    Normal,
    Tangent1,
    Tangent2,
}

/// Terrain queried as a height field z = h(x, y).
///
/// Implement `height` and `height_gradient`; the normalized basis and its
/// derivatives have defaults that are exact whenever the gradient is
/// constant (flat or planar terrain).  Curved terrains override
/// `basis_derivative`.
pub trait HeightMap: Debug + Send + Sync {
    fn height(&self, x: f64, y: f64) -> f64;

    /// (∂h/∂x, ∂h/∂y).
    fn height_gradient(&self, x: f64, y: f64) -> (f64, f64);

    fn friction_coeff(&self) -> f64;

    /// Unit vector of the requested basis direction at (x, y).
    fn basis(&self, which: TerrainBasis, x: f64, y: f64) -> Vector3<f64> {
        let (hx, hy) = self.height_gradient(x, y);
        let v = match which {
            TerrainBasis::Normal => Vector3::new(-hx, -hy, 1.0),
            TerrainBasis::Tangent1 => Vector3::new(1.0, 0.0, hx),
            TerrainBasis::Tangent2 => Vector3::new(0.0, 1.0, hy),
        };
        v.normalize()
    }

    /// ∂basis/∂x (dim 0) or ∂basis/∂y (dim 1).
    fn basis_derivative(
        &self,
        _which: TerrainBasis,
        _dim: usize,
        _x: f64,
        _y: f64,
    ) -> Vector3<f64> {
        Vector3::zeros()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatGround {
    pub height: f64,
    pub friction: f64,
}

impl FlatGround {
    /// Ground at the mean height of the given footholds.
    pub fn at_foothold_height(footholds: &[Vector3<f64>], friction: f64) -> Self {
        let height = if footholds.is_empty() {
            0.0
        } else {
            footholds.iter().map(|p| p.z).sum::<f64>() / footholds.len() as f64
        };
        Self { height, friction }
    }
}

impl Default for FlatGround {
    fn default() -> Self {
        Self { height: 0.0, friction: 0.5 }
    }
}

impl HeightMap for FlatGround {
    fn height(&self, _x: f64, _y: f64) -> f64 {
        self.height
    }

    fn height_gradient(&self, _x: f64, _y: f64) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn friction_coeff(&self) -> f64 {
        self.friction
    }
}

/// Flat ground up to `x_start`, then a constant incline along x.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slope {
    pub x_start: f64,
    pub slope: f64,
    pub friction: f64,
}

impl HeightMap for Slope {
    fn height(&self, x: f64, _y: f64) -> f64 {
        if x < self.x_start {
            0.0
        } else {
            self.slope * (x - self.x_start)
        }
    }

    fn height_gradient(&self, x: f64, _y: f64) -> (f64, f64) {
        if x < self.x_start {
            (0.0, 0.0)
        } else {
            (self.slope, 0.0)
        }
    }

    fn friction_coeff(&self) -> f64 {
        self.friction
    }
}

// ─────────────────────────────────────────────────────────────
//  Inverse kinematics
// ─────────────────────────────────────────────────────────────

pub type JointAngles = DVector<f64>;

/// Per-robot inverse kinematics.  Concrete geometries live outside this crate.
pub trait InverseKinematics: Debug {
    /// Joint angles placing `leg`'s foot at `pos_b` (base frame).
    fn joint_angles(
        &self,
        pos_b: &Vector3<f64>,
        leg: usize,
    ) -> Result<JointAngles, KinematicsError>;

    fn upper_joint_limits(&self, leg: usize) -> JointAngles;

    fn lower_joint_limits(&self, leg: usize) -> JointAngles;
}
