//! Euler-angle utilities for the base orientation.
//!
//! The base angular spline stores (roll, pitch, yaw) = (x, y, z) and the
//! rotation from base to world frame is R = Rz(z) · Ry(y) · Rx(x).
//! Attitude normalization operates on the same rotation written as a
//! Z-Y-X triple (yaw, pitch, roll).

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use std::f64::consts::{FRAC_PI_2, PI};

// ─────────────────────────────────────────────────────────────
//  Attitude normalization
// ─────────────────────────────────────────────────────────────

/// Wrap an angle into [−π, π).
#[inline]
pub fn wrap_angle(a: f64) -> f64 {
    if (-PI..PI).contains(&a) {
        return a;
    }
    let wrapped = a - 2.0 * PI * ((a + PI) / (2.0 * PI)).floor();
    if wrapped >= PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Returns the canonical representative of a Z-Y-X Euler triple
/// `(yaw, pitch, roll)`.
///
/// Output ranges: yaw and roll in [−π, π), pitch in [−π/2, π/2].
/// Within `tol` of pitch = ±π/2 yaw and roll describe the same axis, so roll
/// is folded into yaw and set to zero.  Applying the function twice gives the
/// same result as applying it once.
pub fn normalize_euler_zyx(zyx: Vector3<f64>, tol: f64) -> Vector3<f64> {
    let mut yaw = wrap_angle(zyx.x);
    let mut pitch = wrap_angle(zyx.y);
    let mut roll = wrap_angle(zyx.z);

    // (yaw, pitch, roll) and (yaw ± π, ±π − pitch, roll ± π) are the same rotation.
    if pitch.abs() > FRAC_PI_2 {
        yaw = if yaw < 0.0 { yaw + PI } else { yaw - PI };
        pitch = if pitch > 0.0 { PI - pitch } else { -PI - pitch };
        roll = if roll < 0.0 { roll + PI } else { roll - PI };
    }

    // At pitch = +π/2 the rotation only depends on yaw − roll, at −π/2 on yaw + roll.
    if pitch >= FRAC_PI_2 - tol {
        yaw = wrap_angle(yaw - roll);
        roll = 0.0;
    } else if pitch <= -FRAC_PI_2 + tol {
        yaw = wrap_angle(yaw + roll);
        roll = 0.0;
    }

    Vector3::new(yaw, pitch, roll)
}

/// Z-Y-X triple (yaw, pitch, roll) from the spline's (roll, pitch, yaw).
#[inline]
pub fn xyz_to_zyx(xyz: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(xyz.z, xyz.y, xyz.x)
}

// ─────────────────────────────────────────────────────────────
//  Rotation matrices
// ─────────────────────────────────────────────────────────────

fn rot_x(a: f64) -> Matrix3<f64> {
    let (s, c) = a.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

fn rot_y(a: f64) -> Matrix3<f64> {
    let (s, c) = a.sin_cos();
    Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

fn rot_z(a: f64) -> Matrix3<f64> {
    let (s, c) = a.sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

fn d_rot_x(a: f64) -> Matrix3<f64> {
    let (s, c) = a.sin_cos();
    Matrix3::new(0.0, 0.0, 0.0, 0.0, -s, -c, 0.0, c, -s)
}

fn d_rot_y(a: f64) -> Matrix3<f64> {
    let (s, c) = a.sin_cos();
    Matrix3::new(-s, 0.0, c, 0.0, 0.0, 0.0, -c, 0.0, -s)
}

fn d_rot_z(a: f64) -> Matrix3<f64> {
    let (s, c) = a.sin_cos();
    Matrix3::new(-s, -c, 0.0, c, -s, 0.0, 0.0, 0.0, 0.0)
}

/// R = Rz(z) · Ry(y) · Rx(x), mapping base-frame vectors to world frame.
pub fn rotation_base_to_world(xyz: &Vector3<f64>) -> Matrix3<f64> {
    rot_z(xyz.z) * rot_y(xyz.y) * rot_x(xyz.x)
}

/// ∂R/∂xyz[dim].
pub fn rotation_derivative(xyz: &Vector3<f64>, dim: usize) -> Matrix3<f64> {
    match dim {
        0 => rot_z(xyz.z) * rot_y(xyz.y) * d_rot_x(xyz.x),
        1 => rot_z(xyz.z) * d_rot_y(xyz.y) * rot_x(xyz.x),
        _ => d_rot_z(xyz.z) * rot_y(xyz.y) * rot_x(xyz.x),
    }
}

/// ∂(Rᵀ v)/∂xyz, column j being (∂R/∂xyz[j])ᵀ v.
pub fn derivative_of_rotated_vector(xyz: &Vector3<f64>, v: &Vector3<f64>) -> Matrix3<f64> {
    let mut m = Matrix3::zeros();
    for j in 0..3 {
        m.set_column(j, &(rotation_derivative(xyz, j).transpose() * v));
    }
    m
}

pub fn quaternion_base_to_world(xyz: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(xyz.x, xyz.y, xyz.z)
}

/// Canonical spline angles (roll, pitch, yaw) of an orientation.
pub fn euler_xyz_from_quaternion(q: &UnitQuaternion<f64>, tol: f64) -> Vector3<f64> {
    let (roll, pitch, yaw) = q.euler_angles();
    let zyx = normalize_euler_zyx(Vector3::new(yaw, pitch, roll), tol);
    Vector3::new(zyx.z, zyx.y, zyx.x)
}

// ─────────────────────────────────────────────────────────────
//  Euler rates → angular velocity / acceleration
// ─────────────────────────────────────────────────────────────

/// Maps Euler rates (ẋ, ẏ, ż) to angular velocity in world frame.
fn rate_matrix(xyz: &Vector3<f64>) -> Matrix3<f64> {
    let (sy, cy) = xyz.y.sin_cos();
    let (sz, cz) = xyz.z.sin_cos();
    Matrix3::new(cy * cz, -sz, 0.0, cy * sz, cz, 0.0, -sy, 0.0, 1.0)
}

fn rate_matrix_dot(xyz: &Vector3<f64>, xyz_d: &Vector3<f64>) -> Matrix3<f64> {
    let (sy, cy) = xyz.y.sin_cos();
    let (sz, cz) = xyz.z.sin_cos();
    let (yd, zd) = (xyz_d.y, xyz_d.z);
    Matrix3::new(
        -sy * yd * cz - cy * sz * zd,
        -cz * zd,
        0.0,
        -sy * yd * sz + cy * cz * zd,
        -sz * zd,
        0.0,
        -cy * yd,
        0.0,
        0.0,
    )
}

pub fn angular_velocity_in_world(xyz: &Vector3<f64>, xyz_d: &Vector3<f64>) -> Vector3<f64> {
    rate_matrix(xyz) * xyz_d
}

pub fn angular_acceleration_in_world(
    xyz: &Vector3<f64>,
    xyz_d: &Vector3<f64>,
    xyz_dd: &Vector3<f64>,
) -> Vector3<f64> {
    rate_matrix_dot(xyz, xyz_d) * xyz_d + rate_matrix(xyz) * xyz_dd
}
