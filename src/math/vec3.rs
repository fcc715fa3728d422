//! Conversions and small helpers over `nalgebra::Vector3`.
//!
//! Domain types store 3-vectors as plain `[f64; 3]` so they stay trivially
//! serializable; the geometry-heavy code converts at the boundary.

use nalgebra::Vector3;

/// Norm below which a vector is treated as zero.
const TINY_NORM: f64 = 1e-12;

pub fn v3(a: [f64; 3]) -> Vector3<f64> {
    Vector3::new(a[0], a[1], a[2])
}

pub fn arr3(v: Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

/// Normalize to unit length; a (near-)zero vector stays zero rather than
/// turning into NaN. Downstream code treats a zero orientation as a
/// degenerate source.
pub fn unit_or_zero(v: Vector3<f64>) -> Vector3<f64> {
    let n = v.norm();
    if n < TINY_NORM {
        Vector3::zeros()
    } else {
        v / n
    }
}

/// Remove from `v` its component parallel to `axis`.
///
/// Returns `v` unchanged when `axis` is (near-)zero, since there is no
/// well-defined plane to project onto.
pub fn orthogonal_to(v: Vector3<f64>, axis: Vector3<f64>) -> Vector3<f64> {
    let n2 = axis.norm_squared();
    if n2 < TINY_NORM * TINY_NORM {
        return v;
    }
    v - axis * (v.dot(&axis) / n2)
}
