//! Field kernels: current dipole in a conducting sphere (Sarvas) and the
//! free-space magnetic dipole.
//!
//! Both kernels work in SI units (positions in metres, dipole strength in
//! A·m for a current dipole, A·m² for a magnetic dipole) and return tesla.
//! Callers are responsible for the cm → m and nAm → A·m conversions.

use nalgebra::Vector3;

/// `μ0 / 4π` in SI.
const MU0_OVER_4PI: f64 = 1e-7;

/// Squared-denominator guard: below this the field point is effectively on
/// top of the source (or the sphere origin) and the field is returned as
/// zero instead of blowing up.
const TINY_DENOM: f64 = 1e-40;

/// Magnetic field of a current dipole `q` (A·m) at position `r_q` inside a
/// homogeneous conducting sphere, observed at `r`. Both positions are
/// relative to the sphere origin.
///
/// Sarvas' closed-form solution for the quasi-static regime:
///
/// ```text
/// F    = a (r a + r² − r_q·r)         with a = r − r_q
/// ∇F   = (a²/r + a·r/a + 2a + 2r) r − (a + 2r + a·r/a) r_q
/// B(r) = μ0/(4π F²) · (F (q × r_q) − (q × r_q · r) ∇F)
/// ```
///
/// A dipole oriented along its own radius vector has `q × r_q = 0` and
/// produces no external field; this is the radial degeneracy the tangential
/// constraint removes from the search space.
pub fn sarvas_field(r_q: Vector3<f64>, q: Vector3<f64>, r: Vector3<f64>) -> Vector3<f64> {
    let a_vec = r - r_q;
    let a = a_vec.norm();
    let r_n = r.norm();
    let ar = a_vec.dot(&r);

    let f = a * (r_n * a + r_n * r_n - r_q.dot(&r));
    if f * f < TINY_DENOM || a < 1e-20 || r_n < 1e-20 {
        return Vector3::zeros();
    }

    let grad_f = r * (a * a / r_n + ar / a + 2.0 * a + 2.0 * r_n)
        - r_q * (a + 2.0 * r_n + ar / a);

    let q_x_rq = q.cross(&r_q);
    (q_x_rq * f - grad_f * q_x_rq.dot(&r)) * (MU0_OVER_4PI / (f * f))
}

/// Free-space field of a magnetic dipole `m` (A·m²) at displacement `rel`
/// from the source to the field point:
///
/// ```text
/// B = μ0/(4π) · (3 r̂ (m·r̂) − m) / |rel|³
/// ```
pub fn magnetic_dipole_field(m: Vector3<f64>, rel: Vector3<f64>) -> Vector3<f64> {
    let d = rel.norm();
    if d * d * d < TINY_DENOM {
        return Vector3::zeros();
    }
    let r_hat = rel / d;
    (r_hat * (3.0 * m.dot(&r_hat)) - m) * (MU0_OVER_4PI / (d * d * d))
}
