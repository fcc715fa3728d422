//! Symmetric LDL' factorization and solve.
//!
//! The multi-source moment fit leads to normal equations `G m = b` where `G`
//! is the (symmetric, positive-semidefinite) Gram matrix of forward
//! patterns. We solve by in-place LDL' factorization rather than forming an
//! explicit inverse.
//!
//! Singularity policy: the rejection thresholds are fixed **before**
//! factorization as `diag_i × tol`, and any pivot at or below its threshold
//! aborts the solve. A near-singular Gram matrix means two or more sources
//! produce (near-)collinear field patterns and are not jointly identifiable
//! from the sensor geometry; callers must treat the failure as "no usable
//! fit", not as a small-but-valid answer.

use nalgebra::{DMatrix, DVector};

/// Solve `a * x = b` for a symmetric positive-semidefinite `a`.
///
/// Only the lower triangle of `a` is read. Returns `None` when a pivot
/// falls at or below `diag_i × tol` with `diag_i` the pre-factorization
/// diagonal.
///
/// # Panics
/// Panics if `a` is not square or `b` length does not match.
pub fn solve_ldl(a: &DMatrix<f64>, b: &DVector<f64>, tol: f64) -> Option<DVector<f64>> {
    let n = a.nrows();
    assert_eq!(a.ncols(), n, "solve_ldl: matrix must be square");
    assert_eq!(b.len(), n, "solve_ldl: rhs length must match");

    // Pivot rejection thresholds from the pre-factorization diagonal.
    let thresholds: Vec<f64> = (0..n).map(|i| a[(i, i)] * tol).collect();

    // In-place factorization: after step i, column i below the diagonal
    // holds L, and the diagonal holds D.
    let mut m = a.clone_owned();
    for i in 0..n {
        let d = m[(i, i)];
        if !d.is_finite() || d <= thresholds[i] {
            return None;
        }
        for j in (i + 1)..n {
            let sum = m[(j, i)];
            m[(j, i)] = sum / d;
            for k in (i + 1)..=j {
                m[(j, k)] -= sum * m[(k, i)];
            }
        }
    }

    // Forward substitution: y = L^{-1} b.
    let mut x = b.clone_owned();
    for i in 0..n {
        for k in 0..i {
            let t = m[(i, k)] * x[k];
            x[i] -= t;
        }
    }
    // Scale by D^{-1}.
    for i in 0..n {
        x[i] /= m[(i, i)];
    }
    // Back substitution: x = L'^{-1} y.
    for i in (0..n).rev() {
        for k in (i + 1)..n {
            let t = m[(k, i)] * x[k];
            x[i] -= t;
        }
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}
