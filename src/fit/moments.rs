//! Linear moment solver.
//!
//! With positions and orientations fixed, each source's moment enters the
//! predicted topography linearly, so the best-fit moments come from a
//! joint least-squares solve rather than from the nonlinear search. This
//! keeps the optimizer's space at 6 parameters per dipole instead of 7 and
//! conditions the search much better; the moment is re-derived at every
//! objective evaluation.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_ldl;

/// Relative pivot tolerance for declaring the moment system singular.
pub const TOL_SINGULAR: f64 = 1.0e-4;

/// Outcome of a joint moment solve.
#[derive(Debug, Clone)]
pub struct MomentSolve {
    /// One fitted moment (nAm) per source; all zeros when `ok` is false.
    pub moments: Vec<f64>,
    /// False when the Gram matrix of patterns is (near-)singular: the
    /// sources are not jointly identifiable from this sensor geometry.
    /// Callers must treat that as "no usable fit".
    pub ok: bool,
}

/// Solve for the moments that minimize the squared residual between
/// `Σ moment_k × pattern_k` and `measured`, jointly across all sources.
///
/// For one source this reduces to ordinary least squares,
/// `moment = (pattern·measured) / (pattern·pattern)`; in general the
/// normal equations are solved by LDL' factorization of the pattern Gram
/// matrix.
///
/// # Panics
/// Panics if `patterns` is empty or any pattern length differs from
/// `measured`.
pub fn solve_moments(patterns: &[Vec<f64>], measured: &[f64]) -> MomentSolve {
    let n = patterns.len();
    assert!(n > 0, "solve_moments: no patterns");
    for p in patterns {
        assert_eq!(p.len(), measured.len(), "solve_moments: length mismatch");
    }

    let mut gram = DMatrix::zeros(n, n);
    let mut rhs = DVector::zeros(n);
    for i in 0..n {
        rhs[i] = dot(&patterns[i], measured);
        for k in 0..=i {
            let g = dot(&patterns[i], &patterns[k]);
            gram[(i, k)] = g;
            gram[(k, i)] = g;
        }
    }

    match solve_ldl(&gram, &rhs, TOL_SINGULAR) {
        Some(x) => MomentSolve {
            moments: x.iter().copied().collect(),
            ok: true,
        },
        None => MomentSolve {
            moments: vec![0.0; n],
            ok: false,
        },
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_source_matches_closed_form_ratio() {
        let pattern = vec![1.0, -2.0, 0.5, 3.0];
        let measured = vec![2.5, -4.0, 1.5, 6.5];

        let solve = solve_moments(std::slice::from_ref(&pattern), &measured);
        assert!(solve.ok);

        let num: f64 = pattern.iter().zip(&measured).map(|(p, m)| p * m).sum();
        let den: f64 = pattern.iter().map(|p| p * p).sum();
        assert!((solve.moments[0] - num / den).abs() < 1e-12);
    }

    #[test]
    fn recovers_known_mixture_of_two_patterns() {
        let p1 = vec![1.0, 0.0, 1.0, 2.0];
        let p2 = vec![0.0, 1.0, -1.0, 1.0];
        let measured: Vec<f64> = p1
            .iter()
            .zip(&p2)
            .map(|(a, b)| 3.0 * a - 2.0 * b)
            .collect();

        let solve = solve_moments(&[p1, p2], &measured);
        assert!(solve.ok);
        assert!((solve.moments[0] - 3.0).abs() < 1e-10);
        assert!((solve.moments[1] + 2.0).abs() < 1e-10);
    }

    #[test]
    fn collinear_patterns_fail_with_zero_moments() {
        // Two identical sources: fully collinear patterns.
        let p = vec![1.0, 2.0, 3.0];
        let solve = solve_moments(&[p.clone(), p.clone()], &[1.0, 1.0, 1.0]);
        assert!(!solve.ok);
        assert_eq!(solve.moments, vec![0.0, 0.0]);
        assert!(solve.moments.iter().all(|m| m.is_finite()));
    }

    #[test]
    fn zero_pattern_fails_rather_than_dividing_by_zero() {
        let solve = solve_moments(&[vec![0.0, 0.0, 0.0]], &[1.0, 1.0, 1.0]);
        assert!(!solve.ok);
        assert_eq!(solve.moments, vec![0.0]);
    }
}
