//! Derivative-free Nelder–Mead simplex minimizer.
//!
//! The dipole objective is cheap but noisy in shape (a forward model plus a
//! linear solve per evaluation), and no analytic gradient is available, so
//! the search is the classic downhill simplex with standard coefficients:
//!
//! - reflection 1.0, expansion 2.0, contraction 0.5, shrink 0.5
//!
//! Two details matter for this domain:
//!
//! - **Per-parameter initial steps.** Position coordinates (cm) and
//!   orientation components live on scales an order of magnitude apart;
//!   the initial simplex is built by displacing one parameter per vertex by
//!   its own step.
//! - **Local refinement only.** Termination is the relative best/worst
//!   spread of the simplex falling below `tolerance`, or the iteration
//!   budget. There is no global-optimality guarantee; callers restart from
//!   the previous optimum to refine.

/// Guard against division by zero in the relative-spread test.
const TINY: f64 = 1e-30;

/// Result of one simplex run.
#[derive(Debug, Clone)]
pub struct SimplexOutcome {
    /// Best parameter vector found.
    pub params: Vec<f64>,
    /// Objective value at `params`.
    pub value: f64,
    /// Main-loop iterations consumed.
    pub iterations: usize,
}

/// Minimize `objective` starting from `start`.
///
/// `steps` supplies the per-parameter displacement used to build the
/// initial simplex.
///
/// # Panics
/// Panics if `start` is empty or `steps.len() != start.len()`. Callers own
/// parameter-vector layout and must size these consistently.
pub fn minimize<F>(
    mut objective: F,
    start: &[f64],
    steps: &[f64],
    max_iterations: usize,
    tolerance: f64,
) -> SimplexOutcome
where
    F: FnMut(&[f64]) -> f64,
{
    let n = start.len();
    assert!(n > 0, "simplex: empty parameter vector");
    assert_eq!(steps.len(), n, "simplex: steps length must match parameters");

    // n+1 vertices: the start point plus one per-parameter displacement.
    let mut vertices: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    vertices.push(start.to_vec());
    for i in 0..n {
        let mut v = start.to_vec();
        v[i] += steps[i];
        vertices.push(v);
    }
    let mut values: Vec<f64> = vertices.iter().map(|v| objective(v)).collect();

    let mut iterations = 0;
    while iterations < max_iterations {
        // Order: lo = best, hi = worst, nh = second worst.
        let (mut lo, mut hi) = (0, 0);
        for i in 1..=n {
            if values[i] < values[lo] {
                lo = i;
            }
            if values[i] > values[hi] {
                hi = i;
            }
        }
        let mut nh = lo;
        for i in 0..=n {
            if i != hi && values[i] > values[nh] {
                nh = i;
            }
        }

        let spread = 2.0 * (values[hi] - values[lo]).abs()
            / (values[hi].abs() + values[lo].abs() + TINY);
        if spread < tolerance {
            break;
        }
        iterations += 1;

        // Centroid of all vertices except the worst.
        let mut centroid = vec![0.0; n];
        for (i, v) in vertices.iter().enumerate() {
            if i == hi {
                continue;
            }
            for (c, x) in centroid.iter_mut().zip(v.iter()) {
                *c += x;
            }
        }
        for c in centroid.iter_mut() {
            *c /= n as f64;
        }

        // Reflect the worst vertex through the centroid.
        let reflected = combine(&centroid, &vertices[hi], 2.0, -1.0);
        let f_reflected = objective(&reflected);

        if f_reflected < values[lo] {
            // Try expanding further along the same direction.
            let expanded = combine(&centroid, &vertices[hi], 3.0, -2.0);
            let f_expanded = objective(&expanded);
            if f_expanded < f_reflected {
                vertices[hi] = expanded;
                values[hi] = f_expanded;
            } else {
                vertices[hi] = reflected;
                values[hi] = f_reflected;
            }
        } else if f_reflected < values[nh] {
            vertices[hi] = reflected;
            values[hi] = f_reflected;
        } else {
            // Contract toward the centroid from whichever of worst /
            // reflected is better.
            let (base, f_base) = if f_reflected < values[hi] {
                (&reflected, f_reflected)
            } else {
                (&vertices[hi], values[hi])
            };
            let contracted = combine(&centroid, base, 0.5, 0.5);
            let f_contracted = objective(&contracted);
            if f_contracted < f_base {
                vertices[hi] = contracted;
                values[hi] = f_contracted;
            } else {
                // Shrink everything toward the best vertex.
                let best = vertices[lo].clone();
                for (i, v) in vertices.iter_mut().enumerate() {
                    if i == lo {
                        continue;
                    }
                    for (x, b) in v.iter_mut().zip(best.iter()) {
                        *x = b + 0.5 * (*x - b);
                    }
                    values[i] = objective(v);
                }
            }
        }
    }

    let mut lo = 0;
    for i in 1..=n {
        if values[i] < values[lo] {
            lo = i;
        }
    }
    SimplexOutcome {
        params: vertices[lo].clone(),
        value: values[lo],
        iterations,
    }
}

/// `wa * a + wb * b`, elementwise.
fn combine(a: &[f64], b: &[f64], wa: f64, wb: f64) -> Vec<f64> {
    a.iter().zip(b.iter()).map(|(x, y)| wa * x + wb * y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_minimum_of_shifted_quadratic() {
        let out = minimize(
            |p| (p[0] - 3.0).powi(2) + (p[1] + 1.0).powi(2),
            &[5.0, 5.0],
            &[1.0, 1.0],
            500,
            1e-12,
        );
        assert!((out.params[0] - 3.0).abs() < 1e-4);
        assert!((out.params[1] + 1.0).abs() < 1e-4);
        assert!(out.value < 1e-7);
    }

    #[test]
    fn respects_iteration_budget() {
        let out = minimize(
            |p| p.iter().map(|x| x * x).sum(),
            &[10.0, 10.0, 10.0],
            &[1.0, 1.0, 1.0],
            5,
            0.0,
        );
        assert!(out.iterations <= 5);
    }

    #[test]
    fn anisotropic_steps_handle_mixed_scales() {
        // x lives on a ~100 scale, y on a ~0.1 scale.
        let out = minimize(
            |p| ((p[0] - 120.0) / 100.0).powi(2) + ((p[1] - 0.3) * 10.0).powi(2),
            &[80.0, 0.1],
            &[20.0, 0.05],
            800,
            1e-12,
        );
        assert!((out.params[0] - 120.0).abs() < 0.1);
        assert!((out.params[1] - 0.3).abs() < 1e-3);
    }

    #[test]
    fn restarting_from_previous_optimum_refines() {
        let f = |p: &[f64]| (p[0] - 3.0).powi(2) + (p[1] + 1.0).powi(2);
        let first = minimize(f, &[5.0, 5.0], &[1.0, 1.0], 40, 1e-6);
        let second = minimize(f, &first.params, &[1.0, 1.0], 200, 1e-12);
        assert!(second.value <= first.value + 1e-15);
        assert!((second.params[0] - 3.0).abs() < 1e-4);
    }
}
