//! Fit controller: validation, restart passes, polarity normalization and
//! result assembly.
//!
//! One call to [`fit_dipoles`] runs to completion on the calling thread.
//! All per-fit buffers (parameter vector, patterns, Gram matrix) are local
//! to the invocation; the sensor array is read-only throughout.

use crate::domain::{
    Dipole, FitOptions, FitResult, PassStats, SphereModel, StartGuess, MAX_DIPOLES,
};
use crate::error::AppError;
use crate::fit::moments::solve_moments;
use crate::fit::objective::{FitContext, PARAMS_PER_DIPOLE};
use crate::forward::ForwardModel;
use crate::math::simplex;
use crate::sensor::SensorArray;

/// Initial simplex displacement for position coordinates (cm).
const POSITION_STEP_CM: f64 = 2.0;

/// Initial simplex displacement for orientation components. Small
/// orientation perturbations are effective when the start guess is close;
/// large position perturbations are not, hence the order-of-magnitude gap.
const ORIENTATION_STEP: f64 = 0.2;

/// Fit one or more equivalent current dipoles to a measured topography.
///
/// `measured` carries one value (tesla) per active sensor channel, i.e.
/// per channel that survives `options.exclude_channels`, in array order.
///
/// Non-convergence is not an error: a pass that exhausts its iteration
/// budget still yields a result, with the achieved percent error
/// indicating the fit quality.
pub fn fit_dipoles(
    array: &SensorArray,
    measured: &[f64],
    start: &StartGuess,
    sphere: SphereModel,
    options: &FitOptions,
) -> Result<FitResult, AppError> {
    validate_options(options)?;

    let num_dipoles = start.num_dipoles();
    if num_dipoles == 0 {
        return Err(AppError::input("At least one dipole is required."));
    }
    if num_dipoles > MAX_DIPOLES {
        return Err(AppError::input(format!(
            "Maximum number of dipoles exceeded ({num_dipoles} > {MAX_DIPOLES})."
        )));
    }
    if start.orientations.len() != num_dipoles {
        return Err(AppError::input(format!(
            "Start guess has {} positions but {} orientations.",
            num_dipoles,
            start.orientations.len()
        )));
    }
    for v in start
        .positions
        .iter()
        .chain(start.orientations.iter())
        .flatten()
    {
        if !v.is_finite() {
            return Err(AppError::input("Start parameters contain non-finite values."));
        }
    }

    let forward = ForwardModel::new(
        array,
        sphere,
        &options.exclude_channels,
        options.magnetic_only,
        options.dewar_coords,
    )?;
    let ctx = FitContext::new(
        forward,
        sphere,
        measured.to_vec(),
        num_dipoles,
        options.magnetic_only,
    )?;

    // Flat parameter vector [x, y, z, ox, oy, oz] per dipole, with the
    // per-parameter step schedule alongside.
    let mut params = Vec::with_capacity(num_dipoles * PARAMS_PER_DIPOLE);
    let mut steps = Vec::with_capacity(num_dipoles * PARAMS_PER_DIPOLE);
    for k in 0..num_dipoles {
        params.extend_from_slice(&start.positions[k]);
        params.extend_from_slice(&start.orientations[k]);
        steps.extend_from_slice(&[
            POSITION_STEP_CM,
            POSITION_STEP_CM,
            POSITION_STEP_CM,
            ORIENTATION_STEP,
            ORIENTATION_STEP,
            ORIENTATION_STEP,
        ]);
    }

    let initial_error = ctx.percent_error(&params);

    // Restart passes: each pass re-seeds the simplex at the previous
    // optimum with the same step schedule. This refines convergence; it is
    // not a mechanism for escaping distinct local minima.
    let mut passes = Vec::with_capacity(options.max_passes);
    for _ in 0..options.max_passes {
        let outcome = simplex::minimize(
            |p| ctx.percent_error(p),
            &params,
            &steps,
            options.max_iterations,
            options.tolerance,
        );
        params = outcome.params;
        passes.push(PassStats {
            iterations: outcome.iterations,
            error: outcome.value,
        });
    }

    Ok(assemble_result(&ctx, &params, initial_error, passes))
}

fn validate_options(options: &FitOptions) -> Result<(), AppError> {
    if options.max_passes == 0 {
        return Err(AppError::input("Number of passes must be >= 1."));
    }
    if options.max_iterations == 0 {
        return Err(AppError::input("Iteration budget must be >= 1."));
    }
    if !(options.tolerance.is_finite() && options.tolerance > 0.0) {
        return Err(AppError::input(format!(
            "Tolerance must be finite and > 0, got {}.",
            options.tolerance
        )));
    }
    Ok(())
}

/// Recompute patterns and moments at the converged parameters, normalize
/// polarity, and build the immutable result.
fn assemble_result(
    ctx: &FitContext<'_>,
    params: &[f64],
    initial_error: f64,
    passes: Vec<PassStats>,
) -> FitResult {
    let num_dipoles = ctx.num_dipoles();

    let mut dipoles: Vec<Dipole> = (0..num_dipoles)
        .map(|k| ctx.constrained_dipole(params, k))
        .collect();

    // A degenerate final configuration keeps zero moments and a flat
    // prediction; the 100% error tells the caller nothing usable came out.
    let patterns = ctx.unit_patterns(params).unwrap_or_else(|_| {
        vec![vec![0.0; ctx.measured().len()]; num_dipoles]
    });
    let solve = solve_moments(&patterns, ctx.measured());

    // Summed predicted topography. Computed before the polarity flip: a
    // flipped orientation negates the unit pattern and the moment together,
    // leaving each contribution unchanged.
    let mut predicted = vec![0.0; ctx.measured().len()];
    for (pattern, &moment) in patterns.iter().zip(solve.moments.iter()) {
        for (out, &p) in predicted.iter_mut().zip(pattern.iter()) {
            *out += moment * p;
        }
    }

    let mut ss_error = 0.0;
    for (&p, &m) in predicted.iter().zip(ctx.measured().iter()) {
        let err = p - m;
        ss_error += err * err;
    }
    let percent_error = 100.0 * ss_error / ctx.total_sum_squares();

    // Polarity normalization: reported moments are non-negative, and the
    // orientation sign carries the true current-flow sense.
    for (dipole, &moment) in dipoles.iter_mut().zip(solve.moments.iter()) {
        if moment < 0.0 {
            dipole.moment = -moment;
            for c in dipole.orientation.iter_mut() {
                *c = -*c;
            }
        } else {
            dipole.moment = moment;
        }
    }

    FitResult {
        dipoles,
        predicted,
        percent_error,
        initial_error,
        passes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::objective::make_tangential;
    use crate::sim::{build_spiral_cap_array, synthesize_measurement};

    const ORIGIN: [f64; 3] = [0.0, 0.0, 0.0];

    fn sphere() -> SphereModel {
        SphereModel::new(ORIGIN)
    }

    /// Options tightened for noiseless synthetic recoveries.
    fn tight_options() -> FitOptions {
        FitOptions {
            max_passes: 4,
            max_iterations: 800,
            tolerance: 1e-9,
            ..FitOptions::default()
        }
    }

    #[test]
    fn rejects_more_than_ten_dipoles() {
        let array = build_spiral_cap_array(30, ORIGIN);
        let start = StartGuess {
            positions: vec![[0.0, 0.0, 4.0]; 11],
            orientations: vec![[0.0, 1.0, 0.0]; 11],
        };
        let err = fit_dipoles(&array, &vec![1.0; 30], &start, sphere(), &FitOptions::default());
        assert!(err.is_err());
        assert_eq!(err.unwrap_err().exit_code(), 2);
    }

    #[test]
    fn rejects_mismatched_start_arrays() {
        let array = build_spiral_cap_array(30, ORIGIN);
        let start = StartGuess {
            positions: vec![[0.0, 0.0, 4.0]; 2],
            orientations: vec![[0.0, 1.0, 0.0]; 1],
        };
        let err = fit_dipoles(&array, &vec![1.0; 30], &start, sphere(), &FitOptions::default());
        assert!(err.is_err());
    }

    #[test]
    fn recovers_single_dipole_from_perturbed_start() {
        let array = build_spiral_cap_array(120, ORIGIN);
        let truth = Dipole::new([0.0, 0.0, 3.0], [0.0, 1.0, 0.0], 10.0);
        let measured = synthesize_measurement(&array, &[truth], sphere(), 0.0, 0).unwrap();

        // Start 1 cm off in position and ~10 degrees off in orientation.
        let start = StartGuess {
            positions: vec![[0.6, -0.6, 3.5]],
            orientations: vec![[0.17, 0.985, 0.0]],
        };
        let result =
            fit_dipoles(&array, &measured, &start, sphere(), &tight_options()).unwrap();

        assert!(
            result.percent_error < 0.01,
            "residual error too high: {}%",
            result.percent_error
        );
        let fitted = &result.dipoles[0];
        for (f, t) in fitted.position.iter().zip(truth.position.iter()) {
            assert!((f - t).abs() < 0.1, "position off: {:?}", fitted.position);
        }
        let dot: f64 = fitted
            .orientation
            .iter()
            .zip(truth.orientation.iter())
            .map(|(a, b)| a * b)
            .sum();
        assert!(dot > 0.999, "orientation off: {:?}", fitted.orientation);
        assert!(
            (fitted.moment - truth.moment).abs() / truth.moment < 0.02,
            "moment off: {}",
            fitted.moment
        );
        assert!(result.initial_error > result.percent_error);
    }

    #[test]
    fn recovers_two_separated_dipoles() {
        let array = build_spiral_cap_array(100, ORIGIN);
        let d1 = make_tangential(&Dipole::new([3.0, 1.0, 4.0], [0.0, 1.0, 0.0], 10.0), ORIGIN);
        let d2 = make_tangential(&Dipole::new([-3.0, -1.0, 4.0], [0.0, 1.0, 0.0], 15.0), ORIGIN);
        let measured = synthesize_measurement(&array, &[d1, d2], sphere(), 0.0, 0).unwrap();

        let start = StartGuess {
            positions: vec![[3.3, 0.7, 4.2], [-3.3, -0.7, 3.8]],
            orientations: vec![d1.orientation, d2.orientation],
        };
        let options = FitOptions {
            max_passes: 4,
            max_iterations: 1500,
            tolerance: 1e-9,
            ..FitOptions::default()
        };
        let result = fit_dipoles(&array, &measured, &start, sphere(), &options).unwrap();

        assert!(
            result.percent_error < 1.0,
            "residual error too high: {}%",
            result.percent_error
        );
        let mut moments: Vec<f64> = result.dipoles.iter().map(|d| d.moment).collect();
        moments.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((moments[0] - 10.0).abs() / 10.0 < 0.05, "moments: {moments:?}");
        assert!((moments[1] - 15.0).abs() / 15.0 < 0.05, "moments: {moments:?}");
    }

    #[test]
    fn reported_moments_are_never_negative() {
        let array = build_spiral_cap_array(120, ORIGIN);
        let truth = Dipole::new([0.0, 0.0, 3.0], [0.0, 1.0, 0.0], 10.0);
        let measured = synthesize_measurement(&array, &[truth], sphere(), 0.0, 0).unwrap();

        // Start with the orientation flipped: the linear solve will want a
        // negative moment, which polarity correction folds back.
        let start = StartGuess {
            positions: vec![[0.0, 0.0, 3.0]],
            orientations: vec![[0.0, -1.0, 0.0]],
        };
        let result =
            fit_dipoles(&array, &measured, &start, sphere(), &tight_options()).unwrap();
        for d in &result.dipoles {
            assert!(d.moment >= 0.0);
        }
        // The flipped start converges to the same physical source: the
        // reported orientation must point back along the true sense.
        let dot: f64 = result.dipoles[0]
            .orientation
            .iter()
            .zip(truth.orientation.iter())
            .map(|(a, b)| a * b)
            .sum();
        assert!(dot > 0.99, "orientation sense not restored: {dot}");
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let array = build_spiral_cap_array(80, ORIGIN);
        let truth = Dipole::new([1.0, 1.0, 3.5], [-0.5547, 0.83205, 0.0], 8.0);
        let measured = synthesize_measurement(&array, &[truth], sphere(), 5.0, 7).unwrap();
        let start = StartGuess {
            positions: vec![[0.5, 0.5, 4.0]],
            orientations: vec![[0.0, 1.0, 0.0]],
        };
        let options = FitOptions::default();

        let a = fit_dipoles(&array, &measured, &start, sphere(), &options).unwrap();
        let b = fit_dipoles(&array, &measured, &start, sphere(), &options).unwrap();

        assert_eq!(a.percent_error.to_bits(), b.percent_error.to_bits());
        assert_eq!(a.dipoles.len(), b.dipoles.len());
        for (x, y) in a.dipoles.iter().zip(b.dipoles.iter()) {
            assert_eq!(x.moment.to_bits(), y.moment.to_bits());
            for (p, q) in x.position.iter().zip(y.position.iter()) {
                assert_eq!(p.to_bits(), q.to_bits());
            }
        }
        for (p, q) in a.predicted.iter().zip(b.predicted.iter()) {
            assert_eq!(p.to_bits(), q.to_bits());
        }
    }

    #[test]
    fn iteration_budget_exhaustion_still_returns_a_result() {
        let array = build_spiral_cap_array(60, ORIGIN);
        let truth = Dipole::new([0.0, 2.0, 3.0], [1.0, 0.0, 0.0], 12.0);
        let measured = synthesize_measurement(&array, &[truth], sphere(), 0.0, 0).unwrap();
        let start = StartGuess {
            positions: vec![[2.0, -2.0, 5.0]],
            orientations: vec![[0.0, 1.0, 0.0]],
        };
        let options = FitOptions {
            max_passes: 1,
            max_iterations: 3,
            tolerance: 1e-12,
            ..FitOptions::default()
        };
        let result = fit_dipoles(&array, &measured, &start, sphere(), &options).unwrap();
        assert_eq!(result.passes.len(), 1);
        assert!(result.passes[0].iterations <= 3);
        assert!(result.percent_error.is_finite());
    }
}
