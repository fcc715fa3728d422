//! The percent-error objective the simplex minimizes.
//!
//! `FitContext` binds everything the objective needs (forward model,
//! measurement, sphere, cached total sum-of-squares) so the optimizer sees
//! a plain closure over the parameter vector. Nothing here is ambient
//! state; two contexts never interact.

use crate::domain::{Dipole, SphereModel};
use crate::error::AppError;
use crate::forward::ForwardModel;
use crate::math::{arr3, orthogonal_to, unit_or_zero, v3};
use crate::fit::moments::solve_moments;

/// Number of free parameters per dipole: position + raw orientation. The
/// moment is solved linearly and is never part of this layout.
pub const PARAMS_PER_DIPOLE: usize = 6;

/// Percent error reported when the moment system is degenerate. Steers the
/// optimizer away from non-identifiable configurations without ever
/// producing NaN/Inf.
pub const DEGENERATE_ERROR: f64 = 100.0;

/// Project a dipole's orientation onto the plane orthogonal to its radius
/// vector from the sphere origin, and renormalize.
///
/// A radially oriented dipole in a spherically symmetric conductor
/// produces no external field, so the radial orientation component is
/// unobservable; removing it before every forward evaluation keeps the
/// search out of that degenerate direction. An orientation that was
/// entirely radial collapses to zero and is caught downstream as a
/// degenerate source.
pub fn make_tangential(dipole: &Dipole, sphere_origin: [f64; 3]) -> Dipole {
    let radius = v3(dipole.position) - v3(sphere_origin);
    let projected = orthogonal_to(v3(dipole.orientation), radius);
    Dipole {
        position: dipole.position,
        orientation: arr3(unit_or_zero(projected)),
        moment: dipole.moment,
    }
}

/// Everything one fit invocation's objective needs, fixed at construction.
pub struct FitContext<'a> {
    forward: ForwardModel<'a>,
    sphere: SphereModel,
    measured: Vec<f64>,
    /// `Σ measuredᵢ²`, computed once per fit and reused as the percent
    /// error denominator.
    total_sum_squares: f64,
    num_dipoles: usize,
    magnetic_only: bool,
}

impl<'a> FitContext<'a> {
    pub fn new(
        forward: ForwardModel<'a>,
        sphere: SphereModel,
        measured: Vec<f64>,
        num_dipoles: usize,
        magnetic_only: bool,
    ) -> Result<Self, AppError> {
        if measured.len() != forward.num_channels() {
            return Err(AppError::input(format!(
                "Measurement has {} values but the channel set has {} active sensors.",
                measured.len(),
                forward.num_channels()
            )));
        }
        if measured.iter().any(|v| !v.is_finite()) {
            return Err(AppError::input("Measurement contains non-finite values."));
        }
        let total_sum_squares: f64 = measured.iter().map(|v| v * v).sum();
        if total_sum_squares <= 0.0 {
            return Err(AppError::input(
                "Measurement is all zero; percent error is undefined.",
            ));
        }
        Ok(Self {
            forward,
            sphere,
            measured,
            total_sum_squares,
            num_dipoles,
            magnetic_only,
        })
    }

    pub fn num_dipoles(&self) -> usize {
        self.num_dipoles
    }

    pub fn measured(&self) -> &[f64] {
        &self.measured
    }

    pub fn total_sum_squares(&self) -> f64 {
        self.total_sum_squares
    }

    /// Unpack one dipole from the flat parameter vector, normalize its
    /// orientation, and apply the tangential constraint unless the
    /// magnetic-only model is in force.
    pub fn constrained_dipole(&self, params: &[f64], k: usize) -> Dipole {
        let o = k * PARAMS_PER_DIPOLE;
        let raw = Dipole {
            position: [params[o], params[o + 1], params[o + 2]],
            orientation: arr3(unit_or_zero(v3([
                params[o + 3],
                params[o + 4],
                params[o + 5],
            ]))),
            moment: 1.0,
        };
        if self.magnetic_only {
            raw
        } else {
            make_tangential(&raw, self.sphere.origin)
        }
    }

    /// Unit-moment forward patterns for every dipole encoded in `params`.
    pub fn unit_patterns(&self, params: &[f64]) -> Result<Vec<Vec<f64>>, AppError> {
        (0..self.num_dipoles)
            .map(|k| self.forward.unit_pattern(&self.constrained_dipole(params, k)))
            .collect()
    }

    /// The scalar the optimizer minimizes:
    /// `100 × SS(predicted − measured) / SS(measured)`.
    ///
    /// A degenerate moment system maps to [`DEGENERATE_ERROR`] instead of
    /// propagating NaN/Inf into the simplex.
    pub fn percent_error(&self, params: &[f64]) -> f64 {
        // Geometry is validated when the context is built; a forward
        // failure here can only mean a degenerate configuration.
        let Ok(patterns) = self.unit_patterns(params) else {
            return DEGENERATE_ERROR;
        };

        let solve = solve_moments(&patterns, &self.measured);
        if !solve.ok {
            return DEGENERATE_ERROR;
        }

        let mut ss_error = 0.0;
        for (chan, &m) in self.measured.iter().enumerate() {
            let mut predicted = 0.0;
            for (pattern, &moment) in patterns.iter().zip(solve.moments.iter()) {
                predicted += moment * pattern[chan];
            }
            let err = predicted - m;
            ss_error += err * err;
        }

        let percent = 100.0 * ss_error / self.total_sum_squares;
        if percent.is_finite() {
            percent
        } else {
            DEGENERATE_ERROR
        }
    }
}
