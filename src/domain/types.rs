//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON for downstream analysis
//! - reloaded later for plotting or comparisons
//!
//! Conventions: positions in centimetres (head frame), orientations are unit
//! vectors, moments in nanoampere-metres, fields in tesla.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Hard cap on the number of simultaneously fitted dipoles.
///
/// 10 dipoles = 60 free parameters for the simplex. Practically only 3–4
/// dipoles converge unless the start parameters are close to the truth, but
/// the engine supports up to the cap.
pub const MAX_DIPOLES: usize = 10;

/// Default number of simplex restart passes.
pub const DEFAULT_NUM_PASSES: usize = 2;

/// Default simplex iteration budget per pass.
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

/// Default simplex termination tolerance.
pub const DEFAULT_TOLERANCE: f64 = 0.001;

/// An equivalent current dipole: point source with position, orientation
/// and signed strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dipole {
    /// Position in cm, head frame.
    pub position: [f64; 3],
    /// Unit orientation (current-flow direction).
    pub orientation: [f64; 3],
    /// Moment in nAm.
    pub moment: f64,
}

impl Dipole {
    pub fn new(position: [f64; 3], orientation: [f64; 3], moment: f64) -> Self {
        Self {
            position,
            orientation,
            moment,
        }
    }
}

/// Homogeneous conducting-sphere head model, defined by its origin (cm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereModel {
    pub origin: [f64; 3],
}

impl SphereModel {
    pub fn new(origin: [f64; 3]) -> Self {
        Self { origin }
    }
}

impl Default for SphereModel {
    /// Conventional default origin for adult head frames: 5 cm above the
    /// inter-aural line.
    fn default() -> Self {
        Self {
            origin: [0.0, 0.0, 5.0],
        }
    }
}

/// Options controlling one fit invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOptions {
    /// Number of simplex restart passes. Each pass re-seeds the simplex at
    /// the previous optimum with the same step schedule; this refines
    /// convergence rather than escaping distinct local minima.
    pub max_passes: usize,
    /// Simplex iteration budget per pass.
    pub max_iterations: usize,
    /// Simplex termination tolerance (relative best/worst spread).
    pub tolerance: f64,
    /// Use a free-space magnetic-dipole model: no volume-conductor
    /// correction and no tangential constraint.
    pub magnetic_only: bool,
    /// Evaluate coil geometry in the dewar frame instead of the head frame.
    pub dewar_coords: bool,
    /// Channels excluded from both the measurement and the forward channel
    /// set. Matched by name prefix, so `"S01"` also removes `"S012-1609"`.
    pub exclude_channels: Vec<String>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_NUM_PASSES,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            magnetic_only: false,
            dewar_coords: false,
            exclude_channels: Vec::new(),
        }
    }
}

/// Start parameters for a fit: one position and one orientation per dipole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartGuess {
    pub positions: Vec<[f64; 3]>,
    pub orientations: Vec<[f64; 3]>,
}

impl StartGuess {
    pub fn num_dipoles(&self) -> usize {
        self.positions.len()
    }
}

/// Per-pass optimizer statistics, reported alongside the result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassStats {
    pub iterations: usize,
    /// Percent error after this pass.
    pub error: f64,
}

/// Final output of one fit invocation. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Fitted dipoles. Moments are always >= 0; a fitted negative moment is
    /// reported as a positive moment with the orientation sign flipped, so
    /// the orientation carries the true current-flow sense.
    pub dipoles: Vec<Dipole>,
    /// Summed predicted topography (tesla), one value per active sensor
    /// channel in array order.
    pub predicted: Vec<f64>,
    /// Residual sum-of-squares as a percentage of the measured
    /// sum-of-squares.
    pub percent_error: f64,
    /// Percent error evaluated at the start parameters, before the first
    /// pass.
    pub initial_error: f64,
    /// One entry per completed simplex pass.
    pub passes: Vec<PassStats>,
}

/// Descriptive metadata carried by a snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Dataset or recording name.
    pub name: String,
    /// Acquisition date, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Latency of the field snapshot within its epoch, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_options_defaults_match_documented_values() {
        let opts = FitOptions::default();
        assert_eq!(opts.max_passes, 2);
        assert_eq!(opts.max_iterations, 200);
        assert!((opts.tolerance - 0.001).abs() < 1e-15);
        assert!(!opts.magnetic_only);
        assert!(opts.exclude_channels.is_empty());
    }

    #[test]
    fn default_sphere_sits_above_origin() {
        let sphere = SphereModel::default();
        assert_eq!(sphere.origin, [0.0, 0.0, 5.0]);
    }
}
