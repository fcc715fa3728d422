//! Synthetic sensor arrays and measurements.
//!
//! Builds a deterministic gradiometer array and synthesizes the field of
//! known dipoles onto it, optionally with sensor noise. Used by
//! `dipfit sim` and by the recovery tests. Everything here is
//! deterministic given the configuration; the only randomness is the
//! seeded measurement noise.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Dipole, SnapshotMeta, SphereModel};
use crate::error::AppError;
use crate::forward::ForwardModel;
use crate::io::Snapshot;
use crate::sensor::{ChannelRecord, Coil, SensorArray};

/// Golden angle in radians, for the spiral channel layout.
const GOLDEN_ANGLE: f64 = 2.399963229728653;

/// Half-angle of the spherical cap the channels cover, in degrees.
const CAP_HALF_ANGLE_DEG: f64 = 60.0;

/// One femtotesla.
const FT_TO_T: f64 = 1e-15;

/// Configuration for snapshot synthesis.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Snapshot name recorded in the metadata.
    pub name: String,
    /// Number of sensor channels.
    pub channels: usize,
    /// Radial distance from the array centre to the inner coils (cm).
    pub array_radius_cm: f64,
    /// Axial gradiometer baseline (cm).
    pub baseline_cm: f64,
    /// Sphere model used both for synthesis and as the array centre.
    pub sphere: SphereModel,
    /// Ground-truth sources.
    pub dipoles: Vec<Dipole>,
    /// Gaussian sensor noise, standard deviation in fT (0 disables noise).
    pub noise_ft: f64,
    /// Noise RNG seed.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "sim".to_string(),
            channels: 151,
            array_radius_cm: 12.0,
            baseline_cm: 5.0,
            sphere: SphereModel::default(),
            dipoles: Vec::new(),
            noise_ft: 0.0,
            seed: 42,
        }
    }
}

/// Build a deterministic axial-gradiometer array on a spherical cap.
///
/// Channels are laid out on a golden-angle spiral over the cap around +z,
/// centred on `origin_cm`. Each channel is a first-order axial
/// gradiometer: inner coil at the array radius with a radial normal, outer
/// coil one baseline further out with the normal inverted.
pub fn build_spiral_cap_array(n: usize, origin_cm: [f64; 3]) -> SensorArray {
    build_cap_array(n, origin_cm, 12.0, 5.0)
}

fn build_cap_array(
    n: usize,
    origin_cm: [f64; 3],
    radius_cm: f64,
    baseline_cm: f64,
) -> SensorArray {
    let cos_max = CAP_HALF_ANGLE_DEG.to_radians().cos();

    let mut channels = Vec::with_capacity(n);
    for i in 0..n {
        let t = (i as f64 + 0.5) / n as f64;
        let cos_phi = 1.0 - t * (1.0 - cos_max);
        let sin_phi = (1.0 - cos_phi * cos_phi).sqrt();
        let theta = i as f64 * GOLDEN_ANGLE;

        let d = [
            sin_phi * theta.cos(),
            sin_phi * theta.sin(),
            cos_phi,
        ];
        let at = |scale: f64| {
            [
                origin_cm[0] + d[0] * scale,
                origin_cm[1] + d[1] * scale,
                origin_cm[2] + d[2] * scale,
            ]
        };

        channels.push(ChannelRecord {
            name: format!("S{:03}", i + 1),
            coils: vec![
                Coil {
                    position: at(radius_cm),
                    orientation: d,
                    turns: 1.0,
                },
                Coil {
                    position: at(radius_cm + baseline_cm),
                    orientation: [-d[0], -d[1], -d[2]],
                    turns: 1.0,
                },
            ],
            dewar_coils: None,
            gain: 1.0,
            is_sensor: true,
            is_reference: false,
            is_balancing_ref: false,
            sphere_origin: None,
            balancing: Vec::new(),
        });
    }

    SensorArray {
        channels,
        gradient_order: 0,
    }
}

/// Synthesize the measured topography of the given sources on `array`,
/// with optional seeded Gaussian noise (standard deviation `noise_ft`).
pub fn synthesize_measurement(
    array: &SensorArray,
    dipoles: &[Dipole],
    sphere: SphereModel,
    noise_ft: f64,
    seed: u64,
) -> Result<Vec<f64>, AppError> {
    if dipoles.is_empty() {
        return Err(AppError::input("At least one source dipole is required."));
    }
    if !(noise_ft.is_finite() && noise_ft >= 0.0) {
        return Err(AppError::input(format!("Invalid noise level: {noise_ft}.")));
    }

    let forward = ForwardModel::new(array, sphere, &[], false, false)?;
    let mut measured = vec![0.0; forward.num_channels()];
    for dipole in dipoles {
        let pattern = forward.unit_pattern(dipole)?;
        for (m, p) in measured.iter_mut().zip(pattern.iter()) {
            *m += dipole.moment * p;
        }
    }

    if noise_ft > 0.0 {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, noise_ft * FT_TO_T)
            .map_err(|e| AppError::input(format!("Noise distribution error: {e}")))?;
        for m in measured.iter_mut() {
            *m += normal.sample(&mut rng);
        }
    }

    Ok(measured)
}

/// Build a full snapshot (array + measurement + metadata) from a
/// simulation configuration.
pub fn generate_snapshot(config: &SimConfig) -> Result<Snapshot, AppError> {
    if config.channels < 8 {
        return Err(AppError::input(format!(
            "At least 8 channels are required, got {}.",
            config.channels
        )));
    }
    if !(config.array_radius_cm.is_finite() && config.array_radius_cm > 0.0) {
        return Err(AppError::input("Array radius must be finite and > 0."));
    }
    if !(config.baseline_cm.is_finite() && config.baseline_cm > 0.0) {
        return Err(AppError::input("Gradiometer baseline must be finite and > 0."));
    }

    let array = build_cap_array(
        config.channels,
        config.sphere.origin,
        config.array_radius_cm,
        config.baseline_cm,
    );
    let measured = synthesize_measurement(
        &array,
        &config.dipoles,
        config.sphere,
        config.noise_ft,
        config.seed,
    )?;

    Ok(Snapshot {
        meta: SnapshotMeta {
            name: config.name.clone(),
            date: None,
            latency: None,
        },
        array,
        measured,
    })
}
