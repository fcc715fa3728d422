//! Forward field model: per-channel field of a unit-moment dipole.
//!
//! Responsibilities:
//!
//! - evaluate the conducting-sphere (or free-space magnetic) field at each
//!   coil and form the channel pickup
//! - apply gradient-balancing corrections using the reference channels
//! - return one value per active sensor channel
//!
//! The model is a pure function of its inputs; it never mutates the array.

pub mod field;

pub use field::*;

use crate::domain::{Dipole, SphereModel};
use crate::error::AppError;
use crate::math::v3;
use crate::sensor::{ChannelRecord, SensorArray};

/// Centimetres to metres.
const CM_TO_M: f64 = 1e-2;

/// One nanoampere-metre in SI (A·m).
const NAM_TO_AM: f64 = 1e-9;

/// Resolved forward model for one fit invocation: the channel subsets and
/// model flags are fixed at construction so pattern evaluation inside the
/// optimizer loop cannot fail on geometry.
pub struct ForwardModel<'a> {
    array: &'a SensorArray,
    sphere: SphereModel,
    sensors: Vec<usize>,
    refs: Vec<usize>,
    magnetic_only: bool,
    dewar_coords: bool,
}

impl<'a> ForwardModel<'a> {
    /// Resolve channel subsets and verify the geometry supports the
    /// requested model options.
    pub fn new(
        array: &'a SensorArray,
        sphere: SphereModel,
        exclude: &[String],
        magnetic_only: bool,
        dewar_coords: bool,
    ) -> Result<Self, AppError> {
        array.validate()?;

        let sensors = array.sensor_indices(exclude);
        if sensors.is_empty() {
            return Err(AppError::geometry(
                "No active sensor channels remain after exclusions.",
            ));
        }
        let refs = array.balancing_ref_indices();

        // Probe dewar geometry up front so the per-iteration path is
        // infallible.
        if dewar_coords {
            for &i in sensors.iter().chain(refs.iter()) {
                array.channels[i].active_coils(true)?;
            }
        }

        Ok(Self {
            array,
            sphere,
            sensors,
            refs,
            magnetic_only,
            dewar_coords,
        })
    }

    /// Active sensor channel indices into the array, in pattern order.
    pub fn sensor_indices(&self) -> &[usize] {
        &self.sensors
    }

    pub fn num_channels(&self) -> usize {
        self.sensors.len()
    }

    /// Field pattern (tesla) of a unit-moment (1 nAm) dipole, one value per
    /// active sensor channel. The true field of the source is
    /// `pattern × moment`.
    ///
    /// When the array's gradient order is above zero, the raw sensor
    /// pickups are corrected with the coefficient-weighted raw fields of
    /// the balancing-reference channels; the references themselves are not
    /// part of the returned pattern.
    pub fn unit_pattern(&self, dipole: &Dipole) -> Result<Vec<f64>, AppError> {
        let order = self.array.gradient_order as usize;

        let ref_fields: Vec<f64> = if order > 0 {
            self.refs
                .iter()
                .map(|&i| self.channel_pickup(&self.array.channels[i], dipole))
                .collect::<Result<_, _>>()?
        } else {
            Vec::new()
        };

        let mut pattern = Vec::with_capacity(self.sensors.len());
        for &i in &self.sensors {
            let ch = &self.array.channels[i];
            let mut value = self.channel_pickup(ch, dipole)?;
            if order > 0 {
                // Row existence/width is checked by `SensorArray::validate`.
                let coefs = &ch.balancing[order - 1];
                for (c, r) in coefs.iter().zip(ref_fields.iter()) {
                    value -= c * r;
                }
            }
            pattern.push(value);
        }
        Ok(pattern)
    }

    /// Pickup of one channel: sum over coils of `B · normal × turns`,
    /// times the channel gain. Always evaluated at unit moment (1 nAm);
    /// the dipole's stored moment is ignored here.
    fn channel_pickup(&self, ch: &ChannelRecord, dipole: &Dipole) -> Result<f64, AppError> {
        let coils = ch.active_coils(self.dewar_coords)?;
        let origin = v3(ch.sphere_origin.unwrap_or(self.sphere.origin));

        let pos = v3(dipole.position);
        let q = v3(dipole.orientation) * NAM_TO_AM;

        let mut sum = 0.0;
        for coil in coils {
            let b = if self.magnetic_only {
                // Free-space magnetic dipole, no conductor correction.
                let rel = (v3(coil.position) - pos) * CM_TO_M;
                magnetic_dipole_field(q, rel)
            } else {
                // Sphere model: both points relative to the effective
                // sphere origin.
                let r_q = (pos - origin) * CM_TO_M;
                let r = (v3(coil.position) - origin) * CM_TO_M;
                sarvas_field(r_q, q, r)
            };
            sum += b.dot(&v3(coil.orientation)) * coil.turns;
        }
        Ok(sum * ch.gain)
    }
}
