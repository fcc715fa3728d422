//! Channel records and the sensor array.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Highest gradient-balancing order the acquisition convention defines.
pub const MAX_GRADIENT_ORDER: u8 = 4;

/// One pickup coil: a point approximation of the winding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coil {
    /// Coil centre in cm.
    pub position: [f64; 3],
    /// Unit winding normal. For the outer coil of an axial gradiometer the
    /// stored normal points opposite to the inner coil, so summing coil
    /// pickups yields the gradiometer difference signal.
    pub orientation: [f64; 3],
    /// Signed turn count multiplier.
    #[serde(default = "default_turns")]
    pub turns: f64,
}

fn default_turns() -> f64 {
    1.0
}

fn default_gain() -> f64 {
    1.0
}

/// One channel of the array: name, role flags, coil geometry, balancing.
///
/// Read-only from the fit engine's perspective: a fit never mutates the
/// array it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub name: String,
    /// Head-frame coils; one for magnetometers/references, two for
    /// gradiometers.
    pub coils: Vec<Coil>,
    /// Dewar-frame coil geometry, when the recording carries it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dewar_coils: Option<Vec<Coil>>,
    /// Channel gain applied to the computed pickup.
    #[serde(default = "default_gain")]
    pub gain: f64,
    /// Channel participates in the fitted measurement vector.
    pub is_sensor: bool,
    /// Reference channel (not fitted).
    #[serde(default)]
    pub is_reference: bool,
    /// Reference channel used by gradient balancing. Balancing references
    /// are excluded from the fit but their forward fields are still needed
    /// to gradient-correct the sensor pattern.
    #[serde(default)]
    pub is_balancing_ref: bool,
    /// Per-channel sphere origin override (cm). `None` means the fit-global
    /// sphere origin applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere_origin: Option<[f64; 3]>,
    /// Balancing coefficient rows, one per gradient order starting at 1.
    /// Row `g-1` holds one coefficient per balancing-reference channel, in
    /// the array's balancing-reference order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub balancing: Vec<Vec<f64>>,
}

impl ChannelRecord {
    /// The coil set the forward model should use.
    ///
    /// Returns an error when dewar coordinates are requested but the
    /// channel does not carry dewar-frame geometry.
    pub fn active_coils(&self, dewar_coords: bool) -> Result<&[Coil], AppError> {
        if dewar_coords {
            self.dewar_coils.as_deref().ok_or_else(|| {
                AppError::geometry(format!(
                    "Channel {} has no dewar-frame coil geometry.",
                    self.name
                ))
            })
        } else {
            Ok(&self.coils)
        }
    }
}

/// The full channel list plus the recorded gradient order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorArray {
    pub channels: Vec<ChannelRecord>,
    /// Which balancing correction to apply in the forward model (0 = none).
    pub gradient_order: u8,
}

impl SensorArray {
    /// Indices of active sensor channels, after applying the exclusion
    /// list. Exclusion is by name prefix: an entry `"S012"` removes both
    /// `"S012"` and `"S012-1609"`.
    pub fn sensor_indices(&self, exclude: &[String]) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| ch.is_sensor && !is_excluded(&ch.name, exclude))
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of balancing-reference channels, in array order. Balancing
    /// coefficient rows are aligned with this ordering.
    pub fn balancing_ref_indices(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| ch.is_balancing_ref)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of active sensor channels after exclusions.
    pub fn num_sensors(&self, exclude: &[String]) -> usize {
        self.sensor_indices(exclude).len()
    }

    /// Structural validation of the array.
    ///
    /// Checks coil counts, orientation normalization, the gradient order
    /// range, and that every sensor channel carries a balancing row of the
    /// right width for the selected order.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.gradient_order > MAX_GRADIENT_ORDER {
            return Err(AppError::input(format!(
                "Gradient order {} out of range (max {MAX_GRADIENT_ORDER}).",
                self.gradient_order
            )));
        }

        let n_refs = self.balancing_ref_indices().len();
        if self.gradient_order > 0 && n_refs == 0 {
            return Err(AppError::geometry(
                "Gradient balancing requested but the array has no balancing-reference channels.",
            ));
        }

        for ch in &self.channels {
            if ch.coils.is_empty() || ch.coils.len() > 2 {
                return Err(AppError::geometry(format!(
                    "Channel {} must have 1 or 2 coils, found {}.",
                    ch.name,
                    ch.coils.len()
                )));
            }
            if let Some(dewar) = &ch.dewar_coils {
                if dewar.len() != ch.coils.len() {
                    return Err(AppError::geometry(format!(
                        "Channel {}: dewar coil count {} does not match head-frame count {}.",
                        ch.name,
                        dewar.len(),
                        ch.coils.len()
                    )));
                }
            }
            for coil in ch.coils.iter().chain(ch.dewar_coils.iter().flatten()) {
                let n2: f64 = coil.orientation.iter().map(|c| c * c).sum();
                if !n2.is_finite() || (n2.sqrt() - 1.0).abs() > 1e-6 {
                    return Err(AppError::geometry(format!(
                        "Channel {}: coil orientation is not unit length.",
                        ch.name
                    )));
                }
            }
            if !(ch.gain.is_finite() && ch.gain != 0.0) {
                return Err(AppError::geometry(format!(
                    "Channel {}: invalid gain {}.",
                    ch.name, ch.gain
                )));
            }

            if self.gradient_order > 0 && ch.is_sensor {
                let order = self.gradient_order as usize;
                let row = ch.balancing.get(order - 1).ok_or_else(|| {
                    AppError::geometry(format!(
                        "Channel {}: no balancing coefficients for gradient order {order}.",
                        ch.name
                    ))
                })?;
                if row.len() != n_refs {
                    return Err(AppError::geometry(format!(
                        "Channel {}: balancing row for order {order} has {} coefficients, expected {n_refs}.",
                        ch.name,
                        row.len()
                    )));
                }
            }
        }

        Ok(())
    }
}

fn is_excluded(name: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|bad| !bad.is_empty() && name.starts_with(bad.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn radial_channel(name: &str, z: f64) -> ChannelRecord {
        ChannelRecord {
            name: name.to_string(),
            coils: vec![Coil {
                position: [0.0, 0.0, z],
                orientation: [0.0, 0.0, 1.0],
                turns: 1.0,
            }],
            dewar_coils: None,
            gain: 1.0,
            is_sensor: true,
            is_reference: false,
            is_balancing_ref: false,
            sphere_origin: None,
            balancing: Vec::new(),
        }
    }

    #[test]
    fn exclusion_matches_by_name_prefix() {
        let mut a = radial_channel("S012-1609", 12.0);
        let b = radial_channel("S013-1609", 12.0);
        a.is_sensor = true;
        let array = SensorArray {
            channels: vec![a, b],
            gradient_order: 0,
        };

        let all = array.sensor_indices(&[]);
        assert_eq!(all, vec![0, 1]);

        let kept = array.sensor_indices(&["S012".to_string()]);
        assert_eq!(kept, vec![1]);
    }

    #[test]
    fn validate_rejects_non_unit_coil_orientation() {
        let mut ch = radial_channel("S001", 12.0);
        ch.coils[0].orientation = [0.0, 0.0, 2.0];
        let array = SensorArray {
            channels: vec![ch],
            gradient_order: 0,
        };
        assert!(array.validate().is_err());
    }

    #[test]
    fn validate_requires_balancing_rows_for_selected_order() {
        let sensor = radial_channel("S001", 12.0);
        let mut reference = radial_channel("REF01", 30.0);
        reference.is_sensor = false;
        reference.is_reference = true;
        reference.is_balancing_ref = true;

        let mut array = SensorArray {
            channels: vec![sensor, reference],
            gradient_order: 3,
        };
        assert!(array.validate().is_err());

        array.channels[0].balancing = vec![vec![0.1], vec![0.2], vec![0.3]];
        assert!(array.validate().is_ok());
    }

    #[test]
    fn dewar_request_fails_without_dewar_geometry() {
        let ch = radial_channel("S001", 12.0);
        assert!(ch.active_coils(false).is_ok());
        assert!(ch.active_coils(true).is_err());
    }
}
