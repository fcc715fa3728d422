//! Snapshot JSON read/write.
//!
//! A snapshot is the portable unit the CLI consumes: sensor-array geometry
//! plus one measured field value per active sensor channel at a fixed
//! latency. Producing it (reading the acquisition system's binary
//! dataset, filtering, baseline correction) happens upstream and is out
//! of scope here; this module only defines and validates the interchange
//! format.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::SnapshotMeta;
use crate::error::AppError;
use crate::sensor::SensorArray;

/// One field snapshot: metadata, geometry, and the measured topography.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub array: SensorArray,
    /// One value (tesla) per sensor channel, in array order. Aligned with
    /// `array.sensor_indices(&[])`; exclusions are applied at fit time,
    /// not in the file.
    pub measured: Vec<f64>,
}

impl Snapshot {
    /// Structural validation: array geometry plus measurement alignment.
    pub fn validate(&self) -> Result<(), AppError> {
        self.array.validate()?;
        let n_sensors = self.array.num_sensors(&[]);
        if self.measured.len() != n_sensors {
            return Err(AppError::input(format!(
                "Snapshot has {} measured values but {} sensor channels.",
                self.measured.len(),
                n_sensors
            )));
        }
        if self.measured.iter().any(|v| !v.is_finite()) {
            return Err(AppError::input(
                "Snapshot measurement contains non-finite values.",
            ));
        }
        Ok(())
    }
}

/// Read and validate a snapshot JSON file.
pub fn read_snapshot(path: &Path) -> Result<Snapshot, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::input(format!("Failed to open snapshot '{}': {e}", path.display()))
    })?;
    let snapshot: Snapshot = serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid snapshot JSON: {e}")))?;
    snapshot.validate()?;
    Ok(snapshot)
}

/// Write a snapshot JSON file.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::fit(format!(
            "Failed to create snapshot '{}': {e}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, snapshot)
        .map_err(|e| AppError::fit(format!("Failed to write snapshot JSON: {e}")))?;
    Ok(())
}
