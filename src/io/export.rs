//! Export fit results to JSON and per-channel residuals to CSV.
//!
//! The JSON export is the "portable" representation of a completed fit:
//! metadata, the model configuration that produced it, and the fitted
//! dipoles. The CSV export is meant to be easy to consume in spreadsheets
//! or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{FitOptions, FitResult, SnapshotMeta, SphereModel};
use crate::error::AppError;
use crate::report::ChannelResidual;

/// Schema of the result JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFile {
    pub tool: String,
    pub meta: SnapshotMeta,
    pub sphere: SphereModel,
    pub options: FitOptions,
    pub result: FitResult,
}

/// Write the fit result JSON.
pub fn write_result_json(
    path: &Path,
    meta: &SnapshotMeta,
    sphere: SphereModel,
    options: &FitOptions,
    result: &FitResult,
) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::fit(format!("Failed to create result JSON '{}': {e}", path.display()))
    })?;

    let out = ResultFile {
        tool: "dipfit".to_string(),
        meta: meta.clone(),
        sphere,
        options: options.clone(),
        result: result.clone(),
    };
    serde_json::to_writer_pretty(file, &out)
        .map_err(|e| AppError::fit(format!("Failed to write result JSON: {e}")))?;
    Ok(())
}

/// Write per-channel residuals to a CSV file.
pub fn write_residuals_csv(path: &Path, residuals: &[ChannelResidual]) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::fit(format!(
            "Failed to create residual CSV '{}': {e}",
            path.display()
        ))
    })?;

    writeln!(file, "channel,measured_t,predicted_t,residual_t")
        .map_err(|e| AppError::fit(format!("Failed to write residual CSV header: {e}")))?;
    for r in residuals {
        writeln!(
            file,
            "{},{:.6e},{:.6e},{:.6e}",
            r.name, r.measured, r.predicted, r.residual
        )
        .map_err(|e| AppError::fit(format!("Failed to write residual CSV row: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dipole, PassStats};

    #[test]
    fn result_json_roundtrips() {
        let meta = SnapshotMeta {
            name: "unit".to_string(),
            date: None,
            latency: Some(0.08),
        };
        let result = FitResult {
            dipoles: vec![Dipole::new([0.0, 0.0, 3.0], [0.0, 1.0, 0.0], 10.0)],
            predicted: vec![1.0e-14, -2.0e-14],
            percent_error: 0.5,
            initial_error: 42.0,
            passes: vec![PassStats {
                iterations: 120,
                error: 0.5,
            }],
        };

        let dir = std::env::temp_dir();
        let path = dir.join("dipfit_result_roundtrip_test.json");
        write_result_json(
            &path,
            &meta,
            SphereModel::default(),
            &FitOptions::default(),
            &result,
        )
        .unwrap();

        let loaded: ResultFile =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.tool, "dipfit");
        assert_eq!(loaded.result.dipoles.len(), 1);
        assert!((loaded.result.percent_error - 0.5).abs() < 1e-12);
    }

    #[test]
    fn residual_csv_has_one_row_per_channel() {
        let residuals = vec![
            ChannelResidual {
                name: "S001".to_string(),
                measured: 1.0e-14,
                predicted: 0.9e-14,
                residual: 0.1e-14,
            },
            ChannelResidual {
                name: "S002".to_string(),
                measured: -1.0e-14,
                predicted: -1.1e-14,
                residual: 0.1e-14,
            },
        ];
        let dir = std::env::temp_dir();
        let path = dir.join("dipfit_residual_csv_test.csv");
        write_residuals_csv(&path, &residuals).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("channel,"));
        assert!(lines[1].starts_with("S001,"));
    }
}
