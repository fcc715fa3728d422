//! Shared fit-pipeline logic behind the CLI front-end.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! snapshot -> channel selection -> fit -> residuals -> rankings
//!
//! The CLI then focuses on presentation (printing and exports).

use crate::domain::{FitOptions, FitResult, SphereModel, StartGuess};
use crate::error::AppError;
use crate::fit::fit_dipoles;
use crate::io::Snapshot;
use crate::report::{compute_residuals, rank_worst_channels, ChannelResidual, Rankings};

/// All computed outputs of a single `dipfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub result: FitResult,
    /// Fitted channel names, in measurement order (after exclusions).
    pub channel_names: Vec<String>,
    /// Measurement actually fitted (after exclusions).
    pub measured: Vec<f64>,
    pub residuals: Vec<ChannelResidual>,
    pub rankings: Rankings,
}

/// Execute the full fitting pipeline on a validated snapshot.
pub fn run_fit(
    snapshot: &Snapshot,
    start: &StartGuess,
    sphere: SphereModel,
    options: &FitOptions,
    top_n: usize,
) -> Result<RunOutput, AppError> {
    snapshot.validate()?;

    let (channel_names, measured) = select_measurement(snapshot, &options.exclude_channels);

    let result = fit_dipoles(&snapshot.array, &measured, start, sphere, options)?;

    let residuals = compute_residuals(&channel_names, &measured, &result)?;
    let rankings = rank_worst_channels(&residuals, top_n);

    Ok(RunOutput {
        result,
        channel_names,
        measured,
        residuals,
        rankings,
    })
}

/// Align the snapshot's measurement (stored for all sensor channels) with
/// the fitted channel subset after exclusions.
fn select_measurement(snapshot: &Snapshot, exclude: &[String]) -> (Vec<String>, Vec<f64>) {
    let all_sensors = snapshot.array.sensor_indices(&[]);
    let kept = snapshot.array.sensor_indices(exclude);

    let mut names = Vec::with_capacity(kept.len());
    let mut measured = Vec::with_capacity(kept.len());
    for (slot, &idx) in all_sensors.iter().enumerate() {
        if kept.contains(&idx) {
            names.push(snapshot.array.channels[idx].name.clone());
            measured.push(snapshot.measured[slot]);
        }
    }
    (names, measured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Dipole;
    use crate::sim::{generate_snapshot, SimConfig};

    fn snapshot() -> Snapshot {
        let config = SimConfig {
            channels: 60,
            dipoles: vec![Dipole::new([0.0, 2.0, 4.0], [1.0, 0.0, 0.0], 10.0)],
            sphere: SphereModel::new([0.0, 0.0, 0.0]),
            ..SimConfig::default()
        };
        generate_snapshot(&config).unwrap()
    }

    #[test]
    fn pipeline_runs_end_to_end_on_synthetic_snapshot() {
        let snapshot = snapshot();
        let start = StartGuess {
            positions: vec![[0.3, 1.8, 4.2]],
            orientations: vec![[0.95, 0.3, 0.0]],
        };
        let out = run_fit(
            &snapshot,
            &start,
            SphereModel::new([0.0, 0.0, 0.0]),
            &FitOptions::default(),
            5,
        )
        .unwrap();

        assert_eq!(out.channel_names.len(), 60);
        assert_eq!(out.residuals.len(), 60);
        assert!(out.rankings.worst.len() <= 5);
        assert!(out.result.percent_error.is_finite());
    }

    #[test]
    fn exclusions_shrink_the_fitted_channel_set() {
        let snapshot = snapshot();
        let start = StartGuess {
            positions: vec![[0.0, 2.0, 4.0]],
            orientations: vec![[1.0, 0.0, 0.0]],
        };
        let options = FitOptions {
            exclude_channels: vec!["S00".to_string()], // S001..S009
            ..FitOptions::default()
        };
        let out = run_fit(
            &snapshot,
            &start,
            SphereModel::new([0.0, 0.0, 0.0]),
            &options,
            5,
        )
        .unwrap();
        assert_eq!(out.channel_names.len(), 51);
        assert!(out.channel_names.iter().all(|n| !n.starts_with("S00")));
        assert_eq!(out.measured.len(), 51);
    }
}
