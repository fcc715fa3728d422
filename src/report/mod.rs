//! Reporting utilities: per-channel residuals, worst-channel rankings, and
//! formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FitOptions, FitResult, SnapshotMeta, SphereModel};
use crate::error::AppError;

/// One active sensor channel's measured/predicted pair.
#[derive(Debug, Clone)]
pub struct ChannelResidual {
    pub name: String,
    pub measured: f64,
    pub predicted: f64,
    pub residual: f64,
}

/// Worst-fitting channels, largest absolute residual first.
#[derive(Debug, Clone)]
pub struct Rankings {
    pub worst: Vec<ChannelResidual>,
}

/// Pair each fitted channel with its prediction.
///
/// `names` and `measured` follow the fitted channel order (after
/// exclusions), as does `result.predicted`.
pub fn compute_residuals(
    names: &[String],
    measured: &[f64],
    result: &FitResult,
) -> Result<Vec<ChannelResidual>, AppError> {
    if names.len() != measured.len() || measured.len() != result.predicted.len() {
        return Err(AppError::fit(format!(
            "Residual computation length mismatch: {} names, {} measured, {} predicted.",
            names.len(),
            measured.len(),
            result.predicted.len()
        )));
    }
    Ok(names
        .iter()
        .zip(measured.iter().zip(result.predicted.iter()))
        .map(|(name, (&m, &p))| ChannelResidual {
            name: name.clone(),
            measured: m,
            predicted: p,
            residual: m - p,
        })
        .collect())
}

/// Rank channels by absolute residual, worst first. Ties keep channel
/// order, so output is deterministic.
pub fn rank_worst_channels(residuals: &[ChannelResidual], top_n: usize) -> Rankings {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| {
        b.residual
            .abs()
            .partial_cmp(&a.residual.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(top_n);
    Rankings { worst: sorted }
}

/// Format the full fit summary: snapshot info, per-pass diagnostics, and
/// the fitted dipole table.
pub fn format_fit_summary(
    meta: &SnapshotMeta,
    sphere: SphereModel,
    options: &FitOptions,
    result: &FitResult,
    num_channels: usize,
) -> String {
    let mut out = String::new();

    out.push_str("=== dipfit - equivalent current-dipole fit ===\n");
    out.push_str(&format!("Snapshot: {}\n", meta.name));
    if let Some(date) = meta.date {
        out.push_str(&format!("Acquired: {date}\n"));
    }
    if let Some(latency) = meta.latency {
        out.push_str(&format!("Latency: {latency} s\n"));
    }
    out.push_str(&format!(
        "Channels: {num_channels} | sphere origin: ({:.2}, {:.2}, {:.2}) cm | model: {}\n",
        sphere.origin[0],
        sphere.origin[1],
        sphere.origin[2],
        if options.magnetic_only {
            "magnetic dipole"
        } else {
            "conducting sphere"
        },
    ));
    if !options.exclude_channels.is_empty() {
        out.push_str(&format!("Excluded: {}\n", options.exclude_channels.join(", ")));
    }

    out.push_str(&format!("\nInitial error: {:.4} %\n", result.initial_error));
    for (i, pass) in result.passes.iter().enumerate() {
        out.push_str(&format!(
            "  pass {}: {} iterations, error {:.6} %\n",
            i + 1,
            pass.iterations,
            pass.error
        ));
    }
    out.push_str(&format!("Final error: {:.6} %\n", result.percent_error));

    out.push_str("\nFitted dipoles:\n");
    for (k, d) in result.dipoles.iter().enumerate() {
        out.push_str(&format!(
            "  {}: position ({:.3}, {:.3}, {:.3}) cm | orientation ({:.4}, {:.4}, {:.4}) | moment {:.3} nAm\n",
            k + 1,
            d.position[0],
            d.position[1],
            d.position[2],
            d.orientation[0],
            d.orientation[1],
            d.orientation[2],
            d.moment
        ));
    }

    out
}

/// Format the worst-channel table.
pub fn format_rankings(rankings: &Rankings) -> String {
    let mut out = String::new();
    out.push_str("Worst channels (|residual|):\n");
    for r in &rankings.worst {
        out.push_str(&format!(
            "  {:<8} measured {:>12.4e} T | predicted {:>12.4e} T | residual {:>12.4e} T\n",
            r.name, r.measured, r.predicted, r.residual
        ));
    }
    out
}
