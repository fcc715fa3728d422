//! Command-line parsing for the dipole fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dipfit", version, about = "Equivalent current-dipole fitting for MEG field snapshots")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit dipoles to a snapshot, print diagnostics, optionally plot/export.
    Fit(FitArgs),
    /// Generate a synthetic snapshot from known dipoles.
    Sim(SimArgs),
}

/// Options for `dipfit fit`.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Snapshot JSON file (geometry + measured field).
    #[arg(short = 's', long)]
    pub snapshot: PathBuf,

    /// Start position per dipole, repeatable: `--start-pos x,y,z` (cm).
    #[arg(long = "start-pos", value_parser = parse_triple, required = true)]
    pub start_pos: Vec<[f64; 3]>,

    /// Start orientation per dipole, repeatable: `--start-ori x,y,z`.
    #[arg(long = "start-ori", value_parser = parse_triple, required = true)]
    pub start_ori: Vec<[f64; 3]>,

    /// Sphere origin `x,y,z` in cm (default 0,0,5).
    #[arg(long, value_parser = parse_triple)]
    pub sphere: Option<[f64; 3]>,

    /// Number of simplex restart passes.
    #[arg(long, default_value_t = crate::domain::DEFAULT_NUM_PASSES)]
    pub passes: usize,

    /// Simplex iteration budget per pass.
    #[arg(long, default_value_t = crate::domain::DEFAULT_MAX_ITERATIONS)]
    pub iterations: usize,

    /// Simplex termination tolerance.
    #[arg(long, default_value_t = crate::domain::DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Use the free-space magnetic-dipole model (no conductor, no
    /// tangential constraint).
    #[arg(long)]
    pub magnetic: bool,

    /// Use dewar-frame coil geometry.
    #[arg(long)]
    pub dewar: bool,

    /// Channel name prefix to exclude from the fit (repeatable).
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Render an ASCII plot of measured vs. fitted topography.
    #[arg(long)]
    pub plot: bool,

    /// Plot width in characters.
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height in characters.
    #[arg(long, default_value_t = 16)]
    pub height: usize,

    /// How many worst channels to list.
    #[arg(long, default_value_t = 8)]
    pub top: usize,

    /// Write the fit result as JSON.
    #[arg(long = "export-result")]
    pub export_result: Option<PathBuf>,

    /// Write per-channel residuals as CSV.
    #[arg(long = "export-residuals")]
    pub export_residuals: Option<PathBuf>,
}

/// Options for `dipfit sim`.
#[derive(Debug, Parser, Clone)]
pub struct SimArgs {
    /// Output snapshot JSON path.
    #[arg(short = 'o', long)]
    pub out: PathBuf,

    /// Snapshot name recorded in the metadata.
    #[arg(long, default_value = "sim")]
    pub name: String,

    /// Number of sensor channels.
    #[arg(short = 'n', long, default_value_t = 151)]
    pub channels: usize,

    /// Source dipole, repeatable: `--dipole x,y,z:ox,oy,oz:moment`
    /// (cm / unit vector / nAm).
    #[arg(long = "dipole", value_parser = parse_dipole, required = true)]
    pub dipoles: Vec<DipoleSpec>,

    /// Sphere origin `x,y,z` in cm (default 0,0,5).
    #[arg(long, value_parser = parse_triple)]
    pub sphere: Option<[f64; 3]>,

    /// Gaussian sensor noise standard deviation in fT.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Noise RNG seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Parsed `--dipole` specification.
#[derive(Debug, Clone, PartialEq)]
pub struct DipoleSpec {
    pub position: [f64; 3],
    pub orientation: [f64; 3],
    pub moment: f64,
}

/// Parse `x,y,z` into a 3-vector.
pub fn parse_triple(s: &str) -> Result<[f64; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected `x,y,z`, got `{s}`"));
    }
    let mut out = [0.0; 3];
    for (slot, part) in out.iter_mut().zip(parts.iter()) {
        *slot = part
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid number `{part}`: {e}"))?;
    }
    Ok(out)
}

/// Parse `x,y,z:ox,oy,oz:moment` into a dipole specification.
pub fn parse_dipole(s: &str) -> Result<DipoleSpec, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("expected `x,y,z:ox,oy,oz:moment`, got `{s}`"));
    }
    let position = parse_triple(parts[0])?;
    let orientation = parse_triple(parts[1])?;
    let moment = parts[2]
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid moment `{}`: {e}", parts[2]))?;
    Ok(DipoleSpec {
        position,
        orientation,
        moment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_triple_handles_spaces_and_signs() {
        assert_eq!(parse_triple("1, -2.5, 3e-1").unwrap(), [1.0, -2.5, 0.3]);
        assert!(parse_triple("1,2").is_err());
        assert!(parse_triple("a,b,c").is_err());
    }

    #[test]
    fn parse_dipole_splits_three_sections() {
        let spec = parse_dipole("0,0,3:0,1,0:10").unwrap();
        assert_eq!(spec.position, [0.0, 0.0, 3.0]);
        assert_eq!(spec.orientation, [0.0, 1.0, 0.0]);
        assert!((spec.moment - 10.0).abs() < 1e-12);
        assert!(parse_dipole("0,0,3:0,1,0").is_err());
    }

    #[test]
    fn fit_command_parses_minimal_invocation() {
        let cli = Cli::try_parse_from([
            "dipfit",
            "fit",
            "--snapshot",
            "snap.json",
            "--start-pos",
            "0,0,4",
            "--start-ori",
            "0,1,0",
        ])
        .unwrap();
        match cli.command {
            Command::Fit(args) => {
                assert_eq!(args.start_pos.len(), 1);
                assert_eq!(args.passes, 2);
                assert!((args.tolerance - 0.001).abs() < 1e-15);
            }
            _ => panic!("expected fit subcommand"),
        }
    }
}
