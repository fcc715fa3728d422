//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads or synthesizes snapshots
//! - runs the fit pipeline
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;

use crate::cli::{Cli, Command, FitArgs, SimArgs};
use crate::domain::{Dipole, FitOptions, SphereModel, StartGuess};
use crate::error::AppError;
use crate::sim::SimConfig;

pub mod pipeline;

/// Entry point for the `dipfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Sim(args) => handle_sim(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let snapshot = crate::io::read_snapshot(&args.snapshot)?;

    let start = StartGuess {
        positions: args.start_pos.clone(),
        orientations: args.start_ori.clone(),
    };
    let sphere = args.sphere.map(SphereModel::new).unwrap_or_default();
    let options = FitOptions {
        max_passes: args.passes,
        max_iterations: args.iterations,
        tolerance: args.tolerance,
        magnetic_only: args.magnetic,
        dewar_coords: args.dewar,
        exclude_channels: args.exclude.clone(),
    };

    let run = pipeline::run_fit(&snapshot, &start, sphere, &options, args.top)?;

    println!(
        "{}",
        crate::report::format_fit_summary(
            &snapshot.meta,
            sphere,
            &options,
            &run.result,
            run.channel_names.len(),
        )
    );
    println!("{}", crate::report::format_rankings(&run.rankings));

    if args.plot {
        let plot = crate::plot::render_topography_plot(&run.residuals, args.width, args.height);
        println!("{plot}");
    }

    if let Some(path) = &args.export_result {
        crate::io::write_result_json(path, &snapshot.meta, sphere, &options, &run.result)?;
    }
    if let Some(path) = &args.export_residuals {
        crate::io::write_residuals_csv(path, &run.residuals)?;
    }

    Ok(())
}

fn handle_sim(args: SimArgs) -> Result<(), AppError> {
    let config = SimConfig {
        name: args.name.clone(),
        channels: args.channels,
        sphere: args.sphere.map(SphereModel::new).unwrap_or_default(),
        dipoles: args
            .dipoles
            .iter()
            .map(|d| Dipole::new(d.position, d.orientation, d.moment))
            .collect(),
        noise_ft: args.noise,
        seed: args.seed,
        ..SimConfig::default()
    };

    let snapshot = crate::sim::generate_snapshot(&config)?;
    crate::io::write_snapshot(&args.out, &snapshot)?;

    println!(
        "Wrote snapshot '{}' ({} channels, {} source(s), noise {} fT, seed {}).",
        args.out.display(),
        config.channels,
        config.dipoles.len(),
        config.noise_ft,
        config.seed
    );
    Ok(())
}
