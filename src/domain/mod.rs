//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the dipole source model (`Dipole`, `SphereModel`)
//! - fit configuration (`FitOptions`, `StartGuess`)
//! - fit outputs (`FitResult`, `PassStats`)
//! - snapshot metadata (`SnapshotMeta`)

pub mod types;

pub use types::*;
