//! Dipole fitting engine.
//!
//! Responsibilities:
//!
//! - solve source moments linearly at fixed positions/orientations
//!   (`moments`)
//! - evaluate the percent-error objective the optimizer minimizes
//!   (`objective`)
//! - orchestrate validation, restart passes, polarity normalization and
//!   result assembly (`fitter`)

pub mod fitter;
pub mod moments;
pub mod objective;

pub use fitter::*;
pub use moments::*;
pub use objective::*;
