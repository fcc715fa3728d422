//! Input/output helpers.
//!
//! - snapshot JSON read/write (`snapshot`)
//! - fit result JSON and per-channel residual CSV exports (`export`)

pub mod export;
pub mod snapshot;

pub use export::*;
pub use snapshot::*;
