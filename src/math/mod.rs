//! Numerical primitives: 3-vector helpers, symmetric LDL' solve, and the
//! derivative-free simplex optimizer.

pub mod ldl;
pub mod simplex;
pub mod vec3;

pub use ldl::*;
pub use simplex::*;
pub use vec3::*;
