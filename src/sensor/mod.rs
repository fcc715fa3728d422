//! Sensor-array geometry (the head-model collaborator).
//!
//! This module owns the read-only per-channel data the fit consumes:
//!
//! - coil positions/orientations (head frame, optional dewar frame)
//! - channel role flags (sensor / reference / balancing reference)
//! - per-channel sphere origins (multi-sphere head models)
//! - gradient-balancing coefficient tables for orders 1–4
//!
//! Reading the acquisition system's binary dataset layout is out of scope;
//! arrays arrive either from snapshot JSON (`crate::io`) or from the
//! synthetic generator (`crate::sim`).

pub mod channel;

pub use channel::*;
