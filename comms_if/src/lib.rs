//! # Communications interface crate.
//!
//! Provides the communications interfaces between the drive software and the
//! vehicle simulator.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Simulator message framing (telemetry in, steer/reset/manual out)
pub mod sim;

/// Network module
pub mod net;
