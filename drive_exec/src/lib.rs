//! # Drive library.
//!
//! This library allows other crates in the workspace, as well as the tests and benchmarks, to
//! access items defined inside the drive crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// PID control module - steers the vehicle along the track and tunes its own coefficients
pub mod pid_ctrl;

/// Simulator server - recieves telemetry from the simulator and answers with drive commands
pub mod sim_server;
