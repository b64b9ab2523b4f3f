//! # PID control module
//!
//! PID control keeps the vehicle on the track by steering against the
//! cross-track error (CTE), the signed distance between the vehicle and the
//! centre line of the track.
//!
//! The controller can either drive with final coefficients, or tune its own
//! coefficients while driving. When tuning, each attempt at driving the track
//! is an episode. An episode ends when the vehicle leaves the track (scored by
//! how far it got) or completes a lap (scored by the largest error seen on
//! the way). The score is handed to the Twiddle tuner, which picks the
//! coefficients for the next episode, and the vehicle is reset to the start.
//! A lap driven with a small enough error makes its coefficients final.
//!
//! Tuning has no termination of its own, it carries on until the
//! coefficients converge or the process exits.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod observer;
mod params;
mod pid;
mod state;
mod twiddle;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use observer::*;
pub use params::*;
pub use pid::*;
pub use state::*;
pub use twiddle::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Rate at which the simulator sends telemetry.
///
/// Units: frames/second
pub const FRAME_RATE_HZ: f64 = 25.0;

/// Time covered by a single frame.
///
/// Units: seconds
pub const SECONDS_PER_FRAME: f64 = 1.0 / FRAME_RATE_HZ;

/// Number of meters in a mile.
pub const METERS_IN_MILE: f64 = 1609.344;

/// Conversion factor from miles/hour to meters/second.
pub const MPH_TO_MPS: f64 = METERS_IN_MILE / (60.0 * 60.0);

/// Distance covered in one frame per mile/hour of speed.
///
/// Units: meters/(miles/hour)
pub const SPEED_TO_DISTANCE_COEFF: f64 = MPH_TO_MPS / FRAME_RATE_HZ;

/// Distance that must be covered before leaving the track is checked for.
///
/// Units: meters
pub const MIN_MEASUREMENT_DISTANCE_M: f64 = 5.0;

/// Fraction of the track at the start of each episode over which the
/// maximum error is not tracked.
pub const MAX_CTE_SKIP_FRACTION: f64 = 0.025;

/// Penalty for leaving the track, divided by the distance covered to get the
/// episode's score.
pub const OFF_TRACK_PENALTY: f64 = 1e6;

/// Speed under which the vehicle is considered stalled.
///
/// Units: miles/hour
pub const MIN_SPEED_MPH: f64 = 1.0;

/// Speed above which the throttle is backed off with increasing error.
///
/// Units: miles/hour
pub const HIGH_SPEED_MPH: f64 = 60.0;
