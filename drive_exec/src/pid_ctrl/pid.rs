//! # PID law
//!
//! The steering correction for a given cross-track error. The controller is
//! frame-based rather than time-based, the simulator sends telemetry at a
//! fixed rate so the integral is a plain sum of errors and the derivative a
//! plain difference.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The three gains of a PID controller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,
}

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Gains in use. Only ever replaced by building a new controller.
    coeffs: Coefficients,

    /// Previous error, zero before the first call
    prev_error: f64,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Coefficients {
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self { k_p, k_i, k_d }
    }
}

impl PidController {
    /// Create a new controller with the given gains and empty history.
    pub fn new(coeffs: Coefficients) -> Self {
        Self {
            coeffs,
            prev_error: 0f64,
            integral: 0f64,
        }
    }

    /// The gains of this controller.
    pub fn coefficients(&self) -> Coefficients {
        self.coeffs
    }

    /// Get the correction for the given error.
    ///
    /// The correction opposes the error, so a vehicle to the right of the
    /// centre line (positive error) is steered left (negative output).
    pub fn get(&mut self, error: f64) -> f64 {
        self.integral += error;

        let deriv = error - self.prev_error;
        self.prev_error = error;

        -(self.coeffs.k_p * error
            + self.coeffs.k_i * self.integral
            + self.coeffs.k_d * deriv)
    }
}
