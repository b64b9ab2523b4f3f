//! PID control parameters
//!
//! Parameters are either loaded from `pid_ctrl.toml` or built from the
//! command line. Either way they must pass [`Params::validate`] before a
//! controller can be built from them, so that bad thresholds are caught
//! before the first frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use thiserror::Error;

// Internal
use super::Coefficients;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default proportional gain
pub const DEFAULT_K_P: f64 = 0.12;

/// Default integral gain
pub const DEFAULT_K_I: f64 = 1e-5;

/// Default derivative gain
pub const DEFAULT_K_D: f64 = 4.0;

/// Default cross-track error at which the vehicle is considered off track
pub const DEFAULT_OFF_TRACK_CTE: f64 = 5.0;

/// Minimum allowed off track cross-track error
pub const MIN_OFF_TRACK_CTE: f64 = 0.1;

/// Minimum allowed track length
///
/// Units: meters
pub const MIN_TRACK_LENGTH_M: f64 = 50.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for PID control
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Params {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Approximate cross-track error when the vehicle leaves the track. Also
    /// scales the throttle back at high speed.
    #[serde(default = "default_off_track_cte")]
    pub off_track_cte: f64,

    /// If present the gains above are only a starting point for tuning.
    pub tuning: Option<TuningParams>,
}

/// Parameters for tuning the PID gains
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TuningParams {
    /// Initial delta of the proportional gain
    pub dk_p: f64,

    /// Initial delta of the integral gain
    pub dk_i: f64,

    /// Initial delta of the derivative gain
    pub dk_d: f64,

    /// Approximate length of the track.
    ///
    /// Units: meters
    pub track_length_m: f64,
}

/// Validated configuration of a controller which only uses final
/// coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedConfig {
    pub coefficients: Coefficients,
    pub off_track_cte: f64,
}

/// Validated configuration of a controller which tunes its coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningConfig {
    pub coefficients: Coefficients,
    pub deltas: Coefficients,
    pub off_track_cte: f64,
    pub track_length_m: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Configuration a controller is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerConfig {
    Fixed(FixedConfig),
    Tuning(TuningConfig),
}

/// Errors in the PID control parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("Expected 0, 4 or 8 values [Kp Ki Kd offTrackCte] [dKp dKi dKd trackLength], found {0}")]
    InvalidArgCount(usize),

    #[error("{0} must be a finite number, found {1}")]
    NotFinite(&'static str, f64),

    #[error("offTrackCte may not be negative, found {0}")]
    NegativeOffTrackCte(f64),

    #[error("offTrackCte must be at least {}, found {0}", MIN_OFF_TRACK_CTE)]
    OffTrackCteTooSmall(f64),

    #[error("trackLength may not be negative, found {0}")]
    NegativeTrackLength(f64),

    #[error("trackLength must be at least {} m, found {0}", MIN_TRACK_LENGTH_M)]
    TrackLengthTooShort(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            k_p: DEFAULT_K_P,
            k_i: DEFAULT_K_I,
            k_d: DEFAULT_K_D,
            off_track_cte: DEFAULT_OFF_TRACK_CTE,
            tuning: None,
        }
    }
}

impl Params {
    /// Build the parameters from the positional command line values
    /// `[Kp Ki Kd offTrackCte] [dKp dKi dKd trackLength]`.
    ///
    /// No values gives the defaults.
    pub fn from_args(args: &[f64]) -> Result<Self, ParamsError> {
        match *args {
            [] => Ok(Self::default()),
            [k_p, k_i, k_d, off_track_cte] => Ok(Self {
                k_p,
                k_i,
                k_d,
                off_track_cte,
                tuning: None,
            }),
            [k_p, k_i, k_d, off_track_cte, dk_p, dk_i, dk_d, track_length_m] => Ok(Self {
                k_p,
                k_i,
                k_d,
                off_track_cte,
                tuning: Some(TuningParams {
                    dk_p,
                    dk_i,
                    dk_d,
                    track_length_m,
                }),
            }),
            _ => Err(ParamsError::InvalidArgCount(args.len())),
        }
    }

    /// Check the parameters and build the controller configuration.
    pub fn validate(&self) -> Result<ControllerConfig, ParamsError> {
        check_finite("Kp", self.k_p)?;
        check_finite("Ki", self.k_i)?;
        check_finite("Kd", self.k_d)?;
        check_finite("offTrackCte", self.off_track_cte)?;

        if self.off_track_cte < 0.0 {
            return Err(ParamsError::NegativeOffTrackCte(self.off_track_cte));
        }
        if self.off_track_cte < MIN_OFF_TRACK_CTE {
            return Err(ParamsError::OffTrackCteTooSmall(self.off_track_cte));
        }

        let coefficients = Coefficients::new(self.k_p, self.k_i, self.k_d);

        let tuning = match self.tuning {
            Some(t) => t,
            None => {
                return Ok(ControllerConfig::Fixed(FixedConfig {
                    coefficients,
                    off_track_cte: self.off_track_cte,
                }))
            }
        };

        check_finite("dKp", tuning.dk_p)?;
        check_finite("dKi", tuning.dk_i)?;
        check_finite("dKd", tuning.dk_d)?;
        check_finite("trackLength", tuning.track_length_m)?;

        if tuning.track_length_m < 0.0 {
            return Err(ParamsError::NegativeTrackLength(tuning.track_length_m));
        }
        if tuning.track_length_m < MIN_TRACK_LENGTH_M {
            return Err(ParamsError::TrackLengthTooShort(tuning.track_length_m));
        }

        Ok(ControllerConfig::Tuning(TuningConfig {
            coefficients,
            deltas: Coefficients::new(tuning.dk_p, tuning.dk_i, tuning.dk_d),
            off_track_cte: self.off_track_cte,
            track_length_m: tuning.track_length_m,
        }))
    }
}

fn check_finite(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value.is_finite() {
        Ok(())
    }
    else {
        Err(ParamsError::NotFinite(name, value))
    }
}

fn default_off_track_cte() -> f64 {
    DEFAULT_OFF_TRACK_CTE
}
