//! # Twiddle coefficient tuner
//!
//! Twiddle is a coordinate descent search over the three PID gains. One gain
//! is probed at a time: first it is increased by its delta, and if the
//! resulting score does not improve on the best so far it is decreased by
//! the same delta below its original value. A successful probe grows the
//! delta, an exhausted pair of probes restores the value and shrinks it.
//! Either way the search then moves on to the next gain.
//!
//! Scores are errors, lower is better. The caller runs one trial per
//! submitted score with the gains returned by the previous submission.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::Coefficients;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of tuned parameters.
pub const NUM_TUNING_PARAMS: usize = 3;

/// Factor applied to a parameter's delta after a successful probe.
pub const DELTA_GROWTH: f64 = 1.1;

/// Factor applied to a parameter's delta after both probes failed.
pub const DELTA_SHRINK: f64 = 0.9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A value being tuned along with its current probe step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParam {
    pub value: f64,
    pub delta: f64,
}

/// Twiddle tuner state
#[derive(Debug, Clone, Serialize)]
pub struct Twiddle {
    params: [TuningParam; NUM_TUNING_PARAMS],

    /// Index of the parameter currently being probed
    index: usize,

    /// Which probe of the current parameter is awaiting its score
    phase: ProbePhase,

    /// Lowest score seen so far, `None` until the first submission
    best_score: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The probe being run on the current parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbePhase {
    /// The value has been increased by its delta.
    Plus,

    /// The value has been decreased by its delta.
    Minus,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Twiddle {
    /// Create a new tuner starting from the given values and deltas.
    ///
    /// No parameter is perturbed until the first score (that of the initial
    /// values) is submitted.
    pub fn new(params: [TuningParam; NUM_TUNING_PARAMS]) -> Self {
        Self {
            params,
            index: 0,
            phase: ProbePhase::Plus,
            best_score: None,
        }
    }

    /// Submit the score of the trial run with the current parameters.
    ///
    /// Returns the parameters to use for the next trial.
    pub fn submit(&mut self, score: f64) -> [TuningParam; NUM_TUNING_PARAMS] {
        let best_score = match self.best_score {
            Some(b) => b,
            None => {
                // Baseline trial, start probing the first parameter
                self.best_score = Some(score);
                self.index = 0;
                self.probe_plus();
                return self.params;
            }
        };

        if score < best_score {
            self.best_score = Some(score);
            self.params[self.index].delta *= DELTA_GROWTH;
            self.next_param();
        }
        else {
            match self.phase {
                ProbePhase::Plus => {
                    // Undo the plus probe and go one delta below the original
                    let p = &mut self.params[self.index];
                    p.value -= 2.0 * p.delta;
                    self.phase = ProbePhase::Minus;
                }
                ProbePhase::Minus => {
                    let p = &mut self.params[self.index];
                    p.value += p.delta;
                    p.delta *= DELTA_SHRINK;
                    self.next_param();
                }
            }
        }

        self.params
    }

    /// The current parameters, including any active probe.
    pub fn params(&self) -> [TuningParam; NUM_TUNING_PARAMS] {
        self.params
    }

    /// Index of the parameter currently being probed.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The probe currently awaiting a score.
    pub fn phase(&self) -> ProbePhase {
        self.phase
    }

    /// The lowest score submitted so far.
    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    /// Sum of all deltas. The search is converging as this tends to zero,
    /// though no termination is applied here.
    pub fn delta_sum(&self) -> f64 {
        self.params.iter().map(|p| p.delta).sum()
    }

    /// Move on to the next parameter and start its plus probe.
    fn next_param(&mut self) {
        self.index = (self.index + 1) % NUM_TUNING_PARAMS;
        self.probe_plus();
    }

    fn probe_plus(&mut self) {
        let p = &mut self.params[self.index];
        p.value += p.delta;
        self.phase = ProbePhase::Plus;
    }
}

impl From<[TuningParam; NUM_TUNING_PARAMS]> for Coefficients {
    fn from(params: [TuningParam; NUM_TUNING_PARAMS]) -> Self {
        Coefficients::new(params[0].value, params[1].value, params[2].value)
    }
}

impl Coefficients {
    /// Pair these values with the given deltas for tuning.
    pub fn with_deltas(&self, deltas: &Coefficients) -> [TuningParam; NUM_TUNING_PARAMS] {
        [
            TuningParam { value: self.k_p, delta: deltas.k_p },
            TuningParam { value: self.k_i, delta: deltas.k_i },
            TuningParam { value: self.k_d, delta: deltas.k_d },
        ]
    }
}
