//! # Episode observers
//!
//! PidCtrl reports what happens at episode boundaries through structured
//! events rather than printing them. Any number of observers can be attached
//! to a controller, the executable attaches a [`LogObserver`] and an
//! [`ArchiveObserver`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;

// Internal
use super::Coefficients;
use util::{
    archive::{ArchiveError, Archiver},
    session::Session,
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Receives events from a [`super::PidCtrl`].
///
/// Observers are called synchronously from within the frame being processed.
pub trait EpisodeObserver {
    fn on_event(&mut self, event: &EpisodeEvent);
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Something notable happening to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpisodeEvent {
    /// The controller was created. `deltas` is `Some` if it is tuning.
    Created {
        coefficients: Coefficients,
        deltas: Option<Coefficients>,
    },

    /// The maximum cross-track error of the current episode increased.
    NewMaxCte { max_cte: f64, distance_m: f64 },

    /// The vehicle left the track (or stalled), ending the episode.
    OffTrack {
        distance_m: f64,
        speed_mph: f64,
        score: f64,
    },

    /// The vehicle covered the length of the track.
    LapCompleted {
        max_cte: f64,
        distance_m: f64,
        time_s: f64,
        avg_speed_mph: f64,
    },

    /// The lap was driven well enough, tuning has stopped and these
    /// coefficients are final.
    Converged { coefficients: Coefficients },

    /// The tuner produced the coefficients for the next episode.
    CoefficientsUpdated {
        coefficients: Coefficients,
        deltas: Coefficients,
        best_score: f64,
    },
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Writes events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

/// Writes events as rows of a CSV archive.
pub struct ArchiveObserver {
    archiver: Archiver,

    /// Number of the current episode, starting at zero.
    episode: u64,
}

/// Flattened event used as a CSV row.
#[derive(Debug, Default, Serialize)]
struct EventRecord {
    episode: u64,
    event: &'static str,
    k_p: Option<f64>,
    k_i: Option<f64>,
    k_d: Option<f64>,
    dk_p: Option<f64>,
    dk_i: Option<f64>,
    dk_d: Option<f64>,
    distance_m: Option<f64>,
    time_s: Option<f64>,
    speed_mph: Option<f64>,
    max_cte: Option<f64>,
    score: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<F> EpisodeObserver for F
where
    F: FnMut(&EpisodeEvent),
{
    fn on_event(&mut self, event: &EpisodeEvent) {
        self(event)
    }
}

impl EpisodeObserver for LogObserver {
    fn on_event(&mut self, event: &EpisodeEvent) {
        match *event {
            EpisodeEvent::Created {
                coefficients: c,
                deltas: Some(d),
            } => info!(
                "Creating PID controller with initial coefficients Kp={}, Ki={}, Kd={}, \
                 dKp={}, dKi={}, dKd={}",
                c.k_p, c.k_i, c.k_d, d.k_p, d.k_i, d.k_d
            ),
            EpisodeEvent::Created {
                coefficients: c,
                deltas: None,
            } => info!(
                "Creating PID controller with final coefficients Kp={}, Ki={}, Kd={}",
                c.k_p, c.k_i, c.k_d
            ),
            EpisodeEvent::NewMaxCte { max_cte, distance_m } => {
                debug!("New max CTE {} at distance {:.2} m", max_cte, distance_m)
            }
            EpisodeEvent::OffTrack {
                distance_m,
                speed_mph,
                score,
            } => warn!(
                "Getting off track at distance {:.2} m, speed {:.2} mph (error value {})",
                distance_m, speed_mph, score
            ),
            EpisodeEvent::LapCompleted {
                max_cte,
                distance_m,
                time_s,
                avg_speed_mph,
            } => info!(
                "Max CTE is {} at distance {:.2} m, time {:.2} s, average speed {:.2} mph",
                max_cte, distance_m, time_s, avg_speed_mph
            ),
            EpisodeEvent::Converged { coefficients: c } => info!(
                "Using the final coefficients Kp={}, Ki={}, Kd={}",
                c.k_p, c.k_i, c.k_d
            ),
            EpisodeEvent::CoefficientsUpdated {
                coefficients: c,
                best_score,
                ..
            } => info!(
                "Trying PID coefficients {}, {}, {} (best error so far {})",
                c.k_p, c.k_i, c.k_d, best_score
            ),
        }
    }
}

impl ArchiveObserver {
    /// Create a new observer archiving into the session-relative path.
    pub fn new(session: &Session, path: &str) -> Result<Self, ArchiveError> {
        Ok(Self::from_archiver(Archiver::from_path(session, path)?))
    }

    /// Create a new observer writing through an existing archiver.
    pub fn from_archiver(archiver: Archiver) -> Self {
        Self {
            archiver,
            episode: 0,
        }
    }
}

impl EpisodeObserver for ArchiveObserver {
    fn on_event(&mut self, event: &EpisodeEvent) {
        let record = EventRecord::new(self.episode, event);

        // The episode number moves on once the new coefficients are in place
        if let EpisodeEvent::CoefficientsUpdated { .. } = event {
            self.episode += 1;
        }

        if let Err(e) = self.archiver.serialise(record) {
            warn!("Could not archive episode event: {}", e);
        }
    }
}

impl EventRecord {
    fn new(episode: u64, event: &EpisodeEvent) -> Self {
        let base = Self {
            episode,
            ..Default::default()
        };

        match *event {
            EpisodeEvent::Created {
                coefficients,
                deltas,
            } => Self {
                event: "created",
                dk_p: deltas.map(|d| d.k_p),
                dk_i: deltas.map(|d| d.k_i),
                dk_d: deltas.map(|d| d.k_d),
                ..base.with_coefficients(coefficients)
            },
            EpisodeEvent::NewMaxCte { max_cte, distance_m } => Self {
                event: "new_max_cte",
                max_cte: Some(max_cte),
                distance_m: Some(distance_m),
                ..base
            },
            EpisodeEvent::OffTrack {
                distance_m,
                speed_mph,
                score,
            } => Self {
                event: "off_track",
                distance_m: Some(distance_m),
                speed_mph: Some(speed_mph),
                score: Some(score),
                ..base
            },
            EpisodeEvent::LapCompleted {
                max_cte,
                distance_m,
                time_s,
                avg_speed_mph,
            } => Self {
                event: "lap_completed",
                max_cte: Some(max_cte),
                distance_m: Some(distance_m),
                time_s: Some(time_s),
                speed_mph: Some(avg_speed_mph),
                ..base
            },
            EpisodeEvent::Converged { coefficients } => Self {
                event: "converged",
                ..base.with_coefficients(coefficients)
            },
            EpisodeEvent::CoefficientsUpdated {
                coefficients,
                deltas,
                best_score,
            } => Self {
                event: "coefficients_updated",
                dk_p: Some(deltas.k_p),
                dk_i: Some(deltas.k_i),
                dk_d: Some(deltas.k_d),
                score: Some(best_score),
                ..base.with_coefficients(coefficients)
            },
        }
    }

    fn with_coefficients(self, c: Coefficients) -> Self {
        Self {
            k_p: Some(c.k_p),
            k_i: Some(c.k_i),
            k_d: Some(c.k_d),
            ..self
        }
    }
}
