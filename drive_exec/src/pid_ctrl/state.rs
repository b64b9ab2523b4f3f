//! PID control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
use super::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// PID control module state.
///
/// Frames must be processed one at a time, in order. Each controller owns
/// its own history, so a second vehicle needs a second controller.
pub struct PidCtrl {
    /// Executing mode
    mode: PidCtrlMode,

    /// The controller producing the steering demand
    pid: PidController,

    /// Cross-track error at which the vehicle is considered off track
    off_track_cte: f64,

    /// Observers notified of episode events
    observers: Vec<Box<dyn EpisodeObserver>>,
}

/// Bookkeeping for one attempt at driving the track.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Episode {
    /// Distance travelled since the start of the episode
    ///
    /// Units: meters
    pub distance_m: f64,

    /// Time elapsed since the start of the episode
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Largest cross-track error seen once past the start of the track
    pub max_cte: f64,
}

/// State kept while the coefficients are being tuned.
#[derive(Debug, Clone)]
pub struct TuningState {
    /// The tuner, persisting across episodes
    twiddle: Twiddle,

    /// The current episode
    episode: Episode,

    /// Approximate length of the track
    ///
    /// Units: meters
    track_length_m: f64,
}

/// A normalised drive command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlCmd {
    /// Steering demand in `[-1, 1]`, negative steers left.
    pub steering: f64,

    /// Throttle demand in `[-1, 1]`, negative brakes.
    pub throttle: f64,
}

/// The status of the controller after processing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusReport {
    /// True while the coefficients are still being tuned
    pub tuning: bool,

    /// The current episode, all zero once the coefficients are final
    pub episode: Episode,

    /// The coefficients currently driving the vehicle
    pub coefficients: Coefficients,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The possible modes of execution of PidCtrl.
#[derive(Debug, Clone)]
pub enum PidCtrlMode {
    /// Episodes are tracked and their scores fed to the tuner.
    Tuning(TuningState),

    /// The coefficients are final, every frame is passed straight to the
    /// PID controller. Once entered this mode is never left.
    Fixed,
}

/// The result of processing a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutput {
    /// Drive the vehicle with this command.
    Control(ControlCmd),

    /// The episode is over, the vehicle must be reset to the start of the
    /// track. No command is produced on this frame.
    EpisodeEnded,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidCtrl {
    /// Create a new controller with no observers.
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_observers(config, Vec::new())
    }

    /// Create a new controller reporting to the given observers.
    pub fn with_observers(
        config: ControllerConfig,
        observers: Vec<Box<dyn EpisodeObserver>>
    ) -> Self {
        let (mode, coefficients, off_track_cte, deltas) = match config {
            ControllerConfig::Fixed(c) => (
                PidCtrlMode::Fixed,
                c.coefficients,
                c.off_track_cte,
                None
            ),
            ControllerConfig::Tuning(c) => (
                PidCtrlMode::Tuning(TuningState {
                    twiddle: Twiddle::new(c.coefficients.with_deltas(&c.deltas)),
                    episode: Episode::default(),
                    track_length_m: c.track_length_m,
                }),
                c.coefficients,
                c.off_track_cte,
                Some(c.deltas)
            ),
        };

        let mut ctrl = Self {
            mode,
            pid: PidController::new(coefficients),
            off_track_cte,
            observers,
        };

        ctrl.notify(&EpisodeEvent::Created { coefficients, deltas });

        ctrl
    }

    /// Process one frame of telemetry.
    ///
    /// `speed_mph` is the vehicle speed in miles per hour.
    pub fn proc(&mut self, cte: f64, speed_mph: f64) -> FrameOutput {
        if let Some(out) = self.track_episode(cte, speed_mph) {
            return out;
        }

        FrameOutput::Control(self.control(cte, speed_mph))
    }

    /// The current status of the controller.
    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            tuning: self.is_tuning(),
            episode: match self.mode {
                PidCtrlMode::Tuning(ref t) => t.episode,
                PidCtrlMode::Fixed => Episode::default(),
            },
            coefficients: self.pid.coefficients(),
        }
    }

    /// The current execution mode.
    pub fn mode(&self) -> &PidCtrlMode {
        &self.mode
    }

    /// True while the coefficients are still being tuned.
    pub fn is_tuning(&self) -> bool {
        matches!(self.mode, PidCtrlMode::Tuning(_))
    }

    /// The coefficients currently driving the vehicle.
    pub fn coefficients(&self) -> Coefficients {
        self.pid.coefficients()
    }

    /// Add an observer to the controller.
    pub fn add_observer(&mut self, observer: Box<dyn EpisodeObserver>) {
        self.observers.push(observer);
    }

    /// Update the episode bookkeeping, returning `Some` if the frame ended
    /// the episode.
    ///
    /// Does nothing once the coefficients are final.
    fn track_episode(&mut self, cte: f64, speed_mph: f64) -> Option<FrameOutput> {
        let Self {
            mode,
            pid,
            off_track_cte,
            observers,
        } = self;
        let off_track_cte = *off_track_cte;

        let tuning = match &mut *mode {
            PidCtrlMode::Tuning(t) => t,
            PidCtrlMode::Fixed => return None,
        };

        // ---- ACCUMULATION ----

        let ep = &mut tuning.episode;
        ep.distance_m += speed_mph * SPEED_TO_DISTANCE_COEFF;
        ep.time_s += SECONDS_PER_FRAME;

        // Ignore the start of the track, where the error is dominated by the
        // initial conditions
        if cte > ep.max_cte && ep.distance_m > tuning.track_length_m * MAX_CTE_SKIP_FRACTION {
            ep.max_cte = cte;
            notify(observers, &EpisodeEvent::NewMaxCte {
                max_cte: cte,
                distance_m: ep.distance_m,
            });
        }

        trace!("Episode: {:?}", ep);

        // ---- OFF TRACK ----

        if ep.distance_m > MIN_MEASUREMENT_DISTANCE_M
            && (cte.abs() > off_track_cte || speed_mph < MIN_SPEED_MPH)
        {
            // Leaving the track sooner scores worse
            let score = OFF_TRACK_PENALTY / ep.distance_m;

            notify(observers, &EpisodeEvent::OffTrack {
                distance_m: ep.distance_m,
                speed_mph,
                score,
            });

            tuning.retune(score, pid, observers);
            return Some(FrameOutput::EpisodeEnded);
        }

        // ---- TRACK COMPLETE ----

        if ep.distance_m > tuning.track_length_m {
            let max_cte = ep.max_cte;

            notify(observers, &EpisodeEvent::LapCompleted {
                max_cte,
                distance_m: ep.distance_m,
                time_s: ep.time_s,
                avg_speed_mph: ep.distance_m / (ep.time_s * MPH_TO_MPS),
            });

            if max_cte < off_track_cte / 2.0 {
                notify(observers, &EpisodeEvent::Converged {
                    coefficients: pid.coefficients(),
                });
                *mode = PidCtrlMode::Fixed;
                return None;
            }

            tuning.retune(max_cte, pid, observers);
            return Some(FrameOutput::EpisodeEnded);
        }

        None
    }

    /// Calculate the drive command for the frame.
    fn control(&mut self, cte: f64, speed_mph: f64) -> ControlCmd {
        let steering = self.pid.get(cte).clamp(-1.0, 1.0);

        // Ease off the throttle at high speed as the error grows
        let throttle = if speed_mph > HIGH_SPEED_MPH {
            (1.0 - 4.0 * cte.abs() / self.off_track_cte).clamp(-1.0, 1.0)
        }
        else {
            1.0
        };

        ControlCmd { steering, throttle }
    }

    fn notify(&mut self, event: &EpisodeEvent) {
        notify(&mut self.observers, event)
    }
}

impl TuningState {
    /// The tuner driving this state.
    pub fn twiddle(&self) -> &Twiddle {
        &self.twiddle
    }

    /// The current episode.
    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    /// Submit the score of the finished episode, replace the PID controller
    /// with one using the new coefficients and start a new episode.
    fn retune(
        &mut self,
        score: f64,
        pid: &mut PidController,
        observers: &mut [Box<dyn EpisodeObserver>]
    ) {
        let params = self.twiddle.submit(score);
        let coefficients = Coefficients::from(params);

        *pid = PidController::new(coefficients);
        self.episode = Episode::default();

        notify(observers, &EpisodeEvent::CoefficientsUpdated {
            coefficients,
            deltas: Coefficients::new(params[0].delta, params[1].delta, params[2].delta),
            best_score: self.twiddle.best_score().unwrap_or(score),
        });
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn notify(observers: &mut [Box<dyn EpisodeObserver>], event: &EpisodeEvent) {
    for o in observers.iter_mut() {
        o.on_event(event);
    }
}
