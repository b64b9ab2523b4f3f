//! Integration tests of the PID control module, driving it frame by frame as the simulator would.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{cell::RefCell, f64::consts::PI, rc::Rc};

use drive_lib::pid_ctrl::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const K_P: f64 = 0.1;
const K_I: f64 = 1e-4;
const K_D: f64 = 4.0;
const OFF_TRACK_CTE: f64 = 5.0;
const DK_P: f64 = 0.01;
const DK_I: f64 = 1e-5;
const DK_D: f64 = 0.1;

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

/// Kinematic bicycle model of a vehicle, driving along the x axis when its orientation is zero.
struct Robot {
    x: f64,
    y: f64,
    orientation: f64,
}

impl Robot {
    const LENGTH: f64 = 20.0;
    const MAX_STEERING: f64 = PI / 4.0;
    const STRAIGHT_TOLERANCE: f64 = 0.001;

    fn new(x: f64, y: f64, orientation: f64) -> Self {
        Self {
            x,
            y,
            orientation: orientation.rem_euclid(2.0 * PI),
        }
    }

    fn step(&mut self, steering: f64, distance: f64) {
        let steering = steering.clamp(-Self::MAX_STEERING, Self::MAX_STEERING);
        let distance = distance.max(0.0);

        let turn = steering.tan() * distance / Self::LENGTH;

        if turn.abs() < Self::STRAIGHT_TOLERANCE {
            self.x += distance * self.orientation.cos();
            self.y += distance * self.orientation.sin();
            self.orientation = (self.orientation + turn).rem_euclid(2.0 * PI);
        }
        else {
            let radius = distance / turn;
            let cx = self.x - self.orientation.sin() * radius;
            let cy = self.y + self.orientation.cos() * radius;
            self.orientation = (self.orientation + turn).rem_euclid(2.0 * PI);
            self.x = cx + self.orientation.sin() * radius;
            self.y = cy - self.orientation.cos() * radius;
        }
    }
}

fn tuning(track_length_m: f64) -> PidCtrl {
    PidCtrl::new(ControllerConfig::Tuning(TuningConfig {
        coefficients: Coefficients::new(K_P, K_I, K_D),
        deltas: Coefficients::new(DK_P, DK_I, DK_D),
        off_track_cte: OFF_TRACK_CTE,
        track_length_m,
    }))
}

fn expect_control(out: FrameOutput) -> ControlCmd {
    match out {
        FrameOutput::Control(c) => c,
        FrameOutput::EpisodeEnded => panic!("Expected a control command, the episode ended"),
    }
}

fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "{} != {} (tolerance {})", a, b, tol);
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[test]
fn test_final_coefficients_converge() {
    let mut ctrl = PidCtrl::new(ControllerConfig::Fixed(FixedConfig {
        coefficients: Coefficients::new(K_P, K_I, K_D),
        off_track_cte: OFF_TRACK_CTE,
    }));

    // The robot is driven by its own copy of the control law, the controller follows the same
    // errors and should settle on the same, near zero, demand.
    let mut robot = Robot::new(0.0, 1.0, 0.0);
    let mut prev_cte = robot.y;
    let mut cte_sum = 0.0;
    let mut cmd = None;

    for _ in 0..200 {
        let cte = robot.y;
        cte_sum += cte;
        let angle = -K_P * cte - K_D * (cte - prev_cte) - K_I * cte_sum;
        prev_cte = cte;
        robot.step(angle, 1.0);

        cmd = Some(expect_control(ctrl.proc(cte, 60.0)));
    }

    let cmd = cmd.unwrap();
    assert_close(cmd.steering, 0.0, 1e-3);
    assert_close(cmd.throttle, 1.0, 0.1);
    assert!(robot.x > 150.0);
}

#[test]
fn test_initial_coefficients_on_track() {
    let mut ctrl = tuning(10.0);

    let mut cmd = None;
    for _ in 0..5 {
        cmd = Some(expect_control(ctrl.proc(4.99, 100.0)));
    }

    let cmd = cmd.unwrap();
    assert_close(cmd.steering, -0.5, 0.1);
    assert_close(cmd.throttle, -1.0, 1e-3);
    assert!(ctrl.is_tuning());
}

#[test]
fn test_initial_coefficients_off_track() {
    let mut ctrl = tuning(10.0);

    for _ in 0..5 {
        expect_control(ctrl.proc(4.99, 100.0));
    }

    assert_eq!(ctrl.proc(5.01, 100.0), FrameOutput::EpisodeEnded);

    // The first score probes the proportional gain
    assert_close(ctrl.coefficients().k_p, K_P + DK_P, 1e-12);
    assert_eq!(ctrl.status_report().episode, Episode::default());
}

#[test]
fn test_initial_coefficients_track_complete() {
    let mut ctrl = tuning(10.0);

    for _ in 0..5 {
        expect_control(ctrl.proc(4.99, 100.0));
    }

    // A lap with a large error is scored rather than accepted
    assert_eq!(ctrl.proc(4.99, 100.0), FrameOutput::EpisodeEnded);
    assert!(ctrl.is_tuning());

    match ctrl.mode() {
        PidCtrlMode::Tuning(t) => assert_eq!(t.twiddle().best_score(), Some(4.99)),
        PidCtrlMode::Fixed => panic!("Expected to still be tuning"),
    }
}

#[test]
fn test_tuning_trajectory() {
    let mut ctrl = tuning(1000.0);

    let drive_episode = |ctrl: &mut PidCtrl, frames_on_track: usize| {
        for _ in 0..frames_on_track {
            expect_control(ctrl.proc(0.0, 100.0));
        }
        assert_eq!(ctrl.proc(6.0, 100.0), FrameOutput::EpisodeEnded);
    };

    // Baseline, Kp is probed upwards
    drive_episode(&mut ctrl, 5);
    assert_close(ctrl.coefficients().k_p, K_P + DK_P, 1e-12);

    // Leaving the track sooner is worse, Kp is probed downwards
    drive_episode(&mut ctrl, 2);
    assert_close(ctrl.coefficients().k_p, K_P - DK_P, 1e-12);

    // Getting further is better, Kp is kept and Ki is probed
    drive_episode(&mut ctrl, 10);
    let c = ctrl.coefficients();
    assert_close(c.k_p, K_P - DK_P, 1e-12);
    assert_close(c.k_i, K_I + DK_I, 1e-12);
    assert_eq!(c.k_d, K_D);

    match ctrl.mode() {
        PidCtrlMode::Tuning(t) => {
            let tw = t.twiddle();
            assert_eq!(tw.index(), 1);
            assert_eq!(tw.phase(), ProbePhase::Plus);
            assert_close(tw.params()[0].delta, DK_P * DELTA_GROWTH, 1e-12);
            assert_close(tw.best_score().unwrap(), OFF_TRACK_PENALTY / (11.0 * 1.78816), 1e-6);
        }
        PidCtrlMode::Fixed => panic!("Expected to still be tuning"),
    }
}

#[test]
fn test_fixed_mode_is_idempotent() {
    let mut ctrl = tuning(10.0);

    // A clean lap makes the coefficients final, the completing frame is still driven
    for _ in 0..5 {
        expect_control(ctrl.proc(1.0, 100.0));
    }
    expect_control(ctrl.proc(1.0, 100.0));
    assert!(!ctrl.is_tuning());

    let final_coeffs = ctrl.coefficients();
    assert_eq!(final_coeffs, Coefficients::new(K_P, K_I, K_D));

    // Settle the derivative term, after which a zero error leaves the history unchanged
    expect_control(ctrl.proc(0.0, 80.0));
    let reference = expect_control(ctrl.proc(0.0, 80.0));

    for _ in 0..100 {
        assert_eq!(ctrl.proc(0.0, 80.0), FrameOutput::Control(reference));
    }

    // Neither distance, stalling or large errors end anything once the coefficients are final
    for _ in 0..10 {
        expect_control(ctrl.proc(0.0, 0.0));
        expect_control(ctrl.proc(20.0, 100.0));
    }
    assert_eq!(ctrl.coefficients(), final_coeffs);
    assert_eq!(ctrl.status_report().episode, Episode::default());
}

#[test]
fn test_observer_event_sequence() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);

    let mut ctrl = PidCtrl::with_observers(
        ControllerConfig::Tuning(TuningConfig {
            coefficients: Coefficients::new(K_P, K_I, K_D),
            deltas: Coefficients::new(DK_P, DK_I, DK_D),
            off_track_cte: OFF_TRACK_CTE,
            track_length_m: 10.0,
        }),
        vec![Box::new(move |e: &EpisodeEvent| sink.borrow_mut().push(*e))],
    );

    // Off track, then a clean lap
    for _ in 0..5 {
        ctrl.proc(4.99, 100.0);
    }
    ctrl.proc(5.01, 100.0);
    for _ in 0..6 {
        ctrl.proc(0.5, 100.0);
    }

    let names: Vec<&str> = events
        .borrow()
        .iter()
        .map(|e| match e {
            EpisodeEvent::Created { .. } => "created",
            EpisodeEvent::NewMaxCte { .. } => "new_max_cte",
            EpisodeEvent::OffTrack { .. } => "off_track",
            EpisodeEvent::LapCompleted { .. } => "lap_completed",
            EpisodeEvent::Converged { .. } => "converged",
            EpisodeEvent::CoefficientsUpdated { .. } => "coefficients_updated",
        })
        .collect();

    assert_eq!(
        names,
        vec![
            "created",
            "new_max_cte",
            "new_max_cte",
            "off_track",
            "coefficients_updated",
            "new_max_cte",
            "lap_completed",
            "converged",
        ]
    );
    assert!(!ctrl.is_tuning());
    assert_close(ctrl.coefficients().k_p, K_P + DK_P, 1e-12);
}
