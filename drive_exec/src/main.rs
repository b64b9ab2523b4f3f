//! Main drive executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Load and validate the PID control parameters
//!     - Initialise the session and logging
//!     - Build the controller and its episode observers
//!     - Main loop:
//!         - Wait for the simulator to connect
//!         - For each telemetry frame:
//!             - PID control processing
//!             - Answer with a steer or reset command
//!
//! # Usage
//!
//! ```text
//! drive_exec [Kp Ki Kd offTrackCte] [dKp dKi dKd trackLength]
//! ```
//!
//! With no values the parameters are loaded from `pid_ctrl.toml`. Four values give final
//! coefficients, eight values start a tuning run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{error, info};
use structopt::{clap::AppSettings, StructOpt};

// Internal
use comms_if::net::NetParams;
use drive_lib::{
    pid_ctrl::{ArchiveObserver, EpisodeObserver, LogObserver, Params, PidCtrl},
    sim_server::SimServer,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(
    name = "drive_exec",
    about = "Drives a simulated vehicle around the track with a self-tuning PID controller",
    setting = AppSettings::AllowNegativeNumbers
)]
struct Opts {
    /// Either nothing, [Kp Ki Kd offTrackCte] for final coefficients, or
    /// [Kp Ki Kd offTrackCte dKp dKi dKd trackLength] to tune them.
    #[structopt(name = "VALUES")]
    values: Vec<f64>,

    /// Minimum level of the log, must be at least as verbose as info.
    #[structopt(short, long, default_value = "debug")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- LOAD PARAMETERS ----

    // Parameters are checked before the session is created so that a bad command line leaves
    // nothing behind.
    let params: Params = if opts.values.is_empty() {
        util::params::load("pid_ctrl.toml").wrap_err("Could not load PID control params")?
    }
    else {
        Params::from_args(&opts.values).wrap_err("Invalid command line")?
    };

    let config = params
        .validate()
        .wrap_err("Invalid PID control parameters")?;

    let net_params: NetParams =
        util::params::load("drive_exec.toml").wrap_err("Could not load exec params")?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("drive_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opts.log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Drive Executable\n");
    info!(
        "Software root: {:?}",
        host::get_sw_root().wrap_err("Failed to get the software root")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- INITIALISE MODULES ----

    let observers: Vec<Box<dyn EpisodeObserver>> = vec![
        Box::new(LogObserver),
        Box::new(
            ArchiveObserver::new(&session, "pid_ctrl/episodes.csv")
                .wrap_err("Failed to create the episode archive")?,
        ),
    ];

    let mut pid_ctrl = PidCtrl::with_observers(config, observers);
    info!("PidCtrl init complete");

    // ---- INITIALISE NETWORK ----

    let mut sim_server = SimServer::new(&net_params).wrap_err("Failed to start the SimServer")?;
    info!(
        "Waiting for the simulator on {}\n",
        sim_server
            .local_addr()
            .wrap_err("Failed to get the SimServer address")?
    );

    // ---- MAIN LOOP ----

    // The controller is kept between connections, a reconnecting simulator carries on from the
    // same episode.
    loop {
        match sim_server.serve(&mut pid_ctrl) {
            Ok(()) => info!("Status: {:?}", pid_ctrl.status_report()),
            Err(e) => error!("Simulator connection failed: {}", e),
        }
    }
}
