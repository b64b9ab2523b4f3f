//! # Simulator Server Module
//!
//! This module abstracts over the networking side of the drive executable. The simulator connects
//! to the server over a WebSocket and sends a telemetry frame for every simulation frame, each of
//! which is answered with either a steer or a reset command.
//!
//! Only one simulator is served at a time. The controller outlives connections, so a simulator
//! reconnecting carries on with the same tuning run.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::net::{SocketAddr, TcpListener};

use comms_if::{
    net::NetParams,
    sim::{self, SimCommand, SimEvent},
};
use log::{debug, info, trace, warn};
use tungstenite::{error::ProtocolError, Message};

use crate::pid_ctrl::{FrameOutput, PidCtrl};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An abstraction over the networking part of the drive executable.
pub struct SimServer {
    listener: TcpListener,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`SimServer`]
#[derive(thiserror::Error, Debug)]
pub enum SimServerError {
    #[error("Could not bind to {0}: {1}")]
    BindError(String, std::io::Error),

    #[error("Could not accept a connection: {0}")]
    AcceptError(std::io::Error),

    #[error("WebSocket handshake with the simulator failed: {0}")]
    HandshakeError(String),

    #[error("Could not communicate with the simulator: {0}")]
    SocketError(tungstenite::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServer {
    /// Create a new instance of the simulator server, bound to the endpoint in the parameters.
    ///
    /// This function will not wait for a connection from the simulator before returning.
    pub fn new(params: &NetParams) -> Result<Self, SimServerError> {
        let listener = TcpListener::bind(&params.sim_endpoint)
            .map_err(|e| SimServerError::BindError(params.sim_endpoint.clone(), e))?;

        Ok(Self { listener })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, SimServerError> {
        self.listener
            .local_addr()
            .map_err(SimServerError::AcceptError)
    }

    /// Wait for a simulator to connect and serve it until it disconnects.
    ///
    /// A clean disconnect returns `Ok(())`.
    pub fn serve(&mut self, ctrl: &mut PidCtrl) -> Result<(), SimServerError> {
        let (stream, addr) = self
            .listener
            .accept()
            .map_err(SimServerError::AcceptError)?;

        info!("Simulator connected from {}", addr);

        let mut socket = tungstenite::accept(stream)
            .map_err(|e| SimServerError::HandshakeError(e.to_string()))?;

        loop {
            let msg = match socket.read() {
                Ok(m) => m,
                Err(e) if is_disconnect(&e) => {
                    info!("Simulator disconnected");
                    return Ok(());
                }
                Err(e) => return Err(SimServerError::SocketError(e)),
            };

            let frame = match msg {
                Message::Text(t) => t,
                // Pings and the closing handshake are handled by the socket itself
                _ => continue,
            };

            if let Some(cmd) = handle_frame(ctrl, &frame) {
                socket
                    .send(Message::Text(cmd.to_frame()))
                    .map_err(SimServerError::SocketError)?;
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Process a single frame from the simulator, returning the command to answer it with, if any.
pub fn handle_frame(ctrl: &mut PidCtrl, frame: &str) -> Option<SimCommand> {
    match sim::parse_frame(frame) {
        Ok(Some(SimEvent::Telemetry(t))) => {
            trace!("Telemetry: {:?}", t);

            Some(match ctrl.proc(t.cte, t.speed) {
                FrameOutput::Control(c) => SimCommand::Steer {
                    steering_angle: c.steering,
                    throttle: c.throttle,
                },
                FrameOutput::EpisodeEnded => SimCommand::Reset,
            })
        }
        Ok(Some(SimEvent::Manual)) => Some(SimCommand::Manual),
        Ok(Some(SimEvent::Other(event))) => {
            debug!("Ignoring \"{}\" event from the simulator", event);
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Could not parse frame from the simulator: {}", e);
            None
        }
    }
}

/// True if the error means the simulator has gone away rather than misbehaved.
fn is_disconnect(e: &tungstenite::Error) -> bool {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        tungstenite::Error::Io(io) => matches!(
            io.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pid_ctrl::{Coefficients, ControllerConfig, FixedConfig, TuningConfig};

    fn fixed() -> PidCtrl {
        PidCtrl::new(ControllerConfig::Fixed(FixedConfig {
            coefficients: Coefficients::new(0.5, 0.0, 0.0),
            off_track_cte: 5.0,
        }))
    }

    #[test]
    fn test_telemetry_is_answered_with_steer() {
        let mut ctrl = fixed();

        let cmd = handle_frame(
            &mut ctrl,
            r#"42["telemetry",{"cte":"0.5","speed":"30.0","steering_angle":"0.0"}]"#,
        );

        assert_eq!(
            cmd,
            Some(SimCommand::Steer {
                steering_angle: -0.25,
                throttle: 1.0
            })
        );
    }

    #[test]
    fn test_episode_end_is_answered_with_reset() {
        let mut ctrl = PidCtrl::new(ControllerConfig::Tuning(TuningConfig {
            coefficients: Coefficients::new(0.1, 0.0, 1.0),
            deltas: Coefficients::new(0.01, 0.0, 0.1),
            off_track_cte: 5.0,
            track_length_m: 1000.0,
        }));
        let frame = r#"42["telemetry",{"cte":"6.0","speed":"100.0","steering_angle":"0.0"}]"#;

        // Off track is only checked once past the minimum distance
        for _ in 0..2 {
            assert!(matches!(handle_frame(&mut ctrl, frame), Some(SimCommand::Steer { .. })));
        }
        assert_eq!(handle_frame(&mut ctrl, frame), Some(SimCommand::Reset));
    }

    #[test]
    fn test_other_frames() {
        let mut ctrl = fixed();

        assert_eq!(
            handle_frame(&mut ctrl, r#"42["telemetry",null]"#),
            Some(SimCommand::Manual)
        );
        assert_eq!(handle_frame(&mut ctrl, r#"42["hello",{}]"#), None);
        assert_eq!(handle_frame(&mut ctrl, "3probe"), None);
        assert_eq!(handle_frame(&mut ctrl, r#"42["telemetry",{"cte":"x"}]"#), None);
    }
}
