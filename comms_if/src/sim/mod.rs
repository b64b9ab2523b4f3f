//! # Simulator Messages
//!
//! The simulator talks a socket.io style protocol over a WebSocket. Every event frame starts with
//! the two character prefix `42` (`4` for a message, `2` for an event), followed by a JSON array
//! of `[event_name, data]`. Telemetry values are transmitted as numeric strings.
//!
//! Frames which carry the `42` prefix but no data (the simulator sends `null` while the user is
//! driving manually) must be answered with a `manual` event so the simulator keeps control with
//! the user.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Prefix marking a socket.io event message.
pub const EVENT_PREFIX: &str = "42";

/// Name of the telemetry event sent by the simulator.
pub const TELEMETRY_EVENT: &str = "telemetry";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single frame of telemetry from the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Telemetry {
    /// Cross-track error, signed lateral distance from the track centre line.
    #[serde(deserialize_with = "de_numeric")]
    pub cte: f64,

    /// Vehicle speed.
    ///
    /// Units: miles/hour
    #[serde(deserialize_with = "de_numeric")]
    pub speed: f64,

    /// Current steering angle of the vehicle.
    ///
    /// Units: degrees
    #[serde(deserialize_with = "de_numeric")]
    pub steering_angle: f64,
}

#[derive(Serialize)]
struct SteerData {
    steering_angle: f64,
    throttle: f64,
}

#[derive(Serialize)]
struct NoData {}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// An event received from the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// New telemetry, the controller shall respond with a command.
    Telemetry(Telemetry),

    /// The event carried no data, the vehicle is being driven manually.
    Manual,

    /// Any other named event, carried for diagnostics only.
    Other(String),
}

/// A command sent to the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimCommand {
    /// Drive the vehicle with the given normalised steering and throttle, both in `[-1, 1]`.
    Steer { steering_angle: f64, throttle: f64 },

    /// Put the vehicle back at the start of the track.
    Reset,

    /// Leave the vehicle under manual control.
    Manual,
}

/// Errors which can occur while decoding a simulator frame.
#[derive(Debug, Error)]
pub enum SimParseError {
    #[error("The frame payload is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("The frame payload is not an array starting with an event name: {0}")]
    MissingEventName(String),

    #[error("The telemetry event carries no data")]
    MissingTelemetry,

    #[error("The telemetry data is invalid: {0}")]
    InvalidTelemetry(serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Num(f64),
    Str(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimCommand {
    /// Encode the command into a frame ready to be sent to the simulator.
    pub fn to_frame(&self) -> String {
        let payload = match *self {
            SimCommand::Steer {
                steering_angle,
                throttle,
            } => serde_json::to_string(&(
                "steer",
                SteerData {
                    steering_angle,
                    throttle,
                },
            )),
            SimCommand::Reset => serde_json::to_string(&("reset", NoData {})),
            SimCommand::Manual => serde_json::to_string(&("manual", NoData {})),
        }
        // Tuples of a str and a plain struct of floats always serialize
        .unwrap_or_default();

        format!("{}{}", EVENT_PREFIX, payload)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Decode a frame received from the simulator.
///
/// Returns `Ok(None)` if the frame is not an event frame (for example socket.io pings), in which
/// case it should be ignored.
pub fn parse_frame(frame: &str) -> Result<Option<SimEvent>, SimParseError> {
    if frame.len() <= EVENT_PREFIX.len() || !frame.starts_with(EVENT_PREFIX) {
        return Ok(None);
    }

    let payload = match get_json_payload(frame) {
        Some(p) => p,
        None => return Ok(Some(SimEvent::Manual)),
    };

    let mut items: Vec<Value> = serde_json::from_str(payload).map_err(SimParseError::InvalidJson)?;

    let event = match items.first() {
        Some(Value::String(s)) => s.clone(),
        _ => return Err(SimParseError::MissingEventName(payload.into())),
    };

    if event != TELEMETRY_EVENT {
        return Ok(Some(SimEvent::Other(event)));
    }

    if items.len() < 2 {
        return Err(SimParseError::MissingTelemetry);
    }

    let telemetry = serde_json::from_value(items.swap_remove(1))
        .map_err(SimParseError::InvalidTelemetry)?;

    Ok(Some(SimEvent::Telemetry(telemetry)))
}

/// Get the JSON array out of an event frame, or `None` if the frame carries no data.
fn get_json_payload(frame: &str) -> Option<&str> {
    if frame.contains("null") {
        return None;
    }

    let start = frame.find('[')?;
    let end = frame.rfind(']')?;

    if end < start {
        return None;
    }

    Some(&frame[start..=end])
}

/// Deserialize a number which may be sent either as a JSON number or as a numeric string.
fn de_numeric<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Numeric::deserialize(deserializer)? {
        Numeric::Num(n) => Ok(n),
        Numeric::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
