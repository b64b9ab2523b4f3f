//! # Network Module
//!
//! Network parameters shared by the executables. The simulator connects to the drive executable
//! over a WebSocket, so the only endpoint is the one the simulator server binds to.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The endpoint the simulator expects to find the controller on.
pub const DEFAULT_SIM_ENDPOINT: &str = "0.0.0.0:4567";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters, loaded from the executable's parameter file.
#[derive(Debug, Clone, Deserialize)]
pub struct NetParams {
    /// Address (`host:port`) the simulator server binds to.
    #[serde(default = "default_sim_endpoint")]
    pub sim_endpoint: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for NetParams {
    fn default() -> Self {
        Self {
            sim_endpoint: default_sim_endpoint(),
        }
    }
}

fn default_sim_endpoint() -> String {
    DEFAULT_SIM_ENDPOINT.into()
}
