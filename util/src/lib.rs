//! Utility library for the drive software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod archive;
pub mod host;
#[macro_use]
pub mod logger;
pub mod params;
pub mod session;
pub mod time;
