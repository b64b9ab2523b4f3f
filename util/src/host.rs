//! Host platform utility functions

use std::path::PathBuf;

/// Name of the environment variable pointing at the software root directory.
pub const SW_ROOT_ENV_VAR: &str = "DRIVE_SW_ROOT";

/// Get the root directory of the software, as set by the `DRIVE_SW_ROOT`
/// environment variable.
///
/// Parameter files live in `<root>/params` and sessions in `<root>/sessions`.
pub fn get_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
