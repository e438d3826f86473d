//! Host platform utility functions

use std::{env, path::PathBuf};

/// Environment variable holding the software root directory. Parameter files are resolved from
/// `$DEMUSTER_ROOT/params` and sessions are created beneath it.
pub const SW_ROOT_ENV_VAR: &str = "DEMUSTER_ROOT";

/// Get the software root directory from the environment.
pub fn get_demuster_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
