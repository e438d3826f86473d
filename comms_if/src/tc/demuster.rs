//! # Demuster behaviour telecommands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use structopt::StructOpt;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A runtime configuration command for the demuster behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub enum DemusterCmd {
    /// Discard the current trajectory and plan a new one on the next tick.
    #[structopt(name = "regen")]
    RegeneratePath,

    /// Increase all three turning radii by one unit and replan.
    #[structopt(name = "radius-inc")]
    TurningRadiusIncrease,

    /// Decrease all three turning radii by one unit (never below zero) and replan.
    #[structopt(name = "radius-dec")]
    TurningRadiusDecrease,

    /// Increase the end of path slowdown range by one unit.
    #[structopt(name = "slowdown-inc")]
    SlowdownRangeIncrease,

    /// Decrease the end of path slowdown range by one unit. A range of zero disables slowdown.
    #[structopt(name = "slowdown-dec")]
    SlowdownRangeDecrease,

    /// Set a named behaviour parameter from its string representation.
    #[structopt(name = "set")]
    SetParam {
        /// The name of the parameter, e.g. `capture_radius`
        name: String,

        /// The value to set, e.g. `2.5` or `0,0:100,0:100,100`
        value: String,
    },
}
