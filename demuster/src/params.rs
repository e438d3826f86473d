//! # Demuster executable parameters
//!
//! Describes the simulated fleet driven by `demuster_exec`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::behaviour::DemusterParams;
use crate::sim::SimParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemusterExecParams {
    /// Simulated time between cycles.
    ///
    /// Units: seconds
    #[serde(default = "default_cycle_period")]
    pub cycle_period_s: f64,

    /// Simulated time after which the run stops even if some vehicles haven't finished.
    ///
    /// Units: seconds
    #[serde(default = "default_max_time")]
    pub max_time_s: f64,

    /// Vehicle model shared by the whole fleet
    #[serde(default)]
    pub sim: SimParams,

    pub vehicles: Vec<VehicleParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleParams {
    /// Unique name of the vehicle
    pub name: String,

    /// Units: meters
    pub start: [f64; 2],

    /// Units: degrees, compass bearing
    #[serde(default)]
    pub start_heading: f64,

    /// Behaviour parameter file for this vehicle, relative to the params directory
    #[serde(default)]
    pub params_file: Option<String>,

    /// Behaviour parameters given inline, used if there's no `params_file`
    #[serde(default)]
    pub params: Option<DemusterParams>,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_cycle_period() -> f64 {
    0.1
}

fn default_max_time() -> f64 {
    600.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load_fleet() {
        let p: DemusterExecParams = util::params::load_str(
            r#"
            max_time_s = 120.0

            [[vehicles]]
            name = "abe"
            start = [0.0, 0.0]
            params_file = "demuster_abe.toml"

            [[vehicles]]
            name = "ben"
            start = [10.0, 0.0]
            start_heading = 90.0

            [vehicles.params]
            goal_x = 50.0
            mode = "simultaneous"
            "#,
        )
        .unwrap();

        assert_eq!(p.cycle_period_s, 0.1);
        assert_eq!(p.max_time_s, 120.0);
        assert_eq!(p.vehicles.len(), 2);
        assert_eq!(p.vehicles[0].params_file.as_deref(), Some("demuster_abe.toml"));
        assert!(p.vehicles[0].params.is_none());
        assert_eq!(p.vehicles[1].start_heading, 90.0);
        assert_eq!(p.vehicles[1].params.as_ref().map(|b| b.goal_x), Some(50.0));
    }
}
