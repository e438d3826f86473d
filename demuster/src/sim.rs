//! # Vehicle simulation
//!
//! A minimal kinematic vehicle used to exercise the behaviour without any hardware. Speed follows
//! the demand with a first order lag and the heading turns towards the demanded course no faster
//! than the maximum turn rate.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};

// Internal
use crate::course::CourseSpeed;
use crate::geom::Pose;
use util::maths::wrap_360;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Time constant of the speed response.
    ///
    /// Units: seconds
    pub speed_time_const_s: f64,

    /// Units: degrees/second
    pub max_turn_rate_degs: f64,
}

/// A simulated vehicle.
#[derive(Debug, Clone, Serialize)]
pub struct SimVehicle {
    pub pose: Pose,

    /// Units: meters/second
    pub speed_ms: f64,

    #[serde(skip)]
    params: SimParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            speed_time_const_s: 1.0,
            max_turn_rate_degs: 30.0,
        }
    }
}

impl SimVehicle {
    /// Create a vehicle at rest.
    pub fn new(pose: Pose, params: SimParams) -> Self {
        Self {
            pose,
            speed_ms: 0.0,
            params,
        }
    }

    /// Advance the vehicle by `dt_s` seconds. With no demand the vehicle slows to a stop on its
    /// current heading.
    pub fn step(&mut self, demand: Option<&CourseSpeed>, dt_s: f64) {
        let (course_deg, speed) = match demand {
            Some(d) => (d.course_deg, d.speed),
            None => (self.pose.heading_deg, 0.0),
        };

        // Speed lag, clamped so large steps don't overshoot
        let gain = if self.params.speed_time_const_s > 0.0 {
            (dt_s / self.params.speed_time_const_s).min(1.0)
        } else {
            1.0
        };
        self.speed_ms += (speed - self.speed_ms) * gain;

        // Turn the short way round, limited by the turn rate
        let err = wrap_360(course_deg - self.pose.heading_deg + 180.0) - 180.0;
        let max_turn = self.params.max_turn_rate_degs * dt_s;
        let turn = err.max(-max_turn).min(max_turn);
        self.pose.heading_deg = wrap_360(self.pose.heading_deg + turn);

        let h = self.pose.heading_deg.to_radians();
        let dist = self.speed_ms * dt_s;
        self.pose.position_m.x += dist * h.sin();
        self.pose.position_m.y += dist * h.cos();

        trace!(
            "Sim: ({:.2}, {:.2}) hdg {:.1} spd {:.2}",
            self.pose.position_m.x,
            self.pose.position_m.y,
            self.pose.heading_deg,
            self.speed_ms
        );
    }
}
