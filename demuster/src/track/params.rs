//! Trajectory tracker parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the trajectory tracker
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TrackerParams {
    /// Distance under which the target waypoint is captured.
    pub capture_radius: f64,

    /// If the closest approach to the target was within this distance and the vehicle is now
    /// moving away from it, the target is treated as captured.
    pub slip_radius: f64,

    /// How far the distance to the target may grow beyond the closest approach before the
    /// trajectory is abandoned and replanned.
    pub drift_radius: f64,

    /// Heading error, in degrees, above which the trajectory is replanned.
    pub drift_heading_deg: f64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            capture_radius: 2.0,
            slip_radius: 3.0,
            drift_radius: 0.1,
            drift_heading_deg: 45.0,
        }
    }
}

impl TrackerParams {
    /// Returns the name of the first invalid parameter, if any.
    pub fn invalid_field(&self) -> Option<&'static str> {
        let fields = [
            ("capture_radius", self.capture_radius),
            ("slip_radius", self.slip_radius),
            ("drift_radius", self.drift_radius),
            ("drift_heading", self.drift_heading_deg),
        ];

        fields
            .iter()
            .find(|(_, v)| !(v.is_finite() && *v >= 0.0))
            .map(|(n, _)| *n)
    }
}
