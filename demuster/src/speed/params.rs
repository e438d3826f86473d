//! Speed policy parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the speed policy.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SpeedParams {
    /// Common cruise speed used in simultaneous mode.
    ///
    /// Units: meters/second
    pub default_speed: f64,

    /// Externally commanded cruise speed.
    ///
    /// Units: meters/second
    #[serde(rename = "speed")]
    pub desired_speed: f64,

    /// Low pass filter gain applied while accelerating, between 0 and 1.
    #[serde(rename = "speed_lpf_alpha")]
    pub lpf_alpha: f64,

    /// Distance from the end of the trajectory over which the vehicle slows down. Zero disables
    /// the slowdown.
    ///
    /// Units: meters
    pub slowdown_range: f64,
}

impl Default for SpeedParams {
    fn default() -> Self {
        Self {
            default_speed: 1.0,
            desired_speed: 0.0,
            lpf_alpha: 0.1,
            slowdown_range: 0.0,
        }
    }
}

impl SpeedParams {
    /// Returns the name of the first invalid parameter, if any.
    pub fn invalid_field(&self) -> Option<&'static str> {
        let fields = [
            ("default_speed", self.default_speed),
            ("speed", self.desired_speed),
            ("slowdown_range", self.slowdown_range),
        ];

        if let Some((n, _)) = fields.iter().find(|(_, v)| !(v.is_finite() && *v >= 0.0)) {
            return Some(n);
        }

        if !(0.0..=1.0).contains(&self.lpf_alpha) {
            return Some("speed_lpf_alpha");
        }

        None
    }
}
