//! # Speed policy
//!
//! Chooses the commanded speed each cycle. The cruise speed comes from the coordination mode,
//! is smoothed by a low pass filter while the vehicle speeds up, and is scaled down as the
//! vehicle nears the end of its trajectory.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Internal
use crate::coord::PeerRegistry;
use comms_if::msg::VehicleId;
pub use params::SpeedParams;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The slowdown never commands less than this.
///
/// Units: meters/second
pub const MIN_SLOWDOWN_SPEED: f64 = 0.1;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Turn taking strategy used in sequential mode.
///
/// Given the cruise speed the vehicle would otherwise use, returns the speed it may actually use.
pub trait SequentialGate: Send {
    fn gate(&mut self, own: &VehicleId, cruise: f64, peers: &PeerRegistry) -> f64;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Lets every vehicle move.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGate;

/// Holds the vehicle while at least `max_moving` other vehicles are moving.
#[derive(Debug, Clone, Copy)]
pub struct MaxMovingPeers {
    pub max_moving: usize,
}

/// Speed policy state.
pub struct SpeedPolicy {
    /// Last commanded speed before the slowdown, the filter's memory
    prev_speed: f64,

    gate: Box<dyn SequentialGate>,
}

/// Where the vehicle is along its trajectory, used for the slowdown.
#[derive(Debug, Clone, Copy)]
pub struct PathProgress {
    /// Index of the target waypoint
    pub index: usize,

    /// Number of waypoints in the trajectory
    pub num_points: usize,

    /// Spacing between waypoints
    pub precision: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How cooperating vehicles share out movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationMode {
    /// Every vehicle moves at its own commanded speed
    Decluster,

    /// Every vehicle moves at the common default speed
    Simultaneous,

    /// Vehicles take turns to move
    Sequential,

    /// Vehicles move to their deployment positions at their commanded speed
    Deploy,
}

#[derive(Debug, Error, PartialEq)]
#[error("Unknown coordination mode \"{0}\"")]
pub struct ParseModeError(pub String);

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CoordinationMode {
    fn default() -> Self {
        CoordinationMode::Decluster
    }
}

impl CoordinationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinationMode::Decluster => "decluster",
            CoordinationMode::Simultaneous => "simultaneous",
            CoordinationMode::Sequential => "sequential",
            CoordinationMode::Deploy => "deploy",
        }
    }
}

impl fmt::Display for CoordinationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CoordinationMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "decluster" => Ok(CoordinationMode::Decluster),
            "simultaneous" => Ok(CoordinationMode::Simultaneous),
            "sequential" => Ok(CoordinationMode::Sequential),
            "deploy" => Ok(CoordinationMode::Deploy),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

impl SequentialGate for NoGate {
    fn gate(&mut self, _own: &VehicleId, cruise: f64, _peers: &PeerRegistry) -> f64 {
        cruise
    }
}

impl SequentialGate for MaxMovingPeers {
    fn gate(&mut self, own: &VehicleId, cruise: f64, peers: &PeerRegistry) -> f64 {
        let moving = peers.num_moving(own);
        if moving >= self.max_moving {
            trace!("{} peers moving, holding {}", moving, own);
            0.0
        } else {
            cruise
        }
    }
}

impl Default for SpeedPolicy {
    fn default() -> Self {
        Self::new(Box::new(NoGate))
    }
}

impl fmt::Debug for SpeedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeedPolicy")
            .field("prev_speed", &self.prev_speed)
            .finish()
    }
}

impl SpeedPolicy {
    pub fn new(gate: Box<dyn SequentialGate>) -> Self {
        Self {
            prev_speed: 0.0,
            gate,
        }
    }

    /// Replace the sequential mode strategy.
    pub fn set_gate(&mut self, gate: Box<dyn SequentialGate>) {
        self.gate = gate;
    }

    /// Forget the filter memory, so the next cycle ramps up from rest.
    pub fn reset(&mut self) {
        self.prev_speed = 0.0;
    }

    pub fn prev_speed(&self) -> f64 {
        self.prev_speed
    }

    /// The unfiltered cruise speed for the mode.
    pub fn cruise_speed(
        &mut self,
        mode: CoordinationMode,
        params: &SpeedParams,
        own: &VehicleId,
        peers: &PeerRegistry,
    ) -> f64 {
        match mode {
            CoordinationMode::Simultaneous => params.default_speed,
            CoordinationMode::Decluster | CoordinationMode::Deploy => params.desired_speed,
            CoordinationMode::Sequential => self.gate.gate(own, params.desired_speed, peers),
        }
    }

    /// Apply the low pass filter to the cruise speed.
    ///
    /// The filter only acts while accelerating. Any other cruise speed is used as it is.
    pub fn filter(&mut self, cruise: f64, alpha: f64) -> f64 {
        if cruise > self.prev_speed {
            self.prev_speed = alpha * cruise + (1.0 - alpha) * self.prev_speed;
        } else {
            self.prev_speed = cruise;
        }
        self.prev_speed
    }

    /// Compute the speed to command this cycle.
    pub fn proc(
        &mut self,
        mode: CoordinationMode,
        params: &SpeedParams,
        own: &VehicleId,
        peers: &PeerRegistry,
        progress: Option<PathProgress>,
    ) -> f64 {
        let cruise = self.cruise_speed(mode, params, own, peers);
        let filtered = self.filter(cruise, params.lpf_alpha);

        let speed = match progress {
            Some(p) => slowdown(filtered, params.slowdown_range, &p),
            None => filtered,
        };

        trace!(
            "Speed: cruise {:.3}, filtered {:.3}, commanded {:.3}",
            cruise,
            filtered,
            speed
        );

        speed
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Scale the speed down over the last `range` meters of the trajectory.
///
/// Speeds at or below `MIN_SLOWDOWN_SPEED` and non-positive ranges are left alone. The result is
/// never below `MIN_SLOWDOWN_SPEED`.
pub fn slowdown(speed: f64, range: f64, progress: &PathProgress) -> f64 {
    if !(range > 0.0 && speed > MIN_SLOWDOWN_SPEED && progress.precision > 0.0) {
        return speed;
    }

    let slowdown_points = (range / progress.precision).round();
    let points_left = progress.num_points.saturating_sub(progress.index) as f64;

    if points_left < slowdown_points {
        (speed * points_left / slowdown_points).max(MIN_SLOWDOWN_SPEED)
    } else {
        speed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn own() -> VehicleId {
        VehicleId::from("abe")
    }

    #[test]
    fn test_scenario_f_filter() {
        let mut sp = SpeedPolicy::default();
        let params = SpeedParams {
            desired_speed: 2.0,
            lpf_alpha: 0.1,
            ..Default::default()
        };
        let peers = PeerRegistry::new();

        let s = sp.proc(CoordinationMode::Decluster, &params, &own(), &peers, None);
        assert!((s - 0.2).abs() < 1e-12);

        let s = sp.proc(CoordinationMode::Decluster, &params, &own(), &peers, None);
        assert!((s - 0.38).abs() < 1e-12);

        // Speeds up monotonically towards the cruise speed
        let mut last = s;
        for _ in 0..100 {
            let s = sp.proc(CoordinationMode::Decluster, &params, &own(), &peers, None);
            assert!(s >= last && s <= 2.0);
            last = s;
        }
        assert!(last > 1.99);
    }

    #[test]
    fn test_deceleration_immediate() {
        let mut sp = SpeedPolicy::default();
        for _ in 0..200 {
            sp.filter(2.0, 0.1);
        }

        assert_eq!(sp.filter(0.5, 0.1), 0.5);
        assert_eq!(sp.prev_speed(), 0.5);
        assert_eq!(sp.filter(0.0, 0.1), 0.0);

        // Full gain means no smoothing
        assert_eq!(sp.filter(3.0, 1.0), 3.0);

        sp.reset();
        assert_eq!(sp.prev_speed(), 0.0);
    }

    #[test]
    fn test_cruise_by_mode() {
        let mut sp = SpeedPolicy::default();
        let params = SpeedParams {
            default_speed: 1.5,
            desired_speed: 0.7,
            ..Default::default()
        };
        let peers = PeerRegistry::new();

        let cruise = |sp: &mut SpeedPolicy, m| sp.cruise_speed(m, &params, &own(), &peers);
        assert_eq!(cruise(&mut sp, CoordinationMode::Simultaneous), 1.5);
        assert_eq!(cruise(&mut sp, CoordinationMode::Decluster), 0.7);
        assert_eq!(cruise(&mut sp, CoordinationMode::Deploy), 0.7);
        assert_eq!(cruise(&mut sp, CoordinationMode::Sequential), 0.7);
    }

    #[test]
    fn test_sequential_gate() {
        let mut sp = SpeedPolicy::new(Box::new(MaxMovingPeers { max_moving: 1 }));
        let params = SpeedParams {
            desired_speed: 1.0,
            ..Default::default()
        };
        let mut peers = PeerRegistry::new();
        peers.update_speed(&own(), 1.0);

        assert_eq!(
            sp.cruise_speed(CoordinationMode::Sequential, &params, &own(), &peers),
            1.0
        );

        peers.update_speed(&VehicleId::from("ben"), 0.4);
        assert_eq!(
            sp.cruise_speed(CoordinationMode::Sequential, &params, &own(), &peers),
            0.0
        );

        // Only sequential mode is gated
        assert_eq!(
            sp.cruise_speed(CoordinationMode::Decluster, &params, &own(), &peers),
            1.0
        );
    }

    #[test]
    fn test_slowdown() {
        let progress = |index| PathProgress {
            index,
            num_points: 100,
            precision: 1.0,
        };

        // 10 point window, 5 points left
        assert!((slowdown(2.0, 10.0, &progress(95)) - 1.0).abs() < 1e-12);

        // Outside the window
        assert_eq!(slowdown(2.0, 10.0, &progress(90)), 2.0);
        assert_eq!(slowdown(2.0, 10.0, &progress(50)), 2.0);

        // Floor
        assert_eq!(slowdown(2.0, 10.0, &progress(100)), MIN_SLOWDOWN_SPEED);
        assert_eq!(slowdown(0.5, 10.0, &progress(99)), MIN_SLOWDOWN_SPEED);

        // Disabled
        assert_eq!(slowdown(2.0, 0.0, &progress(99)), 2.0);

        // Slow speeds are untouched
        assert_eq!(slowdown(0.1, 10.0, &progress(99)), 0.1);
        assert_eq!(slowdown(0.0, 10.0, &progress(99)), 0.0);
    }

    #[test]
    fn test_slowdown_never_below_floor() {
        for index in 0..=50 {
            for speed in &[0.11, 0.5, 1.0, 3.0] {
                let s = slowdown(
                    *speed,
                    7.5,
                    &PathProgress {
                        index,
                        num_points: 50,
                        precision: 0.5,
                    },
                );
                assert!(s >= MIN_SLOWDOWN_SPEED && s <= *speed);
            }
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "Sequential".parse::<CoordinationMode>(),
            Ok(CoordinationMode::Sequential)
        );
        assert_eq!(
            " deploy ".parse::<CoordinationMode>(),
            Ok(CoordinationMode::Deploy)
        );
        assert!("convoy".parse::<CoordinationMode>().is_err());
        assert_eq!(CoordinationMode::default().to_string(), "decluster");
    }
}
