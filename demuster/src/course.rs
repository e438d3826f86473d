//! # Course target
//!
//! The commanded course points from the vehicle to the waypoint after its target rather than
//! the target itself, which rounds off corners in the trajectory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use crate::geom::rel_ang;
use crate::track::TrajTracker;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The course and speed handed to the vehicle's decision layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CourseSpeed {
    /// Compass bearing, degrees in [0, 360)
    pub course_deg: f64,

    /// Units: meters/second
    pub speed: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Bearing from `position` to the lookahead point of the tracker, or `None` if it isn't
/// tracking anything.
pub fn course_to_lookahead(position: &Vector2<f64>, tracker: &TrajTracker) -> Option<f64> {
    tracker.next_next().map(|p| rel_ang(position, p))
}
