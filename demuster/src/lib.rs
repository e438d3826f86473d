//! # Demuster library
//!
//! Per-vehicle trajectory planning and tracking for demustering, where a group of vehicles
//! spread out from a cluster towards their own goal poses. Each vehicle plans a Dubins path to
//! its goal, follows it waypoint by waypoint and announces what is left of it to the others.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Demuster behaviour - runs the planner, tracker and speed policy once per cycle
pub mod behaviour;

/// Coordination - what each vehicle knows about the others
pub mod coord;

/// Course target - bearing to the lookahead waypoint
pub mod course;

/// Dubins path planner - shortest three segment paths between two poses
pub mod dubins;

/// Geometry primitives - poses, operational regions and bearings
pub mod geom;

/// Executable parameters - the simulated fleet
pub mod params;

/// Vehicle simulation - a simple kinematic model used to drive the behaviour
pub mod sim;

/// Speed policy - cruise speed selection, smoothing and end of path slowdown
pub mod speed;

/// Trajectory tracker - decides when to advance along or abandon the trajectory
pub mod track;
