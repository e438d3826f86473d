//! # Dubins path planner
//!
//! Plans the shortest path between two oriented points out of the six Dubins families, with an
//! independent radius for each of the three arcs. The path is discretised into waypoints at a
//! fixed spacing, plus an extra point just beyond the end along the goal heading which is used as
//! a lookahead once the last real waypoint is the target.
//!
//! If an operational region is given, a path with any waypoint outside it is rejected, its family
//! excluded, and the selection repeated. Each rejection excludes one more family so planning takes
//! at most six attempts.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod family;
pub mod geometry;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use nalgebra::Vector2;
use ordered_float::NotNan;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
pub use family::{FamilySet, ParseFamilyError, PathFamily, Turn};
use geometry::{Candidate, Endpoints};
use crate::geom::OpRegion;
use util::convert::Convert;
use util::maths::compass_deg_to_rad;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Families whose lengths differ by less than this are considered equal, in which case the
/// earlier family in `PathFamily::ALL` is chosen.
pub const LENGTH_TIE_TOLERANCE: f64 = 1e-9;

/// Largest number of waypoints a planned trajectory may have.
pub const MAX_WAYPOINTS: usize = 100_000;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Radii of the first, middle and last arcs of a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnRadii {
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
}

/// Everything needed for one planning call.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    /// Start position
    pub start: Vector2<f64>,

    /// Start heading as a compass bearing in degrees
    pub start_heading_deg: f64,

    /// Goal position
    pub goal: Vector2<f64>,

    /// Goal heading as a compass bearing in degrees
    pub goal_heading_deg: f64,

    pub radii: TurnRadii,

    /// Distance between waypoints along the path
    pub precision: f64,

    /// Families which must not be used
    pub excluded: FamilySet,

    /// Region every waypoint must lie in
    pub region: Option<&'a OpRegion>,
}

/// A planned trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    /// Waypoints in the order they should be visited. Never empty.
    pub waypoints: Vec<Vector2<f64>>,

    /// A point one waypoint spacing beyond the end of the path, along the goal heading
    pub extra: Vector2<f64>,

    /// The family of the chosen path
    pub family: PathFamily,

    /// Length of the path
    pub length: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("Waypoint precision must be positive and finite, found {0}")]
    InvalidPrecision(f64),

    #[error("Turn radii must be non-negative and finite, found {0:?}")]
    InvalidRadii(TurnRadii),

    #[error("Start and goal poses must be finite")]
    NonFinitePose,

    #[error(
        "A {length:.1} m path at {precision} m spacing needs more than {max} waypoints"
    )]
    TooManyWaypoints {
        length: f64,
        precision: f64,
        max: usize,
    },

    #[error("No path family is feasible (excluded: {excluded})")]
    NoFeasiblePath { excluded: FamilySet },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TurnRadii {
    pub fn new(r1: f64, r2: f64, r3: f64) -> Self {
        Self { r1, r2, r3 }
    }

    /// The same radius for every arc.
    pub fn uniform(r: f64) -> Self {
        Self::new(r, r, r)
    }

    pub fn is_valid(&self) -> bool {
        [self.r1, self.r2, self.r3]
            .iter()
            .all(|r| r.is_finite() && *r >= 0.0)
    }

    /// Add `delta` to every radius, flooring each at zero.
    pub fn offset(&self, delta: f64) -> Self {
        Self::new(
            (self.r1 + delta).max(0.0),
            (self.r2 + delta).max(0.0),
            (self.r3 + delta).max(0.0),
        )
    }
}

impl Default for TurnRadii {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl<'a> PlanRequest<'a> {
    fn endpoints(&self) -> Endpoints {
        Endpoints {
            start: self.start,
            start_heading_rad: compass_deg_to_rad(self.start_heading_deg),
            goal: self.goal,
            goal_heading_rad: compass_deg_to_rad(self.goal_heading_deg),
        }
    }

    fn validate(&self) -> Result<(), PlanError> {
        if !(self.precision.is_finite() && self.precision > 0.0) {
            return Err(PlanError::InvalidPrecision(self.precision));
        }

        if !self.radii.is_valid() {
            return Err(PlanError::InvalidRadii(self.radii));
        }

        let finite = [
            self.start.x,
            self.start.y,
            self.start_heading_deg,
            self.goal.x,
            self.goal.y,
            self.goal_heading_deg,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(PlanError::NonFinitePose);
        }

        Ok(())
    }
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Vector2<f64>> {
        self.waypoints.get(index)
    }

    /// Waypoints from `index` onwards in their wire representation.
    pub fn points_from(&self, index: usize) -> Vec<[f64; 2]> {
        match self.waypoints.get(index..) {
            Some(rest) => rest.convert(),
            None => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Plan a trajectory.
pub fn plan(req: &PlanRequest) -> Result<Trajectory, PlanError> {
    req.validate()?;

    let ends = req.endpoints();
    let mut excluded = req.excluded;

    for _ in 0..PathFamily::ALL.len() {
        let best = match shortest(&ends, &req.radii, &excluded) {
            Some(c) => c,
            None => break,
        };

        // Every other family is at least as long so none of them would fit either
        match best.waypoint_count(req.precision) {
            Some(n) if n <= MAX_WAYPOINTS => (),
            _ => {
                return Err(PlanError::TooManyWaypoints {
                    length: best.length,
                    precision: req.precision,
                    max: MAX_WAYPOINTS,
                })
            }
        }

        let waypoints = best.sample(req.precision);

        if let Some(region) = req.region {
            if let Some(p) = waypoints.iter().find(|p| !region.contains(p)) {
                debug!(
                    "{} path leaves the operational region at ({:.2}, {:.2}), excluding it",
                    best.family, p.x, p.y
                );
                excluded.insert(best.family);
                continue;
            }
        }

        let end = match waypoints.last() {
            Some(e) => *e,
            None => best.point_at(best.length),
        };
        let extra = end
            + req.precision
                * Vector2::new(ends.goal_heading_rad.cos(), ends.goal_heading_rad.sin());

        trace!(
            "Planned {} path of length {:.2} with {} waypoints",
            best.family,
            best.length,
            waypoints.len()
        );

        return Ok(Trajectory {
            waypoints,
            extra,
            family: best.family,
            length: best.length,
        });
    }

    Err(PlanError::NoFeasiblePath { excluded })
}

/// Length of the given family for the request, or `None` if it is infeasible.
///
/// Exclusions and the region are not taken into account.
pub fn family_length(family: PathFamily, req: &PlanRequest) -> Option<f64> {
    geometry::solve(family, &req.endpoints(), &req.radii).map(|c| c.length)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// The shortest feasible, non-excluded candidate.
fn shortest(ends: &Endpoints, radii: &TurnRadii, excluded: &FamilySet) -> Option<Candidate> {
    let mut best: Option<(NotNan<f64>, Candidate)> = None;

    for family in PathFamily::ALL.iter().filter(|f| !excluded.contains(**f)) {
        let candidate = match geometry::solve(*family, ends, radii) {
            Some(c) => c,
            None => continue,
        };

        let length = match NotNan::new(candidate.length) {
            Ok(l) => l,
            Err(_) => continue,
        };

        // Only replace the current best if the new candidate is clearly shorter
        best = match best {
            Some((best_len, c))
                if best_len.into_inner() - length.into_inner() <= LENGTH_TIE_TOLERANCE =>
            {
                Some((best_len, c))
            }
            _ => Some((length, candidate)),
        };
    }

    best.map(|(_, c)| c)
}

#[cfg(test)]
mod test {
    use super::*;

    /// Start at the origin heading north, goal at (100, 0), also heading north.
    fn scenario_a<'a>() -> PlanRequest<'a> {
        PlanRequest {
            start: Vector2::new(0.0, 0.0),
            start_heading_deg: 0.0,
            goal: Vector2::new(100.0, 0.0),
            goal_heading_deg: 0.0,
            radii: TurnRadii::uniform(10.0),
            precision: 5.0,
            excluded: FamilySet::empty(),
            region: None,
        }
    }

    fn assert_shortest(req: &PlanRequest, traj: &Trajectory) {
        for family in PathFamily::ALL.iter().filter(|f| !req.excluded.contains(**f)) {
            if let Some(len) = family_length(*family, req) {
                assert!(
                    traj.length <= len + LENGTH_TIE_TOLERANCE,
                    "{} ({}) is shorter than the chosen {} ({})",
                    family,
                    len,
                    traj.family,
                    traj.length
                );
            }
        }
    }

    #[test]
    fn test_scenario_a_endpoints() {
        let req = scenario_a();
        let traj = plan(&req).unwrap();

        assert!(!traj.is_empty());
        assert!((traj.waypoints[0] - req.start).norm() <= req.precision + 1e-9);
        assert!((traj.waypoints[traj.len() - 1] - req.goal).norm() < 1e-6);

        // Turning right first then left onto the goal is the shortest way round
        assert_eq!(traj.family, PathFamily::Rsl);
        assert_shortest(&req, &traj);

        // Extra point continues north from the goal
        assert!((traj.extra - Vector2::new(100.0, 5.0)).norm() < 1e-6);
    }

    #[test]
    fn test_straight_line_path() {
        // Heading east towards a goal due east, the path is the straight line between them
        let req = PlanRequest {
            start_heading_deg: 90.0,
            goal_heading_deg: 90.0,
            ..scenario_a()
        };
        let traj = plan(&req).unwrap();

        assert!(!traj.family.is_ccc());
        assert_eq!(traj.family, PathFamily::Lsl);
        assert!((traj.length - 100.0).abs() < 1e-6);
        assert_eq!(traj.len(), 20);
        for (i, p) in traj.waypoints.iter().enumerate() {
            assert!((p - Vector2::new(5.0 * (i + 1) as f64, 0.0)).norm() < 1e-6);
        }
        assert!((traj.extra - Vector2::new(105.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_scenario_b_region() {
        // The region cuts off the space north east of the start, where the right-first paths go
        let region = OpRegion::parse("-25,-12:105,-12:105,1:-25,12").unwrap();
        let req = PlanRequest {
            region: Some(&region),
            ..scenario_a()
        };

        let traj = plan(&req).unwrap();
        assert_eq!(traj.family, PathFamily::Lsl);
        assert!(traj.waypoints.iter().all(|p| region.contains(p)));
    }

    #[test]
    fn test_region_excludes_everything() {
        let region = OpRegion::parse("-1,-1:101,-1:101,1:-1,1").unwrap();
        let req = PlanRequest {
            region: Some(&region),
            ..scenario_a()
        };

        match plan(&req) {
            Err(PlanError::NoFeasiblePath { excluded }) => assert!(excluded.is_full()),
            r => panic!("Expected no feasible path, got {:?}", r),
        }
    }

    #[test]
    fn test_exclusions() {
        // Goal to the west, the shortest path starts with a left turn
        let req = PlanRequest {
            goal: Vector2::new(-100.0, 0.0),
            ..scenario_a()
        };
        let traj = plan(&req).unwrap();
        assert_eq!(traj.family.first_turn(), Turn::Left);
        assert_shortest(&req, &traj);

        // Only right turns on the first leg
        let req = PlanRequest {
            excluded: FamilySet::left_first(),
            ..req
        };
        let traj = plan(&req).unwrap();
        assert_eq!(traj.family.first_turn(), Turn::Right);
        assert_shortest(&req, &traj);

        // Everything excluded
        let req = PlanRequest {
            excluded: FamilySet::all(),
            ..req
        };
        assert!(matches!(
            plan(&req),
            Err(PlanError::NoFeasiblePath { .. })
        ));
    }

    #[test]
    fn test_invalid_requests() {
        let req = PlanRequest {
            precision: 0.0,
            ..scenario_a()
        };
        assert_eq!(plan(&req).unwrap_err(), PlanError::InvalidPrecision(0.0));

        let req = PlanRequest {
            radii: TurnRadii::new(1.0, -1.0, 1.0),
            ..scenario_a()
        };
        assert!(matches!(plan(&req), Err(PlanError::InvalidRadii(_))));

        let req = PlanRequest {
            goal: Vector2::new(std::f64::NAN, 0.0),
            ..scenario_a()
        };
        assert_eq!(plan(&req).unwrap_err(), PlanError::NonFinitePose);
    }

    #[test]
    fn test_waypoint_limit() {
        // Spacings so fine that the count would overflow, or just too many points
        for precision in [1e-300, 1e-3].iter() {
            let req = PlanRequest {
                precision: *precision,
                ..scenario_a()
            };
            match plan(&req) {
                Err(PlanError::TooManyWaypoints { max, .. }) => assert_eq!(max, MAX_WAYPOINTS),
                r => panic!("Expected TooManyWaypoints for {}, got {:?}", precision, r),
            }
        }

        // The region doesn't change that
        let region = OpRegion::parse("-50,-50:150,-50:150,50:-50,50").unwrap();
        let req = PlanRequest {
            precision: 1e-300,
            region: Some(&region),
            ..scenario_a()
        };
        assert!(matches!(
            plan(&req),
            Err(PlanError::TooManyWaypoints { .. })
        ));

        // Fine but reasonable spacing still plans
        let req = PlanRequest {
            precision: 0.01,
            ..scenario_a()
        };
        let traj = plan(&req).unwrap();
        assert!(traj.len() > 1000);
        assert!(traj.len() <= MAX_WAYPOINTS);
    }

    #[test]
    fn test_shortest_over_many_poses() {
        // Sweep a grid of goal poses and radii, the chosen path is never beaten by another
        // allowed family
        let mut planned = 0;
        for gx in [-60.0, -7.0, 0.0, 15.0, 80.0].iter() {
            for gy in [-40.0, 0.0, 3.0, 55.0].iter() {
                for gh in [0.0, 45.0, 135.0, 200.0, 315.0].iter() {
                    for radii in [TurnRadii::uniform(5.0), TurnRadii::new(2.0, 8.0, 4.0)].iter()
                    {
                        let req = PlanRequest {
                            goal: Vector2::new(*gx, *gy),
                            goal_heading_deg: *gh,
                            radii: *radii,
                            precision: 1.0,
                            ..scenario_a()
                        };
                        if let Ok(traj) = plan(&req) {
                            assert_shortest(&req, &traj);
                            assert!((traj.waypoints[traj.len() - 1] - req.goal).norm() < 1e-6);
                            planned += 1;
                        }
                    }
                }
            }
        }

        // Some family is feasible for every one of these poses
        assert_eq!(planned, 5 * 4 * 5 * 2);
    }

    #[test]
    fn test_radii_offset() {
        let r = TurnRadii::new(0.5, 2.0, 3.0).offset(-1.0);
        assert_eq!(r, TurnRadii::new(0.0, 1.0, 2.0));
        assert!(r.is_valid());
        assert!(!TurnRadii::new(std::f64::INFINITY, 1.0, 1.0).is_valid());
    }
}
