//! # Geometry primitives
//!
//! Points are `nalgebra::Vector2<f64>` in a local cartesian frame (x east, y north). Poses carry
//! their heading as a compass bearing in degrees, which is only converted to a mathematical angle
//! (radians anticlockwise from +x) at the point where geometry is done.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use util::maths::{compass_deg_to_rad, rad_to_compass_deg, wrap_360};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Tolerance used when testing whether a point lies on a region edge.
const EDGE_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The position and heading of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in the local frame
    pub position_m: Vector2<f64>,

    /// Heading as a compass bearing, degrees clockwise from north
    pub heading_deg: f64,
}

/// A convex polygon that accepted trajectories must lie within.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpRegion {
    vertices: Vec<Vector2<f64>>,

    /// +1 if the vertices wind anticlockwise, -1 if clockwise
    winding: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum GeomError {
    #[error("A region needs at least 3 vertices, found {0}")]
    TooFewVertices(usize),

    #[error("The region is not convex")]
    NotConvex,

    #[error("The region has zero area")]
    ZeroArea,

    #[error("Region vertex {0:?} is not finite")]
    NonFiniteVertex([f64; 2]),

    #[error("Could not parse \"{0}\" as an `x,y` point")]
    InvalidPoint(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(x_m: f64, y_m: f64, heading_deg: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_deg: wrap_360(heading_deg),
        }
    }

    /// The heading as a mathematical angle in radians.
    pub fn heading_rad(&self) -> f64 {
        compass_deg_to_rad(self.heading_deg)
    }

    /// The point `dist_m` ahead of the pose along its heading.
    pub fn project(&self, dist_m: f64) -> Vector2<f64> {
        let h = self.heading_rad();
        self.position_m + dist_m * Vector2::new(h.cos(), h.sin())
    }
}

impl OpRegion {
    /// Create a new region from its vertices, which may wind in either direction.
    pub fn new(vertices: Vec<Vector2<f64>>) -> Result<Self, GeomError> {
        if vertices.len() < 3 {
            return Err(GeomError::TooFewVertices(vertices.len()));
        }

        if let Some(v) = vertices.iter().find(|v| !(v.x.is_finite() && v.y.is_finite())) {
            return Err(GeomError::NonFiniteVertex([v.x, v.y]));
        }

        // Every turn along the boundary must be in the same sense as every other one. Collinear
        // vertices are allowed.
        let n = vertices.len();
        let mut winding = 0f64;
        for i in 0..n {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            let c = vertices[(i + 2) % n];

            let turn = cross(&(b - a), &(c - b));
            if turn.abs() <= EDGE_TOLERANCE {
                continue;
            }

            if winding == 0.0 {
                winding = turn.signum();
            } else if turn.signum() != winding {
                return Err(GeomError::NotConvex);
            }
        }

        if winding == 0.0 || signed_area(&vertices).abs() <= EDGE_TOLERANCE {
            return Err(GeomError::ZeroArea);
        }

        // A star shaped boundary turns consistently but wraps more than once, which shows up as
        // an area sign that disagrees with the turn direction or a total turn above one rotation.
        if signed_area(&vertices).signum() != winding
            || total_turn(&vertices) > 1.5 * std::f64::consts::TAU
        {
            return Err(GeomError::NotConvex);
        }

        Ok(Self { vertices, winding })
    }

    /// Parse a region from a string of the form `x0,y0:x1,y1:x2,y2`.
    pub fn parse(s: &str) -> Result<Self, GeomError> {
        let vertices = s
            .split(':')
            .filter(|p| !p.trim().is_empty())
            .map(parse_point)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(vertices)
    }

    /// Returns true if the point is inside the region or on its boundary.
    pub fn contains(&self, point: &Vector2<f64>) -> bool {
        let n = self.vertices.len();
        (0..n).all(|i| {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            self.winding * cross(&(b - a), &(point - a)) >= -EDGE_TOLERANCE
        })
    }

    pub fn vertices(&self) -> &[Vector2<f64>] {
        &self.vertices
    }

    /// Render the region back into its `x,y:x,y` string form.
    pub fn to_param_string(&self) -> String {
        self.vertices
            .iter()
            .map(|v| format!("{},{}", v.x, v.y))
            .collect::<Vec<_>>()
            .join(":")
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compass bearing in degrees, [0, 360), of the `to` point as seen from the `from` point.
///
/// Coincident points give a bearing of 0.
pub fn rel_ang(from: &Vector2<f64>, to: &Vector2<f64>) -> f64 {
    let d = to - from;
    if d.norm() == 0.0 {
        return 0.0;
    }

    rad_to_compass_deg(d.y.atan2(d.x))
}

/// Euclidean distance between two points.
pub fn distance(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    (b - a).norm()
}

/// Parse a point from an `x,y` string.
pub fn parse_point(s: &str) -> Result<Vector2<f64>, GeomError> {
    let err = || GeomError::InvalidPoint(s.to_string());

    let mut parts = s.split(',').map(|p| p.trim().parse::<f64>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y)), None) if x.is_finite() && y.is_finite() => {
            Ok(Vector2::new(x, y))
        }
        _ => Err(err()),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// z component of the cross product of two planar vectors
fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

fn signed_area(vertices: &[Vector2<f64>]) -> f64 {
    let n = vertices.len();
    0.5 * (0..n)
        .map(|i| cross(&vertices[i], &vertices[(i + 1) % n]))
        .sum::<f64>()
}

/// Sum of the absolute exterior angles of the boundary
fn total_turn(vertices: &[Vector2<f64>]) -> f64 {
    let n = vertices.len();
    (0..n)
        .filter_map(|i| {
            let e0 = vertices[(i + 1) % n] - vertices[i];
            let e1 = vertices[(i + 2) % n] - vertices[(i + 1) % n];
            if e0.norm() == 0.0 || e1.norm() == 0.0 {
                None
            } else {
                Some(cross(&e0, &e1).atan2(e0.dot(&e1)).abs())
            }
        })
        .sum()
}

#[cfg(test)]
mod test {
    use super::*;

    fn square() -> OpRegion {
        OpRegion::parse("0,0:10,0:10,10:0,10").unwrap()
    }

    #[test]
    fn test_region_contains() {
        let r = square();
        assert!(r.contains(&Vector2::new(5.0, 5.0)));
        assert!(r.contains(&Vector2::new(0.0, 5.0)));
        assert!(r.contains(&Vector2::new(10.0, 10.0)));
        assert!(!r.contains(&Vector2::new(-0.1, 5.0)));
        assert!(!r.contains(&Vector2::new(5.0, 10.1)));

        // Clockwise winding behaves the same
        let cw = OpRegion::parse("0,0:0,10:10,10:10,0").unwrap();
        assert!(cw.contains(&Vector2::new(5.0, 5.0)));
        assert!(!cw.contains(&Vector2::new(11.0, 5.0)));
    }

    #[test]
    fn test_region_validation() {
        assert_eq!(
            OpRegion::parse("0,0:1,1").unwrap_err(),
            GeomError::TooFewVertices(2)
        );
        assert_eq!(
            OpRegion::parse("0,0:10,0:5,2:10,10:0,10").unwrap_err(),
            GeomError::NotConvex
        );
        assert_eq!(
            OpRegion::parse("0,0:1,1:2,2").unwrap_err(),
            GeomError::ZeroArea
        );
        assert!(matches!(
            OpRegion::parse("0,0:a,1:2,2"),
            Err(GeomError::InvalidPoint(_))
        ));

        // Pentagram, every turn is the same way but it's not convex
        assert_eq!(
            OpRegion::parse("0,10:6,-8:-9.5,3:9.5,3:-6,-8").unwrap_err(),
            GeomError::NotConvex
        );
    }

    #[test]
    fn test_region_string_round_trip() {
        assert_eq!(square().to_param_string(), "0,0:10,0:10,10:0,10");
    }

    #[test]
    fn test_rel_ang() {
        let o = Vector2::new(0.0, 0.0);
        assert!((rel_ang(&o, &Vector2::new(0.0, 5.0)) - 0.0).abs() < 1e-9);
        assert!((rel_ang(&o, &Vector2::new(5.0, 0.0)) - 90.0).abs() < 1e-9);
        assert!((rel_ang(&o, &Vector2::new(0.0, -5.0)) - 180.0).abs() < 1e-9);
        assert!((rel_ang(&o, &Vector2::new(-5.0, 0.0)) - 270.0).abs() < 1e-9);
        assert!((rel_ang(&o, &Vector2::new(1.0, 1.0)) - 45.0).abs() < 1e-9);
        assert_eq!(rel_ang(&o, &o), 0.0);
    }

    #[test]
    fn test_pose() {
        let p = Pose::new(1.0, 1.0, -90.0);
        assert_eq!(p.heading_deg, 270.0);

        let ahead = Pose::new(0.0, 0.0, 90.0).project(2.0);
        assert!((ahead - Vector2::new(2.0, 0.0)).norm() < 1e-12);
    }
}
