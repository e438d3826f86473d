//! Analytic geometry of the six Dubins path families.
//!
//! All angles in this module are mathematical (radians anticlockwise from +x). A point on a turn
//! circle with centre `c`, radius `r` and turn sign `s` (+1 left, -1 right) at which the vehicle
//! heading is `phi` lies at `c + s * r * n(phi)`, where `n(phi) = (sin(phi), -cos(phi))` is the
//! right-hand normal of the heading.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use super::{PathFamily, Turn, TurnRadii};
use util::maths::wrap_2pi;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Arc sweeps within this of a full turn are treated as no turn at all.
const FULL_TURN_SNAP_RAD: f64 = 1e-9;

/// Distances below this are treated as zero.
const GEOM_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One piece of a Dubins path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    Arc {
        centre: Vector2<f64>,
        radius: f64,
        turn: Turn,

        /// Heading at the start of the arc
        start_heading_rad: f64,

        /// Length along the arc
        length: f64,
    },
    Straight {
        start: Vector2<f64>,
        heading_rad: f64,
        length: f64,
    },
}

/// A fully solved path of one family.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub family: PathFamily,
    pub segments: [Segment; 3],
    pub length: f64,
}

/// The boundary conditions of a planning problem, in mathematical angles.
#[derive(Debug, Clone, Copy)]
pub struct Endpoints {
    pub start: Vector2<f64>,
    pub start_heading_rad: f64,
    pub goal: Vector2<f64>,
    pub goal_heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Segment {
    pub fn length(&self) -> f64 {
        match self {
            Segment::Arc { length, .. } => *length,
            Segment::Straight { length, .. } => *length,
        }
    }

    /// Position and heading at distance `s` along the segment, clamped to the segment.
    pub fn sample(&self, s: f64) -> (Vector2<f64>, f64) {
        match *self {
            Segment::Arc {
                centre,
                radius,
                turn,
                start_heading_rad,
                length,
            } => {
                let s = s.max(0.0).min(length);
                let sign = turn.sign();
                let heading = if radius > GEOM_EPSILON {
                    start_heading_rad + sign * s / radius
                } else {
                    start_heading_rad
                };
                (centre + sign * radius * normal(heading), heading)
            }
            Segment::Straight {
                start,
                heading_rad,
                length,
            } => {
                let s = s.max(0.0).min(length);
                (start + s * unit(heading_rad), heading_rad)
            }
        }
    }
}

impl Candidate {
    /// Position at distance `s` along the whole path, clamped to the path.
    pub fn point_at(&self, s: f64) -> Vector2<f64> {
        let mut remaining = s.max(0.0);
        for (i, seg) in self.segments.iter().enumerate() {
            let len = seg.length();
            if remaining <= len || i == self.segments.len() - 1 {
                return seg.sample(remaining).0;
            }
            remaining -= len;
        }

        // Segments is a fixed size array of three so the loop always returns
        self.segments[2].sample(self.segments[2].length()).0
    }

    /// Sample the path into waypoints every `precision` along it, ending exactly at its end.
    ///
    /// The start point itself is not included, since the vehicle is already there.
    /// Call [`Candidate::waypoint_count`] first, the number of points is not limited here.
    pub fn sample(&self, precision: f64) -> Vec<Vector2<f64>> {
        let mut points = Vec::with_capacity(self.waypoint_count(precision).unwrap_or(0));

        let mut i = 1usize;
        loop {
            let s = i as f64 * precision;
            if s >= self.length - GEOM_EPSILON {
                break;
            }
            points.push(self.point_at(s));
            i += 1;
        }

        points.push(self.point_at(self.length));
        points
    }
}

impl Candidate {
    /// Upper bound on the number of waypoints `sample` produces at the given spacing, or `None`
    /// if it can't be represented.
    pub fn waypoint_count(&self, precision: f64) -> Option<usize> {
        let steps = (self.length / precision).ceil();
        if !steps.is_finite() || steps < 0.0 || steps >= usize::MAX as f64 {
            return None;
        }

        (steps as usize).checked_add(1)
    }
}

impl Endpoints {
    fn turn_centre(
        point: &Vector2<f64>,
        heading_rad: f64,
        turn: Turn,
        radius: f64,
    ) -> Vector2<f64> {
        point - turn.sign() * radius * normal(heading_rad)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Solve the given family for the endpoints, returning `None` if the family is geometrically
/// infeasible.
pub fn solve(family: PathFamily, ends: &Endpoints, radii: &TurnRadii) -> Option<Candidate> {
    if family.is_ccc() {
        solve_ccc(family, ends, radii)
    } else {
        solve_csc(family, ends, radii)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Arc-straight-arc families.
fn solve_csc(family: PathFamily, ends: &Endpoints, radii: &TurnRadii) -> Option<Candidate> {
    let t1 = family.first_turn();
    let t3 = family.last_turn();
    let (s1, s3) = (t1.sign(), t3.sign());

    let c1 = Endpoints::turn_centre(&ends.start, ends.start_heading_rad, t1, radii.r1);
    let c3 = Endpoints::turn_centre(&ends.goal, ends.goal_heading_rad, t3, radii.r3);

    // The straight leaves circle 1 and joins circle 3 at the same heading phi, so
    // `c3 - c1 = L u(phi) + k n(phi)`.
    let d = c3 - c1;
    let d_norm = d.norm();
    let k = s1 * radii.r1 - s3 * radii.r3;
    if d_norm < k.abs() {
        return None;
    }

    let straight_len = (d_norm * d_norm - k * k).max(0.0).sqrt();
    let phi = d.y.atan2(d.x) + k.atan2(straight_len);

    let arc1 = radii.r1 * sweep(s1 * (phi - ends.start_heading_rad));
    let arc3 = radii.r3 * sweep(s3 * (ends.goal_heading_rad - phi));

    let straight_start = c1 + s1 * radii.r1 * normal(phi);

    let segments = [
        Segment::Arc {
            centre: c1,
            radius: radii.r1,
            turn: t1,
            start_heading_rad: ends.start_heading_rad,
            length: arc1,
        },
        Segment::Straight {
            start: straight_start,
            heading_rad: phi,
            length: straight_len,
        },
        Segment::Arc {
            centre: c3,
            radius: radii.r3,
            turn: t3,
            start_heading_rad: phi,
            length: arc3,
        },
    ];

    Some(Candidate {
        family,
        segments,
        length: arc1 + straight_len + arc3,
    })
}

/// Arc-arc-arc families, the middle circle touching both end circles from outside.
fn solve_ccc(family: PathFamily, ends: &Endpoints, radii: &TurnRadii) -> Option<Candidate> {
    let t1 = family.first_turn();
    let t2 = t1.opposite();
    let s1 = t1.sign();
    let s2 = t2.sign();

    let c1 = Endpoints::turn_centre(&ends.start, ends.start_heading_rad, t1, radii.r1);
    let c3 = Endpoints::turn_centre(&ends.goal, ends.goal_heading_rad, t1, radii.r3);

    let a = radii.r1 + radii.r2;
    let b = radii.r2 + radii.r3;
    let d = c3 - c1;
    let d_norm = d.norm();

    if d_norm < GEOM_EPSILON
        || a < GEOM_EPSILON
        || b < GEOM_EPSILON
        || d_norm > a + b
        || d_norm < (a - b).abs()
    {
        return None;
    }

    // Angle at c1 between c1->c3 and c1->c2
    let cos_beta = ((a * a + d_norm * d_norm - b * b) / (2.0 * a * d_norm))
        .max(-1.0)
        .min(1.0);
    let beta = cos_beta.acos();
    let alpha = d.y.atan2(d.x);

    // Both placements of the middle circle are valid, keep the shorter one
    let mut best: Option<Candidate> = None;
    for side in [1.0, -1.0].iter() {
        let ang = alpha + side * beta;
        let c2 = c1 + a * unit(ang);

        let phi1 = normal_to_heading(&(s1 * (c2 - c1) / a));
        let phi2 = normal_to_heading(&(-s1 * (c3 - c2) / b));

        let arc1 = radii.r1 * sweep(s1 * (phi1 - ends.start_heading_rad));
        let arc2 = radii.r2 * sweep(s2 * (phi2 - phi1));
        let arc3 = radii.r3 * sweep(s1 * (ends.goal_heading_rad - phi2));

        let candidate = Candidate {
            family,
            segments: [
                Segment::Arc {
                    centre: c1,
                    radius: radii.r1,
                    turn: t1,
                    start_heading_rad: ends.start_heading_rad,
                    length: arc1,
                },
                Segment::Arc {
                    centre: c2,
                    radius: radii.r2,
                    turn: t2,
                    start_heading_rad: phi1,
                    length: arc2,
                },
                Segment::Arc {
                    centre: c3,
                    radius: radii.r3,
                    turn: t1,
                    start_heading_rad: phi2,
                    length: arc3,
                },
            ],
            length: arc1 + arc2 + arc3,
        };

        best = match best {
            Some(b) if b.length <= candidate.length => Some(b),
            _ => Some(candidate),
        };
    }

    best
}

/// Anticlockwise sweep angle in [0, 2pi), with sweeps of almost a full turn snapped to zero.
fn sweep(angle_rad: f64) -> f64 {
    let w = wrap_2pi(angle_rad);
    if w > std::f64::consts::TAU - FULL_TURN_SNAP_RAD {
        0.0
    } else {
        w
    }
}

/// Unit vector along a heading
fn unit(heading_rad: f64) -> Vector2<f64> {
    Vector2::new(heading_rad.cos(), heading_rad.sin())
}

/// Right-hand normal of a heading
fn normal(heading_rad: f64) -> Vector2<f64> {
    Vector2::new(heading_rad.sin(), -heading_rad.cos())
}

/// Inverse of `normal`
fn normal_to_heading(n: &Vector2<f64>) -> f64 {
    n.x.atan2(-n.y)
}
