//! # Trajectory tracking module
//!
//! The tracker owns the current trajectory and the index of the target waypoint within it. Each
//! control cycle it compares the vehicle's position with the target and decides whether to
//! advance to the next waypoint, hold, or throw the trajectory away and ask for a new one.
//!
//! The target is advanced when the vehicle comes within the capture radius, or when the
//! vehicle is moving away from a target it already passed within the slip radius of. The
//! trajectory is abandoned if the vehicle drifts away from the target by more than the drift
//! radius, or if its heading differs from the desired heading by more than the drift heading.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace};
use nalgebra::Vector2;
use serde::Serialize;
use thiserror::Error;

// Internal
use crate::dubins::Trajectory;
use crate::geom::distance;
pub use params::TrackerParams;
use util::maths::{compass_deg_to_rad, get_ang_dist_2pi, wrap_2pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory tracker state.
#[derive(Debug, Clone, Default)]
pub struct TrajTracker {
    /// Executing mode
    mode: TrackerMode,

    /// The trajectory being tracked, only `Some` while tracking or complete
    traj: Option<Trajectory>,

    /// Index of the current target waypoint
    index: usize,

    /// Closest approach to the current target so far, `None` until the first cycle on a new
    /// target
    cpa: Option<f64>,
}

/// Outcome of one tracking cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TrackStatus {
    pub event: TrackEvent,

    /// Target index after the cycle
    pub index: usize,

    /// Distance to the target at the start of the cycle
    pub distance: f64,

    /// Closest approach after the cycle
    pub cpa: Option<f64>,

    /// Absolute difference between the desired and actual headings
    pub heading_diff_deg: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The modes of the tracker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TrackerMode {
    /// No trajectory, one must be planned and loaded
    NoPath,

    /// Following a trajectory
    Tracking,

    /// The last waypoint of the trajectory has been reached
    Complete,
}

/// What happened in a tracking cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TrackEvent {
    /// Keep heading for the current target
    Hold,

    /// The target was captured and the next waypoint is now the target
    Captured,

    /// The target was passed close enough and the next waypoint is now the target
    Slipped,

    /// The final waypoint was reached
    Completed,

    /// The vehicle drifted away from the target, a new trajectory is needed
    DriftReplan,

    /// The vehicle's heading is too far from the desired heading, a new trajectory is needed
    HeadingReplan,
}

#[derive(Debug, Error, PartialEq)]
pub enum TrackError {
    #[error("Attempted to load an empty trajectory")]
    EmptyTrajectory,

    #[error("The tracker has no trajectory to track (mode {0:?})")]
    NotTracking(TrackerMode),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrackerMode {
    fn default() -> Self {
        TrackerMode::NoPath
    }
}

impl Default for TrackEvent {
    fn default() -> Self {
        TrackEvent::Hold
    }
}

impl TrackEvent {
    /// True if the event means the trajectory has been discarded.
    pub fn is_replan(&self) -> bool {
        matches!(self, TrackEvent::DriftReplan | TrackEvent::HeadingReplan)
    }

    /// True if the target index moved on.
    pub fn is_advance(&self) -> bool {
        matches!(
            self,
            TrackEvent::Captured | TrackEvent::Slipped | TrackEvent::Completed
        )
    }
}

impl TrajTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a new trajectory, replacing any current one.
    ///
    /// The target is reset to the first waypoint and the closest approach is cleared.
    pub fn load(&mut self, traj: Trajectory) -> Result<(), TrackError> {
        if traj.is_empty() {
            return Err(TrackError::EmptyTrajectory);
        }

        self.traj = Some(traj);
        self.index = 0;
        self.cpa = None;
        self.mode = TrackerMode::Tracking;

        Ok(())
    }

    /// Discard the current trajectory so that a new one is planned.
    pub fn request_replan(&mut self) {
        self.traj = None;
        self.index = 0;
        self.cpa = None;
        self.mode = TrackerMode::NoPath;
    }

    /// Release the trajectory once it is no longer needed. A complete tracker stays complete.
    pub fn release(&mut self) {
        self.traj = None;
        self.cpa = None;
        if self.mode == TrackerMode::Tracking {
            self.mode = TrackerMode::NoPath;
            self.index = 0;
        }
    }

    /// Process one tracking cycle for the vehicle's position and compass heading.
    pub fn proc(
        &mut self,
        position: &Vector2<f64>,
        heading_deg: f64,
        params: &TrackerParams,
    ) -> Result<TrackStatus, TrackError> {
        let (target, num_points) = match (self.mode, &self.traj) {
            (TrackerMode::Tracking, Some(t)) => match t.get(self.index) {
                Some(p) => (*p, t.len()),
                None => return Err(TrackError::NotTracking(self.mode)),
            },
            _ => return Err(TrackError::NotTracking(self.mode)),
        };

        let dist = distance(position, &target);

        // Heading error, measured the short way round
        let heading_diff_deg = match self.desired_heading_rad() {
            Some(desired) => get_ang_dist_2pi(
                wrap_2pi(desired),
                wrap_2pi(compass_deg_to_rad(heading_deg)),
            )
            .abs()
            .to_degrees(),
            None => 0.0,
        };

        let cpa = match self.cpa {
            Some(c) if c <= dist => c,
            _ => dist,
        };
        self.cpa = Some(cpa);

        let event = if dist < params.capture_radius {
            self.advance(TrackEvent::Captured, num_points)
        } else if dist > cpa && cpa <= params.slip_radius {
            self.advance(TrackEvent::Slipped, num_points)
        } else if dist - cpa > params.drift_radius {
            info!(
                "Drifted {:.2} from the closest approach to waypoint {}, replanning",
                dist - cpa,
                self.index
            );
            self.request_replan();
            TrackEvent::DriftReplan
        } else if heading_diff_deg > params.drift_heading_deg && self.index + 2 < num_points {
            info!(
                "Heading is {:.1} deg off the trajectory, replanning",
                heading_diff_deg
            );
            self.request_replan();
            TrackEvent::HeadingReplan
        } else {
            TrackEvent::Hold
        };

        trace!(
            "Track: dist {:.2}, cpa {:.2}, head diff {:.1} deg, event {:?}",
            dist,
            cpa,
            heading_diff_deg,
            event
        );

        Ok(TrackStatus {
            event,
            index: self.index,
            distance: dist,
            cpa: self.cpa,
            heading_diff_deg,
        })
    }

    /// The heading the vehicle should have to follow the trajectory.
    ///
    /// Once past the third waypoint this is the heading of the segment into the target. Before
    /// that the previous waypoint isn't meaningful yet, so the heading from the target to the
    /// waypoint after it is used instead.
    pub fn desired_heading_rad(&self) -> Option<f64> {
        let traj = self.traj.as_ref()?;
        let target = traj.get(self.index)?;

        let (from, to) = if self.index > 2 {
            (traj.get(self.index - 1)?, target)
        } else {
            (target, self.next_next()?)
        };

        let d = to - from;
        Some(d.y.atan2(d.x))
    }

    /// The current target waypoint.
    pub fn target(&self) -> Option<&Vector2<f64>> {
        self.traj.as_ref()?.get(self.index)
    }

    /// The waypoint after the target, or the trajectory's extra point if the target is the last
    /// waypoint.
    pub fn next_next(&self) -> Option<&Vector2<f64>> {
        let traj = self.traj.as_ref()?;
        if self.index >= traj.len() {
            return None;
        }

        match traj.get(self.index + 1) {
            Some(p) => Some(p),
            None => Some(&traj.extra),
        }
    }

    /// Number of waypoints not yet reached, including the target.
    pub fn points_left(&self) -> usize {
        match self.traj {
            Some(ref t) => t.len().saturating_sub(self.index),
            None => 0,
        }
    }

    /// Waypoints from the target onwards, for broadcasting.
    pub fn remaining_points(&self) -> Vec<[f64; 2]> {
        match self.traj {
            Some(ref t) => t.points_from(self.index),
            None => Vec::new(),
        }
    }

    pub fn mode(&self) -> TrackerMode {
        self.mode
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cpa(&self) -> Option<f64> {
        self.cpa
    }

    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.traj.as_ref()
    }

    /// Move to the next waypoint, completing if there isn't one.
    fn advance(&mut self, event: TrackEvent, num_points: usize) -> TrackEvent {
        self.index += 1;
        self.cpa = None;

        if self.index >= num_points {
            info!("Final waypoint reached, trajectory complete");
            self.mode = TrackerMode::Complete;
            TrackEvent::Completed
        } else {
            debug!("{:?} waypoint, target is now {}", event, self.index);
            event
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dubins::PathFamily;

    /// A straight trajectory due east with a waypoint every 10 m.
    fn east_traj(num_points: usize) -> Trajectory {
        Trajectory {
            waypoints: (1..=num_points)
                .map(|i| Vector2::new(10.0 * i as f64, 0.0))
                .collect(),
            extra: Vector2::new(10.0 * (num_points + 1) as f64, 0.0),
            family: PathFamily::Lsl,
            length: 10.0 * num_points as f64,
        }
    }

    fn tracking(num_points: usize) -> TrajTracker {
        let mut t = TrajTracker::new();
        t.load(east_traj(num_points)).unwrap();
        t
    }

    const EAST: f64 = 90.0;

    #[test]
    fn test_no_path() {
        let mut t = TrajTracker::new();
        assert_eq!(t.mode(), TrackerMode::NoPath);
        assert_eq!(
            t.proc(&Vector2::zeros(), EAST, &TrackerParams::default())
                .unwrap_err(),
            TrackError::NotTracking(TrackerMode::NoPath)
        );

        let mut empty = east_traj(1);
        empty.waypoints.clear();
        assert_eq!(t.load(empty).unwrap_err(), TrackError::EmptyTrajectory);
    }

    #[test]
    fn test_scenario_c_capture() {
        let mut t = tracking(5);
        let params = TrackerParams {
            capture_radius: 2.0,
            ..Default::default()
        };

        // 1 m short of the first waypoint
        let s = t.proc(&Vector2::new(9.0, 0.0), EAST, &params).unwrap();
        assert_eq!(s.event, TrackEvent::Captured);
        assert_eq!(t.index(), 1);
        assert_eq!(t.cpa(), None);
    }

    #[test]
    fn test_scenario_d_slip() {
        let mut t = tracking(5);
        let params = TrackerParams {
            capture_radius: 2.0,
            slip_radius: 5.0,
            drift_radius: 10.0,
            drift_heading_deg: 180.0,
        };

        // Pass 3 m abeam of the first waypoint...
        let s = t.proc(&Vector2::new(10.0, 3.0), EAST, &params).unwrap();
        assert_eq!(s.event, TrackEvent::Hold);
        assert_eq!(t.cpa(), Some(3.0));

        // ...then move away to 4 m, which slips onto the next waypoint
        let s = t.proc(&Vector2::new(10.0, 4.0), EAST, &params).unwrap();
        assert_eq!(s.event, TrackEvent::Slipped);
        assert_eq!(s.distance, 4.0);
        assert_eq!(t.index(), 1);
    }

    #[test]
    fn test_scenario_e_drift() {
        let mut t = tracking(5);
        let params = TrackerParams {
            capture_radius: 0.5,
            slip_radius: 0.5,
            drift_radius: 2.0,
            drift_heading_deg: 180.0,
        };

        let s = t.proc(&Vector2::new(10.0, 1.0), EAST, &params).unwrap();
        assert_eq!(s.event, TrackEvent::Hold);
        assert_eq!(t.cpa(), Some(1.0));

        // Jump to 5 m away, 5 - 1 > 2
        let s = t.proc(&Vector2::new(10.0, 5.0), EAST, &params).unwrap();
        assert_eq!(s.event, TrackEvent::DriftReplan);
        assert!(s.event.is_replan());
        assert_eq!(t.mode(), TrackerMode::NoPath);
        assert!(t.trajectory().is_none());
    }

    #[test]
    fn test_heading_replan() {
        let params = TrackerParams {
            capture_radius: 1.0,
            slip_radius: 0.0,
            drift_radius: 100.0,
            drift_heading_deg: 45.0,
        };

        // Pointing north with plenty of waypoints left
        let mut t = tracking(5);
        let s = t.proc(&Vector2::new(0.0, 0.0), 0.0, &params).unwrap();
        assert_eq!(s.event, TrackEvent::HeadingReplan);
        assert!((s.heading_diff_deg - 90.0).abs() < 1e-9);

        // 44 degrees off is fine
        let mut t = tracking(5);
        let s = t.proc(&Vector2::new(0.0, 0.0), 46.0, &params).unwrap();
        assert_eq!(s.event, TrackEvent::Hold);

        // Near the end of the trajectory heading errors are tolerated
        let mut t = tracking(2);
        let s = t.proc(&Vector2::new(0.0, 0.0), 0.0, &params).unwrap();
        assert_eq!(s.event, TrackEvent::Hold);
    }

    #[test]
    fn test_heading_diff_wraps() {
        let params = TrackerParams {
            capture_radius: 1.0,
            slip_radius: 0.0,
            drift_radius: 100.0,
            drift_heading_deg: 45.0,
        };

        // Trajectory due north, vehicle heading 350 is only 10 degrees off
        let mut t = TrajTracker::new();
        t.load(Trajectory {
            waypoints: (1..=5).map(|i| Vector2::new(0.0, 10.0 * i as f64)).collect(),
            extra: Vector2::new(0.0, 60.0),
            family: PathFamily::Lsl,
            length: 50.0,
        })
        .unwrap();

        let s = t.proc(&Vector2::new(0.0, 0.0), 350.0, &params).unwrap();
        assert_eq!(s.event, TrackEvent::Hold);
        assert!((s.heading_diff_deg - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_completion() {
        let mut t = tracking(2);
        let params = TrackerParams::default();

        assert_eq!(
            t.proc(&Vector2::new(10.0, 0.0), EAST, &params).unwrap().event,
            TrackEvent::Captured
        );
        assert_eq!(t.points_left(), 1);
        assert_eq!(t.remaining_points(), vec![[20.0, 0.0]]);

        // The extra point is the lookahead for the last waypoint
        assert_eq!(t.next_next(), Some(&Vector2::new(30.0, 0.0)));

        assert_eq!(
            t.proc(&Vector2::new(20.0, 0.5), EAST, &params).unwrap().event,
            TrackEvent::Completed
        );
        assert_eq!(t.mode(), TrackerMode::Complete);
        assert_eq!(t.points_left(), 0);
        assert!(t.target().is_none());

        // No more processing once complete, and release keeps it complete
        assert!(t.proc(&Vector2::new(20.0, 0.0), EAST, &params).is_err());
        t.release();
        assert_eq!(t.mode(), TrackerMode::Complete);
    }

    #[test]
    fn test_desired_heading_lookahead() {
        // An L shaped trajectory, east then north
        let mut t = TrajTracker::new();
        t.load(Trajectory {
            waypoints: vec![
                Vector2::new(10.0, 0.0),
                Vector2::new(20.0, 0.0),
                Vector2::new(30.0, 0.0),
                Vector2::new(30.0, 10.0),
                Vector2::new(30.0, 20.0),
            ],
            extra: Vector2::new(30.0, 30.0),
            family: PathFamily::Lsl,
            length: 50.0,
        })
        .unwrap();

        let params = TrackerParams {
            capture_radius: 1.0,
            slip_radius: 0.0,
            drift_radius: 1000.0,
            drift_heading_deg: 360.0,
        };

        // Index 2: target to next waypoint, which is north
        for p in [[10.0, 0.0], [20.0, 0.0]].iter() {
            t.proc(&Vector2::new(p[0], p[1]), EAST, &params).unwrap();
        }
        assert_eq!(t.index(), 2);
        assert!((t.desired_heading_rad().unwrap() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        // Index 3: previous waypoint to target, which is also north
        t.proc(&Vector2::new(30.0, 0.0), EAST, &params).unwrap();
        assert_eq!(t.index(), 3);
        assert!((t.desired_heading_rad().unwrap() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        // Index 1 uses the lookahead, which is still east
        let mut t = tracking(5);
        t.proc(&Vector2::new(10.0, 0.0), EAST, &params).unwrap();
        assert_eq!(t.index(), 1);
        assert!(t.desired_heading_rad().unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_index_and_cpa_monotonic() {
        // Weave towards and past the waypoints, checking that the index never goes backwards and
        // the closest approach never grows between advances
        let mut t = tracking(10);
        let params = TrackerParams {
            capture_radius: 1.0,
            slip_radius: 2.5,
            drift_radius: 50.0,
            drift_heading_deg: 180.0,
        };

        let mut last_index = t.index();
        let mut last_cpa: Option<f64> = None;
        for i in 0..400 {
            let x = 0.3 * i as f64;
            let y = 2.0 * (0.37 * i as f64).sin();
            let s = match t.proc(&Vector2::new(x, y), EAST, &params) {
                Ok(s) => s,
                Err(_) => break,
            };

            assert!(s.index >= last_index);
            if !s.event.is_advance() {
                if let (Some(before), Some(after)) = (last_cpa, s.cpa) {
                    assert!(after <= before);
                }
            }

            last_index = s.index;
            last_cpa = s.cpa;
        }

        assert_eq!(t.mode(), TrackerMode::Complete);
    }
}
