//! # Demuster behaviour
//!
//! Ties the planner, tracker, speed policy and course target together into the per-vehicle
//! behaviour. The host calls [`Demuster::proc`] once per control cycle while the behaviour is
//! running and [`Demuster::on_idle`] while it isn't.
//!
//! Each running cycle:
//!
//! - Read the vehicle's position, heading and speed
//! - Plan a trajectory if there isn't one
//! - Track the trajectory, planning a new one straight away if the vehicle has fallen off it
//! - Choose the speed and the course towards the lookahead point
//! - Announce the remaining trajectory to the other vehicles
//!
//! A cycle with missing inputs, or in which no trajectory could be planned, produces no course or
//! speed demand. Skipping a cycle is always safe so neither is treated as an error.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use nalgebra::Vector2;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

// Internal
use crate::course::{course_to_lookahead, CourseSpeed};
use crate::coord::PeerRegistry;
use crate::dubins::{self, FamilySet, PathFamily, PlanError, PlanRequest, Trajectory};
use crate::geom::{OpRegion, Pose};
use crate::speed::{PathProgress, SequentialGate, SpeedPolicy};
use crate::track::{TrackError, TrackEvent, TrackerMode, TrajTracker};
use comms_if::{
    msg::{TrajectoryMsg, VehicleId},
    tc::demuster::DemusterCmd,
};
pub use params::{DemusterParams, ParamEffect, ParamError};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    convert::Convert,
    maths::wrap_360,
    module::State,
    params::{self as util_params, LoadError},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The demuster behaviour of one vehicle.
pub struct Demuster {
    id: VehicleId,

    params: DemusterParams,

    /// Region built from `params.op_region`
    region: Option<OpRegion>,

    tracker: TrajTracker,

    speed: SpeedPolicy,

    /// What this vehicle has heard from the others
    peers: PeerRegistry,

    /// Number of trajectories planned so far
    generation: u64,

    /// Last position the vehicle reported
    last_position: Option<Vector2<f64>>,

    report: StatusReport,
    arch_report: Archiver,
}

/// Initialisation data for the behaviour.
pub struct InitData {
    pub id: VehicleId,
    pub params: DemusterParams,
}

/// Live inputs read each cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Units: meters
    pub position: Option<Vector2<f64>>,

    /// Navigation heading.
    ///
    /// Units: degrees, compass bearing
    pub heading_deg: Option<f64>,

    /// Units: meters/second
    pub speed_ms: Option<f64>,

    /// Raw compass heading, only used when `use_compass_heading` is set. May be outside
    /// [0, 360).
    ///
    /// Units: degrees
    pub compass_heading_deg: Option<f64>,
}

/// Everything the behaviour produces in a cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemusterOutput {
    /// Announcement for the other vehicles
    pub broadcast: Option<TrajectoryMsg>,

    /// Course and speed demand for the vehicle
    pub target: Option<CourseSpeed>,

    /// Number of waypoints not yet reached
    pub points_left: Option<usize>,

    /// Set once the end of the trajectory has been reached
    pub complete: bool,

    /// Trajectory that would be followed, planned while idle
    pub preview: Option<Vec<[f64; 2]>>,
}

/// Status report for one cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Session time of the cycle
    pub time_s: f64,

    pub status: TickStatus,

    pub event: Option<TrackEvent>,

    /// Index of the target waypoint after the cycle
    pub index: Option<usize>,

    pub cpa: Option<f64>,

    pub generation: u64,

    pub speed: Option<f64>,

    pub family: Option<PathFamily>,

    pub points_left: Option<usize>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Overall outcome of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickStatus {
    /// Following the trajectory
    Ok,

    /// A required live input wasn't available
    MissingInput,

    /// No trajectory could be planned
    PlanFailed,

    /// The end of the trajectory has been reached
    Complete,

    /// The behaviour is idle
    Idle,
}

#[derive(Debug, Error)]
pub enum DemusterError {
    #[error("Could not load the behaviour parameters: {0}")]
    ParamLoadError(LoadError),

    #[error("Invalid behaviour parameters: {0}")]
    InvalidParams(ParamError),

    #[error("Tracking error: {0}")]
    TrackError(TrackError),

    #[error("Could not archive the behaviour status: {0}")]
    ArchiveError(ArchiveError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TickStatus {
    fn default() -> Self {
        TickStatus::Idle
    }
}

impl State for Demuster {
    type InitData = InitData;
    type InitError = DemusterError;

    type InputData = InputData;
    type OutputData = DemusterOutput;
    type StatusReport = StatusReport;
    type ProcError = DemusterError;

    /// Initialise the behaviour, checking its parameters.
    fn init(init_data: Self::InitData) -> Result<Self, Self::InitError> {
        let region = init_data
            .params
            .validate()
            .map_err(DemusterError::InvalidParams)?;

        info!(
            "{} demuster initialised, goal ({:.1}, {:.1}) heading {:.1}, mode {}",
            init_data.id,
            init_data.params.goal_x,
            init_data.params.goal_y,
            init_data.params.goal_heading,
            init_data.params.mode
        );
        if let Some(ref r) = region {
            info!("{} operational region {}", init_data.id, r.to_param_string());
        }

        Ok(Self {
            id: init_data.id,
            params: init_data.params,
            region,
            tracker: TrajTracker::new(),
            speed: SpeedPolicy::default(),
            peers: PeerRegistry::new(),
            generation: 0,
            last_position: None,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
        })
    }

    /// Run one cycle of the behaviour.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        self.report = StatusReport {
            time_s: session::get_elapsed_seconds(),
            generation: self.generation,
            ..Default::default()
        };

        // ---- INPUTS ----

        let pose = match self.read_inputs(input_data, true) {
            Some(p) => p,
            None => {
                self.report.status = TickStatus::MissingInput;
                return Ok((DemusterOutput::default(), self.report));
            }
        };

        if self.tracker.mode() == TrackerMode::Complete {
            return Ok((self.complete_output(&pose), self.report));
        }

        // ---- PLANNING ----

        if self.tracker.mode() == TrackerMode::NoPath && !self.replan(&pose)? {
            return Ok((DemusterOutput::default(), self.report));
        }

        // ---- TRACKING ----

        let status = self
            .tracker
            .proc(&pose.position_m, pose.heading_deg, &self.params.tracker)
            .map_err(DemusterError::TrackError)?;
        self.report.event = Some(status.event);

        if status.event.is_replan() && !self.replan(&pose)? {
            return Ok((DemusterOutput::default(), self.report));
        }

        if self.tracker.mode() == TrackerMode::Complete {
            info!("{} reached the end of its trajectory", self.id);
            self.tracker.release();
            return Ok((self.complete_output(&pose), self.report));
        }

        // ---- SPEED AND COURSE ----

        let progress = self.tracker.trajectory().map(|t| PathProgress {
            index: self.tracker.index(),
            num_points: t.len(),
            precision: self.params.precision,
        });
        let speed = self.speed.proc(
            self.params.mode,
            &self.params.speed,
            &self.id,
            &self.peers,
            progress,
        );

        let target = course_to_lookahead(&pose.position_m, &self.tracker).map(|course_deg| {
            CourseSpeed {
                course_deg,
                speed,
            }
        });

        // ---- OUTPUTS ----

        let points_left = self.tracker.points_left();

        self.report.status = TickStatus::Ok;
        self.report.index = Some(self.tracker.index());
        self.report.cpa = self.tracker.cpa();
        self.report.speed = Some(speed);
        self.report.family = self.tracker.trajectory().map(|t| t.family);
        self.report.points_left = Some(points_left);

        let output = DemusterOutput {
            broadcast: Some(TrajectoryMsg::new(
                self.id.clone(),
                self.generation,
                pose.position_m.convert(),
                self.tracker.remaining_points(),
            )),
            target,
            points_left: Some(points_left),
            complete: false,
            preview: None,
        };

        Ok((output, self.report))
    }
}

impl Archived for Demuster {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(&self.report)
    }
}

impl Demuster {
    /// Initialise the behaviour from a parameter file.
    pub fn from_params_file<P: AsRef<Path>>(id: VehicleId, path: P) -> Result<Self, DemusterError> {
        let params = util_params::load(path).map_err(DemusterError::ParamLoadError)?;
        Self::init(InitData { id, params })
    }

    /// Start archiving status reports into the session.
    pub fn init_archive(&mut self, session: &Session) -> Result<(), DemusterError> {
        self.arch_report =
            Archiver::from_path(session, format!("demuster/{}/status_report.csv", self.id))
                .map_err(DemusterError::ArchiveError)?;
        Ok(())
    }

    /// Replace the strategy used in sequential mode.
    pub fn set_sequential_gate(&mut self, gate: Box<dyn SequentialGate>) {
        self.speed.set_gate(gate);
    }

    /// Cycle while the behaviour is idle.
    ///
    /// The vehicle's position is still announced, so that the others know where it is. If
    /// `visualize_path_idle` is set the trajectory the vehicle would follow is planned, but not
    /// adopted, and returned as a preview.
    pub fn on_idle(&mut self, input_data: &InputData) -> DemusterOutput {
        self.report = StatusReport {
            time_s: session::get_elapsed_seconds(),
            generation: self.generation,
            ..Default::default()
        };

        let pose = match self.read_inputs(input_data, false) {
            Some(p) => p,
            None => {
                self.report.status = TickStatus::MissingInput;
                return DemusterOutput::default();
            }
        };

        let preview = if self.params.visualize_path_idle {
            match dubins::plan(&self.plan_request(&pose, FamilySet::empty())) {
                Ok(t) => Some(t.points_from(0)),
                Err(e) => {
                    debug!("No preview trajectory: {}", e);
                    None
                }
            }
        } else {
            None
        };

        DemusterOutput {
            broadcast: Some(self.position_broadcast(&pose, self.generation + 1)),
            preview,
            ..Default::default()
        }
    }

    /// The behaviour is about to start running, a fresh trajectory will be planned.
    pub fn on_idle_to_run(&mut self) {
        debug!("{} starting, trajectory will be regenerated", self.id);
        self.tracker.request_replan();
    }

    /// The behaviour has stopped running. The trajectory is dropped and the vehicle's position is
    /// announced without one, if it is known.
    pub fn on_run_to_idle(&mut self) -> DemusterOutput {
        debug!("{} stopping, releasing trajectory", self.id);
        self.tracker.release();

        DemusterOutput {
            broadcast: self.last_position.map(|p| {
                TrajectoryMsg::new(self.id.clone(), self.generation, p.convert(), Vec::new())
            }),
            ..Default::default()
        }
    }

    /// Apply a runtime configuration command.
    pub fn apply_cmd(&mut self, cmd: &DemusterCmd) -> Result<(), ParamError> {
        match cmd {
            DemusterCmd::RegeneratePath => {
                info!("{} regenerating path", self.id);
                self.tracker.request_replan();
            }
            DemusterCmd::TurningRadiusIncrease | DemusterCmd::TurningRadiusDecrease => {
                let delta = match cmd {
                    DemusterCmd::TurningRadiusIncrease => 1.0,
                    _ => -1.0,
                };
                self.params.radii = self.params.radii.offset(delta);
                info!("{} turning radius: {:.1}", self.id, self.params.radii.r1);
                self.tracker.request_replan();
            }
            DemusterCmd::SlowdownRangeIncrease | DemusterCmd::SlowdownRangeDecrease => {
                let delta = match cmd {
                    DemusterCmd::SlowdownRangeIncrease => 1.0,
                    _ => -1.0,
                };
                self.params.speed.slowdown_range =
                    (self.params.speed.slowdown_range + delta).max(0.0);
                info!(
                    "{} slowdown range: {:.1}",
                    self.id, self.params.speed.slowdown_range
                );
            }
            DemusterCmd::SetParam { name, value } => self.set_param(name, value)?,
        }

        Ok(())
    }

    /// Set a parameter by name. On error the previous value is kept.
    pub fn set_param(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        let effect = match self.params.set(name, value) {
            Ok(e) => e,
            Err(e) => {
                warn!("{} rejected parameter {} = {}: {}", self.id, name, value, e);
                return Err(e);
            }
        };

        self.region = self.params.validate()?;
        debug!("{} set {} = {}", self.id, name, value);

        if name.trim().eq_ignore_ascii_case("op_region") {
            if let Some(ref r) = self.region {
                info!("{} operational region {}", self.id, r.to_param_string());
            }
        }

        if effect == ParamEffect::Regenerate {
            info!("{} regenerating path", self.id);
            self.tracker.request_replan();
        }

        Ok(())
    }

    /// Store a trajectory announcement from another vehicle.
    pub fn receive(&mut self, msg: TrajectoryMsg) -> bool {
        if msg.source == self.id {
            return false;
        }
        self.peers.update_trajectory(msg)
    }

    pub fn id(&self) -> &VehicleId {
        &self.id
    }

    pub fn params(&self) -> &DemusterParams {
        &self.params
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn registry_mut(&mut self) -> &mut PeerRegistry {
        &mut self.peers
    }

    pub fn tracker(&self) -> &TrajTracker {
        &self.tracker
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_complete(&self) -> bool {
        self.tracker.mode() == TrackerMode::Complete
    }

    /// Read the pose and speed, recording the speed in the registry. Returns `None` if any
    /// required input is missing. Speed is only required while running.
    fn read_inputs(&mut self, input: &InputData, need_speed: bool) -> Option<Pose> {
        if let Some(s) = input.speed_ms {
            self.peers.update_speed(&self.id, s);
        }

        let (position, nav_heading_deg) = match (input.position, input.heading_deg) {
            (Some(p), Some(h)) if input.speed_ms.is_some() || !need_speed => (p, h),
            _ => {
                warn!("{}: no position, heading or speed available", self.id);
                return None;
            }
        };

        let heading_deg = if self.params.use_compass_heading {
            match input.compass_heading_deg {
                Some(h) => wrap_360(h),
                None => {
                    warn!("{}: no compass heading available", self.id);
                    return None;
                }
            }
        } else {
            nav_heading_deg
        };

        self.last_position = Some(position);

        Some(Pose {
            position_m: position,
            heading_deg,
        })
    }

    fn plan_request(&self, pose: &Pose, excluded: FamilySet) -> PlanRequest<'_> {
        let start = if self.params.project_first_point {
            pose.project(self.params.tracker.capture_radius)
        } else {
            pose.position_m
        };

        PlanRequest {
            start,
            start_heading_deg: pose.heading_deg,
            goal: self.params.goal(),
            goal_heading_deg: self.params.goal_heading,
            radii: self.params.radii,
            precision: self.params.precision,
            excluded,
            region: self.region.as_ref(),
        }
    }

    /// Plan a new trajectory from the pose and start tracking it.
    ///
    /// Returns false if no trajectory could be planned, in which case the tracker is left
    /// without one so that planning is tried again next cycle.
    fn replan(&mut self, pose: &Pose) -> Result<bool, DemusterError> {
        let mut excluded = FamilySet::empty();
        if self.params.only_right_turns {
            debug!("{} restricting first turn to the right", self.id);
            excluded = FamilySet::left_first();
            self.params.only_right_turns = false;
        }

        let result = dubins::plan(&self.plan_request(pose, excluded));
        let traj = match result {
            Ok(t) => t,
            Err(e) => {
                self.plan_failed(e);
                return Ok(false);
            }
        };

        self.adopt(traj)?;
        Ok(true)
    }

    fn plan_failed(&mut self, e: PlanError) {
        warn!("{}: no path found: {}", self.id, e);
        self.tracker.request_replan();
        self.report.status = TickStatus::PlanFailed;
    }

    fn adopt(&mut self, traj: Trajectory) -> Result<(), DemusterError> {
        self.generation += 1;
        self.report.generation = self.generation;

        info!(
            "{} planned {} trajectory {}: {} waypoints, {:.1} m",
            self.id,
            traj.family,
            self.generation,
            traj.len(),
            traj.length
        );

        session::save(
            format!("demuster/{}/{}_dubin_{}.json", self.id, self.id, self.generation),
            traj.clone(),
        );

        self.tracker.load(traj).map_err(DemusterError::TrackError)
    }

    fn position_broadcast(&self, pose: &Pose, generation: u64) -> TrajectoryMsg {
        TrajectoryMsg::new(
            self.id.clone(),
            generation,
            pose.position_m.convert(),
            Vec::new(),
        )
    }

    fn complete_output(&mut self, pose: &Pose) -> DemusterOutput {
        self.report.status = TickStatus::Complete;
        self.report.points_left = Some(0);

        DemusterOutput {
            broadcast: Some(self.position_broadcast(pose, self.generation)),
            points_left: Some(0),
            complete: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dubins::TurnRadii;
    use crate::sim::{SimParams, SimVehicle};
    use crate::speed::{CoordinationMode, MaxMovingPeers};

    fn params() -> DemusterParams {
        let mut p = DemusterParams::default();
        p.goal_x = 40.0;
        p.goal_y = 40.0;
        p.goal_heading = 90.0;
        p.radii = TurnRadii::uniform(5.0);
        p.speed.desired_speed = 2.0;
        p.speed.lpf_alpha = 0.5;
        p
    }

    fn demuster(p: DemusterParams) -> Demuster {
        Demuster::init(InitData {
            id: VehicleId::from("abe"),
            params: p,
        })
        .unwrap()
    }

    fn input(x: f64, y: f64, heading_deg: f64) -> InputData {
        InputData {
            position: Some(Vector2::new(x, y)),
            heading_deg: Some(heading_deg),
            speed_ms: Some(0.0),
            compass_heading_deg: None,
        }
    }

    #[test]
    fn test_missing_input() {
        let mut d = demuster(params());

        let (out, rpt) = d.proc(&InputData::default()).unwrap();
        assert_eq!(out, DemusterOutput::default());
        assert_eq!(rpt.status, TickStatus::MissingInput);
        assert_eq!(d.generation(), 0);

        // Running needs the speed as well
        let mut no_speed = input(0.0, 0.0, 0.0);
        no_speed.speed_ms = None;
        let (out, rpt) = d.proc(&no_speed).unwrap();
        assert_eq!(out, DemusterOutput::default());
        assert_eq!(rpt.status, TickStatus::MissingInput);

        // Compass selected but not available
        d.set_param("use_compass_heading", "true").unwrap();
        let (out, rpt) = d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert!(out.target.is_none());
        assert_eq!(rpt.status, TickStatus::MissingInput);

        let mut i = input(0.0, 0.0, 0.0);
        i.compass_heading_deg = Some(-10.0);
        let (out, rpt) = d.proc(&i).unwrap();
        assert_eq!(rpt.status, TickStatus::Ok);
        assert!(out.target.is_some());
    }

    #[test]
    fn test_first_cycle() {
        let mut d = demuster(params());

        let (out, rpt) = d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(rpt.status, TickStatus::Ok);
        assert_eq!(rpt.generation, 1);

        // The first waypoint is a meter away so it is captured straight away
        assert_eq!(rpt.event, Some(TrackEvent::Captured));
        assert_eq!(rpt.index, Some(1));

        let traj = d.tracker().trajectory().unwrap().clone();
        let msg = out.broadcast.unwrap();
        assert_eq!(msg.label, "abe_dubin_1");
        assert_eq!(msg.position, [0.0, 0.0]);
        assert_eq!(msg.waypoints.len(), traj.len() - 1);
        assert_eq!(msg.waypoints[0], [traj.waypoints[1].x, traj.waypoints[1].y]);
        assert_eq!(out.points_left, Some(traj.len() - 1));

        // First filtered step towards the cruise speed
        let target = out.target.unwrap();
        assert!((target.speed - 1.0).abs() < 1e-12);

        // Course is towards the waypoint after the target
        let expected = crate::geom::rel_ang(&Vector2::zeros(), &traj.waypoints[2]);
        assert!((target.course_deg - expected).abs() < 1e-9);

        // Own speed was recorded
        assert_eq!(d.registry().speed(&VehicleId::from("abe")), Some(0.0));
    }

    #[test]
    fn test_plan_failure() {
        let mut p = params();
        p.op_region = Some(vec![[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]]);
        let mut d = demuster(p);

        let (out, rpt) = d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(out, DemusterOutput::default());
        assert_eq!(rpt.status, TickStatus::PlanFailed);
        assert_eq!(d.tracker().mode(), TrackerMode::NoPath);

        // Widening the region lets the next cycle plan
        d.set_param("op_region", "-100,-100:100,-100:100,100:-100,100")
            .unwrap();
        let (out, rpt) = d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(rpt.status, TickStatus::Ok);
        assert!(out.target.is_some());
    }

    #[test]
    fn test_precision_too_fine() {
        let mut d = demuster(params());

        // Accepted as a parameter, but the planner refuses to build that many waypoints
        d.set_param("precision", "1e-300").unwrap();
        let (out, rpt) = d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(out, DemusterOutput::default());
        assert_eq!(rpt.status, TickStatus::PlanFailed);
        assert_eq!(d.generation(), 0);

        d.set_param("precision", "1").unwrap();
        let (_, rpt) = d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(rpt.status, TickStatus::Ok);
        assert_eq!(d.generation(), 1);
    }

    #[test]
    fn test_project_first_point() {
        let mut p = params();
        p.visualize_path_idle = true;
        let mut d = demuster(p.clone());

        // Heading north from the origin the first waypoint is about a meter along the path
        let first = d.on_idle(&input(0.0, 0.0, 0.0)).preview.unwrap()[0];
        assert!((Vector2::new(first[0], first[1]).norm() - 1.0).abs() < 0.01);

        // Projected forward by the capture radius, the path starts from (0, 2)
        p.project_first_point = true;
        let mut d = demuster(p);
        let first = d.on_idle(&input(0.0, 0.0, 0.0)).preview.unwrap()[0];
        let start = Vector2::new(0.0, 2.0);
        assert!(((Vector2::new(first[0], first[1]) - start).norm() - 1.0).abs() < 0.01);

        // The same applies to the trajectory adopted when running
        d.on_idle_to_run();
        d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        let wp = d.tracker().trajectory().unwrap().waypoints[0];
        assert!(((wp - start).norm() - 1.0).abs() < 0.01);
        assert!(wp.norm() > 2.5);
    }

    #[test]
    fn test_only_right_turns_once() {
        let mut p = params();
        // Goal behind and to the left, a left turn would be shortest
        p.goal_x = -100.0;
        p.goal_y = 0.0;
        p.goal_heading = 0.0;
        p.radii = TurnRadii::uniform(10.0);
        p.only_right_turns = true;
        let mut d = demuster(p);

        d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        let first = d.tracker().trajectory().unwrap().family;
        assert_eq!(first.first_turn(), crate::dubins::Turn::Right);
        assert!(!d.params().only_right_turns);

        d.apply_cmd(&DemusterCmd::RegeneratePath).unwrap();
        d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(d.generation(), 2);
        assert_eq!(
            d.tracker().trajectory().unwrap().family.first_turn(),
            crate::dubins::Turn::Left
        );
    }

    #[test]
    fn test_drift_replans_same_cycle() {
        let mut p = params();
        p.radii = TurnRadii::uniform(20.0);
        p.precision = 5.0;
        let mut d = demuster(p);

        let (_, rpt) = d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(rpt.event, Some(TrackEvent::Hold));
        assert_eq!(d.generation(), 1);

        // Jump well away from the trajectory
        let (out, rpt) = d.proc(&input(-20.0, 0.0, 0.0)).unwrap();
        assert_eq!(rpt.event, Some(TrackEvent::DriftReplan));
        assert_eq!(rpt.generation, 2);
        assert_eq!(d.tracker().mode(), TrackerMode::Tracking);
        assert_eq!(d.tracker().index(), 0);

        let msg = out.broadcast.unwrap();
        assert_eq!(msg.label, "abe_dubin_2");
        assert_eq!(msg.position, [-20.0, 0.0]);
        assert!(out.target.is_some());
    }

    #[test]
    fn test_commands() {
        let mut d = demuster(params());
        d.proc(&input(0.0, 0.0, 0.0)).unwrap();

        d.apply_cmd(&DemusterCmd::TurningRadiusIncrease).unwrap();
        assert_eq!(d.params().radii, TurnRadii::uniform(6.0));
        assert_eq!(d.tracker().mode(), TrackerMode::NoPath);

        for _ in 0..10 {
            d.apply_cmd(&DemusterCmd::TurningRadiusDecrease).unwrap();
        }
        assert_eq!(d.params().radii, TurnRadii::uniform(0.0));

        d.apply_cmd(&DemusterCmd::SlowdownRangeIncrease).unwrap();
        d.apply_cmd(&DemusterCmd::SlowdownRangeIncrease).unwrap();
        assert_eq!(d.params().speed.slowdown_range, 2.0);
        for _ in 0..3 {
            d.apply_cmd(&DemusterCmd::SlowdownRangeDecrease).unwrap();
        }
        assert_eq!(d.params().speed.slowdown_range, 0.0);

        d.apply_cmd(&DemusterCmd::SetParam {
            name: "MODE".into(),
            value: "simultaneous".into(),
        })
        .unwrap();
        assert_eq!(d.params().mode, CoordinationMode::Simultaneous);

        assert!(d
            .apply_cmd(&DemusterCmd::SetParam {
                name: "precision".into(),
                value: "-1".into(),
            })
            .is_err());
        assert_eq!(d.params().precision, 1.0);
    }

    #[test]
    fn test_idle() {
        let mut p = params();
        p.visualize_path_idle = true;
        let mut d = demuster(p);

        let out = d.on_idle(&input(0.0, 0.0, 0.0));
        let msg = out.broadcast.unwrap();
        assert_eq!(msg.label, "abe_dubin_1");
        assert!(msg.waypoints.is_empty());
        assert!(!out.preview.unwrap().is_empty());
        assert!(out.target.is_none());

        // Speed isn't needed to announce the position while idle
        let mut no_speed = input(3.0, 4.0, 0.0);
        no_speed.speed_ms = None;
        let out = d.on_idle(&no_speed);
        assert_eq!(out.broadcast.unwrap().position, [3.0, 4.0]);

        // Nothing was adopted
        assert_eq!(d.generation(), 0);
        assert_eq!(d.tracker().mode(), TrackerMode::NoPath);

        d.on_idle_to_run();
        d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(d.generation(), 1);

        let out = d.on_run_to_idle();
        let msg = out.broadcast.unwrap();
        assert_eq!(msg.label, "abe_dubin_1");
        assert!(msg.waypoints.is_empty());
        assert_eq!(d.tracker().mode(), TrackerMode::NoPath);
    }

    #[test]
    fn test_receive() {
        let mut d = demuster(params());

        assert!(!d.receive(TrajectoryMsg::new(
            VehicleId::from("abe"),
            1,
            [0.0, 0.0],
            vec![]
        )));
        assert!(d.receive(TrajectoryMsg::new(
            VehicleId::from("ben"),
            1,
            [0.0, 0.0],
            vec![[1.0, 1.0]]
        )));
        assert_eq!(d.registry().points_left(&VehicleId::from("ben")), 2);
    }

    #[test]
    fn test_sequential_gate() {
        let mut p = params();
        p.mode = CoordinationMode::Sequential;
        let mut d = demuster(p);
        d.set_sequential_gate(Box::new(MaxMovingPeers { max_moving: 1 }));
        d.registry_mut().update_speed(&VehicleId::from("ben"), 1.0);

        let (out, _) = d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(out.target.unwrap().speed, 0.0);

        d.registry_mut().update_speed(&VehicleId::from("ben"), 0.0);
        let (out, _) = d.proc(&input(0.0, 0.0, 0.0)).unwrap();
        assert!(out.target.unwrap().speed > 0.0);
    }

    #[test]
    fn test_run_to_completion() {
        let mut d = demuster(params());
        let mut sim = SimVehicle::new(
            Pose::new(0.0, 0.0, 0.0),
            SimParams {
                speed_time_const_s: 0.5,
                max_turn_rate_degs: 60.0,
            },
        );

        let mut last_points_left = None;
        let mut last_generation = 0;
        let mut complete = false;

        for _ in 0..2000 {
            let i = InputData {
                position: Some(sim.pose.position_m),
                heading_deg: Some(sim.pose.heading_deg),
                speed_ms: Some(sim.speed_ms),
                compass_heading_deg: None,
            };
            let (out, rpt) = d.proc(&i).unwrap();

            if out.complete {
                assert_eq!(rpt.status, TickStatus::Complete);
                complete = true;
                break;
            }

            // Progress along one trajectory never goes backwards
            if rpt.generation == last_generation {
                if let (Some(prev), Some(now)) = (last_points_left, out.points_left) {
                    assert!(now <= prev);
                }
            }
            last_points_left = out.points_left;
            last_generation = rpt.generation;

            sim.step(out.target.as_ref(), 0.1);
        }

        assert!(complete);
        let goal = Vector2::new(40.0, 40.0);
        assert!((sim.pose.position_m - goal).norm() < 3.5);

        // Stays complete
        let i = input(sim.pose.position_m.x, sim.pose.position_m.y, 90.0);
        let (out, rpt) = d.proc(&i).unwrap();
        assert!(out.complete);
        assert!(out.target.is_none());
        assert_eq!(rpt.status, TickStatus::Complete);
        assert!(d.is_complete());
    }
}
