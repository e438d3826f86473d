//! Demuster behaviour parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use crate::dubins::TurnRadii;
use crate::geom::{parse_point, GeomError, OpRegion};
use crate::speed::{CoordinationMode, ParseModeError, SpeedParams};
use crate::track::TrackerParams;
use util::convert::Convert;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the demuster behaviour.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DemusterParams {
    // ---- GOAL ----
    /// Units: meters
    pub goal_x: f64,

    /// Units: meters
    pub goal_y: f64,

    /// Heading the vehicle should have on arrival.
    ///
    /// Units: degrees, compass bearing
    pub goal_heading: f64,

    // ---- PLANNING ----
    /// Radii of the first, middle and last turns.
    ///
    /// Units: meters
    pub radii: TurnRadii,

    /// Spacing between waypoints along the trajectory.
    ///
    /// Units: meters
    pub precision: f64,

    /// Vertices of the convex region trajectories must stay within, if any.
    pub op_region: Option<Vec<[f64; 2]>>,

    /// Exclude left-first families from the first plan after the behaviour starts.
    pub only_right_turns: bool,

    /// Start the trajectory one capture radius ahead of the vehicle.
    pub project_first_point: bool,

    /// Plan and publish a preview trajectory while idle.
    pub visualize_path_idle: bool,

    // ---- INPUTS ----
    /// Use the compass heading instead of the navigation heading.
    pub use_compass_heading: bool,

    // ---- COORDINATION ----
    pub mode: CoordinationMode,

    pub tracker: TrackerParams,

    pub speed: SpeedParams,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Effect a parameter change has on the behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEffect {
    /// Takes effect from the next cycle
    Updated,

    /// The current trajectory must be thrown away
    Regenerate,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("Unknown parameter \"{0}\"")]
    UnknownParam(String),

    #[error("Invalid value \"{value}\" for parameter {name}")]
    InvalidValue { name: String, value: String },

    #[error("Parameter {0} is out of range")]
    OutOfRange(&'static str),

    #[error("Invalid operational region: {0}")]
    InvalidRegion(GeomError),

    #[error("Invalid goal point: {0}")]
    InvalidGoalPoint(GeomError),

    #[error(transparent)]
    InvalidMode(ParseModeError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for DemusterParams {
    fn default() -> Self {
        Self {
            goal_x: 0.0,
            goal_y: 0.0,
            goal_heading: 0.0,
            radii: TurnRadii::default(),
            precision: 1.0,
            op_region: None,
            only_right_turns: false,
            project_first_point: false,
            visualize_path_idle: false,
            use_compass_heading: false,
            mode: CoordinationMode::default(),
            tracker: TrackerParams::default(),
            speed: SpeedParams::default(),
        }
    }
}

impl DemusterParams {
    pub fn goal(&self) -> Vector2<f64> {
        Vector2::new(self.goal_x, self.goal_y)
    }

    /// Check every parameter, returning the operational region if one is set.
    pub fn validate(&self) -> Result<Option<OpRegion>, ParamError> {
        if ![self.goal_x, self.goal_y, self.goal_heading]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ParamError::OutOfRange("goal"));
        }

        if !self.radii.is_valid() {
            return Err(ParamError::OutOfRange("radii"));
        }

        if !(self.precision.is_finite() && self.precision > 0.0) {
            return Err(ParamError::OutOfRange("precision"));
        }

        if let Some(f) = self.tracker.invalid_field() {
            return Err(ParamError::OutOfRange(f));
        }

        if let Some(f) = self.speed.invalid_field() {
            return Err(ParamError::OutOfRange(f));
        }

        match self.op_region {
            Some(ref v) => OpRegion::new(v.convert())
                .map(Some)
                .map_err(ParamError::InvalidRegion),
            None => Ok(None),
        }
    }

    /// Set a parameter from its name and string value.
    ///
    /// Names are case insensitive. The change is only kept if the resulting parameters are valid,
    /// otherwise the previous values are left in place.
    pub fn set(&mut self, name: &str, value: &str) -> Result<ParamEffect, ParamError> {
        let name = name.trim().to_lowercase();
        let value = value.trim();

        let mut new = self.clone();
        let mut effect = ParamEffect::Updated;

        let num = || parse_num(&name, value);
        let flag = || parse_bool(&name, value);

        match name.as_str() {
            "regenerate_path" => effect = ParamEffect::Regenerate,
            "goal_heading" => new.goal_heading = num()?,
            "goal_x" => new.goal_x = num()?,
            "goal_y" => new.goal_y = num()?,
            "goal_point" => {
                let p = parse_point(value).map_err(ParamError::InvalidGoalPoint)?;
                new.goal_x = p.x;
                new.goal_y = p.y;
            }
            "r" => new.radii = TurnRadii::uniform(num()?),
            "r1" => new.radii.r1 = num()?,
            "r2" => new.radii.r2 = num()?,
            "r3" => new.radii.r3 = num()?,
            "precision" => new.precision = num()?,
            "op_region" => {
                let region = OpRegion::parse(value).map_err(ParamError::InvalidRegion)?;
                new.op_region = Some(region.vertices().convert());
            }
            "only_right_turns" => new.only_right_turns = flag()?,
            "project_first_point" => new.project_first_point = flag()?,
            "visualize_path_idle" => new.visualize_path_idle = flag()?,
            "use_compass_heading" => new.use_compass_heading = flag()?,
            "capture_radius" => new.tracker.capture_radius = num()?,
            "slip_radius" => new.tracker.slip_radius = num()?,
            "drift_radius" => new.tracker.drift_radius = num()?,
            "drift_heading" => new.tracker.drift_heading_deg = num()?,
            "default_speed" => new.speed.default_speed = num()?,
            "speed" => new.speed.desired_speed = num()?,
            "speed_lpf_alpha" => new.speed.lpf_alpha = num()?,
            "slowdown_range" => new.speed.slowdown_range = num()?,
            "mode" => new.mode = value.parse().map_err(ParamError::InvalidMode)?,
            _ => return Err(ParamError::UnknownParam(name.clone())),
        }

        new.validate()?;
        *self = new;

        Ok(effect)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn parse_num(name: &str, value: &str) -> Result<f64, ParamError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParamError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ParamError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParamError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
