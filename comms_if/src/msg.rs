//! # Inter-vehicle messages
//!
//! Every vehicle running the demuster behaviour announces its position and the remainder of its
//! trajectory to all other vehicles. Peers use the generation counter to discard stale copies.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A stable identifier for a vehicle, normally its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

/// A trajectory announcement.
///
/// `waypoints` holds the points from the sender's current target onwards, so a message sent while
/// idle (or once the trajectory has been released) contains only the sender's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryMsg {
    /// The vehicle which sent this message
    pub source: VehicleId,

    /// Number of trajectories generated by the sender, used for deduplication by peers
    pub generation: u64,

    /// Human readable label of the form `{name}_dubin_{generation}`
    pub label: String,

    /// Position of the sender when the message was built
    pub position: [f64; 2],

    /// The remaining waypoints of the sender's trajectory
    pub waypoints: Vec<[f64; 2]>,

    /// Time at which the message was built
    pub timestamp: DateTime<Utc>,
}

/// A peer's current commanded speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedMsg {
    pub source: VehicleId,
    pub speed_ms: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MsgParseError {
    #[error("Message contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl VehicleId {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl TrajectoryMsg {
    /// Build a new trajectory message stamped with the current time.
    pub fn new(
        source: VehicleId,
        generation: u64,
        position: [f64; 2],
        waypoints: Vec<[f64; 2]>,
    ) -> Self {
        let label = format!("{}_dubin_{}", source, generation);
        Self {
            source,
            generation,
            label,
            position,
            waypoints,
            timestamp: Utc::now(),
        }
    }

    /// Number of waypoints remaining in the announced trajectory.
    pub fn points_left(&self) -> usize {
        self.waypoints.len()
    }

    /// Parse a message from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, MsgParseError> {
        serde_json::from_str(json_str).map_err(MsgParseError::InvalidJson)
    }

    /// Serialise the message into a JSON string.
    pub fn to_json(&self) -> Result<String, MsgParseError> {
        serde_json::to_string(self).map_err(MsgParseError::InvalidJson)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_label_and_json() {
        let msg = TrajectoryMsg::new(
            VehicleId::from("abe"),
            3,
            [1.0, 2.0],
            vec![[3.0, 4.0], [5.0, 6.0]],
        );

        assert_eq!(msg.label, "abe_dubin_3");
        assert_eq!(msg.points_left(), 2);

        let json = msg.to_json().unwrap();

        // The id is transparent so peers see the plain name
        assert!(json.contains("\"source\":\"abe\""));

        let parsed = TrajectoryMsg::from_json(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_invalid_json() {
        assert!(TrajectoryMsg::from_json("{\"source\": 1}").is_err());
    }
}
