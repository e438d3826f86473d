//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface. Telecommands reconfigure a running demuster behaviour, either
//! from a script or from the command line.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod demuster;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json::{self, Value};
use thiserror::Error;

// Internal
use crate::msg::VehicleId;
pub use demuster::DemusterCmd;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to one or all vehicles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tc {
    /// The vehicle this command is addressed to, or `None` for all vehicles
    pub target: Option<VehicleId>,

    /// The command itself
    pub cmd: DemusterCmd,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Telecommand types.
///
/// The type is used to identify the purpose of the telecommand, and selects
/// how the payload (if any) is parsed.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum TcType {
    RegeneratePath,
    TurningRadiusIncrease,
    TurningRadiusDecrease,
    SlowdownRangeIncrease,
    SlowdownRangeDecrease,
    SetParam,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("TC has an invalid type ({0})")]
    InvalidType(String),

    #[error("TC of type {0:?} is expected to have a payload but it doesn't")]
    MissingPayload(TcType),

    #[error("TC of type {0:?} has an invalid payload: {1}")]
    InvalidPayload(TcType, String),

    #[error("TC target must be a vehicle name string")]
    InvalidTarget,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet.
    ///
    /// Packets have the form `{"type": "SET_PARAM", "target": "abe",
    /// "payload": {"name": "r", "value": 5}}`, where `target` is optional and
    /// `payload` is only needed for `SET_PARAM`. Payload values may be JSON
    /// strings or any other JSON value, which is used in its textual form.
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        // Parse the JSON string into a value
        let val: Value = serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)?;

        // Get the type of the TC
        let type_str = match val["type"].as_str() {
            Some(s) => s,
            None => {
                return Err(TcParseError::InvalidType(String::from(
                    "Expected \"type\" to be a string",
                )))
            }
        };
        let tc_type = match TcType::from_str(type_str) {
            Some(t) => t,
            None => {
                return Err(TcParseError::InvalidType(format!(
                    "{} is not a recognised TC type",
                    type_str
                )))
            }
        };

        // Get the target, which is all vehicles if not given
        let target = match &val["target"] {
            Value::Null => None,
            Value::String(s) => Some(VehicleId::new(s.as_str())),
            _ => return Err(TcParseError::InvalidTarget),
        };

        let cmd = match tc_type {
            TcType::RegeneratePath => DemusterCmd::RegeneratePath,
            TcType::TurningRadiusIncrease => DemusterCmd::TurningRadiusIncrease,
            TcType::TurningRadiusDecrease => DemusterCmd::TurningRadiusDecrease,
            TcType::SlowdownRangeIncrease => DemusterCmd::SlowdownRangeIncrease,
            TcType::SlowdownRangeDecrease => DemusterCmd::SlowdownRangeDecrease,
            TcType::SetParam => {
                let payload = &val["payload"];
                if payload.is_null() {
                    return Err(TcParseError::MissingPayload(tc_type));
                }

                let name = match payload["name"].as_str() {
                    Some(n) => n.to_string(),
                    None => {
                        return Err(TcParseError::InvalidPayload(
                            tc_type,
                            String::from("Expected \"name\" to be a string"),
                        ))
                    }
                };

                let value = match &payload["value"] {
                    Value::Null => {
                        return Err(TcParseError::InvalidPayload(
                            tc_type,
                            String::from("Expected a \"value\""),
                        ))
                    }
                    Value::String(s) => s.clone(),
                    v => v.to_string(),
                };

                DemusterCmd::SetParam { name, value }
            }
        };

        Ok(Tc { target, cmd })
    }

    /// Returns true if this TC should be applied to the given vehicle.
    pub fn is_for(&self, id: &VehicleId) -> bool {
        match self.target {
            Some(ref t) => t == id,
            None => true,
        }
    }
}

impl TcType {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "REGENERATE_PATH" => Some(TcType::RegeneratePath),
            "TURNING_RADIUS_INCREASE" => Some(TcType::TurningRadiusIncrease),
            "TURNING_RADIUS_DECREASE" => Some(TcType::TurningRadiusDecrease),
            "SLOWDOWN_RANGE_INCREASE" => Some(TcType::SlowdownRangeIncrease),
            "SLOWDOWN_RANGE_DECREASE" => Some(TcType::SlowdownRangeDecrease),
            "SET_PARAM" => Some(TcType::SetParam),
            _ => None,
        }
    }
}
