//! # Coordination module
//!
//! Vehicles running the demuster behaviour coordinate only through the messages they broadcast.
//! The [`PeerRegistry`] keeps the latest trajectory and speed heard from each vehicle, keyed by
//! its identifier. It is owned by whoever hosts the behaviour rather than shared between
//! vehicles.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod block_graph;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use std::collections::BTreeMap;

// Internal
pub use block_graph::{BlockGraph, BlockStatus};
use comms_if::msg::{SpeedMsg, TrajectoryMsg, VehicleId};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// What is known about one vehicle.
#[derive(Debug, Clone, Default)]
pub struct PeerRecord {
    /// Latest trajectory announcement
    pub trajectory: Option<TrajectoryMsg>,

    /// Latest known speed
    pub speed_ms: Option<f64>,
}

/// Latest known state of every vehicle.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    records: BTreeMap<VehicleId, PeerRecord>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a trajectory announcement.
    ///
    /// Messages older than the stored one, i.e. from an earlier generation or from the same
    /// generation but built earlier, are ignored. Returns true if the message was stored.
    pub fn update_trajectory(&mut self, msg: TrajectoryMsg) -> bool {
        let record = self.records.entry(msg.source.clone()).or_default();

        if let Some(ref current) = record.trajectory {
            if msg.generation < current.generation
                || (msg.generation == current.generation && msg.timestamp < current.timestamp)
            {
                trace!(
                    "Ignoring stale trajectory {} (have {})",
                    msg.label,
                    current.label
                );
                return false;
            }
        }

        record.trajectory = Some(msg);
        true
    }

    /// Record a vehicle's speed.
    pub fn update_speed(&mut self, id: &VehicleId, speed_ms: f64) {
        self.records.entry(id.clone()).or_default().speed_ms = Some(speed_ms);
    }

    /// Record a speed message.
    pub fn update_speed_msg(&mut self, msg: &SpeedMsg) {
        self.update_speed(&msg.source, msg.speed_ms);
    }

    pub fn get(&self, id: &VehicleId) -> Option<&PeerRecord> {
        self.records.get(id)
    }

    pub fn trajectory(&self, id: &VehicleId) -> Option<&TrajectoryMsg> {
        self.records.get(id)?.trajectory.as_ref()
    }

    pub fn speed(&self, id: &VehicleId) -> Option<f64> {
        self.records.get(id)?.speed_ms
    }

    /// Number of trajectory points announced by the vehicle, counting its position. Unknown
    /// vehicles have none.
    pub fn points_left(&self, id: &VehicleId) -> usize {
        match self.trajectory(id) {
            Some(t) => t.points_left() + 1,
            None => 0,
        }
    }

    /// Number of vehicles other than `own` whose latest speed is positive.
    pub fn num_moving(&self, own: &VehicleId) -> usize {
        self.records
            .iter()
            .filter(|(id, r)| *id != own && r.speed_ms.map(|s| s > 0.0).unwrap_or(false))
            .count()
    }

    pub fn ids(&self) -> impl Iterator<Item = &VehicleId> {
        self.records.keys()
    }

    pub fn remove(&mut self, id: &VehicleId) -> Option<PeerRecord> {
        self.records.remove(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
