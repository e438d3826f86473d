//! # Blocking graph
//!
//! Records which vehicles are blocking which. A vehicle that is physically blocked by a peer which
//! has nowhere left to go will never be unblocked, and a chain of physical blocks that loops back
//! on itself is a deadlock. Both are detected here so that the host can break them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::PeerRegistry;
use comms_if::msg::VehicleId;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Directed graph of blocking relationships, `blocked -> blocker`.
#[derive(Debug, Clone, Default)]
pub struct BlockGraph {
    edges: BTreeMap<VehicleId, BTreeMap<VehicleId, BlockStatus>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockStatus {
    Unblocked,

    /// The blocker is in the way but expected to move on
    TempBlocked,

    /// The blocker occupies the space the blocked vehicle needs
    PhysicallyBlocked,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for BlockStatus {
    fn default() -> Self {
        BlockStatus::Unblocked
    }
}

impl BlockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status of `blocked` with respect to `by`. A vehicle cannot block itself.
    pub fn set(&mut self, blocked: &VehicleId, by: &VehicleId, status: BlockStatus) {
        if blocked == by {
            return;
        }

        match status {
            BlockStatus::Unblocked => {
                if let Some(e) = self.edges.get_mut(blocked) {
                    e.remove(by);
                    if e.is_empty() {
                        self.edges.remove(blocked);
                    }
                }
            }
            _ => {
                self.edges
                    .entry(blocked.clone())
                    .or_default()
                    .insert(by.clone(), status);
            }
        }
    }

    pub fn status(&self, blocked: &VehicleId, by: &VehicleId) -> BlockStatus {
        self.edges
            .get(blocked)
            .and_then(|e| e.get(by))
            .copied()
            .unwrap_or_default()
    }

    /// Remove every edge out of `blocked`.
    pub fn clear(&mut self, blocked: &VehicleId) {
        self.edges.remove(blocked);
    }

    /// Vehicles blocking `blocked` with the given status.
    pub fn blockers(&self, blocked: &VehicleId, status: BlockStatus) -> Vec<&VehicleId> {
        match self.edges.get(blocked) {
            Some(e) => e
                .iter()
                .filter(|(_, s)| **s == status)
                .map(|(id, _)| id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// True if following physical blocks from `start` leads round a loop.
    pub fn has_cycle_from(&self, start: &VehicleId) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = BTreeSet::new();
        self.visit(start, &mut visited, &mut stack)
    }

    /// True if `id` is physically blocked by a vehicle with no trajectory left to follow.
    pub fn is_permablocked(&self, id: &VehicleId, peers: &PeerRegistry) -> bool {
        self.blockers(id, BlockStatus::PhysicallyBlocked)
            .into_iter()
            .any(|b| {
                let stuck = peers.points_left(b) <= 1;
                if stuck {
                    debug!("{} is permanently blocked by {}", id, b);
                }
                stuck
            })
    }

    fn visit<'a>(
        &'a self,
        id: &'a VehicleId,
        visited: &mut BTreeSet<&'a VehicleId>,
        stack: &mut BTreeSet<&'a VehicleId>,
    ) -> bool {
        if stack.contains(id) {
            return true;
        }
        if !visited.insert(id) {
            return false;
        }

        stack.insert(id);
        let cycle = self
            .blockers(id, BlockStatus::PhysicallyBlocked)
            .into_iter()
            .any(|next| self.visit(next, visited, stack));
        stack.remove(id);

        cycle
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::msg::TrajectoryMsg;

    fn ids() -> (VehicleId, VehicleId, VehicleId) {
        (
            VehicleId::from("abe"),
            VehicleId::from("ben"),
            VehicleId::from("cal"),
        )
    }

    #[test]
    fn test_set_and_clear() {
        let (a, b, c) = ids();
        let mut g = BlockGraph::new();

        g.set(&a, &a, BlockStatus::PhysicallyBlocked);
        assert_eq!(g.status(&a, &a), BlockStatus::Unblocked);

        g.set(&a, &b, BlockStatus::TempBlocked);
        g.set(&a, &c, BlockStatus::PhysicallyBlocked);
        assert_eq!(g.status(&a, &b), BlockStatus::TempBlocked);
        assert_eq!(g.blockers(&a, BlockStatus::PhysicallyBlocked), vec![&c]);

        g.set(&a, &c, BlockStatus::Unblocked);
        assert!(g.blockers(&a, BlockStatus::PhysicallyBlocked).is_empty());

        g.clear(&a);
        assert_eq!(g.status(&a, &b), BlockStatus::Unblocked);
    }

    #[test]
    fn test_cycles() {
        let (a, b, c) = ids();
        let mut g = BlockGraph::new();

        g.set(&a, &b, BlockStatus::PhysicallyBlocked);
        g.set(&b, &c, BlockStatus::PhysicallyBlocked);
        assert!(!g.has_cycle_from(&a));

        // Temporary blocks don't count
        g.set(&c, &a, BlockStatus::TempBlocked);
        assert!(!g.has_cycle_from(&a));

        g.set(&c, &a, BlockStatus::PhysicallyBlocked);
        assert!(g.has_cycle_from(&a));
        assert!(g.has_cycle_from(&b));
    }

    #[test]
    fn test_permablocked() {
        let (a, b, c) = ids();
        let mut g = BlockGraph::new();
        let mut peers = PeerRegistry::new();

        peers.update_trajectory(TrajectoryMsg::new(
            b.clone(),
            1,
            [0.0, 0.0],
            vec![[1.0, 0.0], [2.0, 0.0]],
        ));
        g.set(&a, &b, BlockStatus::PhysicallyBlocked);
        assert!(!g.is_permablocked(&a, &peers));

        // A blocker that has finished its trajectory will never move
        peers.update_trajectory(TrajectoryMsg::new(b.clone(), 2, [0.0, 0.0], vec![]));
        assert!(g.is_permablocked(&a, &peers));

        // So will one which has never been heard from
        g.set(&a, &b, BlockStatus::Unblocked);
        g.set(&a, &c, BlockStatus::PhysicallyBlocked);
        assert!(g.is_permablocked(&a, &peers));
        g.set(&a, &c, BlockStatus::TempBlocked);
        assert!(!g.is_permablocked(&a, &peers));
    }
}
