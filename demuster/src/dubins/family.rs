//! Dubins path families and sets of families

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::FromIterator;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Direction of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Turn {
    Left,
    Right,
}

/// One of the six canonical Dubins path shapes.
///
/// The declaration order is the tie-break order when two families have the same length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PathFamily {
    Lsl,
    Lsr,
    Rsl,
    Rsr,
    Lrl,
    Rlr,
}

#[derive(Debug, Error, PartialEq)]
#[error("\"{0}\" is not a path family, expected one of LSL, LSR, RSL, RSR, LRL or RLR")]
pub struct ParseFamilyError(pub String);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A set of path families, used to exclude families from a planning call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FamilySet(u8);

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Turn {
    /// +1 for left (anticlockwise) turns, -1 for right turns
    pub fn sign(self) -> f64 {
        match self {
            Turn::Left => 1.0,
            Turn::Right => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Turn::Left => Turn::Right,
            Turn::Right => Turn::Left,
        }
    }
}

impl PathFamily {
    /// All families in tie-break order.
    pub const ALL: [PathFamily; 6] = [
        PathFamily::Lsl,
        PathFamily::Lsr,
        PathFamily::Rsl,
        PathFamily::Rsr,
        PathFamily::Lrl,
        PathFamily::Rlr,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PathFamily::Lsl => "LSL",
            PathFamily::Lsr => "LSR",
            PathFamily::Rsl => "RSL",
            PathFamily::Rsr => "RSR",
            PathFamily::Lrl => "LRL",
            PathFamily::Rlr => "RLR",
        }
    }

    /// Direction of the first arc.
    pub fn first_turn(self) -> Turn {
        match self {
            PathFamily::Lsl | PathFamily::Lsr | PathFamily::Lrl => Turn::Left,
            PathFamily::Rsl | PathFamily::Rsr | PathFamily::Rlr => Turn::Right,
        }
    }

    /// Direction of the last arc.
    pub fn last_turn(self) -> Turn {
        match self {
            PathFamily::Lsl | PathFamily::Rsl | PathFamily::Lrl => Turn::Left,
            PathFamily::Lsr | PathFamily::Rsr | PathFamily::Rlr => Turn::Right,
        }
    }

    /// True for the arc-arc-arc families.
    pub fn is_ccc(self) -> bool {
        matches!(self, PathFamily::Lrl | PathFamily::Rlr)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for PathFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for PathFamily {
    type Err = ParseFamilyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathFamily::ALL
            .iter()
            .copied()
            .find(|f| f.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseFamilyError(s.to_string()))
    }
}

impl FamilySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        PathFamily::ALL.iter().copied().collect()
    }

    /// The families whose first turn is to the left.
    pub fn left_first() -> Self {
        PathFamily::ALL
            .iter()
            .copied()
            .filter(|f| f.first_turn() == Turn::Left)
            .collect()
    }

    pub fn insert(&mut self, family: PathFamily) {
        self.0 |= family.bit();
    }

    pub fn remove(&mut self, family: PathFamily) {
        self.0 &= !family.bit();
    }

    pub fn contains(&self, family: PathFamily) -> bool {
        self.0 & family.bit() != 0
    }

    pub fn union(&self, other: &Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True once every family is in the set.
    pub fn is_full(&self) -> bool {
        self.len() == PathFamily::ALL.len()
    }

    /// Iterate over the families in the set, in tie-break order.
    pub fn iter(&self) -> impl Iterator<Item = PathFamily> + '_ {
        PathFamily::ALL
            .iter()
            .copied()
            .filter(move |f| self.contains(*f))
    }
}

impl FromIterator<PathFamily> for FamilySet {
    fn from_iter<I: IntoIterator<Item = PathFamily>>(iter: I) -> Self {
        let mut set = FamilySet::empty();
        for f in iter {
            set.insert(f);
        }
        set
    }
}

impl fmt::Display for FamilySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(|fam| fam.label()).collect();
        write!(f, "{{{}}}", labels.join(", "))
    }
}
