//! The direction policy: which side wins one sync cycle.
//!
//! This is deliberately a pure function over fingerprints and timestamps so
//! every branch is testable without adapters, clocks, or IO.

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One of the two stores under reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The other store.
    pub fn opposite(&self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// Which store's data overwrote the other's in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// Nothing was written (converged, or the cycle failed before a write).
    #[default]
    None,
    /// Store A's contents replaced store B's.
    AToB,
    /// Store B's contents replaced store A's.
    BToA,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::None => write!(f, "none"),
            Direction::AToB => write!(f, "A to B"),
            Direction::BToA => write!(f, "B to A"),
        }
    }
}

/// Outcome of the decision policy for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Contents already identical; write nothing.
    NoOp,
    /// Store A is strictly newer; replace B's contents wholesale.
    WriteAToB,
    /// Store B is strictly newer; replace A's contents wholesale.
    WriteBToA,
    /// Contents differ but neither side is strictly newer. Refuse to guess:
    /// last-writer-wins on a coin flip is silent data loss.
    Ambiguous,
}

impl Decision {
    /// The write direction this decision implies.
    pub fn direction(&self) -> Direction {
        match self {
            Decision::WriteAToB => Direction::AToB,
            Decision::WriteBToA => Direction::BToA,
            Decision::NoOp | Decision::Ambiguous => Direction::None,
        }
    }
}

/// Decide a cycle from both sides' fingerprints and effective modification
/// timestamps (store-reported, or capture instant as a fallback proxy).
///
/// Equal fingerprints always decide [`Decision::NoOp`] regardless of
/// timestamps; differing fingerprints go to the strictly more recent side,
/// and a timestamp tie is [`Decision::Ambiguous`].
pub fn decide(
    fingerprint_a: Fingerprint,
    fingerprint_b: Fingerprint,
    modified_a: DateTime<Utc>,
    modified_b: DateTime<Utc>,
) -> Decision {
    if fingerprint_a == fingerprint_b {
        return Decision::NoOp;
    }

    match modified_a.cmp(&modified_b) {
        Ordering::Greater => Decision::WriteAToB,
        Ordering::Less => Decision::WriteBToA,
        Ordering::Equal => Decision::Ambiguous,
    }
}
