//! Unit status classification.
//!
//! The host exposes unit movement state as a raw flag bitmask. That
//! representation is fragile to branch on, so the engine derives a tagged
//! status once per decision and keeps all bit-level knowledge here.

use crate::world::{BuildingId, UnitFlags};

/// High-level status of a collection unit, derived from its raw flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// Heading back to its source depot.
    Returning,
    /// At a transfer facility, waiting to unload cargo.
    WaitingToUnload,
    /// Moving cargo between facilities.
    Transferring,
    /// Flag combination does not describe a collection run.
    Confused,
    /// Out collecting but blocked until a target is assigned.
    WaitingForTarget,
    /// Out collecting with an active target.
    Collecting,
}

impl UnitStatus {
    /// True for the statuses that should receive a (new) target.
    #[must_use]
    pub const fn wants_target(self) -> bool {
        matches!(self, Self::Collecting | Self::WaitingForTarget)
    }
}

/// Derive a unit's status from its raw flags and current target.
///
/// Pure function of its inputs; the decision logic never reads the flag
/// bits itself.
#[must_use]
pub fn classify(flags: UnitFlags, target: Option<BuildingId>) -> UnitStatus {
    if !flags.contains(UnitFlags::TRANSFER_TO_SOURCE) {
        if flags.contains(UnitFlags::TRANSFER_TO_TARGET) {
            if flags.contains(UnitFlags::GOING_BACK) {
                return UnitStatus::Returning;
            }
            if flags.contains(UnitFlags::WAITING_TARGET) {
                return UnitStatus::WaitingToUnload;
            }
            if target.is_some() {
                return UnitStatus::Transferring;
            }
        }
        return UnitStatus::Confused;
    }
    if flags.contains(UnitFlags::GOING_BACK) {
        return UnitStatus::Returning;
    }
    if flags.contains(UnitFlags::WAITING_TARGET) {
        return UnitStatus::WaitingForTarget;
    }
    UnitStatus::Collecting
}
