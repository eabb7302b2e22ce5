//! Facility-local search geometry.
//!
//! Derives the immediate-search direction mask from a unit's lane placement
//! and evaluates the tiered immediate-range match levels used by target
//! selection. Both are pure functions so they can be tested and swapped
//! independently of the selection algorithm.

use crate::config::DispatchConfig;
use crate::math::{within_half_plane, Fixed, Vec2Fixed};
use crate::world::LanePlacement;

/// Which directions a unit may search for immediate work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionMask {
    /// Candidates ahead of the unit are reachable.
    pub ahead: bool,
    /// Candidates on the left side are reachable.
    pub left: bool,
    /// Candidates on the right side are reachable.
    pub right: bool,
}

impl DirectionMask {
    /// No restriction: lane topology is symmetric or unknown.
    pub const UNRESTRICTED: Self = Self {
        ahead: true,
        left: true,
        right: true,
    };
}

/// Derive the direction mask from a unit's lane placement.
///
/// A unit on the leftmost vehicle lane cannot cut across traffic to the
/// right, and vice versa. Interior lanes (or unknown placement) are
/// unrestricted. A single-lane segment is both edges at once, so only
/// "ahead" remains.
#[must_use]
pub fn direction_mask(lane: Option<LanePlacement>) -> DirectionMask {
    let Some(lane) = lane else {
        return DirectionMask::UNRESTRICTED;
    };
    if lane.lane_count == 0 {
        return DirectionMask::UNRESTRICTED;
    }
    let leftmost = lane.index == 0;
    let rightmost = lane.index as u16 + 1 >= lane.lane_count as u16;
    DirectionMask {
        ahead: true,
        left: leftmost || !rightmost,
        right: rightmost || !leftmost,
    }
}

/// Tiered immediate-range match level for a candidate.
///
/// Level 2 candidates are grabbed outright (claim permitting) and override
/// the unit's rejected-target history; level 1 candidates may bypass the
/// dispatch cooldown but still compete on distance; level 0 candidates go
/// through the full ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImmediateLevel {
    /// Not an immediate match.
    None,
    /// Within the near radius, ahead-gated, inside the ±60° window.
    Near,
    /// Within the commit radius, inside the gated ±90° window.
    Commit,
}

/// Cosine of the ±60° immediate-level-1 window.
const COS_60: f32 = 0.5;

/// Evaluate the immediate-range match level of a candidate.
///
/// `to_candidate` is the offset from the unit to the candidate,
/// `distance_sq` its squared length, `heading` the unit's last velocity.
/// With no usable heading there is no immediate match: grabbing work
/// "conveniently ahead" needs a notion of ahead.
#[must_use]
pub fn immediate_level(
    to_candidate: Vec2Fixed,
    distance_sq: Fixed,
    heading: Vec2Fixed,
    mask: DirectionMask,
    config: &DispatchConfig,
) -> ImmediateLevel {
    if heading.is_zero() {
        return ImmediateLevel::None;
    }

    if distance_sq <= config.immediate_range1 && within_half_plane(heading, to_candidate) {
        let lateral = heading.cross(to_candidate);
        let side_ok = if lateral > Fixed::ZERO {
            mask.left
        } else if lateral < Fixed::ZERO {
            mask.right
        } else {
            mask.ahead
        };
        if side_ok {
            return ImmediateLevel::Commit;
        }
    }

    if distance_sq <= config.immediate_range2
        && mask.ahead
        && crate::math::within_cone(heading, to_candidate, Fixed::from_num(COS_60))
    {
        return ImmediateLevel::Near;
    }

    ImmediateLevel::None
}
