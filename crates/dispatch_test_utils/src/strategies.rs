//! Proptest strategies for engine inputs.
//!
//! Ranges are sized to the scales the engine actually sees: coordinates
//! within a depot's plausible service area, garbage gauges spanning both
//! sides of the pending-work threshold.

use proptest::prelude::*;

use dispatch_core::math::Vec2Fixed;
use dispatch_core::world::{UnitFlags, ZoneId};

use crate::fixtures::fixed;

/// A world coordinate within typical service-area scale.
pub fn coordinate() -> impl Strategy<Value = i32> {
    -5_000..5_000i32
}

/// A position vector built from [`coordinate`] pairs.
pub fn position() -> impl Strategy<Value = Vec2Fixed> {
    (coordinate(), coordinate()).prop_map(|(x, y)| Vec2Fixed::new(fixed(x), fixed(y)))
}

/// A garbage gauge on either side of the pending-work threshold.
pub fn garbage_amount() -> impl Strategy<Value = i32> {
    0..10_000i32
}

/// An administrative zone, including the unzoned marker.
pub fn zone() -> impl Strategy<Value = ZoneId> {
    (0u8..4).prop_map(ZoneId)
}

/// An arbitrary combination of unit movement flags.
pub fn unit_flags() -> impl Strategy<Value = UnitFlags> {
    (0u16..1024).prop_map(UnitFlags)
}
