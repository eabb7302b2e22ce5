//! World state the dispatch engine observes and patches.
//!
//! The world is owned by the host simulation; the engine receives a mutable
//! reference for the duration of one tick and nothing else. Buildings and
//! units are plain data, keyed by opaque ids, with the point queries the
//! engine needs (`has_pending_work`, `is_collection_unit`, ...) exposed as
//! methods so the decision logic never touches raw gauges directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Garbage gauge threshold above which a building has pending work.
pub const PENDING_THRESHOLD: i32 = 2500;

/// Opaque building identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BuildingId(pub u32);

impl std::fmt::Display for BuildingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Opaque unit identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UnitId(pub u32);

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Administrative zone identifier. Zone 0 means "unzoned".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ZoneId(pub u8);

impl ZoneId {
    /// The unzoned marker.
    pub const UNZONED: Self = Self(0);

    /// True if this is the unzoned marker.
    #[must_use]
    pub const fn is_unzoned(self) -> bool {
        self.0 == 0
    }
}

/// Opaque handle to a computed route, owned by the route collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteId(pub u32);

/// Problem severity reported by the world for a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Severity {
    /// No reported problem.
    #[default]
    None,
    /// Flagged with a service problem.
    Flagged,
    /// Flagged with a critical service problem.
    Critical,
}

/// Ownership class of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BuildingClass {
    /// Privately owned (eligible for periodic inspection).
    #[default]
    Private,
    /// Municipal or service building.
    Municipal,
}

/// Current service-capacity state of a depot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceCapacity {
    /// Units currently out servicing requests.
    pub active_units: u32,
    /// Maximum units this depot can field, from throughput configuration.
    pub max_units: u32,
}

impl ServiceCapacity {
    /// True if the depot can field another unit.
    #[must_use]
    pub const fn has_headroom(self) -> bool {
        self.active_units < self.max_units
    }
}

/// Depot-specific state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepotInfo {
    /// Service range in world units (not squared).
    #[serde(with = "fixed_serde")]
    pub service_range: Fixed,
    /// Current fleet capacity state.
    pub capacity: ServiceCapacity,
    /// True when the depot cannot accept more cargo.
    pub full: bool,
}

/// What kind of building this is, from the engine's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingKind {
    /// A depot that dispatches collection units.
    Depot(DepotInfo),
    /// Any other building; a pickup or inspection candidate.
    Serviceable,
}

/// A building as observed from the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// World position.
    pub position: Vec2Fixed,
    /// Administrative zone, if zoned.
    pub zone: ZoneId,
    /// External garbage gauge; pending work when above [`PENDING_THRESHOLD`].
    pub garbage_amount: i32,
    /// Reported problem severity.
    pub severity: Severity,
    /// Ownership class.
    pub class: BuildingClass,
    /// Depot or plain serviceable building.
    pub kind: BuildingKind,
    /// True while the building is operating.
    pub active: bool,
    /// True while the building is being downgraded/decommissioned.
    pub downgrading: bool,
}

impl Building {
    /// True if the garbage gauge crossed the pending-work threshold.
    #[must_use]
    pub const fn has_pending_work(&self) -> bool {
        self.garbage_amount > PENDING_THRESHOLD
    }

    /// Depot info, if this building is a depot.
    #[must_use]
    pub const fn depot(&self) -> Option<&DepotInfo> {
        match &self.kind {
            BuildingKind::Depot(info) => Some(info),
            BuildingKind::Serviceable => None,
        }
    }
}

/// Raw movement flags for a unit, mirrored from the host simulation.
///
/// The engine never branches on these bits directly outside of
/// [`crate::status::classify`]; decision logic consumes the derived
/// [`crate::status::UnitStatus`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitFlags(pub u16);

impl UnitFlags {
    /// Unit exists in the world (has a physical presence).
    pub const SPAWNED: Self = Self(1 << 0);
    /// Halted by the host.
    pub const STOPPED: Self = Self(1 << 1);
    /// Waiting for room to spawn.
    pub const WAITING_SPACE: Self = Self(1 << 2);
    /// Waiting for an in-flight route computation.
    pub const WAITING_PATH: Self = Self(1 << 3);
    /// Waiting to load cargo.
    pub const WAITING_LOADING: Self = Self(1 << 4);
    /// Waiting for cargo to arrive.
    pub const WAITING_CARGO: Self = Self(1 << 5);
    /// Blocked until a target is assigned.
    pub const WAITING_TARGET: Self = Self(1 << 6);
    /// Returning to its source depot.
    pub const GOING_BACK: Self = Self(1 << 7);
    /// Transferring cargo toward its source.
    pub const TRANSFER_TO_SOURCE: Self = Self(1 << 8);
    /// Transferring cargo toward its target.
    pub const TRANSFER_TO_TARGET: Self = Self(1 << 9);

    /// Empty flag set.
    pub const NONE: Self = Self(0);

    /// True if all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for UnitFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Lane placement of a unit on its current road segment.
///
/// Used to derive the immediate-search direction mask: a unit on an edge
/// lane cannot reasonably reach candidates across traffic on the far side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanePlacement {
    /// Zero-based lane index, counted from the leftmost vehicle lane.
    pub index: u8,
    /// Number of vehicle lanes on the segment.
    pub lane_count: u8,
}

/// What kind of unit this is, from the engine's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnitKind {
    /// A collection vehicle this engine dispatches.
    #[default]
    Collection,
    /// Any other vehicle; ignored.
    Other,
}

/// A collection unit as observed from (and patched back into) the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Kind of unit.
    pub kind: UnitKind,
    /// Source depot.
    pub source: BuildingId,
    /// Current target building, if any.
    pub target: Option<BuildingId>,
    /// Raw movement flags.
    pub flags: UnitFlags,
    /// Handle of the currently attached route, if any.
    pub route: Option<RouteId>,
    /// Last observed position.
    pub position: Vec2Fixed,
    /// Last observed velocity (zero means no usable heading).
    pub velocity: Vec2Fixed,
    /// Lane placement on the current segment, when known.
    pub lane: Option<LanePlacement>,
    /// Cargo currently loaded.
    pub transfer_size: i32,
    /// Cargo capacity.
    pub cargo_capacity: i32,
    /// Host-side wait counter, reset when the engine retargets the unit.
    pub wait_counter: u8,
}

impl Unit {
    /// Create an empty collection unit homed at `source`.
    #[must_use]
    pub fn new(source: BuildingId, position: Vec2Fixed) -> Self {
        Self {
            kind: UnitKind::Collection,
            source,
            target: None,
            flags: UnitFlags::NONE,
            route: None,
            position,
            velocity: Vec2Fixed::ZERO,
            lane: None,
            transfer_size: 0,
            cargo_capacity: 20000,
            wait_counter: 0,
        }
    }
}

/// Direction of a transfer offer pushed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferKind {
    /// Unit has cargo and offers it to any accepting facility.
    Outgoing,
    /// Unit has spare capacity and asks for more work.
    Incoming,
    /// Depot pushes a pickup directly onto an idle unit.
    FacilityPickup,
}

/// A transfer offer emitted by the engine for the host to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOffer {
    /// Offer direction.
    pub kind: OfferKind,
    /// The unit involved, for unit-side offers.
    pub unit: Option<UnitId>,
    /// The building involved (pickup target or the unit's depot).
    pub building: BuildingId,
    /// Matching priority, 0-7.
    pub priority: u8,
    /// Position the host should match against.
    pub position: Vec2Fixed,
}

/// The mutable world the engine reads and patches during one tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldState {
    buildings: HashMap<BuildingId, Building>,
    units: HashMap<UnitId, Unit>,
    /// Offers pushed by the engine, drained by the host after each tick.
    pub offers: Vec<TransferOffer>,
    /// True when the host's observation service is available.
    ///
    /// The engine terminates at initialization when this is false; it has
    /// no other way to enumerate world changes.
    pub observation_enabled: bool,
}

impl WorldState {
    /// Create an empty world with observation enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buildings: HashMap::new(),
            units: HashMap::new(),
            offers: Vec::new(),
            observation_enabled: true,
        }
    }

    /// Insert or replace a building.
    pub fn put_building(&mut self, id: BuildingId, building: Building) {
        self.buildings.insert(id, building);
    }

    /// Remove a building.
    pub fn remove_building(&mut self, id: BuildingId) -> Option<Building> {
        self.buildings.remove(&id)
    }

    /// Insert or replace a unit.
    pub fn put_unit(&mut self, id: UnitId, unit: Unit) {
        self.units.insert(id, unit);
    }

    /// Remove a unit.
    pub fn remove_unit(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Get a building by id.
    #[must_use]
    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// Get a mutable building by id.
    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    /// Get a unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a mutable unit by id.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Sorted building ids, for deterministic enumeration.
    #[must_use]
    pub fn sorted_building_ids(&self) -> Vec<BuildingId> {
        let mut ids: Vec<_> = self.buildings.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted unit ids, for deterministic enumeration.
    #[must_use]
    pub fn sorted_unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Is this id a live collection unit?
    #[must_use]
    pub fn is_collection_unit(&self, id: UnitId) -> bool {
        self.units
            .get(&id)
            .is_some_and(|u| u.kind == UnitKind::Collection)
    }

    /// Does this building currently have pending work?
    #[must_use]
    pub fn has_pending_work(&self, id: BuildingId) -> bool {
        self.buildings.get(&id).is_some_and(Building::has_pending_work)
    }

    /// Is this a privately owned building?
    #[must_use]
    pub fn is_private_building(&self, id: BuildingId) -> bool {
        self.buildings
            .get(&id)
            .is_some_and(|b| b.class == BuildingClass::Private)
    }

    /// Is this building a depot?
    #[must_use]
    pub fn is_depot(&self, id: BuildingId) -> bool {
        self.buildings.get(&id).is_some_and(|b| b.depot().is_some())
    }

    /// Push a transfer offer for the host to match.
    pub fn push_offer(&mut self, offer: TransferOffer) {
        self.offers.push(offer);
    }

    /// Despawn a unit: drop its physical presence and route, keep the record.
    pub fn despawn_unit(&mut self, id: UnitId) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.flags.remove(UnitFlags::SPAWNED | UnitFlags::WAITING_PATH);
            unit.route = None;
        }
    }
}
