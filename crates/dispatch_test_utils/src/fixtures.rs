//! Test fixtures and helpers.
//!
//! A builder for assembling small observed worlds (depots, pickups, units)
//! without spelling out every struct field in each test.

use fixed::types::I32F32;

use dispatch_core::math::Vec2Fixed;
use dispatch_core::world::{
    Building, BuildingClass, BuildingId, BuildingKind, DepotInfo, RouteId, ServiceCapacity,
    Severity, Unit, UnitFlags, UnitId, WorldState, ZoneId,
};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a position vector from integer coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::new(fixed(x), fixed(y))
}

/// Incrementally assembles a [`WorldState`] for tests.
///
/// Building ids start at 1 and unit ids at 1, assigned in creation order,
/// so iteration order in `BTreeSet`-backed pools follows creation order.
#[derive(Debug, Default)]
pub struct WorldBuilder {
    world: WorldState,
    next_building: u32,
    next_unit: u32,
}

impl WorldBuilder {
    /// Create an empty builder with observation enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            world: WorldState::new(),
            next_building: 1,
            next_unit: 1,
        }
    }

    fn push_building(&mut self, building: Building) -> BuildingId {
        let id = BuildingId(self.next_building);
        self.next_building += 1;
        self.world.put_building(id, building);
        id
    }

    /// Add an unzoned depot with the given service range and room for
    /// four units.
    pub fn depot(&mut self, x: i32, y: i32, range: i32) -> BuildingId {
        self.depot_zoned(x, y, range, 0)
    }

    /// Add a depot in the given administrative zone.
    pub fn depot_zoned(&mut self, x: i32, y: i32, range: i32, zone: u8) -> BuildingId {
        self.push_building(Building {
            position: pos(x, y),
            zone: ZoneId(zone),
            garbage_amount: 0,
            severity: Severity::None,
            class: BuildingClass::Municipal,
            kind: BuildingKind::Depot(DepotInfo {
                service_range: fixed(range),
                capacity: ServiceCapacity {
                    active_units: 0,
                    max_units: 4,
                },
                full: false,
            }),
            active: true,
            downgrading: false,
        })
    }

    /// Add an unzoned private serviceable building with the given garbage
    /// gauge.
    pub fn pickup(&mut self, x: i32, y: i32, garbage: i32) -> BuildingId {
        self.pickup_zoned(x, y, garbage, 0)
    }

    /// Add a private serviceable building in the given zone.
    pub fn pickup_zoned(&mut self, x: i32, y: i32, garbage: i32, zone: u8) -> BuildingId {
        self.push_building(Building {
            position: pos(x, y),
            zone: ZoneId(zone),
            garbage_amount: garbage,
            severity: Severity::None,
            class: BuildingClass::Private,
            kind: BuildingKind::Serviceable,
            active: true,
            downgrading: false,
        })
    }

    /// Add a private pickup on the positive x axis at an exact squared
    /// distance from the origin.
    pub fn pickup_at_distance_sq(&mut self, distance_sq: i64, garbage: i32) -> BuildingId {
        #[allow(clippy::cast_precision_loss)]
        let x = fixed_f((distance_sq as f64).sqrt());
        self.push_building(Building {
            position: Vec2Fixed::new(x, I32F32::ZERO),
            zone: ZoneId::UNZONED,
            garbage_amount: garbage,
            severity: Severity::None,
            class: BuildingClass::Private,
            kind: BuildingKind::Serviceable,
            active: true,
            downgrading: false,
        })
    }

    /// Add a municipal serviceable building.
    pub fn municipal(&mut self, x: i32, y: i32, garbage: i32) -> BuildingId {
        let id = self.pickup(x, y, garbage);
        if let Some(b) = self.world.building_mut(id) {
            b.class = BuildingClass::Municipal;
        }
        id
    }

    /// Mark a building's severity as critical.
    pub fn critical(&mut self, id: BuildingId) {
        if let Some(b) = self.world.building_mut(id) {
            b.severity = Severity::Critical;
        }
    }

    /// Mark a building's severity as flagged.
    pub fn flagged(&mut self, id: BuildingId) {
        if let Some(b) = self.world.building_mut(id) {
            b.severity = Severity::Flagged;
        }
    }

    /// Overwrite a building's garbage gauge.
    pub fn set_garbage(&mut self, id: BuildingId, amount: i32) {
        if let Some(b) = self.world.building_mut(id) {
            b.garbage_amount = amount;
        }
    }

    /// Put a depot's fleet at capacity.
    pub fn saturate_depot(&mut self, id: BuildingId) {
        if let Some(b) = self.world.building_mut(id) {
            if let BuildingKind::Depot(info) = &mut b.kind {
                info.capacity.active_units = info.capacity.max_units;
            }
        }
    }

    /// Add a spawned collection unit homed at `depot`, out collecting,
    /// with a route attached.
    pub fn unit(&mut self, depot: BuildingId, x: i32, y: i32) -> UnitId {
        let id = UnitId(self.next_unit);
        self.next_unit += 1;
        let mut unit = Unit::new(depot, pos(x, y));
        unit.flags = UnitFlags::SPAWNED | UnitFlags::TRANSFER_TO_SOURCE;
        unit.route = Some(RouteId(id.0));
        self.world.put_unit(id, unit);
        id
    }

    /// Set a unit's velocity.
    pub fn heading(&mut self, id: UnitId, vx: i32, vy: i32) {
        if let Some(u) = self.world.unit_mut(id) {
            u.velocity = pos(vx, vy);
        }
    }

    /// Set a unit's current target.
    pub fn target(&mut self, id: UnitId, target: BuildingId) {
        if let Some(u) = self.world.unit_mut(id) {
            u.target = Some(target);
        }
    }

    /// Overwrite a unit's movement flags.
    pub fn flags(&mut self, id: UnitId, flags: UnitFlags) {
        if let Some(u) = self.world.unit_mut(id) {
            u.flags = flags;
        }
    }

    /// Borrow the world under construction.
    #[must_use]
    pub fn world_ref(&self) -> &WorldState {
        &self.world
    }

    /// Mutably borrow the world under construction.
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// Finish and take the world.
    #[must_use]
    pub fn world(self) -> WorldState {
        self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_sequential_ids() {
        let mut w = WorldBuilder::new();
        let depot = w.depot(0, 0, 100);
        let pickup = w.pickup(10, 0, 5000);
        let unit = w.unit(depot, 0, 0);

        assert_eq!(depot, BuildingId(1));
        assert_eq!(pickup, BuildingId(2));
        assert_eq!(unit, UnitId(1));

        let world = w.world();
        assert!(world.is_depot(depot));
        assert!(world.has_pending_work(pickup));
        assert!(world.is_collection_unit(unit));
    }
}
