//! Scenario loading and world construction.
//!
//! Scenarios define the initial world for a headless run: depots, pending
//! pickups, fleet size, and the engine configuration under test.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dispatch_core::config::DispatchConfig;
use dispatch_core::math::{Fixed, Vec2Fixed};
use dispatch_core::world::{
    Building, BuildingClass, BuildingId, BuildingKind, DepotInfo, RouteId, ServiceCapacity,
    Severity, Unit, UnitFlags, UnitId, WorldState, ZoneId,
};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// Failed to read file.
    #[error("failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
}

/// A depot in the scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DepotSetup {
    /// World position.
    pub x: i32,
    /// World position.
    pub y: i32,
    /// Service range in world units.
    pub range: i32,
    /// Administrative zone (0 = unzoned).
    #[serde(default)]
    pub zone: u8,
    /// Fleet ceiling.
    pub max_units: u32,
}

/// A pending pickup in the scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PickupSetup {
    /// World position.
    pub x: i32,
    /// World position.
    pub y: i32,
    /// Initial garbage gauge.
    pub garbage: i32,
    /// Administrative zone (0 = unzoned).
    #[serde(default)]
    pub zone: u8,
    /// Report this building as critically flagged.
    #[serde(default)]
    pub critical: bool,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Frames to simulate.
    pub ticks: u64,
    /// Collection units fielded per depot.
    pub units_per_depot: u32,
    /// Engine configuration under test.
    #[serde(default)]
    pub config: DispatchConfig,
    /// Depots.
    pub depots: Vec<DepotSetup>,
    /// Pending pickups.
    pub pickups: Vec<PickupSetup>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }

    /// A small built-in scenario: one depot, a dozen pickups, three units.
    #[must_use]
    pub fn demo() -> Self {
        let mut pickups = Vec::new();
        for i in 0..12i32 {
            pickups.push(PickupSetup {
                x: (i % 4 + 1) * 150,
                y: (i / 4) * 200,
                garbage: 4000 + i * 100,
                zone: 0,
                critical: i == 7,
            });
        }
        Self {
            name: "demo".into(),
            description: "One depot clearing a small neighborhood".into(),
            ticks: 512,
            units_per_depot: 3,
            config: DispatchConfig::default(),
            depots: vec![DepotSetup {
                x: 0,
                y: 0,
                range: 5000,
                zone: 0,
                max_units: 4,
            }],
            pickups,
        }
    }

    /// Materialize the scenario into a world, returning the fleet's ids.
    #[must_use]
    pub fn build_world(&self) -> (WorldState, Vec<UnitId>) {
        let mut world = WorldState::new();
        let mut next_building = 1u32;
        let mut next_unit = 1u32;
        let mut units = Vec::new();

        for depot in &self.depots {
            let id = BuildingId(next_building);
            next_building += 1;
            world.put_building(
                id,
                Building {
                    position: Vec2Fixed::new(Fixed::from_num(depot.x), Fixed::from_num(depot.y)),
                    zone: ZoneId(depot.zone),
                    garbage_amount: 0,
                    severity: Severity::None,
                    class: BuildingClass::Municipal,
                    kind: BuildingKind::Depot(DepotInfo {
                        service_range: Fixed::from_num(depot.range),
                        capacity: ServiceCapacity {
                            active_units: 0,
                            max_units: depot.max_units,
                        },
                        full: false,
                    }),
                    active: true,
                    downgrading: false,
                },
            );

            for _ in 0..self.units_per_depot {
                let unit_id = UnitId(next_unit);
                next_unit += 1;
                let mut unit = Unit::new(id, world.building(id).map_or(Vec2Fixed::ZERO, |b| b.position));
                unit.flags = UnitFlags::SPAWNED | UnitFlags::TRANSFER_TO_SOURCE;
                // Spawned units start on a cruising route
                unit.route = Some(RouteId(u32::MAX - unit_id.0));
                world.put_unit(unit_id, unit);
                units.push(unit_id);
            }
        }

        for pickup in &self.pickups {
            let id = BuildingId(next_building);
            next_building += 1;
            world.put_building(
                id,
                Building {
                    position: Vec2Fixed::new(Fixed::from_num(pickup.x), Fixed::from_num(pickup.y)),
                    zone: ZoneId(pickup.zone),
                    garbage_amount: pickup.garbage,
                    severity: if pickup.critical {
                        Severity::Critical
                    } else {
                        Severity::None
                    },
                    class: BuildingClass::Private,
                    kind: BuildingKind::Serviceable,
                    active: true,
                    downgrading: false,
                },
            );
        }

        (world, units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_scenario_builds() {
        let scenario = Scenario::demo();
        let (world, units) = scenario.build_world();
        assert_eq!(units.len(), 3);
        assert_eq!(world.sorted_building_ids().len(), 13);
        assert!(world.is_depot(BuildingId(1)));
        assert!(world.has_pending_work(BuildingId(2)));
    }

    #[test]
    fn test_scenario_ron_round_trip() {
        let scenario = Scenario::demo();
        let ron = ron::ser::to_string_pretty(&scenario, ron::ser::PrettyConfig::default())
            .expect("serializes");
        let parsed: Scenario = ron::from_str(&ron).expect("parses");
        assert_eq!(parsed.name, scenario.name);
        assert_eq!(parsed.pickups.len(), scenario.pickups.len());
    }
}
