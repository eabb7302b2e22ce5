//! Scenario execution.
//!
//! The runner plays the host's role around the engine: it reports change
//! notifications, moves units along their assigned routes in straight
//! lines, empties buildings units reach, and drains transfer offers. Crude
//! as physics go, but enough to verify assignment behavior end to end.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use dispatch_core::dispatcher::{Dispatcher, TickEvents};
use dispatch_core::math::{Fixed, Vec2Fixed};
use dispatch_core::routing::{RouteOutcome, RoutePlanner};
use dispatch_core::world::{BuildingId, RouteId, UnitFlags, UnitId, WorldState};

use crate::scenario::Scenario;

/// Units of distance a unit covers per tick.
const UNIT_SPEED: i32 = 20;

/// Squared arrival radius.
const ARRIVE_SQ: i32 = 400;

/// Planner that accepts every request with an immediately-ready route.
#[derive(Debug, Default)]
pub struct DirectPlanner {
    next: u32,
}

impl RoutePlanner for DirectPlanner {
    fn try_route(&mut self, _unit: UnitId, _from: Vec2Fixed, _to: Vec2Fixed) -> Option<RouteId> {
        self.next += 1;
        Some(RouteId(self.next))
    }

    fn release_route(&mut self, _route: RouteId) {}

    fn route_state(&self, _route: RouteId) -> RouteOutcome {
        RouteOutcome::Ready
    }
}

/// Outcome of a headless run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Frames simulated.
    pub ticks: u64,
    /// Buildings emptied by the fleet.
    pub collected: u64,
    /// Transfer offers emitted by the engine.
    pub offers: u64,
    /// Requests still pending at the end.
    pub remaining_requests: u64,
    /// Hash of the final assignment state, for determinism checks.
    pub final_hash: u64,
}

/// Runs a scenario to completion.
#[derive(Debug)]
pub struct HeadlessRunner {
    scenario: Scenario,
}

impl HeadlessRunner {
    /// Create a runner for `scenario`.
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario }
    }

    /// Simulate the scenario and summarize the outcome.
    #[must_use]
    pub fn run(&self) -> RunSummary {
        let (mut world, units) = self.scenario.build_world();
        let mut dispatcher = Dispatcher::new(self.scenario.config);
        let mut planner = DirectPlanner::default();

        dispatcher.on_tick(&mut world, &mut planner, &TickEvents::at_frame(0));

        let mut collected = 0u64;
        let mut offers = 0u64;
        let mut changed: Vec<BuildingId> = Vec::new();

        for frame in 1..=self.scenario.ticks {
            let mut events = TickEvents::at_frame(frame);
            events.units_updated.extend_from_slice(&units);
            events.buildings_updated.append(&mut changed);
            dispatcher.on_tick(&mut world, &mut planner, &events);

            offers += world.offers.len() as u64;
            world.offers.clear();

            step_units(&mut world, &units, &mut changed, &mut collected);
        }

        let remaining_requests = world
            .sorted_building_ids()
            .into_iter()
            .filter(|&id| world.has_pending_work(id))
            .count() as u64;

        tracing::info!(
            scenario = %self.scenario.name,
            collected,
            remaining_requests,
            "run finished"
        );

        RunSummary {
            scenario: self.scenario.name.clone(),
            ticks: self.scenario.ticks,
            collected,
            offers,
            remaining_requests,
            final_hash: hash_world(&world),
        }
    }
}

/// Advance every unit one tick of straight-line movement.
fn step_units(
    world: &mut WorldState,
    units: &[UnitId],
    changed: &mut Vec<BuildingId>,
    collected: &mut u64,
) {
    for &unit_id in units {
        let Some(unit) = world.unit(unit_id).copied() else {
            continue;
        };
        if !unit.flags.contains(UnitFlags::SPAWNED) || unit.route.is_none() {
            continue;
        }
        let destination = if unit.flags.contains(UnitFlags::GOING_BACK) {
            Some(unit.source)
        } else {
            unit.target
        };
        let Some(destination) = destination else {
            continue;
        };
        let Some(goal) = world.building(destination).map(|b| b.position) else {
            continue;
        };

        let offset = goal - unit.position;
        if offset.length_squared() <= Fixed::from_num(ARRIVE_SQ) {
            arrive(world, unit_id, destination, changed, collected);
        } else {
            let direction = offset.normalize();
            let step = Vec2Fixed::new(
                direction.x * Fixed::from_num(UNIT_SPEED),
                direction.y * Fixed::from_num(UNIT_SPEED),
            );
            if let Some(u) = world.unit_mut(unit_id) {
                u.position = u.position + step;
                u.velocity = step;
            }
        }
    }
}

/// Resolve an arrival: empty the building, or unload at the depot.
fn arrive(
    world: &mut WorldState,
    unit_id: UnitId,
    destination: BuildingId,
    changed: &mut Vec<BuildingId>,
    collected: &mut u64,
) {
    if world.is_depot(destination) {
        if let Some(u) = world.unit_mut(unit_id) {
            u.transfer_size = 0;
            u.target = None;
            u.flags = UnitFlags::SPAWNED | UnitFlags::TRANSFER_TO_SOURCE;
        }
        return;
    }

    let amount = world.building(destination).map_or(0, |b| b.garbage_amount);
    if amount > 0 {
        if let Some(b) = world.building_mut(destination) {
            b.garbage_amount = 0;
        }
        changed.push(destination);
        *collected += 1;
    }
    if let Some(u) = world.unit_mut(unit_id) {
        u.transfer_size = (u.transfer_size + amount).min(u.cargo_capacity);
        u.target = None;
        if u.transfer_size >= u.cargo_capacity {
            u.flags.insert(UnitFlags::GOING_BACK);
        }
    }
}

/// Hash the observable final state: per-unit targets and flags plus
/// remaining gauges, in sorted id order.
fn hash_world(world: &WorldState) -> u64 {
    let mut hasher = DefaultHasher::new();
    for id in world.sorted_unit_ids() {
        id.0.hash(&mut hasher);
        if let Some(unit) = world.unit(id) {
            unit.target.map(|t| t.0).hash(&mut hasher);
            unit.flags.0.hash(&mut hasher);
            unit.transfer_size.hash(&mut hasher);
        }
    }
    for id in world.sorted_building_ids() {
        id.0.hash(&mut hasher);
        if let Some(building) = world.building(id) {
            building.garbage_amount.hash(&mut hasher);
        }
    }
    hasher.finish()
}
