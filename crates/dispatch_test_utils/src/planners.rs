//! Scriptable route planner for tests.

use std::collections::{HashMap, HashSet};

use dispatch_core::math::Vec2Fixed;
use dispatch_core::routing::{RouteOutcome, RoutePlanner};
use dispatch_core::world::{BuildingId, RouteId, UnitId, WorldState};

/// A [`RoutePlanner`] whose behavior is scripted per destination and per
/// issued route.
///
/// Routes are issued with sequential ids starting at 1000 so they never
/// collide with fixture-attached route handles.
#[derive(Debug, Default)]
pub struct ScriptedPlanner {
    refuse: HashSet<(i64, i64)>,
    outcomes: HashMap<RouteId, RouteOutcome>,
    next: u32,
    issued: u32,
    released: Vec<RouteId>,
}

impl ScriptedPlanner {
    /// Create a planner that accepts every request and reports every route
    /// as ready.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: 1000,
            ..Self::default()
        }
    }

    /// Refuse all future route requests toward `building`'s position.
    pub fn refuse_destination(&mut self, world: &WorldState, building: BuildingId) {
        if let Some(b) = world.building(building) {
            self.refuse
                .insert((b.position.x.to_bits(), b.position.y.to_bits()));
        }
    }

    /// Script the reported state of a specific route handle.
    pub fn set_outcome(&mut self, route: RouteId, outcome: RouteOutcome) {
        self.outcomes.insert(route, outcome);
    }

    /// Number of routes issued so far.
    #[must_use]
    pub fn routes_issued(&self) -> u32 {
        self.issued
    }

    /// Route handles released back by the engine.
    #[must_use]
    pub fn released(&self) -> &[RouteId] {
        &self.released
    }
}

impl RoutePlanner for ScriptedPlanner {
    fn try_route(&mut self, _unit: UnitId, _from: Vec2Fixed, to: Vec2Fixed) -> Option<RouteId> {
        if self.refuse.contains(&(to.x.to_bits(), to.y.to_bits())) {
            return None;
        }
        self.next += 1;
        self.issued += 1;
        Some(RouteId(self.next))
    }

    fn release_route(&mut self, route: RouteId) {
        self.released.push(route);
    }

    fn route_state(&self, route: RouteId) -> RouteOutcome {
        self.outcomes
            .get(&route)
            .copied()
            .unwrap_or(RouteOutcome::Ready)
    }
}
