//! Tick orchestration and engine lifecycle.
//!
//! The dispatcher owns the per-depot pools and the shared claim/cooldown
//! tables, consumes the host's change notifications each tick, and drives
//! target selection for the units whose shard is due. It is fail-soft: a
//! tick that errors after initialization is logged and dropped, never
//! escalated into the host.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::claim::DispatchTables;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::pool::FacilityPool;
use crate::routing::{apply_target, RouteOutcome, RoutePlanner, PATHFIND_RETRY_MAX};
use crate::shard::ShardPolicy;
use crate::status::{classify, UnitStatus};
use crate::world::{BuildingId, UnitFlags, UnitId, WorldState};

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// No session loaded; everything is reset.
    Idle,
    /// Session loaded, collaborators not yet verified.
    Initializing,
    /// Building the baseline request set from the full world.
    BaselineBuilding,
    /// Normal per-tick operation.
    SteadyState,
    /// Unrecoverable setup failure; the engine stays inert.
    Terminated,
}

/// Host change notifications for one tick.
///
/// The engine never diffs the world itself; everything it reacts to
/// arrives through these lists.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// Monotonic frame counter, also the cooldown clock.
    pub frame: u64,
    /// A session is loaded.
    pub loaded: bool,
    /// Host simulation is paused; ingest but do not dispatch.
    pub paused: bool,
    /// Buildings created or changed since the last tick.
    pub buildings_updated: Vec<BuildingId>,
    /// Buildings removed since the last tick.
    pub buildings_removed: Vec<BuildingId>,
    /// Units created or changed since the last tick.
    pub units_updated: Vec<UnitId>,
    /// Units removed since the last tick.
    pub units_removed: Vec<UnitId>,
}

impl TickEvents {
    /// Events for a loaded, unpaused frame with no changes.
    #[must_use]
    pub fn at_frame(frame: u64) -> Self {
        Self {
            frame,
            loaded: true,
            ..Self::default()
        }
    }
}

/// Flags that mean a unit is mid-maneuver and should not be retargeted.
const TRANSIENT_FLAGS: UnitFlags = UnitFlags(
    UnitFlags::STOPPED.0
        | UnitFlags::WAITING_SPACE.0
        | UnitFlags::WAITING_PATH.0
        | UnitFlags::WAITING_LOADING.0
        | UnitFlags::WAITING_CARGO.0,
);

/// The dispatch engine.
#[derive(Debug)]
pub struct Dispatcher {
    config: DispatchConfig,
    state: EngineState,
    pools: HashMap<BuildingId, FacilityPool>,
    tables: DispatchTables,
    /// Last target this engine assigned per unit, for release on removal.
    last_targets: HashMap<UnitId, BuildingId>,
    /// Consecutive failed route computations per unit.
    pathfind_failures: HashMap<UnitId, u16>,
    /// Units already re-evaluated within the current shard window.
    processed: HashSet<UnitId>,
    shard: ShardPolicy,
    last_processed_frame: u64,
}

impl Dispatcher {
    /// Create an idle engine with the given configuration.
    #[must_use]
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            state: EngineState::Idle,
            pools: HashMap::new(),
            tables: DispatchTables::new(),
            last_targets: HashMap::new(),
            pathfind_failures: HashMap::new(),
            processed: HashSet::new(),
            shard: ShardPolicy,
            last_processed_frame: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The pool of a depot, if one is tracked.
    #[must_use]
    pub fn pool(&self, depot: BuildingId) -> Option<&FacilityPool> {
        self.pools.get(&depot)
    }

    /// Number of tracked depots.
    #[must_use]
    pub fn depot_count(&self) -> usize {
        self.pools.len()
    }

    /// Shared claim/cooldown tables, for inspection.
    #[must_use]
    pub const fn tables(&self) -> &DispatchTables {
        &self.tables
    }

    /// Process one host tick. Never panics and never returns an error:
    /// failures after initialization are logged and the tick dropped,
    /// failures during initialization terminate the engine.
    pub fn on_tick(
        &mut self,
        world: &mut WorldState,
        planner: &mut dyn RoutePlanner,
        events: &TickEvents,
    ) {
        let initializing = matches!(
            self.state,
            EngineState::Idle | EngineState::Initializing | EngineState::BaselineBuilding
        );
        if let Err(error) = self.run_tick(world, planner, events) {
            if initializing {
                tracing::error!(%error, "setup failed, dispatch engine terminated");
                self.state = EngineState::Terminated;
            } else {
                tracing::error!(%error, frame = events.frame, "tick failed, dropped");
            }
        }
    }

    fn run_tick(
        &mut self,
        world: &mut WorldState,
        planner: &mut dyn RoutePlanner,
        events: &TickEvents,
    ) -> Result<()> {
        if !events.loaded {
            self.reset();
            return Ok(());
        }

        match self.state {
            EngineState::Terminated => return Ok(()),
            EngineState::Idle => self.state = EngineState::Initializing,
            _ => {}
        }

        if self.state == EngineState::Initializing {
            if !world.observation_enabled {
                return Err(DispatchError::SetupFailure(
                    "world observation service unavailable".into(),
                ));
            }
            self.state = EngineState::BaselineBuilding;
        }

        if self.state == EngineState::BaselineBuilding {
            self.build_baseline(world, events.frame)?;
            self.state = EngineState::SteadyState;
            self.last_processed_frame = events.frame;
            return Ok(());
        }

        match self.state {
            EngineState::SteadyState => self.steady_tick(world, planner, events),
            state => Err(DispatchError::InvalidState(format!("tick in {state:?}"))),
        }
    }

    /// Drop every session-scoped table and go back to idle.
    fn reset(&mut self) {
        if self.state != EngineState::Idle {
            tracing::info!("session unloaded, dispatch engine reset");
        }
        self.state = EngineState::Idle;
        self.pools.clear();
        self.tables = DispatchTables::new();
        self.last_targets.clear();
        self.pathfind_failures.clear();
        self.processed.clear();
        self.last_processed_frame = 0;
    }

    /// Seed pools from the complete current world.
    fn build_baseline(&mut self, world: &WorldState, tick: u64) -> Result<()> {
        let ids = world.sorted_building_ids();
        for &id in &ids {
            if world.is_depot(id) {
                self.pools.insert(id, FacilityPool::for_depot(id, world)?);
            }
        }
        for &id in &ids {
            if world.has_pending_work(id) {
                for pool in self.pools.values_mut() {
                    pool.add_pickup(id, world, &mut self.tables, &self.config, tick);
                }
            }
        }
        tracing::info!(
            depots = self.pools.len(),
            "baseline built, entering steady state"
        );
        Ok(())
    }

    fn steady_tick(
        &mut self,
        world: &mut WorldState,
        planner: &mut dyn RoutePlanner,
        events: &TickEvents,
    ) -> Result<()> {
        let frame = events.frame;

        if self.shard.shard_of_frame(frame) != self.shard.shard_of_frame(self.last_processed_frame)
        {
            self.processed.clear();
        }

        self.ingest_buildings(world, events)?;

        if events.paused {
            return Ok(());
        }

        // Depot-side idle dispatch for depots the host touched this tick
        for &id in &events.buildings_updated {
            if let Some(pool) = self.pools.get(&id) {
                pool.dispatch_idle(world, &mut self.tables, &self.config, frame);
            }
        }

        self.forget_removed_units(world, events);

        let mut updated: Vec<UnitId> = events.units_updated.clone();
        updated.sort_unstable();
        updated.dedup();
        for unit_id in updated {
            self.evaluate_unit(unit_id, world, planner, frame)?;
        }

        self.remediate_stuck_routes(world, planner, frame)?;

        self.last_processed_frame = frame;
        Ok(())
    }

    /// Track new/removed depots and ingest pickup/checkup candidates.
    fn ingest_buildings(&mut self, world: &WorldState, events: &TickEvents) -> Result<()> {
        let tick = events.frame;

        for &id in &events.buildings_removed {
            if self.pools.remove(&id).is_some() {
                tracing::info!(depot = %id, "depot removed, pool dropped");
            }
            for pool in self.pools.values_mut() {
                pool.remove_request(id);
            }
            self.tables.claims.release(id);
            self.tables.cooldowns.remove(id);
        }

        let mut new_depots = Vec::new();
        for &id in &events.buildings_updated {
            if world.is_depot(id) && !self.pools.contains_key(&id) {
                new_depots.push(id);
            }
        }
        for id in new_depots {
            let mut pool = FacilityPool::for_depot(id, world)?;
            // A new depot starts with the full current request set
            for candidate in world.sorted_building_ids() {
                if world.has_pending_work(candidate) {
                    pool.add_pickup(candidate, world, &mut self.tables, &self.config, tick);
                }
            }
            tracing::info!(depot = %id, candidates = pool.len(), "depot added");
            self.pools.insert(id, pool);
        }

        for &id in &events.buildings_updated {
            if world.is_depot(id) {
                continue;
            }
            if world.has_pending_work(id) {
                for pool in self.pools.values_mut() {
                    pool.add_pickup(id, world, &mut self.tables, &self.config, tick);
                }
            } else {
                for pool in self.pools.values_mut() {
                    pool.add_checkup(id, world);
                }
            }
        }
        Ok(())
    }

    /// Return a removed unit's outstanding request to circulation.
    fn forget_removed_units(&mut self, world: &WorldState, events: &TickEvents) {
        for &unit_id in &events.units_removed {
            if let Some(target) = self.last_targets.remove(&unit_id) {
                if self.tables.claims.owner(target) == Some(unit_id) {
                    self.tables.claims.release(target);
                }
                if world.has_pending_work(target) {
                    for pool in self.pools.values_mut() {
                        pool.add_pickup(target, world, &mut self.tables, &self.config, events.frame);
                    }
                }
            }
            self.tables.clear_rejections(unit_id);
            self.pathfind_failures.remove(&unit_id);
            self.processed.remove(&unit_id);
        }
    }

    /// Re-evaluate one updated unit, honoring the shard gate.
    fn evaluate_unit(
        &mut self,
        unit_id: UnitId,
        world: &mut WorldState,
        planner: &mut dyn RoutePlanner,
        frame: u64,
    ) -> Result<()> {
        if !world.is_collection_unit(unit_id) {
            return Ok(());
        }
        let Some(unit) = world.unit(unit_id).copied() else {
            return Ok(());
        };
        if !self.pools.contains_key(&unit.source) {
            return Ok(());
        }

        // Keep the claim on the current target alive even when the unit is
        // skipped below.
        if let Some(target) = unit.target {
            if world.has_pending_work(target) {
                self.tables.claims.ensure_owner(unit_id, target);
            }
        }

        if unit.flags.intersects(TRANSIENT_FLAGS)
            || !unit.flags.contains(UnitFlags::SPAWNED)
            || unit.route.is_none()
        {
            return Ok(());
        }

        // The unit is moving with a route attached, so any prior failure
        // streak is over.
        self.pathfind_failures.remove(&unit_id);

        let waiting = unit.flags.contains(UnitFlags::WAITING_TARGET);
        if !waiting && !self.shard.is_eligible(frame, self.last_processed_frame, unit_id) {
            return Ok(());
        }
        if !self.processed.insert(unit_id) {
            return Ok(());
        }

        match classify(unit.flags, unit.target) {
            UnitStatus::Returning => {
                self.release_unit_target(unit_id, world, frame);
                Ok(())
            }
            status if status.wants_target() => self.retarget(unit_id, world, planner, frame),
            _ => Ok(()),
        }
    }

    /// A returning unit abandons its outstanding request.
    fn release_unit_target(&mut self, unit_id: UnitId, world: &WorldState, tick: u64) {
        let Some(target) = self.last_targets.remove(&unit_id) else {
            return;
        };
        if self.tables.claims.owner(target) == Some(unit_id) {
            self.tables.claims.release(target);
        }
        if world.has_pending_work(target) {
            for pool in self.pools.values_mut() {
                pool.add_pickup(target, world, &mut self.tables, &self.config, tick);
            }
        }
        tracing::debug!(unit = %unit_id, target = %target, "returning unit released target");
    }

    /// Run selection for one unit and apply the outcome.
    fn retarget(
        &mut self,
        unit_id: UnitId,
        world: &mut WorldState,
        planner: &mut dyn RoutePlanner,
        tick: u64,
    ) -> Result<()> {
        let Some(unit) = world.unit(unit_id).copied() else {
            return Ok(());
        };
        let source = unit.source;

        let selection = {
            let Some(pool) = self.pools.get_mut(&source) else {
                return Ok(());
            };
            pool.select_target(unit_id, world, &mut self.tables, &self.config, tick)
        };

        // Requests that emptied out since admission disappear everywhere
        for &stale in &selection.stale {
            for pool in self.pools.values_mut() {
                pool.remove_request(stale);
            }
            self.tables.claims.release(stale);
            self.tables.cooldowns.remove(stale);
        }

        self.assign(unit_id, selection.target, world, planner, tick)
    }

    /// Hand `new_target` to the unit and reconcile the bookkeeping: the
    /// abandoned request goes back into circulation and `last_targets`
    /// follows whatever target actually stuck after route application.
    fn assign(
        &mut self,
        unit_id: UnitId,
        new_target: Option<BuildingId>,
        world: &mut WorldState,
        planner: &mut dyn RoutePlanner,
        tick: u64,
    ) -> Result<()> {
        let Some(unit) = world.unit(unit_id).copied() else {
            return Ok(());
        };

        if new_target != unit.target {
            if let Some(old) = unit.target {
                if self.tables.claims.owner(old) == Some(unit_id) {
                    self.tables.claims.release(old);
                }
                if world.has_pending_work(old) {
                    for pool in self.pools.values_mut() {
                        pool.add_pickup(old, world, &mut self.tables, &self.config, tick);
                    }
                }
            }
            tracing::debug!(
                unit = %unit_id,
                old = ?unit.target,
                new = ?new_target,
                "retargeting unit"
            );
        }

        let Some(pool) = self.pools.get(&unit.source) else {
            return Ok(());
        };
        apply_target(
            unit_id,
            new_target,
            world,
            planner,
            pool,
            &mut self.tables,
            &self.config,
            tick,
        )?;

        // Application may have walked through alternates or restored the
        // previous assignment; record what actually stuck.
        match world.unit(unit_id).and_then(|u| u.target) {
            Some(target) => {
                self.last_targets.insert(unit_id, target);
            }
            None => {
                self.last_targets.remove(&unit_id);
            }
        }
        Ok(())
    }

    /// Poll in-flight route computations and recover units whose route
    /// failed, up to the retry bound.
    fn remediate_stuck_routes(
        &mut self,
        world: &mut WorldState,
        planner: &mut dyn RoutePlanner,
        tick: u64,
    ) -> Result<()> {
        for unit_id in world.sorted_unit_ids() {
            if !world.is_collection_unit(unit_id) {
                continue;
            }
            let Some(unit) = world.unit(unit_id).copied() else {
                continue;
            };
            if !unit.flags.contains(UnitFlags::WAITING_PATH) {
                continue;
            }
            let Some(route) = unit.route else {
                continue;
            };

            match planner.route_state(route) {
                RouteOutcome::Pending => {}
                RouteOutcome::Ready => {
                    if let Some(u) = world.unit_mut(unit_id) {
                        u.flags.remove(UnitFlags::WAITING_PATH);
                    }
                    self.pathfind_failures.remove(&unit_id);
                }
                RouteOutcome::Failed => {
                    planner.release_route(route);
                    if let Some(u) = world.unit_mut(unit_id) {
                        u.route = None;
                        u.flags.remove(UnitFlags::WAITING_PATH);
                    }
                    let failures = self.pathfind_failures.entry(unit_id).or_insert(0);
                    *failures += 1;
                    if let Some(target) = unit.target {
                        self.tables.reject_target(unit_id, target);
                    }
                    if *failures >= PATHFIND_RETRY_MAX {
                        tracing::warn!(
                            unit = %unit_id,
                            failures = *failures,
                            "route retries exhausted, despawning unit"
                        );
                        self.pathfind_failures.remove(&unit_id);
                        world.despawn_unit(unit_id);
                        continue;
                    }
                    // Full reselection would favor the incumbent it just
                    // failed to reach; take the next eligible alternate.
                    let alternate = self.pools.get(&unit.source).and_then(|pool| {
                        pool.next_alternate(unit_id, world, &self.tables, &self.config, tick)
                    });
                    tracing::debug!(unit = %unit_id, ?alternate, "route failed, reassigning");
                    self.assign(unit_id, alternate, world, planner, tick)?;
                }
            }
        }
        Ok(())
    }
}
