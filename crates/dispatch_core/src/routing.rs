//! Route planning seam and target application.
//!
//! The engine never computes paths itself; it asks the host through the
//! [`RoutePlanner`] trait and reacts to the outcome. `apply_target` is the
//! single writer of a unit's target/flags state: it attaches the new
//! target, walks through pool-provided alternates when route computation
//! fails, and falls back to transfer offers or a despawn when nothing can
//! be reached.

use crate::claim::DispatchTables;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::math::Vec2Fixed;
use crate::pool::FacilityPool;
use crate::status::{classify, UnitStatus};
use crate::world::{
    BuildingId, OfferKind, RouteId, TransferOffer, UnitFlags, UnitId, WorldState,
};

/// Maximum alternate targets tried per application before giving up.
pub const PATHFIND_RETRY_MAX: u16 = 20;

/// State of a previously requested route computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Still being computed by the host.
    Pending,
    /// Computed and attached; the unit can move.
    Ready,
    /// Computation failed; the unit needs a different target.
    Failed,
}

/// Host-side route computation service.
///
/// Implementations own route lifetimes; the engine only holds opaque
/// [`RouteId`] handles and must release the ones it detaches.
pub trait RoutePlanner {
    /// Request a route. `None` means the request was refused outright
    /// (unreachable destination, saturated planner).
    fn try_route(&mut self, unit: UnitId, from: Vec2Fixed, to: Vec2Fixed) -> Option<RouteId>;

    /// Release a route handle the engine no longer references.
    fn release_route(&mut self, route: RouteId);

    /// Poll the state of an in-flight route.
    fn route_state(&self, route: RouteId) -> RouteOutcome;
}

/// Attach `new_target` to `unit_id`, retrying with pool alternates when
/// route computation fails.
///
/// Applying the unit's current target is a repair: it only restarts a
/// missing route. A `None` target resolves into transfer offers or a
/// return leg. Retry is bounded: [`PATHFIND_RETRY_MAX`] alternates for a
/// unit already blocked waiting, a single attempt otherwise. On total
/// failure a unit that was out collecting keeps its previous assignment;
/// anything else is despawned rather than left wedged.
#[allow(clippy::too_many_lines)]
pub fn apply_target(
    unit_id: UnitId,
    new_target: Option<BuildingId>,
    world: &mut WorldState,
    planner: &mut dyn RoutePlanner,
    pool: &FacilityPool,
    tables: &mut DispatchTables,
    config: &DispatchConfig,
    tick: u64,
) -> Result<()> {
    let unit = *world
        .unit(unit_id)
        .ok_or(DispatchError::UnknownUnit(unit_id.0))?;

    // Re-applying the current target only repairs a missing route
    if new_target == unit.target {
        if unit.route.is_none() && !start_path(unit_id, world, planner) {
            tracing::debug!(unit = %unit_id, "route repair failed, despawning");
            world.despawn_unit(unit_id);
        }
        return Ok(());
    }

    // Fleet minimization: an unspawned unit with nowhere to go stays parked
    if config.minimize_fleet && new_target.is_none() && !unit.flags.contains(UnitFlags::SPAWNED)
    {
        world.despawn_unit(unit_id);
        return Ok(());
    }

    let status = classify(unit.flags, unit.target);
    let mut remaining = if status == UnitStatus::WaitingForTarget {
        tables.clear_rejections(unit_id);
        PATHFIND_RETRY_MAX
    } else {
        1
    };

    let previous_target = unit.target;
    let previous_route = unit.route;
    // Detached route is released only once the new assignment sticks; the
    // restore path reattaches it instead.
    let mut detached: Option<RouteId> = None;
    let mut candidate = new_target;

    loop {
        {
            let Some(u) = world.unit_mut(unit_id) else {
                return Err(DispatchError::UnknownUnit(unit_id.0));
            };
            if let Some(route) = u.route.take() {
                detached = Some(route);
            }
            u.target = candidate;
            u.flags.remove(UnitFlags::WAITING_TARGET | UnitFlags::WAITING_PATH);
            u.wait_counter = 0;
        }

        let Some(target) = candidate else {
            if let Some(route) = detached {
                planner.release_route(route);
            }
            resolve_without_target(unit_id, world, planner);
            return Ok(());
        };

        if start_path(unit_id, world, planner) {
            if let Some(route) = detached {
                planner.release_route(route);
            }
            tables.claims.record(unit_id, target);
            return Ok(());
        }

        tables.reject_target(unit_id, target);
        remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            break;
        }
        candidate = pool.next_alternate(unit_id, world, tables, config, tick);
        if candidate.is_none() {
            // One last pass through the no-target resolution
            continue;
        }
    }

    // Exhausted: keep a collecting unit on its previous assignment, take
    // anything else off the map.
    if status == UnitStatus::Collecting {
        if let Some(u) = world.unit_mut(unit_id) {
            u.target = previous_target;
            u.route = previous_route;
        }
        if let Some(prev) = previous_target {
            tables.claims.ensure_owner(unit_id, prev);
        }
        tracing::debug!(unit = %unit_id, "no reachable target, keeping previous assignment");
    } else {
        if let Some(route) = detached {
            planner.release_route(route);
        }
        tracing::debug!(unit = %unit_id, "no reachable target, despawning");
        world.despawn_unit(unit_id);
    }
    Ok(())
}

/// Resolve a unit whose target was cleared: offer its cargo, ask for more
/// work, or send it home.
fn resolve_without_target(unit_id: UnitId, world: &mut WorldState, planner: &mut dyn RoutePlanner) {
    let Some(unit) = world.unit(unit_id).copied() else {
        return;
    };

    // Loaded and delivering: offer the cargo and wait for a match
    if unit.flags.contains(UnitFlags::TRANSFER_TO_TARGET) && unit.transfer_size > 0 {
        world.push_offer(TransferOffer {
            kind: OfferKind::Outgoing,
            unit: Some(unit_id),
            building: unit.source,
            priority: 7,
            position: unit.position,
        });
        if let Some(u) = world.unit_mut(unit_id) {
            u.flags.insert(UnitFlags::WAITING_TARGET);
        }
        return;
    }

    // A defunct depot cannot field this unit again; it returns home
    // instead of asking for more work.
    let source_defunct = world
        .building(unit.source)
        .map_or(true, |b| !b.active || b.downgrading);

    // Collecting with spare capacity: ask for more work
    if !source_defunct
        && unit.flags.contains(UnitFlags::TRANSFER_TO_SOURCE)
        && unit.transfer_size < unit.cargo_capacity
        && !unit.flags.contains(UnitFlags::GOING_BACK)
    {
        world.push_offer(TransferOffer {
            kind: OfferKind::Incoming,
            unit: Some(unit_id),
            building: unit.source,
            priority: 7,
            position: unit.position,
        });
        if let Some(u) = world.unit_mut(unit_id) {
            u.flags.insert(UnitFlags::WAITING_TARGET);
        }
        return;
    }

    // Nothing to offer: head home
    if let Some(u) = world.unit_mut(unit_id) {
        u.flags.insert(UnitFlags::GOING_BACK);
    }
    if !start_path(unit_id, world, planner) {
        world.despawn_unit(unit_id);
    }
}

/// Kick off route computation toward the unit's current destination.
///
/// A unit parked waiting for an offer match needs no route yet, which
/// counts as success.
fn start_path(unit_id: UnitId, world: &mut WorldState, planner: &mut dyn RoutePlanner) -> bool {
    let Some(unit) = world.unit(unit_id).copied() else {
        return false;
    };
    if unit.flags.contains(UnitFlags::WAITING_TARGET) {
        return true;
    }

    let destination = if unit.flags.contains(UnitFlags::GOING_BACK) {
        Some(unit.source)
    } else {
        unit.target
    };
    let Some(destination) = destination else {
        return false;
    };
    let Some(position) = world.building(destination).map(|b| b.position) else {
        return false;
    };

    match planner.try_route(unit_id, unit.position, position) {
        Some(route) => {
            if let Some(u) = world.unit_mut(unit_id) {
                u.route = Some(route);
                u.flags.insert(UnitFlags::WAITING_PATH);
            }
            true
        }
        None => false,
    }
}
