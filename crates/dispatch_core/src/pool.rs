//! Per-depot candidate pools and target selection.
//!
//! Each depot owns two concentric candidacy tiers: a near tier for requests
//! in the depot's administrative zone and a far tier for requests within
//! its geometric service range, plus a small FIFO of inspection candidates
//! worth a periodic check. `select_target` ranks the tiers for a specific
//! requesting unit; everything here is deterministic, with `BTreeSet`
//! iteration providing the stable "first encountered wins" tie-break.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::claim::DispatchTables;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::geometry::{direction_mask, immediate_level, ImmediateLevel};
use crate::math::{Fixed, Vec2Fixed};
use crate::world::{
    BuildingId, OfferKind, Severity, TransferOffer, Unit, UnitId, WorldState,
};

/// Maximum queued inspection candidates per depot.
pub const CHECKUP_CAPACITY: usize = 20;

/// Hysteresis factor favoring the incumbent target: a challenger must be
/// more than 10% closer to displace it.
const HYSTERESIS: f32 = 0.9;

/// Result of a target selection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSelection {
    /// The chosen target, if any.
    pub target: Option<BuildingId>,
    /// Requests found to no longer have pending work during the scan.
    ///
    /// Already purged from this pool; the orchestrator purges them from
    /// every other pool and from stale claims.
    pub stale: Vec<BuildingId>,
}

/// Candidate pools for a single depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityPool {
    id: BuildingId,
    primary: BTreeSet<BuildingId>,
    secondary: BTreeSet<BuildingId>,
    checkups: VecDeque<BuildingId>,
}

impl FacilityPool {
    /// Create an empty pool for the depot `id`.
    #[must_use]
    pub fn new(id: BuildingId) -> Self {
        Self {
            id,
            primary: BTreeSet::new(),
            secondary: BTreeSet::new(),
            checkups: VecDeque::new(),
        }
    }

    /// Create a pool for `id` after checking that it is a live depot.
    pub fn for_depot(id: BuildingId, world: &WorldState) -> Result<Self> {
        let building = world
            .building(id)
            .ok_or(DispatchError::UnknownBuilding(id.0))?;
        if building.depot().is_none() {
            return Err(DispatchError::NotADepot(id.0));
        }
        Ok(Self::new(id))
    }

    /// The depot this pool belongs to.
    #[must_use]
    pub const fn id(&self) -> BuildingId {
        self.id
    }

    /// Is `request` in either candidacy tier?
    #[must_use]
    pub fn contains(&self, request: BuildingId) -> bool {
        self.primary.contains(&request) || self.secondary.contains(&request)
    }

    /// Is `request` in the near tier?
    #[must_use]
    pub fn in_primary(&self, request: BuildingId) -> bool {
        self.primary.contains(&request)
    }

    /// Is `request` in the far tier?
    #[must_use]
    pub fn in_secondary(&self, request: BuildingId) -> bool {
        self.secondary.contains(&request)
    }

    /// Number of candidates across both tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.primary.len() + self.secondary.len()
    }

    /// True when both tiers are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }

    /// Queued inspection candidates.
    #[must_use]
    pub fn checkup_count(&self) -> usize {
        self.checkups.len()
    }

    /// Classify a pending request into the near or far tier.
    ///
    /// A request already present in either tier stays where it is; a
    /// request in neither range is ignored. Also backdates the cooldown
    /// ledger so fresh pickups are immediately eligible.
    pub fn add_pickup(
        &mut self,
        request: BuildingId,
        world: &WorldState,
        tables: &mut DispatchTables,
        config: &DispatchConfig,
        tick: u64,
    ) {
        if request == self.id || world.is_depot(request) {
            return;
        }

        tables
            .cooldowns
            .ensure(request, tick, config.dispatch_gap_ticks);

        if self.contains(request) {
            return;
        }

        if self.within_primary_range(request, world) {
            self.primary.insert(request);
        } else if self.within_secondary_range(request, world) {
            self.secondary.insert(request);
        }
    }

    /// Queue a non-pending private building for a periodic inspection.
    ///
    /// Bounded FIFO; admissions stop at [`CHECKUP_CAPACITY`].
    pub fn add_checkup(&mut self, request: BuildingId, world: &WorldState) {
        if self.checkups.len() >= CHECKUP_CAPACITY {
            return;
        }
        if self.within_primary_range(request, world) && world.is_private_building(request) {
            self.checkups.push_back(request);
        }
    }

    /// Drop `request` from both tiers and the inspection queue.
    pub fn remove_request(&mut self, request: BuildingId) {
        self.primary.remove(&request);
        self.secondary.remove(&request);
        self.checkups.retain(|c| *c != request);
    }

    /// Near-tier membership rule: same administrative zone as the depot,
    /// with unzoned depots falling back to the geometric test.
    #[must_use]
    pub fn within_primary_range(&self, request: BuildingId, world: &WorldState) -> bool {
        let (Some(depot), Some(target)) = (world.building(self.id), world.building(request))
        else {
            return false;
        };

        if depot.zone != target.zone {
            return false;
        }
        if depot.zone.is_unzoned() {
            return self.within_secondary_range(request, world);
        }
        true
    }

    /// Far-tier membership rule: squared distance within the depot's
    /// squared service range.
    #[must_use]
    pub fn within_secondary_range(&self, request: BuildingId, world: &WorldState) -> bool {
        let (Some(depot), Some(target)) = (world.building(self.id), world.building(request))
        else {
            return false;
        };
        let Some(info) = depot.depot() else {
            return false;
        };

        let range_sq = info.service_range.saturating_mul(info.service_range);
        depot.position.distance_squared(target.position) <= range_sq
    }

    /// Select the best target for `unit`, or fall back per the pool rules.
    ///
    /// Scans the near tier, then the far tier. When neither yields a
    /// candidate, the unit's rejection history is cleared and the fallback
    /// chain applies: keep the current target if it is still in near-tier
    /// range, else pop the oldest inspection candidate, else none.
    pub fn select_target(
        &mut self,
        unit_id: UnitId,
        world: &WorldState,
        tables: &mut DispatchTables,
        config: &DispatchConfig,
        tick: u64,
    ) -> TargetSelection {
        let mut selection = TargetSelection::default();

        #[cfg(feature = "debug-validation")]
        debug_assert!(
            self.primary.is_disjoint(&self.secondary),
            "request present in both tiers"
        );

        let Some(unit) = world.unit(unit_id).copied() else {
            return selection;
        };
        if unit.source != self.id {
            return selection;
        }

        let mut target = scan_tier(
            &self.primary,
            unit_id,
            &unit,
            world,
            tables,
            config,
            tick,
            &mut selection.stale,
        );
        if target.is_none() {
            target = scan_tier(
                &self.secondary,
                unit_id,
                &unit,
                world,
                tables,
                config,
                tick,
                &mut selection.stale,
            );
        }

        for id in &selection.stale {
            self.remove_request(*id);
        }

        match target {
            None => {
                tables.clear_rejections(unit_id);
                selection.target = match unit.target {
                    Some(current) if self.within_primary_range(current, world) => Some(current),
                    current => {
                        if self.checkups.is_empty() {
                            current
                        } else {
                            self.checkups.pop_front()
                        }
                    }
                };
            }
            Some(chosen) => {
                if Some(chosen) != unit.target {
                    // Outgoing target becomes reconsiderable immediately
                    if let Some(current) = unit.target {
                        if tables.cooldowns.stamp(current).is_some() {
                            tables
                                .cooldowns
                                .backdate(current, tick, config.dispatch_gap_ticks);
                        }
                    }
                }
                tables.cooldowns.mark_dispatched(chosen, tick);
                tables.claims.ensure_owner(unit_id, chosen);
                selection.target = Some(chosen);
            }
        }

        selection
    }

    /// The cooldown-oldest eligible candidate for a retry, excluding the
    /// unit's previously rejected targets. Near tier first.
    #[must_use]
    pub fn next_alternate(
        &self,
        unit_id: UnitId,
        world: &WorldState,
        tables: &DispatchTables,
        config: &DispatchConfig,
        tick: u64,
    ) -> Option<BuildingId> {
        self.oldest_ready(&self.primary, world, tables, config, tick, Some(unit_id))
            .or_else(|| {
                self.oldest_ready(&self.secondary, world, tables, config, tick, Some(unit_id))
            })
    }

    /// Push the cooldown-oldest eligible pickup onto an idle unit of this
    /// depot via a facility transfer offer.
    ///
    /// No-op while the depot is inactive, downgrading, full, or already at
    /// its fleet capacity. Returns the offered target for logging.
    pub fn dispatch_idle(
        &self,
        world: &mut WorldState,
        tables: &mut DispatchTables,
        config: &DispatchConfig,
        tick: u64,
    ) -> Option<BuildingId> {
        let depot = world.building(self.id).copied()?;
        let info = *depot.depot()?;

        if !depot.active || depot.downgrading || info.full || !info.capacity.has_headroom() {
            return None;
        }

        let target = self
            .oldest_ready(&self.primary, world, tables, config, tick, None)
            .or_else(|| self.oldest_ready(&self.secondary, world, tables, config, tick, None))?;
        let position = world.building(target)?.position;

        world.push_offer(TransferOffer {
            kind: OfferKind::FacilityPickup,
            unit: None,
            building: target,
            priority: 0,
            position,
        });
        tables.cooldowns.mark_dispatched(target, tick);

        tracing::debug!(depot = %self.id, target = %target, "idle dispatch offer");
        Some(target)
    }

    /// Oldest-stamped, cooldown-expired pending candidate of a tier.
    fn oldest_ready(
        &self,
        tier: &BTreeSet<BuildingId>,
        world: &WorldState,
        tables: &DispatchTables,
        config: &DispatchConfig,
        tick: u64,
        exclude_rejected_for: Option<UnitId>,
    ) -> Option<BuildingId> {
        let gap = config.dispatch_gap_ticks;
        let mut best: Option<(i64, BuildingId)> = None;

        for &id in tier {
            if let Some(unit) = exclude_rejected_for {
                if tables.was_rejected(unit, id) {
                    continue;
                }
            }
            if !world.has_pending_work(id) {
                continue;
            }
            if !tables.cooldowns.is_ready(id, tick, gap) {
                continue;
            }
            let stamp = tables.cooldowns.stamp(id).unwrap_or(i64::MIN);
            if best.map_or(true, |(s, _)| stamp < s) {
                best = Some((stamp, id));
            }
        }

        best.map(|(_, id)| id)
    }
}

/// Numeric problem-severity tier used for ranking.
fn severity_level(severity: Severity, config: &DispatchConfig) -> u8 {
    match severity {
        Severity::None => 0,
        Severity::Flagged => 1,
        Severity::Critical => {
            if config.prioritize_critical {
                2
            } else {
                1
            }
        }
    }
}

/// One ranking pass over a candidacy tier.
///
/// Returns the winning candidate, appending non-pending requests found
/// during the scan to `stale` (removal happens after the scan, never
/// mid-iteration).
fn scan_tier(
    tier: &BTreeSet<BuildingId>,
    unit_id: UnitId,
    unit: &Unit,
    world: &WorldState,
    tables: &mut DispatchTables,
    config: &DispatchConfig,
    tick: u64,
    stale: &mut Vec<BuildingId>,
) -> Option<BuildingId> {
    let gap = config.dispatch_gap_ticks;
    let position = unit.position;
    let heading = unit.velocity;
    let mask = direction_mask(unit.lane);

    let mut best: Option<BuildingId> = None;
    let mut best_severity = 0u8;
    let mut best_distance = Fixed::MAX;
    let mut bearing: Option<Vec2Fixed> = None;

    // Keep-current check: a still-pending incumbent seeds the ranking so
    // the unit does not churn targets without a real improvement.
    if let Some(current) = unit.target {
        if tier.contains(&current) {
            if !world.has_pending_work(current) {
                stale.push(current);
            } else if let Some(building) = world.building(current) {
                best = Some(current);
                best_severity = severity_level(building.severity, config);
                best_distance = position.distance_squared(building.position);
                bearing = Some(building.position - position);
            }
        }
    }

    for &id in tier {
        if Some(id) == unit.target {
            continue;
        }
        if !world.has_pending_work(id) {
            stale.push(id);
            continue;
        }
        let Some(building) = world.building(id) else {
            stale.push(id);
            continue;
        };

        let to = building.position - position;
        let d = position.distance_squared(building.position);
        let level = immediate_level(to, d, heading, mask, config);

        // Rejection history only yields to a commit-level match
        if level < ImmediateLevel::Commit && tables.was_rejected(unit_id, id) {
            continue;
        }

        // Another unit's claim blocks when unchallengeable, or when its
        // owner is already closer than we are.
        if let Some(owner) = tables.claims.owner(id) {
            if owner != unit_id {
                let cd = tables.claims.distance_of(id, world, tick, config);
                if !cd.is_challengeable() {
                    continue;
                }
                if cd.is_valid() && cd.closer_than(d) {
                    continue;
                }
            }
        }

        let severity = severity_level(building.severity, config);

        if level == ImmediateLevel::Commit {
            // Very close, conveniently positioned work: grab it outright
            return Some(id);
        }

        // A request the unit itself already claims is never gated by its
        // own dispatch stamp; the cooldown spaces out *repeat* visits.
        let on_cooldown = !tables.cooldowns.is_ready(id, tick, gap)
            && tables.claims.owner(id) != Some(unit_id);

        if on_cooldown {
            // Recently serviced: only a well-aligned nearby candidate may
            // bypass the gap, and only as an improvement.
            if level < ImmediateLevel::Near {
                continue;
            }
            if d > best_distance {
                continue;
            }
        } else if best_severity > severity {
            continue;
        } else if severity > best_severity {
            // Problematic buildings always outrank nonproblematic ones
        } else {
            if best.is_some() && d > best_distance.saturating_mul(Fixed::from_num(HYSTERESIS)) {
                continue;
            }
            let reference = if heading.is_zero() { bearing } else { Some(heading) };
            if let Some(dir) = reference {
                if dir.dot(to) < Fixed::ZERO {
                    continue;
                }
            }
        }

        best = Some(id);
        best_severity = severity;
        best_distance = d;
    }

    best
}
