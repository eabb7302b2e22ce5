//! Claim tracking and the dispatch cooldown ledger.
//!
//! A claim records which unit currently owns a pending request, with a
//! lazily recomputed squared distance memoized per tick. Claims degrade
//! instead of failing: a claim whose owner diverged resolves to
//! [`ClaimDistance::Invalid`] on the next read, releasing the request
//! without an explicit removal call.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::math::{fixed_serde, Fixed};
use crate::world::{BuildingId, UnitId, WorldState};

/// Lazily recomputed claim distance.
///
/// The fixed-point rendition of the original ±∞ sentinel scheme:
/// `Held` sorts below every finite distance ("unconditionally held, no
/// other unit may take it"), `Invalid` above ("no longer claimed").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimDistance {
    /// Owner is within the immediate-commit range: unchallengeable.
    Held,
    /// Live squared distance between owner and request.
    At(#[serde(with = "fixed_serde")] Fixed),
    /// Claim no longer holds.
    Invalid,
}

impl ClaimDistance {
    /// The claim still points at a live owner/request pair.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// Another unit may still take the request if it is closer.
    #[must_use]
    pub const fn is_challengeable(self) -> bool {
        !matches!(self, Self::Held)
    }

    /// True if this claim is strictly closer than the given squared distance.
    #[must_use]
    pub fn closer_than(self, distance_sq: Fixed) -> bool {
        match self {
            Self::Held => true,
            Self::At(d) => d < distance_sq,
            Self::Invalid => false,
        }
    }
}

/// A per-request ownership record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    unit: UnitId,
    request: BuildingId,
    distance: ClaimDistance,
    last_update: Option<u64>,
}

impl Claim {
    /// Create a claim for `request` held by `unit`.
    ///
    /// The distance starts `Invalid` and is derived on first read.
    #[must_use]
    pub const fn new(unit: UnitId, request: BuildingId) -> Self {
        Self {
            unit,
            request,
            distance: ClaimDistance::Invalid,
            last_update: None,
        }
    }

    /// The owning unit.
    #[must_use]
    pub const fn unit(&self) -> UnitId {
        self.unit
    }

    /// Recompute the distance, at most once per tick.
    ///
    /// The tick counter is monotonic and supplied by the orchestrator;
    /// wall-clock time never enters the computation.
    fn update_distance(&mut self, world: &WorldState, tick: u64, config: &DispatchConfig) {
        if self.last_update == Some(tick) {
            return;
        }
        self.last_update = Some(tick);

        if !world.is_collection_unit(self.unit) || !world.has_pending_work(self.request) {
            self.distance = ClaimDistance::Invalid;
            return;
        }

        // Both lookups exist: the queries above passed.
        let Some(unit) = world.unit(self.unit) else {
            self.distance = ClaimDistance::Invalid;
            return;
        };
        let Some(building) = world.building(self.request) else {
            self.distance = ClaimDistance::Invalid;
            return;
        };

        let d = unit.position.distance_squared(building.position);

        // Within commit range the hold is unconditional, even when the
        // unit's target momentarily diverges mid-retarget.
        if d <= config.immediate_range1 {
            self.distance = ClaimDistance::Held;
            return;
        }

        if unit.target != Some(self.request) {
            self.distance = ClaimDistance::Invalid;
            return;
        }

        self.distance = ClaimDistance::At(d);
    }
}

/// Table of live claims, at most one per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimTable {
    claims: HashMap<BuildingId, Claim>,
}

impl ClaimTable {
    /// Create an empty claim table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the claim for `request`, pointing at `unit`.
    pub fn record(&mut self, unit: UnitId, request: BuildingId) {
        self.claims.insert(request, Claim::new(unit, request));
    }

    /// Record a claim only when `request` is unclaimed or owned elsewhere.
    ///
    /// Keeps an existing claim's memoized distance when the owner is
    /// already correct.
    pub fn ensure_owner(&mut self, unit: UnitId, request: BuildingId) {
        match self.claims.get(&request) {
            Some(claim) if claim.unit == unit => {}
            _ => self.record(unit, request),
        }
    }

    /// The current owner of `request`, if claimed.
    #[must_use]
    pub fn owner(&self, request: BuildingId) -> Option<UnitId> {
        self.claims.get(&request).map(Claim::unit)
    }

    /// Memoized/lazily-recomputed distance of the claim on `request`.
    ///
    /// Never fails: a missing claim reads as `Invalid`.
    pub fn distance_of(
        &mut self,
        request: BuildingId,
        world: &WorldState,
        tick: u64,
        config: &DispatchConfig,
    ) -> ClaimDistance {
        match self.claims.get_mut(&request) {
            Some(claim) => {
                claim.update_distance(world, tick, config);
                claim.distance
            }
            None => ClaimDistance::Invalid,
        }
    }

    /// Is the claim on `request` still valid?
    pub fn is_valid(
        &mut self,
        request: BuildingId,
        world: &WorldState,
        tick: u64,
        config: &DispatchConfig,
    ) -> bool {
        self.distance_of(request, world, tick, config).is_valid()
    }

    /// May another unit still challenge the claim on `request`?
    pub fn is_challengeable(
        &mut self,
        request: BuildingId,
        world: &WorldState,
        tick: u64,
        config: &DispatchConfig,
    ) -> bool {
        self.distance_of(request, world, tick, config)
            .is_challengeable()
    }

    /// Drop the claim on `request`, if any.
    pub fn release(&mut self, request: BuildingId) {
        self.claims.remove(&request);
    }

    /// Number of live claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// True when no claims are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Per-request last-dispatch stamps used for the fairness cooldown.
///
/// Stamps are signed so a fresh pickup can be backdated past the gap and
/// become immediately eligible, even near tick zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CooldownLedger {
    stamps: HashMap<BuildingId, i64>,
}

impl CooldownLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a stamp exists for `request`, backdated to be eligible now.
    pub fn ensure(&mut self, request: BuildingId, tick: u64, gap: u64) {
        self.stamps
            .entry(request)
            .or_insert_with(|| backdated(tick, gap));
    }

    /// Record that `request` was just dispatched to.
    pub fn mark_dispatched(&mut self, request: BuildingId, tick: u64) {
        self.stamps.insert(request, tick as i64);
    }

    /// Push `request` past the gap so it is reconsidered immediately.
    pub fn backdate(&mut self, request: BuildingId, tick: u64, gap: u64) {
        self.stamps.insert(request, backdated(tick, gap));
    }

    /// True if the cooldown for `request` has expired (or never started).
    #[must_use]
    pub fn is_ready(&self, request: BuildingId, tick: u64, gap: u64) -> bool {
        match self.stamps.get(&request) {
            Some(stamp) => tick as i64 - stamp > gap as i64,
            None => true,
        }
    }

    /// The raw stamp for `request`, if present.
    #[must_use]
    pub fn stamp(&self, request: BuildingId) -> Option<i64> {
        self.stamps.get(&request).copied()
    }

    /// Forget `request` entirely.
    pub fn remove(&mut self, request: BuildingId) {
        self.stamps.remove(&request);
    }
}

fn backdated(tick: u64, gap: u64) -> i64 {
    tick as i64 - gap as i64 - 1
}

/// Cross-component lookup tables owned by the orchestrator.
///
/// Passed by mutable reference into each facility pool for the duration of
/// a call, preserving the "one logical owner, many readers within a tick"
/// contract without globals.
#[derive(Debug, Clone, Default)]
pub struct DispatchTables {
    /// Live claims, at most one per request.
    pub claims: ClaimTable,
    /// Last-dispatch stamps for the fairness cooldown.
    pub cooldowns: CooldownLedger,
    /// Per-unit targets rejected by failed route computations.
    pub old_targets: HashMap<UnitId, BTreeSet<BuildingId>>,
}

impl DispatchTables {
    /// Create empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `unit` rejected (or exhausted) `request`.
    pub fn reject_target(&mut self, unit: UnitId, request: BuildingId) {
        self.old_targets.entry(unit).or_default().insert(request);
    }

    /// Was `request` previously rejected for `unit`?
    #[must_use]
    pub fn was_rejected(&self, unit: UnitId, request: BuildingId) -> bool {
        self.old_targets
            .get(&unit)
            .is_some_and(|set| set.contains(&request))
    }

    /// Forget all rejections for `unit`.
    pub fn clear_rejections(&mut self, unit: UnitId) {
        self.old_targets.remove(&unit);
    }
}
