//! Facility pool maintenance and target selection tests.

use dispatch_core::claim::{ClaimDistance, DispatchTables};
use dispatch_core::config::DispatchConfig;
use dispatch_core::error::DispatchError;
use dispatch_core::math::Vec2Fixed;
use dispatch_core::pool::{FacilityPool, CHECKUP_CAPACITY};
use dispatch_core::world::{BuildingId, OfferKind};

use dispatch_test_utils::fixtures::{fixed, WorldBuilder};
use dispatch_test_utils::strategies;
use proptest::prelude::*;

fn setup() -> (WorldBuilder, DispatchConfig, DispatchTables) {
    (
        WorldBuilder::new(),
        DispatchConfig::default(),
        DispatchTables::new(),
    )
}

#[test]
fn test_for_depot_validates() {
    let mut w = WorldBuilder::new();
    let depot = w.depot(0, 0, 1000);
    let pickup = w.pickup(10, 0, 5000);
    let world = w.world();

    assert!(FacilityPool::for_depot(depot, &world).is_ok());
    assert!(matches!(
        FacilityPool::for_depot(pickup, &world),
        Err(DispatchError::NotADepot(_))
    ));
    assert!(matches!(
        FacilityPool::for_depot(BuildingId(99), &world),
        Err(DispatchError::UnknownBuilding(99))
    ));
}

#[test]
fn test_pickup_tier_partition() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot_zoned(0, 0, 1000, 1);
    let near = w.pickup_zoned(10, 10, 5000, 1);
    let far = w.pickup_zoned(500, 500, 5000, 2);
    let outside = w.pickup_zoned(5000, 5000, 5000, 3);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    for id in [near, far, outside] {
        pool.add_pickup(id, &world, &mut tables, &config, 0);
    }

    assert!(pool.in_primary(near) && !pool.in_secondary(near));
    assert!(pool.in_secondary(far) && !pool.in_primary(far));
    assert!(!pool.contains(outside));

    // Re-adding never moves a request between tiers
    pool.add_pickup(near, &world, &mut tables, &config, 1);
    assert!(pool.in_primary(near) && !pool.in_secondary(near));
}

#[test]
fn test_unzoned_depot_falls_back_to_geometry() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 100);
    let close = w.pickup(50, 0, 5000);
    let distant = w.pickup(500, 0, 5000);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(close, &world, &mut tables, &config, 0);
    pool.add_pickup(distant, &world, &mut tables, &config, 0);

    assert!(pool.in_primary(close));
    assert!(!pool.contains(distant));
}

#[test]
fn test_checkup_queue_rules() {
    let (mut w, _config, _tables) = setup();
    let depot = w.depot(0, 0, 1000);
    let municipal = w.municipal(20, 0, 0);
    let mut privates = Vec::new();
    for i in 0..25 {
        privates.push(w.pickup(10 + i, 0, 0));
    }
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_checkup(municipal, &world);
    assert_eq!(pool.checkup_count(), 0);

    for id in &privates {
        pool.add_checkup(*id, &world);
    }
    // Bounded FIFO at capacity
    assert_eq!(pool.checkup_count(), CHECKUP_CAPACITY);
}

#[test]
fn test_scenario_a_closest_in_window_wins() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let r1 = w.pickup(10, 10, 5000);
    let r2 = w.pickup(1000, 1000, 5000);
    let unit = w.unit(depot, 0, 1);
    w.heading(unit, 1, 0);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(r1, &world, &mut tables, &config, 0);
    pool.add_pickup(r2, &world, &mut tables, &config, 0);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(r1));
}

#[test]
fn test_scenario_b_critical_overrides_distance() {
    let (mut w, mut config, mut tables) = setup();
    config.prioritize_critical = true;

    let depot = w.depot(0, 0, 2000);
    let r2 = w.pickup(100, 0, 5000);
    let r1 = w.pickup(300, 0, 5000);
    w.critical(r1);
    let unit = w.unit(depot, 0, 0);
    w.heading(unit, 1, 0);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(r1, &world, &mut tables, &config, 0);
    pool.add_pickup(r2, &world, &mut tables, &config, 0);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(r1));
}

#[test]
fn test_scenario_c_hysteresis_keeps_incumbent() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let incumbent = w.pickup(100, 0, 5000);
    // Challenger at 95% of the incumbent's squared distance: inside
    // the 10% hysteresis band, so it must not displace
    let challenger = w.pickup_at_distance_sq(9500, 5000);
    let unit = w.unit(depot, 0, 0);
    w.target(unit, incumbent);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(incumbent, &world, &mut tables, &config, 0);
    pool.add_pickup(challenger, &world, &mut tables, &config, 0);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(incumbent));
}

#[test]
fn test_clear_improvement_displaces_incumbent() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let incumbent = w.pickup(1000, 0, 5000);
    let challenger = w.pickup(200, 0, 5000);
    let unit = w.unit(depot, 0, 0);
    w.target(unit, incumbent);
    w.heading(unit, 1, 0);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(incumbent, &world, &mut tables, &config, 0);
    pool.add_pickup(challenger, &world, &mut tables, &config, 0);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(challenger));
}

#[test]
fn test_scenario_d_stale_requests_reported() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let live = w.pickup(100, 0, 5000);
    let emptied = w.pickup(50, 0, 5000);
    let unit = w.unit(depot, 0, 0);
    w.heading(unit, 1, 0);

    let mut pool = FacilityPool::new(depot);
    {
        let world = w.world_ref();
        pool.add_pickup(live, world, &mut tables, &config, 0);
        pool.add_pickup(emptied, world, &mut tables, &config, 0);
    }

    // Pending predicate flips false before the scan
    w.set_garbage(emptied, 0);
    let world = w.world();

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(live));
    assert_eq!(selection.stale, vec![emptied]);
    assert!(!pool.contains(emptied));
}

#[test]
fn test_idempotent_reselection() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let r1 = w.pickup(100, 0, 5000);
    let r2 = w.pickup(150, 0, 5000);
    let unit = w.unit(depot, 0, 0);
    w.heading(unit, 1, 0);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(r1, &world, &mut tables, &config, 0);
    pool.add_pickup(r2, &world, &mut tables, &config, 0);

    let first = pool.select_target(unit, &world, &mut tables, &config, 1);
    let second = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(first.target, Some(r1));
    assert_eq!(first.target, second.target);
}

#[test]
fn test_unchallengeable_claim_blocks_candidate() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let request = w.pickup(100, 0, 5000);
    let other_request = w.pickup(160, 0, 5000);
    let unit = w.unit(depot, 0, 0);
    w.heading(unit, 1, 0);
    // A competing unit parked on top of the request holds it
    let holder = w.unit(depot, 98, 0);
    w.target(holder, request);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(request, &world, &mut tables, &config, 0);
    pool.add_pickup(other_request, &world, &mut tables, &config, 0);
    tables.claims.record(holder, request);
    assert_eq!(
        tables.claims.distance_of(request, &world, 1, &config),
        ClaimDistance::Held
    );

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(other_request));
}

#[test]
fn test_closer_claimant_blocks_candidate() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let request = w.pickup(300, 0, 5000);
    let fallback = w.pickup(400, 0, 5000);
    let unit = w.unit(depot, 0, 0);
    w.heading(unit, 1, 0);
    // Competing unit en route, well outside commit range but closer
    let rival = w.unit(depot, 200, 0);
    w.target(rival, request);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(request, &world, &mut tables, &config, 0);
    pool.add_pickup(fallback, &world, &mut tables, &config, 0);
    tables.claims.record(rival, request);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(fallback));
}

#[test]
fn test_commit_level_overrides_rejection_history() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let rejected = w.pickup(10, 0, 5000); // right ahead, inside commit range
    let unit = w.unit(depot, 0, 0);
    w.heading(unit, 1, 0);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(rejected, &world, &mut tables, &config, 0);
    tables.reject_target(unit, rejected);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(rejected));
}

#[test]
fn test_rejection_history_skips_ordinary_candidate() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let rejected = w.pickup(300, 0, 5000);
    let alternative = w.pickup(500, 0, 5000);
    let unit = w.unit(depot, 0, 0);
    w.heading(unit, 1, 0);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(rejected, &world, &mut tables, &config, 0);
    pool.add_pickup(alternative, &world, &mut tables, &config, 0);
    tables.reject_target(unit, rejected);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(alternative));
}

#[test]
fn test_fallback_pops_oldest_checkup() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let quiet1 = w.pickup(50, 0, 0);
    let quiet2 = w.pickup(80, 0, 0);
    let unit = w.unit(depot, 0, 0);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_checkup(quiet1, &world);
    pool.add_checkup(quiet2, &world);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(quiet1));
    assert_eq!(pool.checkup_count(), 1);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(quiet2));
}

#[test]
fn test_fallback_keeps_current_target_in_near_range() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    // Current target no longer pending, but still in near-tier range
    let current = w.pickup(100, 0, 0);
    let quiet = w.pickup(80, 0, 0);
    let unit = w.unit(depot, 0, 0);
    w.target(unit, current);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_checkup(quiet, &world);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 1);
    assert_eq!(selection.target, Some(current));
    // The checkup stays queued for another unit
    assert_eq!(pool.checkup_count(), 1);
}

#[test]
fn test_cooldown_gates_repeat_visits() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let serviced = w.pickup(400, 0, 5000);
    let unit = w.unit(depot, 0, 0);
    w.heading(unit, 1, 0);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(serviced, &world, &mut tables, &config, 0);
    // Another unit was just dispatched there
    tables.cooldowns.mark_dispatched(serviced, 1);

    let selection = pool.select_target(unit, &world, &mut tables, &config, 2);
    assert_eq!(selection.target, None);

    // After the gap expires the request is back in play
    let later = 2 + config.dispatch_gap_ticks;
    let selection = pool.select_target(unit, &world, &mut tables, &config, later);
    assert_eq!(selection.target, Some(serviced));
}

#[test]
fn test_next_alternate_prefers_oldest_stamp() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let a = w.pickup(100, 0, 5000);
    let b = w.pickup(120, 0, 5000);
    let unit = w.unit(depot, 0, 0);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(a, &world, &mut tables, &config, 0);
    pool.add_pickup(b, &world, &mut tables, &config, 0);

    let gap = config.dispatch_gap_ticks;
    // `a` serviced more recently than `b`; both past the gap
    tables.cooldowns.mark_dispatched(a, 10);
    tables.cooldowns.mark_dispatched(b, 5);
    let now = 11 + gap;

    assert_eq!(
        pool.next_alternate(unit, &world, &tables, &config, now),
        Some(b)
    );

    tables.reject_target(unit, b);
    assert_eq!(
        pool.next_alternate(unit, &world, &tables, &config, now),
        Some(a)
    );
}

#[test]
fn test_dispatch_idle_offers_and_stamps() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let request = w.pickup(100, 0, 5000);
    let mut world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(request, &world, &mut tables, &config, 0);

    let offered = pool.dispatch_idle(&mut world, &mut tables, &config, 5);
    assert_eq!(offered, Some(request));
    assert_eq!(world.offers.len(), 1);
    assert_eq!(world.offers[0].kind, OfferKind::FacilityPickup);
    assert_eq!(world.offers[0].building, request);
    assert_eq!(tables.cooldowns.stamp(request), Some(5));

    // Cooldown now suppresses a second offer
    let offered = pool.dispatch_idle(&mut world, &mut tables, &config, 6);
    assert_eq!(offered, None);
}

#[test]
fn test_dispatch_idle_respects_capacity() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let request = w.pickup(100, 0, 5000);
    w.saturate_depot(depot);
    let mut world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(request, &world, &mut tables, &config, 0);

    assert_eq!(pool.dispatch_idle(&mut world, &mut tables, &config, 5), None);
    assert!(world.offers.is_empty());
}

#[test]
fn test_selection_marks_new_target_and_backdates_old() {
    let (mut w, config, mut tables) = setup();
    let depot = w.depot(0, 0, 2000);
    let old = w.pickup(1000, 0, 5000);
    let new = w.pickup(100, 0, 5000);
    let unit = w.unit(depot, 0, 0);
    w.target(unit, old);
    w.heading(unit, 1, 0);
    let world = w.world();

    let mut pool = FacilityPool::new(depot);
    pool.add_pickup(old, &world, &mut tables, &config, 0);
    pool.add_pickup(new, &world, &mut tables, &config, 0);

    let tick = 50;
    let selection = pool.select_target(unit, &world, &mut tables, &config, tick);
    assert_eq!(selection.target, Some(new));
    assert_eq!(tables.cooldowns.stamp(new), Some(tick as i64));
    // Old target immediately eligible again
    assert!(tables
        .cooldowns
        .is_ready(old, tick, config.dispatch_gap_ticks));
    assert_eq!(tables.claims.owner(new), Some(unit));
}

#[test]
fn test_distance_math_uses_squares() {
    // Guard against accidentally comparing unsquared distances
    let d = Vec2Fixed::new(fixed(3), fixed(0)).distance_squared(Vec2Fixed::ZERO);
    assert_eq!(d, fixed(9));
}

proptest! {
    // Partition property: a pickup lands in at most one tier, and
    // membership always matches the tier's range rule.
    #[test]
    fn prop_tier_partition_is_disjoint(
        pickups in proptest::collection::vec(
            (
                strategies::coordinate(),
                strategies::coordinate(),
                strategies::garbage_amount(),
                0u8..4,
            ),
            1..24,
        ),
        depot_zone in 0u8..4,
    ) {
        let mut w = WorldBuilder::new();
        let depot = w.depot_zoned(0, 0, 1500, depot_zone);
        let mut ids = Vec::new();
        for (x, y, garbage, zone) in pickups {
            ids.push(w.pickup_zoned(x, y, garbage, zone));
        }
        let world = w.world();

        let config = DispatchConfig::default();
        let mut tables = DispatchTables::new();
        let mut pool = FacilityPool::new(depot);
        for &id in &ids {
            pool.add_pickup(id, &world, &mut tables, &config, 0);
        }

        for &id in &ids {
            prop_assert!(!(pool.in_primary(id) && pool.in_secondary(id)));
            if pool.in_primary(id) {
                prop_assert!(pool.within_primary_range(id, &world));
            }
            if pool.in_secondary(id) {
                prop_assert!(pool.within_secondary_range(id, &world));
                prop_assert!(!pool.within_primary_range(id, &world));
            }
        }
    }
}
