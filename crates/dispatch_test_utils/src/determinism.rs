//! Determinism testing utilities.
//!
//! The dispatch engine must produce identical assignments given identical
//! inputs. Sources of non-determinism to guard against:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`dispatch_core::math::Fixed`]
//!   throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Engine code always iterates in sorted id order or over `BTreeSet`s.
//!
//! - **Wall-clock time**: Cooldowns and memoization are keyed by the host's
//!   monotonic tick counter, never by system time.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dispatch_core::world::WorldState;

/// Result of a determinism check over repeated runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical assignment hashes.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
}

/// Hash the observable outcome of a tick: every unit's target and flags,
/// in sorted unit-id order, plus the emitted offers.
#[must_use]
pub fn hash_assignments(world: &WorldState) -> u64 {
    let mut hasher = DefaultHasher::new();
    for id in world.sorted_unit_ids() {
        id.0.hash(&mut hasher);
        if let Some(unit) = world.unit(id) {
            unit.target.map(|t| t.0).hash(&mut hasher);
            unit.flags.0.hash(&mut hasher);
            unit.route.map(|r| r.0).hash(&mut hasher);
        }
    }
    for offer in &world.offers {
        offer.building.0.hash(&mut hasher);
        offer.unit.map(|u| u.0).hash(&mut hasher);
        offer.priority.hash(&mut hasher);
    }
    hasher.finish()
}

/// Run a scenario `runs` times and compare assignment hashes.
///
/// The closure builds the scenario from scratch, runs it, and returns the
/// final world.
pub fn check_determinism<F>(runs: usize, scenario: F) -> DeterminismResult
where
    F: Fn() -> WorldState,
{
    let hashes: Vec<u64> = (0..runs).map(|_| hash_assignments(&scenario())).collect();
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::WorldBuilder;

    #[test]
    fn test_identical_worlds_hash_identically() {
        let build = || {
            let mut w = WorldBuilder::new();
            let depot = w.depot(0, 0, 1000);
            let pickup = w.pickup(50, 0, 5000);
            let unit = w.unit(depot, 0, 0);
            w.target(unit, pickup);
            w.world()
        };
        let result = check_determinism(4, build);
        assert!(result.is_deterministic);
    }

    #[test]
    fn test_different_targets_hash_differently() {
        let build = |with_target: bool| {
            let mut w = WorldBuilder::new();
            let depot = w.depot(0, 0, 1000);
            let pickup = w.pickup(50, 0, 5000);
            let unit = w.unit(depot, 0, 0);
            if with_target {
                w.target(unit, pickup);
            }
            w.world()
        };
        assert_ne!(
            hash_assignments(&build(true)),
            hash_assignments(&build(false))
        );
    }
}
