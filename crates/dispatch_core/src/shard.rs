//! Time-sharded evaluation policy.
//!
//! Re-evaluating every cruising unit every tick is wasted work: targets
//! rarely change between adjacent ticks. The shard policy spreads the scan
//! over an 8-way partition keyed by frame and unit id bits, bounding the
//! steady-state cost to roughly 1/8 of the active fleet per tick. This is
//! purely a CPU-cost bound; it has no concurrency role.

use serde::{Deserialize, Serialize};

use crate::world::UnitId;

/// 8-way shard partitioning by frame and unit id bits.
///
/// Kept as an explicit, swappable strategy so eligibility can be tested and
/// tuned independently of the selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShardPolicy;

impl ShardPolicy {
    /// Shard id active on the given frame.
    ///
    /// Uses the high-order frame bits so one shard stays active for a run
    /// of 16 consecutive frames.
    #[must_use]
    pub const fn shard_of_frame(self, frame: u64) -> u8 {
        ((frame >> 4) & 7) as u8
    }

    /// Shard a unit belongs to.
    #[must_use]
    pub const fn shard_of_unit(self, unit: UnitId) -> u8 {
        (unit.0 & 7) as u8
    }

    /// Is `unit` eligible for re-evaluation on `frame`, given the last
    /// processed frame?
    ///
    /// A unit matches the current shard or the immediately-preceding
    /// processed one, so a unit skipped at a shard boundary is caught on
    /// the next pass instead of waiting a full rotation.
    #[must_use]
    pub const fn is_eligible(self, frame: u64, last_processed_frame: u64, unit: UnitId) -> bool {
        let s = self.shard_of_unit(unit);
        s == self.shard_of_frame(frame) || s == self.shard_of_frame(last_processed_frame)
    }
}
