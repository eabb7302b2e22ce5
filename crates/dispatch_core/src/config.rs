//! Persisted engine configuration.
//!
//! A flat set of named scalar options, loaded from a RON file by the host
//! and read-only to the engine. Ranges are stored squared so selection can
//! compare against squared distances without square roots.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};
use crate::math::{fixed_serde, Fixed};

/// Simulation ticks per in-game day, used to convert the dispatch gap.
pub const TICKS_PER_DAY: u64 = 512;

/// Tunable dispatch options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Cooldown before a serviced request is reconsidered, in ticks.
    pub dispatch_gap_ticks: u64,
    /// Immediate commit radius, squared. Candidates inside it are grabbed
    /// outright and claims on them become unchallengeable.
    #[serde(with = "fixed_serde")]
    pub immediate_range1: Fixed,
    /// Immediate near radius, squared. Candidates inside it may bypass the
    /// dispatch cooldown when well aligned with the unit's heading.
    #[serde(with = "fixed_serde")]
    pub immediate_range2: Fixed,
    /// Rank critical-severity requests strictly above everything else.
    pub prioritize_critical: bool,
    /// Keep unspawned units parked when their depot has no eligible work.
    pub minimize_fleet: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            dispatch_gap_ticks: 5 * TICKS_PER_DAY,
            immediate_range1: Fixed::from_num(2500), // 50m squared
            immediate_range2: Fixed::from_num(10000), // 100m squared
            prioritize_critical: false,
            minimize_fleet: false,
        }
    }
}

impl DispatchConfig {
    /// Set the dispatch gap from in-game days.
    #[must_use]
    pub const fn with_dispatch_gap_days(mut self, days: u64) -> Self {
        self.dispatch_gap_ticks = days * TICKS_PER_DAY;
        self
    }

    /// Load configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| DispatchError::ConfigLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_ron_str(&contents).map_err(|e| DispatchError::ConfigLoad {
            path: path.display().to_string(),
            message: e,
        })
    }

    /// Parse configuration from a RON string.
    pub fn from_ron_str(ron: &str) -> std::result::Result<Self, String> {
        ron::from_str(ron).map_err(|e| e.to_string())
    }

    /// Serialize configuration to a RON string.
    #[must_use]
    pub fn to_ron_string(&self) -> String {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .unwrap_or_else(|_| String::new())
    }
}
