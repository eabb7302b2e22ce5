//! # Dispatch Core
//!
//! Deterministic dispatch and target-assignment engine for a fleet of
//! mobile collection units.
//!
//! The engine continuously assigns collection vehicles to buildings with
//! pending pickups, tick by tick, as the host simulation mutates the world.
//! It owns the assignment logic only:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Pathfinding, world observation, and the simulation loop itself are
//! external collaborators, consumed through interfaces at the crate
//! boundary.
//!
//! ## Crate Structure
//!
//! - [`world`] - World state the engine reads and patches
//! - [`claim`] - Per-request ownership records and the dispatch cooldown ledger
//! - [`pool`] - Per-depot candidate pools and target selection
//! - [`dispatcher`] - The per-tick assignment orchestrator
//! - [`routing`] - Route assignment boundary and retry/patch logic
//! - [`shard`] - Time-sharded evaluation policy
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod claim;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod geometry;
pub mod math;
pub mod pool;
pub mod routing;
pub mod shard;
pub mod status;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::claim::{ClaimDistance, ClaimTable, CooldownLedger, DispatchTables};
    pub use crate::config::DispatchConfig;
    pub use crate::dispatcher::{Dispatcher, EngineState, TickEvents};
    pub use crate::error::{DispatchError, Result};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::pool::FacilityPool;
    pub use crate::routing::{RouteOutcome, RoutePlanner};
    pub use crate::status::UnitStatus;
    pub use crate::world::{
        Building, BuildingClass, BuildingId, BuildingKind, RouteId, Severity, Unit, UnitFlags,
        UnitId, WorldState, ZoneId,
    };
}
