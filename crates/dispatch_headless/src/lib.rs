//! Headless dispatch engine runner.
//!
//! Runs the dispatch engine against a scripted world without a host
//! simulation attached. This enables:
//!
//! - **CI verification**: scenarios assert that fleets actually clear
//!   their pending requests
//! - **Determinism checks**: repeated runs must produce identical
//!   assignment histories
//! - **Tuning**: compare configurations over the same scenario
//!
//! Scenarios are RON files describing depots, pending pickups, and fleet
//! sizes; the runner plays the host's role, moving units along their
//! assigned routes and emptying buildings they reach.

pub mod runner;
pub mod scenario;
