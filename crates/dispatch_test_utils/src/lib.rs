//! # Dispatch Test Utilities
//!
//! Shared testing utilities for all crates:
//! - World-building fixtures
//! - Determinism harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod planners;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
