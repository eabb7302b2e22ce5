//! Error types for the dispatch engine.

use thiserror::Error;

/// Result type alias using [`DispatchError`].
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Top-level error type for all dispatch engine errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A required collaborator or capability was missing at initialization.
    ///
    /// This is the only error that terminates the engine: it is raised
    /// before any world mutation has happened, so failing fast is safe.
    #[error("Setup failed: {0}")]
    SetupFailure(String),

    /// A unit id did not resolve to a live unit.
    #[error("Unknown unit ID: {0}")]
    UnknownUnit(u32),

    /// A building id did not resolve to a live building.
    #[error("Unknown building ID: {0}")]
    UnknownBuilding(u32),

    /// A building id was expected to be a depot but is not.
    #[error("Building {0} is not a depot")]
    NotADepot(u32),

    /// Configuration file loading or parsing error.
    #[error("Failed to load config file '{path}': {message}")]
    ConfigLoad {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid engine state for the requested operation.
    #[error("Invalid engine state: {0}")]
    InvalidState(String),
}
