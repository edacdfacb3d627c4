//! # Progression Error Types
//!
//! All errors that can occur in the item progression system.
//!
//! Lenient paths never surface here: unknown persisted effect ids are dropped
//! on read and malformed UI input is ignored.

use thiserror::Error;

/// Errors that can occur in the progression system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressionError {
    /// Configuration values failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("failed to read config file {path}: {reason}")]
    ConfigIo {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error message.
        reason: String,
    },

    /// Configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    /// Effect instances must have a level of at least 1.
    #[error("invalid effect level {level} for {effect}")]
    InvalidEffectLevel {
        /// Effect id.
        effect: &'static str,
        /// Rejected level.
        level: i32,
    },

    /// An upgrade was selected but the item has no embue credit.
    #[error("item {0} has no pending embue")]
    NoPendingEmbue(String),

    /// The chosen upgrade option does not apply to the item's current state.
    #[error("upgrade option rejected: {0}")]
    InvalidUpgradeOption(String),

    /// An effect processor reported a failure while handling a hit.
    #[error("processor for {effect} failed: {reason}")]
    ProcessorFailed {
        /// Effect id whose processor failed.
        effect: &'static str,
        /// Failure description.
        reason: String,
    },

    /// The deferred scheduler has been shut down.
    #[error("deferred scheduler is shut down")]
    SchedulerClosed,
}

/// Result type for progression operations.
pub type ProgressionResult<T> = Result<T, ProgressionError>;
