//! Error types for the layout core.
//!
//! Absence of a train or track output is not an error: those lookups return
//! `known = false`. Everything here is recoverable by the caller.

use thiserror::Error;

use crate::state::{Category, Identifier, SessionToken};

/// Errors returned by store lookups, ownership calls and command dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The identifier is not registered in its category.
    #[error("{category} '{id}' not found")]
    NotFound {
        /// Category that was searched.
        category: Category,
        /// Identifier that was looked up.
        id: String,
    },

    /// Malformed identifier or out-of-range argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The train is held by another session.
    #[error("train '{train}' is already grabbed by another session")]
    AlreadyGrabbed {
        /// Train that was requested.
        train: Identifier,
        /// Session currently holding the grab.
        owner: SessionToken,
    },

    /// The calling session does not hold the train's grab.
    #[error("session does not own train '{train}'")]
    NotOwner {
        /// Train the session tried to control.
        train: Identifier,
    },

    /// Grab or command for a train the store has never seen.
    #[error("unknown train '{0}'")]
    UnknownTrain(String),

    /// The session token is not (or no longer) active.
    #[error("unknown session")]
    UnknownSession,

    /// The system is not in the running state.
    #[error("system not running")]
    NotRunning,

    /// The bus refused or failed to forward a command.
    #[error("bus error: {0}")]
    Bus(String),
}

impl LayoutError {
    /// Shorthand for a [`LayoutError::NotFound`].
    pub fn not_found(category: Category, id: impl Into<String>) -> Self {
        Self::NotFound {
            category,
            id: id.into(),
        }
    }
}

/// A hardware event that could not be applied.
///
/// The event feed logs these and drops the event; they never reach query
/// callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// Event names an identifier that fails validation.
    #[error("malformed identifier in event: {0}")]
    BadIdentifier(String),

    /// State update for an entity that was never discovered.
    #[error("{category} '{id}' was never discovered")]
    Undiscovered {
        /// Category of the entity.
        category: Category,
        /// Identifier carried by the event.
        id: String,
    },

    /// Accessory event names an aspect outside the declared list.
    #[error("'{aspect}' is not an aspect of '{id}'")]
    UnknownAspect {
        /// Accessory identifier.
        id: String,
        /// Offending aspect.
        aspect: String,
    },

    /// Peripheral event names a peripheral the train does not have.
    #[error("train '{train}' has no peripheral '{peripheral}'")]
    UnknownPeripheral {
        /// Train identifier.
        train: String,
        /// Offending peripheral.
        peripheral: String,
    },

    /// Event payload is inconsistent or out of range.
    #[error("invalid payload for '{id}': {reason}")]
    InvalidPayload {
        /// Identifier carried by the event.
        id: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// Accessory event sent with a non-accessory category.
    #[error("{0} is not an accessory category")]
    NotAccessory(Category),

    /// Event arrived after shutdown, before the layout was started again.
    #[error("event intake closed by shutdown")]
    IntakeClosed,
}

impl From<LayoutError> for EventError {
    fn from(err: LayoutError) -> Self {
        EventError::BadIdentifier(err.to_string())
    }
}

/// Result alias for layout operations.
pub type Result<T> = core::result::Result<T, LayoutError>;
