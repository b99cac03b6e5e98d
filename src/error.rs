//! Error types for housemind.
//!
//! All errors are strongly typed using thiserror. The taxonomy follows the
//! operation lifecycle: validation rejects bad input before anything runs,
//! precondition errors abort a call whose collaborators are missing, and
//! upstream errors propagate host-side failures unchanged. A pagination
//! cursor that no longer exists is deliberately *not* an error (the fetch
//! falls back to the full candidate set).

use thiserror::Error;

use crate::signal::SignalRole;

/// Validation errors that occur during input validation.
///
/// A validation failure aborts the operation before it has any effect;
/// persisted state is never touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Mapping payload was not a JSON object.
    #[error("mapping must be an object")]
    MappingNotAnObject,

    /// A mapping value was neither null, empty, nor a string.
    #[error("mapping.{role} must be a string")]
    InvalidMappingValue {
        /// The role whose value failed validation.
        role: SignalRole,
    },

    /// Chat message text was empty or whitespace-only.
    #[error("text is required")]
    EmptyText,

    /// Chat role was not one of the recognized values.
    #[error("role must be one of: user, agent")]
    InvalidRole {
        /// The rejected raw value.
        value: String,
    },

    /// A required field was missing from a request payload.
    #[error("required field '{field}' is missing")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },
}

/// Precondition errors: a required collaborator is not available.
///
/// These are fatal for the single call and are never retried here.
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// The persistent store backing this operation was never initialized.
    #[error("{store} store not initialized")]
    StoreNotInitialized {
        /// Store key of the missing store.
        store: &'static str,
    },

    /// The storage backend failed on load or save.
    #[error("storage error: {message}")]
    Storage {
        /// Backend-provided failure description.
        message: String,
    },
}

/// Upstream errors: a host-provided snapshot or service call failed.
///
/// Propagated to the caller unchanged; this core does not retry.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The entity snapshot provider failed to produce a snapshot.
    #[error("snapshot provider failed: {message}")]
    SnapshotUnavailable {
        /// Host-provided failure description.
        message: String,
    },

    /// An outbound host service call failed.
    #[error("host service call failed: {message}")]
    ServiceCallFailed {
        /// Host-provided failure description.
        message: String,
    },
}

/// Top-level error type for housemind operations.
#[derive(Debug, Error)]
pub enum HouseError {
    /// Input failed validation; the operation had no effect.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A required collaborator was unavailable.
    #[error("precondition error: {0}")]
    Precondition(#[from] PreconditionError),

    /// A host collaborator failed.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

impl HouseError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a precondition error.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }

    /// Returns true if this is an upstream error.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}

/// Result type alias for housemind operations.
pub type HouseResult<T> = Result<T, HouseError>;
