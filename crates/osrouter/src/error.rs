//! Error types for reconciliation.

use std::fmt;

use crate::config::{AddressParseError, Mutation, RouteParseError, RuleParseError};

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a failed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The process lacks the privilege to change the OS object.
    PermissionDenied,
    /// The OS object (or the interface it hangs off) does not exist.
    NotFound,
    /// The OS object is already present.
    AlreadyExists,
    /// The change conflicts with existing OS state (e.g. address in use).
    Conflict,
    /// The resource is temporarily unavailable; retrying may succeed.
    Transient,
    /// The request was canceled before it completed.
    Canceled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::Conflict => "conflict",
            Self::Transient => "temporarily unavailable",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Whether a failed mutation changed the OS anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AppliedState {
    /// The change took effect despite the error.
    Applied,
    /// The change did not take effect.
    #[default]
    NotApplied,
    /// Unknown, e.g. the OS call timed out mid-flight.
    Indeterminate,
}

/// Failure of a single mutation, as classified by a platform applier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApplyError {
    kind: ErrorKind,
    state: AppliedState,
    message: String,
}

impl ApplyError {
    /// Create an error that left the OS unchanged.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            state: AppliedState::NotApplied,
            message: message.into(),
        }
    }

    /// Record what the failed call did to the OS.
    pub fn with_state(mut self, state: AppliedState) -> Self {
        self.state = state;
        self
    }

    /// Shorthand for a [`ErrorKind::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for a [`ErrorKind::AlreadyExists`] error.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    /// Shorthand for a [`ErrorKind::Conflict`] error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Shorthand for a [`ErrorKind::Transient`] error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Shorthand for a [`ErrorKind::PermissionDenied`] error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// Get the error classification.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get what the failed call did to the OS.
    pub fn state(&self) -> AppliedState {
        self.state
    }

    /// Get the platform's description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Check if this is an "already exists" error.
    pub fn is_already_exists(&self) -> bool {
        self.kind == ErrorKind::AlreadyExists
    }

    /// Check if this is a transient error.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }

    /// Check if this is a permission error.
    pub fn is_permission_denied(&self) -> bool {
        self.kind == ErrorKind::PermissionDenied
    }
}

/// Errors surfaced by the reconciler and the platform registry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A mutation failed and the batch was aborted.
    ///
    /// Mutations before `position` were applied; `position` and later were not.
    #[error("mutation {position} of {total} failed ({mutation}): {source}")]
    Apply {
        /// 1-based position of the failing mutation in its batch.
        position: usize,
        /// Number of mutations in the batch.
        total: usize,
        /// The failing mutation.
        mutation: Mutation,
        /// Why it failed.
        #[source]
        source: ApplyError,
    },

    /// The deadline passed before the batch completed.
    #[error("reconciliation canceled after {applied} of {total} mutations")]
    Canceled {
        /// Mutations confirmed applied before cancellation.
        applied: usize,
        /// Number of mutations in the batch.
        total: usize,
    },

    /// No platform is registered under this identifier.
    #[error("platform not registered: {0}")]
    UnknownPlatform(String),

    /// The process-wide registry was installed twice.
    #[error("platform registry already installed")]
    RegistryInstalled,

    /// The process-wide registry was used before installation.
    #[error("platform registry not installed")]
    RegistryNotInstalled,

    /// Invalid address in a configuration.
    #[error(transparent)]
    Address(#[from] AddressParseError),

    /// Invalid route in a configuration.
    #[error(transparent)]
    Route(#[from] RouteParseError),

    /// Invalid rule in a configuration.
    #[error(transparent)]
    Rule(#[from] RuleParseError),
}

impl Error {
    /// Get the classification of the failure, if it came from a mutation.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Apply { source, .. } => Some(source.kind()),
            Self::Canceled { .. } => Some(ErrorKind::Canceled),
            _ => None,
        }
    }

    /// Check if retrying the same desired state may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            Some(ErrorKind::Transient | ErrorKind::Canceled)
        )
    }

    /// Check if this is a permission error.
    pub fn is_permission_denied(&self) -> bool {
        self.kind() == Some(ErrorKind::PermissionDenied)
    }

    /// Check if the request was canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }

    /// Number of mutations applied before the batch stopped, if it did.
    pub fn applied(&self) -> Option<usize> {
        match self {
            Self::Apply { position, .. } => Some(position - 1),
            Self::Canceled { applied, .. } => Some(*applied),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;

    fn route_mutation() -> Mutation {
        let config = NetworkConfig::new()
            .route("10.0.0.0/8", |r| r.dev("wg0"))
            .unwrap();
        Mutation::AddRoute(config.routes()[0].clone())
    }

    #[test]
    fn test_apply_error_defaults() {
        let err = ApplyError::conflict("address in use");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.state(), AppliedState::NotApplied);
        assert_eq!(err.to_string(), "conflict: address in use");

        let err = ApplyError::transient("ack timed out").with_state(AppliedState::Indeterminate);
        assert!(err.is_transient());
        assert_eq!(err.state(), AppliedState::Indeterminate);
    }

    #[test]
    fn test_error_messages() {
        let err = Error::Apply {
            position: 3,
            total: 5,
            mutation: route_mutation(),
            source: ApplyError::permission_denied("operation not permitted"),
        };
        assert_eq!(
            err.to_string(),
            "mutation 3 of 5 failed (+ route 10.0.0.0/8 dev wg0): permission denied: operation not permitted"
        );
        assert!(err.is_permission_denied());
        assert_eq!(err.applied(), Some(2));

        let err = Error::Canceled {
            applied: 1,
            total: 4,
        };
        assert_eq!(
            err.to_string(),
            "reconciliation canceled after 1 of 4 mutations"
        );
        assert!(err.is_canceled());
        assert!(err.is_transient());

        let err = Error::UnknownPlatform("plan9".into());
        assert_eq!(err.to_string(), "platform not registered: plan9");
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn test_parse_errors_convert() {
        let err: Error = NetworkConfig::new()
            .address("wg0", "nope/32")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Address(_)));
    }
}
