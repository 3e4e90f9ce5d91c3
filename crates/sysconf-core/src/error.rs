//! Error types for the sysconf daemon
//!
//! The taxonomy separates failures that are guaranteed side-effect free
//! (validation) from failures that happened after an external call was
//! attempted (service errors) and from the worst case, a batch that was
//! only partly applied to the live system.

use crate::model::Subtree;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for sysconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a proposed leaf value was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationReason {
    /// Hostname is empty, too long, or a label breaks the grammar
    InvalidHostname,
    /// Zone name is not present in the zone database
    UnknownTimezone,
    /// Neither an IPv4 dotted-quad nor an IPv6 colon-form address
    InvalidAddress,
    /// Search domain breaks the domain name grammar
    InvalidDomain,
    /// UTC offset cannot be represented by the local-time mechanism
    InvalidUtcOffset,
    /// Numeric knob outside its allowed range
    OutOfRange,
    /// Edit carries a value of the wrong type for its leaf
    TypeMismatch,
    /// Edit addresses a leaf this daemon does not manage
    UnknownLeaf,
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ValidationReason::InvalidHostname => "invalid hostname",
            ValidationReason::UnknownTimezone => "unknown timezone",
            ValidationReason::InvalidAddress => "invalid address",
            ValidationReason::InvalidDomain => "invalid domain name",
            ValidationReason::InvalidUtcOffset => "unsupported UTC offset",
            ValidationReason::OutOfRange => "value out of range",
            ValidationReason::TypeMismatch => "value type mismatch",
            ValidationReason::UnknownLeaf => "unknown leaf",
        };
        f.write_str(text)
    }
}

/// A rejected leaf value. Raised before any external call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{reason} at {leaf}: {value:?}")]
pub struct ValidationError {
    /// Addressable path of the offending leaf
    pub leaf: String,
    /// The rejected value, rendered as text
    pub value: String,
    /// Rejection category
    pub reason: ValidationReason,
}

impl ValidationError {
    pub fn new(
        leaf: impl Into<String>,
        value: impl Into<String>,
        reason: ValidationReason,
    ) -> Self {
        Self {
            leaf: leaf.into(),
            value: value.into(),
            reason,
        }
    }

    /// Re-address the error to a more specific leaf (e.g. a keyed list entry)
    pub fn at(mut self, leaf: impl Into<String>) -> Self {
        self.leaf = leaf.into();
        self
    }
}

/// Core error type for the sysconf daemon
#[derive(Error, Debug)]
pub enum Error {
    /// Proposed value rejected; nothing was mutated
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The system service could not be reached
    #[error("Service unavailable: {service}")]
    ServiceUnavailable {
        /// Service name
        service: String,
    },

    /// The system service refused the call
    #[error("Permission denied by {service}")]
    PermissionDenied {
        /// Service name
        service: String,
    },

    /// The call did not complete within the configured bound.
    /// Its outcome on the service side is unknown.
    #[error("Timed out calling {service} {operation}")]
    Timeout {
        /// Service name
        service: String,
        /// Operation that timed out
        operation: String,
    },

    /// Any other failure reported by a system service
    #[error("Service error ({service}): {message}")]
    Service {
        /// Service name
        service: String,
        /// Error message
        message: String,
    },

    /// Some subtrees of a batch were applied before another one failed.
    /// The applied effects are not rolled back.
    #[error(
        "Partial apply: {failed_subtree} failed with [{applied}] already changed: {cause}",
        applied = join_subtrees(.applied_subtrees)
    )]
    PartialApplyFailure {
        /// Subtrees already mutated on the live system. Includes the failed
        /// subtree when some of its calls took effect before the failure.
        applied_subtrees: Vec<Subtree>,
        /// Subtree whose apply failed
        failed_subtree: Subtree,
        /// Underlying failure
        cause: Box<Error>,
    },

    /// Datastore errors
    #[error("Datastore error: {0}")]
    Datastore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn join_subtrees(subtrees: &[Subtree]) -> String {
    subtrees
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a service-unavailable error
    pub fn service_unavailable(service: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service: service.into(),
        }
    }

    /// Create a permission-denied error
    pub fn permission_denied(service: impl Into<String>) -> Self {
        Self::PermissionDenied {
            service: service.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Timeout {
            service: service.into(),
            operation: operation.into(),
        }
    }

    /// Create a generic service error
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a datastore error
    pub fn datastore(msg: impl Into<String>) -> Self {
        Self::Datastore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error was raised before any side effect
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Subtrees that were mutated on the live system before this error
    pub fn mutated_subtrees(&self) -> &[Subtree] {
        match self {
            Error::PartialApplyFailure {
                applied_subtrees, ..
            } => applied_subtrees,
            _ => &[],
        }
    }

    /// Machine-readable summary for reporting back to the datastore side
    pub fn report(&self) -> ErrorReport {
        let kind = match self {
            Error::Validation(_) => "validation",
            Error::ServiceUnavailable { .. } => "service-unavailable",
            Error::PermissionDenied { .. } => "permission-denied",
            Error::Timeout { .. } => "timeout",
            Error::Service { .. } => "service",
            Error::PartialApplyFailure { .. } => "partial-apply-failure",
            Error::Datastore(_) => "datastore",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Other(_) => "other",
        };

        let (validation, applied_subtrees, failed_subtree) = match self {
            Error::Validation(v) => (Some(v.clone()), Vec::new(), None),
            Error::PartialApplyFailure {
                applied_subtrees,
                failed_subtree,
                ..
            } => (None, applied_subtrees.clone(), Some(*failed_subtree)),
            _ => (None, Vec::new(), None),
        };

        ErrorReport {
            kind,
            message: self.to_string(),
            validation,
            applied_subtrees,
            failed_subtree,
        }
    }
}

/// Serializable view of an [`Error`]
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applied_subtrees: Vec<Subtree>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_subtree: Option<Subtree>,
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_apply_lists_mutated_subtrees() {
        let err = Error::PartialApplyFailure {
            applied_subtrees: vec![Subtree::Hostname, Subtree::Clock],
            failed_subtree: Subtree::DnsResolver,
            cause: Box::new(Error::timeout("resolve1", "SetLinkDomains")),
        };

        assert_eq!(err.mutated_subtrees(), &[Subtree::Hostname, Subtree::Clock]);
        assert!(!err.is_validation());
        let text = err.to_string();
        assert!(text.contains("dns-resolver failed after applying [hostname, clock]"));
        assert!(text.contains("SetLinkDomains"));
    }

    #[test]
    fn validation_report_carries_leaf() {
        let err: Error = ValidationError::new(
            "system/clock/timezone-name",
            "Europe/Silverstone",
            ValidationReason::UnknownTimezone,
        )
        .into();

        let report = err.report();
        assert_eq!(report.kind, "validation");
        let v = report.validation.unwrap();
        assert_eq!(v.leaf, "system/clock/timezone-name");
        assert_eq!(v.reason, ValidationReason::UnknownTimezone);
        assert!(err.mutated_subtrees().is_empty());
    }
}
