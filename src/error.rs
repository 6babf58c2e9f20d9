//! Error handler for the LDAP backend.

use std::fmt;

use thiserror::Error;

use crate::directory::DirectoryError;

pub type Result<T> = std::result::Result<T, VerifyError>;

/// Canonical failure categories of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Directory endpoint unreachable or transport negotiation failed.
    Connection,
    /// Candidate bind rejected.
    Authentication,
    /// Service-account bind, or the search it runs, rejected.
    ServiceAccount,
    /// Search returned no usable entry.
    UserNotFound,
}

impl FailureKind {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connection => "connection",
            FailureKind::Authentication => "authentication",
            FailureKind::ServiceAccount => "service_account",
            FailureKind::UserNotFound => "user_not_found",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enum representing a failed verification.
///
/// Every variant renders the same message so that callers cannot tell an
/// unknown user from a wrong password. The source chain keeps the directory
/// detail for operators.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verification failed")]
    Connection(#[source] DirectoryError),

    #[error("verification failed")]
    Authentication(#[source] DirectoryError),

    #[error("verification failed")]
    ServiceAccount(#[source] DirectoryError),

    #[error("verification failed")]
    UserNotFound,
}

impl VerifyError {
    /// Category of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            VerifyError::Connection(_) => FailureKind::Connection,
            VerifyError::Authentication(_) => FailureKind::Authentication,
            VerifyError::ServiceAccount(_) => FailureKind::ServiceAccount,
            VerifyError::UserNotFound => FailureKind::UserNotFound,
        }
    }
}

/// Errors raised while loading the provider configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("invalid `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Errors raised by the user filter template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("user filter must contain the `%u` placeholder")]
    MissingPlaceholder,

    #[error("dangling `%` at byte {position} of user filter")]
    DanglingPercent { position: usize },

    #[error("invalid placeholder `%{name}` in user filter")]
    InvalidPlaceholder { name: char },

    #[error("no value bound for placeholder `%{name}`")]
    UnboundParameter { name: char },
}
