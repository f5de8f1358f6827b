use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A failed call against the cluster API.
///
/// Absence and name collisions are reported by status, not inferred from the
/// error text, so callers can branch on them.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("cluster API request failed: {0}")]
    Api(String),
}

#[derive(Debug, Error)]
pub enum Error {
    /// The request is missing or malforms an identifying field. Reported
    /// before any cluster call is made.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{context}: {source}")]
    NotFound {
        context: String,
        source: ClientError,
    },

    #[error("{context}: {source}")]
    Conflict {
        context: String,
        source: ClientError,
    },

    #[error("{context}: {source}")]
    Upstream {
        context: String,
        source: ClientError,
    },

    /// Compensation of a partially applied block failed; `rollback_name`
    /// remains in the cluster.
    #[error("{context}: {source}; rollback of {rollback_name} also failed: {rollback}")]
    RollbackFailed {
        context: String,
        source: ClientError,
        rollback_name: String,
        rollback: ClientError,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Upstream,
    RollbackFailed,
}

// === impl Error ===

impl Error {
    /// Classifies a client failure that happened while `context`.
    pub fn client(context: impl Into<String>, source: ClientError) -> Self {
        let context = context.into();
        match source {
            ClientError::NotFound { .. } => Self::NotFound { context, source },
            ClientError::AlreadyExists { .. } => Self::Conflict { context, source },
            ClientError::Api(_) => Self::Upstream { context, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::RollbackFailed { .. } => ErrorKind::RollbackFailed,
        }
    }
}

// === impl ErrorKind ===

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Upstream => "upstream",
            Self::RollbackFailed => "rollback_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified_by_variant() {
        let not_found = ClientError::NotFound {
            kind: "NetworkPolicy",
            name: "ns/p".to_string(),
        };
        let exists = ClientError::AlreadyExists {
            kind: "NetworkPolicy",
            name: "ns/p".to_string(),
        };
        let api = ClientError::Api("connection refused".to_string());

        for (source, kind) in [
            (not_found, ErrorKind::NotFound),
            (exists, ErrorKind::Conflict),
            (api, ErrorKind::Upstream),
        ] {
            assert_eq!(Error::client("deleting policy", source).kind(), kind);
        }
    }

    #[test]
    fn rollback_failure_names_both_causes() {
        let error = Error::RollbackFailed {
            context: "creating policy B ns-b/block-from-ns-a-00".to_string(),
            source: ClientError::Api("quota exceeded".to_string()),
            rollback_name: "ns-a/block-from-ns-b-11".to_string(),
            rollback: ClientError::Api("connection reset".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "creating policy B ns-b/block-from-ns-a-00: cluster API request failed: quota exceeded; \
             rollback of ns-a/block-from-ns-b-11 also failed: cluster API request failed: connection reset"
        );
        assert_eq!(error.kind(), ErrorKind::RollbackFailed);
    }
}
