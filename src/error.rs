use std::fmt;

use thiserror::Error;

/// Coarse classification of planner failures.
///
/// Callers use it to decide between resubmitting, re-validating the query or
/// surfacing a "not implemented" failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required shard has no usable copy right now; retry after the cluster changes.
    RoutingUnavailable,
    /// The table identity itself is in question.
    NotFound,
    /// The query is structurally invalid for the chosen plan.
    Validation,
    /// The feature is not implemented at this layer.
    Unsupported,
    /// Planner invariant breach that was recoverable enough to report.
    Internal,
    /// Planner configuration could not be read.
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::RoutingUnavailable => "routing_unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Internal => "internal",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("shard {shard} of index [{index}] has no active or initializing copy")]
    ShardsUnavailable { index: String, shard: u32 },

    #[error("index [{0}] not found")]
    IndexNotFound(String),

    #[error("shard {shard} of index [{index}] not found")]
    ShardNotFound { index: String, shard: u32 },

    #[error("\"_version\" is not supported in WHERE or HAVING clauses of grouped queries")]
    VersionInvalid,

    #[error("cannot GROUP BY '{column}': {reason}")]
    InvalidGroupKey { column: String, reason: String },

    #[error("invalid LIMIT/OFFSET value: {0}")]
    InvalidLimit(String),

    #[error("no value bound for parameter ${0}")]
    MissingParameter(usize),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("internal planner error: {0}")]
    Internal(String),

    #[error("invalid planner configuration: {0}")]
    InvalidConfig(String),
}

impl PlannerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlannerError::ShardsUnavailable { .. } => ErrorKind::RoutingUnavailable,
            PlannerError::IndexNotFound(_) | PlannerError::ShardNotFound { .. } => ErrorKind::NotFound,
            PlannerError::VersionInvalid
            | PlannerError::InvalidGroupKey { .. }
            | PlannerError::InvalidLimit(_)
            | PlannerError::MissingParameter(_) => ErrorKind::Validation,
            PlannerError::Unsupported(_) => ErrorKind::Unsupported,
            PlannerError::Internal(_) => ErrorKind::Internal,
            PlannerError::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Stable error code, suitable for telemetry labels.
    pub fn code(&self) -> &'static str {
        match self {
            PlannerError::ShardsUnavailable { .. } => "SHARDS_UNAVAILABLE",
            PlannerError::IndexNotFound(_) => "INDEX_NOT_FOUND",
            PlannerError::ShardNotFound { .. } => "SHARD_NOT_FOUND",
            PlannerError::VersionInvalid => "VERSION_INVALID",
            PlannerError::InvalidGroupKey { .. } => "INVALID_GROUP_KEY",
            PlannerError::InvalidLimit(_) => "INVALID_LIMIT",
            PlannerError::MissingParameter(_) => "MISSING_PARAMETER",
            PlannerError::Unsupported(_) => "UNSUPPORTED",
            PlannerError::Internal(_) => "INTERNAL",
            PlannerError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Only routing failures may be resubmitted as-is.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::RoutingUnavailable
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;

/// Failures of the handler-side merge of upstream results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("upstream on node [{node_id}] failed: {message}")]
    Upstream { node_id: String, message: String },

    #[error("merge expected {expected} upstream results but only {received} reported")]
    Incomplete { expected: usize, received: usize },

    #[error("merge was cancelled")]
    Cancelled,
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
