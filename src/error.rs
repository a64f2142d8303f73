//! Error types for the hot-swap engine

use crate::types::{Address, GateKind};
use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HotSwapError {
    #[error("Caller {caller} is not permitted to {operation}")]
    PermissionDenied {
        caller: Address,
        operation: &'static str,
    },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Cannot {operation} {subject} while it is {status}")]
    InvalidState {
        subject: String,
        status: String,
        operation: &'static str,
    },

    #[error("Proof rejected by {gate} gate for request {id}")]
    ValidationError { id: u64, gate: GateKind },

    #[error("{gate} verifier unavailable: {message}")]
    VerifierUnavailable { gate: GateKind, message: String },

    #[error("Voter {voter} already voted on proposal {proposal_id}")]
    DuplicateVote { proposal_id: u64, voter: Address },

    #[error(
        "Quorum not met for proposal {proposal_id}: {approvals} for, {rejections} against, \
         {required} votes required"
    )]
    QuorumNotMet {
        proposal_id: u64,
        approvals: usize,
        rejections: usize,
        required: usize,
    },

    #[error("Unknown id {id}")]
    UnknownId { id: u64 },

    #[error("Id {id} already exists")]
    DuplicateId { id: u64 },

    #[error("State migration failed: {0}")]
    MigrationFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HotSwapError {
    pub fn invalid_state(
        subject: impl std::fmt::Display,
        status: impl std::fmt::Display,
        operation: &'static str,
    ) -> Self {
        HotSwapError::InvalidState {
            subject: subject.to_string(),
            status: status.to_string(),
            operation,
        }
    }

    /// Check if the caller may retry the same call unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, HotSwapError::VerifierUnavailable { .. })
    }

    /// Check if error should trigger an alert
    pub fn should_alert(&self) -> bool {
        matches!(
            self,
            HotSwapError::MigrationFailed(_) | HotSwapError::PermissionDenied { .. }
        )
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            HotSwapError::PermissionDenied { .. } => "permission_denied",
            HotSwapError::InvalidTarget(_) => "invalid_target",
            HotSwapError::InvalidState { .. } => "invalid_state",
            HotSwapError::ValidationError { .. } => "validation_error",
            HotSwapError::VerifierUnavailable { .. } => "verifier_unavailable",
            HotSwapError::DuplicateVote { .. } => "duplicate_vote",
            HotSwapError::QuorumNotMet { .. } => "quorum_not_met",
            HotSwapError::UnknownId { .. } => "unknown_id",
            HotSwapError::DuplicateId { .. } => "duplicate_id",
            HotSwapError::MigrationFailed(_) => "migration_failed",
            HotSwapError::Config(_) => "config",
            HotSwapError::Internal(_) => "internal",
        }
    }
}

/// Result type for engine operations
pub type HotSwapResult<T> = Result<T, HotSwapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SwapStatus;

    #[test]
    fn test_only_unreachable_verifier_is_retryable() {
        let unavailable = HotSwapError::VerifierUnavailable {
            gate: GateKind::ZeroKnowledge,
            message: "connection refused".to_string(),
        };
        let rejected = HotSwapError::ValidationError {
            id: 7,
            gate: GateKind::ZeroKnowledge,
        };

        assert!(unavailable.is_retryable());
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.kind(), "validation_error");
    }

    #[test]
    fn test_invalid_state_message() {
        let err = HotSwapError::invalid_state("request 3", SwapStatus::RolledBack, "roll back");
        assert_eq!(err.to_string(), "Cannot roll back request 3 while it is rolled_back");
    }
}
