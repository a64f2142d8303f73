//! Caller-permission policies

use crate::error::{HotSwapError, HotSwapResult};
use crate::types::Address;

use serde::Serialize;

/// Who may request and execute swaps on a registry.
///
/// Bound once when the registry is built. Both predicates are pure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AuthorizationPolicy {
    /// Only the owner
    OwnerOnly { owner: Address },
    /// Only the governance identity
    GovernanceOnly { governance: Address },
    /// The owner or a designated oracle
    OwnerOrOracle { owner: Address, oracle: Address },
    /// Only the governance engine, which acts after a proposal passes
    VoteGated { executor: Address },
}

impl AuthorizationPolicy {
    pub fn can_request(&self, caller: &Address) -> bool {
        self.admits(caller)
    }

    pub fn can_execute(&self, caller: &Address) -> bool {
        self.admits(caller)
    }

    fn admits(&self, caller: &Address) -> bool {
        match self {
            AuthorizationPolicy::OwnerOnly { owner } => caller == owner,
            AuthorizationPolicy::GovernanceOnly { governance } => caller == governance,
            AuthorizationPolicy::OwnerOrOracle { owner, oracle } => {
                caller == owner || caller == oracle
            }
            AuthorizationPolicy::VoteGated { executor } => caller == executor,
        }
    }

    /// Fail with `PermissionDenied` unless the caller may request
    pub fn check_request(&self, caller: &Address, operation: &'static str) -> HotSwapResult<()> {
        if self.can_request(caller) {
            Ok(())
        } else {
            Err(HotSwapError::PermissionDenied {
                caller: *caller,
                operation,
            })
        }
    }

    /// Fail with `PermissionDenied` unless the caller may execute
    pub fn check_execute(&self, caller: &Address, operation: &'static str) -> HotSwapResult<()> {
        if self.can_execute(caller) {
            Ok(())
        } else {
            Err(HotSwapError::PermissionDenied {
                caller: *caller,
                operation,
            })
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthorizationPolicy::OwnerOnly { .. } => "owner_only",
            AuthorizationPolicy::GovernanceOnly { .. } => "governance_only",
            AuthorizationPolicy::OwnerOrOracle { .. } => "owner_or_oracle",
            AuthorizationPolicy::VoteGated { .. } => "vote_gated",
        }
    }
}
