//! Vote-gated swap proposals
//!
//! A proposal names a new target. Once enough voters approve it, the
//! governance engine applies the swap through its own [`SwapRegistry`],
//! whose [`AuthorizationPolicy::VoteGated`] policy admits only this engine.

use crate::error::{HotSwapError, HotSwapResult};
use crate::events::{AuditEvent, AuditLog};
use crate::policy::{AuthorizationPolicy, ValidationGate};
use crate::registry::SwapRegistry;
use crate::types::{ensure_target, Address, ProposalId, SwapStatus, SwapTarget};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Votes needed before a proposal can execute
pub const DEFAULT_QUORUM: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Executed,
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalStatus::Pending => f.write_str("pending"),
            ProposalStatus::Executed => f.write_str("executed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: Address,
    pub target: Address,
    /// voter -> approved
    pub votes: BTreeMap<Address, bool>,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    pub fn approvals(&self) -> usize {
        self.votes.values().filter(|approved| **approved).count()
    }

    pub fn rejections(&self) -> usize {
        self.votes.len() - self.approvals()
    }
}

struct ProposalState {
    next_id: ProposalId,
    proposals: HashMap<ProposalId, Proposal>,
}

/// Proposal book plus the registry it drives
pub struct Governance {
    /// Identity the registry's vote-gated policy admits
    identity: Address,
    quorum: usize,
    /// `None` lets any caller vote
    eligible_voters: Option<HashSet<Address>>,
    registry: Arc<SwapRegistry>,
    audit: Arc<AuditLog>,
    state: RwLock<ProposalState>,
}

impl Governance {
    pub fn new(identity: Address, quorum: usize, audit: Arc<AuditLog>) -> Self {
        let registry = SwapRegistry::new(
            "dao",
            AuthorizationPolicy::VoteGated { executor: identity },
            ValidationGate::None,
            audit.clone(),
        );
        Self::with_registry(identity, quorum, Arc::new(registry), audit)
    }

    /// Drive an existing registry; its policy must admit `identity`
    pub fn with_registry(
        identity: Address,
        quorum: usize,
        registry: Arc<SwapRegistry>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            identity,
            quorum: quorum.max(1),
            eligible_voters: None,
            registry,
            audit,
            state: RwLock::new(ProposalState {
                next_id: 1,
                proposals: HashMap::new(),
            }),
        }
    }

    /// Restrict voting to a fixed set
    pub fn with_voters(mut self, voters: impl IntoIterator<Item = Address>) -> Self {
        self.eligible_voters = Some(voters.into_iter().collect());
        self
    }

    pub fn identity(&self) -> Address {
        self.identity
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn registry(&self) -> &Arc<SwapRegistry> {
        &self.registry
    }

    /// Open a proposal; any caller may propose
    pub async fn create_proposal(
        &self,
        caller: Address,
        target: Address,
    ) -> HotSwapResult<ProposalId> {
        ensure_target(&target)?;

        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        state.proposals.insert(
            id,
            Proposal {
                id,
                proposer: caller,
                target,
                votes: BTreeMap::new(),
                status: ProposalStatus::Pending,
                created_at: Utc::now(),
            },
        );

        self.audit
            .append(AuditEvent::ProposalCreated {
                proposer: caller,
                new_target: target,
            })
            .await;
        info!("Proposal {} created by {} for {}", id, caller, target);
        Ok(id)
    }

    /// Record one vote per voter per proposal
    pub async fn vote_on_proposal(
        &self,
        caller: Address,
        id: ProposalId,
        approve: bool,
    ) -> HotSwapResult<()> {
        if let Some(voters) = &self.eligible_voters {
            if !voters.contains(&caller) {
                return Err(HotSwapError::PermissionDenied {
                    caller,
                    operation: "vote",
                });
            }
        }

        let mut state = self.state.write().await;
        let proposal = state
            .proposals
            .get_mut(&id)
            .ok_or(HotSwapError::UnknownId { id })?;
        if proposal.votes.contains_key(&caller) {
            return Err(HotSwapError::DuplicateVote {
                proposal_id: id,
                voter: caller,
            });
        }
        if proposal.status != ProposalStatus::Pending {
            return Err(HotSwapError::invalid_state(
                format!("proposal {}", id),
                proposal.status,
                "vote on",
            ));
        }
        proposal.votes.insert(caller, approve);
        debug!(
            "Proposal {} tally: {} for, {} against",
            id,
            proposal.approvals(),
            proposal.rejections()
        );

        self.audit
            .append(AuditEvent::VoteCast {
                voter: caller,
                approved: approve,
            })
            .await;
        crate::metrics::record_vote(approve);
        Ok(())
    }

    /// Apply a proposal that reached quorum with a strict majority
    pub async fn execute_proposal(&self, caller: Address, id: ProposalId) -> HotSwapResult<()> {
        let mut state = self.state.write().await;
        let proposal = state
            .proposals
            .get(&id)
            .ok_or(HotSwapError::UnknownId { id })?;
        if proposal.status != ProposalStatus::Pending {
            return Err(HotSwapError::invalid_state(
                format!("proposal {}", id),
                proposal.status,
                "execute",
            ));
        }

        let approvals = proposal.approvals();
        let rejections = proposal.rejections();
        if approvals + rejections < self.quorum || approvals <= rejections {
            return Err(HotSwapError::QuorumNotMet {
                proposal_id: id,
                approvals,
                rejections,
                required: self.quorum,
            });
        }
        let target = proposal.target;

        // A previous attempt may have left the swap requested but unexecuted
        if self.registry.status(id).await != Some(SwapStatus::Requested) {
            self.registry
                .request_swap(self.identity, id, SwapTarget::local(target))
                .await?;
        }
        self.registry.execute_swap(self.identity, id).await?;

        if let Some(proposal) = state.proposals.get_mut(&id) {
            proposal.status = ProposalStatus::Executed;
        }
        self.audit
            .append(AuditEvent::ProposalExecuted { new_target: target })
            .await;
        crate::metrics::record_proposal_executed();
        info!(
            "Proposal {} executed by {} ({} for, {} against)",
            id, caller, approvals, rejections
        );
        Ok(())
    }

    pub async fn proposal(&self, id: ProposalId) -> Option<Proposal> {
        self.state.read().await.proposals.get(&id).cloned()
    }

    pub async fn proposals(&self) -> Vec<Proposal> {
        let mut proposals: Vec<_> = self.state.read().await.proposals.values().cloned().collect();
        proposals.sort_by_key(|p| p.id);
        proposals
    }

    /// Live reference applied by the last executed proposal
    pub async fn current(&self) -> Option<Address> {
        self.registry.current().await
    }
}
