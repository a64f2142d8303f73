//! Shared identifiers and records used across registries

use crate::error::{HotSwapError, HotSwapResult};

use serde::{Deserialize, Serialize};
use std::fmt;

pub use alloy_primitives::{Address, Bytes};

/// Swap request identifier, chosen by the requester
pub type SwapId = u64;

/// Governance proposal identifier, assigned sequentially from 1
pub type ProposalId = u64;

/// External chain identifier
pub type ChainId = u64;

/// Lifecycle of a swap request. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Requested,
    Executed,
    RolledBack,
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SwapStatus::Requested => "requested",
            SwapStatus::Executed => "executed",
            SwapStatus::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

/// Kind of proof a validation gate checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    ZeroKnowledge,
    QuantumSafe,
    CrossChain,
}

impl GateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::ZeroKnowledge => "zero_knowledge",
            GateKind::QuantumSafe => "quantum_safe",
            GateKind::CrossChain => "cross_chain",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque proof bytes tagged with the gate they are meant for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationProof {
    pub kind: GateKind,
    pub data: Bytes,
}

impl ValidationProof {
    pub fn new(kind: GateKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }
}

/// One element of a swap request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTarget {
    pub target: Address,
    pub chain_id: Option<ChainId>,
    pub metadata: Bytes,
    pub proof: Option<ValidationProof>,
}

impl SwapTarget {
    /// Plain local target with no metadata or proof
    pub fn local(target: Address) -> Self {
        Self {
            target,
            chain_id: None,
            metadata: Bytes::new(),
            proof: None,
        }
    }

    pub fn with_metadata(mut self, metadata: impl Into<Bytes>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn with_chain(mut self, chain_id: ChainId) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_proof(mut self, proof: ValidationProof) -> Self {
        self.proof = Some(proof);
        self
    }

    /// Bytes handed to the verifier: target, then chain id (big endian) if
    /// any, then metadata.
    pub fn payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(20 + 8 + self.metadata.len());
        payload.extend_from_slice(self.target.as_slice());
        if let Some(chain_id) = self.chain_id {
            payload.extend_from_slice(&chain_id.to_be_bytes());
        }
        payload.extend_from_slice(&self.metadata);
        payload
    }
}

/// Reject the zero address sentinel
pub fn ensure_target(target: &Address) -> HotSwapResult<()> {
    if target.is_zero() {
        return Err(HotSwapError::InvalidTarget(
            "target must not be the zero address".to_string(),
        ));
    }
    Ok(())
}
