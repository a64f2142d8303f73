//! Zero-knowledge gated swapper

use crate::error::{HotSwapError, HotSwapResult};
use crate::events::AuditLog;
use crate::policy::{AuthorizationPolicy, ValidationGate, Verifier};
use crate::registry::SwapRegistry;
use crate::types::{Address, Bytes, GateKind, SwapId, SwapTarget, ValidationProof};

use std::sync::Arc;
use tracing::debug;

/// Every execution must carry a proof the ZK verifier accepts
pub struct PrivacySwapper {
    registry: SwapRegistry,
}

impl PrivacySwapper {
    pub fn new(owner: Address, verifier: Arc<dyn Verifier>, audit: Arc<AuditLog>) -> Self {
        Self {
            registry: SwapRegistry::new(
                "privacy",
                AuthorizationPolicy::OwnerOnly { owner },
                ValidationGate::zero_knowledge(verifier),
                audit,
            ),
        }
    }

    pub fn registry(&self) -> &SwapRegistry {
        &self.registry
    }

    pub async fn request_swap(
        &self,
        caller: Address,
        id: SwapId,
        target: Address,
        proof: Bytes,
        metadata: Bytes,
    ) -> HotSwapResult<()> {
        self.registry
            .request_swap(caller, id, private_leg(target, proof, metadata))
            .await
    }

    /// Parallel lists of targets, proofs and metadata under one id
    pub async fn request_batch_swap(
        &self,
        caller: Address,
        id: SwapId,
        targets: Vec<Address>,
        proofs: Vec<Bytes>,
        metadata: Vec<Bytes>,
    ) -> HotSwapResult<()> {
        if proofs.len() != targets.len() || metadata.len() != targets.len() {
            return Err(HotSwapError::InvalidTarget(format!(
                "mismatched lists: {} targets, {} proofs, {} metadata",
                targets.len(),
                proofs.len(),
                metadata.len()
            )));
        }

        let legs = targets
            .into_iter()
            .zip(proofs)
            .zip(metadata)
            .map(|((target, proof), metadata)| private_leg(target, proof, metadata))
            .collect();
        self.registry.request_multi_swap(caller, id, legs).await
    }

    pub async fn execute_swap(&self, caller: Address, id: SwapId) -> HotSwapResult<()> {
        self.registry.execute_swap(caller, id).await
    }

    pub async fn execute_batch_swap(&self, caller: Address, id: SwapId) -> HotSwapResult<()> {
        self.registry.execute_multi_swap(caller, id).await
    }

    pub async fn rollback_swap(&self, caller: Address, id: SwapId) -> HotSwapResult<()> {
        self.registry.rollback_swap(caller, id).await
    }

    /// Check a proof against public inputs without touching any request
    pub async fn verify_proof(&self, proof: Bytes, inputs: &[u8]) -> HotSwapResult<bool> {
        let proof = ValidationProof::new(GateKind::ZeroKnowledge, proof);
        self.registry.gate().verify(inputs, Some(&proof)).await
    }

    /// Ask the verifier whether `state` is consistent with the committed
    /// `expected` state
    pub async fn verify_state_consistency(
        &self,
        state: &[u8],
        expected: Bytes,
    ) -> HotSwapResult<bool> {
        let commitment = ValidationProof::new(GateKind::ZeroKnowledge, expected);
        let consistent = self.registry.gate().verify(state, Some(&commitment)).await?;
        debug!("State consistency check: {}", consistent);
        Ok(consistent)
    }
}

fn private_leg(target: Address, proof: Bytes, metadata: Bytes) -> SwapTarget {
    SwapTarget::local(target)
        .with_metadata(metadata)
        .with_proof(ValidationProof::new(GateKind::ZeroKnowledge, proof))
}
