//! Cross-chain swap orchestration

use crate::chain::ChainRegistry;
use crate::error::{HotSwapError, HotSwapResult};
use crate::events::{AuditEvent, AuditLog};
use crate::policy::{AuthorizationPolicy, Bridge, ValidationGate};
use crate::registry::SwapRegistry;
use crate::types::{Address, Bytes, ChainId, GateKind, SwapId, SwapTarget, ValidationProof};

use std::sync::Arc;
use tracing::{debug, info};

/// Drives a bridge-gated [`SwapRegistry`] against a catalog of chains.
///
/// Every execution is attested by the bridge: a negative attestation leaves
/// the request Requested so a corrected proof can be attached and retried.
pub struct CrossChainCoordinator {
    registry: SwapRegistry,
    chains: Arc<ChainRegistry>,
    audit: Arc<AuditLog>,
    /// Refuse requests naming a chain that was never registered
    require_registered_chain: bool,
}

impl CrossChainCoordinator {
    pub fn new(
        owner: Address,
        oracle: Address,
        bridge: Arc<dyn Bridge>,
        chains: Arc<ChainRegistry>,
        audit: Arc<AuditLog>,
    ) -> Self {
        let registry = SwapRegistry::new(
            "cross_chain",
            AuthorizationPolicy::OwnerOrOracle { owner, oracle },
            ValidationGate::cross_chain(bridge),
            audit.clone(),
        );

        Self {
            registry,
            chains,
            audit,
            require_registered_chain: false,
        }
    }

    pub fn require_registered_chain(mut self, required: bool) -> Self {
        self.require_registered_chain = required;
        self
    }

    pub fn registry(&self) -> &SwapRegistry {
        &self.registry
    }

    pub fn chains(&self) -> &Arc<ChainRegistry> {
        &self.chains
    }

    /// Add a destination chain to the catalog
    pub async fn register_chain(
        &self,
        caller: Address,
        chain_id: ChainId,
        name: &str,
    ) -> HotSwapResult<()> {
        self.registry
            .policy()
            .check_execute(&caller, "register chain")?;
        self.chains.register(chain_id, name)?;

        self.audit
            .append(AuditEvent::ChainRegistered {
                chain_id,
                chain_name: name.to_string(),
            })
            .await;
        Ok(())
    }

    /// Request a swap whose new target lives on `chain_id`
    pub async fn request_cross_chain_swap(
        &self,
        caller: Address,
        id: SwapId,
        target: Address,
        chain_id: ChainId,
        metadata: Bytes,
        proof: Option<Bytes>,
    ) -> HotSwapResult<()> {
        self.registry
            .policy()
            .check_request(&caller, "request cross-chain swap")?;
        self.ensure_chain(chain_id)?;

        self.registry
            .request_swap(caller, id, leg(target, chain_id, metadata, proof))
            .await
    }

    pub async fn execute_cross_chain_swap(&self, caller: Address, id: SwapId) -> HotSwapResult<()> {
        self.registry.execute_swap(caller, id).await
    }

    /// Request an all-or-nothing batch over parallel lists. `proofs` may be
    /// empty when proofs are attached later.
    pub async fn request_multi_chain_swap(
        &self,
        caller: Address,
        id: SwapId,
        targets: Vec<Address>,
        chain_ids: Vec<ChainId>,
        metadata: Vec<Bytes>,
        proofs: Vec<Bytes>,
    ) -> HotSwapResult<()> {
        self.registry
            .policy()
            .check_request(&caller, "request multi-chain swap")?;

        let len = targets.len();
        let proofs_match = proofs.is_empty() || proofs.len() == len;
        if chain_ids.len() != len || metadata.len() != len || !proofs_match {
            return Err(HotSwapError::InvalidTarget(format!(
                "mismatched lists: {} targets, {} chain ids, {} metadata, {} proofs",
                len,
                chain_ids.len(),
                metadata.len(),
                proofs.len()
            )));
        }
        for chain_id in &chain_ids {
            self.ensure_chain(*chain_id)?;
        }

        let mut proofs = proofs.into_iter();
        let legs = targets
            .into_iter()
            .zip(chain_ids)
            .zip(metadata)
            .map(|((target, chain_id), metadata)| leg(target, chain_id, metadata, proofs.next()))
            .collect();

        self.registry.request_multi_swap(caller, id, legs).await
    }

    pub async fn execute_multi_chain_swap(&self, caller: Address, id: SwapId) -> HotSwapResult<()> {
        self.registry.execute_multi_swap(caller, id).await
    }

    /// Replace the bridge proof of one leg before retrying execution
    pub async fn attach_proof(
        &self,
        caller: Address,
        id: SwapId,
        index: usize,
        proof: Bytes,
    ) -> HotSwapResult<()> {
        self.registry
            .attach_proof(caller, id, index, ValidationProof::new(GateKind::CrossChain, proof))
            .await
    }

    pub async fn rollback(&self, caller: Address, id: SwapId) -> HotSwapResult<()> {
        self.registry.rollback_swap(caller, id).await
    }

    /// Ask the bridge whether a transfer proof is valid, outside any swap
    pub async fn validate_cross_chain_transfer(
        &self,
        data: &[u8],
        proof: Bytes,
    ) -> HotSwapResult<bool> {
        let proof = ValidationProof::new(GateKind::CrossChain, proof);
        let valid = self.registry.gate().verify(data, Some(&proof)).await?;
        debug!("Cross-chain transfer attestation: {}", valid);
        Ok(valid)
    }

    fn ensure_chain(&self, chain_id: ChainId) -> HotSwapResult<()> {
        if self.require_registered_chain && !self.chains.contains(chain_id) {
            info!("Refusing swap to unregistered chain {}", chain_id);
            return Err(HotSwapError::InvalidTarget(format!(
                "chain {} is not registered",
                chain_id
            )));
        }
        Ok(())
    }
}

fn leg(target: Address, chain_id: ChainId, metadata: Bytes, proof: Option<Bytes>) -> SwapTarget {
    let leg = SwapTarget::local(target)
        .with_chain(chain_id)
        .with_metadata(metadata);
    match proof {
        Some(proof) => leg.with_proof(ValidationProof::new(GateKind::CrossChain, proof)),
        None => leg,
    }
}
