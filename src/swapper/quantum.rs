//! Quantum-safe gated swapper
//!
//! Swaps are gated by a post-quantum signature verifier. The swapper also
//! keeps the set of signature algorithms it considers quantum resistant.

use crate::error::{HotSwapError, HotSwapResult};
use crate::events::{AuditEvent, AuditLog};
use crate::policy::{AuthorizationPolicy, ValidationGate, Verifier};
use crate::registry::SwapRegistry;
use crate::types::{Address, Bytes, GateKind, SwapId, SwapTarget, ValidationProof};

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// NIST post-quantum signature and KEM schemes
pub const DEFAULT_APPROVED_ALGORITHMS: &[&str] = &[
    "CRYSTALS-Dilithium",
    "CRYSTALS-Kyber",
    "Falcon",
    "SPHINCS+",
];

pub struct QuantumSafeSwapper {
    registry: SwapRegistry,
    /// Identity besides the owner allowed to request signature checks
    signer: Address,
    approved_algorithms: BTreeSet<String>,
}

impl QuantumSafeSwapper {
    pub fn new(
        owner: Address,
        signer: Address,
        verifier: Arc<dyn Verifier>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            registry: SwapRegistry::new(
                "quantum_safe",
                AuthorizationPolicy::OwnerOnly { owner },
                ValidationGate::quantum_safe(verifier),
                audit,
            ),
            signer,
            approved_algorithms: DEFAULT_APPROVED_ALGORITHMS
                .iter()
                .map(|a| a.to_string())
                .collect(),
        }
    }

    /// Replace the approved set; an empty list keeps the defaults
    pub fn with_algorithms<I, S>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let algorithms: BTreeSet<String> = algorithms.into_iter().map(Into::into).collect();
        if !algorithms.is_empty() {
            self.approved_algorithms = algorithms;
        }
        self
    }

    pub fn registry(&self) -> &SwapRegistry {
        &self.registry
    }

    pub fn approved_algorithms(&self) -> impl Iterator<Item = &str> {
        self.approved_algorithms.iter().map(String::as_str)
    }

    pub fn validate_algorithm(&self, algorithm: &str) -> bool {
        self.approved_algorithms.contains(algorithm.trim())
    }

    /// Request and execute in one call. A rejected signature leaves the
    /// request pending and the live reference untouched.
    pub async fn swap_to_quantum_safe(
        &self,
        caller: Address,
        id: SwapId,
        target: Address,
        signature: Bytes,
    ) -> HotSwapResult<()> {
        self.registry
            .request_swap(caller, id, signed_leg(target, signature))
            .await?;
        self.registry.execute_swap(caller, id).await
    }

    /// Replace the signature of one leg before retrying execution
    pub async fn attach_signature(
        &self,
        caller: Address,
        id: SwapId,
        index: usize,
        signature: Bytes,
    ) -> HotSwapResult<()> {
        let proof = ValidationProof::new(GateKind::QuantumSafe, signature);
        self.registry.attach_proof(caller, id, index, proof).await
    }

    /// Dry-run a signature against one leg of a tracked request. Nothing is
    /// recorded; a rejected signature is a `ValidationError`.
    pub async fn validate_proof(
        &self,
        id: SwapId,
        index: usize,
        signature: Bytes,
    ) -> HotSwapResult<()> {
        let request = self
            .registry
            .request(id)
            .await
            .ok_or(HotSwapError::UnknownId { id })?;
        let leg = request.targets.get(index).ok_or_else(|| {
            HotSwapError::InvalidTarget(format!("request {} has no entry {}", id, index))
        })?;

        let proof = ValidationProof::new(GateKind::QuantumSafe, signature);
        if self.registry.gate().verify(&leg.payload(), Some(&proof)).await? {
            Ok(())
        } else {
            Err(HotSwapError::ValidationError {
                id,
                gate: GateKind::QuantumSafe,
            })
        }
    }

    pub async fn request_batch_quantum_swap(
        &self,
        caller: Address,
        id: SwapId,
        targets: Vec<Address>,
        signatures: Vec<Bytes>,
    ) -> HotSwapResult<()> {
        if signatures.len() != targets.len() {
            return Err(HotSwapError::InvalidTarget(format!(
                "{} targets but {} signatures",
                targets.len(),
                signatures.len()
            )));
        }

        let legs = targets
            .into_iter()
            .zip(signatures)
            .map(|(target, signature)| signed_leg(target, signature))
            .collect();
        self.registry.request_multi_swap(caller, id, legs).await
    }

    pub async fn execute_batch_quantum_swap(
        &self,
        caller: Address,
        id: SwapId,
    ) -> HotSwapResult<()> {
        self.registry.execute_multi_swap(caller, id).await
    }

    /// Check a signature over the live reference. Only a valid signature
    /// is recorded.
    pub async fn verify_signature(&self, caller: Address, signature: Bytes) -> HotSwapResult<bool> {
        if caller != self.signer && !self.registry.policy().can_execute(&caller) {
            return Err(HotSwapError::PermissionDenied {
                caller,
                operation: "verify signature",
            });
        }

        let payload = self
            .registry
            .current()
            .await
            .map(|current| current.to_vec())
            .unwrap_or_default();
        let proof = ValidationProof::new(GateKind::QuantumSafe, signature.clone());
        let valid = self.registry.gate().verify(&payload, Some(&proof)).await?;

        if valid {
            self.registry
                .audit()
                .append(AuditEvent::QuantumSafeSignatureValidated { signature })
                .await;
            info!("Quantum-safe signature validated for {}", caller);
        } else {
            warn!("Quantum-safe signature from {} rejected", caller);
        }
        Ok(valid)
    }

    pub async fn migrate_data(&self, caller: Address, data: Bytes) -> HotSwapResult<()> {
        self.registry.migrate_state(caller, data).await
    }
}

fn signed_leg(target: Address, signature: Bytes) -> SwapTarget {
    SwapTarget::local(target).with_proof(ValidationProof::new(GateKind::QuantumSafe, signature))
}
