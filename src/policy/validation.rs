//! Proof validation gates and the verifier collaborators behind them

use crate::error::{HotSwapError, HotSwapResult};
use crate::types::{GateKind, ValidationProof};

use async_trait::async_trait;
use sha3::{Digest, Keccak256};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure to obtain a verdict at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifierError {
    #[error("verifier unreachable: {0}")]
    Unreachable(String),
}

/// External cryptographic verifier (ZK circuit, post-quantum signature
/// scheme, ...). `Ok(false)` means the proof was checked and rejected.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, payload: &[u8], proof: &[u8]) -> Result<bool, VerifierError>;
}

/// Bridge or oracle that attests cross-chain transfer validity
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn attest(&self, data: &[u8], proof: &[u8]) -> Result<bool, VerifierError>;
}

/// Adapts a [`Bridge`] into a [`Verifier`] for the cross-chain proof gate
pub struct BridgeAttestation {
    bridge: Arc<dyn Bridge>,
}

impl BridgeAttestation {
    pub fn new(bridge: Arc<dyn Bridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl Verifier for BridgeAttestation {
    async fn verify(&self, payload: &[u8], proof: &[u8]) -> Result<bool, VerifierError> {
        self.bridge.attest(payload, proof).await
    }
}

/// Accepts any proof whose Keccak-256 digest is on a configured allowlist.
///
/// Stands in for a real circuit or bridge when the service runs without
/// one; the payload is not inspected.
#[derive(Debug, Clone, Default)]
pub struct DigestAllowlistVerifier {
    accepted: HashSet<[u8; 32]>,
}

impl DigestAllowlistVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from hex digests (with or without `0x`)
    pub fn from_hex_digests<I, S>(digests: I) -> HotSwapResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut verifier = Self::new();
        for digest in digests {
            let digest = digest.as_ref();
            let raw = hex::decode(digest.trim_start_matches("0x"))
                .map_err(|e| HotSwapError::Config(format!("Invalid digest {}: {}", digest, e)))?;
            let raw: [u8; 32] = raw.try_into().map_err(|_| {
                HotSwapError::Config(format!("Digest {} is not 32 bytes", digest))
            })?;
            verifier.accepted.insert(raw);
        }
        Ok(verifier)
    }

    /// Accept this exact proof
    pub fn accept(&mut self, proof: &[u8]) {
        self.accepted.insert(Self::digest(proof));
    }

    pub fn digest(proof: &[u8]) -> [u8; 32] {
        Keccak256::digest(proof).into()
    }

    fn check(&self, proof: &[u8]) -> bool {
        self.accepted.contains(&Self::digest(proof))
    }
}

#[async_trait]
impl Verifier for DigestAllowlistVerifier {
    async fn verify(&self, _payload: &[u8], proof: &[u8]) -> Result<bool, VerifierError> {
        Ok(self.check(proof))
    }
}

#[async_trait]
impl Bridge for DigestAllowlistVerifier {
    async fn attest(&self, _data: &[u8], proof: &[u8]) -> Result<bool, VerifierError> {
        Ok(self.check(proof))
    }
}

/// Validation capability bound to a registry
#[derive(Clone)]
pub enum ValidationGate {
    /// No proof required
    None,
    /// Proofs of `kind` are checked by `verifier`
    Proof {
        kind: GateKind,
        verifier: Arc<dyn Verifier>,
    },
}

impl ValidationGate {
    pub fn zero_knowledge(verifier: Arc<dyn Verifier>) -> Self {
        ValidationGate::Proof {
            kind: GateKind::ZeroKnowledge,
            verifier,
        }
    }

    pub fn quantum_safe(verifier: Arc<dyn Verifier>) -> Self {
        ValidationGate::Proof {
            kind: GateKind::QuantumSafe,
            verifier,
        }
    }

    /// Cross-chain proof gate backed by a bridge attester
    pub fn cross_chain(bridge: Arc<dyn Bridge>) -> Self {
        ValidationGate::Proof {
            kind: GateKind::CrossChain,
            verifier: Arc::new(BridgeAttestation::new(bridge)),
        }
    }

    pub fn kind(&self) -> Option<GateKind> {
        match self {
            ValidationGate::None => None,
            ValidationGate::Proof { kind, .. } => Some(*kind),
        }
    }

    /// Check `proof` against `payload`.
    ///
    /// A missing, mistagged or empty proof is `Ok(false)`. Only an
    /// unreachable verifier is an error.
    pub async fn verify(
        &self,
        payload: &[u8],
        proof: Option<&ValidationProof>,
    ) -> HotSwapResult<bool> {
        let (kind, verifier) = match self {
            ValidationGate::None => return Ok(true),
            ValidationGate::Proof { kind, verifier } => (*kind, verifier),
        };

        let Some(proof) = proof else {
            debug!("No proof supplied to {} gate", kind);
            return Ok(false);
        };
        if proof.kind != kind {
            debug!("Proof tagged {} offered to {} gate", proof.kind, kind);
            return Ok(false);
        }
        if proof.data.is_empty() {
            return Ok(false);
        }

        verifier
            .verify(payload, &proof.data)
            .await
            .map_err(|e| {
                warn!("{} verifier failed: {}", kind, e);
                HotSwapError::VerifierUnavailable {
                    gate: kind,
                    message: e.to_string(),
                }
            })
    }
}

impl fmt::Debug for ValidationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationGate::None => f.write_str("ValidationGate::None"),
            ValidationGate::Proof { kind, .. } => {
                f.debug_struct("ValidationGate::Proof").field("kind", kind).finish()
            }
        }
    }
}
