//! Swapper variants
//!
//! Every variant is a [`SwapRegistry`] composed with one authorization
//! policy and one validation gate:
//!
//! | variant      | policy          | gate           |
//! |--------------|-----------------|----------------|
//! | basic        | GovernanceOnly  | none           |
//! | governed     | GovernanceOnly  | none           |
//! | dao          | VoteGated       | none           |
//! | cross_chain  | OwnerOrOracle   | bridge         |
//! | privacy      | OwnerOnly       | zero-knowledge |
//! | quantum_safe | OwnerOnly       | quantum-safe   |
//!
//! The modular swapper manages fixed slots instead and lives in
//! [`crate::registry::ModuleRegistry`].

pub mod privacy;
pub mod quantum;

pub use privacy::PrivacySwapper;
pub use quantum::{QuantumSafeSwapper, DEFAULT_APPROVED_ALGORITHMS};

use crate::chain::ChainRegistry;
use crate::config::Settings;
use crate::coordination::CrossChainCoordinator;
use crate::events::AuditLog;
use crate::governance::Governance;
use crate::policy::{AuthorizationPolicy, Bridge, DigestAllowlistVerifier, ValidationGate, Verifier};
use crate::registry::{ModuleRegistry, SwapRegistry};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Registry-backed swapper variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapperKind {
    Basic,
    Governed,
    Dao,
    CrossChain,
    Privacy,
    QuantumSafe,
}

impl SwapperKind {
    pub const ALL: [SwapperKind; 6] = [
        SwapperKind::Basic,
        SwapperKind::Governed,
        SwapperKind::Dao,
        SwapperKind::CrossChain,
        SwapperKind::Privacy,
        SwapperKind::QuantumSafe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SwapperKind::Basic => "basic",
            SwapperKind::Governed => "governed",
            SwapperKind::Dao => "dao",
            SwapperKind::CrossChain => "cross_chain",
            SwapperKind::Privacy => "privacy",
            SwapperKind::QuantumSafe => "quantum_safe",
        }
    }
}

impl fmt::Display for SwapperKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every swapper of one engine instance, sharing one audit log
pub struct SwapperSuite {
    pub audit: Arc<AuditLog>,
    pub basic: Arc<SwapRegistry>,
    pub governed: Arc<SwapRegistry>,
    pub dao: Arc<Governance>,
    pub modular: Arc<ModuleRegistry>,
    pub chains: Arc<ChainRegistry>,
    pub cross_chain: Arc<CrossChainCoordinator>,
    pub privacy: Arc<PrivacySwapper>,
    pub quantum: Arc<QuantumSafeSwapper>,
}

impl SwapperSuite {
    /// Build every swapper from configuration
    pub fn from_settings(settings: &Settings, audit: Arc<AuditLog>) -> Result<Self> {
        let owner = settings.owner()?;
        let allowlist = Arc::new(
            DigestAllowlistVerifier::from_hex_digests(&settings.validation.accepted_proof_digests)
                .context("Invalid validation.accepted_proof_digests")?,
        );
        let verifier: Arc<dyn Verifier> = allowlist.clone();
        let bridge: Arc<dyn Bridge> = allowlist;

        let basic = SwapRegistry::new(
            SwapperKind::Basic.as_str(),
            AuthorizationPolicy::GovernanceOnly { governance: owner },
            ValidationGate::None,
            audit.clone(),
        );
        let governed = SwapRegistry::new(
            SwapperKind::Governed.as_str(),
            AuthorizationPolicy::GovernanceOnly {
                governance: settings.governance_address()?,
            },
            ValidationGate::None,
            audit.clone(),
        );

        let mut dao = Governance::new(
            settings.dao_executor()?,
            settings.governance.quorum,
            audit.clone(),
        );
        let voters = settings.voters()?;
        if !voters.is_empty() {
            dao = dao.with_voters(voters);
        }

        let chains = Arc::new(
            ChainRegistry::from_config(&settings.chains).context("Invalid chain configuration")?,
        );
        let cross_chain = CrossChainCoordinator::new(
            owner,
            settings.oracle()?,
            bridge,
            chains.clone(),
            audit.clone(),
        )
        .require_registered_chain(settings.cross_chain.require_registered_chain);

        let quantum = QuantumSafeSwapper::new(
            owner,
            settings.quantum_verifier()?,
            verifier.clone(),
            audit.clone(),
        )
        .with_algorithms(settings.validation.approved_algorithms.iter().cloned());

        info!(
            "Swappers initialized: {} chains, DAO quorum {}",
            chains.len(),
            dao.quorum()
        );

        Ok(Self {
            basic: Arc::new(basic),
            governed: Arc::new(governed),
            dao: Arc::new(dao),
            modular: Arc::new(ModuleRegistry::new(owner, audit.clone())),
            chains,
            cross_chain: Arc::new(cross_chain),
            privacy: Arc::new(PrivacySwapper::new(owner, verifier, audit.clone())),
            quantum: Arc::new(quantum),
            audit,
        })
    }

    /// Registry behind a swapper variant
    pub fn registry(&self, kind: SwapperKind) -> &SwapRegistry {
        match kind {
            SwapperKind::Basic => &self.basic,
            SwapperKind::Governed => &self.governed,
            SwapperKind::Dao => self.dao.registry(),
            SwapperKind::CrossChain => self.cross_chain.registry(),
            SwapperKind::Privacy => self.privacy.registry(),
            SwapperKind::QuantumSafe => self.quantum.registry(),
        }
    }

    /// Requested entries never expire, so operators watch this count
    pub async fn pending_requests(&self) -> Vec<(SwapperKind, usize)> {
        let mut pending = Vec::with_capacity(SwapperKind::ALL.len());
        for kind in SwapperKind::ALL {
            pending.push((kind, self.registry(kind).pending_count().await));
        }
        pending
    }
}
