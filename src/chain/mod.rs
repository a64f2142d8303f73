//! Chain registry - known destination chains for cross-chain swaps
//!
//! Entries are write-once: a chain id keeps the name it was first
//! registered with for the life of the process.

use crate::config::ChainConfig;
use crate::error::{HotSwapError, HotSwapResult};
use crate::types::ChainId;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

/// A registered chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainRecord {
    pub chain_id: ChainId,
    pub name: String,
}

/// Map of chain id to human-readable name
#[derive(Debug, Default)]
pub struct ChainRegistry {
    chains: DashMap<ChainId, String>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from configuration
    pub fn from_config(chains: &[ChainConfig]) -> HotSwapResult<Self> {
        let registry = Self::new();
        for chain in chains {
            registry.register(chain.chain_id, &chain.name)?;
        }
        Ok(registry)
    }

    /// Add a chain. Re-registering an id fails and keeps the original name.
    pub fn register(&self, chain_id: ChainId, name: &str) -> HotSwapResult<()> {
        if name.trim().is_empty() {
            return Err(HotSwapError::InvalidTarget(format!(
                "chain {} needs a name",
                chain_id
            )));
        }

        match self.chains.entry(chain_id) {
            Entry::Occupied(existing) => {
                debug!(
                    "Chain {} already registered as {}",
                    chain_id,
                    existing.get()
                );
                Err(HotSwapError::DuplicateId { id: chain_id })
            }
            Entry::Vacant(slot) => {
                slot.insert(name.to_string());
                info!("Chain {} registered as {}", chain_id, name);
                crate::metrics::set_registered_chains(self.chains.len());
                Ok(())
            }
        }
    }

    pub fn name_of(&self, chain_id: ChainId) -> Option<String> {
        self.chains.get(&chain_id).map(|name| name.value().clone())
    }

    pub fn contains(&self, chain_id: ChainId) -> bool {
        self.chains.contains_key(&chain_id)
    }

    /// All chains ordered by id
    pub fn chains(&self) -> Vec<ChainRecord> {
        let mut chains: Vec<_> = self
            .chains
            .iter()
            .map(|entry| ChainRecord {
                chain_id: *entry.key(),
                name: entry.value().clone(),
            })
            .collect();
        chains.sort_by_key(|c| c.chain_id);
        chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
