//! Cross-chain coordination
//!
//! The coordinator:
//! 1. Keeps the catalog of destination chains
//! 2. Records swap requests carrying a target chain id and metadata
//! 3. Routes every execution through the bridge attestation gate
//! 4. Applies multi-chain batches all-or-nothing

pub mod engine;

pub use engine::CrossChainCoordinator;
