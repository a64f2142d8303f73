//! Hot-swap engine - replace live component references without downtime
//!
//! One request/execute/rollback state machine ([`registry::SwapRegistry`])
//! composed with pluggable authorization ([`policy::AuthorizationPolicy`])
//! and proof validation ([`policy::ValidationGate`]). The swapper variants in
//! [`swapper`] are those compositions; [`governance`] and [`coordination`]
//! drive registries from votes and bridge attestations.

pub mod api;
pub mod chain;
pub mod config;
pub mod coordination;
pub mod error;
pub mod events;
pub mod governance;
pub mod metrics;
pub mod migration;
pub mod policy;
pub mod registry;
pub mod swapper;
pub mod types;

pub use error::{HotSwapError, HotSwapResult};
pub use events::{AuditEvent, AuditLog, AuditRecord};
pub use registry::{ModuleRegistry, ModuleSlot, SwapRegistry};
pub use types::{Address, Bytes, ChainId, GateKind, SwapId, SwapStatus, SwapTarget, ValidationProof};
