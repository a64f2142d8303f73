//! Registries holding the live references
//!
//! - [`SwapRegistry`]: request/execute/rollback lifecycle for one reference
//!   or an ordered batch
//! - [`ModuleRegistry`]: fixed named slots of a modular system

pub mod module;
pub mod swap;

pub use module::{ModuleAssignment, ModuleRegistry, ModuleSlot, ModuleState};
pub use swap::{SwapRegistry, SwapRequest};
