//! Opaque state-transfer hook run alongside a swap

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MigrationError(pub String);

/// Moves state from the outgoing component to the incoming one.
///
/// The payload is delivered exactly as the caller supplied it. Returning an
/// error undoes the swap the migration was paired with.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateMigrator: Send + Sync {
    async fn migrate(&self, payload: &[u8]) -> Result<(), MigrationError>;
}
