//! Fixed set of named module slots swapped together or one at a time

use crate::error::{HotSwapError, HotSwapResult};
use crate::events::{AuditEvent, AuditLog};
use crate::migration::StateMigrator;
use crate::policy::AuthorizationPolicy;
use crate::types::{ensure_target, Address, Bytes};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// The swappable layers of a modular system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleSlot {
    Consensus,
    Execution,
    DataAvailability,
}

impl ModuleSlot {
    pub const ALL: [ModuleSlot; 3] = [
        ModuleSlot::Consensus,
        ModuleSlot::Execution,
        ModuleSlot::DataAvailability,
    ];

    /// Name carried by audit events
    pub fn name(&self) -> &'static str {
        match self {
            ModuleSlot::Consensus => "Consensus",
            ModuleSlot::Execution => "Execution",
            ModuleSlot::DataAvailability => "Data Availability",
        }
    }
}

impl fmt::Display for ModuleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One slot's live module and its single-level snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleState {
    pub slot: ModuleSlot,
    pub current: Option<Address>,
    pub previous: Option<Address>,
}

/// New modules for every slot at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAssignment {
    pub consensus: Address,
    pub execution: Address,
    pub data_availability: Address,
}

impl ModuleAssignment {
    fn entries(&self) -> [(ModuleSlot, Address); 3] {
        [
            (ModuleSlot::Consensus, self.consensus),
            (ModuleSlot::Execution, self.execution),
            (ModuleSlot::DataAvailability, self.data_availability),
        ]
    }
}

/// Owner-controlled registry of module slots
pub struct ModuleRegistry {
    policy: AuthorizationPolicy,
    migrator: Option<Arc<dyn StateMigrator>>,
    audit: Arc<AuditLog>,
    slots: RwLock<BTreeMap<ModuleSlot, ModuleState>>,
}

impl ModuleRegistry {
    pub fn new(owner: Address, audit: Arc<AuditLog>) -> Self {
        let slots = ModuleSlot::ALL
            .iter()
            .map(|slot| {
                (
                    *slot,
                    ModuleState {
                        slot: *slot,
                        current: None,
                        previous: None,
                    },
                )
            })
            .collect();

        Self {
            policy: AuthorizationPolicy::OwnerOnly { owner },
            migrator: None,
            audit,
            slots: RwLock::new(slots),
        }
    }

    /// Seed a slot without recording a snapshot
    pub fn with_module(mut self, slot: ModuleSlot, module: Address) -> Self {
        if let Some(state) = self.slots.get_mut().get_mut(&slot) {
            state.current = Some(module);
        }
        self
    }

    pub fn with_migrator(mut self, migrator: Arc<dyn StateMigrator>) -> Self {
        self.migrator = Some(migrator);
        self
    }

    /// Replace one slot's module
    pub async fn swap_module(
        &self,
        caller: Address,
        slot: ModuleSlot,
        module: Address,
    ) -> HotSwapResult<()> {
        self.policy.check_execute(&caller, "swap module")?;
        ensure_target(&module)?;

        let mut slots = self.slots.write().await;
        install(&mut slots, slot, module);

        self.audit
            .append(AuditEvent::ModuleSwapped {
                slot_name: slot.name().to_string(),
                new_module: module,
            })
            .await;
        crate::metrics::record_module_swap(slot);
        info!("Module slot {} swapped to {} by {}", slot, module, caller);
        Ok(())
    }

    /// Replace every slot at once; one invalid entry leaves all slots as they were
    pub async fn swap_multiple_modules(
        &self,
        caller: Address,
        assignment: ModuleAssignment,
    ) -> HotSwapResult<()> {
        self.policy.check_execute(&caller, "swap modules")?;
        for (slot, module) in assignment.entries() {
            ensure_target(&module).map_err(|_| {
                HotSwapError::InvalidTarget(format!("{} module is the zero address", slot))
            })?;
        }

        let mut slots = self.slots.write().await;
        for (slot, module) in assignment.entries() {
            install(&mut slots, slot, module);
            crate::metrics::record_module_swap(slot);
        }

        self.audit
            .append(AuditEvent::MultiModuleSwapped {
                consensus_module: assignment.consensus,
                execution_module: assignment.execution,
                data_module: assignment.data_availability,
            })
            .await;
        info!("All module slots swapped by {}", caller);
        Ok(())
    }

    /// Hand an opaque payload to the migrator
    pub async fn migrate_state_across_modules(
        &self,
        caller: Address,
        state_data: Bytes,
    ) -> HotSwapResult<()> {
        self.policy.check_execute(&caller, "migrate module state")?;

        let _slots = self.slots.write().await;
        self.run_migration(&state_data).await?;

        self.audit
            .append(AuditEvent::StateMigrationPerformed { state_data })
            .await;
        info!("Module state migrated by {}", caller);
        Ok(())
    }

    /// Swap one slot and migrate state as one unit. If the migration fails
    /// the slot is restored from its snapshot and nothing is logged.
    pub async fn swap_module_with_migration(
        &self,
        caller: Address,
        slot: ModuleSlot,
        module: Address,
        state_data: Bytes,
    ) -> HotSwapResult<()> {
        self.policy.check_execute(&caller, "swap module")?;
        ensure_target(&module)?;

        let mut slots = self.slots.write().await;
        let snapshot = slots.get(&slot).cloned();
        install(&mut slots, slot, module);

        if let Err(e) = self.run_migration(&state_data).await {
            if let Some(snapshot) = snapshot {
                slots.insert(slot, snapshot);
            }
            warn!("Migration for slot {} failed, restored previous module: {}", slot, e);
            return Err(e);
        }

        self.audit
            .append_all(vec![
                AuditEvent::ModuleSwapped {
                    slot_name: slot.name().to_string(),
                    new_module: module,
                },
                AuditEvent::StateMigrationPerformed { state_data },
            ])
            .await;
        crate::metrics::record_module_swap(slot);
        info!("Module slot {} swapped to {} with state migration", slot, module);
        Ok(())
    }

    /// Reinstall the slot's snapshot. The snapshot is consumed, so undo depth stays 1.
    pub async fn rollback_module(&self, caller: Address, slot: ModuleSlot) -> HotSwapResult<()> {
        self.policy.check_execute(&caller, "roll back module")?;

        let mut slots = self.slots.write().await;
        let state = slots
            .get_mut(&slot)
            .ok_or_else(|| HotSwapError::Internal(format!("slot {} missing", slot)))?;
        let Some(previous) = state.previous.take() else {
            return Err(HotSwapError::invalid_state(
                format!("slot {}", slot),
                "without a snapshot",
                "roll back",
            ));
        };
        state.current = Some(previous);

        self.audit
            .append(AuditEvent::ModuleSwapped {
                slot_name: slot.name().to_string(),
                new_module: previous,
            })
            .await;
        info!("Module slot {} rolled back to {}", slot, previous);
        Ok(())
    }

    async fn run_migration(&self, state_data: &[u8]) -> HotSwapResult<()> {
        let Some(migrator) = &self.migrator else {
            return Ok(());
        };
        migrator
            .migrate(state_data)
            .await
            .map_err(|e| HotSwapError::MigrationFailed(e.to_string()))
    }

    pub async fn module(&self, slot: ModuleSlot) -> Option<Address> {
        self.slots.read().await.get(&slot).and_then(|s| s.current)
    }

    pub async fn previous(&self, slot: ModuleSlot) -> Option<Address> {
        self.slots.read().await.get(&slot).and_then(|s| s.previous)
    }

    /// All slots in declaration order
    pub async fn slots(&self) -> Vec<ModuleState> {
        self.slots.read().await.values().cloned().collect()
    }
}

fn install(slots: &mut BTreeMap<ModuleSlot, ModuleState>, slot: ModuleSlot, module: Address) {
    let state = slots.entry(slot).or_insert(ModuleState {
        slot,
        current: None,
        previous: None,
    });
    state.previous = state.current;
    state.current = Some(module);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{MigrationError, MockStateMigrator};

    const OWNER: Address = Address::repeat_byte(0x01);
    const USER: Address = Address::repeat_byte(0x0f);
    const INITIAL: Address = Address::repeat_byte(0xc0);
    const CONSENSUS: Address = Address::repeat_byte(0xc1);
    const EXECUTION: Address = Address::repeat_byte(0xc2);
    const DATA: Address = Address::repeat_byte(0xc3);

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(OWNER, Arc::new(AuditLog::new()))
            .with_module(ModuleSlot::Consensus, INITIAL)
    }

    #[tokio::test]
    async fn test_swap_consensus_module() {
        let audit = Arc::new(AuditLog::new());
        let registry = ModuleRegistry::new(OWNER, audit.clone());

        registry
            .swap_module(OWNER, ModuleSlot::Consensus, CONSENSUS)
            .await
            .unwrap();

        assert_eq!(registry.module(ModuleSlot::Consensus).await, Some(CONSENSUS));
        assert_eq!(
            audit.last().await,
            Some(AuditEvent::ModuleSwapped {
                slot_name: "Consensus".to_string(),
                new_module: CONSENSUS,
            })
        );
    }

    #[tokio::test]
    async fn test_data_availability_slot_name() {
        let registry = registry();
        registry
            .swap_module(OWNER, ModuleSlot::DataAvailability, DATA)
            .await
            .unwrap();

        let slots = registry.slots().await;
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[2].current, Some(DATA));
        assert_eq!(ModuleSlot::DataAvailability.to_string(), "Data Availability");
    }

    #[tokio::test]
    async fn test_zero_module_leaves_slot_unchanged() {
        let registry = registry();

        assert!(matches!(
            registry.swap_module(OWNER, ModuleSlot::Consensus, Address::ZERO).await,
            Err(HotSwapError::InvalidTarget(_))
        ));
        assert_eq!(registry.module(ModuleSlot::Consensus).await, Some(INITIAL));
        assert_eq!(registry.previous(ModuleSlot::Consensus).await, None);
    }

    #[tokio::test]
    async fn test_only_owner_swaps() {
        let registry = registry();
        assert!(matches!(
            registry.swap_module(USER, ModuleSlot::Consensus, CONSENSUS).await,
            Err(HotSwapError::PermissionDenied { .. })
        ));
        assert_eq!(registry.module(ModuleSlot::Consensus).await, Some(INITIAL));
    }

    #[tokio::test]
    async fn test_multi_module_swap_is_atomic() {
        let audit = Arc::new(AuditLog::new());
        let registry = ModuleRegistry::new(OWNER, audit.clone())
            .with_module(ModuleSlot::Consensus, INITIAL);

        let bad = ModuleAssignment {
            consensus: CONSENSUS,
            execution: EXECUTION,
            data_availability: Address::ZERO,
        };
        assert!(registry.swap_multiple_modules(OWNER, bad).await.is_err());
        assert_eq!(registry.module(ModuleSlot::Consensus).await, Some(INITIAL));
        assert_eq!(registry.module(ModuleSlot::Execution).await, None);
        assert!(audit.is_empty().await);

        let good = ModuleAssignment {
            consensus: CONSENSUS,
            execution: EXECUTION,
            data_availability: DATA,
        };
        registry.swap_multiple_modules(OWNER, good).await.unwrap();
        assert_eq!(registry.module(ModuleSlot::Execution).await, Some(EXECUTION));
        assert_eq!(registry.previous(ModuleSlot::Consensus).await, Some(INITIAL));
        assert_eq!(
            audit.events().await,
            vec![AuditEvent::MultiModuleSwapped {
                consensus_module: CONSENSUS,
                execution_module: EXECUTION,
                data_module: DATA,
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_migration_restores_slot() {
        let mut migrator = MockStateMigrator::new();
        migrator
            .expect_migrate()
            .times(1)
            .returning(|_| Err(MigrationError("schema mismatch".to_string())));
        let audit = Arc::new(AuditLog::new());
        let registry = ModuleRegistry::new(OWNER, audit.clone())
            .with_module(ModuleSlot::Execution, INITIAL)
            .with_migrator(Arc::new(migrator));

        let err = registry
            .swap_module_with_migration(
                OWNER,
                ModuleSlot::Execution,
                EXECUTION,
                Bytes::from_static(b"StateDataExample"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, HotSwapError::MigrationFailed(_)));
        assert_eq!(registry.module(ModuleSlot::Execution).await, Some(INITIAL));
        assert_eq!(registry.previous(ModuleSlot::Execution).await, None);
        assert!(audit.is_empty().await);
    }

    #[tokio::test]
    async fn test_migration_payload_delivered_unmodified() {
        let mut migrator = MockStateMigrator::new();
        migrator
            .expect_migrate()
            .withf(|payload| payload.to_vec() == b"StateDataExample".to_vec())
            .times(1)
            .returning(|_| Ok(()));
        let audit = Arc::new(AuditLog::new());
        let registry = ModuleRegistry::new(OWNER, audit.clone()).with_migrator(Arc::new(migrator));

        let data = Bytes::from_static(b"StateDataExample");
        registry
            .migrate_state_across_modules(OWNER, data.clone())
            .await
            .unwrap();
        assert_eq!(
            audit.last().await,
            Some(AuditEvent::StateMigrationPerformed { state_data: data })
        );
    }

    #[tokio::test]
    async fn test_rollback_is_single_level() {
        let registry = registry();
        registry
            .swap_module(OWNER, ModuleSlot::Consensus, CONSENSUS)
            .await
            .unwrap();

        registry.rollback_module(OWNER, ModuleSlot::Consensus).await.unwrap();
        assert_eq!(registry.module(ModuleSlot::Consensus).await, Some(INITIAL));

        assert!(matches!(
            registry.rollback_module(OWNER, ModuleSlot::Consensus).await,
            Err(HotSwapError::InvalidState { .. })
        ));
    }
}
