//! Request/execute/rollback state machine shared by every swapper

use crate::error::{HotSwapError, HotSwapResult};
use crate::events::{AuditEvent, AuditLog};
use crate::migration::StateMigrator;
use crate::policy::{AuthorizationPolicy, ValidationGate};
use crate::types::{
    ensure_target, Address, Bytes, GateKind, SwapId, SwapStatus, SwapTarget, ValidationProof,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A tracked swap and its single-level undo snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SwapRequest {
    pub id: SwapId,
    pub requester: Address,
    pub targets: Vec<SwapTarget>,
    pub batch: bool,
    pub status: SwapStatus,
    /// Live references before execution; `None` until executed
    pub previous: Option<Vec<Address>>,
    pub requested_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl SwapRequest {
    pub fn addresses(&self) -> Vec<Address> {
        self.targets.iter().map(|t| t.target).collect()
    }
}

struct RegistryState {
    /// Live references, replaced wholesale on execute/rollback
    current: Vec<Address>,
    /// Request whose execution installed `current`; cleared by its rollback
    installed_by: Option<SwapId>,
    requests: HashMap<SwapId, SwapRequest>,
}

/// Generic hot-swap registry.
///
/// All state-changing calls hold the write lock for their whole duration,
/// verifier round-trips included, so readers only ever see committed state.
pub struct SwapRegistry {
    name: String,
    policy: AuthorizationPolicy,
    gate: ValidationGate,
    migrator: Option<Arc<dyn StateMigrator>>,
    audit: Arc<AuditLog>,
    state: RwLock<RegistryState>,
}

impl SwapRegistry {
    /// Create a registry with no live reference yet
    pub fn new(
        name: impl Into<String>,
        policy: AuthorizationPolicy,
        gate: ValidationGate,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            gate,
            migrator: None,
            audit,
            state: RwLock::new(RegistryState {
                current: Vec::new(),
                installed_by: None,
                requests: HashMap::new(),
            }),
        }
    }

    /// Seed the live reference
    pub fn with_current(self, current: Address) -> Self {
        self.with_current_set(vec![current])
    }

    pub fn with_current_set(mut self, current: Vec<Address>) -> Self {
        self.state.get_mut().current = current;
        self
    }

    pub fn with_migrator(mut self, migrator: Arc<dyn StateMigrator>) -> Self {
        self.migrator = Some(migrator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    pub fn gate(&self) -> &ValidationGate {
        &self.gate
    }

    pub fn gate_kind(&self) -> Option<GateKind> {
        self.gate.kind()
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Request a single-target swap
    pub async fn request_swap(
        &self,
        caller: Address,
        id: SwapId,
        target: SwapTarget,
    ) -> HotSwapResult<()> {
        let result = self.insert_request(caller, id, vec![target], false).await;
        self.observe("request_swap", &result);
        result
    }

    /// Request an ordered batch of targets under one id
    pub async fn request_multi_swap(
        &self,
        caller: Address,
        id: SwapId,
        targets: Vec<SwapTarget>,
    ) -> HotSwapResult<()> {
        let result = self.insert_request(caller, id, targets, true).await;
        self.observe("request_multi_swap", &result);
        result
    }

    /// Execute a requested swap
    pub async fn execute_swap(&self, caller: Address, id: SwapId) -> HotSwapResult<()> {
        let result = self.execute(caller, id, None).await;
        self.observe("execute_swap", &result);
        result
    }

    /// Execute a requested batch; every entry must pass validation or none
    /// is applied. Accepts single requests too.
    pub async fn execute_multi_swap(&self, caller: Address, id: SwapId) -> HotSwapResult<()> {
        let result = self.execute(caller, id, None).await;
        self.observe("execute_multi_swap", &result);
        result
    }

    /// Execute and hand `state_data` to the migrator as one unit. A failed
    /// migration leaves the request Requested and the live reference as it was.
    pub async fn execute_swap_with_migration(
        &self,
        caller: Address,
        id: SwapId,
        state_data: Bytes,
    ) -> HotSwapResult<()> {
        let result = self.execute(caller, id, Some(state_data)).await;
        self.observe("execute_swap_with_migration", &result);
        result
    }

    /// Restore the snapshot taken at execution
    pub async fn rollback_swap(&self, caller: Address, id: SwapId) -> HotSwapResult<()> {
        let result = self.rollback(caller, id).await;
        self.observe("rollback_swap", &result);
        result
    }

    /// Replace the proof of entry `index` on a still-Requested swap
    pub async fn attach_proof(
        &self,
        caller: Address,
        id: SwapId,
        index: usize,
        proof: ValidationProof,
    ) -> HotSwapResult<()> {
        self.policy.check_request(&caller, "attach proof")?;

        let mut state = self.state.write().await;
        let request = state
            .requests
            .get_mut(&id)
            .ok_or(HotSwapError::UnknownId { id })?;
        if request.status != SwapStatus::Requested {
            return Err(HotSwapError::invalid_state(
                format!("request {}", id),
                request.status,
                "attach proof to",
            ));
        }
        let len = request.targets.len();
        let entry = request.targets.get_mut(index).ok_or_else(|| {
            HotSwapError::InvalidTarget(format!(
                "request {} has {} entries, no entry {}",
                id, len, index
            ))
        })?;
        entry.proof = Some(proof);

        info!("[{}] Proof replaced on request {} entry {}", self.name, id, index);
        Ok(())
    }

    /// Deliver an opaque state payload to the migrator outside any swap
    pub async fn migrate_state(&self, caller: Address, state_data: Bytes) -> HotSwapResult<()> {
        self.policy.check_execute(&caller, "migrate state")?;

        // Serialize with other state changes
        let _state = self.state.write().await;
        self.run_migration(&state_data).await?;
        self.audit
            .append(migration_event(self.gate.kind(), state_data))
            .await;

        info!("[{}] State migrated by {}", self.name, caller);
        Ok(())
    }

    async fn insert_request(
        &self,
        caller: Address,
        id: SwapId,
        targets: Vec<SwapTarget>,
        batch: bool,
    ) -> HotSwapResult<()> {
        self.policy.check_request(&caller, "request swap")?;

        if targets.is_empty() {
            return Err(HotSwapError::InvalidTarget(
                "a swap needs at least one target".to_string(),
            ));
        }
        for target in &targets {
            ensure_target(&target.target)?;
        }

        let mut state = self.state.write().await;
        if state.requests.contains_key(&id) {
            return Err(HotSwapError::DuplicateId { id });
        }

        let request = SwapRequest {
            id,
            requester: caller,
            targets,
            batch,
            status: SwapStatus::Requested,
            previous: None,
            requested_at: Utc::now(),
            executed_at: None,
        };
        let event = requested_event(self.gate.kind(), &request);
        let count = request.targets.len();
        state.requests.insert(id, request);

        self.audit.append(event).await;
        crate::metrics::record_swap_requested(&self.name);
        info!(
            "[{}] Swap {} requested by {} ({} target(s))",
            self.name, id, caller, count
        );
        Ok(())
    }

    async fn execute(
        &self,
        caller: Address,
        id: SwapId,
        state_data: Option<Bytes>,
    ) -> HotSwapResult<()> {
        let mut state = self.state.write().await;

        let request = state.requests.get(&id).ok_or(HotSwapError::UnknownId { id })?;
        if request.status != SwapStatus::Requested {
            return Err(HotSwapError::invalid_state(
                format!("request {}", id),
                request.status,
                "execute",
            ));
        }
        self.policy.check_execute(&caller, "execute swap")?;

        // Every entry is checked before anything changes
        let targets = request.targets.clone();
        for (index, target) in targets.iter().enumerate() {
            let valid = self
                .gate
                .verify(&target.payload(), target.proof.as_ref())
                .await?;
            if !valid {
                let gate = self.gate.kind().unwrap_or(GateKind::ZeroKnowledge);
                crate::metrics::record_validation_failure(gate);
                debug!("[{}] Entry {} of request {} rejected", self.name, index, id);
                return Err(HotSwapError::ValidationError { id, gate });
            }
        }

        if let Some(data) = &state_data {
            self.run_migration(data).await?;
        }

        let new_current: Vec<Address> = targets.iter().map(|t| t.target).collect();
        let previous = std::mem::replace(&mut state.current, new_current);
        state.installed_by = Some(id);
        let request = state
            .requests
            .get_mut(&id)
            .ok_or(HotSwapError::UnknownId { id })?;
        request.previous = Some(previous);
        request.status = SwapStatus::Executed;
        request.executed_at = Some(Utc::now());

        let mut events = vec![executed_event(self.gate.kind(), request)];
        if let Some(data) = state_data {
            events.push(migration_event(self.gate.kind(), data));
        }
        self.audit.append_all(events).await;

        crate::metrics::record_swap_executed(&self.name);
        info!("[{}] Swap {} executed by {}", self.name, id, caller);
        Ok(())
    }

    async fn rollback(&self, caller: Address, id: SwapId) -> HotSwapResult<()> {
        let mut state = self.state.write().await;

        let request = state.requests.get(&id).ok_or(HotSwapError::UnknownId { id })?;
        if request.status != SwapStatus::Executed {
            return Err(HotSwapError::invalid_state(
                format!("request {}", id),
                request.status,
                "roll back",
            ));
        }
        self.policy.check_execute(&caller, "roll back swap")?;
        // Only the request that installed the live reference can undo it
        if state.installed_by != Some(id) {
            return Err(HotSwapError::invalid_state(
                format!("request {}", id),
                "superseded",
                "roll back",
            ));
        }

        let restored = request.previous.clone().unwrap_or_default();
        state.current = restored;
        state.installed_by = None;
        if let Some(request) = state.requests.get_mut(&id) {
            request.status = SwapStatus::RolledBack;
        }

        self.audit.append(AuditEvent::RollbackPerformed {}).await;
        crate::metrics::record_swap_rolled_back(&self.name);
        info!("[{}] Swap {} rolled back by {}", self.name, id, caller);
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

    fn observe(&self, operation: &'static str, result: &HotSwapResult<()>) {
        if let Err(e) = result {
            if e.should_alert() {
                warn!("[{}] {} rejected: {}", self.name, operation, e);
            } else {
                debug!("[{}] {} rejected: {}", self.name, operation, e);
            }
            crate::metrics::record_rejection(&self.name, e);
        }
    }

    /// First live reference
    pub async fn current(&self) -> Option<Address> {
        self.state.read().await.current.first().copied()
    }

    /// All live references, in batch order
    pub async fn current_set(&self) -> Vec<Address> {
        self.state.read().await.current.clone()
    }

    pub async fn request(&self, id: SwapId) -> Option<SwapRequest> {
        self.state.read().await.requests.get(&id).cloned()
    }

    pub async fn status(&self, id: SwapId) -> Option<SwapStatus> {
        self.state.read().await.requests.get(&id).map(|r| r.status)
    }

    /// All requests ordered by id
    pub async fn requests(&self) -> Vec<SwapRequest> {
        let mut requests: Vec<_> = self.state.read().await.requests.values().cloned().collect();
        requests.sort_by_key(|r| r.id);
        requests
    }

    /// Requests that were never executed. These never expire.
    pub async fn pending_count(&self) -> usize {
        self.state
            .read()
            .await
            .requests
            .values()
            .filter(|r| r.status == SwapStatus::Requested)
            .count()
    }
}

fn requested_event(gate: Option<GateKind>, request: &SwapRequest) -> AuditEvent {
    let first = &request.targets[0];
    match (request.batch, gate) {
        (false, Some(GateKind::CrossChain)) => AuditEvent::CrossChainSwapRequested {
            new_target: first.target,
            target_chain_id: first.chain_id.unwrap_or_default(),
        },
        (false, _) => AuditEvent::SwapRequested {
            requester: request.requester,
            new_target: first.target,
        },
        (true, None) => AuditEvent::MultiSwapRequested {
            new_targets: request.addresses(),
        },
        (true, Some(GateKind::CrossChain)) => AuditEvent::MultiChainSwapRequested {
            new_targets: request.addresses(),
            target_chain_ids: request
                .targets
                .iter()
                .map(|t| t.chain_id.unwrap_or_default())
                .collect(),
        },
        (true, Some(GateKind::ZeroKnowledge)) => AuditEvent::BatchSwapRequested {
            proofs: request
                .targets
                .iter()
                .map(|t| t.proof.as_ref().map(|p| p.data.clone()).unwrap_or_default())
                .collect(),
            metadata: request.targets.iter().map(|t| t.metadata.clone()).collect(),
        },
        (true, Some(GateKind::QuantumSafe)) => AuditEvent::BatchQuantumSwapRequested {
            new_targets: request.addresses(),
        },
    }
}

fn executed_event(gate: Option<GateKind>, request: &SwapRequest) -> AuditEvent {
    let new_target = request.targets[0].target;
    match (request.batch, gate) {
        (false, Some(GateKind::CrossChain)) => AuditEvent::CrossChainSwapExecuted { new_target },
        (false, Some(GateKind::QuantumSafe)) => AuditEvent::QuantumSafeSwapExecuted { new_target },
        (false, _) => AuditEvent::SwapExecuted { new_target },
        (true, None) => AuditEvent::MultiSwapExecuted {
            new_targets: request.addresses(),
        },
        (true, Some(GateKind::CrossChain)) => AuditEvent::MultiChainSwapExecuted {
            new_targets: request.addresses(),
        },
        (true, Some(GateKind::ZeroKnowledge)) => AuditEvent::BatchSwapExecuted {},
        (true, Some(GateKind::QuantumSafe)) => AuditEvent::BatchQuantumSwapExecuted {},
    }
}

fn migration_event(gate: Option<GateKind>, state_data: Bytes) -> AuditEvent {
    match gate {
        Some(GateKind::QuantumSafe) => {
            AuditEvent::QuantumSafeDataMigrationPerformed { data: state_data }
        }
        _ => AuditEvent::StateMigrated { state_data },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{MigrationError, MockStateMigrator};
    use crate::policy::{DigestAllowlistVerifier, MockVerifier, VerifierError};
    use tokio_test::{assert_err, assert_ok};

    const OWNER: Address = Address::repeat_byte(0x01);
    const STRANGER: Address = Address::repeat_byte(0x0f);
    const ORIGINAL: Address = Address::repeat_byte(0xa0);
    const NEW_A: Address = Address::repeat_byte(0xa1);
    const NEW_B: Address = Address::repeat_byte(0xa2);

    fn basic_registry() -> SwapRegistry {
        SwapRegistry::new(
            "basic",
            AuthorizationPolicy::OwnerOnly { owner: OWNER },
            ValidationGate::None,
            Arc::new(AuditLog::new()),
        )
        .with_current(ORIGINAL)
    }

    fn zk_registry() -> SwapRegistry {
        let mut verifier = DigestAllowlistVerifier::new();
        verifier.accept(b"ValidProof");
        SwapRegistry::new(
            "privacy",
            AuthorizationPolicy::OwnerOnly { owner: OWNER },
            ValidationGate::zero_knowledge(Arc::new(verifier)),
            Arc::new(AuditLog::new()),
        )
        .with_current(ORIGINAL)
    }

    fn zk_proof(data: &[u8]) -> ValidationProof {
        ValidationProof::new(GateKind::ZeroKnowledge, data.to_vec())
    }

    #[tokio::test]
    async fn test_request_execute_rollback_lifecycle() {
        let registry = basic_registry();

        assert_ok!(registry.request_swap(OWNER, 1, SwapTarget::local(NEW_A)).await);
        assert_eq!(registry.status(1).await, Some(SwapStatus::Requested));
        assert_eq!(registry.current().await, Some(ORIGINAL));

        assert_ok!(registry.execute_swap(OWNER, 1).await);
        assert_eq!(registry.current().await, Some(NEW_A));
        let request = registry.request(1).await.unwrap();
        assert_eq!(request.previous, Some(vec![ORIGINAL]));
        assert_eq!(request.status, SwapStatus::Executed);

        assert_ok!(registry.rollback_swap(OWNER, 1).await);
        assert_eq!(registry.current().await, Some(ORIGINAL));
        assert_eq!(registry.status(1).await, Some(SwapStatus::RolledBack));

        let err = registry.rollback_swap(OWNER, 1).await.unwrap_err();
        assert!(matches!(
            err,
            HotSwapError::InvalidState { ref status, .. } if status == "rolled_back"
        ));
        assert_eq!(registry.current().await, Some(ORIGINAL));

        assert_eq!(
            registry.audit().events().await,
            vec![
                AuditEvent::SwapRequested {
                    requester: OWNER,
                    new_target: NEW_A
                },
                AuditEvent::SwapExecuted { new_target: NEW_A },
                AuditEvent::RollbackPerformed {},
            ]
        );
    }

    #[tokio::test]
    async fn test_only_latest_execution_can_roll_back() {
        let registry = basic_registry();
        registry.request_swap(OWNER, 1, SwapTarget::local(NEW_A)).await.unwrap();
        registry.execute_swap(OWNER, 1).await.unwrap();
        registry.request_swap(OWNER, 2, SwapTarget::local(NEW_B)).await.unwrap();
        registry.execute_swap(OWNER, 2).await.unwrap();

        let err = registry.rollback_swap(OWNER, 1).await.unwrap_err();
        assert!(matches!(
            err,
            HotSwapError::InvalidState { ref status, .. } if status == "superseded"
        ));
        assert_eq!(registry.current().await, Some(NEW_B));
        assert_eq!(registry.status(1).await, Some(SwapStatus::Executed));

        assert_ok!(registry.rollback_swap(OWNER, 2).await);
        assert_eq!(registry.current().await, Some(NEW_A));

        // Single level: the older swap stays committed
        assert_err!(registry.rollback_swap(OWNER, 1).await);
        assert_eq!(registry.current().await, Some(NEW_A));
        assert_eq!(registry.audit().len().await, 5);
    }

    #[tokio::test]
    async fn test_invalid_lifecycle_positions() {
        let registry = basic_registry();

        assert_eq!(
            registry.execute_swap(OWNER, 42).await,
            Err(HotSwapError::UnknownId { id: 42 })
        );

        registry.request_swap(OWNER, 1, SwapTarget::local(NEW_A)).await.unwrap();
        let err = registry.rollback_swap(OWNER, 1).await.unwrap_err();
        assert!(matches!(
            err,
            HotSwapError::InvalidState { ref status, .. } if status == "requested"
        ));

        registry.execute_swap(OWNER, 1).await.unwrap();
        let err = registry.execute_swap(OWNER, 1).await.unwrap_err();
        assert!(matches!(
            err,
            HotSwapError::InvalidState { ref status, .. } if status == "executed"
        ));
        assert_eq!(registry.current().await, Some(NEW_A));
        assert_eq!(registry.audit().len().await, 2);
    }

    #[tokio::test]
    async fn test_entry_validation() {
        let registry = basic_registry();

        assert!(matches!(
            registry.request_swap(OWNER, 1, SwapTarget::local(Address::ZERO)).await,
            Err(HotSwapError::InvalidTarget(_))
        ));
        registry.request_swap(OWNER, 1, SwapTarget::local(NEW_A)).await.unwrap();
        assert_eq!(
            registry.request_swap(OWNER, 1, SwapTarget::local(NEW_B)).await,
            Err(HotSwapError::DuplicateId { id: 1 })
        );
        assert_eq!(registry.request(1).await.unwrap().targets[0].target, NEW_A);
    }

    #[tokio::test]
    async fn test_unauthorized_caller_changes_nothing() {
        let registry = basic_registry();

        assert_err!(registry.request_swap(STRANGER, 1, SwapTarget::local(NEW_A)).await);
        assert!(registry.request(1).await.is_none());

        registry.request_swap(OWNER, 2, SwapTarget::local(NEW_A)).await.unwrap();
        let events_before = registry.audit().len().await;

        assert!(matches!(
            registry.execute_swap(STRANGER, 2).await,
            Err(HotSwapError::PermissionDenied { .. })
        ));
        assert_eq!(registry.status(2).await, Some(SwapStatus::Requested));
        assert_eq!(registry.current().await, Some(ORIGINAL));
        assert_eq!(registry.audit().len().await, events_before);
    }

    #[tokio::test]
    async fn test_multi_swap_with_invalid_target_is_rejected_whole() {
        let registry = basic_registry();
        let targets = vec![
            SwapTarget::local(NEW_A),
            SwapTarget::local(Address::ZERO),
            SwapTarget::local(NEW_B),
        ];

        assert!(matches!(
            registry.request_multi_swap(OWNER, 3, targets).await,
            Err(HotSwapError::InvalidTarget(_))
        ));
        assert!(registry.request(3).await.is_none());
        assert!(registry.audit().is_empty().await);
    }

    #[tokio::test]
    async fn test_multi_swap_installs_all_targets() {
        let registry = basic_registry();
        let targets = vec![SwapTarget::local(NEW_A), SwapTarget::local(NEW_B)];

        registry.request_multi_swap(OWNER, 3, targets).await.unwrap();
        registry.execute_multi_swap(OWNER, 3).await.unwrap();

        assert_eq!(registry.current_set().await, vec![NEW_A, NEW_B]);
        assert_eq!(
            registry.audit().events().await,
            vec![
                AuditEvent::MultiSwapRequested {
                    new_targets: vec![NEW_A, NEW_B]
                },
                AuditEvent::MultiSwapExecuted {
                    new_targets: vec![NEW_A, NEW_B]
                },
            ]
        );

        registry.rollback_swap(OWNER, 3).await.unwrap();
        assert_eq!(registry.current_set().await, vec![ORIGINAL]);
    }

    #[tokio::test]
    async fn test_rejected_proof_is_retryable_with_corrected_proof() {
        let registry = zk_registry();
        let target = SwapTarget::local(NEW_A).with_proof(zk_proof(b"InvalidProof"));
        registry.request_swap(OWNER, 5, target).await.unwrap();

        assert_eq!(
            registry.execute_swap(OWNER, 5).await,
            Err(HotSwapError::ValidationError {
                id: 5,
                gate: GateKind::ZeroKnowledge
            })
        );
        assert_eq!(registry.status(5).await, Some(SwapStatus::Requested));
        assert_eq!(registry.current().await, Some(ORIGINAL));

        registry.attach_proof(OWNER, 5, 0, zk_proof(b"ValidProof")).await.unwrap();
        registry.execute_swap(OWNER, 5).await.unwrap();
        assert_eq!(registry.current().await, Some(NEW_A));
    }

    #[tokio::test]
    async fn test_batch_with_one_bad_proof_applies_nothing() {
        let registry = zk_registry();
        let targets = vec![
            SwapTarget::local(NEW_A)
                .with_metadata(b"PrivacySwapMeta1".to_vec())
                .with_proof(zk_proof(b"ValidProof")),
            SwapTarget::local(NEW_B)
                .with_metadata(b"PrivacySwapMeta2".to_vec())
                .with_proof(zk_proof(b"forged")),
        ];
        registry.request_multi_swap(OWNER, 4, targets).await.unwrap();
        assert!(matches!(
            registry.audit().last().await,
            Some(AuditEvent::BatchSwapRequested { .. })
        ));

        assert_err!(registry.execute_multi_swap(OWNER, 4).await);
        assert_eq!(registry.current_set().await, vec![ORIGINAL]);
        assert_eq!(registry.audit().len().await, 1);

        registry.attach_proof(OWNER, 4, 1, zk_proof(b"ValidProof")).await.unwrap();
        registry.execute_multi_swap(OWNER, 4).await.unwrap();
        assert_eq!(registry.current_set().await, vec![NEW_A, NEW_B]);
        assert_eq!(registry.audit().last().await, Some(AuditEvent::BatchSwapExecuted {}));
    }

    #[tokio::test]
    async fn test_attach_proof_bounds() {
        let registry = zk_registry();
        registry.request_swap(OWNER, 1, SwapTarget::local(NEW_A)).await.unwrap();

        assert!(matches!(
            registry.attach_proof(OWNER, 1, 3, zk_proof(b"ValidProof")).await,
            Err(HotSwapError::InvalidTarget(_))
        ));
        assert!(matches!(
            registry.attach_proof(STRANGER, 1, 0, zk_proof(b"ValidProof")).await,
            Err(HotSwapError::PermissionDenied { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_verifier_keeps_request_pending() {
        let mut verifier = MockVerifier::new();
        verifier
            .expect_verify()
            .times(1)
            .returning(|_, _| Err(VerifierError::Unreachable("connection reset".to_string())));
        verifier.expect_verify().times(1).returning(|_, _| Ok(true));
        let registry = SwapRegistry::new(
            "quantum",
            AuthorizationPolicy::OwnerOnly { owner: OWNER },
            ValidationGate::quantum_safe(Arc::new(verifier)),
            Arc::new(AuditLog::new()),
        );
        let target = SwapTarget::local(NEW_A)
            .with_proof(ValidationProof::new(GateKind::QuantumSafe, b"sig".to_vec()));
        registry.request_swap(OWNER, 1, target).await.unwrap();

        let err = registry.execute_swap(OWNER, 1).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(registry.status(1).await, Some(SwapStatus::Requested));
        assert_eq!(registry.pending_count().await, 1);
        assert_eq!(registry.current().await, None);

        assert_ok!(registry.execute_swap(OWNER, 1).await);
        assert_eq!(registry.status(1).await, Some(SwapStatus::Executed));
        assert_eq!(registry.current().await, Some(NEW_A));
    }

    #[tokio::test]
    async fn test_failed_migration_undoes_paired_swap() {
        let mut migrator = MockStateMigrator::new();
        migrator
            .expect_migrate()
            .times(1)
            .returning(|_| Err(MigrationError("storage layout mismatch".to_string())));
        let registry = basic_registry().with_migrator(Arc::new(migrator));
        registry.request_swap(OWNER, 1, SwapTarget::local(NEW_A)).await.unwrap();

        let err = registry
            .execute_swap_with_migration(OWNER, 1, Bytes::from_static(b"state"))
            .await
            .unwrap_err();
        assert!(matches!(err, HotSwapError::MigrationFailed(_)));
        assert_eq!(registry.current().await, Some(ORIGINAL));
        assert_eq!(registry.status(1).await, Some(SwapStatus::Requested));
        assert_eq!(registry.audit().len().await, 1);
    }

    #[tokio::test]
    async fn test_migration_delivers_payload_unmodified() {
        let mut migrator = MockStateMigrator::new();
        migrator
            .expect_migrate()
            .withf(|payload| payload.to_vec() == b"stateMigrationExample".to_vec())
            .times(2)
            .returning(|_| Ok(()));
        let registry = basic_registry().with_migrator(Arc::new(migrator));
        let data = Bytes::from_static(b"stateMigrationExample");

        registry.migrate_state(OWNER, data.clone()).await.unwrap();
        assert_eq!(
            registry.audit().last().await,
            Some(AuditEvent::StateMigrated {
                state_data: data.clone()
            })
        );

        registry.request_swap(OWNER, 1, SwapTarget::local(NEW_A)).await.unwrap();
        registry.execute_swap_with_migration(OWNER, 1, data.clone()).await.unwrap();
        let events = registry.audit().events().await;
        assert_eq!(
            &events[events.len() - 2..],
            &[
                AuditEvent::SwapExecuted { new_target: NEW_A },
                AuditEvent::StateMigrated { state_data: data },
            ]
        );
    }

    #[tokio::test]
    async fn test_requested_entries_never_expire() {
        let registry = basic_registry();
        registry.request_swap(OWNER, 1, SwapTarget::local(NEW_A)).await.unwrap();
        registry.request_swap(OWNER, 2, SwapTarget::local(NEW_B)).await.unwrap();
        registry.execute_swap(OWNER, 2).await.unwrap();

        assert_eq!(registry.pending_count().await, 1);
        let ids: Vec<_> = registry.requests().await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
