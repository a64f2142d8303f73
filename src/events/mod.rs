//! Audit event types and the append-only audit log
//!
//! Every committed transition produces exactly one record. The log is
//! observational: registries never read it back to rebuild their state.

use crate::types::{Address, Bytes, ChainId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, warn};

/// Events appended by the registries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum AuditEvent {
    SwapRequested {
        requester: Address,
        new_target: Address,
    },
    SwapExecuted {
        new_target: Address,
    },
    RollbackPerformed {},
    MultiSwapRequested {
        new_targets: Vec<Address>,
    },
    MultiSwapExecuted {
        new_targets: Vec<Address>,
    },
    StateMigrated {
        state_data: Bytes,
    },
    CrossChainSwapRequested {
        new_target: Address,
        target_chain_id: ChainId,
    },
    CrossChainSwapExecuted {
        new_target: Address,
    },
    MultiChainSwapRequested {
        new_targets: Vec<Address>,
        target_chain_ids: Vec<ChainId>,
    },
    MultiChainSwapExecuted {
        new_targets: Vec<Address>,
    },
    ChainRegistered {
        chain_id: ChainId,
        chain_name: String,
    },
    ProposalCreated {
        proposer: Address,
        new_target: Address,
    },
    VoteCast {
        voter: Address,
        approved: bool,
    },
    ProposalExecuted {
        new_target: Address,
    },
    ModuleSwapped {
        slot_name: String,
        new_module: Address,
    },
    MultiModuleSwapped {
        consensus_module: Address,
        execution_module: Address,
        data_module: Address,
    },
    StateMigrationPerformed {
        state_data: Bytes,
    },
    BatchSwapRequested {
        proofs: Vec<Bytes>,
        metadata: Vec<Bytes>,
    },
    BatchSwapExecuted {},
    QuantumSafeSwapExecuted {
        new_target: Address,
    },
    BatchQuantumSwapRequested {
        new_targets: Vec<Address>,
    },
    BatchQuantumSwapExecuted {},
    QuantumSafeDataMigrationPerformed {
        data: Bytes,
    },
    QuantumSafeSignatureValidated {
        signature: Bytes,
    },
}

impl AuditEvent {
    /// Get event name for metrics and storage
    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::SwapRequested { .. } => "swap_requested",
            AuditEvent::SwapExecuted { .. } => "swap_executed",
            AuditEvent::RollbackPerformed {} => "rollback_performed",
            AuditEvent::MultiSwapRequested { .. } => "multi_swap_requested",
            AuditEvent::MultiSwapExecuted { .. } => "multi_swap_executed",
            AuditEvent::StateMigrated { .. } => "state_migrated",
            AuditEvent::CrossChainSwapRequested { .. } => "cross_chain_swap_requested",
            AuditEvent::CrossChainSwapExecuted { .. } => "cross_chain_swap_executed",
            AuditEvent::MultiChainSwapRequested { .. } => "multi_chain_swap_requested",
            AuditEvent::MultiChainSwapExecuted { .. } => "multi_chain_swap_executed",
            AuditEvent::ChainRegistered { .. } => "chain_registered",
            AuditEvent::ProposalCreated { .. } => "proposal_created",
            AuditEvent::VoteCast { .. } => "vote_cast",
            AuditEvent::ProposalExecuted { .. } => "proposal_executed",
            AuditEvent::ModuleSwapped { .. } => "module_swapped",
            AuditEvent::MultiModuleSwapped { .. } => "multi_module_swapped",
            AuditEvent::StateMigrationPerformed { .. } => "state_migration_performed",
            AuditEvent::BatchSwapRequested { .. } => "batch_swap_requested",
            AuditEvent::BatchSwapExecuted {} => "batch_swap_executed",
            AuditEvent::QuantumSafeSwapExecuted { .. } => "quantum_safe_swap_executed",
            AuditEvent::BatchQuantumSwapRequested { .. } => "batch_quantum_swap_requested",
            AuditEvent::BatchQuantumSwapExecuted {} => "batch_quantum_swap_executed",
            AuditEvent::QuantumSafeDataMigrationPerformed { .. } => {
                "quantum_safe_data_migration_performed"
            }
            AuditEvent::QuantumSafeSignatureValidated { .. } => "quantum_safe_signature_validated",
        }
    }
}

/// A sequenced, timestamped audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: AuditEvent,
}

/// Append-only audit log shared by all registries of one engine
pub struct AuditLog {
    /// Records in commit order
    records: RwLock<Vec<AuditRecord>>,
    /// Live subscribers
    event_tx: broadcast::Sender<AuditRecord>,
    /// Optional JSON-lines file mirror, written off the async workers
    sink: Option<mpsc::UnboundedSender<SinkCommand>>,
}

enum SinkCommand {
    Write(AuditRecord),
    Flush(oneshot::Sender<()>),
}

impl AuditLog {
    /// Create an in-memory audit log
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            records: RwLock::new(Vec::new()),
            event_tx,
            sink: None,
        }
    }

    /// Create an audit log that also appends each record to a JSON-lines
    /// file. Must be called from within a tokio runtime.
    pub fn with_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let (sink_tx, sink_rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || run_sink(file, sink_rx));

        let mut log = Self::new();
        log.sink = Some(sink_tx);
        Ok(log)
    }

    /// Append one event
    pub async fn append(&self, event: AuditEvent) {
        self.append_all(vec![event]).await;
    }

    /// Append the events of one committed operation in order
    pub async fn append_all(&self, events: Vec<AuditEvent>) {
        let mut records = self.records.write().await;

        for event in events {
            let record = AuditRecord {
                sequence: records.len() as u64 + 1,
                recorded_at: Utc::now(),
                event,
            };
            debug!("Audit #{}: {}", record.sequence, record.event.name());
            crate::metrics::record_audit_event(&record.event);

            if let Some(sink) = &self.sink {
                if sink.send(SinkCommand::Write(record.clone())).is_err() {
                    warn!("Audit file writer stopped, dropping record {}", record.sequence);
                }
            }
            // No subscribers is fine
            let _ = self.event_tx.send(record.clone());
            records.push(record);
        }
    }

    /// Wait until every record appended so far has reached the file mirror
    pub async fn flush(&self) {
        let Some(sink) = &self.sink else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if sink.send(SinkCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Subscribe to records appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AuditRecord> {
        self.event_tx.subscribe()
    }

    /// Snapshot of all records
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }

    /// Snapshot of all events, without record metadata
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.records
            .read()
            .await
            .iter()
            .map(|r| r.event.clone())
            .collect()
    }

    /// Most recent event, if any
    pub async fn last(&self) -> Option<AuditEvent> {
        self.records.read().await.last().map(|r| r.event.clone())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

fn run_sink(mut file: File, mut commands: mpsc::UnboundedReceiver<SinkCommand>) {
    while let Some(command) = commands.blocking_recv() {
        match command {
            SinkCommand::Write(record) => {
                let line = match serde_json::to_string(&record) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to encode audit record {}: {}", record.sequence, e);
                        continue;
                    }
                };
                if let Err(e) = writeln!(file, "{}", line) {
                    warn!("Failed to write audit record {}: {}", record.sequence, e);
                }
            }
            SinkCommand::Flush(done) => {
                if let Err(e) = file.flush() {
                    warn!("Failed to flush audit file: {}", e);
                }
                let _ = done.send(());
            }
        }
    }
}
